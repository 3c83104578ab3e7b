mod config;
mod debounce;
mod recorder;

pub use config::{LocationJoinPolicy, RecorderConfig};
pub use debounce::{evaluate, RejectReason, ScanDecision, ScanState};
pub use recorder::AttendanceRecorder;
