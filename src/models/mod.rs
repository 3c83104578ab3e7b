mod attendance;
mod detection;

pub use attendance::{
    is_valid_subject_id, AttendanceRecord, Direction, InsertStatus, RecordTemplate,
};
pub use detection::{BoundingRegion, DetectedCode, DetectionBatch, FrameSize};
