//! Scan-to-record attendance pipeline.
//!
//! A camera layer feeds [`DetectionBatch`]es into an [`AttendanceRecorder`],
//! which debounces repeated detections, joins each accepted scan with an
//! asynchronously obtained location fix, validates the subject id, and
//! drives a single in-flight write to an [`AttendanceStore`]. Outcomes and
//! the session's registration history are published through watch channels.

pub mod db;
pub mod location;
pub mod models;
pub mod scanner;
pub mod store;
mod utils;

pub use db::Database;
pub use location::{FixRequest, FixRequestSettings, FixSender, GeolocationProvider, LocationFix};
pub use models::{
    AttendanceRecord, BoundingRegion, DetectedCode, DetectionBatch, Direction, FrameSize,
    InsertStatus, RecordTemplate,
};
pub use scanner::{AttendanceRecorder, LocationJoinPolicy, RecorderConfig};
pub use store::{AttendanceStore, StorageError};
