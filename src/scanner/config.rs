use std::time::Duration;

use crate::location::FixRequestSettings;
use crate::models::RecordTemplate;

/// How the recorder joins the asynchronous location fix with the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationJoinPolicy {
    /// Write with whatever fix has arrived so far; the persisted record may
    /// legitimately lack coordinates. Matches the historical behavior.
    BestEffort,
    /// Wait up to the given duration for the first fix before writing.
    AwaitWithTimeout(Duration),
}

/// Tunables for the attendance recorder.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// How long an accepted code stays rejected as a duplicate.
    pub cooldown: Duration,
    pub location_join: LocationJoinPolicy,
    pub fix_request: FixRequestSettings,
    /// Business fields stamped onto every record this recorder produces.
    pub template: RecordTemplate,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            location_join: LocationJoinPolicy::BestEffort,
            fix_request: FixRequestSettings::default(),
            template: RecordTemplate::default(),
        }
    }
}
