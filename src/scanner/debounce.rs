use crate::models::DetectionBatch;

/// Recorder-side scan state. Owned and mutated only by the recorder; the
/// debouncer reads it.
#[derive(Debug, Default)]
pub struct ScanState {
    /// Single-flight guard: true while a write cycle is running.
    pub is_processing: bool,
    /// Code accepted most recently; rejected as duplicate until the
    /// cool-down reset clears it.
    pub last_accepted_code: Option<String>,
    /// Monotonic id of the current scan cycle. Location fixes are keyed by
    /// this so a late fix cannot leak into a later cycle's record.
    pub cycle: u64,
}

impl ScanState {
    /// Marks the start of a new cycle and returns its id.
    pub fn begin_cycle(&mut self) -> u64 {
        self.is_processing = true;
        self.cycle += 1;
        self.cycle
    }

    pub fn finish_cycle(&mut self) {
        self.is_processing = false;
    }
}

/// Why a batch produced no attendance attempt. All of these are silent
/// non-events as far as observers are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A write is already in flight; back-pressure by dropping the batch.
    InFlight,
    /// Zero codes (nothing to do) or several codes (ambiguous frame).
    NotExactlyOneCode { count: usize },
    /// The single code's payload could not be decoded.
    UnreadableCode,
    /// Same code as the last accepted one, still inside the cool-down.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    Accepted(String),
    Rejected(RejectReason),
}

/// Decides whether a detection batch represents a new attendance event.
/// Pure: mutating the state on acceptance is the caller's job.
pub fn evaluate(batch: &DetectionBatch, state: &ScanState) -> ScanDecision {
    if state.is_processing {
        return ScanDecision::Rejected(RejectReason::InFlight);
    }

    if batch.codes.len() != 1 {
        return ScanDecision::Rejected(RejectReason::NotExactlyOneCode {
            count: batch.codes.len(),
        });
    }

    let Some(value) = batch.codes[0].value.as_deref() else {
        return ScanDecision::Rejected(RejectReason::UnreadableCode);
    };

    if state.last_accepted_code.as_deref() == Some(value) {
        return ScanDecision::Rejected(RejectReason::Duplicate);
    }

    ScanDecision::Accepted(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DetectedCode;

    fn batch_of(values: &[&str]) -> DetectionBatch {
        DetectionBatch {
            codes: values.iter().map(|v| DetectedCode::with_value(*v)).collect(),
            frame_width: 640,
            frame_height: 480,
        }
    }

    #[test]
    fn accepts_a_single_readable_new_code() {
        let state = ScanState::default();
        assert_eq!(
            evaluate(&batch_of(&["A1234567"]), &state),
            ScanDecision::Accepted("A1234567".to_string())
        );
    }

    #[test]
    fn rejects_empty_and_multi_code_batches() {
        let state = ScanState::default();
        assert_eq!(
            evaluate(&batch_of(&[]), &state),
            ScanDecision::Rejected(RejectReason::NotExactlyOneCode { count: 0 })
        );
        assert_eq!(
            evaluate(&batch_of(&["A1234567", "B7654321"]), &state),
            ScanDecision::Rejected(RejectReason::NotExactlyOneCode { count: 2 })
        );
    }

    #[test]
    fn rejects_unreadable_codes() {
        let state = ScanState::default();
        let batch = DetectionBatch {
            codes: vec![DetectedCode::unreadable()],
            frame_width: 0,
            frame_height: 0,
        };
        assert_eq!(
            evaluate(&batch, &state),
            ScanDecision::Rejected(RejectReason::UnreadableCode)
        );
    }

    #[test]
    fn rejects_while_a_write_is_in_flight() {
        let state = ScanState {
            is_processing: true,
            ..ScanState::default()
        };
        assert_eq!(
            evaluate(&batch_of(&["A1234567"]), &state),
            ScanDecision::Rejected(RejectReason::InFlight)
        );
    }

    #[test]
    fn rejects_the_last_accepted_code_until_reset() {
        let mut state = ScanState {
            last_accepted_code: Some("A1234567".to_string()),
            ..ScanState::default()
        };
        assert_eq!(
            evaluate(&batch_of(&["A1234567"]), &state),
            ScanDecision::Rejected(RejectReason::Duplicate)
        );
        // A different code is still fine.
        assert_eq!(
            evaluate(&batch_of(&["B7654321"]), &state),
            ScanDecision::Accepted("B7654321".to_string())
        );

        state.last_accepted_code = None;
        assert_eq!(
            evaluate(&batch_of(&["A1234567"]), &state),
            ScanDecision::Accepted("A1234567".to_string())
        );
    }

    #[test]
    fn begin_cycle_bumps_the_cycle_id_and_sets_the_guard() {
        let mut state = ScanState::default();
        let first = state.begin_cycle();
        assert!(state.is_processing);
        state.finish_cycle();
        let second = state.begin_cycle();
        assert!(second > first);
    }
}
