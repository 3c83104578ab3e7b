use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::location::{GeolocationProvider, LocationFix};
use crate::models::{
    is_valid_subject_id, AttendanceRecord, DetectedCode, DetectionBatch, FrameSize, InsertStatus,
};
use crate::store::AttendanceStore;

use super::config::{LocationJoinPolicy, RecorderConfig};
use super::debounce::{evaluate, RejectReason, ScanDecision, ScanState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

struct Outputs {
    detected: watch::Sender<Vec<DetectedCode>>,
    frame: watch::Sender<FrameSize>,
    insert_status: watch::Sender<InsertStatus>,
    history: watch::Sender<Vec<AttendanceRecord>>,
}

enum CycleOutcome {
    Written(AttendanceRecord),
    InvalidSubjectId,
    WriteFailed,
}

/// Turns accepted scans into validated, geolocated, persisted attendance
/// records and publishes the outcome to observers.
///
/// At most one write cycle runs at a time: the debouncer drops batches while
/// `ScanState::is_processing` is held, and the guard is released on every
/// exit path of the cycle.
#[derive(Clone)]
pub struct AttendanceRecorder {
    state: Arc<Mutex<ScanState>>,
    history: Arc<Mutex<Vec<AttendanceRecord>>>,
    store: Arc<dyn AttendanceStore>,
    location: Arc<dyn GeolocationProvider>,
    config: RecorderConfig,
    outputs: Arc<Outputs>,
    shutdown: CancellationToken,
}

impl AttendanceRecorder {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        location: Arc<dyn GeolocationProvider>,
        config: RecorderConfig,
    ) -> Self {
        let (detected, _) = watch::channel(Vec::new());
        let (frame, _) = watch::channel(FrameSize::default());
        let (insert_status, _) = watch::channel(InsertStatus::Idle);
        let (history, _) = watch::channel(Vec::new());

        Self {
            state: Arc::new(Mutex::new(ScanState::default())),
            history: Arc::new(Mutex::new(Vec::new())),
            store,
            location,
            config,
            outputs: Arc::new(Outputs {
                detected,
                frame,
                insert_status,
                history,
            }),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn detected_codes(&self) -> watch::Receiver<Vec<DetectedCode>> {
        self.outputs.detected.subscribe()
    }

    pub fn frame_size(&self) -> watch::Receiver<FrameSize> {
        self.outputs.frame.subscribe()
    }

    pub fn insert_status(&self) -> watch::Receiver<InsertStatus> {
        self.outputs.insert_status.subscribe()
    }

    pub fn history(&self) -> watch::Receiver<Vec<AttendanceRecord>> {
        self.outputs.history.subscribe()
    }

    /// Seeds the in-memory history, e.g. with the records already registered
    /// today when the screen reopens.
    pub async fn preload_history(&self, records: Vec<AttendanceRecord>) {
        let mut history = self.history.lock().await;
        *history = records;
        self.outputs.history.send_replace(history.clone());
    }

    /// Cancels pending cool-down resets, location subscriptions and late fix
    /// merges. Call when the owning screen goes away.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Feeds one frame's detections through the pipeline. Rejected batches
    /// are silent non-events; an accepted batch runs a full write cycle
    /// before this returns.
    pub async fn submit_batch(&self, batch: DetectionBatch) {
        let accepted = {
            let mut state = self.state.lock().await;
            let decision = evaluate(&batch, &state);

            // While a write is in flight the batch is dropped without even
            // touching the detection display.
            if decision == ScanDecision::Rejected(RejectReason::InFlight) {
                return;
            }

            self.outputs.detected.send_replace(batch.codes.clone());
            self.outputs.frame.send_replace(FrameSize {
                width: batch.frame_width,
                height: batch.frame_height,
            });

            match decision {
                ScanDecision::Accepted(code) => {
                    let cycle = state.begin_cycle();
                    Some((code, cycle))
                }
                ScanDecision::Rejected(_) => None,
            }
        };

        let Some((code, cycle)) = accepted else {
            return;
        };

        log_info!("detected code {code}, starting attendance cycle {cycle}");

        // The cycle runs on its own task so a caller dropping this future
        // cannot leave the single-flight guard held.
        let recorder = self.clone();
        let handle = tokio::spawn(async move { recorder.run_cycle(code, cycle).await });
        let _ = handle.await;
    }

    async fn run_cycle(self, code: String, cycle: u64) {
        let mut fix_rx = self.spawn_fix_listener();

        let outcome = self.attempt_write(&code, &mut fix_rx).await;

        match outcome {
            CycleOutcome::Written(record) => {
                let needs_fix = !record.has_location();
                let record_id = record.id.clone();

                {
                    let mut history = self.history.lock().await;
                    history.push(record);
                    self.outputs.history.send_replace(history.clone());
                }

                let mut state = self.state.lock().await;
                state.last_accepted_code = Some(code.clone());
                self.outputs.insert_status.send_replace(InsertStatus::Success);
                self.schedule_cooldown_reset(code);
                state.finish_cycle();
                drop(state);

                if needs_fix {
                    self.spawn_late_fix_merge(record_id, cycle, fix_rx);
                }
            }
            CycleOutcome::InvalidSubjectId | CycleOutcome::WriteFailed => {
                let mut state = self.state.lock().await;
                self.outputs.insert_status.send_replace(InsertStatus::Failure);
                state.finish_cycle();
            }
        }

        self.outputs.detected.send_replace(Vec::new());
    }

    async fn attempt_write(
        &self,
        code: &str,
        fix_rx: &mut watch::Receiver<Option<LocationFix>>,
    ) -> CycleOutcome {
        if !is_valid_subject_id(code) {
            log_warn!("rejecting subject id '{code}': length must be 8 or 9");
            return CycleOutcome::InvalidSubjectId;
        }

        let mut record = AttendanceRecord::from_scan(code, &self.config.template, Utc::now());

        let fix = match self.config.location_join {
            // Historical behavior: take whatever fix has arrived so far and
            // let the write race the location request.
            LocationJoinPolicy::BestEffort => *fix_rx.borrow(),
            LocationJoinPolicy::AwaitWithTimeout(limit) => {
                match timeout(limit, fix_rx.wait_for(|fix| fix.is_some())).await {
                    Ok(Ok(guard)) => *guard,
                    // Timed out, or the listener went away without a fix.
                    _ => None,
                }
            }
        };
        if let Some(fix) = fix {
            apply_fix(&mut record, fix);
        }

        match self.store.insert(&record).await {
            Ok(true) => {
                log_info!("attendance registered for {code} (record {})", record.id);
                CycleOutcome::Written(record)
            }
            Ok(false) => {
                log_error!("store declined attendance record for {code}");
                CycleOutcome::WriteFailed
            }
            Err(err) => {
                log_error!("attendance write failed for {code}: {err}");
                CycleOutcome::WriteFailed
            }
        }
    }

    /// Starts a one-fix location request and mirrors its result into a
    /// per-cycle watch channel. The channel closes without a value if the
    /// provider delivers nothing before shutdown.
    fn spawn_fix_listener(&self) -> watch::Receiver<Option<LocationFix>> {
        let (tx, rx) = watch::channel(None);
        let request = self.location.request_one_fix(&self.config.fix_request);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                fix = request.recv() => {
                    if let Some(fix) = fix {
                        let _ = tx.send(Some(fix));
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });

        rx
    }

    /// After the cool-down the accepted code becomes scannable again. The
    /// reset only applies while the code is still the most recent one.
    fn schedule_cooldown_reset(&self, code: String) {
        let state = self.state.clone();
        let cooldown = self.config.cooldown;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(cooldown) => {
                    let mut state = state.lock().await;
                    if state.last_accepted_code.as_deref() == Some(code.as_str()) {
                        state.last_accepted_code = None;
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    /// A record written before its fix arrived gets the coordinates merged
    /// into its history entry once they show up, but only while the cycle
    /// that produced it is still the current one.
    fn spawn_late_fix_merge(
        &self,
        record_id: String,
        cycle: u64,
        mut fix_rx: watch::Receiver<Option<LocationFix>>,
    ) {
        let recorder = self.clone();

        tokio::spawn(async move {
            let fix = tokio::select! {
                result = fix_rx.wait_for(|fix| fix.is_some()) => match result {
                    Ok(guard) => *guard,
                    Err(_) => return,
                },
                _ = recorder.shutdown.cancelled() => return,
            };
            let Some(fix) = fix else { return };

            {
                let state = recorder.state.lock().await;
                if state.cycle != cycle {
                    return;
                }
            }

            let mut history = recorder.history.lock().await;
            if let Some(record) = history.iter_mut().find(|record| record.id == record_id) {
                apply_fix(record, fix);
                recorder.outputs.history.send_replace(history.clone());
                log_info!("merged late location fix into record {record_id}");
            }
        });
    }
}

fn apply_fix(record: &mut AttendanceRecord, fix: LocationFix) {
    record.latitude = Some(fix.latitude.to_string());
    record.longitude = Some(fix.longitude.to_string());
}
