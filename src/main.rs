//! Replay demo: feeds a handful of synthetic detection batches through the
//! pipeline against a temporary SQLite database and a simulated location
//! provider, then prints the registered history.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::info;
use tokio::time::sleep;
use uuid::Uuid;

use scanmark::{
    AttendanceRecorder, Database, DetectedCode, DetectionBatch, FixRequest, FixRequestSettings,
    GeolocationProvider, LocationFix, RecorderConfig,
};

/// Pretends to be a location backend: delivers one fix shortly after each
/// subscription.
struct SimulatedProvider;

impl GeolocationProvider for SimulatedProvider {
    fn request_one_fix(&self, _settings: &FixRequestSettings) -> FixRequest {
        let (sender, request) = FixRequest::channel();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            if !sender.is_cancelled() {
                sender.send(LocationFix {
                    latitude: -11.9497,
                    longitude: -76.8416,
                });
            }
        });
        request
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let db_path = std::env::temp_dir().join(format!("scanmark-demo-{}.sqlite3", Uuid::new_v4()));
    let database = Database::new(db_path)?;
    info!("demo database at {}", database.path().display());

    let recorder = AttendanceRecorder::new(
        Arc::new(database.clone()),
        Arc::new(SimulatedProvider),
        RecorderConfig::default(),
    );

    // Repopulate the "registered today" list, as a reopening screen would.
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let registered_today = database.attendance_for_date(&today).await?;
    info!("{} records already registered today", registered_today.len());
    recorder.preload_history(registered_today).await;

    let mut status = recorder.insert_status();

    let batches = vec![
        DetectionBatch::single("A1234567"),
        // Ambiguous frame: two codes at once, silently dropped.
        DetectionBatch {
            codes: vec![
                DetectedCode::with_value("A1234567"),
                DetectedCode::with_value("B7654321"),
            ],
            frame_width: 640,
            frame_height: 480,
        },
        // Duplicate inside the cool-down, silently dropped.
        DetectionBatch::single("A1234567"),
        // Fails validation: subject id too short.
        DetectionBatch::single("12"),
        DetectionBatch::single("B7654321"),
    ];

    for batch in batches {
        let codes: Vec<_> = batch
            .codes
            .iter()
            .filter_map(|code| code.value.clone())
            .collect();
        recorder.submit_batch(batch).await;
        info!(
            "submitted {codes:?} -> status {:?}",
            *status.borrow_and_update()
        );
    }

    // Give the simulated fixes time to merge into the history.
    sleep(Duration::from_millis(500)).await;

    for record in recorder.history().borrow().iter() {
        info!(
            "registered: cui={} at {} {} location=({:?}, {:?})",
            record.cui, record.date, record.registered_at, record.latitude, record.longitude
        );
    }

    recorder.shutdown();
    Ok(())
}
