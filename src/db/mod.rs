//! SQLite-backed attendance store.
//!
//! A dedicated worker thread owns the `rusqlite::Connection`; callers hand
//! it closures over an mpsc channel and await the reply on a oneshot. This
//! keeps all database access off the async runtime without a connection
//! pool.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{AttendanceRecord, Direction};
use crate::store::{AttendanceStore, StorageError};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn direction_from_str(value: &str) -> Result<Direction, rusqlite::Error> {
    match value {
        "E" => Ok(Direction::Entry),
        "S" => Ok(Direction::Exit),
        _ => Err(rusqlite::Error::InvalidColumnType(
            0,
            format!("unknown direction '{value}'"),
            rusqlite::types::Type::Text,
        )),
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("scanmark-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| StorageError::Worker(format!("failed to send command: {err}")))?;

        reply_rx
            .await
            .map_err(|_| StorageError::Worker("database thread terminated".to_string()))?
    }

    /// Writes one attendance record. Returns `Ok(false)` when the subject is
    /// already registered for the same date, activity and direction.
    pub async fn insert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<bool, StorageError> {
        let record = record.clone();
        let created_at = Utc::now().to_rfc3339();
        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO attendance
                     (id, cui, cui_type, date, registered_at, attendance_type, score,
                      activity_id, subactivity_id, direction, offline, latitude, longitude,
                      created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.id,
                    record.cui,
                    record.cui_type,
                    record.date,
                    record.registered_at,
                    record.attendance_type,
                    record.score,
                    record.activity_id,
                    record.subactivity_id,
                    record.direction.as_str(),
                    record.offline as i64,
                    record.latitude,
                    record.longitude,
                    created_at,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    /// Loads the records registered on one date, in insertion order, so a
    /// reopening screen can repopulate its history list.
    pub async fn attendance_for_date(
        &self,
        date: &str,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let date = date.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, cui, cui_type, date, registered_at, attendance_type, score,
                        activity_id, subactivity_id, direction, offline, latitude, longitude
                 FROM attendance
                 WHERE date = ?1
                 ORDER BY rowid ASC",
            )?;

            let mut rows = stmt.query(params![date])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(AttendanceRecord {
                    id: row.get(0)?,
                    cui: row.get(1)?,
                    cui_type: row.get(2)?,
                    date: row.get(3)?,
                    registered_at: row.get(4)?,
                    attendance_type: row.get(5)?,
                    score: row.get(6)?,
                    activity_id: row.get(7)?,
                    subactivity_id: row.get(8)?,
                    direction: direction_from_str(&row.get::<_, String>(9)?)?,
                    offline: row.get::<_, i64>(10)? != 0,
                    latitude: row.get(11)?,
                    longitude: row.get(12)?,
                });
            }

            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl AttendanceStore for Database {
    async fn insert(&self, record: &AttendanceRecord) -> Result<bool, StorageError> {
        self.insert_attendance(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordTemplate;
    use uuid::Uuid;

    fn temp_db() -> Database {
        let path = std::env::temp_dir().join(format!("scanmark-test-{}.sqlite3", Uuid::new_v4()));
        Database::new(path).expect("database should open")
    }

    fn record(cui: &str) -> AttendanceRecord {
        AttendanceRecord::from_scan(cui, &RecordTemplate::default(), Utc::now())
    }

    #[tokio::test]
    async fn path_returns_the_backing_file() {
        let path = std::env::temp_dir().join(format!("scanmark-test-{}.sqlite3", Uuid::new_v4()));
        let db = Database::new(path.clone()).expect("database should open");
        assert_eq!(db.path(), path.as_path());
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let db = temp_db();
        let mut rec = record("A1234567");
        rec.latitude = Some("-11.95".to_string());
        rec.longitude = Some("-76.84".to_string());

        assert!(db.insert_attendance(&rec).await.unwrap());

        let stored = db.attendance_for_date(&rec.date).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], rec);
    }

    #[tokio::test]
    async fn duplicate_registration_is_declined() {
        let db = temp_db();
        let first = record("A1234567");
        let second = record("A1234567");

        assert!(db.insert_attendance(&first).await.unwrap());
        assert!(!db.insert_attendance(&second).await.unwrap());

        let stored = db.attendance_for_date(&first.date).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn records_without_location_round_trip() {
        let db = temp_db();
        let rec = record("123456789");

        assert!(db.insert_attendance(&rec).await.unwrap());

        let stored = db.attendance_for_date(&rec.date).await.unwrap();
        assert!(stored[0].latitude.is_none());
        assert!(stored[0].longitude.is_none());
    }
}
