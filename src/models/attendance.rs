use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the scan registers an entry into or an exit from the activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "E",
            Direction::Exit => "S",
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Entry
    }
}

/// Business fields copied into every record produced by one screen session.
/// Injected through `RecorderConfig` instead of being read from a global
/// session context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTemplate {
    pub cui_type: String,
    pub attendance_type: String,
    pub score: i32,
    pub activity_id: i64,
    pub subactivity_id: i64,
    pub direction: Direction,
    pub offline: bool,
}

impl Default for RecordTemplate {
    fn default() -> Self {
        Self {
            cui_type: "C.Universitario".to_string(),
            attendance_type: "inspección".to_string(),
            score: 5,
            activity_id: 0,
            subactivity_id: 0,
            direction: Direction::Entry,
            offline: false,
        }
    }
}

/// One attendance registration. Built fresh per accepted scan; latitude and
/// longitude arrive asynchronously and may still be absent when the record
/// reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub cui: String,
    pub cui_type: String,
    pub date: String,
    pub registered_at: String,
    pub attendance_type: String,
    pub score: i32,
    pub activity_id: i64,
    pub subactivity_id: i64,
    pub direction: Direction,
    pub offline: bool,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl AttendanceRecord {
    /// Builds a record for a freshly accepted code. Location fields start
    /// absent and are merged in by the recorder when a fix arrives.
    pub fn from_scan(cui: &str, template: &RecordTemplate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            cui: cui.to_string(),
            cui_type: template.cui_type.clone(),
            date: now.format("%Y-%m-%d").to_string(),
            registered_at: now.format("%H:%M").to_string(),
            attendance_type: template.attendance_type.clone(),
            score: template.score,
            activity_id: template.activity_id,
            subactivity_id: template.subactivity_id,
            direction: template.direction,
            offline: template.offline,
            latitude: None,
            longitude: None,
        }
    }

    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// The two subject-identifier formats in circulation are 8 and 9 characters
/// long; anything else never reaches the store.
pub fn is_valid_subject_id(cui: &str) -> bool {
    matches!(cui.chars().count(), 8 | 9)
}

/// Outcome of the most recent write attempt, as seen by observers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InsertStatus {
    Idle,
    Success,
    Failure,
}

impl Default for InsertStatus {
    fn default() -> Self {
        InsertStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_length_rules() {
        assert!(is_valid_subject_id("A1234567"));
        assert!(is_valid_subject_id("123456789"));
        assert!(!is_valid_subject_id("12"));
        assert!(!is_valid_subject_id(""));
        assert!(!is_valid_subject_id("1234567890"));
    }

    #[test]
    fn from_scan_fills_template_and_leaves_location_absent() {
        let template = RecordTemplate {
            activity_id: 42,
            ..RecordTemplate::default()
        };
        let now = "2026-08-27T14:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let record = AttendanceRecord::from_scan("A1234567", &template, now);

        assert_eq!(record.cui, "A1234567");
        assert_eq!(record.date, "2026-08-27");
        assert_eq!(record.registered_at, "14:30");
        assert_eq!(record.activity_id, 42);
        assert!(!record.has_location());
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let now = "2026-08-27T14:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let record = AttendanceRecord::from_scan("A1234567", &RecordTemplate::default(), now);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cui"], "A1234567");
        assert_eq!(json["cuiType"], "C.Universitario");
        assert_eq!(json["registeredAt"], "14:30");
        assert_eq!(json["direction"], "entry");
        assert!(json["latitude"].is_null());

        let back: AttendanceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn fresh_record_ids_differ() {
        let template = RecordTemplate::default();
        let now = Utc::now();
        let a = AttendanceRecord::from_scan("A1234567", &template, now);
        let b = AttendanceRecord::from_scan("A1234567", &template, now);
        assert_ne!(a.id, b.id);
    }
}
