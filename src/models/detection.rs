use serde::{Deserialize, Serialize};

/// Bounding box of a recognized symbol in camera frame coordinates.
/// Carried through for overlay rendering; the recording pipeline never
/// looks inside it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// One symbol recognized in a frame. `value` is absent when the decoder
/// could not read the symbol's payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCode {
    pub value: Option<String>,
    pub region: BoundingRegion,
}

impl DetectedCode {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            region: BoundingRegion::default(),
        }
    }

    pub fn unreadable() -> Self {
        Self::default()
    }
}

/// Everything one frame-analysis pass produced: the recognized codes plus
/// the analyzed frame dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionBatch {
    pub codes: Vec<DetectedCode>,
    pub frame_width: i32,
    pub frame_height: i32,
}

impl DetectionBatch {
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            codes: vec![DetectedCode::with_value(value)],
            frame_width: 0,
            frame_height: 0,
        }
    }
}

/// Frame dimensions snapshot published alongside the detection display.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FrameSize {
    pub width: i32,
    pub height: i32,
}
