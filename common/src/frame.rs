use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Attribute list the labeling tool writes for a frame with no scene attributes.
pub const EMPTY_ANNOTATION: [&str; 1] = [""];

/// Tracked objects of one frame keyed by object id.
///
/// Ordered so that every per-frame pass over the objects (and every set
/// difference derived from them) visits ids lexicographically.
pub type ObjectMap = BTreeMap<String, ObjectAnnotation>;

/// One element of the labeling tool's JSON export.
///
/// `Label` is left undecoded: the event differ reads it as an object map,
/// the scene tool reads a flat attribute list out of it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "Labeled Data")]
    pub labeled_data: String,
    #[serde(rename = "Frame")]
    frame: FrameField,
    #[serde(rename = "Label")]
    pub label: Value,
}

/// The export writes frame numbers either as integers or as decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FrameField {
    Number(u64),
    Text(String),
}

/// A frame projected for the event differ.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub media_id: String,
    pub frame_number: u64,
    pub objects: ObjectMap,
}

/// A frame projected for the scene interval tool.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFrame {
    pub media_id: String,
    pub frame_number: u64,
    pub attributes: Vec<String>,
}

/// One tracked object's state in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAnnotation {
    pub class: String,
    pub attributes: ObjectAttributes,
}

/// The four fixed annotation keys plus whatever free-form keys the
/// labeling project defines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    pub explicit: bool,
    pub implicit: bool,
    #[serde(deserialize_with = "null_as_empty")]
    pub explicit_attributes: Vec<Value>,
    #[serde(deserialize_with = "null_as_empty")]
    pub implicit_attributes: Vec<Value>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ObjectAnnotation {
    /// True when the annotator touched this object in this frame, either by
    /// setting the explicit flag or by editing explicit attributes.
    pub fn is_explicit(&self) -> bool {
        self.attributes.explicit || !self.attributes.explicit_attributes.is_empty()
    }

    /// Presence of explicit, explicit_attributes, implicit, implicit_attributes.
    pub fn flags(&self) -> [bool; 4] {
        let a = &self.attributes;
        [
            a.explicit,
            !a.explicit_attributes.is_empty(),
            a.implicit,
            !a.implicit_attributes.is_empty(),
        ]
    }

    /// Values of the free-form attribute keys, in key order.
    pub fn free_form_values(&self) -> Vec<String> {
        self.attributes
            .other
            .values()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

impl RawFrame {
    pub fn frame_number(&self) -> Result<u64, FrameError> {
        match &self.frame {
            FrameField::Number(n) => Ok(*n),
            FrameField::Text(s) => s.trim().parse().map_err(|_| FrameError::Malformed {
                media_id: self.labeled_data.clone(),
                frame: s.clone(),
                reason: "frame number is not a non-negative integer".into(),
            }),
        }
    }

    /// Project into the object map consumed by the event differ.
    pub fn into_record(self) -> Result<FrameRecord, FrameError> {
        let frame_number = self.frame_number()?;
        let objects: ObjectMap =
            serde_json::from_value(self.label).map_err(|e| FrameError::Malformed {
                media_id: self.labeled_data.clone(),
                frame: frame_number.to_string(),
                reason: e.to_string(),
            })?;
        Ok(FrameRecord {
            media_id: self.labeled_data,
            frame_number,
            objects,
        })
    }

    /// Project into the scene attribute list stored under `Label["0"]["attributes"]`.
    pub fn scene_attributes(&self) -> Result<SceneFrame, FrameError> {
        let frame_number = self.frame_number()?;
        let malformed = |reason: String| FrameError::Malformed {
            media_id: self.labeled_data.clone(),
            frame: frame_number.to_string(),
            reason,
        };
        let raw = self
            .label
            .get("0")
            .and_then(|scene| scene.get("attributes"))
            .ok_or_else(|| malformed("missing Label.0.attributes".into()))?;
        let attributes: Vec<String> =
            serde_json::from_value(raw.clone()).map_err(|e| malformed(e.to_string()))?;
        Ok(SceneFrame {
            media_id: self.labeled_data.clone(),
            frame_number,
            attributes,
        })
    }
}

/// Read and parse a whole JSON export.
pub fn load_frames(path: &Path) -> Result<Vec<RawFrame>, FrameError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FrameError::ReadFile(path.display().to_string(), e))?;
    let frames: Vec<RawFrame> = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), frames = frames.len(), "loaded annotation export");
    Ok(frames)
}

/// Last path component of a media locator, e.g. the file name of a video URL.
pub fn media_short_name(locator: &str) -> &str {
    locator.rsplit('/').next().unwrap_or(locator)
}

/// True for the attribute list the labeling tool uses to mean "no attributes".
pub fn is_empty_annotation(attributes: &[String]) -> bool {
    attributes.len() == EMPTY_ANNOTATION.len()
        && attributes.iter().zip(EMPTY_ANNOTATION).all(|(a, b)| a == b)
}

pub fn empty_annotation() -> Vec<String> {
    EMPTY_ANNOTATION.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to read annotations file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse annotations: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed frame {frame} of {media_id}: {reason}")]
    Malformed {
        media_id: String,
        frame: String,
        reason: String,
    },
}
