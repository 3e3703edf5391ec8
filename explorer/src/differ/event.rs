use label_diff_common::frame::ObjectAnnotation;
use serde::Serialize;

/// A change in the annotation stream, reported at the frame it applies to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    MediaStart {
        media_id: String,
        frame_number: u64,
    },
    /// `frame_number` is the last annotated frame of the media file.
    MediaEnd {
        media_id: String,
        frame_number: u64,
    },
    ObjectAppear {
        media_id: String,
        frame_number: u64,
        object_id: String,
        object: ObjectAnnotation,
    },
    /// `frame_number` is the last frame the object was seen in.
    ObjectDisappear {
        media_id: String,
        frame_number: u64,
        object_id: String,
        object: ObjectAnnotation,
    },
    ObjectExplicitChange {
        media_id: String,
        frame_number: u64,
        object_id: String,
        object: ObjectAnnotation,
    },
}

impl Event {
    pub fn media_id(&self) -> &str {
        match self {
            Event::MediaStart { media_id, .. }
            | Event::MediaEnd { media_id, .. }
            | Event::ObjectAppear { media_id, .. }
            | Event::ObjectDisappear { media_id, .. }
            | Event::ObjectExplicitChange { media_id, .. } => media_id,
        }
    }

    pub fn frame_number(&self) -> u64 {
        match self {
            Event::MediaStart { frame_number, .. }
            | Event::MediaEnd { frame_number, .. }
            | Event::ObjectAppear { frame_number, .. }
            | Event::ObjectDisappear { frame_number, .. }
            | Event::ObjectExplicitChange { frame_number, .. } => *frame_number,
        }
    }

    /// Object id for the three per-object variants.
    pub fn object_id(&self) -> Option<&str> {
        match self {
            Event::ObjectAppear { object_id, .. }
            | Event::ObjectDisappear { object_id, .. }
            | Event::ObjectExplicitChange { object_id, .. } => Some(object_id),
            Event::MediaStart { .. } | Event::MediaEnd { .. } => None,
        }
    }
}
