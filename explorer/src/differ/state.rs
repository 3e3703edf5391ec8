use label_diff_common::frame::{FrameRecord, ObjectMap};
use tracing::debug;

use super::event::Event;

/// Snapshot of the last frame seen for the media file currently being diffed.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferState {
    pub media_id: String,
    pub frame_number: u64,
    pub objects: ObjectMap,
    /// Frames seen so far for this media file. Diagnostic only.
    pub frames_seen: u64,
}

impl DifferState {
    /// Replace `prev` with `frame`, carrying the frame counter forward when
    /// the media file is unchanged.
    pub fn advance(prev: Option<&DifferState>, frame: FrameRecord) -> Self {
        let frames_seen = match prev {
            Some(p) if p.media_id == frame.media_id => p.frames_seen + 1,
            _ => 1,
        };
        Self {
            media_id: frame.media_id,
            frame_number: frame.frame_number,
            objects: frame.objects,
            frames_seen,
        }
    }

    /// Events closing this media file: every remaining object disappears
    /// at the last seen frame, then the media ends there.
    pub fn close(&self) -> Vec<Event> {
        debug!(
            media_id = self.media_id,
            last_frame = self.frame_number,
            frames_seen = self.frames_seen,
            open_objects = self.objects.len(),
            "closing media segment"
        );
        let mut events: Vec<Event> = self
            .objects
            .iter()
            .map(|(object_id, object)| Event::ObjectDisappear {
                media_id: self.media_id.clone(),
                frame_number: self.frame_number,
                object_id: object_id.clone(),
                object: object.clone(),
            })
            .collect();
        events.push(Event::MediaEnd {
            media_id: self.media_id.clone(),
            frame_number: self.frame_number,
        });
        events
    }
}
