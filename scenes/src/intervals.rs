use std::fmt;
use std::iter;

use label_diff_common::frame::{empty_annotation, is_empty_annotation, SceneFrame};
use serde::Serialize;

/// Frame count used when the video length could not be determined.
pub const UNKNOWN_FRAME_COUNT: i64 = -1;

/// Frames `start_frame..=end_frame` of one media file share `attributes`.
///
/// `end_frame` of the last interval is the video's total frame count, or
/// [`UNKNOWN_FRAME_COUNT`] when that was not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start_frame: i64,
    pub end_frame: i64,
    pub attributes: Vec<String>,
}

impl Interval {
    /// False for the labeling tool's "no attributes" sentinel.
    pub fn has_attributes(&self) -> bool {
        !is_empty_annotation(&self.attributes)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frames {:4} - {:4} ", self.start_frame, self.end_frame)?;
        if self.has_attributes() {
            write!(f, "have attributes {:?}", self.attributes)
        } else {
            write!(f, "have no attributes")
        }
    }
}

/// Turn the annotated frames of a single media file into intervals.
///
/// Every input frame starts its own interval, which runs until the frame
/// before the next annotated one. Frames before the first annotation are
/// covered by an empty interval from frame 0; if the first annotation is
/// itself empty it is simply moved back to frame 0. Consecutive frames with
/// equal attributes are not merged.
pub fn reconstruct<I>(frames: I, total_frames: i64) -> Vec<Interval>
where
    I: IntoIterator<Item = (u64, Vec<String>)>,
{
    let mut starts: Vec<(i64, Vec<String>)> = frames
        .into_iter()
        .map(|(n, attributes)| (i64::try_from(n).unwrap_or(i64::MAX), attributes))
        .collect();

    let Some(first) = starts.first_mut() else {
        return Vec::new();
    };
    if first.0 > 0 {
        if is_empty_annotation(&first.1) {
            first.0 = 0;
        } else {
            starts.insert(0, (0, empty_annotation()));
        }
    }

    let ends: Vec<i64> = starts
        .iter()
        .skip(1)
        .map(|(n, _)| n - 1)
        .chain(iter::once(total_frames))
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .map(|((start_frame, attributes), end_frame)| Interval {
            start_frame,
            end_frame,
            attributes,
        })
        .collect()
}

/// Partition frames by media file, keeping first-seen order of files and
/// input order of frames within each file.
pub fn group_by_media(frames: Vec<SceneFrame>) -> Vec<(String, Vec<SceneFrame>)> {
    let mut groups: Vec<(String, Vec<SceneFrame>)> = Vec::new();
    for frame in frames {
        match groups.iter_mut().find(|(media, _)| *media == frame.media_id) {
            Some((_, group)) => group.push(frame),
            None => groups.push((frame.media_id.clone(), vec![frame])),
        }
    }
    groups
}
