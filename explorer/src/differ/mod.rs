//! Turns a stream of per-frame object annotations into a log of discrete
//! events: media files starting and ending, objects appearing and
//! disappearing, and objects being explicitly re-annotated.
//!
//! Frames are consumed strictly in input order. Only the previous frame of
//! the current media file is kept; a change of media id closes the previous
//! file before the new one is opened.

pub mod event;
pub mod state;

use std::collections::VecDeque;
use std::iter::FusedIterator;

use label_diff_common::frame::{FrameError, FrameRecord};
use tracing::{debug, info};

pub use event::Event;
pub use state::DifferState;

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A frame opening a media file carries an object the annotator never
    /// marked explicitly. The labeling tool always marks these, so the
    /// export is corrupt.
    #[error(
        "object {object_id} at frame {frame_number} of {media_id} opens the media file \
         without an explicit annotation"
    )]
    NotExplicit {
        media_id: String,
        frame_number: u64,
        object_id: String,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Stateful event differ. Holds the previous frame of the current media file.
#[derive(Debug, Default)]
pub struct Differ {
    state: Option<DifferState>, // None until the first frame
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&DifferState> {
        self.state.as_ref()
    }

    /// Compare `frame` against the previous frame and return the resulting
    /// events. On error nothing is emitted for `frame` and the state is
    /// unchanged.
    pub fn process_frame(&mut self, frame: FrameRecord) -> Result<Vec<Event>, DiffError> {
        let events = match &self.state {
            None => {
                info!(media_id = frame.media_id, frame = frame.frame_number, "first frame, opening media");
                open_media(&frame)?
            }
            Some(prev) if prev.media_id != frame.media_id => {
                ensure_explicit(&frame)?;
                info!(
                    from = prev.media_id,
                    to = frame.media_id,
                    frame = frame.frame_number,
                    "media changed"
                );
                let mut events = prev.close();
                events.extend(open_media(&frame)?);
                events
            }
            Some(prev) => continue_media(prev, &frame),
        };

        debug!(
            media_id = frame.media_id,
            frame = frame.frame_number,
            objects = frame.objects.len(),
            events = events.len(),
            "frame diffed"
        );
        self.state = Some(DifferState::advance(self.state.as_ref(), frame));
        Ok(events)
    }

    /// Close the current media file. Emits nothing when no frame was ever
    /// processed. The differ is reset and can be reused afterwards.
    pub fn flush(&mut self) -> Vec<Event> {
        self.state
            .take()
            .map(|last| last.close())
            .unwrap_or_default()
    }
}

/// Lazily diff `frames`, flushing the last media file once the input is
/// exhausted. Stops after the first error.
pub fn process<I>(frames: I) -> Events<I::IntoIter>
where
    I: IntoIterator<Item = Result<FrameRecord, FrameError>>,
{
    Events {
        frames: frames.into_iter(),
        differ: Differ::new(),
        pending: VecDeque::new(),
        finished: false,
    }
}

/// Iterator returned by [`process`].
pub struct Events<I> {
    frames: I,
    differ: Differ,
    pending: VecDeque<Event>,
    finished: bool,
}

impl<I> Iterator for Events<I>
where
    I: Iterator<Item = Result<FrameRecord, FrameError>>,
{
    type Item = Result<Event, DiffError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            let step = match self.frames.next() {
                Some(Ok(frame)) => self.differ.process_frame(frame),
                Some(Err(e)) => Err(e.into()),
                None => {
                    self.finished = true;
                    Ok(self.differ.flush())
                }
            };
            match step {
                Ok(events) => self.pending.extend(events),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<I> FusedIterator for Events<I> where I: Iterator<Item = Result<FrameRecord, FrameError>> {}

fn ensure_explicit(frame: &FrameRecord) -> Result<(), DiffError> {
    match frame.objects.iter().find(|(_, obj)| !obj.is_explicit()) {
        Some((object_id, _)) => Err(DiffError::NotExplicit {
            media_id: frame.media_id.clone(),
            frame_number: frame.frame_number,
            object_id: object_id.clone(),
        }),
        None => Ok(()),
    }
}

/// Start of a media file: every object appears, then every object is
/// reported as explicitly annotated.
fn open_media(frame: &FrameRecord) -> Result<Vec<Event>, DiffError> {
    ensure_explicit(frame)?;

    let mut events = Vec::with_capacity(1 + 2 * frame.objects.len());
    events.push(Event::MediaStart {
        media_id: frame.media_id.clone(),
        frame_number: frame.frame_number,
    });
    for (object_id, object) in &frame.objects {
        events.push(Event::ObjectAppear {
            media_id: frame.media_id.clone(),
            frame_number: frame.frame_number,
            object_id: object_id.clone(),
            object: object.clone(),
        });
    }
    for (object_id, object) in &frame.objects {
        events.push(Event::ObjectExplicitChange {
            media_id: frame.media_id.clone(),
            frame_number: frame.frame_number,
            object_id: object_id.clone(),
            object: object.clone(),
        });
    }
    Ok(events)
}

/// Next frame of the same media file. Emits explicit changes, then objects
/// gone since `prev` (at the frame they were last seen), then new objects.
fn continue_media(prev: &DifferState, frame: &FrameRecord) -> Vec<Event> {
    let explicit = frame
        .objects
        .iter()
        .filter(|(_, obj)| obj.is_explicit())
        .map(|(object_id, object)| Event::ObjectExplicitChange {
            media_id: frame.media_id.clone(),
            frame_number: frame.frame_number,
            object_id: object_id.clone(),
            object: object.clone(),
        });

    let disappearing = prev
        .objects
        .iter()
        .filter(|(id, _)| !frame.objects.contains_key(*id))
        .map(|(object_id, object)| Event::ObjectDisappear {
            media_id: frame.media_id.clone(),
            frame_number: prev.frame_number,
            object_id: object_id.clone(),
            object: object.clone(),
        });

    let appearing = frame
        .objects
        .iter()
        .filter(|(id, _)| !prev.objects.contains_key(*id))
        .map(|(object_id, object)| Event::ObjectAppear {
            media_id: frame.media_id.clone(),
            frame_number: frame.frame_number,
            object_id: object_id.clone(),
            object: object.clone(),
        });

    explicit.chain(disappearing).chain(appearing).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use label_diff_common::frame::{ObjectAnnotation, ObjectAttributes};
    use std::collections::BTreeMap;

    pub(crate) fn obj(class: &str, explicit: bool) -> ObjectAnnotation {
        ObjectAnnotation {
            class: class.into(),
            attributes: ObjectAttributes {
                explicit,
                implicit: !explicit,
                explicit_attributes: vec![],
                implicit_attributes: vec![],
                other: BTreeMap::new(),
            },
        }
    }

    pub(crate) fn frame(media: &str, n: u64, objects: Vec<(&str, ObjectAnnotation)>) -> FrameRecord {
        FrameRecord {
            media_id: media.into(),
            frame_number: n,
            objects: objects
                .into_iter()
                .map(|(id, o)| (id.to_string(), o))
                .collect(),
        }
    }

    fn run(frames: Vec<FrameRecord>) -> Result<Vec<Event>, DiffError> {
        process(frames.into_iter().map(Ok)).collect()
    }

    /// Compact `(kind, media, frame, object)` view for order assertions.
    fn summary(events: &[Event]) -> Vec<(&'static str, String, u64, Option<String>)> {
        events
            .iter()
            .map(|e| {
                let kind = match e {
                    Event::MediaStart { .. } => "start",
                    Event::MediaEnd { .. } => "end",
                    Event::ObjectAppear { .. } => "appear",
                    Event::ObjectDisappear { .. } => "disappear",
                    Event::ObjectExplicitChange { .. } => "explicit",
                };
                (
                    kind,
                    e.media_id().to_string(),
                    e.frame_number(),
                    e.object_id().map(str::to_string),
                )
            })
            .collect()
    }

    fn ev(kind: &'static str, media: &str, n: u64, id: Option<&str>) -> (&'static str, String, u64, Option<String>) {
        (kind, media.to_string(), n, id.map(str::to_string))
    }

    #[test]
    fn media_switch_scenario() {
        let events = run(vec![
            frame("A", 0, vec![("1", obj("catX", true))]),
            frame("A", 5, vec![("1", obj("catX", false)), ("2", obj("catY", true))]),
            frame("B", 6, vec![("3", obj("catZ", true))]),
        ])
        .unwrap();

        assert_eq!(
            summary(&events),
            vec![
                ev("start", "A", 0, None),
                ev("appear", "A", 0, Some("1")),
                ev("explicit", "A", 0, Some("1")),
                ev("explicit", "A", 5, Some("2")),
                ev("appear", "A", 5, Some("2")),
                ev("disappear", "A", 5, Some("1")),
                ev("disappear", "A", 5, Some("2")),
                ev("end", "A", 5, None),
                ev("start", "B", 6, None),
                ev("appear", "B", 6, Some("3")),
                ev("explicit", "B", 6, Some("3")),
                ev("disappear", "B", 6, Some("3")),
                ev("end", "B", 6, None),
            ]
        );
    }

    #[test]
    fn disappear_is_keyed_at_last_seen_frame() {
        let events = run(vec![
            frame("A", 0, vec![("1", obj("cat", true)), ("2", obj("dog", true))]),
            frame("A", 4, vec![("1", obj("cat", false)), ("2", obj("dog", false))]),
            frame("A", 9, vec![("1", obj("cat", false))]),
        ])
        .unwrap();
        let gone: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::ObjectDisappear { .. }) && e.object_id() == Some("2"))
            .collect();
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].frame_number(), 4);
    }

    #[test]
    fn unchanged_object_set_only_reports_explicit_changes() {
        let mut differ = Differ::new();
        differ
            .process_frame(frame("A", 0, vec![("1", obj("cat", true)), ("2", obj("dog", true))]))
            .unwrap();
        let events = differ
            .process_frame(frame("A", 1, vec![("1", obj("cat", false)), ("2", obj("dog", true))]))
            .unwrap();
        assert_eq!(summary(&events), vec![ev("explicit", "A", 1, Some("2"))]);

        let events = differ
            .process_frame(frame("A", 2, vec![("1", obj("cat", false)), ("2", obj("dog", false))]))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn groups_ordered_explicit_disappear_appear() {
        let mut differ = Differ::new();
        differ
            .process_frame(frame("A", 0, vec![("b", obj("x", true)), ("d", obj("x", true))]))
            .unwrap();
        let events = differ
            .process_frame(frame(
                "A",
                1,
                vec![("a", obj("x", true)), ("c", obj("x", true)), ("d", obj("x", true))],
            ))
            .unwrap();
        assert_eq!(
            summary(&events),
            vec![
                ev("explicit", "A", 1, Some("a")),
                ev("explicit", "A", 1, Some("c")),
                ev("explicit", "A", 1, Some("d")),
                ev("disappear", "A", 0, Some("b")),
                ev("appear", "A", 1, Some("a")),
                ev("appear", "A", 1, Some("c")),
            ]
        );
    }

    #[test]
    fn every_appearance_is_closed() {
        let events = run(vec![
            frame("A", 0, vec![("1", obj("cat", true))]),
            frame("A", 1, vec![("2", obj("dog", true))]),
            frame("A", 2, vec![("1", obj("cat", true)), ("2", obj("dog", false))]),
            frame("A", 3, vec![("3", obj("cow", true))]),
        ])
        .unwrap();

        let mut appear: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::ObjectAppear { .. }))
            .filter_map(|e| e.object_id())
            .collect();
        let mut disappear: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::ObjectDisappear { .. }))
            .filter_map(|e| e.object_id())
            .collect();
        appear.sort();
        disappear.sort();
        assert_eq!(appear, vec!["1", "1", "2", "3"]);
        assert_eq!(appear, disappear);
        assert!(matches!(events.last(), Some(Event::MediaEnd { frame_number: 3, .. })));
    }

    #[test]
    fn cold_start_never_followed_by_disappear() {
        let events = run(vec![frame(
            "A",
            7,
            vec![("1", obj("cat", true)), ("2", obj("dog", true))],
        )])
        .unwrap();
        let opening = summary(&events[..5]);
        assert_eq!(
            opening,
            vec![
                ev("start", "A", 7, None),
                ev("appear", "A", 7, Some("1")),
                ev("appear", "A", 7, Some("2")),
                ev("explicit", "A", 7, Some("1")),
                ev("explicit", "A", 7, Some("2")),
            ]
        );
    }

    #[test]
    fn split_at_media_boundary_matches_single_run() {
        let a = vec![
            frame("A", 0, vec![("1", obj("cat", true))]),
            frame("A", 3, vec![("1", obj("cat", false)), ("2", obj("dog", true))]),
        ];
        let b = vec![
            frame("B", 0, vec![("9", obj("cow", true))]),
            frame("B", 2, vec![]),
        ];

        let whole = run(a.iter().chain(b.iter()).cloned().collect()).unwrap();
        let mut split = run(a).unwrap();
        split.extend(run(b).unwrap());
        assert_eq!(whole, split);
    }

    #[test]
    fn flush_without_frames_emits_nothing() {
        let mut differ = Differ::new();
        assert!(differ.flush().is_empty());
        assert!(run(vec![]).unwrap().is_empty());
    }

    #[test]
    fn flush_resets_differ() {
        let mut differ = Differ::new();
        differ
            .process_frame(frame("A", 0, vec![("1", obj("cat", true))]))
            .unwrap();
        assert_eq!(differ.flush().len(), 2);
        assert!(differ.state().is_none());
        assert!(differ.flush().is_empty());
    }

    #[test]
    fn cold_start_requires_explicit_objects() {
        let mut differ = Differ::new();
        let err = differ
            .process_frame(frame("A", 0, vec![("1", obj("cat", true)), ("2", obj("dog", false))]))
            .unwrap_err();
        assert!(matches!(
            err,
            DiffError::NotExplicit { ref object_id, frame_number: 0, .. } if object_id == "2"
        ));
        assert!(differ.state().is_none());
    }

    #[test]
    fn media_switch_requires_explicit_objects() {
        let mut differ = Differ::new();
        differ
            .process_frame(frame("A", 0, vec![("1", obj("cat", true))]))
            .unwrap();
        let err = differ
            .process_frame(frame("B", 0, vec![("5", obj("cat", false))]))
            .unwrap_err();
        assert!(matches!(err, DiffError::NotExplicit { ref media_id, .. } if media_id == "B"));
        assert_eq!(differ.state().map(|s| s.media_id.as_str()), Some("A"));
    }

    #[test]
    fn explicit_attributes_count_as_explicit() {
        let mut tagged = obj("cat", false);
        tagged.attributes.explicit_attributes = vec![serde_json::json!("color")];
        assert!(run(vec![frame("A", 0, vec![("1", tagged)])]).is_ok());
    }

    #[test]
    fn iterator_stops_after_error() {
        let frames = vec![
            Ok(frame("A", 0, vec![("1", obj("cat", true))])),
            Ok(frame("B", 1, vec![("2", obj("dog", false))])),
            Ok(frame("C", 2, vec![])),
        ];
        let results: Vec<_> = process(frames).collect();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(matches!(results[3], Err(DiffError::NotExplicit { .. })));
    }

    #[test]
    fn decode_error_is_surfaced() {
        let frames = vec![
            Ok(frame("A", 0, vec![])),
            Err(FrameError::Malformed {
                media_id: "A".into(),
                frame: "1".into(),
                reason: "missing class".into(),
            }),
        ];
        let results: Vec<_> = process(frames).collect();
        assert!(matches!(results.last(), Some(Err(DiffError::Frame(_)))));
        assert!(!results.iter().any(|r| matches!(r, Ok(Event::MediaEnd { .. }))));
    }
}
