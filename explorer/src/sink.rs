use std::io::{self, Write};

use label_diff_common::frame::ObjectAnnotation;

use crate::differ::Event;

/// Destination for differ events.
pub trait EventSink {
    fn emit(&mut self, event: &Event) -> io::Result<()>;

    /// Called once after the last event.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Human-readable event log, one line per event.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for TextSink<W> {
    fn emit(&mut self, event: &Event) -> io::Result<()> {
        match event {
            Event::MediaStart {
                media_id,
                frame_number,
            } => {
                writeln!(self.out)?;
                writeln!(
                    self.out,
                    "Starting new media: {media_id} starts at frame {frame_number}"
                )
            }
            Event::MediaEnd {
                media_id,
                frame_number,
            } => {
                writeln!(
                    self.out,
                    "Media ended: {media_id} last annotated frame was {frame_number}"
                )?;
                writeln!(self.out)
            }
            Event::ObjectAppear {
                frame_number,
                object_id,
                object,
                ..
            } => writeln!(
                self.out,
                "[-->  Object {object_id} ('{}') appears at frame {frame_number}",
                object.class
            ),
            Event::ObjectDisappear {
                frame_number,
                object_id,
                object,
                ..
            } => writeln!(
                self.out,
                " <--] Object {object_id} ('{}') disappears at frame {frame_number}",
                object.class
            ),
            Event::ObjectExplicitChange {
                frame_number,
                object_id,
                object,
                ..
            } => writeln!(
                self.out,
                " * Object {object_id} ('{}') is explicitly modified at frame {frame_number}: {}",
                object.class,
                describe_attributes(object)
            ),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// One JSON object per event per line.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for JsonSink<W> {
    fn emit(&mut self, event: &Event) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Four `Y`/`-` flags (explicit, explicit_attributes, implicit,
/// implicit_attributes) followed by the free-form attribute values.
fn describe_attributes(object: &ObjectAnnotation) -> String {
    let flags: String = object
        .flags()
        .iter()
        .map(|&set| if set { 'Y' } else { '-' })
        .collect();
    format!("{flags} {}", object.free_form_values().join(", "))
}
