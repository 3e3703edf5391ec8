mod differ;
mod sink;

use std::io::{self, BufWriter};
use std::path::PathBuf;

use label_diff_common::config::{Config, OutputFormat};
use label_diff_common::frame::{load_frames, media_short_name};
use sink::{EventSink, JsonSink, TextSink};
use tracing::{debug, error, info};

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(annotations_path) = args.next().map(PathBuf::from) else {
        eprintln!("Usage: label-diff-explorer <annotations.json> [config.toml]");
        std::process::exit(2);
    };
    let config_path = args.next().map(PathBuf::from);

    let config = match Config::load_or_default(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    // Validated by Config::load; a default config is always text.
    let format = config.output.format().unwrap_or(OutputFormat::Text);

    info!(path = %annotations_path.display(), ?format, "opening annotations");
    let frames = match load_frames(&annotations_path) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "failed to load annotations");
            std::process::exit(1);
        }
    };

    let stdout = BufWriter::new(io::stdout().lock());
    let mut sink: Box<dyn EventSink> = match format {
        OutputFormat::Text => Box::new(TextSink::new(stdout)),
        OutputFormat::Json => Box::new(JsonSink::new(stdout)),
    };

    match run(frames, sink.as_mut()) {
        Ok(media) => {
            let names: Vec<&str> = media.iter().map(|m| media_short_name(m)).collect();
            info!(media_files = names.len(), files = ?names, "done");
        }
        Err(e) => {
            error!(error = %e, "aborting");
            std::process::exit(1);
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Diff(#[from] differ::DiffError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Diff every frame into `sink`. Returns the media locators seen, in
/// first-seen order.
fn run(
    frames: Vec<label_diff_common::frame::RawFrame>,
    sink: &mut dyn EventSink,
) -> Result<Vec<String>, RunError> {
    let mut media: Vec<String> = Vec::new();
    for event in differ::process(frames.into_iter().map(|f| f.into_record())) {
        let event = event?;
        debug!(
            media = media_short_name(event.media_id()),
            frame = event.frame_number(),
            object = ?event.object_id(),
            "event"
        );
        if matches!(event, differ::Event::MediaStart { .. }) {
            let media_id = event.media_id();
            info!(media = media_short_name(media_id), "processing annotations for media file");
            if !media.iter().any(|m| m == media_id) {
                media.push(media_id.to_string());
            }
        }
        sink.emit(&event)?;
    }
    sink.finish()?;
    Ok(media)
}
