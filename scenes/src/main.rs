mod intervals;
mod video;

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use intervals::{group_by_media, reconstruct, Interval};
use label_diff_common::config::{Config, OutputFormat};
use label_diff_common::frame::{load_frames, media_short_name, FrameError, SceneFrame};
use serde::Serialize;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let Some(scene_path) = args.next().map(PathBuf::from) else {
        eprintln!("Reads a scene annotation JSON export and prints the attribute intervals of each video.");
        eprintln!("Usage: label-diff-scenes <scene.json> [config.toml]");
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

    let format = config.output.format().unwrap_or(OutputFormat::Text);
    video::check_probe_available(&config.video).await;

    let frames = match read_scene_frames(&scene_path) {
        Ok(f) => f,
        Err(e) => {
            error!(path = %scene_path.display(), error = %e, "failed to read scene annotations");
            std::process::exit(1);
        }
    };

    let mut out = BufWriter::new(io::stdout().lock());
    let groups = group_by_media(frames);
    let result = if groups.is_empty() {
        writeln!(out, "No annotations found in file '{}'", scene_path.display())
    } else {
        write_all_groups(&mut out, groups, &config, format).await
    };

    if let Err(e) = result.and_then(|()| out.flush()) {
        error!(error = %e, "failed to write output");
        std::process::exit(1);
    }
}

/// Decode the export. A missing file is reported and treated as having no frames.
fn read_scene_frames(path: &Path) -> Result<Vec<SceneFrame>, FrameError> {
    if !path.exists() {
        warn!(path = %path.display(), "file does not exist");
        return Ok(Vec::new());
    }
    load_frames(path)?
        .iter()
        .map(|raw| raw.scene_attributes())
        .collect()
}

async fn write_all_groups<W: Write>(
    out: &mut W,
    groups: Vec<(String, Vec<SceneFrame>)>,
    config: &Config,
    format: OutputFormat,
) -> io::Result<()> {
    for (media_id, frames) in groups {
        let total_frames = video::frame_count(&media_id, &config.video).await;
        info!(
            media = media_short_name(&media_id),
            annotated_frames = frames.len(),
            total_frames,
            "reconstructing intervals"
        );
        let intervals = reconstruct(
            frames.into_iter().map(|f| (f.frame_number, f.attributes)),
            total_frames,
        );
        write_report(out, &media_id, total_frames, &intervals, format)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct IntervalLine<'a> {
    media_id: &'a str,
    total_frames: i64,
    #[serde(flatten)]
    interval: &'a Interval,
}

fn write_report<W: Write>(
    out: &mut W,
    media_id: &str,
    total_frames: i64,
    intervals: &[Interval],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "Video '{media_id}' has {total_frames} frames")?;
            for interval in intervals {
                writeln!(out, "{interval}")?;
            }
        }
        OutputFormat::Json => {
            for interval in intervals {
                let line = IntervalLine {
                    media_id,
                    total_frames,
                    interval,
                };
                serde_json::to_writer(&mut *out, &line)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}
