use crate::error::ProcessingError;
use crate::source::SourceLocation;
use lumen_core::Dimension;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on one ffprobe run.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Facts about the first video stream that frame sampling needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    /// Display size: coded size with width and height swapped for a quarter-turn rotation.
    /// ffmpeg autorotates decoded frames, so this is the size frames come out at.
    pub size: Dimension,
    /// Total frames, from the container's frame count or `duration * fps`.
    pub length_in_frames: u32,
    pub frame_rate: Option<f64>,
}

/// Parse an ffmpeg rational such as `30000/1001`.
fn parse_rational(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn parse_str_number<T: std::str::FromStr>(value: &serde_json::Value) -> Option<T> {
    value.as_str().and_then(|s| s.trim().parse::<T>().ok())
}

/// Display rotation in degrees: the display matrix side data, else the legacy `rotate` tag.
fn stream_rotation(stream: &serde_json::Value) -> i64 {
    let from_side_data = stream["side_data_list"].as_array().and_then(|list| {
        list.iter().find_map(|entry| {
            let rotation = &entry["rotation"];
            rotation
                .as_i64()
                .or_else(|| rotation.as_f64().map(|r| r.round() as i64))
        })
    });
    from_side_data
        .or_else(|| parse_str_number::<i64>(&stream["tags"]["rotate"]))
        .unwrap_or(0)
}

fn is_quarter_turn(rotation: i64) -> bool {
    rotation.rem_euclid(180) == 90
}

/// Interpret `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe, ProcessingError> {
    let probe_data: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| ProcessingError::Decode(format!("Failed to parse ffprobe output: {}", e)))?;

    let stream = probe_data["streams"]
        .get(0)
        .ok_or_else(|| ProcessingError::Decode("No video stream found".to_string()))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| ProcessingError::Decode("Could not parse width".to_string()))?;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| ProcessingError::Decode("Could not parse height".to_string()))?;

    let frame_rate = stream["avg_frame_rate"]
        .as_str()
        .and_then(parse_rational)
        .filter(|fps| *fps > 0.0)
        .or_else(|| {
            stream["r_frame_rate"]
                .as_str()
                .and_then(parse_rational)
                .filter(|fps| *fps > 0.0)
        });

    let duration = parse_str_number::<f64>(&stream["duration"])
        .or_else(|| parse_str_number::<f64>(&probe_data["format"]["duration"]));

    let length_in_frames = parse_str_number::<u64>(&stream["nb_frames"])
        .filter(|frames| *frames > 0)
        .or_else(|| match (duration, frame_rate) {
            (Some(duration), Some(fps)) if duration > 0.0 => Some((duration * fps).floor() as u64),
            _ => None,
        })
        .unwrap_or(0);

    let (width, height) = if is_quarter_turn(stream_rotation(stream)) {
        (height, width)
    } else {
        (width, height)
    };

    Ok(VideoProbe {
        size: Dimension::new(
            u32::try_from(width).unwrap_or(u32::MAX),
            u32::try_from(height).unwrap_or(u32::MAX),
        ),
        length_in_frames: u32::try_from(length_in_frames).unwrap_or(u32::MAX),
        frame_rate,
    })
}

/// Probe the first video stream of `source`.
#[tracing::instrument(skip(ffprobe_path, source), fields(
    process.executable.name = "ffprobe",
    process.executable.path = %ffprobe_path,
    ffmpeg.operation = "probe"
))]
pub async fn probe_video(
    ffprobe_path: &str,
    source: &SourceLocation,
) -> Result<VideoProbe, ProcessingError> {
    let start = std::time::Instant::now();

    let mut command = Command::new(ffprobe_path);
    command.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        "-select_streams",
        "v:0",
    ]);
    command.arg(source.as_input()).kill_on_drop(true);

    let output = tokio::time::timeout(PROBE_TIMEOUT, command.output())
        .await
        .map_err(|_| ProcessingError::Decode("ffprobe timed out".to_string()))?
        .map_err(|e| ProcessingError::Decode(format!("Failed to execute ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(ProcessingError::Decode(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let probe = parse_probe_output(&output.stdout)?;

    tracing::info!(
        duration_ms = start.elapsed().as_millis(),
        width = probe.size.width,
        height = probe.size.height,
        frames = probe.length_in_frames,
        "Video probe completed"
    );

    Ok(probe)
}
