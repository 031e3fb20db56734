use std::fs::File;
use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{EncodingError, ResourceError, Result, VlogError};
use crate::media::MediaInfo;
use crate::video::types::MAX_FRAME_RATE;

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Run ffprobe on `path` and describe its streams
pub fn probe_with_ffprobe(ffprobe: &Path, path: &Path) -> Result<MediaInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VlogError::from(EncodingError::EncoderNotFound {
                binary: ffprobe.display().to_string(),
            }),
            _ => VlogError::from(ResourceError::ProbeFailed {
                path: path.display().to_string(),
                reason: format!("failed to run ffprobe: {}", e),
            }),
        })?;

    if !output.status.success() {
        return Err(ResourceError::ProbeFailed {
            path: path.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    parse_ffprobe_json(path, &output.stdout)
}

/// Parse ffprobe's JSON report (`-show_streams -show_format`)
pub fn parse_ffprobe_json(path: &Path, json: &[u8]) -> Result<MediaInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(json).map_err(|e| ResourceError::ProbeFailed {
        path: path.display().to_string(),
        reason: format!("ffprobe json parse failed: {}", e),
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    // Container duration first, longest stream otherwise
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| {
            parsed
                .streams
                .iter()
                .filter_map(|s| parse_seconds(s.duration.as_deref()))
                .reduce(f64::max)
        })
        .ok_or_else(|| ResourceError::InvalidMedia {
            path: path.display().to_string(),
            details: "no duration reported".to_string(),
        })?;

    let resolution = video.and_then(|s| match (s.width, s.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    });
    // r_frame_rate is the timebase on variable-rate clips, so the average wins
    let frame_rate = video
        .and_then(|s| {
            s.avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
        })
        .map(|fps| fps.min(MAX_FRAME_RATE));

    Ok(MediaInfo {
        duration,
        has_audio,
        resolution,
        frame_rate,
    })
}

/// Duration of an audio file in seconds, read with symphonia.
///
/// Uses the frame count from the container header when present and
/// otherwise walks the packets without decoding them.
pub fn probe_audio_duration(path: &Path) -> Result<f64> {
    let failed = |reason: String| ResourceError::ProbeFailed {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ResourceError::NotFound {
            path: path.display().to_string(),
        },
        _ => failed(e.to_string()),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| failed(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| failed("no audio track".to_string()))?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    let to_seconds = |ts: u64| -> Option<f64> {
        if let Some(time_base) = params.time_base {
            let time = time_base.calc_time(ts);
            Some(time.seconds as f64 + time.frac)
        } else {
            params.sample_rate.map(|rate| ts as f64 / rate as f64)
        }
    };

    if let Some(seconds) = params.n_frames.and_then(to_seconds) {
        debug!("{}: {:.3}s from header", path.display(), seconds);
        return Ok(seconds);
    }

    let mut total: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => total += packet.dur,
            Ok(_) => continue,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(failed(e.to_string()).into()),
        }
    }

    let seconds = to_seconds(total).ok_or_else(|| failed("unknown time base".to_string()))?;
    debug!("{}: {:.3}s from packets", path.display(), seconds);
    Ok(seconds)
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn parse_frame_rate(ratio: &str) -> Option<f64> {
    let (num, den) = ratio.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}
