//! Media probing using ffprobe.
//!
//! Scalar queries use the flat `default=` writer; stream queries use the
//! JSON writer. Every query runs a fresh ffprobe process; results are not
//! cached.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

use super::types::{ProbeError, ProbeResult};

/// Pixel formats that carry an alpha channel.
///
/// Matching is by substring, so e.g. `rgba64le` is covered by `rgba` as
/// well as by its own entry.
pub const ALPHA_PIXEL_FORMATS: &[&str] = &[
    "rgba", "argb", "yuva420p", "yuva444p", "ya8", "ya16", "ayuv", "pal8a", "gbrap", "gbrap10le",
    "gbrap12le", "gbrp16a", "rgba64le", "rgba64be", "bgra", "gbra",
];

/// Get the duration of a media file in seconds.
pub fn media_duration(path: &Path) -> ProbeResult<f64> {
    let stdout = ffprobe_output(
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        path,
    )?;

    let raw = stdout.trim();
    raw.parse::<f64>().map_err(|_| ProbeError::InvalidOutput {
        field: "duration".to_string(),
        raw: raw.to_string(),
    })
}

/// Validate that a file is a readable media container.
///
/// Checks that ffprobe can report both a format name and a duration.
pub fn validate_media(path: &Path) -> ProbeResult<()> {
    let stdout = ffprobe_output(
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration,format_name",
            "-of",
            "default=noprint_wrappers=1",
        ],
        path,
    )?;

    let has_format = stdout.lines().any(|l| l.contains("format_name="));
    let has_duration = stdout.lines().any(|l| l.contains("duration="));

    if !has_format {
        return Err(ProbeError::InvalidOutput {
            field: "format_name".to_string(),
            raw: stdout.trim().to_string(),
        });
    }
    if !has_duration {
        return Err(ProbeError::InvalidOutput {
            field: "duration".to_string(),
            raw: stdout.trim().to_string(),
        });
    }

    Ok(())
}

/// Convenience wrapper: true if the file passes validation.
pub fn is_valid_media(path: &Path) -> bool {
    validate_media(path).is_ok()
}

/// Get the pixel format of the first video stream.
///
/// Uses the JSON writer so a file with no video stream is distinguishable
/// from malformed output.
pub fn pixel_format(path: &Path) -> ProbeResult<String> {
    let stdout = ffprobe_output(
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=pix_fmt",
            "-print_format",
            "json",
        ],
        path,
    )?;

    let json: Value = serde_json::from_str(&stdout).map_err(|e| ProbeError::InvalidOutput {
        field: "streams".to_string(),
        raw: e.to_string(),
    })?;

    parse_pixel_format(&json).ok_or_else(|| ProbeError::InvalidOutput {
        field: "pix_fmt".to_string(),
        raw: stdout.trim().to_string(),
    })
}

/// Pull `streams[0].pix_fmt` out of ffprobe's JSON output.
fn parse_pixel_format(json: &Value) -> Option<String> {
    json.get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|s| s.get("pix_fmt"))
        .and_then(|p| p.as_str())
        .map(str::to_string)
}

/// Check whether the first video stream carries an alpha channel.
pub fn has_alpha_channel(path: &Path) -> ProbeResult<bool> {
    let pix_fmt = pixel_format(path)?;
    let has_alpha = pix_fmt_has_alpha(&pix_fmt);

    tracing::debug!(
        "Alpha check for {}: pix_fmt={} alpha={}",
        path.display(),
        pix_fmt,
        has_alpha
    );

    Ok(has_alpha)
}

/// Substring check against the known alpha pixel formats.
fn pix_fmt_has_alpha(pix_fmt: &str) -> bool {
    ALPHA_PIXEL_FORMATS.iter().any(|fmt| pix_fmt.contains(fmt))
}

/// Run ffprobe with the given args plus the file path, returning stdout.
fn ffprobe_output(args: &[&str], path: &Path) -> ProbeResult<String> {
    if !path.exists() {
        return Err(ProbeError::FileNotFound(path.to_path_buf()));
    }

    tracing::debug!("Probing file: {}", path.display());

    let output = Command::new("ffprobe")
        .args(args)
        .arg(path)
        .output()
        .map_err(|e| ProbeError::SpawnFailed {
            tool: "ffprobe".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::CommandFailed {
            tool: "ffprobe".to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            message: stderr.to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
