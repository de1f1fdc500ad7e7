//! Parse machine-readable lines printed by the downloader.

use std::path::PathBuf;

use super::super::EngineProgress;

/// Prefix of progress lines produced by our `--progress-template`.
pub const PROGRESS_PREFIX: &str = "mdq-progress ";
/// Prefix of the final-path line produced by our `--print after_move:` template.
pub(crate) const FILE_PREFIX: &str = "mdq-file ";

/// Parses `mdq-progress <downloaded> <total> <estimate> <speed> <eta>`.
/// Missing values are printed as `NA` (or `None`) and map to `None`.
/// Returns `None` for any other line or if `downloaded` is missing.
pub fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let rest = line.trim_start().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split_whitespace();
    let downloaded_bytes = number(fields.next()?)? as u64;
    let total_bytes = fields.next().and_then(number).map(|n| n as u64);
    let total_bytes_estimate = fields.next().and_then(number).map(|n| n as u64);
    let speed = fields.next().and_then(number);
    let eta = fields.next().and_then(number).map(|n| n as u64);
    Some(EngineProgress {
        downloaded_bytes,
        total_bytes,
        total_bytes_estimate,
        speed,
        eta,
    })
}

/// Parses `mdq-file <path>`.
pub(crate) fn parse_file_line(line: &str) -> Option<PathBuf> {
    let path = line.trim_end_matches(['\r', '\n']).strip_prefix(FILE_PREFIX)?;
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn number(field: &str) -> Option<f64> {
    let v: f64 = field.parse().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

/// Picks the most useful line of stderr for a human-readable failure message.
pub(crate) fn error_summary(stderr: &[String]) -> Option<String> {
    stderr
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.iter().rev().find(|l| !l.trim().is_empty()))
        .map(|l| l.trim().to_string())
}
