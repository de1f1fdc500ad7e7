//! Pure mappings from user-facing labels to engine parameters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolution labels understood by [`format_for_label`], best first.
pub const RESOLUTION_LABELS: [&str; 7] = [
    "2160p",
    "1440p",
    "1080p",
    "720p",
    "480p",
    "360p",
    "Audio only",
];

/// Label used when an unknown resolution label is given.
pub const DEFAULT_RESOLUTION: &str = "720p";

/// Format selector forced for audio-only (MP3) jobs.
pub const AUDIO_ONLY_SELECTOR: &str = "bestaudio/best";

/// Browsers the engine can read cookies from.
pub const COOKIE_BROWSERS: [&str; 6] = ["safari", "chrome", "chromium", "brave", "edge", "firefox"];

/// Maps a resolution label to the engine's format selector.
/// Unknown labels fall back to the 720p profile.
pub fn format_for_label(label: &str) -> &'static str {
    match label {
        "2160p" => "bestvideo[height<=2160]+bestaudio/best[height<=2160]",
        "1440p" => "bestvideo[height<=1440]+bestaudio/best[height<=1440]",
        "1080p" => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
        "720p" => "bestvideo[height<=720]+bestaudio/best[height<=720]",
        "480p" => "bestvideo[height<=480]+bestaudio/best[height<=480]",
        "360p" => "bestvideo[height<=360]+bestaudio/best[height<=360]",
        "Audio only" => AUDIO_ONLY_SELECTOR,
        _ => format_for_label(DEFAULT_RESOLUTION),
    }
}

/// Output container preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Auto,
    Mp4,
    Webm,
    Mp3,
}

impl ContainerFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerFormat::Auto => "auto",
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Webm => "webm",
            ContainerFormat::Mp3 => "mp3",
        }
    }

    /// Parses a label case-insensitively ("MP4", "webm", ...). Empty means Auto.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Some(ContainerFormat::Auto),
            "mp4" => Some(ContainerFormat::Mp4),
            "webm" => Some(ContainerFormat::Webm),
            "mp3" => Some(ContainerFormat::Mp3),
            _ => None,
        }
    }

    /// Merge target passed to the engine for video containers.
    pub fn merge_output_format(self) -> Option<&'static str> {
        match self {
            ContainerFormat::Mp4 => Some("mp4"),
            ContainerFormat::Webm => Some("webm"),
            ContainerFormat::Auto | ContainerFormat::Mp3 => None,
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContainerFormat::from_label(s).ok_or_else(|| format!("unknown container format: {}", s))
    }
}

/// Maps a cookie-source label ("Chrome", "firefox", "None") to the engine's browser key.
pub fn browser_key_from_label(label: &str) -> Option<&'static str> {
    let label = label.trim().to_ascii_lowercase();
    if label.is_empty() || label == "none" {
        return None;
    }
    COOKIE_BROWSERS.iter().copied().find(|b| *b == label)
}

/// Whether the external media processor (ffmpeg by default) can be found.
pub fn detect_external_processor(program: &str) -> bool {
    find_program(program).is_some()
}

/// Resolves `program` like a shell would: paths with a separator are checked
/// directly, bare names are searched in `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
