//! Translation of job parameters into engine options.

use std::path::Path;

use crate::formats::{self, ContainerFormat, AUDIO_ONLY_SELECTOR};
use crate::job::JobParams;

/// Output file naming inside the job's output directory.
pub const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// Optional post-processing steps. All of them need the external media processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postprocessor {
    ExtractAudio { codec: &'static str, quality: &'static str },
    EmbedThumbnail,
    Metadata,
}

/// Engine invocation options for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Full output path template (`<dir>/<OUTPUT_TEMPLATE>`).
    pub output_template: String,
    pub format: String,
    pub merge_output_format: Option<&'static str>,
    /// Applied in order.
    pub postprocessors: Vec<Postprocessor>,
    pub cookies_from_browser: Option<String>,
}

impl EngineOptions {
    /// Builds options from job parameters. Post-processing steps are only
    /// added when `has_processor` is true; otherwise they are skipped.
    pub fn build(params: &JobParams, has_processor: bool) -> Self {
        let mut format = formats::format_for_label(&params.resolution_label).to_string();
        let mut merge_output_format = None;
        let mut postprocessors = Vec::new();

        if params.container == ContainerFormat::Mp3 {
            format = AUDIO_ONLY_SELECTOR.to_string();
            if has_processor {
                postprocessors.push(Postprocessor::ExtractAudio {
                    codec: "mp3",
                    quality: "192",
                });
                if params.embed_thumbnail {
                    postprocessors.push(Postprocessor::EmbedThumbnail);
                }
                if params.add_metadata {
                    postprocessors.push(Postprocessor::Metadata);
                }
            }
        } else {
            merge_output_format = params.container.merge_output_format();
            if has_processor {
                if params.add_metadata {
                    postprocessors.push(Postprocessor::Metadata);
                }
                if params.embed_thumbnail {
                    postprocessors.push(Postprocessor::EmbedThumbnail);
                }
            }
        }

        Self {
            output_template: output_template(&params.output_dir),
            format,
            merge_output_format,
            postprocessors,
            cookies_from_browser: params
                .cookies_browser
                .as_deref()
                .and_then(formats::browser_key_from_label)
                .map(str::to_string),
        }
    }

    pub fn is_audio_only(&self) -> bool {
        self.format == AUDIO_ONLY_SELECTOR
    }
}

fn output_template(dir: &Path) -> String {
    dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned()
}
