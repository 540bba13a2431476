use serde::{Deserialize, Serialize};

/// Output format value meaning "let lilt decide".
pub const DEFAULT_OUTPUT_FORMAT: &str = "default";

/// Everything needed to run one lilt job.
///
/// Field names serialize in camelCase so the record stays readable by older
/// config files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobConfig {
    pub lilt_binary: String,
    pub sox_binary: String,
    pub sox_ng_binary: String,
    pub ffmpeg_binary: String,
    pub ffprobe_binary: String,
    pub use_docker: bool,
    pub output_format: String,
    pub no_preserve_metadata: bool,
    pub copy_images: bool,
    pub source_dir: String,
    pub target_dir: String,
}

impl JobConfig {
    /// The output format override, if one was chosen.
    ///
    /// Empty and `"default"` both mean no override.
    pub fn output_format_override(&self) -> Option<&str> {
        match self.output_format.as_str() {
            "" | DEFAULT_OUTPUT_FORMAT => None,
            format => Some(format),
        }
    }

    /// Helper binaries whose directories are put on the child's `PATH`, in
    /// lookup priority order.
    pub fn auxiliary_tools(&self) -> impl Iterator<Item = &str> {
        [
            self.sox_binary.as_str(),
            self.sox_ng_binary.as_str(),
            self.ffmpeg_binary.as_str(),
        ]
        .into_iter()
        .filter(|path| !path.is_empty())
    }
}
