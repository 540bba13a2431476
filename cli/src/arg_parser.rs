use clap::{ArgEnum, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run lilt transcoding jobs and manage their saved settings
#[derive(Debug, Parser)]
#[clap(name = "lilt-cli", version)]
pub struct ArgParser {
    /// Settings file to use instead of the per-user one
    #[clap(long, env = "LILT_GUI_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Log more (-v for info, -vv for debug). RUST_LOG takes precedence
    #[clap(short = 'v', long = "verbose", parse(from_occurrences), global = true)]
    pub verbose: u8,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// transcode a directory, falling back to the last used settings
    Run(RunArgs),
    /// look up a binary on PATH and report its version
    Find {
        /// name of the binary, e.g. sox or ffmpeg
        name: String,
    },
    /// inspect or reset the saved settings
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
    /// open a URL in the default browser
    Open {
        url: String,
    },
    /// print the version
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Subcommand)]
pub enum ConfigAction {
    /// print the saved settings
    Show,
    /// overwrite the saved settings with the defaults
    Reset,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// directory to transcode
    pub source: Option<String>,

    #[clap(long)]
    /// directory to write transcoded files to
    pub target_dir: Option<String>,

    #[clap(long)]
    /// path of the lilt binary
    pub lilt: Option<String>,

    #[clap(long)]
    /// path of the sox binary
    pub sox: Option<String>,

    #[clap(long)]
    /// path of the sox_ng binary
    pub sox_ng: Option<String>,

    #[clap(long)]
    /// path of the ffmpeg binary
    pub ffmpeg: Option<String>,

    #[clap(long)]
    /// path of the ffprobe binary
    pub ffprobe: Option<String>,

    #[clap(long)]
    /// let lilt run its tools inside docker
    pub docker: bool,

    #[clap(long)]
    /// use the locally configured tools
    pub no_docker: bool,

    #[clap(long, arg_enum)]
    /// output format to enforce
    pub format: Option<OutputFormat>,

    #[clap(long)]
    /// keep tags in transcoded files
    pub preserve_metadata: bool,

    #[clap(long)]
    /// drop tags from transcoded files
    pub no_preserve_metadata: bool,

    #[clap(long)]
    /// copy cover images next to the transcoded files
    pub copy_images: bool,

    #[clap(long)]
    /// do not copy cover images
    pub no_copy_images: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
pub enum OutputFormat {
    /// keep each file's format
    Default,
    Flac,
    Mp3,
    Alac,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Default => "default",
            OutputFormat::Flac => "flac",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Alac => "alac",
        }
    }
}
