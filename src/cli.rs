use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "transq")]
#[command(about = "Batch AV1 to H264/H265 transcoder driving ffmpeg", long_about = None)]
pub struct Cli {
    /// Override the ffmpeg binary from the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Preset name (see `transq presets`)
    #[arg(long, short)]
    pub preset: Option<String>,

    /// Trim window applied to every queued file, HH:MM:SS[.mmm]
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub trim: Option<Vec<String>>,

    /// Render into this folder instead of next to each source
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Encoder priority override: auto, nvenc, qsv, amf, cpu
    #[arg(long)]
    pub encoder: Option<String>,

    /// 1 = fastest, 9 = best quality
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=9))]
    pub speed: Option<u8>,

    /// Also render sources that are not AV1
    #[arg(long)]
    pub any_codec: bool,

    /// Files or directories (scanned recursively)
    #[arg(required = true, value_name = "PATHS")]
    pub paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Show which hardware encoders and decoders ffmpeg reports
    Caps,

    /// Probe a video file for stream metadata and duration
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// List built-in and user presets
    Presets,

    /// Show ffmpeg commands without executing (dry run)
    DryRun {
        #[command(flatten)]
        queue: QueueArgs,
    },

    /// Render every queued file; Ctrl-C cancels the run
    Run {
        #[command(flatten)]
        queue: QueueArgs,

        /// Uncheck items whose output was verified after rendering
        #[arg(long)]
        uncheck_after_render: bool,

        /// Write a diagnostics report and JSON queue export here after the run
        #[arg(long, value_name = "DIR")]
        diagnostics: Option<PathBuf>,

        /// Append the run log to this file
        #[arg(long, value_name = "FILE")]
        log_file: Option<PathBuf>,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trim_takes_two_values() {
        let cli = Cli::try_parse_from([
            "transq", "dry-run", "--trim", "00:00:05", "00:01:00", "a.mkv", "b.mkv",
        ])
        .unwrap();
        match cli.command {
            Commands::DryRun { queue } => {
                assert_eq!(queue.trim, Some(vec!["00:00:05".to_string(), "00:01:00".to_string()]));
                assert_eq!(queue.paths.len(), 2);
            }
            _ => panic!("expected dry-run"),
        }
    }

    #[test]
    fn speed_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["transq", "run", "--speed", "12", "a.mkv"]).is_err());
    }
}
