use clap::Parser;
use std::path::PathBuf;

use crate::options::OpenOptions;

#[derive(Parser, Debug)]
#[command(name = "zipdir")]
#[command(version)]
#[command(about = "List and extract single-file and split ZIP archives", long_about = None)]
#[command(after_help = "Split sets are opened through their last part:\n  \
  zipdir -l backup.zip                  backup.z01, backup.z02, ..., backup.zip\n  \
  zipdir -p data.zip.006 | less         data.zip.001 ... data.zip.006\n  \
  zipdir -d out backup.zip -x '*.log'   everything but the logs, into out/\n  \
  zipdir -l https://example.com/a.zip   remote single-file archive")]
pub struct Cli {
    /// Archive path, last part of a split set, or http(s) URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Members to extract, by path, base name or glob (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Print member names only
    #[arg(short = 'l')]
    pub list: bool,

    /// Print names with sizes, ratio and timestamps
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write member content to stdout
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Destination directory for extracted members
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Skip members matching these names or globs
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Keep existing files, silently
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Replace existing files
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Drop member directories, extract flat
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Less output; repeat to silence warnings too
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Directory for temporary files holding decompressed entries
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Skip CRC-32 verification of extracted data
    #[arg(long)]
    pub no_verify_crc: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "off"
        } else if self.quiet > 0 {
            "error"
        } else {
            "warn"
        }
    }

    pub fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new().verify_crc(!self.no_verify_crc);
        if let Some(dir) = &self.scratch_dir {
            options = options.scratch_dir(dir);
        }
        options
    }
}
