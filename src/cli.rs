use clap::Parser;

use crate::archive::ArchiveOptions;

#[derive(Parser, Debug)]
#[command(name = "zipmount")]
#[command(version)]
#[command(about = "Read files out of ZIP/GZIP archives or mounted directories", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipmount data1.zip -x joe          extract all files except joe from data1.zip\n  \
  zipmount -p foo.zip | more         send contents of foo.zip via pipe into more\n  \
  zipmount -l -C assets.pk3          list files, matching names case-insensitively\n  \
  zipmount -p notes.txt.gz           print the member of a gzip file")]
pub struct Cli {
    /// ZIP/GZIP file or directory
    #[arg(value_name = "ARCHIVE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Match member names case-insensitively
    #[arg(short = 'C', long = "ignore-case")]
    pub ignore_case: bool,

    /// Match member names by basename only
    #[arg(long = "ignore-paths")]
    pub ignore_paths: bool,

    /// Verify CRC-32 of every extracted member
    #[arg(long = "verify")]
    pub verify: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions::default()
            .with_ignore_case(self.ignore_case)
            .with_ignore_paths(self.ignore_paths)
            .with_verify_checksums(self.verify)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet > 0 { "error" } else { "warn" }
    }
}
