//! Main entry point for the zipmount CLI application.
//!
//! Lists and extracts members of ZIP/GZIP archives, or of a directory
//! treated as an archive.

use anyhow::{Result, bail};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use zipmount::{Cli, CompressionMethod, EntryInfo, FileArchive, open_archive};

/// Application entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let archive = open_archive(Path::new(&cli.file), &cli.archive_options())?;

    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        list_files(archive.as_ref(), cli.verbose);
        return Ok(());
    }

    let names = select_members(archive.as_ref(), &cli);

    let multiple_files = cli.pipe && names.len() > 1;
    let mut failed = 0usize;
    for name in &names {
        if !extract_file(archive.as_ref(), name, &cli, multiple_files)? {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} of {} members could not be extracted", names.len());
    }
    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Work out which members to extract.
///
/// Listed members are filtered like unzip does: directories are skipped,
/// positional names or globs select, `-x` patterns exclude. A positional
/// name that matches no listed member is still tried directly, which is how
/// mounted directories and case-insensitive lookups are reached.
fn select_members(archive: &dyn FileArchive, cli: &Cli) -> Vec<String> {
    let entries = archive.entries();

    let excluded = |name: &str| {
        cli.exclude
            .iter()
            .any(|x| name.contains(x.as_str()) || glob_match(x, name))
    };

    let mut names: Vec<String> = entries
        .iter()
        .filter(|e| !e.name.ends_with('/'))
        .filter(|e| {
            cli.files.is_empty()
                || cli.files.iter().any(|f| {
                    if has_glob_chars(f) {
                        glob_match(f, &e.name)
                    } else {
                        let basename = e.name.rsplit('/').next().unwrap_or(&e.name);
                        e.name == *f || basename == *f
                    }
                })
        })
        .filter(|e| !excluded(&e.name))
        .map(|e| e.name.clone())
        .collect();

    for f in &cli.files {
        if has_glob_chars(f) || excluded(f) {
            continue;
        }
        let listed = entries.iter().any(|e| {
            e.name == *f || e.name.rsplit('/').next() == Some(f.as_str())
        });
        if !listed {
            names.push(f.clone());
        }
    }

    names
}

/// List files in the archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Table with sizes, ratio, method, date and CRC
fn list_files(archive: &dyn FileArchive, verbose: bool) {
    let entries = archive.entries();

    if verbose {
        // Print table header for verbose output
        println!(
            "{:>10}  {:>10}  {:>5}  {:>6}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Size", "Cmpr", "Method", "Date", "Time", "CRC-32"
        );
        println!("{}", "-".repeat(80));
    }

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        if verbose {
            println!(
                "{:>10}  {:>10}  {}  {:>6}  {}  {:08x}  {}",
                entry.uncompressed_size,
                entry.compressed_size,
                ratio(entry.compressed_size, entry.uncompressed_size),
                method_label(entry),
                timestamp(entry),
                entry.crc32,
                entry.name
            );

            // Accumulate totals (excluding directories)
            if !entry.name.ends_with('/') {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            println!("{}", entry.name);
        }
    }

    // Print summary line in verbose mode
    if verbose {
        println!("{}", "-".repeat(80));
        println!(
            "{:>10}  {:>10}  {}  {:>35}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }
}

/// Percentage saved by compression.
///
/// # Arguments
///
/// * `compressed` - Bytes stored in the archive
/// * `uncompressed` - Bytes after decompression
///
/// # Returns
///
/// The saving as a right-aligned percentage, `0%` when nothing was saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Date and time columns for the verbose listing.
///
/// # Arguments
///
/// * `entry` - The listed member
///
/// # Returns
///
/// `YYYY-MM-DD  HH:MM`, or dashes of the same width when the member has no
/// valid modification time.
fn timestamp(entry: &EntryInfo) -> String {
    match entry.modified {
        Some(modified) => modified.format("%Y-%m-%d  %H:%M").to_string(),
        None => format!("{:>10}  {:>5}", "----------", "-----"),
    }
}

/// Short method name for the verbose listing.
fn method_label(entry: &EntryInfo) -> String {
    match entry.compression_method {
        CompressionMethod::Stored => "Stored".to_string(),
        CompressionMethod::Deflate => "Defl".to_string(),
        CompressionMethod::Unknown(m) => format!("m{m}"),
    }
}

/// Extract a single member.
///
/// # Arguments
///
/// * `archive` - The archive to read from
/// * `name` - Member name as given to [`FileArchive::open`]
/// * `cli` - Parsed CLI arguments with extraction options
/// * `show_filename` - Whether to print a header line before piped output
///
/// # Returns
///
/// `Ok(false)` when the member could not be opened; the archive has already
/// logged why. I/O errors while writing the output are returned as `Err`.
fn extract_file(
    archive: &dyn FileArchive,
    name: &str,
    cli: &Cli,
    show_filename: bool,
) -> Result<bool> {
    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        let Some(mut file) = archive.open(name) else {
            eprintln!("caution: {name} not found or unreadable");
            return Ok(false);
        };
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if show_filename {
            writeln!(out, "--- {name} ---")?;
        }
        io::copy(&mut file, &mut out)?;
        out.flush()?;
        return Ok(true);
    }

    let output_path = output_path(name, cli);

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {name} (file exists)");
            }
            return Ok(true);
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {name} (use -o to overwrite)");
            }
            return Ok(true);
        }
    }

    let Some(mut file) = archive.open(name) else {
        if !cli.is_very_quiet() {
            eprintln!("caution: {name} not found or unreadable");
        }
        return Ok(false);
    };

    if !cli.is_quiet() {
        println!("  extracting: {name}");
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut out = fs::File::create(&output_path)?;
    io::copy(&mut file, &mut out)?;

    Ok(true)
}

/// Destination path for an extracted member.
///
/// # Arguments
///
/// * `name` - Member name inside the archive
/// * `cli` - Parsed CLI arguments (`-d` and `-j`)
///
/// # Returns
///
/// The path to write to. `..` and empty components are dropped so the result
/// stays inside the destination directory.
fn output_path(name: &str, cli: &Cli) -> PathBuf {
    let file_name = if cli.junk_paths {
        name.rsplit('/').next().unwrap_or(name).to_string()
    } else {
        // Keep archive paths inside the destination
        name.split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .collect::<Vec<_>>()
            .join("/")
    };

    match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Check if a pattern contains glob wildcard characters.
///
/// # Arguments
///
/// * `pattern` - The pattern to check
///
/// # Returns
///
/// Returns `true` if the pattern contains `*` or `?` wildcards.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// # Arguments
///
/// * `pattern` - The glob pattern to match against
/// * `text` - The member name to check
///
/// # Returns
///
/// Returns `true` if the text matches the pattern, `false` otherwise.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    // Recursive helper function for pattern matching
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            // Both exhausted: match
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            // Question mark matches exactly one character
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            // Literal character must match exactly
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}
