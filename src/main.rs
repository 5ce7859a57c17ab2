//! Main entry point for the zipdir CLI application.
//!
//! This binary lists and extracts single-file, split and remote ZIP
//! archives.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use zipdir::{Cli, Directory, Entry, OpenOptions};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = cli.open_options();

    if cli.is_http_url() {
        let (dir, reader) = zipdir::open_remote(&cli.file, options.clone())
            .await
            .with_context(|| format!("cannot open '{}'", cli.file))?;

        process_zip(dir, &cli, &options).await?;

        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
    } else {
        let dir = zipdir::open(&cli.file, options.clone())
            .await
            .with_context(|| format!("cannot open '{}'", cli.file))?;
        if dir.is_split() && !cli.is_quiet() {
            eprintln!("Archive spans {} files", dir.segment_count());
        }
        process_zip(dir, &cli, &options).await?;
    }

    Ok(())
}

/// Process an archive based on CLI options.
///
/// - List mode (`-l` or `-v`): Display archive contents
/// - Extract mode: Extract files matching the specified filters
async fn process_zip(mut dir: Directory, cli: &Cli, options: &OpenOptions) -> Result<()> {
    if cli.list || cli.verbose {
        return list_files(&mut dir, cli.verbose).await;
    }

    let mut selected = Vec::new();
    while let Some(entry) = dir.read().await? {
        if is_selected(&entry, cli) {
            selected.push(entry);
        }
    }

    let multiple_files = cli.pipe && selected.len() > 1;
    for entry in &selected {
        extract_file(entry, cli, options, multiple_files).await?;
    }

    Ok(())
}

/// Apply the positional file filters and the `-x` exclusions.
fn is_selected(entry: &Entry, cli: &Cli) -> bool {
    // Directories are created on demand while extracting
    if entry.is_directory() {
        return false;
    }

    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, entry.name())
            } else {
                entry.name() == f.as_str() || base_name(entry.name()) == f.as_str()
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| entry.name().contains(x.as_str()) || glob_match(x, entry.name()))
}

/// List files in the archive, in central directory order.
///
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Size, compression ratio and timestamps
async fn list_files(dir: &mut Directory, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    while let Some(entry) = dir.read().await? {
        if !verbose {
            println!("{}", entry.name());
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.size(),
            entry.compressed_size(),
            ratio(entry.compressed_size(), entry.size()),
            year,
            month,
            day,
            hour,
            minute,
            entry.name()
        );

        if !entry.is_directory() {
            total_uncompressed += entry.size();
            total_compressed += entry.compressed_size();
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Percentage saved by compression.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100i64 - (compressed.saturating_mul(100) / uncompressed) as i64
        )
    } else {
        "  0%".to_string()
    }
}

/// Extract a single entry to a file or stdout.
///
/// Handles pipe mode (`-p`), custom output directory (`-d`), junk paths
/// (`-j`) and overwrite control (`-n`, `-o`).
async fn extract_file(
    entry: &Entry,
    cli: &Cli,
    options: &OpenOptions,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        if show_filename {
            stdout
                .write_all(format!("--- {} ---\n", entry.name()).as_bytes())
                .await?;
        }
        copy_entry(entry, &mut stdout, options).await?;
        stdout.flush().await?;
        return Ok(());
    }

    let file_name = if cli.junk_paths {
        base_name(entry.name()).to_string()
    } else {
        entry.name().to_string()
    };
    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.name());
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name());
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.name());
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::File::create(&output_path)
        .await
        .with_context(|| format!("cannot create '{}'", output_path.display()))?;
    copy_entry(entry, &mut file, options).await?;
    file.flush().await?;

    Ok(())
}

/// Stream an entry's content into `out` in `chunk_size` pieces.
async fn copy_entry<W>(entry: &Entry, out: &mut W, options: &OpenOptions) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; options.chunk_size];
    let mut hasher = crc32fast::Hasher::new();
    let mut position = 0u64;

    while position < entry.size() {
        let n = entry.read(&mut buf, position).await?;
        if n == 0 {
            bail!(
                "{}: archive ended after {} of {} bytes",
                entry.name(),
                position,
                entry.size()
            );
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n]).await?;
        position += n as u64;
    }

    let crc = hasher.finalize();
    if options.verify_crc && crc != entry.crc32() {
        bail!(
            "{}: crc32 mismatch, expected 0x{:08x} got 0x{:08x}",
            entry.name(),
            entry.crc32(),
            crc
        );
    }
    Ok(())
}

fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// ```ignore
/// assert!(glob_match("*.txt", "readme.txt"));
/// assert!(glob_match("file?.dat", "file1.dat"));
/// assert!(!glob_match("*.txt", "readme.md"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
