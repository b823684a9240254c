use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use webp_filetype::batch::{self, MetadataReport};
use webp_filetype::codec::WebPPreset;
use webp_filetype::config;
use webp_filetype::exif::Section;

#[derive(Parser, Debug)]
#[command(
    name = "webp-filetype",
    version,
    about = "Convert images to WebP while carrying over their EXIF, ICC and XMP metadata"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: webp-filetype.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config file and exit
    #[arg(long)]
    init: bool,

    /// Directory for converted files (default: next to each input)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Encoder quality, 0-100
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Encoder preset
    #[arg(long, value_enum)]
    preset: Option<WebPPreset>,

    /// Encode losslessly
    #[arg(long)]
    lossless: bool,

    /// Replace existing .webp outputs, including inputs re-encoded in place
    #[arg(long)]
    overwrite: bool,

    /// Do not make .bak copies of files replaced in place
    #[arg(long)]
    no_backup: bool,

    /// Only look at the top level of directory arguments
    #[arg(long)]
    no_recursive: bool,

    /// Display the metadata of each file and exit
    #[arg(long = "show-metadata")]
    show_metadata: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Load every file but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over the config file.
    fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(dir) = &self.output {
            config.output.output_dir = Some(dir.clone());
        }
        if let Some(quality) = self.quality {
            config.save.quality = quality;
        }
        if let Some(preset) = self.preset {
            config.save.preset = preset;
        }
        if self.lossless {
            config.save.lossless = true;
        }
        if self.overwrite {
            config.output.overwrite = true;
        }
        if self.no_backup {
            config.output.backup_originals = false;
        }
        if self.no_recursive {
            config.output.recursive = false;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::default_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let images = batch::collect_images(&cli.paths, config.output.recursive);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    // Handle --show-metadata
    if cli.show_metadata {
        let mut reports = Vec::new();
        for image_path in &images {
            match batch::inspect_file(image_path) {
                Ok(report) if cli.json => reports.push(report),
                Ok(report) => print_report(&report),
                Err(e) => log::error!("{}: {e:#}", image_path.display()),
            }
        }
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        return Ok(());
    }

    let total = images.len();
    log::info!("Found {total} image(s) to convert");
    if cli.dry_run {
        log::info!("Dry run: nothing will be written");
    }
    log::info!(
        "Encoder: {} quality {}, preset {:?}",
        if config.save.lossless { "lossless" } else { "lossy" },
        config.save.encoder_options().quality,
        config.save.preset
    );

    let mut results = Vec::new();
    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Converting: {}", i + 1, total, image_path.display());

        let result = batch::convert_file(image_path, &config, cli.dry_run);

        if let Some(ref err) = result.error {
            log::error!("  Error: {err}");
        } else if let Some(ref reason) = result.skipped {
            log::warn!("  Skipped: {reason}");
        } else {
            if let Some(format) = result.format {
                log::info!("  {} {}x{}", format.name(), result.width, result.height);
            }
            let mut carried = Vec::new();
            if result.properties > 0 {
                carried.push(format!("{} EXIF tags", result.properties));
            }
            if result.has_icc_profile {
                carried.push("ICC profile".to_string());
            }
            if result.has_xmp {
                carried.push("XMP".to_string());
            }
            if !carried.is_empty() {
                log::info!("  Metadata: {}", carried.join(", "));
            }
            if let Some(ref backup) = result.backup_path {
                log::info!("  Backup: {}", backup.display());
            }
            if let (Some(output), Some(bytes)) = (&result.output, result.bytes_written) {
                log::info!("  Wrote {} ({bytes} bytes)", output.display());
            }
        }

        results.push(result);
    }

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let skipped = results.iter().filter(|r| r.skipped.is_some()).count();
    let success = total - failed - skipped;
    log::info!("Done: {success} converted, {skipped} skipped, {failed} failed out of {total} images");

    Ok(())
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Values longer than this wrap onto continuation lines.
const VAL_WIDTH: usize = 46;
/// Width of the tag column, not counting the " : " separator.
const TAG_WIDTH: usize = 22;
/// Print everything [`batch::inspect_file`] found, grouped by section.
fn print_report(report: &MetadataReport) {
    println!();
    println!("{BOLD}File:{RESET} {}", report.path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    println!("  {BOLD}Image{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    if let Some(format) = report.format {
        print_row("Format", format.name());
    }
    print_row("Size", &format!("{} x {}", report.width, report.height));
    let res = &report.resolution;
    print_row("Resolution", &format!("{} x {} per {:?}", res.x, res.y, res.unit).to_lowercase());
    if let Some(size) = report.icc_profile_size {
        print_row("ICC profile", &format!("{size} bytes"));
    }
    if let Some(ref xmp) = report.xmp {
        print_row("XMP", &format!("{} bytes", xmp.len()));
    }
    println!();

    for section in [Section::Image, Section::Photo, Section::Interop, Section::Gps] {
        let rows: Vec<_> = report.tags.iter().filter(|t| t.path.section == section).collect();
        if rows.is_empty() {
            continue;
        }
        println!("  {BOLD}{}{RESET}", section.name());
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for tag in rows {
            let label = match tag.name {
                Some(name) => name.to_string(),
                None => format!("0x{:04X}", tag.path.tag_id),
            };
            print_row(&label, &tag.value);
        }
        println!();
    }

    if report.tags.is_empty() {
        println!("  {DIM}(no EXIF metadata found){RESET}");
        println!();
    }
    println!("  {GREEN}{} tag(s){RESET}", report.tags.len());
}

/// Print one `label : value` row, wrapping long values under the value column.
fn print_row(label: &str, val: &str) {
    let indent = " ".repeat(TAG_WIDTH + 3);
    for (i, line) in wrap_text(val, VAL_WIDTH).iter().enumerate() {
        if i == 0 {
            println!("  {label:<TAG_WIDTH$} : {line}");
        } else {
            println!("  {indent}{line}");
        }
    }
}

/// Greedy word wrap. Words longer than `max_width` get a line of their own.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for word in s.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.chars().count() + 1 + word.chars().count() <= max_width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }
    if lines.is_empty() {
        lines.push(s.to_string());
    }
    lines
}
