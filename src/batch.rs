use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::document::Resolution;
use crate::exif::{TagPath, ValueKind, tags};
use crate::format::{self, FormatTag};
use crate::pipeline;
use crate::sink;

/// Extensions of files the converter picks up from directories.
const IMAGE_EXTENSIONS: &[&str] = &["webp", "jpg", "jpeg", "png", "gif", "tif", "tiff"];

/// The outcome of converting one file.
///
/// # Example
///
/// ```rust,no_run
/// # use webp_filetype::batch::convert_file;
/// # use webp_filetype::config::Config;
/// let result = convert_file("photo.jpg".as_ref(), &Config::default(), false);
///
/// if let Some(ref err) = result.error {
///     eprintln!("{}: {err}", result.path.display());
/// } else if let Some(ref output) = result.output {
///     println!("wrote {} ({} bytes)", output.display(), result.bytes_written.unwrap_or(0));
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvertResult {
    pub path: PathBuf,
    /// Where the WebP file was (or, in a dry run, would be) written.
    pub output: Option<PathBuf>,
    /// Container detected from the file contents, not its extension.
    pub format: Option<FormatTag>,
    pub width: u32,
    pub height: u32,
    /// Number of EXIF-style properties carried over.
    pub properties: usize,
    pub has_icc_profile: bool,
    pub has_xmp: bool,
    pub bytes_written: Option<u64>,
    pub backup_path: Option<PathBuf>,
    /// Why the file was left alone, when it was.
    pub skipped: Option<String>,
    pub error: Option<String>,
}

/// What [`inspect_file`] found in one file.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataReport {
    pub path: PathBuf,
    pub format: Option<FormatTag>,
    pub width: u32,
    pub height: u32,
    pub resolution: Resolution,
    pub icc_profile_size: Option<usize>,
    pub xmp: Option<String>,
    pub tags: Vec<TagReport>,
}

/// One property item in a [`MetadataReport`].
#[derive(Debug, Clone, Serialize)]
pub struct TagReport {
    pub path: TagPath,
    pub name: Option<&'static str>,
    pub kind: ValueKind,
    pub count: u32,
    pub value: String,
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// following symlinks; `recursive` controls whether subdirectories are
/// entered.
///
/// # Example
///
/// ```rust,no_run
/// use webp_filetype::batch::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./photos/"),        // entire directory
/// ], true);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut images = Vec::new();
    let max_depth = if recursive { usize::MAX } else { 1 };

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .max_depth(max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Create a backup of the original file.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Where the `.webp` for `path` goes under `config`.
pub fn output_path(path: &Path, config: &Config) -> PathBuf {
    match &config.output.output_dir {
        Some(dir) => {
            let mut name = path.file_stem().unwrap_or_default().to_os_string();
            name.push(".webp");
            dir.join(name)
        }
        None => path.with_extension("webp"),
    }
}

/// Load one file and save it as WebP.
///
/// Existing outputs are only replaced with `overwrite` set. When the output
/// is the input itself (a `.webp` re-encoded in place), the original is
/// copied to `<name>.webp.bak` first if `backup_originals` is set. With
/// `dry_run` the file is loaded but nothing is written.
///
/// Errors are reported in [`ConvertResult::error`] rather than returned, so
/// one bad file does not stop a batch.
pub fn convert_file(path: &Path, config: &Config, dry_run: bool) -> ConvertResult {
    let mut result = ConvertResult {
        path: path.to_path_buf(),
        ..ConvertResult::default()
    };

    let output = output_path(path, config);
    let in_place = output == path;
    if output.exists() && !in_place && !config.output.overwrite {
        result.skipped = Some(format!("{} already exists", output.display()));
        return result;
    }
    if in_place && !config.output.overwrite {
        result.skipped = Some("re-encoding in place needs overwrite".to_string());
        return result;
    }

    if let Err(e) = convert_into(path, &output, in_place, config, dry_run, &mut result) {
        result.error = Some(format!("{e:#}"));
    }
    result
}

fn convert_into(
    path: &Path,
    output: &Path,
    in_place: bool,
    config: &Config,
    dry_run: bool,
    result: &mut ConvertResult,
) -> Result<()> {
    let data = fs::read(path).context("Failed to read file")?;
    result.format = format::classify(&data);

    let doc = pipeline::load(&data).context("Failed to load image")?;
    result.width = doc.width();
    result.height = doc.height();
    result.has_icc_profile = doc.properties.contains(tags::ICC_PROFILE);
    result.properties = doc.properties.len() - usize::from(result.has_icc_profile);
    result.has_xmp = doc.xmp.is_some();
    result.output = Some(output.to_path_buf());

    if dry_run {
        return Ok(());
    }

    let mut encoded = Vec::new();
    let mut last_logged = 0;
    let mut progress = |percent: u32| -> ControlFlow<()> {
        if percent >= last_logged + 25 || percent == 100 {
            log::debug!("  {}: {percent}%", path.display());
            last_logged = percent;
        }
        ControlFlow::Continue(())
    };
    pipeline::save(&doc, &mut encoded, &config.save.encoder_options(), Some(&mut progress))
        .context("Failed to encode WebP")?;

    if in_place && config.output.backup_originals {
        result.backup_path = Some(backup_file(path)?);
    }
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).context("Failed to create output directory")?;
    }

    let mut file = fs::File::create(output).context("Failed to create output file")?;
    if let Err(e) = sink::write_image(&mut file, &encoded) {
        drop(file);
        let _ = fs::remove_file(output);
        return Err(e).context("Failed to write output file");
    }
    result.bytes_written = Some(encoded.len() as u64);
    Ok(())
}

/// Load a file and describe its metadata.
pub fn inspect_file(path: &Path) -> Result<MetadataReport> {
    let data = fs::read(path).context("Failed to read file")?;
    let doc = pipeline::load(&data).context("Failed to load image")?;

    let entries = doc
        .properties
        .iter()
        .filter(|(path, _)| *path != tags::ICC_PROFILE)
        .map(|(path, value)| TagReport {
            path,
            name: tags::tag_name(path),
            kind: value.kind(),
            count: value.count(),
            value: value.display_value(),
        })
        .collect();

    Ok(MetadataReport {
        path: path.to_path_buf(),
        format: format::classify(&data),
        width: doc.width(),
        height: doc.height(),
        resolution: doc.resolution,
        icc_profile_size: doc.properties.get(tags::ICC_PROFILE).map(|v| v.data().len()),
        xmp: doc.xmp.as_ref().map(|packet| packet.as_str().to_string()),
        tags: entries,
    })
}
