//! Gathers source references into locally readable files.
//!
//! Remote references are fetched and materialized as temporary files
//! inside the base directory, named `tmp.<stem><ext>` so downstream
//! format sniffing by extension keeps working. The returned
//! [`TempFiles`] guard removes every temporary artifact when the
//! owning include-resolution call exits, on success and failure alike.

use std::io::Write;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{YamlCalError, YamlCalResult};

/// Owns the temporary files created by one collection call.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Failed to remove temporary file {}: {}", path.display(), e);
            }
        }
    }
}

/// Resolve an ordered list of references into locally readable file
/// names (relative to `dir`), preserving input order.
///
/// Remote references become temporary files; everything else passes
/// through unchanged and is assumed already readable.
pub fn gather_sources(refs: &[String], dir: &Path) -> YamlCalResult<(Vec<String>, TempFiles)> {
    let mut collected = Vec::with_capacity(refs.len());
    let mut temps = TempFiles::default();

    for reference in refs {
        if is_remote(reference) {
            collected.push(fetch_to_temp(reference, dir, &mut temps)?);
        } else {
            collected.push(reference.clone());
        }
    }

    Ok((collected, temps))
}

/// Scheme prefix match: only http(s) references are fetched.
pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

fn fetch_to_temp(reference: &str, dir: &Path, temps: &mut TempFiles) -> YamlCalResult<String> {
    log::info!("Downloading {}", reference);

    let response = reqwest::blocking::get(reference)
        .and_then(|r| r.error_for_status())
        .map_err(|e| collect_error(reference, &e.to_string()))?;

    let filename = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename)
        .unwrap_or_else(|| last_url_segment(reference));

    let (stem, extension) = split_filename(&filename);

    let bytes = response
        .bytes()
        .map_err(|e| collect_error(reference, &e.to_string()))?;

    let mut builder = tempfile::Builder::new();
    let prefix = format!("tmp.{stem}");
    builder.prefix(&prefix);
    let suffix = extension.map(|ext| format!(".{ext}"));
    if let Some(suffix) = &suffix {
        builder.suffix(suffix);
    }

    let mut file = builder.tempfile_in(dir)?;
    file.write_all(&bytes)?;
    let (_, path) = file.keep().map_err(|e| YamlCalError::Io(e.error))?;

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| collect_error(reference, "temporary file has no name"))?;
    log::info!("... -> {}", basename);

    temps.push(path);
    Ok(basename)
}

fn collect_error(reference: &str, reason: &str) -> YamlCalError {
    YamlCalError::Collect {
        reference: reference.to_string(),
        reason: reason.to_string(),
    }
}

/// Extract the suggested file name from a Content-Disposition header,
/// e.g. `attachment; filename="calendar.ics"`, percent-decoded.
fn disposition_filename(header: &str) -> Option<String> {
    let (_, raw) = header.split_once("filename=")?;
    let raw = raw.trim_matches(|c| c == '"' || c == ';' || c == ' ');
    if raw.is_empty() {
        return None;
    }
    Some(percent_decode_str(raw).decode_utf8_lossy().into_owned())
}

/// Fall back to the last path segment of the address.
fn last_url_segment(reference: &str) -> String {
    Url::parse(reference)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            reference
                .rsplit('/')
                .next()
                .unwrap_or(reference)
                .to_string()
        })
}

fn split_filename(filename: &str) -> (String, Option<String>) {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    (stem, extension)
}
