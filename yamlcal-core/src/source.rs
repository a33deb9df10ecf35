//! Source documents and include resolution.
//!
//! A source document optionally declares `name`, `timezone`, an
//! `include` list of further references and an `events` list. Includes
//! resolve depth-first, relative to the including document's directory,
//! and their events land in the accumulator before the including
//! document's own events.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Mapping;

use crate::builder::build_event;
use crate::calendar::Calendar;
use crate::collect::gather_sources;
use crate::error::{YamlCalError, YamlCalResult};
use crate::event::Event;
use crate::ics::parse_calendar;

/// The top-level shape of one YAML source document. Unknown top-level
/// keys are ignored by the engine; outer collaborators may read them
/// from the raw YAML.
#[derive(Debug, Deserialize)]
pub struct SourceDocument {
    pub name: Option<String>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub events: Vec<Mapping>,
}

/// Convert a batch of source references into one assembled calendar.
pub fn files_to_calendar(refs: &[String]) -> YamlCalResult<Calendar> {
    let (events, name) = resolve_sources(refs, Path::new(""))?;
    Ok(Calendar::new(events, name))
}

/// Resolve references into a flat, ordered event sequence plus the
/// surfaced calendar name.
///
/// Name policy: included documents' names are discarded; among this
/// call's own documents, the last one that sets `name` wins. Circular
/// includes are not guarded against and recurse until the process
/// fails; authors own that invariant.
///
/// Temporary files fetched for this call are removed on exit, on both
/// success and failure paths.
pub fn resolve_sources(refs: &[String], dir: &Path) -> YamlCalResult<(Vec<Event>, Option<String>)> {
    // The guard lives until this call returns, keeping fetched files
    // readable for the loop below and for recursion into includes.
    let (files, _temps) = gather_sources(refs, dir)?;

    let mut events = Vec::new();
    let mut name = None;

    for file in &files {
        let path = dir.join(file);
        log::info!("Processing {}", path.display());

        // A raw, already-serialized calendar: absorb its events as-is.
        if file.ends_with(".ics") {
            let content = std::fs::read_to_string(&path)?;
            events.extend(parse_calendar(&content)?);
            continue;
        }

        let content = std::fs::read_to_string(&path)?;
        let doc: SourceDocument =
            serde_yaml::from_str(&content).map_err(|source| YamlCalError::Parse {
                file: path.display().to_string(),
                source,
            })?;

        if !doc.include.is_empty() {
            let sub_dir = match Path::new(file).parent() {
                Some(parent) => dir.join(parent),
                None => dir.to_path_buf(),
            };
            let (included, _sub_name) = resolve_sources(&doc.include, &sub_dir)?;
            events.extend(included);
        }

        let timezone = doc.timezone.as_deref().map(str::trim);
        for raw in doc.events {
            events.push(build_event(raw, timezone, file)?);
        }

        if doc.name.is_some() {
            name = doc.name;
        }
    }

    Ok((events, name))
}
