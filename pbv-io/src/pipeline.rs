//! Extract / compress / textconv orchestration.
//!
//! Both directions walk the same schema registry: extraction converts each
//! entry to its canonical on-disk form, compression reverses every marker it
//! finds. Per-entry transforms are independent, so they run on a worker pool;
//! writes happen afterwards, sequentially, in deterministic archive order.
//!
//! Errors are fatal to the whole run. A failed extraction removes its output
//! directory; a failed compression never replaces the destination file.
//!
//! One asymmetry is deliberate: noise fields (volatile timestamps) are
//! discarded during extraction and not restored by compression. See the
//! schema registry for the per-field policy.

use std::fs;
use std::io::Write;
use std::path::Path;

use rayon::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use pbv_format::canonical::{
    apply_noise_filter, embed_nested_json, join_multiline_strings, sort_keys,
    split_multiline_strings, to_compact_text, to_pretty_text, unembed_nested_json,
};
use pbv_format::schema::{self, SchemaKind};
use pbv_format::sort::sort_identified_arrays;
use pbv_format::split::{self, SplitGroup};
use pbv_format::{PbvError, Result};

use crate::archive::{self, Container, Entry};
use crate::tree;

/// Options shared by both pipeline directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Allow replacing an existing output path.
    pub overwrite: bool,
    /// Apply the diff-oriented rewrites: noise filtering, multi-line string
    /// splitting, split groups. Off means plain canonicalization only.
    pub diffable: bool,
    /// Sort visual containers by identifier during extraction. Off by
    /// default: the host application is known to reject re-imported
    /// containers whose visuals were reordered.
    pub sort_visuals: bool,
}

/// What an extraction wrote.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractSummary {
    /// Container entries processed.
    pub entries: usize,
    /// Split-group member files written.
    pub split_members: usize,
}

/// What a compression wrote.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressSummary {
    /// Entries written to the container.
    pub entries: usize,
}

enum Converted {
    Raw {
        path: String,
        bytes: Vec<u8>,
    },
    Json {
        path: String,
        text: String,
        groups: Vec<SplitGroup>,
    },
}

/// Extract a container into a VCS-friendly directory tree.
pub fn execute_extract(
    container_path: &Path,
    out_dir: &Path,
    opts: &PipelineOptions,
) -> Result<ExtractSummary> {
    let container = archive::open(container_path)?;
    if out_dir.exists() {
        if opts.overwrite {
            fs::remove_dir_all(out_dir).map_err(|e| fs_err(out_dir, e))?;
        } else {
            return Err(PbvError::Filesystem {
                path: out_dir.display().to_string(),
                reason: "output path already exists".to_string(),
            });
        }
    }
    fs::create_dir_all(out_dir).map_err(|e| fs_err(out_dir, e))?;

    let result = extract_into(&container, out_dir, opts);
    if result.is_err() {
        // a failed run leaves no partially-converted tree behind
        let _ = fs::remove_dir_all(out_dir);
    }
    result
}

fn extract_into(
    container: &Container,
    out_dir: &Path,
    opts: &PipelineOptions,
) -> Result<ExtractSummary> {
    let converted: Vec<Converted> = container
        .entries
        .par_iter()
        .map(|entry| convert_for_extract(entry, opts))
        .collect::<Result<Vec<_>>>()?;

    let mut summary = ExtractSummary {
        entries: converted.len(),
        split_members: 0,
    };
    for item in &converted {
        match item {
            Converted::Raw { path, bytes } => tree::write_file(out_dir, path, bytes)?,
            Converted::Json { path, text, groups } => {
                tree::write_file(out_dir, path, text.as_bytes())?;
                for group in groups {
                    tree::write_group(out_dir, path, group)?;
                    summary.split_members += group.members.len();
                }
            }
        }
    }

    let order: Vec<String> = container.entries.iter().map(|e| e.path.clone()).collect();
    tree::write_order(out_dir, &order)?;
    Ok(summary)
}

fn convert_for_extract(entry: &Entry, opts: &PipelineOptions) -> Result<Converted> {
    let desc = schema::classify(&entry.path);
    if !schema::is_registered(&entry.path) {
        warn!(path = %entry.path, "no classification rule matched; copying entry verbatim");
    }
    if desc.kind == SchemaKind::Binary {
        return Ok(Converted::Raw {
            path: entry.path.clone(),
            bytes: entry.bytes.clone(),
        });
    }

    debug!(path = %entry.path, kind = ?desc.kind, "canonicalizing entry");
    let text = desc.encoding.decode(&entry.path, &entry.bytes)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| PbvError::MalformedJson {
        path: entry.path.clone(),
        reason: e.to_string(),
    })?;

    let mut value = embed_nested_json(value, desc.embedded_json_fields);
    let mut groups = Vec::new();
    if opts.diffable {
        value = apply_noise_filter(value, desc.noise_fields);
        value = split_multiline_strings(value);
        if opts.sort_visuals {
            value = sort_identified_arrays(value, desc.sorted_groups);
        }
        let (rest, lifted) = split::extract_groups(value, desc.split_groups)?;
        value = rest;
        groups = lifted;
    }

    Ok(Converted::Json {
        path: entry.path.clone(),
        text: to_pretty_text(&value),
        groups,
    })
}

/// Compress an extracted tree back into a container.
pub fn execute_compress(
    in_dir: &Path,
    container_path: &Path,
    opts: &PipelineOptions,
) -> Result<CompressSummary> {
    if !in_dir.is_dir() {
        return Err(PbvError::Filesystem {
            path: in_dir.display().to_string(),
            reason: "input directory does not exist".to_string(),
        });
    }
    if container_path.exists() && !opts.overwrite {
        return Err(PbvError::Archive(format!(
            "output path '{}' already exists",
            container_path.display()
        )));
    }

    let order = tree::read_order(in_dir)?;
    let entries: Vec<Entry> = order
        .par_iter()
        .map(|rel| convert_for_compress(in_dir, rel))
        .collect::<Result<Vec<_>>>()?;

    let container = Container { entries };
    archive::write(&container, container_path, opts.overwrite)?;
    Ok(CompressSummary {
        entries: container.len(),
    })
}

fn convert_for_compress(root: &Path, rel: &str) -> Result<Entry> {
    let desc = schema::classify(rel);
    if desc.kind == SchemaKind::Binary {
        return Ok(Entry {
            path: rel.to_string(),
            bytes: tree::read_file(root, rel)?,
        });
    }

    debug!(path = %rel, kind = ?desc.kind, "decanonicalizing entry");
    let bytes = tree::read_file(root, rel)?;
    let text = String::from_utf8(bytes).map_err(|e| PbvError::Encoding {
        path: rel.to_string(),
        reason: e.to_string(),
    })?;
    let mut value: Value = serde_json::from_str(&text).map_err(|e| PbvError::MalformedJson {
        path: rel.to_string(),
        reason: e.to_string(),
    })?;

    // markers are self-describing; reverse whatever the tree actually holds,
    // independent of this run's diffable flag
    let mut groups: Vec<SplitGroup> = Vec::new();
    let mut pending = split::collect_group_markers(&value);
    while let Some(name) = pending.pop() {
        if groups.iter().any(|g| g.name == name) {
            continue;
        }
        let group = tree::load_group(root, rel, &name)?;
        for member in group.members.values() {
            pending.extend(split::collect_group_markers(member));
        }
        groups.push(group);
    }
    if !groups.is_empty() {
        value = split::inject_groups(value, &groups)?;
    }
    value = join_multiline_strings(value);
    let value = unembed_nested_json(value);

    let body = to_compact_text(&value);
    Ok(Entry {
        path: rel.to_string(),
        bytes: desc.encoding.encode(&body),
    })
}

/// Render a container as readable text, for use as a `git textconv` driver.
///
/// JSON entries print pretty with keys sorted; binary entries print a SHA-256
/// digest line. Read-only: never touches the filesystem beyond the input.
pub fn execute_textconv(container_path: &Path, out: &mut dyn Write) -> Result<()> {
    let container = archive::open(container_path)?;
    for entry in &container.entries {
        writeln!(out, "Filename: {}", entry.path)?;
        let desc = schema::classify(&entry.path);
        if desc.kind == SchemaKind::Binary {
            let digest = Sha256::digest(&entry.bytes);
            let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
            writeln!(out, "File hash: {hex}")?;
            writeln!(out)?;
            continue;
        }
        let text = desc.encoding.decode(&entry.path, &entry.bytes)?;
        let value: Value = serde_json::from_str(&text).map_err(|e| PbvError::MalformedJson {
            path: entry.path.clone(),
            reason: e.to_string(),
        })?;
        let value = embed_nested_json(value, desc.embedded_json_fields);
        let value = sort_keys(value);
        out.write_all(to_pretty_text(&value).as_bytes())?;
        writeln!(out)?;
    }
    Ok(())
}

fn fs_err(path: &Path, e: std::io::Error) -> PbvError {
    PbvError::Filesystem {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
