//! Extracted directory tree I/O.
//!
//! The tree mirrors entry paths, with two additions: a `.zo` record at the
//! root capturing archive entry order, and one directory per split group
//! (sibling of its parent entry) holding member files plus a `.order` record.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use pbv_format::canonical::to_pretty_text;
use pbv_format::split::SplitGroup;
use pbv_format::{PbvError, Result};

/// Archive order record at the tree root: one entry path per line.
pub const ORDER_FILE: &str = ".zo";

/// Ordering record inside a split group directory: one identifier per line.
pub const GROUP_ORDER_FILE: &str = ".order";

fn fs_err(path: &Path, e: std::io::Error) -> PbvError {
    PbvError::Filesystem {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Write one file under the tree root, creating parent directories.
pub fn write_file(root: &Path, rel: &str, bytes: &[u8]) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| fs_err(parent, e))?;
    }
    fs::write(&path, bytes).map_err(|e| fs_err(&path, e))
}

/// Read one file under the tree root.
pub fn read_file(root: &Path, rel: &str) -> Result<Vec<u8>> {
    let path = root.join(rel);
    fs::read(&path).map_err(|e| fs_err(&path, e))
}

/// Write the archive order record.
pub fn write_order(root: &Path, entries: &[String]) -> Result<()> {
    let mut text = entries.join("\n");
    text.push('\n');
    write_file(root, ORDER_FILE, text.as_bytes())
}

/// Read the archive order record.
pub fn read_order(root: &Path) -> Result<Vec<String>> {
    let path = root.join(ORDER_FILE);
    let text = fs::read_to_string(&path).map_err(|e| fs_err(&path, e))?;
    Ok(text
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Directory holding a split group's member files, next to its parent entry.
pub fn group_dir(root: &Path, entry_rel: &str, group: &str) -> PathBuf {
    let rel_parent = Path::new(entry_rel).parent().unwrap_or(Path::new(""));
    root.join(rel_parent).join(group)
}

/// Write a split group: one `<identifier>.json` per member plus the ordering
/// record.
pub fn write_group(root: &Path, entry_rel: &str, group: &SplitGroup) -> Result<()> {
    let dir = group_dir(root, entry_rel, &group.name);
    fs::create_dir_all(&dir).map_err(|e| fs_err(&dir, e))?;
    for (id, member) in &group.members {
        let path = dir.join(format!("{id}.json"));
        fs::write(&path, to_pretty_text(member)).map_err(|e| fs_err(&path, e))?;
    }
    let mut order_text = group.order.join("\n");
    order_text.push('\n');
    let path = dir.join(GROUP_ORDER_FILE);
    fs::write(&path, order_text).map_err(|e| fs_err(&path, e))
}

/// Load a split group back from disk.
///
/// A member named by the ordering record but absent on disk is a
/// [`PbvError::MissingMember`]; a member file the record does not name is a
/// [`PbvError::UnexpectedMember`].
pub fn load_group(root: &Path, entry_rel: &str, name: &str) -> Result<SplitGroup> {
    let dir = group_dir(root, entry_rel, name);
    let order_path = dir.join(GROUP_ORDER_FILE);
    let order_text = fs::read_to_string(&order_path).map_err(|e| fs_err(&order_path, e))?;
    let order: Vec<String> = order_text
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let mut members = Map::with_capacity(order.len());
    for id in &order {
        let path = dir.join(format!("{id}.json"));
        let text = fs::read_to_string(&path).map_err(|_| PbvError::MissingMember {
            group: name.to_string(),
            identifier: id.clone(),
        })?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| PbvError::MalformedJson {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        members.insert(id.clone(), value);
    }

    for dirent in fs::read_dir(&dir).map_err(|e| fs_err(&dir, e))? {
        let dirent = dirent.map_err(|e| fs_err(&dir, e))?;
        let fname = dirent.file_name();
        let fname = fname.to_string_lossy();
        if let Some(stem) = fname.strip_suffix(".json") {
            if !members.contains_key(stem) {
                return Err(PbvError::UnexpectedMember {
                    group: name.to_string(),
                    identifier: stem.to_string(),
                });
            }
        }
    }

    Ok(SplitGroup {
        name: name.to_string(),
        order,
        members,
    })
}
