use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error(
        "duplicate page identifier `{id}`: {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateIdentifier {
        id: PageId,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("failed to scan {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Normalized page identifier.
///
/// Note names are transliterated to ASCII, lowercased, and every run of
/// non-alphanumeric characters becomes a single `-`. The same rule is used
/// for file names and link targets, so `Rust Safety.md` is addressed by
/// `[[rust safety]]` and written to `rust-safety.html`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Normalize a note name. Returns `None` when nothing survives normalization.
    pub fn new(name: &str) -> Option<Self> {
        let id = normalize(name);
        if id.is_empty() { None } else { Some(PageId(id)) }
    }

    /// Normalize a wiki-link target such as `folder/Some Note.md`.
    ///
    /// Only the last path segment counts, and a trailing `.md` is ignored.
    pub fn from_target(target: &str) -> Option<Self> {
        let name = target.rsplit('/').next().unwrap_or(target).trim();
        let name = match name.len().checked_sub(3) {
            Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".md") => {
                &name[..cut]
            }
            _ => name,
        };
        Self::new(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize(name: &str) -> String {
    let ascii = deunicode::deunicode(name);
    let mut out = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    /// File stem as written on disk, used as the default title.
    pub name: String,
    pub path: PathBuf,
}

impl Page {
    pub fn read_source(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }

    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct VaultOptions {
    /// Descend into subdirectories of the vault.
    pub recursive: bool,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// Every note in the vault, keyed by identifier.
///
/// Only file metadata is touched while scanning. Note contents are read
/// later, and only for pages the walk actually reaches.
#[derive(Debug)]
pub struct VaultIndex {
    root: PathBuf,
    pages: BTreeMap<PageId, Page>,
}

impl VaultIndex {
    pub fn build<P: AsRef<Path>>(root: P, options: &VaultOptions) -> Result<Self, VaultError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() || std::fs::read_dir(&root).is_err() {
            return Err(VaultError::NotFound(root));
        }

        info!("Scanning vault: {}", root.display());

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&root)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        let mut pages = BTreeMap::new();
        for entry in walker {
            let entry = entry.map_err(|source| VaultError::Io {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone()),
                source,
            })?;

            if !is_markdown(&entry) {
                continue;
            }

            let path = entry.into_path();
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            let Some(id) = PageId::new(&name) else {
                warn!("Skipping {}: file name has no usable identifier", path.display());
                continue;
            };

            match pages.entry(id) {
                Entry::Occupied(existing) => {
                    let existing: &Page = existing.get();
                    return Err(VaultError::DuplicateIdentifier {
                        id: existing.id.clone(),
                        first: existing.path.clone(),
                        second: path,
                    });
                }
                Entry::Vacant(slot) => {
                    debug!("Indexed {} as `{}`", path.display(), slot.key());
                    let id = slot.key().clone();
                    slot.insert(Page { id, name, path });
                }
            }
        }

        info!("Indexed {} notes", pages.len());

        Ok(Self { root, pages })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, id: &PageId) -> Option<&Page> {
        self.pages.get(id)
    }

    /// Look a page up by its raw note name.
    pub fn lookup(&self, name: &str) -> Option<&Page> {
        PageId::from_target(name).and_then(|id| self.pages.get(&id))
    }

    pub fn contains(&self, id: &PageId) -> bool {
        self.pages.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}
