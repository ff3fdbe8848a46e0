use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;

use serde_yaml::Mapping;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frontmatter;
use crate::links::{LinkReference, Resolution, extract_links, resolve};
use crate::vault::{Page, PageId, VaultIndex};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("start page not found: {0}")]
    StartPageNotFound(String),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A wiki-link that points at no note in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedLink {
    pub source: PageId,
    pub target: String,
}

impl fmt::Display for UnresolvedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [[{}]]", self.source, self.target)
    }
}

/// A reachable note with its source read and its links resolved.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub page: Page,
    pub title: String,
    pub metadata: Mapping,
    pub body: String,
    /// Links in `body`, with their resolution at the same index.
    pub links: Vec<(LinkReference, Resolution)>,
}

impl LoadedPage {
    pub fn load(page: &Page, index: &VaultIndex) -> Result<Self, WalkError> {
        let source = page.read_source().map_err(|source| WalkError::Read {
            path: page.path.clone(),
            source,
        })?;
        Ok(Self::from_source(page, &source, index))
    }

    pub fn from_source(page: &Page, source: &str, index: &VaultIndex) -> Self {
        let (metadata, body) = match frontmatter::parse_frontmatter(source) {
            Ok((metadata, body)) => (metadata, body),
            Err(e) => {
                warn!("Ignoring frontmatter in {}: {}", page.path.display(), e);
                (Mapping::new(), frontmatter::split_frontmatter(source).1)
            }
        };

        let title = frontmatter::title(&metadata)
            .unwrap_or(page.name.as_str())
            .to_string();

        let links = extract_links(body)
            .into_iter()
            .filter(|link| !link.is_self_anchor())
            .map(|link| {
                let resolution = resolve(&link, index);
                (link, resolution)
            })
            .collect();

        Self {
            page: page.clone(),
            title,
            metadata,
            body: body.to_string(),
            links,
        }
    }

    pub fn id(&self) -> &PageId {
        &self.page.id
    }

    pub fn links_to(&self, target: &PageId) -> bool {
        self.links
            .iter()
            .any(|(_, resolution)| matches!(resolution, Resolution::Resolved(id) if id == target))
    }
}

/// The result of walking the link graph from the start page.
#[derive(Debug)]
pub struct Walk {
    start: PageId,
    order: Vec<PageId>,
    pages: HashMap<PageId, LoadedPage>,
    unresolved: Vec<UnresolvedLink>,
}

impl Walk {
    pub fn start(&self) -> &PageId {
        &self.start
    }

    /// Reachable page ids in breadth-first order, start page first.
    pub fn order(&self) -> &[PageId] {
        &self.order
    }

    pub fn pages(&self) -> impl Iterator<Item = &LoadedPage> {
        self.order.iter().filter_map(|id| self.pages.get(id))
    }

    pub fn get(&self, id: &PageId) -> Option<&LoadedPage> {
        self.pages.get(id)
    }

    pub fn contains(&self, id: &PageId) -> bool {
        self.pages.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn unresolved(&self) -> &[UnresolvedLink] {
        &self.unresolved
    }

    /// Reachable pages linking to `id`, excluding `id` itself.
    ///
    /// The start page comes first, the rest follow walk order.
    pub fn backlinks(&self, id: &PageId) -> Vec<&LoadedPage> {
        self.pages()
            .filter(|page| page.id() != id && page.links_to(id))
            .collect()
    }
}

/// Breadth-first walk over the wiki-link graph.
///
/// Every page is enqueued at most once, so cycles terminate. Broken links
/// are collected, never fatal.
pub fn walk(start: &PageId, index: &VaultIndex) -> Result<Walk, WalkError> {
    if !index.contains(start) {
        return Err(WalkError::StartPageNotFound(start.to_string()));
    }

    let mut frontier = VecDeque::from([start.clone()]);
    let mut seen = HashSet::from([start.clone()]);
    let mut order = Vec::new();
    let mut pages = HashMap::new();
    let mut unresolved = Vec::new();

    while let Some(id) = frontier.pop_front() {
        let Some(page) = index.get(&id) else {
            continue;
        };
        let loaded = LoadedPage::load(page, index)?;

        for (link, resolution) in &loaded.links {
            match resolution {
                Resolution::Resolved(target) => {
                    if seen.insert(target.clone()) {
                        debug!("{} -> {}", id, target);
                        frontier.push_back(target.clone());
                    }
                }
                Resolution::Unresolved(raw) => {
                    debug!("{} -> [[{}]] (unresolved)", id, link.raw);
                    unresolved.push(UnresolvedLink {
                        source: id.clone(),
                        target: raw.clone(),
                    });
                }
            }
        }

        order.push(id.clone());
        pages.insert(id, loaded);
    }

    info!(
        "Reached {} of {} notes from `{}`",
        order.len(),
        index.len(),
        start
    );

    Ok(Walk {
        start: start.clone(),
        order,
        pages,
        unresolved,
    })
}
