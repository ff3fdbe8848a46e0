pub mod assets;
pub mod builder;
pub mod config;
pub mod frontmatter;
pub mod links;
pub mod markdown;
pub mod renderer;
pub mod site;
pub mod template;
pub mod vault;
pub mod walker;

// Re-export main types
pub use builder::{BuildError, BuildReport, Site, SiteBuilder, emit};
pub use links::{LinkReference, Resolution, extract_links, resolve};
pub use renderer::{NavItem, RenderedPage, Renderer};
pub use template::{TemplateError, TemplateRenderer};
pub use vault::{Page, PageId, VaultError, VaultIndex, VaultOptions};
pub use walker::{LoadedPage, UnresolvedLink, Walk, WalkError, walk};
