use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::assets::{self, AssetError, SassCompiler, StyleCompiler};
use crate::config::{Config, LinkConfig, SiteConfig};
use crate::renderer::{RenderError, RenderedPage, Renderer};
use crate::template::{TemplateError, TemplateRenderer};
use crate::vault::{PageId, VaultError, VaultIndex};
use crate::walker::{UnresolvedLink, Walk, WalkError, walk};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Vault directory not specified")]
    MissingVaultDir,
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What a finished run produced.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub pages: Vec<PathBuf>,
    pub stylesheets: Vec<PathBuf>,
    pub assets: Vec<PathBuf>,
    pub unresolved: Vec<UnresolvedLink>,
}

impl BuildReport {
    pub fn pages_rendered(&self) -> usize {
        self.pages.len()
    }

    pub fn broken_links(&self) -> &[UnresolvedLink] {
        &self.unresolved
    }
}

pub struct SiteBuilder {
    vault_dir: Option<PathBuf>,
    start_page: String,
    output_dir: PathBuf,
    templates_dir: PathBuf,
    static_dir: Option<PathBuf>,
    config: Config,
    templates: Option<TemplateRenderer>,
    style_compiler: Box<dyn StyleCompiler>,
    extra_body_html: Option<String>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            vault_dir: None,
            start_page: "index".to_string(),
            output_dir: PathBuf::from("./out"),
            templates_dir: PathBuf::from("./templates"),
            static_dir: None,
            config: Config::default(),
            templates: None,
            style_compiler: Box::new(SassCompiler),
            extra_body_html: None,
        }
    }

    // Required configuration
    pub fn vault_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.vault_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn start_page<S: Into<String>>(mut self, name: S) -> Self {
        self.start_page = name.into();
        self
    }

    // Optional paths
    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn templates_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.templates_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn static_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.static_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use these templates instead of loading `templates_dir`.
    pub fn templates(mut self, templates: TemplateRenderer) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn style_compiler<C: StyleCompiler + 'static>(mut self, compiler: C) -> Self {
        self.style_compiler = Box::new(compiler);
        self
    }

    /// HTML injected before `</body>` of every page, used by `serve`.
    pub fn extra_body_html<S: Into<String>>(mut self, html: S) -> Self {
        self.extra_body_html = Some(html.into());
        self
    }

    /// Index the vault, walk it and load templates.
    ///
    /// Nothing is written here, so every setup failure leaves the output
    /// directory untouched.
    pub fn build(self) -> Result<Site, BuildError> {
        let vault_dir = self.vault_dir.ok_or(BuildError::MissingVaultDir)?;
        let site_config = self.config.site.unwrap_or_default();
        let links = self.config.links.unwrap_or_default();
        let vault_options = self.config.vault.unwrap_or_default();

        let index = VaultIndex::build(&vault_dir, &vault_options)?;
        let start = PageId::from_target(&self.start_page)
            .ok_or_else(|| WalkError::StartPageNotFound(self.start_page.clone()))?;
        let walk = walk(&start, &index)?;

        let mut templates = match self.templates {
            Some(templates) => templates,
            None => TemplateRenderer::new(&self.templates_dir)?,
        };
        templates.ensure_template(&site_config.template)?;
        templates.set_global("site", &site_config);

        let mut renderer = Renderer::new(
            templates,
            site_config.template.clone(),
            site_config.syntax_theme.clone(),
            links.broken,
        );
        if let Some(html) = self.extra_body_html {
            renderer = renderer.with_body_suffix(html);
        }

        Ok(Site {
            index,
            walk,
            renderer,
            output_dir: self.output_dir,
            static_dir: self.static_dir,
            style_compiler: self.style_compiler,
            site_config,
            link_config: links,
        })
    }
}

pub struct Site {
    index: VaultIndex,
    walk: Walk,
    renderer: Renderer,
    output_dir: PathBuf,
    static_dir: Option<PathBuf>,
    style_compiler: Box<dyn StyleCompiler>,
    site_config: SiteConfig,
    link_config: LinkConfig,
}

impl Site {
    pub fn index(&self) -> &VaultIndex {
        &self.index
    }

    pub fn walk(&self) -> &Walk {
        &self.walk
    }

    pub fn site_config(&self) -> &SiteConfig {
        &self.site_config
    }

    pub fn link_config(&self) -> &LinkConfig {
        &self.link_config
    }

    /// Render every reachable page, in walk order, without writing anything.
    pub fn render_pages(&self) -> Result<Vec<RenderedPage>, BuildError> {
        let mut rendered = Vec::with_capacity(self.walk.len());
        for page in self.walk.pages() {
            rendered.push(self.renderer.render(page, &self.walk, &self.index)?);
        }
        Ok(rendered)
    }

    pub fn render_all(&self) -> Result<BuildReport, BuildError> {
        // Everything that can fail without touching the disk goes first
        let rendered = self.render_pages()?;
        let stylesheets = match &self.static_dir {
            Some(dir) => assets::compile_stylesheets(&dir.join("sass"), self.style_compiler.as_ref())?,
            None => Vec::new(),
        };

        let pages = emit(&rendered, &self.output_dir)?;

        let mut written_sheets = Vec::with_capacity(stylesheets.len());
        for sheet in &stylesheets {
            let path = self.output_dir.join(&sheet.out_path);
            write_file(&path, &sheet.css)?;
            written_sheets.push(path);
        }

        let copied = match &self.static_dir {
            Some(dir) => assets::copy_static(dir, &self.output_dir.join("static"), &["sass"])
                .map_err(|e| match e {
                    AssetError::Copy { path, source } => BuildError::Write { path, source },
                    other => other.into(),
                })?,
            None => Vec::new(),
        };

        let unresolved = self.walk.unresolved().to_vec();
        for link in &unresolved {
            warn!("Broken link in {}", link);
        }
        info!(
            "Rendered {} pages to {} ({} broken links)",
            pages.len(),
            self.output_dir.display(),
            unresolved.len()
        );

        Ok(BuildReport {
            pages,
            stylesheets: written_sheets,
            assets: copied,
            unresolved,
        })
    }
}

/// Write rendered pages under `output_dir`, creating directories as needed.
///
/// Files written before a failure are left in place.
pub fn emit(pages: &[RenderedPage], output_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    std::fs::create_dir_all(output_dir).map_err(|source| BuildError::Write {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let path = output_dir.join(&page.out_path);
        write_file(&path, &page.html)?;
        written.push(path);
    }
    Ok(written)
}

fn write_file(path: &Path, contents: &str) -> Result<(), BuildError> {
    let write_err = |source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, contents).map_err(write_err)
}
