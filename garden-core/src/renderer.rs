use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use tera::Context;
use thiserror::Error;
use tracing::debug;

use crate::config::BrokenLinkPolicy;
use crate::links::{LinkReference, Resolution, resolve};
use crate::markdown::render_markdown;
use crate::site;
use crate::template::{TemplateError, TemplateRenderer};
use crate::vault::{PageId, VaultIndex, normalize};
use crate::walker::{LoadedPage, Walk};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render `{page}`: {source}")]
    Template { page: PageId, source: TemplateError },
}

#[derive(Debug, Serialize)]
pub struct NavItem {
    pub text: String,
    pub link: String,
}

/// A finished page, waiting to be written.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub id: PageId,
    /// Relative to the output directory.
    pub out_path: PathBuf,
    pub html: String,
}

pub struct Renderer {
    templates: TemplateRenderer,
    template_name: String,
    syntax_theme: String,
    broken_links: BrokenLinkPolicy,
    body_suffix: Option<String>,
}

impl Renderer {
    pub fn new(
        templates: TemplateRenderer,
        template_name: impl Into<String>,
        syntax_theme: impl Into<String>,
        broken_links: BrokenLinkPolicy,
    ) -> Self {
        Self {
            templates,
            template_name: template_name.into(),
            syntax_theme: syntax_theme.into(),
            broken_links,
            body_suffix: None,
        }
    }

    /// Inject `html` before the closing `</body>` of every page.
    pub fn with_body_suffix(mut self, html: impl Into<String>) -> Self {
        self.body_suffix = Some(html.into());
        self
    }

    pub fn render(
        &self,
        page: &LoadedPage,
        walk: &Walk,
        index: &VaultIndex,
    ) -> Result<RenderedPage, RenderError> {
        let id = page.id();
        let is_index = id == walk.start();
        debug!("Rendering {}", id);

        let content = render_markdown(&page.body, &self.syntax_theme, |link| {
            self.link_html(link, walk, index)
        });

        let backlinks: Vec<NavItem> = walk
            .backlinks(id)
            .into_iter()
            .map(|source| NavItem {
                text: source.title.clone(),
                link: site::page_url(source.id(), walk.start()),
            })
            .collect();

        let mtime = page
            .page
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y.%m.%d").to_string());

        let mut context = Context::new();
        context.insert("content", &content);
        context.insert("title", &page.title);
        context.insert("name", &page.page.name);
        context.insert("id", id);
        context.insert("is_index", &is_index);
        context.insert("mtime", &mtime);
        context.insert("backlinks", &backlinks);
        context.insert("metadata", &page.metadata);

        let html = self
            .templates
            .render(&self.template_name, &context)
            .map_err(|source| RenderError::Template {
                page: id.clone(),
                source,
            })?;
        let html = match &self.body_suffix {
            Some(suffix) => inject_before_body_end(&html, suffix),
            None => html,
        };

        Ok(RenderedPage {
            id: id.clone(),
            out_path: site::page_out_path(id, walk.start()),
            html,
        })
    }

    fn link_html(&self, link: &LinkReference, walk: &Walk, index: &VaultIndex) -> String {
        let text = html_escape::encode_text(link.display_text());
        let fragment = link
            .fragment
            .as_deref()
            .map(normalize)
            .filter(|f| !f.is_empty())
            .map(|f| format!("#{f}"))
            .unwrap_or_default();

        if link.is_self_anchor() {
            return format!(
                "<a class=\"internal-link\" href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(&fragment),
                text
            );
        }

        match resolve(link, index) {
            Resolution::Resolved(target) if walk.contains(&target) => {
                let href = format!("{}{}", site::page_url(&target, walk.start()), fragment);
                format!(
                    "<a class=\"internal-link\" href=\"{}\">{}</a>",
                    html_escape::encode_double_quoted_attribute(&href),
                    text
                )
            }
            _ => self.broken_link_html(link, &text),
        }
    }

    fn broken_link_html(&self, link: &LinkReference, text: &str) -> String {
        match self.broken_links {
            BrokenLinkPolicy::Highlight => format!(
                "<span class=\"broken-link\" title=\"Missing page: {}\">{}</span>",
                html_escape::encode_double_quoted_attribute(&link.raw),
                text
            ),
            BrokenLinkPolicy::Strikethrough => format!("<del class=\"broken-link\">{}</del>", text),
            BrokenLinkPolicy::PlainText => text.to_string(),
        }
    }
}

fn inject_before_body_end(html: &str, snippet: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + snippet.len());
            result.push_str(&html[..pos]);
            result.push_str(snippet);
            result.push_str(&html[pos..]);
            result
        }
        None => format!("{}{}", html, snippet),
    }
}
