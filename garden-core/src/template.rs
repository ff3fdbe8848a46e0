use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
    #[error("Templates directory not found: {}", .0.display())]
    DirNotFound(PathBuf),
    #[error("Template `{0}` not found")]
    Missing(String),
}

pub struct TemplateRenderer {
    tera: Tera,
    globals: Context,
}

impl TemplateRenderer {
    /// Load every `.html` template under `templates_dir`.
    pub fn new<P: AsRef<Path>>(templates_dir: P) -> Result<Self, TemplateError> {
        let dir = templates_dir.as_ref();
        if !dir.is_dir() {
            return Err(TemplateError::DirNotFound(dir.to_path_buf()));
        }

        let glob = dir.join("**").join("*.html");
        let tera = Tera::new(&glob.to_string_lossy())?;

        Ok(Self {
            tera,
            globals: Context::new(),
        })
    }

    /// Build a renderer from in-memory `(name, source)` pairs.
    pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())?;

        Ok(Self {
            tera,
            globals: Context::new(),
        })
    }

    /// Add a value every render will see.
    pub fn set_global<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.globals.insert(key, value);
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn ensure_template(&self, name: &str) -> Result<(), TemplateError> {
        if self.has_template(name) {
            Ok(())
        } else {
            Err(TemplateError::Missing(name.to_string()))
        }
    }

    /// Render a template with the globals plus `context`.
    ///
    /// Keys in `context` win over globals of the same name.
    pub fn render(&self, template: &str, context: &Context) -> Result<String, TemplateError> {
        let mut merged = self.globals.clone();
        merged.extend(context.clone());
        Ok(self.tera.render(template, &merged)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_globals() {
        let mut renderer =
            TemplateRenderer::from_raw(&[("page.html", "{{ site }}: {{ title }}")]).unwrap();
        renderer.set_global("site", "Garden");
        renderer.set_global("title", "global");

        let mut context = Context::new();
        context.insert("title", "Home");

        assert_eq!(renderer.render("page.html", &context).unwrap(), "Garden: Home");
    }

    #[test]
    fn test_missing_template() {
        let renderer = TemplateRenderer::from_raw(&[("page.html", "")]).unwrap();
        assert!(renderer.ensure_template("page.html").is_ok());
        assert!(matches!(
            renderer.ensure_template("index.html"),
            Err(TemplateError::Missing(name)) if name == "index.html"
        ));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("index.html"), "{% include \"partials/nav.html\" %}").unwrap();
        std::fs::write(dir.path().join("partials/nav.html"), "nav").unwrap();

        let renderer = TemplateRenderer::new(dir.path()).unwrap();
        assert!(renderer.has_template("index.html"));
        assert_eq!(renderer.render("index.html", &Context::new()).unwrap(), "nav");
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TemplateRenderer::new(dir.path().join("themes")),
            Err(TemplateError::DirNotFound(_))
        ));
    }
}
