use serde::{Deserialize, Serialize};

use crate::vault::VaultOptions;

/// Site-level settings, the `[site]`, `[links]` and `[vault]` tables of
/// `garden.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    pub site: Option<SiteConfig>,
    pub links: Option<LinkConfig>,
    pub vault: Option<VaultOptions>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Template every page is rendered with.
    pub template: String,
    pub syntax_theme: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: Some("Garden".into()),
            description: None,
            template: "index.html".to_string(),
            syntax_theme: "base16-ocean.dark".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LinkConfig {
    pub broken: BrokenLinkPolicy,
}

/// How a wiki-link to a missing note is rendered.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokenLinkPolicy {
    /// `<span class="broken-link">`, styled by the theme.
    #[default]
    Highlight,
    /// `<del class="broken-link">`
    Strikethrough,
    /// Just the link text.
    #[serde(rename = "plain")]
    PlainText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections() {
        let config: Config = toml::from_str(
            r#"
[site]
title = "My Garden"

[links]
broken = "strikethrough"

[vault]
recursive = false
"#,
        )
        .unwrap();

        let site = config.site.unwrap();
        assert_eq!(site.title.as_deref(), Some("My Garden"));
        assert_eq!(site.template, "index.html");
        assert_eq!(config.links.unwrap().broken, BrokenLinkPolicy::Strikethrough);
        assert!(!config.vault.unwrap().recursive);
    }

    #[test]
    fn test_broken_link_policy_names() {
        let config: Config = toml::from_str("[links]\nbroken = \"plain\"").unwrap();
        assert_eq!(config.links.unwrap().broken, BrokenLinkPolicy::PlainText);

        assert!(toml::from_str::<Config>("[links]\nbroken = \"hide\"").is_err());
    }
}
