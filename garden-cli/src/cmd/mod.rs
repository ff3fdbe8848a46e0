pub mod build;
pub mod serve;

use anyhow::{Context, Result};
use garden_core::{BuildReport, SiteBuilder};

use crate::config::GardenConfig;

/// Index, walk and render the vault described by `config`.
///
/// `live_reload` is appended to every page before `</body>` when serving.
pub fn build_site(config: &GardenConfig, live_reload: Option<String>) -> Result<BuildReport> {
    let build = &config.build;

    let mut builder = SiteBuilder::new()
        .vault_dir(&build.base_dir)
        .start_page(build.start_page.as_str())
        .output_dir(&build.output_dir)
        .templates_dir(&build.templates_dir)
        .static_dir(&build.static_dir)
        .config(config.site.clone());
    if let Some(script) = live_reload {
        builder = builder.extra_body_html(script);
    }

    let site = builder
        .build()
        .with_context(|| format!("Failed to load vault {}", build.base_dir))?;
    let report = site.render_all()?;

    Ok(report)
}
