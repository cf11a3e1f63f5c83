use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use handlebars::Handlebars;
use log::debug;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::sitemill::collector::is_page;
use crate::sitemill::config::{ResolvedPaths, SiteConfig};
use crate::sitemill::types::{BlogIndex, Metadata, PageRecord};
use crate::sitemill::walker::walk_optional;

/// The data every page template sees.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderContext<'a> {
    config: &'a SiteConfig,
    pages: &'a str,
    partials: &'a str,
    page_config: &'a Metadata,
    blogs: &'a BlogIndex,
}

/// Renders page records once the whole site has been collected.
pub struct Renderer {
    registry: Handlebars<'static>,
    config: SiteConfig,
    pages: String,
    partials: String,
    blogs: BlogIndex,
}

impl Renderer {
    pub fn new(config: SiteConfig, paths: &ResolvedPaths, blogs: BlogIndex) -> Result<Self> {
        Ok(Self {
            registry: build_handlebars(&paths.partials)?,
            config,
            pages: paths.pages_prefix(),
            partials: paths.partials_prefix(),
            blogs,
        })
    }

    pub fn render(&self, page: &PageRecord) -> Result<String> {
        let ctx = RenderContext {
            config: &self.config,
            pages: &self.pages,
            partials: &self.partials,
            page_config: &page.metadata,
            blogs: &self.blogs,
        };
        self.registry
            .render_template(&page.source_text, &ctx)
            .with_context(|| format!("rendering page {}", page.source_path.display()))
    }

    /// Render `page` and replace its output file.
    pub fn write(&self, page: &PageRecord) -> Result<()> {
        let html = self.render(page)?;
        write_atomic(&page.output_path, &html)
            .with_context(|| format!("writing page output to {}", page.output_path.display()))?;
        debug!("rendered {} -> {}", page.source_path.display(), page.output_path.display());
        Ok(())
    }
}

/// Render and write every page on the blocking pool. The first failure
/// aborts whatever has not finished yet and is returned.
pub async fn render_all(renderer: Arc<Renderer>, pages: Vec<PageRecord>) -> Result<usize> {
    let mut tasks = JoinSet::new();
    for page in pages {
        let renderer = Arc::clone(&renderer);
        tasks.spawn_blocking(move || renderer.write(&page));
    }

    let mut rendered = 0;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| anyhow!("render task failed: {e}"))
            .and_then(|result| result);
        if let Err(err) = outcome {
            tasks.abort_all();
            return Err(err);
        }
        rendered += 1;
    }
    Ok(rendered)
}

/// Register every `.hbs` file under `partials_root` as a partial named by its
/// root-relative path without extension (`site/nav.hbs` becomes `site/nav`).
pub fn build_handlebars(partials_root: &Path) -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();

    let files = walk_optional(partials_root)
        .with_context(|| format!("listing partials under {}", partials_root.display()))?;

    for path in files.iter().filter(|p| is_page(p)) {
        let rel = path
            .strip_prefix(partials_root)
            .with_context(|| format!("partial {} escapes its root", path.display()))?;
        let name = rel.with_extension("").to_string_lossy().replace('\\', "/");

        let partial_src = fs::read_to_string(path)
            .with_context(|| format!("reading partial {}", path.display()))?;
        handlebars
            .register_partial(&name, partial_src)
            .with_context(|| format!("registering partial {} from {}", name, path.display()))?;
        debug!("registered partial {name}");
    }

    Ok(handlebars)
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("html.partial");
    fs::write(&staging, contents)?;
    fs::rename(&staging, path)
}
