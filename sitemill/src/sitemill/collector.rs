use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use log::{debug, warn};
use serde_json::Value;

use crate::sitemill::config::{ResolvedPaths, SiteConfig};
use crate::sitemill::frontmatter::try_parse_frontmatter;
use crate::sitemill::types::{Metadata, PAGE_EXTENSION, PageRecord, link_for, output_path_for};

pub fn is_page(path: &Path) -> bool {
    path.extension().map(|ext| ext == PAGE_EXTENSION).unwrap_or(false)
}

/// Read every page template in `files` and derive its record. Files without
/// the template extension are skipped. Reads run concurrently; the result
/// keeps the order of `files`.
pub async fn collect_pages(
    files: &[PathBuf],
    paths: &ResolvedPaths,
    site: &SiteConfig,
) -> Result<Vec<PageRecord>> {
    let reads = files
        .iter()
        .filter(|path| {
            let page = is_page(path);
            if !page {
                debug!("ignoring non-template file {}", path.display());
            }
            page
        })
        .map(|path| async move {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading page template at {}", path.display()))?;
            collect_page(path.clone(), text, paths, site)
        });

    try_join_all(reads).await
}

pub fn collect_page(
    source_path: PathBuf,
    source_text: String,
    paths: &ResolvedPaths,
    site: &SiteConfig,
) -> Result<PageRecord> {
    let relative = source_path.strip_prefix(&paths.pages).with_context(|| {
        format!(
            "page {} is outside the pages directory {}",
            source_path.display(),
            paths.pages.display()
        )
    })?;

    let output_path = output_path_for(relative, &paths.out_dir);
    let link = link_for(relative);

    let frontmatter = match try_parse_frontmatter(&source_text) {
        Ok(meta) => meta.unwrap_or_default(),
        Err(err) => {
            warn!("Error parsing frontmatter in {}: {err}", source_path.display());
            Metadata::new()
        }
    };
    let metadata = page_metadata(site, &link, frontmatter);

    Ok(PageRecord {
        source_path,
        source_text,
        output_path,
        link,
        metadata,
    })
}

/// Merge, lowest precedence first: `type: "page"`, the site title (or an
/// empty title), the derived link, then the page's own frontmatter. A
/// frontmatter `link` only replaces the derived one when it is a string.
pub fn page_metadata(site: &SiteConfig, link: &str, frontmatter: Metadata) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("type".into(), Value::from("page"));
    meta.insert("title".into(), Value::from(site.title().unwrap_or_default()));
    meta.insert("link".into(), Value::from(link));

    for (key, value) in frontmatter {
        if key == "link" && !value.is_string() {
            continue;
        }
        meta.insert(key, value);
    }
    meta
}
