//! Runs one build: reset the output directory, copy static assets alongside
//! the page pipeline (walk, collect, index blogs, render), then report.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use futures_util::future::try_join_all;
use log::{debug, info};

use crate::sitemill::blog_index::build_blog_index;
use crate::sitemill::collector::collect_pages;
use crate::sitemill::config::{BuildOptions, ResolvedPaths, SiteConfig, normalize};
use crate::sitemill::renderer::{Renderer, render_all};
use crate::sitemill::types::{BlogIndex, BuildResult};
use crate::sitemill::walker::{walk, walk_optional};

pub async fn build(site: &SiteConfig, options: &BuildOptions) -> Result<BuildResult> {
    let started = Instant::now();
    let paths = ResolvedPaths::resolve(options)?;

    reset_output(&paths).await?;

    let assets = tokio::spawn(copy_static(paths.static_dir.clone(), paths.out_dir.clone()));
    let pages = render_pages(site, &paths);

    let (pages, assets) = tokio::join!(pages, assets);
    let (page_count, blogs) = pages?;
    let asset_count = assets.context("static copy task failed")??;

    let result = BuildResult {
        page_count,
        asset_count,
        elapsed: started.elapsed(),
        blogs,
    };
    info!("{} pages built in {}ms", result.page_count, result.elapsed_ms());
    Ok(result)
}

async fn render_pages(site: &SiteConfig, paths: &ResolvedPaths) -> Result<(usize, BlogIndex)> {
    let pages_dir = paths.pages.clone();
    let files = blocking(move || walk(&pages_dir))
        .await?
        .with_context(|| format!("reading pages directory {}", paths.pages.display()))?;

    let pages = collect_pages(&files, paths, site).await?;
    let blogs = build_blog_index(&pages);

    let renderer = {
        let (site, paths, blogs) = (site.clone(), paths.clone(), blogs.clone());
        blocking(move || Renderer::new(site, &paths, blogs)).await??
    };
    let page_count = render_all(Arc::new(renderer), pages).await?;
    Ok((page_count, blogs))
}

/// Run filesystem-bound work on the blocking pool so it overlaps with the
/// rest of the build even on a current-thread runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking build task failed")
}

/// Copy the static tree into the output root. A missing static directory
/// copies nothing.
async fn copy_static(static_dir: PathBuf, out_dir: PathBuf) -> Result<usize> {
    let listed = static_dir.clone();
    let files = blocking(move || walk_optional(&listed))
        .await?
        .with_context(|| format!("listing static files under {}", static_dir.display()))?;

    let copies = files.iter().map(|src| {
        let static_dir = &static_dir;
        let out_dir = &out_dir;
        async move {
            let rel = src.strip_prefix(static_dir)?;
            let dst = out_dir.join(rel);
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(src, &dst)
                .await
                .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
            anyhow::Ok(())
        }
    });
    try_join_all(copies).await?;

    debug!("copied {} static files from {}", files.len(), static_dir.display());
    Ok(files.len())
}

/// Wipe and recreate the output directory. Refuses when the output directory
/// would swallow the site sources.
async fn reset_output(paths: &ResolvedPaths) -> Result<()> {
    let out = &paths.out_dir;
    let resolved_out = canonical(out).await;
    if canonical(&paths.pages).await.starts_with(&resolved_out)
        || canonical(&paths.cwd).await.starts_with(&resolved_out)
    {
        bail!(
            "refusing to clear output directory {}: it contains the site sources",
            out.display()
        );
    }

    rmdir(out).await?;
    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("creating output directory {}", out.display()))
}

/// `path` with symlinks resolved when it exists, otherwise with `.` and `..`
/// folded away.
async fn canonical(path: &Path) -> PathBuf {
    match tokio::fs::canonicalize(path).await {
        Ok(path) => path,
        Err(_) => normalize(path),
    }
}

async fn rmdir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("cleaning directory {}", dir.display())),
    }
}
