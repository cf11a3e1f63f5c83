use std::ops::Deref;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

/// Extension of page and partial templates.
pub const PAGE_EXTENSION: &str = "hbs";

/// Per-page metadata handed to templates as `pageConfig`.
pub type Metadata = Map<String, Value>;

/// One discovered page template plus everything derived from it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub source_path: PathBuf,
    #[serde(skip)]
    pub source_text: String,
    pub output_path: PathBuf,
    pub link: String,
    pub metadata: Metadata,
}

impl PageRecord {
    pub fn page_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(Value::as_str)
    }

    pub fn is_blog(&self) -> bool {
        self.page_type() == Some("blog")
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }
}

/// Blog posts, newest first.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct BlogIndex(Vec<PageRecord>);

impl BlogIndex {
    pub(crate) fn new(posts: Vec<PageRecord>) -> Self {
        Self(posts)
    }

    pub fn into_inner(self) -> Vec<PageRecord> {
        self.0
    }
}

impl Deref for BlogIndex {
    type Target = [PageRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Summary of a finished build.
#[derive(Clone, Debug)]
pub struct BuildResult {
    pub page_count: usize,
    pub asset_count: usize,
    pub elapsed: Duration,
    pub blogs: BlogIndex,
}

impl BuildResult {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// Destination of a page: its path under the pages root, moved under the
/// output root with an `.html` extension.
pub fn output_path_for(relative: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(relative).with_extension("html")
}

/// Site-relative URL of a page. A trailing `index.html` collapses to its
/// directory, so `blog/index.hbs` links to `/blog` and `index.hbs` to `/`.
pub fn link_for(relative: &Path) -> String {
    let html = relative.with_extension("html");
    let mut segments: Vec<String> = html
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.last().map(|s| s == "index.html").unwrap_or(false) {
        segments.pop();
    }

    format!("/{}", segments.join("/"))
}
