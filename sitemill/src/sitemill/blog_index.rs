use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use crate::sitemill::types::{BlogIndex, PageRecord};

/// Pages with `type: "blog"`, newest `date` first.
///
/// Dates compare as text, so ISO dates sort chronologically. Posts without a
/// string or numeric date go last. The sort is stable: ties keep the order the
/// pages were discovered in.
pub fn build_blog_index(pages: &[PageRecord]) -> BlogIndex {
    let mut posts: Vec<PageRecord> = pages.iter().filter(|p| p.is_blog()).cloned().collect();
    posts.sort_by(newest_first);
    BlogIndex::new(posts)
}

fn newest_first(a: &PageRecord, b: &PageRecord) -> Ordering {
    match (date_key(a), date_key(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn date_key(page: &PageRecord) -> Option<Cow<'_, str>> {
    match page.metadata.get("date")? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}
