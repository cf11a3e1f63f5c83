//! Page metadata embedded at the top of a template as a Handlebars comment:
//!
//! ```text
//! {{! { "title": "Hello", "type": "blog", "date": "2025-01-02" } }}
//! ```
//!
//! The block ends at the first `}}`, so a literal that itself contains `}}`
//! (a nested object closed right before the outer brace, say) is cut short and
//! reads as no metadata at all.

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

use crate::sitemill::types::Metadata;

pub const OPEN_MARKER: &str = "{{!";
pub const CLOSE_MARKER: &str = "}}";

/// Metadata block of `text`, or an empty mapping when there is none or it
/// does not parse. Parse failures are logged, never returned.
pub fn parse_frontmatter(text: &str) -> Metadata {
    match try_parse_frontmatter(text) {
        Ok(meta) => meta.unwrap_or_default(),
        Err(err) => {
            log::warn!("Error parsing frontmatter: {err}");
            Map::new()
        }
    }
}

/// `Ok(None)` when `text` carries no metadata block, `Err` when it carries
/// one that is not a JSON object.
pub fn try_parse_frontmatter(text: &str) -> Result<Option<Metadata>> {
    let Some(block) = frontmatter_block(text).filter(|b| !b.is_empty()) else {
        return Ok(None);
    };

    match serde_json::from_str(block)? {
        Value::Object(map) => Ok(Some(map)),
        other => Err(anyhow!("expected a JSON object, found {}", kind(&other))),
    }
}

fn frontmatter_block(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix(OPEN_MARKER)?;
    let end = rest.find(CLOSE_MARKER)?;
    let block = rest[..end].trim();

    // `{{!-- ... --}}` is the long comment form.
    let block = block
        .strip_prefix("--")
        .and_then(|b| b.strip_suffix("--"))
        .unwrap_or(block);
    Some(block.trim())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
