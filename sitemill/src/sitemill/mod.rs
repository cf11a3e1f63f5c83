pub mod blog_index;
pub mod builder;
pub mod collector;
pub mod config;
pub mod frontmatter;
pub mod renderer;
pub mod types;
pub mod walker;

pub use builder::build;
pub use config::{BuildOptions, ResolvedPaths, SiteConfig};
pub use frontmatter::parse_frontmatter;
pub use types::{BlogIndex, BuildResult, Metadata, PageRecord};
