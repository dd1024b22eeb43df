pub mod builder;
pub mod config;
pub mod markdown;
pub mod path;

// Re-export main types
pub use builder::{BuildError, BuildReport, Site, SiteBuilder, build_site};
pub use markdown::{Markdown, MarkdownError, MarkdownRenderer};
