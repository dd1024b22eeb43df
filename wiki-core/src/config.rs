use serde::{Deserialize, Serialize};

/// Settings the CLI layers from defaults, `wiki.toml` and `WIKI_*` variables.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub markdown: MarkdownConfig,
}

/// Extensions and highlighting used when converting pages.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MarkdownConfig {
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    pub task_lists: bool,
    pub smart_punctuation: bool,
    /// Resolve `[[Page]]` to `Page.html`
    pub wiki_links: bool,
    /// Syntax highlight fenced code blocks
    pub highlight: bool,
    /// One of syntect's bundled themes
    pub highlight_theme: String,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            smart_punctuation: false,
            wiki_links: true,
            highlight: true,
            highlight_theme: "base16-ocean.dark".to_string(),
        }
    }
}
