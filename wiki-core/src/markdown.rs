use pulldown_cmark::{CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use thiserror::Error;

use crate::config::MarkdownConfig;
use crate::path::{HTML_EXT, is_markdown, set_extension};

#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("Markdown is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("Unknown highlight theme: {0}")]
    UnknownTheme(String),
    #[error("Failed to highlight code block")]
    Highlight(#[from] syntect::Error),
}

/// Converts Markdown bytes into HTML bytes.
///
/// Implementations must be deterministic for a fixed input. Closures with
/// the same signature are renderers too, which lets callers swap in their
/// own conversion.
pub trait MarkdownRenderer {
    fn render(&self, markdown: &[u8]) -> Result<Vec<u8>, MarkdownError>;
}

impl<F> MarkdownRenderer for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, MarkdownError>,
{
    fn render(&self, markdown: &[u8]) -> Result<Vec<u8>, MarkdownError> {
        self(markdown)
    }
}

/// The default renderer: CommonMark plus the extensions switched on in
/// [`MarkdownConfig`].
pub struct Markdown {
    options: Options,
    wiki_links: bool,
    highlighter: Option<Highlighter>,
}

impl Markdown {
    pub fn new(config: &MarkdownConfig) -> Result<Self, MarkdownError> {
        let mut options = Options::empty();
        options.set(Options::ENABLE_TABLES, config.tables);
        options.set(Options::ENABLE_FOOTNOTES, config.footnotes);
        options.set(Options::ENABLE_STRIKETHROUGH, config.strikethrough);
        options.set(Options::ENABLE_TASKLISTS, config.task_lists);
        options.set(Options::ENABLE_SMART_PUNCTUATION, config.smart_punctuation);
        options.set(Options::ENABLE_WIKILINKS, config.wiki_links);

        let highlighter = if config.highlight {
            Some(Highlighter::new(&config.highlight_theme)?)
        } else {
            None
        };

        Ok(Self {
            options,
            wiki_links: config.wiki_links,
            highlighter,
        })
    }

    pub fn render_str(&self, markdown: &str) -> Result<String, MarkdownError> {
        let parser = Parser::new_ext(markdown, self.options);

        let mut events = Vec::new();
        // Language and buffered source of the fenced block being highlighted
        let mut code: Option<(String, String)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                    if self.highlighter.is_some() =>
                {
                    code = Some((language_token(&info).to_string(), String::new()));
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, buf)) = code.as_mut() {
                        buf.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if code.is_some() => {
                    if let (Some((lang, buf)), Some(highlighter)) =
                        (code.take(), &self.highlighter)
                    {
                        let highlighted = highlighter.highlight(&lang, &buf)?;
                        events.push(Event::Html(highlighted.into()));
                    }
                }
                Event::Start(Tag::Link {
                    link_type: link_type @ LinkType::WikiLink { .. },
                    dest_url,
                    title,
                    id,
                }) if self.wiki_links => {
                    events.push(Event::Start(Tag::Link {
                        link_type,
                        dest_url: wiki_target(&dest_url),
                        title,
                        id,
                    }));
                }
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());

        Ok(out)
    }
}

impl MarkdownRenderer for Markdown {
    fn render(&self, markdown: &[u8]) -> Result<Vec<u8>, MarkdownError> {
        let source = std::str::from_utf8(markdown)?;
        Ok(self.render_str(source)?.into_bytes())
    }
}

/// Points `[[Page]]` and `[[Page#section]]` at the rendered page. Only a
/// `.md` suffix is swapped out, other dots are part of the page name.
fn wiki_target(dest: &str) -> CowStr<'static> {
    let (page, fragment) = match dest.split_once('#') {
        Some((page, fragment)) => (page, Some(fragment)),
        None => (dest, None),
    };

    let mut target = if page.is_empty() {
        String::new()
    } else if is_markdown(page) {
        set_extension(page, HTML_EXT).to_string_lossy().into_owned()
    } else {
        format!("{page}{HTML_EXT}")
    };
    if let Some(fragment) = fragment {
        target.push('#');
        target.push_str(fragment);
    }

    target.into()
}

// "rust,ignore" and "rust title=x" both select rust
fn language_token(info: &str) -> &str {
    info.split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or_default()
}

struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    fn new(theme_name: &str) -> Result<Self, MarkdownError> {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .remove(theme_name)
            .ok_or_else(|| MarkdownError::UnknownTheme(theme_name.to_string()))?;

        Ok(Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }

    fn highlight(&self, lang: &str, code: &str) -> Result<String, MarkdownError> {
        let syntax = self.syntax_set.find_syntax_by_token(lang).or_else(|| {
            // Fallback mappings for languages without a bundled grammar
            match lang {
                "nix" => self.syntax_set.find_syntax_by_name("JavaScript"),
                "toml" => self.syntax_set.find_syntax_by_name("YAML"),
                _ => None,
            }
        });

        match syntax {
            Some(syntax) => Ok(highlighted_html_for_string(
                code,
                &self.syntax_set,
                syntax,
                &self.theme,
            )?),
            None => Ok(format!(
                "<pre><code>{}</code></pre>\n",
                html_escape::encode_text(code)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markdown() -> Markdown {
        Markdown::new(&MarkdownConfig::default()).unwrap()
    }

    #[test]
    fn test_render() {
        let cases: [(&[u8], &[u8]); 3] = [
            (b"Paragraph", b"<p>Paragraph</p>\n"),
            (b"# Heading", b"<h1>Heading</h1>\n"),
            (b"[Site](site.com)", b"<p><a href=\"site.com\">Site</a></p>\n"),
        ];

        let md = markdown();
        for (input, want) in cases {
            let got = md.render(input).unwrap();
            assert_eq!(
                got,
                want,
                "render({:?}) = {:?}",
                String::from_utf8_lossy(input),
                String::from_utf8_lossy(&got)
            );
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let md = markdown();
        let input = b"# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(md.render(input).unwrap(), md.render(input).unwrap());
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let err = markdown().render(&[b'#', b' ', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, MarkdownError::InvalidUtf8(_)));
    }

    #[test]
    fn test_unknown_theme_fails_at_construction() {
        let config = MarkdownConfig {
            highlight_theme: "no-such-theme".to_string(),
            ..MarkdownConfig::default()
        };
        match Markdown::new(&config) {
            Err(MarkdownError::UnknownTheme(name)) => assert_eq!(name, "no-such-theme"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected an unknown theme error"),
        }
    }

    #[test]
    fn test_unknown_theme_ignored_without_highlighting() {
        let config = MarkdownConfig {
            highlight: false,
            highlight_theme: "no-such-theme".to_string(),
            ..MarkdownConfig::default()
        };
        assert!(Markdown::new(&config).is_ok());
    }

    #[test]
    fn test_tables_and_strikethrough() {
        let html = markdown()
            .render_str("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n")
            .unwrap();
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_tables_can_be_disabled() {
        let config = MarkdownConfig {
            tables: false,
            ..MarkdownConfig::default()
        };
        let html = Markdown::new(&config)
            .unwrap()
            .render_str("| a | b |\n|---|---|\n| 1 | 2 |\n")
            .unwrap();
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn test_footnotes() {
        let html = markdown()
            .render_str("Text[^1]\n\n[^1]: The note.\n")
            .unwrap();
        assert!(html.contains("footnote"));
        assert!(html.contains("The note."));
    }

    #[test]
    fn test_wiki_links_point_at_rendered_pages() {
        let md = markdown();

        let html = md.render_str("See [[Other Page]].").unwrap();
        assert!(html.contains("href=\"Other%20Page.html\""));

        let html = md.render_str("See [[guide#setup]].").unwrap();
        assert!(html.contains("href=\"guide.html#setup\""));
    }

    #[test]
    fn test_wiki_links_keep_dotted_page_names() {
        let html = markdown()
            .render_str("See [[Release 1.0]] and [[v2.1#notes]].")
            .unwrap();
        assert!(html.contains("href=\"Release%201.0.html\""));
        assert!(html.contains("href=\"v2.1.html#notes\""));
    }

    #[test]
    fn test_wiki_links_to_markdown_sources() {
        let html = markdown().render_str("[[notes.md]] [[Guide.MD#top]]").unwrap();
        assert!(html.contains("href=\"notes.html\""));
        assert!(html.contains("href=\"Guide.html#top\""));
    }

    #[test]
    fn test_regular_links_are_untouched() {
        let html = markdown().render_str("[notes](notes.md)").unwrap();
        assert_eq!(html, "<p><a href=\"notes.md\">notes</a></p>\n");
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let html = markdown()
            .render_str("```rust\nlet x = 1;\n```\n")
            .unwrap();
        assert!(html.contains("<pre style="));
        assert!(html.contains("<span"));
    }

    #[test]
    fn test_unknown_language_is_escaped() {
        let html = markdown()
            .render_str("```nosuchlang\n<b>&</b>\n```\n")
            .unwrap();
        assert_eq!(html, "<pre><code>&lt;b&gt;&amp;&lt;/b&gt;\n</code></pre>\n");
    }

    #[test]
    fn test_plain_code_blocks_without_highlighting() {
        let config = MarkdownConfig {
            highlight: false,
            ..MarkdownConfig::default()
        };
        let html = Markdown::new(&config)
            .unwrap()
            .render_str("```rust\nlet x = 1;\n```\n")
            .unwrap();
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_language_token() {
        assert_eq!(language_token("rust"), "rust");
        assert_eq!(language_token("rust,ignore"), "rust");
        assert_eq!(language_token("python title=x"), "python");
        assert_eq!(language_token(""), "");
    }

    #[test]
    fn test_closure_renderer() {
        let upper = |md: &[u8]| -> Result<Vec<u8>, MarkdownError> { Ok(md.to_ascii_uppercase()) };
        assert_eq!(upper.render(b"abc").unwrap(), b"ABC");
    }
}
