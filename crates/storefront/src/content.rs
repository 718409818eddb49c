//! Markdown rendering for pages, posts and product descriptions.
//!
//! All copy is authored in the dashboard, so raw HTML inside markdown is
//! escaped rather than passed through.
//!
//! # Product shortcode
//!
//! ```markdown
//! {{product "pixel-9"}}
//! {{product "pixel-9" "See the Pixel 9"}}
//! ```
//!
//! expands to a markdown link to `/products/pixel-9` before rendering.
//!
//! # Fallback pages
//!
//! `content/pages/{slug}.md` files seed the `home`, `about` and `contact`
//! copy until an editor saves a version in the dashboard. The first `# `
//! heading is the page title.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use comrak::{Options, markdown_to_html};
use regex::Regex;

use handset_core::Slug;

use crate::models::ContentPage;

/// Words read per minute for the reading-time estimate.
const WORDS_PER_MINUTE: usize = 200;

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
#[must_use]
pub fn render_markdown(content: &str) -> String {
    let processed = expand_shortcodes(content);

    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.superscript = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;
    options.render.escape = true;

    markdown_to_html(&processed, &options)
}

/// Minutes to read, never less than one.
#[must_use]
pub fn reading_time(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    u32::try_from(words.div_ceil(WORDS_PER_MINUTE).max(1)).unwrap_or(u32::MAX)
}

/// Plain-text summary of at most `max_chars` characters, cut at a word.
#[must_use]
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let text: String = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("{{"))
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '>' | '[' | ']'))
        .collect();

    if text.chars().count() <= max_chars {
        return text;
    }

    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = cut.rfind(' ').map_or(cut.as_str(), |i| &cut[..i]);
    format!("{}…", trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

static PRODUCT_SHORTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{product\s+"([a-z0-9]+(?:-[a-z0-9]+)*)"(?:\s+"([^"]*)")?\s*\}\}"#)
        .expect("Invalid regex")
});

fn expand_shortcodes(content: &str) -> String {
    PRODUCT_SHORTCODE_RE
        .replace_all(content, |caps: &regex::Captures| {
            let slug = &caps[1];
            let label = caps
                .get(2)
                .map(|m| m.as_str().replace(['[', ']'], ""))
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| "View product".to_owned());
            format!("[{label}](/products/{slug})")
        })
        .into_owned()
}

// =============================================================================
// Fallback pages
// =============================================================================

/// Markdown pages loaded once at startup from `content/pages`.
#[derive(Debug, Clone, Default)]
pub struct FallbackPages {
    pages: Arc<HashMap<String, ContentPage>>,
}

impl FallbackPages {
    /// Load every `*.md` file in `dir/pages`. A missing directory yields no pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let dir = content_dir.join("pages");
        let mut pages = HashMap::new();

        if !dir.exists() {
            tracing::warn!("Pages directory does not exist: {:?}", dir);
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ContentError::Io(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            match load_page(&path) {
                Ok(page) => {
                    tracing::info!("Loaded fallback page: {}", page.slug);
                    pages.insert(page.slug.to_string(), page);
                }
                Err(e) => tracing::error!("Failed to load page {:?}: {}", path, e),
            }
        }

        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&ContentPage> {
        self.pages.get(slug)
    }

    #[cfg(test)]
    pub(crate) fn from_pages(pages: Vec<ContentPage>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().map(|p| (p.slug.to_string(), p)).collect()),
        }
    }
}

fn load_page(path: &Path) -> Result<ContentPage, ContentError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ContentError::Parse("Invalid filename".to_owned()))?;
    let slug = Slug::parse(stem).map_err(|e| ContentError::Parse(e.to_string()))?;
    let content = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;
    Ok(parse_page(slug, &content))
}

fn parse_page(slug: Slug, content: &str) -> ContentPage {
    let (title, body) = match content.trim_start().split_once('\n') {
        Some((first, rest)) if first.starts_with("# ") => {
            (first.trim_start_matches("# ").trim().to_owned(), rest.trim_start())
        }
        _ => (title_case(slug.as_str()), content),
    };

    ContentPage {
        meta_description: Some(excerpt(body, 155)).filter(|d| !d.is_empty()),
        slug,
        title,
        body_markdown: body.to_owned(),
        updated_at: None,
    }
}

fn title_case(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gfm_rendering() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_markdown("Hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_product_shortcode() {
        let html = render_markdown(r#"Try {{product "pixel-9" "the Pixel 9"}} today."#);
        assert!(html.contains(r#"<a href="/products/pixel-9">the Pixel 9</a>"#));

        let html = render_markdown(r#"{{product "galaxy-s25"}}"#);
        assert!(html.contains(r#"<a href="/products/galaxy-s25">View product</a>"#));

        // Not a valid slug: left alone.
        let html = render_markdown(r#"{{product "../admin"}}"#);
        assert!(!html.contains("href"));
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
    }

    #[test]
    fn test_excerpt() {
        let md = "# Heading\n\nThe **new** phones are here and they are fast.";
        assert_eq!(excerpt(md, 200), "The new phones are here and they are fast.");
        assert_eq!(excerpt(md, 20), "The new phones are…");
    }

    #[test]
    fn test_parse_page_uses_heading_as_title() {
        let page = parse_page(Slug::parse("about").unwrap(), "# About Handset\n\nWe sell phones.\n");
        assert_eq!(page.title, "About Handset");
        assert_eq!(page.body_markdown, "We sell phones.\n");
        assert_eq!(page.meta_description.as_deref(), Some("We sell phones."));

        let page = parse_page(Slug::parse("shipping-info").unwrap(), "No heading here");
        assert_eq!(page.title, "Shipping Info");
    }
}
