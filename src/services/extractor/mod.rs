// src/services/extractor/mod.rs

//! Quest extraction from wiki pages.
//!
//! Pages come in a few layouts that change with template revisions, so
//! extraction dispatches over [`PageShape`] strategies:
//!
//! - [`QuestTableShape`]: side-quest lists laid out as tables
//! - [`MissionListShape`]: mission pages laid out as bullet lists
//! - [`CampaignIndexShape`]: index pages that only link to the lists above
//!
//! Extraction is pure and never fails: an unrecognised page yields no
//! candidates and a [`Diagnostic`].

mod campaign_index;
mod mission_list;
mod quest_table;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::models::{Campaign, ExtractorConfig, QuestRecord, ShapeHint};
use crate::utils::{canonical_url, normalize_section, resolve};

pub use campaign_index::CampaignIndexShape;
pub use mission_list::MissionListShape;
pub use quest_table::QuestTableShape;

/// Class names of page chrome that never holds quests.
const NOISE_CLASSES: &[&str] = &[
    "navbox",
    "catlinks",
    "mw-footer",
    "toc",
    "metadata",
    "ambox",
    "noprint",
    "mw-editsection",
];

/// Element ids of page chrome that never holds quests.
const NOISE_IDS: &[&str] = &["toc", "catlinks", "footer", "mw-navigation", "siteSub"];

/// Link namespaces that never point at a quest article.
const FOREIGN_NAMESPACES: &[&str] = &[
    "file:",
    "image:",
    "category:",
    "special:",
    "template:",
    "talk:",
    "help:",
    "user:",
    "guild wars wiki:",
];

/// Headings that close the quest listing of a page.
const TRAILING_HEADINGS: &[&str] = &[
    "see also",
    "notes",
    "references",
    "external links",
    "trivia",
    "navigation menu",
];

/// A non-fatal extraction problem, kept for logging and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub url: String,
    pub shape: Option<ShapeHint>,
    pub message: String,
}

/// Structure found on a page besides the quests themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralHints {
    /// Section headers in document order
    pub sections: Vec<String>,
    /// Linked sub-pages worth fetching for full enumeration
    pub subpages: Vec<String>,
}

/// Everything extracted from one page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Shape the page was handled as, if any matched
    pub shape: Option<ShapeHint>,
    /// Quest candidates in document order; `region_or_section` may be empty
    pub candidates: Vec<QuestRecord>,
    pub hints: StructuralHints,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    fn diagnose(&mut self, url: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            url: url.to_string(),
            shape: self.shape,
            message: message.into(),
        });
    }

    fn add_section(&mut self, name: &str) {
        if !self.hints.sections.iter().any(|s| s == name) {
            self.hints.sections.push(name.to_string());
        }
    }
}

/// What the caller knows about the page being extracted.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub url: &'a str,
    /// Campaign being scraped; never inferred from the page
    pub campaign: Campaign,
    pub extracted_at: DateTime<Utc>,
}

/// One page layout strategy.
pub trait PageShape: Send + Sync {
    /// The hint that selects this shape explicitly.
    fn hint(&self) -> ShapeHint;

    /// Whether the document looks like this shape.
    fn detect(&self, doc: &Html) -> bool;

    /// Append candidates, hints, and diagnostics for the document to `out`.
    fn extract(
        &self,
        doc: &Html,
        ctx: &PageContext<'_>,
        config: &ExtractorConfig,
        out: &mut Extraction,
    );
}

/// Page parser dispatching over the known shapes.
pub struct QuestExtractor {
    config: ExtractorConfig,
    shapes: Vec<Box<dyn PageShape>>,
}

impl QuestExtractor {
    /// Extractor with every built-in shape, tried in order.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            shapes: vec![
                Box::new(QuestTableShape),
                Box::new(MissionListShape),
                Box::new(CampaignIndexShape),
            ],
        }
    }

    /// Extract quests from one page.
    ///
    /// `hint` forces a shape instead of detecting one.
    pub fn extract(
        &self,
        ctx: &PageContext<'_>,
        raw_content: &str,
        hint: Option<ShapeHint>,
    ) -> Extraction {
        let doc = Html::parse_document(raw_content);
        let mut out = Extraction::default();

        let shape = match hint {
            Some(hint) => self.shapes.iter().find(|s| s.hint() == hint),
            None => self.shapes.iter().find(|s| s.detect(&doc)),
        };

        let Some(shape) = shape else {
            out.diagnose(ctx.url, "unrecognized page structure");
            log::warn!("No page shape matched {}", ctx.url);
            return out;
        };

        out.shape = Some(shape.hint());
        shape.extract(&doc, ctx, &self.config, &mut out);

        if out.candidates.is_empty() && out.hints.subpages.is_empty() {
            out.diagnose(ctx.url, "page yielded no quests");
        }
        for diagnostic in &out.diagnostics {
            log::warn!(
                "Extraction {} ({:?}): {}",
                diagnostic.url,
                diagnostic.shape,
                diagnostic.message
            );
        }
        log::debug!(
            "Extracted {} candidates and {} sub-pages from {}",
            out.candidates.len(),
            out.hints.subpages.len(),
            ctx.url
        );
        out
    }
}

// --- Shared helpers for the shapes ---

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Main article body, or the whole document when absent.
fn content_root(doc: &Html) -> ElementRef<'_> {
    selector("#mw-content-text")
        .and_then(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element())
}

/// Page title from the first heading or `<title>`.
fn page_title(doc: &Html) -> String {
    ["#firstHeading", "h1", "title"]
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| doc.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Whether the element itself is page chrome.
fn is_noise_element(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if value.id().is_some_and(|id| NOISE_IDS.contains(&id)) {
        return true;
    }
    value.classes().any(|c| NOISE_CLASSES.contains(&c))
}

/// Whether the element is, or sits inside, page chrome.
fn in_noise(el: &ElementRef<'_>) -> bool {
    is_noise_element(el)
        || el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| is_noise_element(&a))
}

fn is_heading(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "h2" | "h3" | "h4")
}

/// Heading text without edit links.
fn heading_text(el: &ElementRef<'_>) -> String {
    if let Some(headline) = selector(".mw-headline").and_then(|sel| el.select(&sel).next()) {
        return headline.text().collect();
    }
    el.descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| {
            !node
                .ancestors()
                .take_while(|a| a.id() != el.id())
                .filter_map(ElementRef::wrap)
                .any(|a| is_noise_element(&a))
        })
        .map(|(_, text)| &**text)
        .collect()
}

/// Elements named in `wanted`, in document order, each paired with the
/// nearest preceding section header.
///
/// Content after a trailing heading such as "See also" is not visited.
fn walk_sections<'a>(
    root: ElementRef<'a>,
    wanted: &[&str],
    config: &ExtractorConfig,
    out: &mut Extraction,
) -> Vec<(Option<String>, ElementRef<'a>)> {
    let mut section: Option<String> = None;
    let mut found = Vec::new();

    for el in root.descendants().filter_map(ElementRef::wrap) {
        if is_heading(&el) {
            if in_noise(&el) {
                continue;
            }
            let text = heading_text(&el);
            let Some(name) = normalize_section(&text, config.max_section_len) else {
                continue;
            };
            if TRAILING_HEADINGS.contains(&name.to_lowercase().as_str()) {
                break;
            }
            out.add_section(&name);
            section = Some(name);
        } else if wanted.contains(&el.value().name()) && !in_noise(&el) {
            found.push((section.clone(), el));
        }
    }
    found
}

/// A quest link: resolved article URL and visible text.
struct QuestLink {
    url: String,
    text: String,
}

/// First usable article link inside `el`.
fn first_article_link(el: &ElementRef<'_>, page_url: &str) -> Option<QuestLink> {
    let sel = selector("a[href]")?;
    let anchor = el.select(&sel).next()?;
    let href = anchor.value().attr("href")?;
    let text: String = anchor.text().collect();
    if is_foreign_link(href, &text) {
        return None;
    }
    let url = canonical_url(&resolve(page_url, href)?);
    Some(QuestLink { url, text })
}

/// Links into namespaces or anchors on the same page.
fn is_foreign_link(href: &str, text: &str) -> bool {
    if href.starts_with('#') {
        return true;
    }
    let target = href
        .rsplit("/wiki/")
        .next()
        .unwrap_or(href)
        .replace("%3A", ":")
        .replace('_', " ")
        .to_lowercase();
    let text = text.trim().to_lowercase();
    FOREIGN_NAMESPACES
        .iter()
        .any(|ns| target.starts_with(ns) || text.starts_with(ns))
        || href.contains("action=edit")
}

/// Keeps sub-page URLs unique by canonical form.
#[derive(Default)]
struct UrlSet {
    seen: HashSet<String>,
}

impl UrlSet {
    fn insert(&mut self, url: &str) -> bool {
        self.seen.insert(canonical_url(url))
    }
}
