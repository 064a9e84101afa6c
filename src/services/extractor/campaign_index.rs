// src/services/extractor/campaign_index.rs

//! Campaign index pages: no quests of their own, only links to quest and
//! mission lists.

use scraper::{ElementRef, Html};

use super::{
    Extraction, PageContext, PageShape, UrlSet, content_root, in_noise, is_foreign_link,
    selector,
};
use crate::models::{ExtractorConfig, ShapeHint};
use crate::utils::{canonical_url, resolve, url::wiki_page_name};

/// Whether a link points at a quest or mission list page.
fn is_list_link(anchor: &ElementRef<'_>) -> bool {
    let Some(href) = anchor.value().attr("href") else {
        return false;
    };
    let text: String = anchor.text().collect();
    if is_foreign_link(href, &text) {
        return false;
    }
    let target = href
        .rsplit("/wiki/")
        .next()
        .unwrap_or(href)
        .replace('_', " ")
        .to_lowercase();
    target.starts_with("list of") && (target.contains("quest") || target.contains("mission"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CampaignIndexShape;

impl PageShape for CampaignIndexShape {
    fn hint(&self) -> ShapeHint {
        ShapeHint::CampaignIndex
    }

    fn detect(&self, doc: &Html) -> bool {
        let Some(anchor) = selector("a[href]") else {
            return false;
        };
        content_root(doc)
            .select(&anchor)
            .any(|a| !in_noise(&a) && is_list_link(&a))
    }

    fn extract(
        &self,
        doc: &Html,
        ctx: &PageContext<'_>,
        _config: &ExtractorConfig,
        out: &mut Extraction,
    ) {
        let Some(anchor) = selector("a[href]") else {
            return;
        };
        let mut seen = UrlSet::default();
        seen.insert(ctx.url);

        for a in content_root(doc).select(&anchor) {
            if in_noise(&a) || !is_list_link(&a) {
                continue;
            }
            let Some(url) = a.value().attr("href").and_then(|href| resolve(ctx.url, href)) else {
                continue;
            };
            if !seen.insert(&url) {
                continue;
            }
            log::debug!(
                "Index {} links to {}",
                ctx.url,
                wiki_page_name(&url).unwrap_or_else(|| url.clone())
            );
            out.hints.subpages.push(canonical_url(&url));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::QuestExtractor;
    use super::super::tests::ctx;
    use super::*;

    const PAGE: &str = r#"
<html><body><h1 id="firstHeading">Nightfall</h1>
<div id="mw-content-text">
  <p>See <a href="/wiki/List_of_Nightfall_quests">the quest list</a>,
     <a href="/wiki/List_of_Nightfall_quests#Istan">Istan quests</a> and
     <a href="/wiki/List_of_Nightfall_missions">missions</a>.</p>
  <p><a href="/wiki/List_of_Nightfall_skills">skills</a>
     <a href="/wiki/Category:List_of_quests">category</a></p>
  <div class="navbox"><a href="/wiki/List_of_Factions_quests">Factions</a></div>
</div></body></html>"#;

    #[test]
    fn test_collects_unique_list_links() {
        let extractor = QuestExtractor::new(ExtractorConfig::default());
        let out = extractor.extract(&ctx("https://wiki.example/wiki/Nightfall"), PAGE, None);

        assert_eq!(out.shape, Some(ShapeHint::CampaignIndex));
        assert!(out.candidates.is_empty());
        assert_eq!(
            out.hints.subpages,
            vec![
                "https://wiki.example/wiki/List_of_Nightfall_quests",
                "https://wiki.example/wiki/List_of_Nightfall_missions",
            ]
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_skips_self_link() {
        let page = r#"<div id="mw-content-text"><a href="/wiki/List_of_Nightfall_quests">self</a></div>"#;
        let extractor = QuestExtractor::new(ExtractorConfig::default());
        let out = extractor.extract(
            &ctx("https://wiki.example/wiki/List_of_Nightfall_quests"),
            page,
            Some(ShapeHint::CampaignIndex),
        );
        assert!(out.hints.subpages.is_empty());
    }
}
