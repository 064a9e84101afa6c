// src/services/extractor/mission_list.rs

//! Mission pages: bullet lists of mission links under region headings.

use scraper::Html;

use super::{
    Extraction, PageContext, PageShape, content_root, first_article_link, in_noise, page_title,
    selector, walk_sections,
};
use crate::models::{ExtractorConfig, QuestKind, QuestRecord, ShapeHint};
use crate::utils::canonical_title;

#[derive(Debug, Clone, Copy, Default)]
pub struct MissionListShape;

impl PageShape for MissionListShape {
    fn hint(&self) -> ShapeHint {
        ShapeHint::MissionList
    }

    fn detect(&self, doc: &Html) -> bool {
        let title = page_title(doc).to_lowercase();
        if !title.contains("mission") {
            return false;
        }
        let Some(item_link) = selector("li a[href]") else {
            return false;
        };
        content_root(doc)
            .select(&item_link)
            .any(|a| !in_noise(&a))
    }

    fn extract(
        &self,
        doc: &Html,
        ctx: &PageContext<'_>,
        config: &ExtractorConfig,
        out: &mut Extraction,
    ) {
        let items = walk_sections(content_root(doc), &["li"], config, out);
        for (heading, item) in items {
            let Some(link) = first_article_link(&item, ctx.url) else {
                continue;
            };
            // Only items that lead with the link; prose mentioning a mission is skipped
            let item_text: String = item.text().collect();
            if !item_text.trim_start().starts_with(link.text.trim()) {
                continue;
            }
            let Some(title) = canonical_title(&link.text) else {
                continue;
            };
            if config.is_ignored(&title) {
                continue;
            }

            out.candidates.push(QuestRecord::new(
                ctx.campaign,
                title,
                heading.unwrap_or_default(),
                QuestKind::Mission,
                link.url,
                ctx.extracted_at,
            )
            .with_title_limit(config.max_title_len));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::QuestExtractor;
    use super::super::tests::ctx;
    use super::*;

    const PAGE: &str = r#"
<html><body>
<h1 id="firstHeading">List of Nightfall missions</h1>
<div id="mw-content-text">
  <h2><span class="mw-headline">Istan</span></h2>
  <ul>
    <li><a href="/wiki/Chahbek_Village">Chahbek Village</a> (Kamadan)</li>
    <li><a href="/wiki/Jokanur_Diggings_(mission)">Jokanur Diggings (mission)</a></li>
    <li>Reward from <a href="/wiki/Somewhere">Somewhere</a></li>
  </ul>
  <h3><span class="mw-headline">Kourna</span></h3>
  <ol><li><a href="/wiki/Sunspear_Sanctuary">Sunspear Sanctuary</a></li></ol>
  <div class="navbox"><ul><li><a href="/wiki/Nav">Nav</a></li></ul></div>
</div></body></html>"#;

    #[test]
    fn test_detects_by_title() {
        assert!(MissionListShape.detect(&Html::parse_document(PAGE)));
        assert!(!MissionListShape.detect(&Html::parse_document(
            "<h1 id=\"firstHeading\">List of quests</h1><ul><li><a href=\"/wiki/A\">A</a></li></ul>"
        )));
    }

    #[test]
    fn test_extracts_leading_links_only() {
        let extractor = QuestExtractor::new(ExtractorConfig::default());
        let out = extractor.extract(
            &ctx("https://wiki.example/wiki/List_of_Nightfall_missions"),
            PAGE,
            Some(ShapeHint::MissionList),
        );

        let got: Vec<(&str, &str)> = out
            .candidates
            .iter()
            .map(|q| (q.title.as_str(), q.region_or_section.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Chahbek Village", "Istan"),
                ("Jokanur Diggings", "Istan"),
                ("Sunspear Sanctuary", "Kourna"),
            ]
        );
        assert!(out.candidates.iter().all(|q| q.kind == QuestKind::Mission));
        assert!(out.diagnostics.is_empty());
    }
}
