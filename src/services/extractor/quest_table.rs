// src/services/extractor/quest_table.rs

//! Side-quest list pages: one table row per quest.

use scraper::{ElementRef, Html};

use super::{
    Extraction, PageContext, PageShape, content_root, first_article_link, in_noise, selector,
    walk_sections,
};
use crate::models::{ExtractorConfig, QuestKind, QuestRecord, ShapeHint};
use crate::utils::{canonical_title, normalize_section};

/// Header words that mark a table as a quest listing.
const QUEST_TABLE_HEADERS: &[&str] = &["quest", "location", "given by", "type", "level"];

/// Layout of a qualifying table, from its header cells.
#[derive(Debug, Default, PartialEq, Eq)]
struct TableLayout {
    location_column: Option<usize>,
    type_column: Option<usize>,
}

/// Header-driven layout of `table`, or `None` when it is not a quest table.
fn table_layout(table: &ElementRef<'_>) -> Option<TableLayout> {
    let th = selector("th")?;
    let headers: Vec<String> = table
        .select(&th)
        .map(|h| h.text().collect::<String>().trim().to_lowercase())
        .collect();

    let qualifies = headers
        .iter()
        .any(|h| QUEST_TABLE_HEADERS.iter().any(|valid| h.contains(valid)));
    if !qualifies {
        return None;
    }

    Some(TableLayout {
        location_column: headers
            .iter()
            .position(|h| h.contains("location") || h.contains("given at")),
        type_column: headers.iter().position(|h| h.contains("type")),
    })
}

fn cell_text(cells: &[ElementRef<'_>], column: Option<usize>) -> Option<String> {
    column
        .and_then(|idx| cells.get(idx))
        .map(|cell| cell.text().collect())
}

/// Side-quest tables grouped under region headings.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestTableShape;

impl PageShape for QuestTableShape {
    fn hint(&self) -> ShapeHint {
        ShapeHint::QuestTable
    }

    fn detect(&self, doc: &Html) -> bool {
        let Some(table) = selector("table") else {
            return false;
        };
        content_root(doc)
            .select(&table)
            .any(|t| !in_noise(&t) && table_layout(&t).is_some())
    }

    fn extract(
        &self,
        doc: &Html,
        ctx: &PageContext<'_>,
        config: &ExtractorConfig,
        out: &mut Extraction,
    ) {
        let (Some(tr), Some(td), Some(th)) = (selector("tr"), selector("td"), selector("th"))
        else {
            return;
        };

        let tables = walk_sections(content_root(doc), &["table"], config, out);
        for (heading, table) in tables {
            let Some(layout) = table_layout(&table) else {
                continue;
            };

            for row in table.select(&tr) {
                if row.select(&th).next().is_some() {
                    continue;
                }
                let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
                let Some(first) = cells.first() else {
                    continue;
                };
                let Some(link) = first_article_link(first, ctx.url) else {
                    continue;
                };
                let Some(title) = canonical_title(&link.text) else {
                    continue;
                };
                if config.is_ignored(&title) {
                    continue;
                }

                let section = heading
                    .clone()
                    .or_else(|| {
                        cell_text(&cells, layout.location_column)
                            .and_then(|t| normalize_section(&t, config.max_section_len))
                    })
                    .unwrap_or_default();

                let kind = match cell_text(&cells, layout.type_column) {
                    Some(t) if t.to_lowercase().contains("primary") => QuestKind::Mission,
                    Some(t) if t.to_lowercase().contains("mission") => QuestKind::Mission,
                    _ => QuestKind::SideQuest,
                };

                out.candidates.push(QuestRecord::new(
                    ctx.campaign,
                    title,
                    section,
                    kind,
                    link.url,
                    ctx.extracted_at,
                )
                .with_title_limit(config.max_title_len));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::QuestExtractor;
    use super::super::tests::ctx;
    use super::*;

    const PAGE: &str = r##"
<html><head><title>List of Nightfall quests</title></head><body>
<h1 id="firstHeading">List of Nightfall quests</h1>
<div id="mw-content-text">
  <div id="toc"><h2>Contents</h2><ul><li><a href="#Istan">Istan</a></li></ul></div>
  <h2><span class="mw-headline">Istan</span><span class="mw-editsection">[edit]</span></h2>
  <table class="wikitable">
    <tr><th>Quest</th><th>Location</th><th>Type</th></tr>
    <tr><td><a href="/wiki/Vanguard_Outpost_(quest)">Vanguard Outpost (quest)</a></td><td>Kamadan</td><td>Secondary</td></tr>
    <tr><td><a href="/wiki/Chahbek_Village">Chahbek Village</a></td><td>Kamadan</td><td>Primary</td></tr>
    <tr><td><a href="/wiki/Category:Quests">Category:Quests</a></td><td></td><td></td></tr>
    <tr><td><a href="/wiki/Help:Editing">Location</a></td><td></td><td></td></tr>
  </table>
  <h2><span class="mw-headline">Kourna</span></h2>
  <table class="wikitable">
    <tr><th>Name</th><th>Given by</th></tr>
    <tr><td><a href="/wiki/Bad_Tide_Rising">Bad Tide Rising</a></td><td>Someone</td></tr>
  </table>
  <h2><span class="mw-headline">See also</span></h2>
  <table class="wikitable">
    <tr><th>Quest</th></tr>
    <tr><td><a href="/wiki/Unrelated">Unrelated</a></td></tr>
  </table>
  <table class="navbox"><tr><th>Quest</th></tr><tr><td><a href="/wiki/Nav_Quest">Nav Quest</a></td></tr></table>
</div></body></html>"##;

    #[test]
    fn test_detects_quest_table() {
        assert!(QuestTableShape.detect(&Html::parse_document(PAGE)));
        assert!(!QuestTableShape.detect(&Html::parse_document(
            "<div id=\"mw-content-text\"><table><tr><th>Skill</th></tr></table></div>"
        )));
    }

    #[test]
    fn test_extracts_rows_under_headings() {
        let extractor = QuestExtractor::new(ExtractorConfig::default());
        let out = extractor.extract(&ctx("https://wiki.example/wiki/List"), PAGE, None);

        assert_eq!(out.shape, Some(ShapeHint::QuestTable));
        let got: Vec<(&str, &str)> = out
            .candidates
            .iter()
            .map(|q| (q.title.as_str(), q.region_or_section.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Vanguard Outpost", "Istan"),
                ("Chahbek Village", "Istan"),
                ("Bad Tide Rising", "Kourna"),
            ]
        );
        assert_eq!(out.candidates[1].kind, QuestKind::Mission);
        assert_eq!(
            out.candidates[0].wiki_url,
            "https://wiki.example/wiki/Vanguard_Outpost_(quest)"
        );
        assert_eq!(out.hints.sections, vec!["Istan", "Kourna"]);
    }

    #[test]
    fn test_long_titles_keep_distinct_keys() {
        let page = r#"<div id="mw-content-text"><h2>Istan</h2><table>
            <tr><th>Quest</th></tr>
            <tr><td><a href="/wiki/A">The Kodash Bazaar Errand, Part One</a></td></tr>
            <tr><td><a href="/wiki/B">The Kodash Bazaar Errand, Part Two</a></td></tr>
        </table></div>"#;
        let config = ExtractorConfig {
            max_title_len: 16,
            ..ExtractorConfig::default()
        };
        let extractor = QuestExtractor::new(config);
        let out = extractor.extract(&ctx("https://wiki.example/wiki/List"), page, None);

        assert_eq!(out.candidates.len(), 2);
        assert_eq!(out.candidates[0].title, "The Kodash Bazaa...");
        assert_eq!(out.candidates[0].title, out.candidates[1].title);
        assert_ne!(out.candidates[0].quest_key, out.candidates[1].quest_key);
    }

    #[test]
    fn test_location_column_when_no_heading() {
        let page = r#"<div id="mw-content-text"><table>
            <tr><th>Quest</th><th>Location</th></tr>
            <tr><td><a href="/wiki/The_Blazefiend">The Blazefiend</a></td><td>Ascalon City</td></tr>
            <tr><td><a href="/wiki/Orphan">Orphan Quest</a></td></tr>
        </table></div>"#;
        let extractor = QuestExtractor::new(ExtractorConfig::default());
        let out = extractor.extract(&ctx("https://wiki.example/wiki/List"), page, None);

        assert_eq!(out.candidates.len(), 2);
        assert_eq!(out.candidates[0].region_or_section, "Ascalon City");
        assert_eq!(out.candidates[1].region_or_section, "");
    }
}
