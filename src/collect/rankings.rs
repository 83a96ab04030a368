use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::*;
use crate::db::RankingRow;

const FIRST_PAGE: &str = "https://www.imdb.com/search/name/?gender=male,female&ref_=rlm";
const PAGE_URL: &str = "https://www.imdb.com/search/name/?gender=male,female&start=";

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div.lister-item"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img[alt]"));
static INDEX: LazyLock<Selector> = LazyLock::new(|| selector("span.lister-item-index"));
static MUTED: LazyLock<Selector> = LazyLock::new(|| selector("p.text-muted"));

/// The top 1000 names, fifty per page.
pub fn page_urls() -> Vec<String> {
    std::iter::once(FIRST_PAGE.to_string())
        .chain((51..=951).step_by(50).map(|start| format!("{}{}&ref_=rlm", PAGE_URL, start)))
        .collect()
}

pub fn parse_listing(page: usize, html: &str) -> Vec<RankingRow> {
    let doc = Html::parse_document(html);
    doc.select(&CONTAINER)
        .map(|c| RankingRow {
            page,
            name: c
                .select(&IMAGE)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .filter(|alt| !alt.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| NO_NAME.to_string()),
            // raw "12. "; the trailing marker is stripped during cleaning
            ranking: c
                .select(&INDEX)
                .next()
                .map(text_of)
                .unwrap_or_else(|| NO_RANKING.to_string()),
            role: c
                .select(&MUTED)
                .next()
                .and_then(own_text)
                .unwrap_or_else(|| NO_TYPE.to_string()),
        })
        .collect()
}

/// First non-blank text node directly under `el`.
fn own_text(el: ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(|node| node.value().as_text().map(|t| String::from(&**t)))
        .find(|t| !t.trim().is_empty())
}
