use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::*;
use crate::db::MetadataRow;

const SEARCH_URL: &str = "https://www.imdb.com/search/keyword/?mode=advanced&page=";
const SEARCH_QUERY: &str =
    "&ref_=kw_nxt&title_type=movie&release_date=1989%2C2019&sort=year,asc&num_votes=10000%2C";
pub const PAGE_COUNT: usize = 138;

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div.lister-item.mode-advanced"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h3 > a"));
static YEAR: LazyLock<Selector> = LazyLock::new(|| selector("h3 span.lister-item-year"));
static RATING: LazyLock<Selector> = LazyLock::new(|| selector("strong"));
static METASCORE: LazyLock<Selector> = LazyLock::new(|| selector("span.metascore"));
static VOTES: LazyLock<Selector> = LazyLock::new(|| selector(r#"span[name="nv"]"#));
static MUTED: LazyLock<Selector> = LazyLock::new(|| selector("p.text-muted"));
static RUNTIME: LazyLock<Selector> = LazyLock::new(|| selector("span.runtime"));
static CERTIFICATE: LazyLock<Selector> = LazyLock::new(|| selector("span.certificate"));
static GENRE: LazyLock<Selector> = LazyLock::new(|| selector("span.genre"));
static CONTENT_P: LazyLock<Selector> = LazyLock::new(|| selector("div.lister-item-content p"));

/// Search result pages, oldest releases first.
pub fn page_urls() -> Vec<String> {
    (1..=PAGE_COUNT)
        .map(|page| format!("{}{}{}", SEARCH_URL, page, SEARCH_QUERY))
        .collect()
}

/// Flatten one search result page into metadata rows.
pub fn parse_listing(page: usize, html: &str) -> Vec<MetadataRow> {
    let doc = Html::parse_document(html);
    doc.select(&CONTAINER).map(|c| parse_container(page, c)).collect()
}

fn parse_container(page: usize, container: ElementRef<'_>) -> MetadataRow {
    let votes = container
        .select(&VOTES)
        .next()
        .and_then(|v| v.value().attr("data-value"))
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| NO_VOTES.to_string());

    let muted = container.select(&MUTED).next();
    let (runtime, certificate, genres) = match muted {
        Some(p) => (
            first_text(p, &RUNTIME, NO_RUNTIME),
            first_text(p, &CERTIFICATE, NO_CERTIFICATE),
            p.select(&GENRE)
                .next()
                .map(|g| text_of(g).split_whitespace().map(str::to_string).collect::<Vec<_>>())
                .unwrap_or_default(),
        ),
        None => (NO_RUNTIME.to_string(), NO_CERTIFICATE.to_string(), Vec::new()),
    };

    let (director, stars) = people(container);

    MetadataRow {
        page,
        title: first_text(container, &TITLE, NO_TITLE),
        year: first_text(container, &YEAR, NO_YEAR),
        rating: first_text(container, &RATING, NO_RATING),
        metascore: first_text(container, &METASCORE, NO_METASCORE),
        votes,
        runtime,
        certificate,
        genres,
        director,
        stars,
    }
}

/// Director and stars from the unclassed credits paragraph.
///
/// Links before the `|` separator are directors (only the first is kept),
/// links after it are stars.
fn people(container: ElementRef<'_>) -> (String, Vec<String>) {
    let credits = container
        .select(&CONTENT_P)
        .find(|p| p.value().attr("class").map_or(true, |c| c.trim().is_empty()));
    let Some(credits) = credits else {
        return (NO_DIRECTOR.to_string(), Vec::new());
    };

    let mut directors = Vec::new();
    let mut stars = Vec::new();
    let mut past_separator = false;
    for child in credits.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "span" if child.value().classes().any(|c| c == "ghost") => past_separator = true,
            "a" => {
                let name = text_of(child).trim().to_string();
                if past_separator {
                    stars.push(name);
                } else {
                    directors.push(name);
                }
            }
            _ => {}
        }
    }
    if !past_separator && directors.len() > 1 {
        stars = directors.split_off(1);
    }

    let director = directors
        .into_iter()
        .next()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| NO_DIRECTOR.to_string());
    (director, stars)
}
