use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::*;
use crate::db::FinancialRow;

const BUDGETS_URL: &str = "https://www.the-numbers.com/movie/budgets/all";
const ROWS_PER_PAGE: usize = 100;

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));

/// The budgets list: the bare URL, then one page per hundred rows up to 6001.
pub fn page_urls() -> Vec<String> {
    std::iter::once(BUDGETS_URL.to_string())
        .chain((101..=6001).step_by(100).map(|start| format!("{}/{}", BUDGETS_URL, start)))
        .collect()
}

/// Flatten the first table on a budgets page.
pub fn parse_table(page: usize, html: &str) -> Vec<FinancialRow> {
    let doc = Html::parse_document(html);
    let Some(table) = doc.select(&TABLE).next() else {
        warn!("financials page {}: no table found", page);
        return Vec::new();
    };

    table
        .select(&ROW)
        .skip(1)
        .take(ROWS_PER_PAGE)
        .filter_map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            if cells.len() < 6 {
                return None;
            }
            Some(FinancialRow {
                page,
                release_date: first_text(cells[1], &LINK, NO_RELEASE_DATE),
                title: first_text(cells[2], &LINK, NO_MOVIE_NAME),
                production_budget: cell_text(cells[3], NO_BUDGET),
                domestic_gross: cell_text(cells[4], NO_DOMESTIC_GROSS),
                worldwide_gross: cell_text(cells[5], NO_WORLDWIDE_GROSS),
            })
        })
        .collect()
}

fn cell_text(cell: ElementRef<'_>, fallback: &str) -> String {
    let t = text_of(cell);
    let t = t.trim();
    if t.is_empty() {
        fallback.to_string()
    } else {
        t.to_string()
    }
}
