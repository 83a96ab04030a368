use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::collect::*;
use crate::db::{FinancialRow, MetadataRow, RankingRow};

static RUNTIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([\d,]+)\s*min$").unwrap());
static RANK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([\d,]+)\.?$").unwrap());

/// Certificates kept from the metadata source. TV and legacy ratings are dropped.
pub const ALLOWED_CERTIFICATES: &[&str] =
    &["G", "PG", "PG-13", "R", "NC-17", "Not Rated", "not rated", "Unrated"];
pub const NOT_RATED: &str = "Not Rated";

const RELEASE_DATE_FORMAT: &str = "%b %d, %Y";

/// Metadata for one (title, genre, star) combination.
#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub title: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub metascore: f64,
    pub votes: u64,
    pub runtime: u32,
    pub certificate: String,
    pub genre_count: usize,
    pub genre: String,
    pub director: String,
    pub star: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Financial {
    pub title: String,
    pub release_date: NaiveDate,
    pub year: i32,
    pub production_budget: u64,
    pub domestic_gross: u64,
    pub worldwide_gross: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StarRank {
    pub name: String,
    pub ranking: u32,
    pub role: Option<String>,
    /// Higher is more popular; the top ranked name gets the most points.
    pub star_points: u32,
}

/// Type the metadata listings and expand them to one row per genre and star.
pub fn clean_metadata(rows: &[MetadataRow]) -> Result<Vec<Movie>> {
    let mut out = Vec::new();

    for r in rows {
        if r.title == NO_TITLE
            || r.year == NO_YEAR
            || r.metascore == NO_METASCORE
            || r.votes == NO_VOTES
            || r.runtime == NO_RUNTIME
            || r.genres.is_empty()
            || !ALLOWED_CERTIFICATES.contains(&r.certificate.as_str())
        {
            continue;
        }

        let year = parse_year(&r.year).with_context(|| format!("Bad year for {:?}", r.title))?;
        let metascore: f64 = r
            .metascore
            .trim()
            .parse()
            .with_context(|| format!("Bad metascore {:?} for {:?}", r.metascore, r.title))?;
        let rating = if r.rating == NO_RATING {
            None
        } else {
            Some(
                r.rating
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("Bad rating {:?} for {:?}", r.rating, r.title))?,
            )
        };
        let votes = r
            .votes
            .replace(',', "")
            .parse::<u64>()
            .with_context(|| format!("Bad votes {:?} for {:?}", r.votes, r.title))?;
        let runtime = parse_runtime(&r.runtime).with_context(|| format!("Bad runtime for {:?}", r.title))?;
        let certificate = normalize_certificate(&r.certificate);

        let genre_count = r.genres.len();
        let genres: Vec<String> = r
            .genres
            .iter()
            .map(|g| g.replace(',', ""))
            .filter(|g| !g.is_empty())
            .collect();
        let stars: Vec<Option<String>> = if r.stars.is_empty() {
            vec![None]
        } else {
            r.stars.iter().cloned().map(Some).collect()
        };

        for genre in &genres {
            for star in &stars {
                out.push(Movie {
                    title: r.title.clone(),
                    year,
                    rating,
                    metascore,
                    votes,
                    runtime,
                    certificate: certificate.clone(),
                    genre_count,
                    genre: genre.clone(),
                    director: r.director.clone(),
                    star: star.clone(),
                });
            }
        }
    }

    Ok(out)
}

/// Type the budget rows; rows without a full release date are dropped.
pub fn clean_financials(rows: &[FinancialRow]) -> Result<Vec<Financial>> {
    let mut out = Vec::with_capacity(rows.len());

    for r in rows {
        if r.release_date == NO_RELEASE_DATE
            || r.release_date.chars().count() < 11
            || r.title == NO_MOVIE_NAME
            || r.production_budget == NO_BUDGET
            || r.domestic_gross == NO_DOMESTIC_GROSS
            || r.worldwide_gross == NO_WORLDWIDE_GROSS
        {
            continue;
        }

        let release_date = NaiveDate::parse_from_str(r.release_date.trim(), RELEASE_DATE_FORMAT)
            .with_context(|| format!("Bad release date {:?} for {:?}", r.release_date, r.title))?;

        out.push(Financial {
            title: r.title.clone(),
            year: release_date.year(),
            release_date,
            production_budget: parse_money(&r.production_budget)?,
            domestic_gross: parse_money(&r.domestic_gross)?,
            worldwide_gross: parse_money(&r.worldwide_gross)?,
        });
    }

    Ok(out)
}

/// Parse ranks and derive star points as the rank counted from the bottom.
pub fn clean_rankings(rows: &[RankingRow]) -> Result<Vec<StarRank>> {
    let mut out = Vec::with_capacity(rows.len());

    for r in rows {
        if r.name == NO_NAME || r.ranking == NO_RANKING {
            continue;
        }
        let caps = match RANK_RE.captures(r.ranking.trim()) {
            Some(c) => c,
            None => bail!("Bad ranking {:?} for {:?}", r.ranking, r.name),
        };
        let ranking: u32 = caps[1]
            .replace(',', "")
            .parse()
            .with_context(|| format!("Bad ranking {:?} for {:?}", r.ranking, r.name))?;
        let role = Some(r.role.trim().to_string()).filter(|t| !t.is_empty() && t != NO_TYPE);

        out.push(StarRank {
            name: r.name.trim().to_string(),
            ranking,
            role,
            star_points: 0,
        });
    }

    let max_rank = out.iter().map(|s| s.ranking).max().unwrap_or(0);
    for s in &mut out {
        s.star_points = max_rank + 1 - s.ranking;
    }

    Ok(out)
}

/// `"(2015)"` and `"(I) (2015)"` both yield 2015.
fn parse_year(raw: &str) -> Result<i32> {
    let chars: Vec<char> = raw.trim().chars().collect();
    if chars.len() < 5 {
        bail!("Year text {:?} too short", raw);
    }
    let digits: String = chars[chars.len() - 5..chars.len() - 1].iter().collect();
    digits
        .parse()
        .with_context(|| format!("Year text {:?} has no trailing year", raw))
}

fn parse_runtime(raw: &str) -> Result<u32> {
    let Some(caps) = RUNTIME_RE.captures(raw.trim()) else {
        bail!("Runtime {:?} is not in minutes", raw);
    };
    Ok(caps[1].replace(',', "").parse()?)
}

fn parse_money(raw: &str) -> Result<u64> {
    raw.trim()
        .replace(['$', ','], "")
        .parse()
        .with_context(|| format!("Bad amount {:?}", raw))
}

fn normalize_certificate(raw: &str) -> String {
    match raw {
        "not rated" | "Unrated" => NOT_RATED.to_string(),
        other => other.to_string(),
    }
}
