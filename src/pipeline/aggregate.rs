use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::features::EngineeredRecord;

/// One row per title and genre, star measures averaged over the cast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieGenreRow {
    pub title: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub metascore: f64,
    pub votes: u64,
    pub runtime: u32,
    pub title_length: usize,
    pub certificate: String,
    pub genre: String,
    pub genre_count: usize,
    pub director: String,
    pub release_date: NaiveDate,
    pub month: String,
    pub production_budget: u64,
    pub domestic_gross: u64,
    pub worldwide_gross: u64,
    pub director_power: f64,
    pub star_power: f64,
    pub star_points: f64,
    pub star_appearances: usize,
}

/// One row per title, the modeling table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieRow {
    pub title: String,
    pub rating: Option<f64>,
    pub metascore: f64,
    pub votes: u64,
    pub runtime: u32,
    pub certificate: String,
    pub year: i32,
    pub month: String,
    pub release_date: NaiveDate,
    pub genre_count: usize,
    pub director: String,
    pub title_length: usize,
    pub production_budget: u64,
    pub director_power: f64,
    pub star_power: f64,
    pub star_appearances: usize,
    pub star_points: f64,
    pub worldwide_gross: u64,
    pub domestic_gross: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Outputs {
    pub movies: Vec<MovieRow>,
    pub movie_genres: Vec<MovieGenreRow>,
}

// Every non-star column. Floats compare by bit pattern.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey<'a> {
    title: &'a str,
    release_date: NaiveDate,
    genre: &'a str,
    year: i32,
    rating: Option<u64>,
    metascore: u64,
    votes: u64,
    runtime: u32,
    title_length: usize,
    certificate: &'a str,
    genre_count: usize,
    director: &'a str,
    month: &'a str,
    production_budget: u64,
    domestic_gross: u64,
    worldwide_gross: u64,
    director_power: u64,
}

#[derive(Default)]
struct StarTotals<'a> {
    first: Option<&'a EngineeredRecord>,
    rows: usize,
    star_power: f64,
    star_points: f64,
    star_appearances: usize,
}

impl<'a> GroupKey<'a> {
    fn of(e: &'a EngineeredRecord) -> Self {
        let m = &e.joined.movie;
        GroupKey {
            title: &m.title,
            release_date: e.joined.release_date,
            genre: &m.genre,
            year: m.year,
            rating: m.rating.map(f64::to_bits),
            metascore: m.metascore.to_bits(),
            votes: m.votes,
            runtime: m.runtime,
            title_length: e.title_length,
            certificate: &m.certificate,
            genre_count: m.genre_count,
            director: &m.director,
            month: &e.month,
            production_budget: e.joined.production_budget,
            domestic_gross: e.joined.domestic_gross,
            worldwide_gross: e.joined.worldwide_gross,
            director_power: e.director_power.to_bits(),
        }
    }
}

/// Collapse the star expansion, then the genre expansion.
///
/// Output order depends only on the grouped values, so the same input always
/// produces the same tables.
pub fn aggregate(engineered: &[EngineeredRecord]) -> Outputs {
    let mut groups: BTreeMap<GroupKey<'_>, StarTotals<'_>> = BTreeMap::new();
    for e in engineered {
        let t = groups.entry(GroupKey::of(e)).or_default();
        t.first.get_or_insert(e);
        t.rows += 1;
        t.star_power += e.star_power;
        t.star_points += e.joined.star_points as f64;
        t.star_appearances += e.star_appearances;
    }

    let movie_genres: Vec<MovieGenreRow> = groups
        .into_values()
        .filter_map(|t| {
            let e = t.first?;
            let m = &e.joined.movie;
            Some(MovieGenreRow {
                title: m.title.clone(),
                year: m.year,
                rating: m.rating,
                metascore: m.metascore,
                votes: m.votes,
                runtime: m.runtime,
                title_length: e.title_length,
                certificate: m.certificate.clone(),
                genre: m.genre.clone(),
                genre_count: m.genre_count,
                director: m.director.clone(),
                release_date: e.joined.release_date,
                month: e.month.clone(),
                production_budget: e.joined.production_budget,
                domestic_gross: e.joined.domestic_gross,
                worldwide_gross: e.joined.worldwide_gross,
                director_power: e.director_power,
                star_power: t.star_power / t.rows as f64,
                star_points: t.star_points / t.rows as f64,
                star_appearances: t.star_appearances,
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let movies = movie_genres
        .iter()
        .filter(|g| seen.insert((g.title.clone(), g.release_date)))
        .map(|g| MovieRow {
            title: g.title.clone(),
            rating: g.rating,
            metascore: g.metascore,
            votes: g.votes,
            runtime: g.runtime,
            certificate: g.certificate.clone(),
            year: g.year,
            month: g.month.clone(),
            release_date: g.release_date,
            genre_count: g.genre_count,
            director: g.director.clone(),
            title_length: g.title_length,
            production_budget: g.production_budget,
            director_power: g.director_power,
            star_power: g.star_power,
            star_appearances: g.star_appearances,
            star_points: g.star_points,
            worldwide_gross: g.worldwide_gross,
            domestic_gross: g.domestic_gross,
        })
        .collect();

    Outputs { movies, movie_genres }
}
