use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::merge::JoinedRecord;
use crate::collect::NO_DIRECTOR;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRecord {
    pub joined: JoinedRecord,
    pub star_power: f64,
    pub star_appearances: usize,
    pub director_power: f64,
    pub title_length: usize,
    pub month: String,
}

/// Mean and count of a key's grosses from strictly earlier releases.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Prior {
    pub mean: f64,
    pub count: usize,
}

type TitleKey<'a> = (&'a str, &'a str, NaiveDate);

/// Historical averages as of each title's release.
///
/// Entries are (key, title, release date, gross). Duplicate entries count
/// once, so a title expanded over several genres is one appearance. Titles
/// sharing a release date never see each other.
pub fn priors<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a str, NaiveDate, u64)>,
) -> HashMap<TitleKey<'a>, Prior> {
    // sorted by key, then date
    let distinct: BTreeSet<(&str, NaiveDate, &str, u64)> = entries
        .into_iter()
        .map(|(key, title, date, gross)| (key, date, title, gross))
        .collect();
    let distinct: Vec<_> = distinct.into_iter().collect();

    let mut out = HashMap::with_capacity(distinct.len());
    let mut i = 0;
    while i < distinct.len() {
        let key = distinct[i].0;
        let mut sum = 0u128;
        let mut count = 0usize;

        while i < distinct.len() && distinct[i].0 == key {
            let date = distinct[i].1;
            let prior = Prior {
                mean: if count == 0 { 0.0 } else { sum as f64 / count as f64 },
                count,
            };
            let mut j = i;
            while j < distinct.len() && distinct[j].0 == key && distinct[j].1 == date {
                let (_, _, title, gross) = distinct[j];
                out.insert((key, title, date), prior);
                sum += gross as u128;
                count += 1;
                j += 1;
            }
            i = j;
        }
    }
    out
}

/// Add star power, director power, title length and release month.
pub fn engineer(joined: Vec<JoinedRecord>) -> Vec<EngineeredRecord> {
    let (star_priors, director_priors) = {
        let stars = priors(joined.iter().filter_map(|j| {
            let star = j.movie.star.as_deref()?;
            Some((star, j.movie.title.as_str(), j.release_date, j.domestic_gross))
        }));
        let directors = priors(
            joined
                .iter()
                .filter(|j| j.movie.director != NO_DIRECTOR)
                .map(|j| {
                    (
                        j.movie.director.as_str(),
                        j.movie.title.as_str(),
                        j.release_date,
                        j.domestic_gross,
                    )
                }),
        );
        (
            resolve(&joined, &stars, |j| j.movie.star.as_deref()),
            resolve(&joined, &directors, |j| {
                Some(j.movie.director.as_str()).filter(|d| *d != NO_DIRECTOR)
            }),
        )
    };

    let mut out: Vec<EngineeredRecord> = joined
        .into_iter()
        .zip(star_priors.into_iter().zip(director_priors))
        .map(|(joined, (star, director))| EngineeredRecord {
            title_length: joined.movie.title.chars().count(),
            month: joined.release_date.format("%b").to_string(),
            star_power: star.mean,
            star_appearances: star.count,
            director_power: director.mean,
            joined,
        })
        .collect();

    out.sort_by_key(|e| e.joined.release_date);
    out
}

/// Look up each record's prior under the key chosen by `key_of`.
fn resolve<F>(joined: &[JoinedRecord], table: &HashMap<TitleKey<'_>, Prior>, key_of: F) -> Vec<Prior>
where
    F: Fn(&JoinedRecord) -> Option<&str>,
{
    joined
        .iter()
        .map(|j| {
            key_of(j)
                .and_then(|key| table.get(&(key, j.movie.title.as_str(), j.release_date)))
                .copied()
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::clean::Movie;

    fn record(title: &str, director: &str, star: Option<&str>, date: (i32, u32, u32), gross: u64) -> JoinedRecord {
        JoinedRecord {
            movie: Movie {
                title: title.into(),
                year: date.0,
                rating: None,
                metascore: 50.0,
                votes: 20_000,
                runtime: 110,
                certificate: "R".into(),
                genre_count: 1,
                genre: "Drama".into(),
                director: director.into(),
                star: star.map(str::to_string),
            },
            release_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            production_budget: 10,
            domestic_gross: gross,
            worldwide_gross: gross,
            star_ranking: None,
            star_role: None,
            star_points: 0,
        }
    }

    /// Rescan the whole table for every record.
    fn quadratic_power(all: &[JoinedRecord], j: &JoinedRecord, key: impl Fn(&JoinedRecord) -> Option<String>) -> (f64, usize) {
        let Some(k) = key(j) else { return (0.0, 0) };
        let earlier: BTreeSet<(&str, NaiveDate, u64)> = all
            .iter()
            .filter(|o| key(*o).as_deref() == Some(k.as_str()) && o.release_date < j.release_date)
            .map(|o| (o.movie.title.as_str(), o.release_date, o.domestic_gross))
            .collect();
        if earlier.is_empty() {
            return (0.0, 0);
        }
        let sum: u64 = earlier.iter().map(|e| e.2).sum();
        (sum as f64 / earlier.len() as f64, earlier.len())
    }

    #[test]
    fn director_power_uses_only_earlier_titles() {
        let joined = vec![
            record("Second", "Mann", None, (1999, 11, 5), 200),
            record("First", "Mann", None, (1995, 12, 15), 100),
        ];
        let out = engineer(joined);
        assert_eq!(out[0].joined.movie.title, "First");
        assert_eq!(out[0].director_power, 0.0);
        assert_eq!(out[1].director_power, 100.0);
    }

    #[test]
    fn star_power_counts_each_title_once() {
        // Earlier title expanded over two genres
        let mut drama = record("Heat", "Mann", Some("Pacino"), (1995, 12, 15), 100);
        let mut crime = drama.clone();
        drama.movie.genre = "Drama".into();
        crime.movie.genre = "Crime".into();
        let later = record("Insider", "Mann", Some("Pacino"), (1999, 11, 5), 30);
        let other = record("Scarface", "De Palma", Some("Pacino"), (1983, 12, 9), 40);

        let out = engineer(vec![drama, crime, later, other]);
        let insider = out.iter().find(|e| e.joined.movie.title == "Insider").unwrap();
        assert_eq!(insider.star_appearances, 2);
        assert_eq!(insider.star_power, 70.0);
        assert_eq!(insider.director_power, 100.0);
        let heat: Vec<_> = out.iter().filter(|e| e.joined.movie.title == "Heat").collect();
        assert!(heat.iter().all(|e| e.star_power == 40.0 && e.star_appearances == 1));
    }

    #[test]
    fn same_day_releases_do_not_count() {
        let out = engineer(vec![
            record("A", "X", Some("S"), (2001, 6, 1), 10),
            record("B", "X", Some("S"), (2001, 6, 1), 20),
            record("C", "X", Some("S"), (2002, 6, 1), 30),
        ]);
        assert_eq!(out[0].star_power, 0.0);
        assert_eq!(out[1].star_power, 0.0);
        assert_eq!(out[2].star_power, 15.0);
        assert_eq!(out[2].star_appearances, 2);
    }

    #[test]
    fn missing_keys_have_no_power() {
        let out = engineer(vec![
            record("A", NO_DIRECTOR, None, (2001, 6, 1), 10),
            record("B", NO_DIRECTOR, None, (2002, 6, 1), 20),
        ]);
        assert!(out.iter().all(|e| e.director_power == 0.0 && e.star_power == 0.0));
    }

    #[test]
    fn matches_full_rescan() {
        let names = ["Ann", "Bo", "Cy"];
        let mut joined = Vec::new();
        for i in 0..40u32 {
            let star = names[(i % 3) as usize];
            let director = names[(i % 2) as usize];
            let date = (1990 + (i % 7) as i32, 1 + i % 12, 1 + i % 28);
            joined.push(record(&format!("T{}", i % 25), director, Some(star), date, 10 * (i as u64 + 1)));
        }

        let star = |j: &JoinedRecord| j.movie.star.clone();
        let director = |j: &JoinedRecord| Some(j.movie.director.clone());
        let out = engineer(joined.clone());
        for e in &out {
            let (sp, sa) = quadratic_power(&joined, &e.joined, star);
            let (dp, _) = quadratic_power(&joined, &e.joined, director);
            assert!((e.star_power - sp).abs() < 1e-9, "{:?}", e.joined.movie.title);
            assert_eq!(e.star_appearances, sa);
            assert!((e.director_power - dp).abs() < 1e-9);
        }
    }

    #[test]
    fn title_length_and_month() {
        let out = engineer(vec![record("Amélie", "Jeunet", None, (2001, 4, 25), 1)]);
        assert_eq!(out[0].title_length, 6);
        assert_eq!(out[0].month, "Apr");
    }
}
