use std::collections::HashMap;

use chrono::NaiveDate;

use super::clean::{Financial, Movie, StarRank};

/// Titles released on or after this date are still earning and are excluded.
pub const RELEASE_CUTOFF: NaiveDate = match NaiveDate::from_ymd_opt(2020, 1, 1) {
    Some(d) => d,
    None => panic!("invalid cutoff"),
};

/// A metadata row with its financials and (if ranked) its star's popularity.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub movie: Movie,
    pub release_date: NaiveDate,
    pub production_budget: u64,
    pub domestic_gross: u64,
    pub worldwide_gross: u64,
    pub star_ranking: Option<u32>,
    pub star_role: Option<String>,
    pub star_points: u32,
}

/// Join metadata to financials on (title, year) and then to rankings on star name.
///
/// Unmatched financials drop the row; unmatched stars keep it with zero points.
/// When a key repeats on the right-hand side the first record wins.
pub fn merge(
    movies: &[Movie],
    financials: &[Financial],
    rankings: &[StarRank],
    cutoff: NaiveDate,
) -> Vec<JoinedRecord> {
    let mut by_title: HashMap<(&str, i32), &Financial> = HashMap::new();
    for f in financials {
        by_title.entry((f.title.as_str(), f.year)).or_insert(f);
    }
    let mut by_name: HashMap<&str, &StarRank> = HashMap::new();
    for s in rankings {
        by_name.entry(s.name.as_str()).or_insert(s);
    }

    movies
        .iter()
        .filter_map(|m| {
            let f = by_title.get(&(m.title.as_str(), m.year))?;
            if f.release_date >= cutoff {
                return None;
            }
            let rank = m.star.as_deref().and_then(|s| by_name.get(s));
            Some(JoinedRecord {
                movie: m.clone(),
                release_date: f.release_date,
                production_budget: f.production_budget,
                domestic_gross: f.domestic_gross,
                worldwide_gross: f.worldwide_gross,
                star_ranking: rank.map(|r| r.ranking),
                star_role: rank.and_then(|r| r.role.clone()),
                star_points: rank.map_or(0, |r| r.star_points),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, year: i32, star: Option<&str>) -> Movie {
        Movie {
            title: title.into(),
            year,
            rating: Some(7.0),
            metascore: 60.0,
            votes: 10_000,
            runtime: 100,
            certificate: "PG".into(),
            genre_count: 1,
            genre: "Drama".into(),
            director: "Someone".into(),
            star: star.map(str::to_string),
        }
    }

    fn financial(title: &str, y: i32, m: u32, d: u32, gross: u64) -> Financial {
        Financial {
            title: title.into(),
            release_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            year: y,
            production_budget: 1,
            domestic_gross: gross,
            worldwide_gross: gross * 2,
        }
    }

    fn rank(name: &str, ranking: u32, points: u32) -> StarRank {
        StarRank {
            name: name.into(),
            ranking,
            role: Some("Actor".into()),
            star_points: points,
        }
    }

    #[test]
    fn unmatched_financials_are_dropped() {
        let movies = vec![movie("Heat", 1995, None), movie("Heat", 1986, None)];
        let fin = vec![financial("Heat", 1995, 12, 15, 67)];
        let joined = merge(&movies, &fin, &[], RELEASE_CUTOFF);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].movie.year, 1995);
        assert_eq!(joined[0].domestic_gross, 67);
    }

    #[test]
    fn cutoff_excludes_recent_releases() {
        let movies = vec![movie("Late", 2019, None), movie("Later", 2020, None)];
        let fin = vec![
            financial("Late", 2019, 12, 31, 1),
            financial("Later", 2020, 1, 1, 1),
        ];
        let joined = merge(&movies, &fin, &[], RELEASE_CUTOFF);
        assert_eq!(joined.len(), 1);
        assert!(joined.iter().all(|j| j.release_date < RELEASE_CUTOFF));
    }

    #[test]
    fn unranked_star_defaults_to_zero_points() {
        let movies = vec![
            movie("Heat", 1995, Some("Al Pacino")),
            movie("Heat", 1995, Some("Nobody")),
            movie("Heat", 1995, None),
        ];
        let fin = vec![financial("Heat", 1995, 12, 15, 67)];
        let ranks = vec![rank("Al Pacino", 1, 1000)];
        let joined = merge(&movies, &fin, &ranks, RELEASE_CUTOFF);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined[0].star_points, 1000);
        assert_eq!(joined[0].star_ranking, Some(1));
        assert_eq!(joined[1].star_points, 0);
        assert_eq!(joined[1].star_ranking, None);
        assert_eq!(joined[2].star_points, 0);
    }

    #[test]
    fn duplicate_keys_do_not_multiply_rows() {
        let movies = vec![movie("Heat", 1995, Some("Al Pacino"))];
        let fin = vec![
            financial("Heat", 1995, 12, 15, 67),
            financial("Heat", 1995, 12, 15, 99),
        ];
        let ranks = vec![rank("Al Pacino", 1, 1000), rank("Al Pacino", 7, 994)];
        let joined = merge(&movies, &fin, &ranks, RELEASE_CUTOFF);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].domestic_gross, 67);
        assert_eq!(joined[0].star_ranking, Some(1));
    }
}
