use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::pipeline::aggregate::{MovieGenreRow, MovieRow};

pub const DB_PATH: &str = "data/movies.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Raw collector output, one table per source
        CREATE TABLE IF NOT EXISTS raw_metadata (
            id           INTEGER PRIMARY KEY,
            page         INTEGER NOT NULL,
            title        TEXT NOT NULL,
            year         TEXT NOT NULL,
            rating       TEXT NOT NULL,
            metascore    TEXT NOT NULL,
            votes        TEXT NOT NULL,
            runtime      TEXT NOT NULL,
            certificate  TEXT NOT NULL,
            genres       TEXT NOT NULL,
            director     TEXT NOT NULL,
            stars        TEXT NOT NULL,
            scraped_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS raw_financials (
            id                INTEGER PRIMARY KEY,
            page              INTEGER NOT NULL,
            title             TEXT NOT NULL,
            release_date      TEXT NOT NULL,
            production_budget TEXT NOT NULL,
            domestic_gross    TEXT NOT NULL,
            worldwide_gross   TEXT NOT NULL,
            scraped_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS raw_rankings (
            id          INTEGER PRIMARY KEY,
            page        INTEGER NOT NULL,
            name        TEXT NOT NULL,
            ranking     TEXT NOT NULL,
            role        TEXT NOT NULL,
            scraped_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Pipeline output
        CREATE TABLE IF NOT EXISTS movies (
            title             TEXT NOT NULL,
            rating            REAL,
            metascore         REAL NOT NULL,
            votes             INTEGER NOT NULL,
            runtime           INTEGER NOT NULL,
            certificate       TEXT NOT NULL,
            year              INTEGER NOT NULL,
            month             TEXT NOT NULL,
            release_date      TEXT NOT NULL,
            genre_count       INTEGER NOT NULL,
            director          TEXT NOT NULL,
            title_length      INTEGER NOT NULL,
            production_budget INTEGER NOT NULL,
            director_power    REAL NOT NULL,
            star_power        REAL NOT NULL,
            star_appearances  INTEGER NOT NULL,
            star_points       REAL NOT NULL,
            worldwide_gross   INTEGER NOT NULL,
            domestic_gross    INTEGER NOT NULL,
            UNIQUE(title, release_date)
        );
        CREATE INDEX IF NOT EXISTS idx_movies_certificate ON movies(certificate);

        CREATE TABLE IF NOT EXISTS movie_genres (
            title             TEXT NOT NULL,
            release_date      TEXT NOT NULL,
            genre             TEXT NOT NULL,
            rating            REAL,
            metascore         REAL NOT NULL,
            votes             INTEGER NOT NULL,
            runtime           INTEGER NOT NULL,
            certificate       TEXT NOT NULL,
            year              INTEGER NOT NULL,
            month             TEXT NOT NULL,
            genre_count       INTEGER NOT NULL,
            director          TEXT NOT NULL,
            title_length      INTEGER NOT NULL,
            production_budget INTEGER NOT NULL,
            domestic_gross    INTEGER NOT NULL,
            worldwide_gross   INTEGER NOT NULL,
            director_power    REAL NOT NULL,
            star_power        REAL NOT NULL,
            star_points       REAL NOT NULL,
            star_appearances  INTEGER NOT NULL
        );
        -- A title relisted with drifted values is kept as separate rows
        CREATE INDEX IF NOT EXISTS idx_movie_genres_title ON movie_genres(title, release_date, genre);
        CREATE INDEX IF NOT EXISTS idx_movie_genres_genre ON movie_genres(genre);
        ",
    )?;
    Ok(())
}

// ── Raw collector rows ──

/// One listing on the metadata source. Absent scalar fields hold a sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub page: usize,
    pub title: String,
    pub year: String,
    pub rating: String,
    pub metascore: String,
    pub votes: String,
    pub runtime: String,
    pub certificate: String,
    pub genres: Vec<String>,
    pub director: String,
    pub stars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialRow {
    pub page: usize,
    pub title: String,
    pub release_date: String,
    pub production_budget: String,
    pub domestic_gross: String,
    pub worldwide_gross: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub page: usize,
    pub name: String,
    pub ranking: String,
    pub role: String,
}

/// Replace the raw metadata table with `rows`.
pub fn replace_metadata(conn: &Connection, rows: &[MetadataRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM raw_metadata", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO raw_metadata
             (page, title, year, rating, metascore, votes, runtime, certificate, genres, director, stars)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![
                r.page as i64,
                r.title,
                r.year,
                r.rating,
                r.metascore,
                r.votes,
                r.runtime,
                r.certificate,
                serde_json::to_string(&r.genres)?,
                r.director,
                serde_json::to_string(&r.stars)?,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn replace_financials(conn: &Connection, rows: &[FinancialRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM raw_financials", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO raw_financials
             (page, title, release_date, production_budget, domestic_gross, worldwide_gross)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![
                r.page as i64,
                r.title,
                r.release_date,
                r.production_budget,
                r.domestic_gross,
                r.worldwide_gross,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn replace_rankings(conn: &Connection, rows: &[RankingRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM raw_rankings", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO raw_rankings (page, name, ranking, role) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![r.page as i64, r.name, r.ranking, r.role])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn fetch_metadata(conn: &Connection) -> Result<Vec<MetadataRow>> {
    let mut stmt = conn.prepare(
        "SELECT page, title, year, rating, metascore, votes, runtime, certificate, genres, director, stars
         FROM raw_metadata ORDER BY id",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(
            |(page, title, year, rating, metascore, votes, runtime, certificate, genres, director, stars)| {
                Ok(MetadataRow {
                    page: page as usize,
                    genres: serde_json::from_str(&genres)
                        .with_context(|| format!("Bad genres JSON for {:?}", title))?,
                    stars: serde_json::from_str(&stars)
                        .with_context(|| format!("Bad stars JSON for {:?}", title))?,
                    title,
                    year,
                    rating,
                    metascore,
                    votes,
                    runtime,
                    certificate,
                    director,
                })
            },
        )
        .collect()
}

pub fn fetch_financials(conn: &Connection) -> Result<Vec<FinancialRow>> {
    let mut stmt = conn.prepare(
        "SELECT page, title, release_date, production_budget, domestic_gross, worldwide_gross
         FROM raw_financials ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FinancialRow {
                page: row.get::<_, i64>(0)? as usize,
                title: row.get(1)?,
                release_date: row.get(2)?,
                production_budget: row.get(3)?,
                domestic_gross: row.get(4)?,
                worldwide_gross: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_rankings(conn: &Connection) -> Result<Vec<RankingRow>> {
    let mut stmt = conn.prepare("SELECT page, name, ranking, role FROM raw_rankings ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RankingRow {
                page: row.get::<_, i64>(0)? as usize,
                name: row.get(1)?,
                ranking: row.get(2)?,
                role: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Output tables ──

pub fn save_outputs(conn: &Connection, movies: &[MovieRow], genres: &[MovieGenreRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM movies", [])?;
    tx.execute("DELETE FROM movie_genres", [])?;
    {
        let mut m_stmt = tx.prepare(
            "INSERT INTO movies
             (title, rating, metascore, votes, runtime, certificate, year, month, release_date,
              genre_count, director, title_length, production_budget, director_power, star_power,
              star_appearances, star_points, worldwide_gross, domestic_gross)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
        )?;
        for m in movies {
            m_stmt.execute(rusqlite::params![
                m.title,
                m.rating,
                m.metascore,
                m.votes as i64,
                m.runtime as i64,
                m.certificate,
                m.year,
                m.month,
                m.release_date.to_string(),
                m.genre_count as i64,
                m.director,
                m.title_length as i64,
                m.production_budget as i64,
                m.director_power,
                m.star_power,
                m.star_appearances as i64,
                m.star_points,
                m.worldwide_gross as i64,
                m.domestic_gross as i64,
            ])?;
        }

        let mut g_stmt = tx.prepare(
            "INSERT INTO movie_genres
             (title, release_date, genre, rating, metascore, votes, runtime, certificate, year, month,
              genre_count, director, title_length, production_budget, domestic_gross, worldwide_gross,
              director_power, star_power, star_points, star_appearances)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
        )?;
        for g in genres {
            g_stmt.execute(rusqlite::params![
                g.title,
                g.release_date.to_string(),
                g.genre,
                g.rating,
                g.metascore,
                g.votes as i64,
                g.runtime as i64,
                g.certificate,
                g.year,
                g.month,
                g.genre_count as i64,
                g.director,
                g.title_length as i64,
                g.production_budget as i64,
                g.domestic_gross as i64,
                g.worldwide_gross as i64,
                g.director_power,
                g.star_power,
                g.star_points,
                g.star_appearances as i64,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub raw_metadata: usize,
    pub raw_financials: usize,
    pub raw_rankings: usize,
    pub movies: usize,
    pub movie_genres: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |table: &str| -> Result<usize> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(n as usize)
    };
    Ok(Stats {
        raw_metadata: count("raw_metadata")?,
        raw_financials: count("raw_financials")?,
        raw_rankings: count("raw_rankings")?,
        movies: count("movies")?,
        movie_genres: count("movie_genres")?,
    })
}

pub struct OverviewRow {
    pub title: String,
    pub year: i32,
    pub certificate: String,
    pub director: String,
    pub domestic_gross: i64,
    pub director_power: f64,
    pub star_power: f64,
}

/// Top titles by domestic gross, optionally filtered by certificate.
pub fn fetch_overview(
    conn: &Connection,
    certificate: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut sql = String::from(
        "SELECT title, year, certificate, director, domestic_gross, director_power, star_power
         FROM movies",
    );
    if certificate.is_some() {
        sql.push_str(" WHERE certificate = ?1");
    }
    sql.push_str(&format!(" ORDER BY domestic_gross DESC, title LIMIT {}", limit));

    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| {
        Ok(OverviewRow {
            title: row.get(0)?,
            year: row.get(1)?,
            certificate: row.get(2)?,
            director: row.get(3)?,
            domestic_gross: row.get(4)?,
            director_power: row.get(5)?,
            star_power: row.get(6)?,
        })
    };
    let rows = match certificate {
        Some(c) => stmt.query_map([c], map)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn metadata_lists_survive_storage() {
        let conn = memory();
        let row = MetadataRow {
            page: 3,
            title: "Heat".into(),
            year: "(1995)".into(),
            rating: "8.3".into(),
            metascore: "76".into(),
            votes: "612345".into(),
            runtime: "170 min".into(),
            certificate: "R".into(),
            genres: vec!["Crime".into(), "Drama".into()],
            director: "Michael Mann".into(),
            stars: vec!["Al Pacino".into(), "Robert De Niro".into()],
        };
        replace_metadata(&conn, &[row.clone()]).unwrap();
        assert_eq!(fetch_metadata(&conn).unwrap(), vec![row]);
    }

    #[test]
    fn replace_discards_previous_snapshot() {
        let conn = memory();
        let row = |name: &str| RankingRow {
            page: 1,
            name: name.into(),
            ranking: "1. ".into(),
            role: "Actress".into(),
        };
        replace_rankings(&conn, &[row("A"), row("B")]).unwrap();
        replace_rankings(&conn, &[row("C")]).unwrap();
        let names: Vec<String> = fetch_rankings(&conn).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["C"]);
        assert_eq!(get_stats(&conn).unwrap().raw_rankings, 1);
    }

    #[test]
    fn relisted_title_saves_both_genre_rows() {
        let conn = memory();
        let listing = |votes: &str| MetadataRow {
            page: 1,
            title: "Heat".into(),
            year: "(1995)".into(),
            rating: "8.3".into(),
            metascore: "76".into(),
            votes: votes.into(),
            runtime: "170 min".into(),
            certificate: "R".into(),
            genres: vec!["Crime".into()],
            director: "Michael Mann".into(),
            stars: vec!["Al Pacino".into()],
        };
        let raw = crate::pipeline::RawTables {
            // vote count drifted between two page fetches
            metadata: vec![listing("612345"), listing("612350")],
            financials: vec![FinancialRow {
                page: 1,
                title: "Heat".into(),
                release_date: "Dec 15, 1995".into(),
                production_budget: "$60,000,000".into(),
                domestic_gross: "$67,436,818".into(),
                worldwide_gross: "$187,436,818".into(),
            }],
            rankings: Vec::new(),
        };

        let out = crate::pipeline::run(&raw).unwrap();
        assert_eq!(out.movie_genres.len(), 2);
        assert_eq!(out.movies.len(), 1);

        save_outputs(&conn, &out.movies, &out.movie_genres).unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.movie_genres, 2);
        assert_eq!(stats.movies, 1);
    }
}
