pub mod aggregate;
pub mod clean;
pub mod features;
pub mod merge;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::db::{FinancialRow, MetadataRow, RankingRow};
use aggregate::Outputs;

/// The three collector tables, as scraped.
pub struct RawTables {
    pub metadata: Vec<MetadataRow>,
    pub financials: Vec<FinancialRow>,
    pub rankings: Vec<RankingRow>,
}

/// Four-stage pipeline: clean → merge → engineer → aggregate.
pub fn run(raw: &RawTables) -> Result<Outputs> {
    let movies = clean::clean_metadata(&raw.metadata).context("Cleaning metadata")?;
    let financials = clean::clean_financials(&raw.financials).context("Cleaning financials")?;
    let rankings = clean::clean_rankings(&raw.rankings).context("Cleaning rankings")?;
    info!(
        "Cleaned {} metadata rows, {} financial rows, {} ranked names",
        movies.len(),
        financials.len(),
        rankings.len()
    );

    let joined = merge::merge(&movies, &financials, &rankings, merge::RELEASE_CUTOFF);
    let ranked = joined.iter().filter(|j| j.star_ranking.is_some()).count();
    let actresses = joined
        .iter()
        .filter(|j| j.star_role.as_deref() == Some("Actress"))
        .count();
    info!(
        "Joined {} rows ({} with a ranked star, {} of them actresses)",
        joined.len(),
        ranked,
        actresses
    );

    let engineered = features::engineer(joined);
    let out = aggregate::aggregate(&engineered);
    info!(
        "Aggregated {} titles, {} title-genre rows",
        out.movies.len(),
        out.movie_genres.len()
    );
    Ok(out)
}

/// Write both output tables as JSON next to the database.
pub fn write_snapshots(dir: &Path, out: &Outputs) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for (name, json) in [
        ("movies.json", serde_json::to_string_pretty(&out.movies)?),
        ("movie_genres.json", serde_json::to_string_pretty(&out.movie_genres)?),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}
