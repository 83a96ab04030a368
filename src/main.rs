mod collect;
mod db;
mod pipeline;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use collect::{financials, metadata, rankings, Collection, Pacing};

#[derive(Parser)]
#[command(name = "box_office", about = "Movie metadata and box-office scraper with feature pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// SQLite database; JSON snapshots are written alongside it
    #[arg(long, global = true, default_value = db::DB_PATH)]
    db: PathBuf,

    /// Minimum pause between requests, in seconds
    #[arg(long, global = true, default_value_t = collect::MIN_DELAY_SECS)]
    min_delay: u64,

    /// Maximum pause between requests, in seconds
    #[arg(long, global = true, default_value_t = collect::MAX_DELAY_SECS)]
    max_delay: u64,

    /// Requests per collector before it stops early
    #[arg(long, global = true, default_value_t = collect::MAX_REQUESTS)]
    max_requests: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all sources, then process (the default)
    Run,
    /// Scrape sources into the raw tables
    Scrape {
        /// Only this source (default: all three)
        #[arg(short, long, value_enum)]
        source: Option<Source>,
    },
    /// Clean, merge and engineer the raw tables into the output tables
    Process,
    /// Show row counts
    Stats,
    /// Top titles by domestic gross
    Overview {
        /// Filter by certificate (e.g. "PG-13")
        #[arg(short, long)]
        certificate: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "25")]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Metadata,
    Financials,
    Rankings,
}

const ALL_SOURCES: [Source; 3] = [Source::Metadata, Source::Financials, Source::Rankings];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let pacing = Pacing {
        min_delay: cli.min_delay,
        max_delay: cli.max_delay,
        max_requests: cli.max_requests,
    };

    let conn = db::connect(&cli.db)?;
    db::init_schema(&conn)?;

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            scrape(&conn, &ALL_SOURCES, &pacing).await?;
            process(&conn, &cli.db)
        }
        Commands::Scrape { source } => {
            let sources: Vec<Source> = source.map_or_else(|| ALL_SOURCES.to_vec(), |s| vec![s]);
            scrape(&conn, &sources, &pacing).await
        }
        Commands::Process => process(&conn, &cli.db),
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            println!("Raw metadata:   {}", s.raw_metadata);
            println!("Raw financials: {}", s.raw_financials);
            println!("Raw rankings:   {}", s.raw_rankings);
            println!("Movies:         {}", s.movies);
            println!("Movie genres:   {}", s.movie_genres);
            Ok(())
        }
        Commands::Overview { certificate, limit } => {
            let rows = db::fetch_overview(&conn, certificate.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No movies found. Run 'process' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:>4} | {:<9} | {:<20} | {:>12} | {:>12} | {:>12}",
                "#", "Title", "Year", "Cert", "Director", "Domestic", "Dir. power", "Star power"
            );
            println!("{}", "-".repeat(120));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<28} | {:>4} | {:<9} | {:<20} | {:>12} | {:>12.0} | {:>12.0}",
                    i + 1,
                    truncate(&r.title, 28),
                    r.year,
                    r.certificate,
                    truncate(&r.director, 20),
                    r.domestic_gross,
                    r.director_power,
                    r.star_power
                );
            }
            println!("\n{} movies", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape(conn: &Connection, sources: &[Source], pacing: &Pacing) -> Result<()> {
    let client = reqwest::Client::new();

    for source in sources {
        match source {
            Source::Metadata => {
                println!("Scraping metadata ({} pages)...", metadata::PAGE_COUNT);
                let c = collect::collect_pages(
                    &client,
                    "metadata",
                    &metadata::page_urls(),
                    pacing,
                    metadata::parse_listing,
                )
                .await?;
                report(&c, db::replace_metadata(conn, &c.rows)?);
            }
            Source::Financials => {
                let urls = financials::page_urls();
                println!("Scraping financials ({} pages)...", urls.len());
                let c = collect::collect_pages(&client, "financials", &urls, pacing, financials::parse_table)
                    .await?;
                report(&c, db::replace_financials(conn, &c.rows)?);
            }
            Source::Rankings => {
                let urls = rankings::page_urls();
                println!("Scraping rankings ({} pages)...", urls.len());
                let c = collect::collect_pages(&client, "rankings", &urls, pacing, rankings::parse_listing)
                    .await?;
                report(&c, db::replace_rankings(conn, &c.rows)?);
            }
        }
    }
    Ok(())
}

fn report<T>(c: &Collection<T>, saved: usize) {
    println!(
        "  -> {} rows saved from {} requests ({} failed){}",
        saved,
        c.requests,
        c.failures,
        if c.aborted { ", stopped at request ceiling" } else { "" }
    );
}

fn process(conn: &Connection, db_path: &Path) -> Result<()> {
    let raw = pipeline::RawTables {
        metadata: db::fetch_metadata(conn)?,
        financials: db::fetch_financials(conn)?,
        rankings: db::fetch_rankings(conn)?,
    };
    if raw.metadata.is_empty() || raw.financials.is_empty() {
        println!("Raw tables are empty. Run 'scrape' first.");
        return Ok(());
    }

    println!(
        "Processing {} listings, {} budgets, {} ranked names...",
        raw.metadata.len(),
        raw.financials.len(),
        raw.rankings.len()
    );
    let out = pipeline::run(&raw)?;
    db::save_outputs(conn, &out.movies, &out.movie_genres)?;
    let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    pipeline::write_snapshots(dir, &out)?;
    println!(
        "Saved {} movies, {} movie-genre rows.",
        out.movies.len(),
        out.movie_genres.len()
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
