pub mod metadata;
pub mod financials;
pub mod rankings;

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use scraper::{ElementRef, Selector};
use tracing::{info, warn};

/// Hard ceiling on requests per collector run.
pub const MAX_REQUESTS: usize = 200;
pub const MIN_DELAY_SECS: u64 = 2;
pub const MAX_DELAY_SECS: u64 = 8;

// Placeholders for fields missing from a listing.
pub const NO_TITLE: &str = "no title";
pub const NO_YEAR: &str = "no year";
pub const NO_RATING: &str = "no stars given";
pub const NO_METASCORE: &str = "no metascore";
pub const NO_VOTES: &str = "no votes";
pub const NO_RUNTIME: &str = "no runtime";
pub const NO_CERTIFICATE: &str = "not rated";
pub const NO_DIRECTOR: &str = "no director";
pub const NO_RELEASE_DATE: &str = "no release date";
pub const NO_MOVIE_NAME: &str = "no movie name";
pub const NO_BUDGET: &str = "no budget";
pub const NO_DOMESTIC_GROSS: &str = "no domestic gross";
pub const NO_WORLDWIDE_GROSS: &str = "no worldwide gross";
pub const NO_NAME: &str = "no name";
pub const NO_RANKING: &str = "no ranking";
pub const NO_TYPE: &str = "no type";

/// Delay and request budget shared by all collectors.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub min_delay: u64,
    pub max_delay: u64,
    pub max_requests: usize,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_delay: MIN_DELAY_SECS,
            max_delay: MAX_DELAY_SECS,
            max_requests: MAX_REQUESTS,
        }
    }
}

impl Pacing {
    pub fn delay(&self) -> Duration {
        let hi = self.max_delay.max(self.min_delay);
        let secs = rand::rng().random_range(self.min_delay..=hi);
        Duration::from_secs(secs)
    }
}

/// Counts requests and reports the running rate.
pub struct RequestMonitor {
    started: Instant,
    requests: usize,
    ceiling: usize,
}

impl RequestMonitor {
    pub fn new(ceiling: usize) -> Self {
        Self {
            started: Instant::now(),
            requests: 0,
            ceiling,
        }
    }

    /// Record one request; returns requests per second since start.
    pub fn record(&mut self) -> f64 {
        self.requests += 1;
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn exhausted(&self) -> bool {
        self.requests >= self.ceiling
    }
}

/// Rows gathered by one collector pass.
pub struct Collection<T> {
    pub rows: Vec<T>,
    pub requests: usize,
    pub failures: usize,
    pub aborted: bool,
}

/// Fetch `urls` one at a time and flatten each page with `parse`.
///
/// `parse` receives the 1-based page number and the response body. Bad
/// statuses are logged and the body is still parsed; transport errors skip
/// the page. Hitting the request ceiling stops the loop and keeps what has
/// been collected.
pub async fn collect_pages<T, F>(
    client: &reqwest::Client,
    source: &str,
    urls: &[String],
    pacing: &Pacing,
    mut parse: F,
) -> Result<Collection<T>>
where
    F: FnMut(usize, &str) -> Vec<T>,
{
    let mut monitor = RequestMonitor::new(pacing.max_requests);
    let mut rows = Vec::new();
    let mut failures = 0usize;
    let mut aborted = false;

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    pb.set_message(source.to_string());

    for (i, url) in urls.iter().enumerate() {
        if monitor.exhausted() {
            warn!(
                "{}: number of requests was greater than expected ({}), stopping early",
                source,
                monitor.requests()
            );
            aborted = true;
            break;
        }
        if i > 0 {
            tokio::time::sleep(pacing.delay()).await;
        }

        let response = client.get(url).send().await;
        let rate = monitor.record();
        info!(
            "{}: request {}; frequency {:.4} requests/s",
            source,
            monitor.requests(),
            rate
        );

        let body = match response {
            Ok(resp) => {
                let status = resp.status();
                if !status.is_success() {
                    failures += 1;
                    warn!("{}: request {}; status code: {}", source, monitor.requests(), status);
                }
                match resp.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        failures += 1;
                        warn!("{}: failed to read body of {}: {}", source, url, e);
                        pb.inc(1);
                        continue;
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!("{}: request to {} failed: {}", source, url, e);
                pb.inc(1);
                continue;
            }
        };

        rows.extend(parse(i + 1, &body));
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "{}: collected {} rows in {} requests ({:.1} min)",
        source,
        rows.len(),
        monitor.requests(),
        monitor.started.elapsed().as_secs_f64() / 60.0
    );

    Ok(Collection {
        rows,
        requests: monitor.requests(),
        failures,
        aborted,
    })
}

/// Only called with literal CSS, so a parse failure is a typo in the source.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Text of the first match of `sel` under `el`, or `fallback`.
pub(crate) fn first_text(el: ElementRef<'_>, sel: &LazyLock<Selector>, fallback: &str) -> String {
    el.select(sel)
        .next()
        .map(text_of)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn reply(status: u16, body: &str) -> String {
        format!(
            "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    /// Serve each raw reply on its own connection, in order; returns the base URL.
    async fn serve(replies: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for raw in replies {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = sock.read(&mut buf[read..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read += n;
                }
                sock.write_all(raw.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn no_pause(max_requests: usize) -> Pacing {
        Pacing {
            min_delay: 0,
            max_delay: 0,
            max_requests,
        }
    }

    fn echo(page: usize, body: &str) -> Vec<(usize, String)> {
        vec![(page, body.to_string())]
    }

    #[test]
    fn monitor_stops_at_ceiling() {
        let mut m = RequestMonitor::new(3);
        for _ in 0..2 {
            m.record();
        }
        assert!(!m.exhausted());
        m.record();
        assert!(m.exhausted());
        assert_eq!(m.requests(), 3);
    }

    #[test]
    fn delay_stays_in_range() {
        let pacing = Pacing::default();
        for _ in 0..50 {
            let d = pacing.delay().as_secs();
            assert!((MIN_DELAY_SECS..=MAX_DELAY_SECS).contains(&d));
        }
    }

    #[test]
    fn inverted_delay_range_uses_minimum() {
        let pacing = Pacing {
            min_delay: 5,
            max_delay: 1,
            max_requests: 1,
        };
        assert_eq!(pacing.delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn zero_ceiling_aborts_before_any_request() {
        let client = reqwest::Client::new();
        let pacing = Pacing {
            min_delay: 0,
            max_delay: 0,
            max_requests: 0,
        };
        let urls = vec!["http://127.0.0.1:9/unused".to_string()];
        let out = collect_pages(&client, "test", &urls, &pacing, |_, _| vec![1u8])
            .await
            .unwrap();
        assert!(out.aborted);
        assert_eq!(out.requests, 0);
        assert!(out.rows.is_empty());
    }

    #[tokio::test]
    async fn bad_status_is_parsed_and_ceiling_keeps_rows() {
        let base = serve(vec![reply(500, "first"), reply(200, "second"), reply(200, "third")]).await;
        let urls: Vec<String> = (1..=3).map(|i| format!("{}/page/{}", base, i)).collect();
        let client = reqwest::Client::new();

        let out = collect_pages(&client, "test", &urls, &no_pause(2), echo).await.unwrap();
        assert_eq!(out.requests, 2);
        assert_eq!(out.failures, 1);
        assert!(out.aborted);
        assert_eq!(out.rows, vec![(1, "first".to_string()), (2, "second".to_string())]);
    }

    #[tokio::test]
    async fn transport_error_skips_the_page() {
        // bind then drop to get a port nothing listens on
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let base = serve(vec![reply(200, "ok")]).await;
        let urls = vec![format!("http://{}/gone", closed), format!("{}/page", base)];
        let client = reqwest::Client::new();

        let out = collect_pages(&client, "test", &urls, &no_pause(10), echo).await.unwrap();
        assert_eq!(out.requests, 2);
        assert_eq!(out.failures, 1);
        assert!(!out.aborted);
        assert_eq!(out.rows, vec![(2, "ok".to_string())]);
    }

    #[tokio::test]
    async fn truncated_body_counts_as_failure() {
        let short = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort".to_string();
        let base = serve(vec![short, reply(200, "whole")]).await;
        let urls = vec![format!("{}/a", base), format!("{}/b", base)];
        let client = reqwest::Client::new();

        let out = collect_pages(&client, "test", &urls, &no_pause(10), echo).await.unwrap();
        assert_eq!(out.requests, 2);
        assert_eq!(out.failures, 1);
        assert_eq!(out.rows, vec![(2, "whole".to_string())]);
    }
}
