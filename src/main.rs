//! Thin demo driver around the `coalget` library.
//!
//! Issues a batch of concurrent GET requests against one URL, either
//! all identical (exercising request coalescing) or made distinct via
//! a query-string suffix (exercising the per-endpoint limiter), and
//! logs a summary. Run with `RUST_LOG=debug` to watch the admissions.

use clap::Parser;
use futures::future::join_all;

use coalget::{ClientBuilder, DEFAULT_MAX_PER_ENDPOINT};

#[derive(Parser, Debug)]
#[command(version, about = "Concurrent GET client with request coalescing")]
struct Options {
    /// URL to fetch
    url: String,

    /// Number of concurrent requests to issue
    #[arg(short = 'n', long, default_value_t = 50)]
    count: usize,

    /// Append a unique query string to each request instead of
    /// coalescing them all onto one network call
    #[arg(long)]
    distinct: bool,

    /// Maximum number of concurrent in-flight requests per endpoint
    #[arg(long, default_value_t = DEFAULT_MAX_PER_ENDPOINT)]
    max_per_endpoint: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let options = Options::parse();

    let client = ClientBuilder::builder()
        .max_per_endpoint(options.max_per_endpoint)
        .build()
        .client()?;

    let urls: Vec<String> = (0..options.count)
        .map(|i| {
            if options.distinct {
                format!("{}?{}", options.url, i)
            } else {
                options.url.clone()
            }
        })
        .collect();

    let results = join_all(urls.iter().map(|url| client.fetch(url))).await;

    let succeeded = results.iter().filter(|outcome| outcome.is_ok()).count();
    for (url, outcome) in urls.iter().zip(&results) {
        if let Err(e) = outcome {
            log::warn!("{url}: {e}");
        }
    }
    log::info!("processed {} requests, {succeeded} succeeded", results.len());

    client.close();
    Ok(())
}
