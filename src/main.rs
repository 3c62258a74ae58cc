mod chunker;
mod crawler;
mod sitemap;

use std::io::Write;
use std::time::Instant;

use anyhow::bail;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "site_chunker",
    about = "Crawl a site via its sitemap and emit fixed-size markdown chunks as JSON"
)]
struct Cli {
    /// Base URL of the site to crawl (e.g. https://docs.example.com)
    base_url: String,

    /// Characters per chunk
    #[arg(short = 'c', long, default_value_t = chunker::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Max pages to crawl (default: all sitemap URLs)
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    if cli.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }

    let client = reqwest::Client::new();
    let mut urls = sitemap::discover_urls(&client, &cli.base_url).await?;
    if urls.is_empty() {
        bail!("No URLs found in any sitemap under {}", cli.base_url);
    }
    if let Some(limit) = cli.limit {
        urls.truncate(limit);
    }
    eprintln!("Found {} URLs to crawl", urls.len());

    let (pages, stats) = crawler::crawl_sequential(&urls).await?;

    let chunks: Vec<chunker::Chunk> = pages
        .iter()
        .flat_map(|page| chunker::chunk_page(page, cli.chunk_size))
        .collect();

    // Chunks go to stdout, everything else to stderr.
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if cli.pretty {
        serde_json::to_writer_pretty(&mut out, &chunks)?;
    } else {
        serde_json::to_writer(&mut out, &chunks)?;
    }
    writeln!(out)?;

    eprintln!(
        "Done: {} pages ({} ok, {} errors), {} chunks in {:.1}s",
        stats.total,
        stats.ok,
        stats.errors,
        chunks.len(),
        t0.elapsed().as_secs_f64()
    );

    Ok(())
}
