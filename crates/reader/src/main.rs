use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feededge_core::domain::post::{ContentType, FeedItem};
use feededge_core::feed::{FeedWalker, HttpNextSource, WalkState};
use feededge_core::ads::absolute_url;
use feededge_core::media::proxied_src;

const BODY_PREVIEW_CHARS: usize = 280;

#[derive(Debug, Parser)]
#[command(name = "feededge_reader")]
struct Args {
    /// Base URL of a running edge.
    #[arg(long, env = "EDGE_BASE_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// Feed to read: `news` or `columns`.
    #[arg(long = "type", value_parser = parse_content_type, default_value = "news")]
    content_type: ContentType,

    /// Id of the post the feed continues from.
    #[arg(long)]
    id: u64,

    /// Stop after this many items even if the feed continues.
    #[arg(long, default_value_t = 10)]
    max_items: usize,

    /// Wait for Enter before each load instead of reading straight through.
    #[arg(long)]
    interactive: bool,

    /// Per-request deadline.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

fn parse_content_type(s: &str) -> Result<ContentType, String> {
    ContentType::from_path_segment(s).ok_or_else(|| format!("expected news or columns, got {s}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = feededge_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.id > 0, "--id must be a positive integer");

    let source = HttpNextSource::new(&args.base_url, Duration::from_secs(args.timeout_secs))
        .context("failed to set up feed client")?;
    let content_origin = settings.content_origin();
    let mut walker = FeedWalker::new(args.content_type, Some(args.id));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    while walker.items().len() < args.max_items {
        if args.interactive {
            eprintln!("-- press Enter to load the next item --");
            if stdin.next_line().await?.is_none() {
                break;
            }
        }

        let before = walker.items().len();
        let state = walker.advance(&source).await;
        if let Some(item) = walker.items().get(before) {
            render(item, &content_origin);
        }
        if state == WalkState::Finished {
            break;
        }
    }

    tracing::info!(
        content_type = args.content_type.path_segment(),
        start_id = args.id,
        loaded = walker.items().len(),
        requests = walker.requests_issued(),
        finished = walker.is_finished(),
        "reader stopped"
    );
    Ok(())
}

fn render(item: &FeedItem, content_origin: &str) {
    let post = &item.post;
    println!();
    println!("# {}", post.title());

    let mut meta = Vec::new();
    if let Some(byline) = post.byline().filter(|s| !s.trim().is_empty()) {
        meta.push(byline.to_string());
    }
    if let Some(at) = post.published_at() {
        meta.push(at.format("%Y-%m-%d %H:%M UTC").to_string());
    }
    if !meta.is_empty() {
        println!("{}", meta.join(" · "));
    }

    if let Some(image) = post.image() {
        // Images are only ever shown through the media proxy.
        println!("[image] {}", image_src(content_origin, image));
    }

    if let Some(body) = post.body() {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        println!("{preview}");
    }

    if !item.similar.is_empty() {
        println!("Similar:");
        for s in &item.similar {
            println!("  - {} (#{})", s.title, s.id);
        }
    }
    if !item.social_links.is_empty() {
        let links: Vec<String> = item
            .social_links
            .iter()
            .map(|l| format!("{} <{}>", l.name, l.url))
            .collect();
        println!("Follow: {}", links.join(", "));
    }
}

fn image_src(content_origin: &str, image: &str) -> String {
    proxied_src(&absolute_url(content_origin, image.trim()))
}

fn init_sentry(settings: &feededge_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
