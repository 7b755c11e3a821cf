use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use nodes_collage::{
    AlchemyClient, CollageConfig, CollagePipeline, ExportFormat, HttpSourceFetcher,
};

#[derive(Parser, Debug)]
#[command(name = "nodes-collage", version)]
struct Cli {
    /// JSON config file; unspecified fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the collection's NFTs held by a wallet.
    List(ListArgs),
    /// Build a collage from a wallet's NFTs and write it to disk.
    Export(ExportArgs),
    /// Run the CORS fetch relay.
    Relay(RelayArgs),
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Wallet address (0x followed by 40 hex digits).
    wallet: String,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Wallet address (0x followed by 40 hex digits).
    wallet: String,

    /// Indices from `list`, in slot order.
    #[arg(long, value_delimiter = ',', required = true)]
    select: Vec<usize>,

    /// Swap two selection positions, e.g. `--swap 0,3`. Repeatable.
    #[arg(long, value_parser = parse_pair)]
    swap: Vec<(usize, usize)>,

    #[arg(long, value_enum, default_value = "png")]
    format: ExportFormat,

    /// Also write the 600x600 on-screen collage.
    #[arg(long, default_value_t = false)]
    preview: bool,

    /// Output directory (defaults to the configured one).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Relay base URL, e.g. `http://127.0.0.1:8000`.
    #[arg(long)]
    relay_base: Option<String>,
}

#[derive(Parser, Debug)]
struct RelayArgs {
    /// Listen address, overriding the config.
    #[arg(long)]
    bind: Option<String>,

    /// Allow loopback and private upstreams (local development only).
    #[arg(long, default_value_t = false)]
    allow_private_hosts: bool,
}

fn parse_pair(s: &str) -> Result<(usize, usize), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `a,b`, got '{s}'"))?;
    let a = a.trim().parse().map_err(|e| format!("'{a}': {e}"))?;
    let b = b.trim().parse().map_err(|e| format!("'{b}': {e}"))?;
    Ok((a, b))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => CollageConfig::from_json_file(path)?,
        None => CollageConfig::default(),
    };

    match cli.cmd {
        Command::List(args) => cmd_list(cfg, args).await,
        Command::Export(args) => cmd_export(cfg, args).await,
        Command::Relay(args) => cmd_relay(cfg, args).await,
    }
}

fn pipeline(cfg: CollageConfig) -> anyhow::Result<CollagePipeline> {
    let fetcher = HttpSourceFetcher::new(cfg.relay_base.clone())?;
    let client = reqwest::Client::builder()
        .timeout(cfg.timeouts.ownership())
        .build()
        .context("build ownership http client")?;
    let ownership = AlchemyClient::new(
        client,
        cfg.ownership_api_url.clone(),
        cfg.contract_address.clone(),
        cfg.collection_name.clone(),
    );
    Ok(CollagePipeline::new(
        cfg,
        Arc::new(fetcher),
        Arc::new(ownership),
    )?)
}

async fn cmd_list(cfg: CollageConfig, args: ListArgs) -> anyhow::Result<()> {
    let mut pipeline = pipeline(cfg)?;
    let loaded = pipeline.load_wallet(&args.wallet).await;
    if let Some(msg) = pipeline.status().current() {
        eprintln!("{msg}");
    }
    loaded?;

    for (idx, nft) in pipeline.session().nfts().iter().enumerate() {
        let tag = if nft.is_animated { " [animated]" } else { "" };
        println!("{idx:>3}  {}  (#{}){tag}", nft.name, nft.token_id);
    }
    Ok(())
}

async fn cmd_export(mut cfg: CollageConfig, args: ExportArgs) -> anyhow::Result<()> {
    if args.relay_base.is_some() {
        cfg.relay_base = args.relay_base.clone();
    }
    let out_dir = args.out.clone().unwrap_or_else(|| cfg.output_dir.clone());
    let mut pipeline = pipeline(cfg)?;

    pipeline.load_wallet(&args.wallet).await?;
    for &idx in &args.select {
        pipeline
            .toggle(idx)
            .with_context(|| format!("select NFT {idx}"))?;
    }
    for &(a, b) in &args.swap {
        pipeline.swap(a, b)?;
    }
    if args.preview {
        pipeline.generate().await?;
        let path = pipeline.download_preview()?.write_to(&out_dir)?;
        eprintln!("wrote {}", path.display());
    }

    let exported = pipeline.export(args.format).await;
    if let Some(msg) = pipeline.status().current() {
        eprintln!("{msg}");
    }
    let artifact = exported?;

    let path = artifact.write_to(&out_dir)?;
    eprintln!(
        "wrote {} ({}x{}, {} frame(s), {} bytes{})",
        path.display(),
        artifact.width,
        artifact.height,
        artifact.frame_count,
        artifact.bytes.len(),
        if artifact.degraded { ", fallback" } else { "" },
    );
    Ok(())
}

async fn cmd_relay(mut cfg: CollageConfig, args: RelayArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        cfg.relay.bind = bind;
    }
    cfg.relay.allow_private_hosts |= args.allow_private_hosts;
    nodes_collage::relay::serve(cfg.relay).await?;
    Ok(())
}
