// src/bin/main.rs

use anyhow::Context;
use clap::Parser;
use network_visualizer::rpc::JsonRpcSource;
use network_visualizer::{
    dot, Args, ChainForest, Config, GraphSession, HeaderSource, VisualizerError,
};
use reqwest::Url;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = Config::from_args(args)?;
    if config.live {
        warn!("--live has no effect yet");
    }
    if config.uncles {
        warn!("--uncles has no effect yet");
    }

    // Created up front so a bad path fails before any RPC work.
    let file = File::create(&config.save_file)
        .with_context(|| format!("creating {}", config.save_file.display()))?;

    let mut forest = ChainForest::build(&config.topology, |spec| {
        let url = Url::parse(&spec.endpoint).map_err(|e| {
            VisualizerError::Topology(format!(
                "bad endpoint {:?} for {}: {e}",
                spec.endpoint, spec.name
            ))
        })?;
        let source = JsonRpcSource::new(url).map_err(|e| {
            VisualizerError::Topology(format!(
                "cannot create client for {}: {e}",
                spec.name
            ))
        })?;
        Ok(Arc::new(source) as Arc<dyn HeaderSource>)
    })?;
    forest.include(&config.include)?;
    forest.init_scan_ranges(config.start, config.range).await?;

    let mut session = GraphSession::new(config.compressed);
    session.run(&mut forest).await?;

    let mut writer = BufWriter::new(file);
    dot::write(&mut writer, &forest, &session).map_err(|source| VisualizerError::Output {
        path: config.save_file.clone(),
        source,
    })?;

    info!(path = %config.save_file.display(), "graph written");
    Ok(())
}
