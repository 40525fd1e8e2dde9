//! met-import - Main entry point
//!
//! CLI wrapper around the MET import pipeline: parse arguments once, build
//! the render client, run, and exit non-zero after logging the full cause
//! chain on any fatal condition.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use align_common::client::RenderClient;
use align_common::reconcile::UpdatePolicy;
use align_common::validate::BoundsTileSpecValidator;
use met_import::parser::MetFormat;
use met_import::ImportConfig;

/// Command-line arguments for met-import
#[derive(Parser, Debug)]
#[command(name = "met-import")]
#[command(about = "Import MET alignment data into a render stack")]
#[command(version)]
struct Args {
    /// Base URL of the render web services, e.g. http://host:8080/render-ws/v1
    #[arg(long, env = "RENDER_BASE_DATA_URL")]
    base_data_url: String,

    /// Stack owner
    #[arg(long)]
    owner: String,

    /// Stack project
    #[arg(long)]
    project: String,

    /// Name of source (acquire) stack containing base tile specifications
    #[arg(long)]
    acquire_stack: String,

    /// Name of target (align, montage, etc.) stack that will contain
    /// imported transforms
    #[arg(long)]
    align_stack: String,

    /// MET file for section
    #[arg(long)]
    met_file: PathBuf,

    /// MET format version
    #[arg(long, value_enum, default_value = "v1")]
    format_version: MetFormat,

    /// Replace all transforms with the MET transform (default is to append
    /// the MET transform to the existing ones)
    #[arg(long)]
    replace_all: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("main: entry, args={:?}", args);

    let config = ImportConfig {
        acquire_stack: args.acquire_stack,
        align_stack: args.align_stack,
        met_file: args.met_file,
        format: args.format_version,
        policy: if args.replace_all {
            UpdatePolicy::ReplaceAll
        } else {
            UpdatePolicy::Append
        },
    };

    let result = async {
        let client = RenderClient::new(&args.base_data_url, &args.owner, &args.project)?;
        let validator = BoundsTileSpecValidator::default();
        met_import::run(&config, &client, Some(&validator)).await
    }
    .await;

    match result {
        Ok(stats) => {
            info!(
                "main: exit, updated {} tiles ({} removed as bad)",
                stats.updated_tile_count, stats.removed_bad_tile_count
            );
        }
        Err(e) => {
            error!("main: caught exception: {:#}", anyhow::Error::new(e));
            std::process::exit(1);
        }
    }
}
