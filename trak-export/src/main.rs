//! trak-export - Main entry point
//!
//! CLI wrapper around the patch export pipeline. All parameters are
//! validated up front (including the z map string); any fatal condition is
//! logged with its full cause chain and the process exits non-zero.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use align_common::client::RenderClient;
use trak_export::project::ProjectDump;
use trak_export::{export_patches, parse_z_map, ExportConfig, ExportSummary};

/// Command-line arguments for trak-export
#[derive(Parser, Debug)]
#[command(name = "trak-export")]
#[command(about = "Export TrakEM2 patch alignment data into a render stack")]
#[command(version)]
struct Args {
    /// Base URL of the render web services, e.g. http://host:8080/render-ws/v1
    #[arg(long, env = "RENDER_BASE_DATA_URL")]
    base_data_url: String,

    /// Basis stack owner
    #[arg(long)]
    basis_owner: String,

    /// Basis stack project
    #[arg(long)]
    basis_project: String,

    /// Basis stack supplying the canonical tile specs
    #[arg(long)]
    basis_stack: String,

    /// Target stack owner
    #[arg(long)]
    target_owner: String,

    /// Target stack project
    #[arg(long)]
    target_project: String,

    /// Target stack receiving the exported tiles
    #[arg(long)]
    target_stack: String,

    /// First project z to export
    #[arg(long)]
    min_z: f64,

    /// Last project z to export
    #[arg(long)]
    max_z: f64,

    /// Project z to target z map, format a=b,c=d (leave empty to skip
    /// mapping)
    #[arg(long)]
    z_map: Option<String>,

    /// Mark the target stack COMPLETE after export
    #[arg(long)]
    complete_after_export: bool,

    /// JSON project dump with layers and per-patch transform trees
    #[arg(long)]
    project_file: PathBuf,
}

async fn run(args: Args) -> align_common::Result<ExportSummary> {
    let config = ExportConfig {
        basis_stack: args.basis_stack,
        target_stack: args.target_stack,
        min_z: args.min_z,
        max_z: args.max_z,
        z_map: parse_z_map(args.z_map.as_deref())?,
        complete_after_export: args.complete_after_export,
    };

    let basis_client =
        RenderClient::new(&args.base_data_url, &args.basis_owner, &args.basis_project)?;
    let target_client = RenderClient::new(
        &args.base_data_url,
        &args.target_owner,
        &args.target_project,
    )?;

    let project = ProjectDump::load(&args.project_file)?;
    export_patches(&project, &config, &basis_client, &target_client).await
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

    match run(args).await {
        Ok(summary) => {
            info!(
                "main: exit, exported {} tiles from {} layers",
                summary.tile_count, summary.layer_count
            );
        }
        Err(e) => {
            error!("main: caught exception: {:#}", anyhow::Error::new(e));
            std::process::exit(1);
        }
    }
}
