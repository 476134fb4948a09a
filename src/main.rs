use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use placement_tree::outline::FeatureOutline;
use placement_tree::tree::{is_legal_name, parse_path};
use placement_tree::{render_tree, FeatureId, FeatureTree, TreeConfig, TreeError};

#[derive(Parser)]
#[command(name = "ptree")]
#[command(about = "Build, check and render feature/placement trees")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a feature name is legal
    CheckName { name: String },
    /// Check a slash-separated feature path and print its segments
    CheckPath { path: String },
    /// Build a tree from a JSON outline, render it and run the consistency checker
    Render { outline: PathBuf },
    /// Build a tree from a JSON outline and print it as a JSON snapshot
    Snapshot { outline: PathBuf },
    /// Write the effective configuration back to the config file
    InitConfig,
}

/// Initialize tracing with output to stderr so stdout carries only results
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "placement_tree=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build(config: TreeConfig, outline: &Path) -> anyhow::Result<(FeatureTree, FeatureId)> {
    let content = std::fs::read_to_string(outline)
        .with_context(|| format!("Failed to read {}", outline.display()))?;
    let outline = FeatureOutline::from_json(&content)?;
    let mut tree = FeatureTree::with_config(config);
    let root = outline.build(&mut tree)?;
    Ok((tree, root))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => TreeConfig::load_from(path)?,
        None => TreeConfig::load(),
    };

    match cli.command {
        Commands::CheckName { name } => {
            if !is_legal_name(&name) {
                return Err(TreeError::IllegalFeatureName(name).into());
            }
            println!("{}: legal", name);
        }
        Commands::CheckPath { path } => {
            let segments = parse_path(&path)?;
            println!("{}", segments.join("\n"));
        }
        Commands::Render { outline } => {
            let (tree, root) = build(config, &outline)?;
            print!("{}", render_tree(&tree, root)?);

            let violations = tree.check_tree(root);
            if !violations.is_empty() {
                anyhow::bail!("{} consistency violations", violations.len());
            }
            tracing::info!("Tree {} is consistent", tree.full_name(root)?);
        }
        Commands::Snapshot { outline } => {
            let (tree, root) = build(config, &outline)?;
            let snapshot = tree.snapshot(root)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::InitConfig => {
            match &cli.config {
                Some(path) => config.save_to(path)?,
                None => config.save()?,
            }
            tracing::info!("Config saved");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
