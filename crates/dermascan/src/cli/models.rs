//! The `dermascan models` command for managing the classifier.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use dermascan_core::model::hub::{ModelArtifacts, ModelHub};
use dermascan_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the configured model (ONNX weights, labels, preprocessing)
    Download,

    /// List models in the local cache
    List,

    /// Show the model cache directory
    Path,
}

/// One repository found in the model cache.
#[derive(Debug, PartialEq, Eq)]
struct CachedModel {
    /// `owner/name`, recovered from the `owner--name` directory
    repo: String,
    dir: PathBuf,
    complete: bool,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download => {
            let hub = ModelHub::from_config(&config.model);
            let artifacts = hub
                .fetch(&config)
                .await
                .with_context(|| format!("Failed to download {}", config.model.repo))?;

            for path in [&artifacts.config, &artifacts.preprocessor, &artifacts.onnx] {
                let size = std::fs::metadata(path)?.len();
                println!(
                    "{} ({:.1} MB)",
                    path.display(),
                    size as f64 / (1024.0 * 1024.0)
                );
            }
            tracing::info!("Model {} ready", config.model.repo);
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            let cached = list_cached(&model_dir, &config)?;
            if cached.is_empty() {
                println!("No models in {}", model_dir.display());
                println!("Run `dermascan models download` to fetch {}", config.model.repo);
            }
            for model in cached {
                let marker = if model.repo == config.model.repo { "*" } else { " " };
                let status = if model.complete { "complete" } else { "incomplete" };
                println!(
                    "{} {:<50} {:<10} {}",
                    marker,
                    model.repo,
                    status,
                    model.dir.display()
                );
            }
        }

        ModelsCommand::Path => {
            println!(
                "{}",
                ModelHub::cache_dir(&config.model_dir(), &config.model.repo).display()
            );
        }
    }

    Ok(())
}

/// Scan the cache for repository directories, sorted by repo name.
///
/// Completeness is judged against the configured ONNX file name.
fn list_cached(model_dir: &Path, config: &Config) -> anyhow::Result<Vec<CachedModel>> {
    if !model_dir.exists() {
        return Ok(Vec::new());
    }

    let mut cached = Vec::new();
    for entry in std::fs::read_dir(model_dir)
        .with_context(|| format!("Failed to read {}", model_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((owner, repo)) = name.split_once("--") else {
            continue;
        };
        let dir = entry.path();
        let complete = ModelArtifacts::in_dir(&dir, &config.model).all_present();
        cached.push(CachedModel {
            repo: format!("{owner}/{repo}"),
            dir,
            complete,
        });
    }
    cached.sort_by(|a, b| a.repo.cmp(&b.repo));
    Ok(cached)
}
