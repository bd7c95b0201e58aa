use super::render;
use super::setup::{parse_cli, Cli, Commands, StackArgs};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use olxstore::config::CONFIG_FILE_NAME;
use olxstore::model::{FileMetadata, GrepOptions, ListSelection, ScanResult, WriteOptions};
use olxstore::store::{ContentStore, LayeredStore, RemoteStore};
use olxstore::{ContentApi, SafeRelativePath, StoreConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(dispatch(cli))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("org", "olxstore", "olxstore")?;
    let path = dirs.config_dir().join(CONFIG_FILE_NAME);
    path.exists().then_some(path)
}

fn load_config(stack: &StackArgs) -> Result<StoreConfig> {
    let path = stack.config.clone().or_else(default_config_path);
    let mut config = StoreConfig::load(path.as_deref()).context("loading configuration")?;
    if let Some(remote) = &stack.remote {
        config.remote_url = Some(remote.clone());
    }
    if let Some(namespace) = &stack.namespace {
        config.remote_namespace = Some(namespace.clone());
    }
    Ok(config)
}

/// Local roots first (first flag = highest priority), then the remote store.
fn build_stack(config: &StoreConfig, stack: &StackArgs) -> Result<LayeredStore> {
    let roots = if stack.roots.is_empty() {
        vec![config.base_dir.clone()]
    } else {
        stack.roots.clone()
    };

    let mut stores: Vec<Arc<dyn ContentStore>> = Vec::with_capacity(roots.len() + 1);
    for root in roots {
        let root_config = StoreConfig {
            base_dir: root.clone(),
            ..config.clone()
        };
        let local = root_config
            .local_store()
            .with_context(|| format!("opening content root {}", root.display()))?;
        stores.push(Arc::new(local));
    }
    if let Some(remote) = config.remote_config()? {
        debug!(url = %remote.file_url, namespace = ?remote.namespace, "layering remote store");
        stores.push(Arc::new(RemoteStore::new(remote)?));
    }
    debug!(stores = stores.len(), "built store stack");
    Ok(LayeredStore::new(stores))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli.stack)?;
    let api = ContentApi::new(Arc::new(build_stack(&config, &cli.stack)?));
    let json = cli.json;

    match cli.command {
        Commands::Read { path } => {
            let result = api.read(&path).await?;
            if json {
                print_json(&result)?;
            } else {
                print!("{}", result.content);
            }
        }
        Commands::Write { path, mtime, force } => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("reading content from stdin")?;

            let mut options = WriteOptions {
                previous_metadata: None,
                force,
            };
            if let Some(mtime) = mtime {
                // Only mtime takes part in the local conflict check
                options.previous_metadata = Some(FileMetadata {
                    mtime: Some(mtime),
                    size: 0,
                });
            }
            api.write(&path, &content, options).await?;
            render::message(json, "written", &path)?;
        }
        Commands::Rm { path } => {
            api.delete(&path).await?;
            render::message(json, "deleted", &path)?;
        }
        Commands::Mv { from, to } => {
            api.rename(&from, &to).await?;
            render::message(json, "renamed", &format!("{from} -> {to}"))?;
        }
        Commands::Ls { base, depth } => {
            let selection = ListSelection {
                base_path: base.as_deref().map(SafeRelativePath::new).transpose()?,
                max_depth: depth,
            };
            let tree = api.list(&selection).await?;
            if json {
                print_json(&tree)?;
            } else {
                print!("{}", render::tree(&tree));
            }
        }
        Commands::Scan { previous, save } => {
            let previous: Option<ScanResult> = match previous {
                Some(file) => {
                    let raw = std::fs::read_to_string(&file)
                        .with_context(|| format!("reading snapshot {}", file.display()))?;
                    Some(serde_json::from_str(&raw).context("parsing snapshot")?)
                }
                None => None,
            };
            let scan = api.scan(previous.as_ref()).await?;
            if let Some(file) = save {
                std::fs::write(&file, serde_json::to_string(&scan)?)
                    .with_context(|| format!("writing snapshot {}", file.display()))?;
            }
            if json {
                print_json(&scan)?;
            } else {
                print!("{}", render::scan(&scan));
            }
        }
        Commands::Glob { pattern, base } => {
            let paths = api.glob(&pattern, base.as_deref()).await?;
            if json {
                print_json(&paths)?;
            } else {
                for path in paths {
                    println!("{path}");
                }
            }
        }
        Commands::Grep {
            pattern,
            base,
            include,
            limit,
            ignore_case,
        } => {
            let options = GrepOptions {
                base_path: base.as_deref().map(SafeRelativePath::new).transpose()?,
                include,
                limit: limit.unwrap_or(config.grep_limit),
                ignore_case,
            };
            let matches = api.search(&pattern, &options).await?;
            if json {
                print_json(&matches)?;
            } else {
                print!("{}", render::grep(&matches));
            }
        }
        Commands::Resolve {
            file,
            reference,
            read,
        } => {
            let base = api.provenance_of(&file).await?;
            if read {
                let resolved = api.read_reference(&base, &reference).await?;
                if json {
                    print_json(&resolved)?;
                } else {
                    print!("{}", resolved.content);
                }
            } else {
                let path = api.resolve(&base, &reference).await?;
                if json {
                    print_json(&serde_json::json!({ "base": base, "path": path }))?;
                } else {
                    println!("{path}");
                }
            }
        }
        Commands::Provenance { path } => {
            let uri = api.provenance_of(&path).await?;
            if json {
                print_json(&serde_json::json!({ "path": path, "provenance": uri }))?;
            } else {
                println!("{uri}");
            }
        }
    }
    Ok(())
}
