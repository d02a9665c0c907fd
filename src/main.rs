use clap::{Args, Parser, Subcommand, ValueEnum};
use labelkit::{Result, cache, config, flags, logging, preprocess};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labelkit")]
#[command(about = "Classification flag lists and embedding cache tools for image labeling", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: logging::LogFormat,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a classification flag list and print one label per line.
    Flags {
        /// Comma-separated labels, or a path to a file with one label per line.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        flags: Option<String>,

        /// Flag file with one label per line.
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Inspect or clear the embedding cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show entry count and size.
    Info {
        #[command(flatten)]
        cache: CacheArgs,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Remove all cached embeddings.
    Clear {
        #[command(flatten)]
        cache: CacheArgs,

        /// Delete the whole cache directory instead of only its entries.
        #[arg(long)]
        purge: bool,
    },
    /// Report which images in a folder already have cached embeddings.
    Status {
        #[command(flatten)]
        cache: CacheArgs,

        #[arg(long)]
        images: PathBuf,

        /// Also list images without a cache entry.
        #[arg(long)]
        list_missing: bool,
    },
}

#[derive(Args)]
struct CacheArgs {
    #[arg(long, env = "LABELKIT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[arg(long, env = "LABELKIT_CACHE_MAX_GB")]
    max_size_gb: Option<f64>,
}

impl CacheArgs {
    fn config(self) -> Result<config::CacheConfig> {
        config::CacheConfig::resolve(self.cache_dir, self.max_size_gb)
    }

    fn open(self) -> Result<cache::PersistentCache> {
        Ok(cache::PersistentCache::open(self.config()?)?)
    }

    fn open_existing(self) -> Result<cache::PersistentCache> {
        Ok(cache::PersistentCache::open_existing(self.config()?)?)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    match cli.cmd {
        Commands::Flags {
            flags: value,
            file,
            format,
        } => {
            let set = match (value, file) {
                (_, Some(path)) => flags::load_flag_file(&path)?,
                (Some(value), None) => flags::parse_flags_arg(&value)?,
                (None, None) => anyhow::bail!("one of --flags or --file is required"),
            };

            let dups = set.duplicates();
            if !dups.is_empty() {
                tracing::warn!(labels = ?dups, "duplicate labels in flag list");
            }
            if set.is_empty() {
                tracing::warn!("flag list is empty");
            }

            match format {
                OutputFormat::Text => {
                    for label in set.iter() {
                        println!("{}", label);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&set)?),
            }
        }

        Commands::Cache { action } => match action {
            CacheCommand::Info { cache: args, format } => {
                let info = args.open_existing()?.info()?;
                match format {
                    OutputFormat::Text => {
                        println!("cache dir: {}", info.cache_dir.display());
                        println!("files:     {}", info.files);
                        println!("size:      {:.2} MB ({:.3} GB)", info.size_mb, info.size_gb);
                    }
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
                }
            }
            CacheCommand::Clear { cache: args, purge } => {
                if purge {
                    let dir = args.cache_dir.unwrap_or_else(config::default_cache_dir);
                    if cache::PersistentCache::purge(&dir)? {
                        println!("Removed {}", dir.display());
                    } else {
                        println!("Cache directory {} does not exist", dir.display());
                    }
                } else {
                    let cache = args.open()?;
                    let removed = cache.clear()?;
                    println!("Removed {} entries from {}", removed, cache.dir().display());
                }
            }
            CacheCommand::Status {
                cache: args,
                images,
                list_missing,
            } => {
                let cache = args.open_existing()?;
                let list = preprocess::collect_images(&images)?;
                let status = preprocess::cache_status(&cache, &list);
                println!(
                    "{} of {} images cached ({} missing)",
                    status.cached,
                    status.total,
                    status.missing.len()
                );
                if list_missing {
                    for path in &status.missing {
                        println!("{}", path.display());
                    }
                }
            }
        },
    }

    Ok(())
}
