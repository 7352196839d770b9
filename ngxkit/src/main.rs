//! ngxkit - nginx-style configuration tooling
//!
//! This is the main entry point for the ngxkit CLI. It reads files and hands
//! the text to `ngxkit-config`; everything else happens in the library.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ngxkit_config::{dump, parse, tokenize, Config, Style};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ngxkit - parse, format and inspect nginx-style configuration
#[derive(Parser)]
#[command(name = "ngxkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-render a configuration file with normalized formatting
    Fmt {
        /// Path to the configuration file
        config: PathBuf,

        /// Spaces per nesting level
        #[arg(long)]
        indent: Option<usize>,

        /// TOML file with dumper style options
        #[arg(long)]
        style: Option<PathBuf>,

        /// Exit with an error instead of printing when the file is not formatted
        #[arg(long)]
        check: bool,
    },

    /// Print the token stream as JSON
    Tokens {
        /// Path to the configuration file
        config: PathBuf,
    },

    /// Print the parsed tree as JSON
    Tree {
        /// Path to the configuration file
        config: PathBuf,
    },

    /// List upstream groups and their servers
    Upstreams {
        /// Path to the configuration file
        config: PathBuf,
    },

    /// Check that a configuration file is structurally valid
    Validate {
        /// Path to the configuration file
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Fmt {
            config,
            indent,
            style,
            check,
        } => {
            let mut style = match style {
                Some(path) => {
                    let source = read_source(&path)?;
                    Style::from_toml_str(&source)
                        .with_context(|| format!("Failed to load style from {}", path.display()))?
                }
                None => Style::default(),
            };
            if let Some(indent) = indent {
                style.indent = indent;
            }
            tracing::debug!(?style, "formatting {}", config.display());

            let source = read_source(&config)?;
            let tree = parse_or_exit(&config, &source);
            let formatted = dump(&tree, &style);

            if check {
                if formatted != source {
                    eprintln!("{} is not formatted", config.display());
                    std::process::exit(1);
                }
                tracing::info!("{} is formatted", config.display());
            } else {
                print!("{}", formatted);
            }
        }

        Commands::Tokens { config } => {
            let source = read_source(&config)?;
            let tokens = tokenize(&source);
            tracing::debug!("{} tokens in {}", tokens.len(), config.display());
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }

        Commands::Tree { config } => {
            let source = read_source(&config)?;
            let tree = parse_or_exit(&config, &source);
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }

        Commands::Upstreams { config } => {
            let source = read_source(&config)?;
            let tree = parse_or_exit(&config, &source);
            let upstreams = tree
                .upstreams()
                .with_context(|| format!("Invalid upstream in {}", config.display()))?;

            if upstreams.is_empty() {
                tracing::warn!("No upstreams in {}", config.display());
            }
            for upstream in upstreams {
                println!("{}", upstream.name());
                for server in upstream.servers() {
                    println!("    {}", server);
                }
            }
        }

        Commands::Validate { config } => {
            tracing::info!("Validating config: {}", config.display());
            let source = read_source(&config)?;
            let tree = parse_or_exit(&config, &source);
            println!(
                "Configuration '{}' is valid ({} directives)",
                config.display(),
                tree.block.count_directives()
            );
        }
    }

    Ok(())
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Parse `source`, or print a diagnostic for it and exit
fn parse_or_exit(path: &Path, source: &str) -> Config {
    match parse(source) {
        Ok(config) => config,
        Err(e) => {
            let name = path.display().to_string();
            eprint!("{}", e.report(&name, source));
            std::process::exit(1);
        }
    }
}
