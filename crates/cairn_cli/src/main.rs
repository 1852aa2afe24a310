//! Cairn CLI
//!
//! Command-line host for Cairn segmented storage. Plugins are registered
//! before the command line is parsed, so their `--Xplugin-*` options are
//! accepted alongside the host's own.
//!
//! # Commands
//!
//! - `put` / `get` / `delete` - Single-key operations on a segment
//! - `scan` - Stream a segment in key order
//! - `nearest` - Find the greatest key at or below a key
//! - `clear` - Remove every entry of a segment
//! - `info` - Database metadata, plugins and segment sizes

mod commands;

use cairn_core::{
    default_plugins_dir, segments, CoreResult, Host, HostConfiguration, PluginCatalog,
    StorageProvider, DEFAULT_DATA_PATH, DEFAULT_STORAGE_FACTORY,
};
use cairn_plugin_api::{DataStorageFormat, SegmentIdentifier};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Cairn segmented key-value storage host.
#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory of everything the host writes
    #[arg(global = true, short, long, default_value = DEFAULT_DATA_PATH)]
    data_path: PathBuf,

    /// Plugins directory (default: $CAIRN_PLUGINS_DIR or <data-path>/plugins)
    #[arg(global = true, long)]
    plugins_dir: Option<PathBuf>,

    /// Storage format (ARCHIVE, COMPACT)
    #[arg(global = true, long, default_value = "COMPACT")]
    data_storage_format: DataStorageFormat,

    /// Name of the storage factory to use
    #[arg(global = true, long, default_value = DEFAULT_STORAGE_FACTORY)]
    storage_factory: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a key
    Put {
        /// Segment name
        #[arg(value_parser = parse_segment)]
        segment: SegmentIdentifier,
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Segment name
        #[arg(value_parser = parse_segment)]
        segment: SegmentIdentifier,
        /// Key
        key: String,
    },

    /// Remove a key
    Delete {
        /// Segment name
        #[arg(value_parser = parse_segment)]
        segment: SegmentIdentifier,
        /// Key
        key: String,
    },

    /// Stream a segment in key order
    Scan {
        /// Segment name
        #[arg(value_parser = parse_segment)]
        segment: SegmentIdentifier,

        /// First key to include
        #[arg(long)]
        from: Option<String>,

        /// Last key to include
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the entry at or immediately below a key
    Nearest {
        /// Segment name
        #[arg(value_parser = parse_segment)]
        segment: SegmentIdentifier,
        /// Lookup key
        key: String,
    },

    /// Remove every entry of a segment
    Clear {
        /// Segment name
        #[arg(value_parser = parse_segment)]
        segment: SegmentIdentifier,
    },

    /// Show database metadata, plugins and segment sizes
    Info {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn parse_segment(name: &str) -> Result<SegmentIdentifier, String> {
    segments::by_name(name).ok_or_else(|| {
        let known: Vec<&str> = segments::ALL_SEGMENTS
            .iter()
            .map(SegmentIdentifier::name)
            .collect();
        format!("unknown segment '{name}', expected one of {}", known.join(", "))
    })
}

/// Options needed before plugins are registered.
struct EarlyOptions {
    data_path: PathBuf,
    plugins_dir: Option<PathBuf>,
    verbose: bool,
}

fn early_options() -> EarlyOptions {
    let matches = Cli::command().ignore_errors(true).try_get_matches().ok();
    let data_path = matches
        .as_ref()
        .and_then(|m| m.try_get_one::<PathBuf>("data_path").ok().flatten().cloned())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
    let plugins_dir = matches
        .as_ref()
        .and_then(|m| m.try_get_one::<PathBuf>("plugins_dir").ok().flatten().cloned());
    let verbose = matches
        .as_ref()
        .and_then(|m| m.try_get_one::<bool>("verbose").ok().flatten().copied())
        .unwrap_or(false);
    EarlyOptions {
        data_path,
        plugins_dir,
        verbose,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let early = early_options();

    // RUST_LOG wins over --verbose
    let default_level = if early.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut host = Host::new(PluginCatalog::builtin());
    let plugins_dir = early
        .plugins_dir
        .unwrap_or_else(|| default_plugins_dir(&early.data_path));
    host.register_plugins(Some(&plugins_dir))?;

    let matches = host.augment(Cli::command()).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    host.apply_options(&matches)?;

    if let Commands::Version = cli.command {
        println!("Cairn CLI v{}", env!("CARGO_PKG_VERSION"));
        for (name, version) in host.context().plugin_versions() {
            println!("Plugin {name} v{version}");
        }
        return Ok(());
    }

    let config = HostConfiguration::new()
        .data_path(&cli.data_path)
        .storage_factory(cli.storage_factory.as_str())
        .format(cli.data_storage_format);

    match run(&mut host, &config, cli.command) {
        Ok(()) => Ok(()),
        Err(err) if err.is_disk_full() => {
            error!(error = %err, "Disk is full, shutting down");
            std::process::exit(0);
        }
        Err(err) => Err(err.into()),
    }
}

fn run(host: &mut Host, config: &HostConfiguration, command: Commands) -> CoreResult<()> {
    host.start(config)?;
    let result = host
        .provider()
        .and_then(|provider| execute(provider.as_ref(), host, config, command));
    let shutdown = host.shutdown();
    result.and(shutdown)
}

fn execute<P: StorageProvider>(
    provider: &P,
    host: &Host,
    config: &HostConfiguration,
    command: Commands,
) -> CoreResult<()> {
    let mut out = io::stdout().lock();
    match command {
        Commands::Put {
            segment,
            key,
            value,
        } => commands::kv::put(provider, &segment, key.as_bytes(), value.as_bytes()),
        Commands::Get { segment, key } => {
            commands::kv::get(&mut out, provider, &segment, key.as_bytes())
        }
        Commands::Delete { segment, key } => {
            commands::kv::delete(&mut out, provider, &segment, key.as_bytes())
        }
        Commands::Scan {
            segment,
            from,
            to,
            limit,
            format,
        } => {
            let range = commands::kv::ScanRange {
                from: from.map(String::into_bytes),
                to: to.map(String::into_bytes),
                limit,
            };
            commands::kv::scan(&mut out, provider, &segment, &range, &format)
        }
        Commands::Nearest { segment, key } => {
            commands::kv::nearest(&mut out, provider, &segment, key.as_bytes())
        }
        Commands::Clear { segment } => commands::kv::clear(&mut out, provider, &segment),
        Commands::Info { format } => commands::info::run(
            &mut out,
            provider,
            &config.data_path,
            host.context().plugin_summary(),
            &format,
        ),
        Commands::Version => Ok(()),
    }
}
