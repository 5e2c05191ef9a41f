//! Forgepack CLI - Command-line tool for pack2 game asset archives.
//!
//! This is the main entry point for the forgepack command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use forgepack::common::size::human_bytes;
use forgepack::manager::{DEFAULT_EXPORT_DIR, DEFAULT_EXPORT_EXT};
use forgepack::prelude::*;

/// Forgepack - pack2 game asset archive tool
#[derive(Parser)]
#[command(name = "forgepack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Upper bound on resident archive bytes
    #[arg(long, global = true, env = "FORGEPACK_MEMORY_LIMIT")]
    memory_limit: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the name hash of asset names
    Hash {
        /// Asset names to hash
        #[arg(required_unless_present = "verify")]
        names: Vec<String>,

        /// Check a file of `hex:name` lines instead
        #[arg(long, conflicts_with = "names")]
        verify: Option<PathBuf>,
    },

    /// Show header and size information for archives
    Info {
        /// Archive files
        #[arg(required = true)]
        packs: Vec<PathBuf>,
    },

    /// List the asset table of an archive
    List {
        /// Archive file
        pack: PathBuf,
    },

    /// Extract one asset by name
    Extract {
        /// Glob pattern selecting archives
        #[arg(short, long, env = "FORGEPACK_PACKS")]
        packs: String,

        /// Asset name
        #[arg(short, long)]
        name: String,

        /// Output file (defaults to the asset's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export every asset whose bytes start with a signature
    Export {
        /// Glob pattern selecting archives
        #[arg(short, long, env = "FORGEPACK_PACKS")]
        packs: String,

        /// Signature as hex bytes, e.g. 44445320 for "DDS "
        #[arg(short, long)]
        signature: String,

        /// Output directory
        #[arg(short, long, default_value = DEFAULT_EXPORT_DIR)]
        output: PathBuf,

        /// Extension of exported files
        #[arg(short, long, default_value = DEFAULT_EXPORT_EXT)]
        extension: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ManagerConfig::default().with_memory_limit(cli.memory_limit);

    match cli.command {
        Commands::Hash { names, verify } => match verify {
            Some(path) => cmd_hash_verify(&path)?,
            None => cmd_hash(&names),
        },
        Commands::Info { packs } => {
            cmd_info(&packs)?;
        }
        Commands::List { pack } => {
            cmd_list(&pack, config)?;
        }
        Commands::Extract { packs, name, output } => {
            cmd_extract(&packs, &name, output.as_deref(), config)?;
        }
        Commands::Export {
            packs,
            signature,
            output,
            extension,
        } => {
            cmd_export(&packs, &signature, &output, &extension, config)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the `-v` count picks the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_hash(names: &[String]) {
    for name in names {
        println!("{:#018x}  {}", hash_name(name), name);
    }
}

fn cmd_hash_verify(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut checked = 0;
    let mut mismatches = 0;
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (hex, name) = line
            .split_once(':')
            .with_context(|| format!("line {}: expected `hex:name`", line_no + 1))?;
        let hex = hex.trim_start_matches("0x");
        let expected = u64::from_str_radix(hex, 16)
            .with_context(|| format!("line {}: invalid hash {hex:?}", line_no + 1))?;

        let actual = hash_name(name);
        if actual != expected {
            println!("MISMATCH {name}: expected {expected:#018x}, got {actual:#018x}");
            mismatches += 1;
        }
        checked += 1;
    }

    println!("Checked {} names, {} mismatches", checked, mismatches);
    if mismatches > 0 {
        bail!("{mismatches} name hashes did not match");
    }

    Ok(())
}

fn cmd_info(packs: &[PathBuf]) -> Result<()> {
    for path in packs {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let pack = Pack2::parse(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let table = pack.table(&data)?;

        let mut compressed = 0;
        let mut stored_bytes = 0u64;
        for record in table.iter() {
            if record.is_compressed() {
                compressed += 1;
            }
            stored_bytes += record.data_length;
        }

        let header = pack.header();
        println!("{}", path.display());
        println!("  file size:   {}", human_bytes(data.len() as u64));
        println!("  header size: {}", human_bytes(header.length));
        println!("  table at:    {:#x}", header.map_offset);
        println!(
            "  assets:      {} ({} compressed, {} unique hashes)",
            header.asset_count,
            compressed,
            pack.index().len()
        );
        println!("  stored data: {}", human_bytes(stored_bytes));
    }

    Ok(())
}

fn cmd_list(path: &Path, config: ManagerConfig) -> Result<()> {
    let manager = Manager::with_config([path], config);
    if let Some((_, _, error)) = manager.load_errors().next() {
        bail!("Failed to load {}: {error}", path.display());
    }

    let names = manager.namelist();
    let records = manager.records(0)?;

    for record in &records {
        println!(
            "{:#018x} {:>12} {:>12} {:>3} {}",
            record.name_hash,
            record.offset,
            record.data_length,
            record.zipped,
            names.get(record.name_hash).unwrap_or("")
        );
    }

    println!("\nTotal: {} assets, {} named", records.len(), names.len());

    Ok(())
}

fn cmd_extract(
    packs: &str,
    name: &str,
    output: Option<&Path>,
    config: ManagerConfig,
) -> Result<()> {
    let manager = open_manager(packs, config)?;

    let asset = manager
        .get(name)
        .with_context(|| format!("Failed to find {name}"))?;
    let data = asset
        .data()
        .with_context(|| format!("Failed to decode {name}"))?;

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => Path::new(name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{:#018x}", asset.name_hash()))),
    };
    fs::write(&output, data).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Extracted {} ({}) from {} to {}",
        name,
        human_bytes(data.len() as u64),
        manager.archive_name(asset.archive_id()).unwrap_or_default(),
        output.display()
    );

    Ok(())
}

fn cmd_export(
    packs: &str,
    signature: &str,
    output: &Path,
    extension: &str,
    config: ManagerConfig,
) -> Result<()> {
    let signature = hex::decode(signature.trim_start_matches("0x"))
        .with_context(|| format!("Invalid hex signature {signature:?}"))?;
    if signature.is_empty() {
        bail!("Signature must not be empty");
    }

    let manager = open_manager(packs, config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Scanning {} archives...", manager.archive_count()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let stats = manager.export_by_magic(&signature, output, extension)?;

    pb.finish_with_message("Done");
    println!(
        "Exported {} of {} assets from {} archives to {} in {:?} ({} errors)",
        stats.written,
        stats.scanned,
        stats.archives,
        output.display(),
        start.elapsed(),
        stats.errors
    );

    Ok(())
}

/// Open every archive matching `pattern`, reporting the ones that fail.
fn open_manager(pattern: &str, config: ManagerConfig) -> Result<Manager> {
    println!("Opening archives: {pattern}");

    let start = Instant::now();
    let manager = Manager::open_glob(pattern, config).context("Failed to open archives")?;
    if manager.archive_count() == 0 {
        bail!("No archives match {pattern}");
    }

    for (id, path, error) in manager.load_errors() {
        eprintln!("Skipping archive {id} ({}): {error}", path.display());
    }

    let stats = manager.stats();
    debug!(?stats, "manager ready");
    println!(
        "Loaded {} archives ({} assets, {} resident) in {:?}",
        stats.archives - stats.failed,
        stats.indexed_assets,
        human_bytes(stats.resident_bytes),
        start.elapsed()
    );

    Ok(manager)
}
