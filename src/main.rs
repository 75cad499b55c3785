use clap::{Parser, Subcommand};
use pixelpress::batch::{BatchKind, Orchestrator};
use pixelpress::engine::{EnginePreference, EngineRegistry, Quality, TargetFormat};
use pixelpress::sanitize::BaselineSanitizer;
use pixelpress::store::{FileStore, SavingsReport};
use pixelpress::{config, convert, naming, output, thumbs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that encode pixels.
#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Target format: webp or avif (default from config)
    #[arg(long)]
    format: Option<TargetFormat>,

    /// Encode quality, 1-100 (default from config)
    #[arg(long)]
    quality: Option<u32>,

    /// Engine to use: auto, native or magick (default from config)
    #[arg(long)]
    engine: Option<String>,
}

fn version_string() -> &'static str {
    let tag = env!("RELEASE_TAG");
    if !tag.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pixelpress")]
#[command(about = "Image transcoding and derivative pipeline for attachment libraries")]
#[command(long_about = "\
Image transcoding and derivative pipeline for attachment libraries

A store root is a directory of original images plus a .pixelpress/ manifest
tracking each item's active file, its size derivatives, and its conversion
history. The pipeline converts originals to webp or avif, regenerates size
derivatives in the new container, and can revert every item back to its
original, byte for byte.

Typical session:

  pixelpress store init                # create .pixelpress/ in the root
  pixelpress store import              # catalogue images found on disk
  pixelpress engines                   # probe available engines
  pixelpress batch convert             # convert the whole library in chunks
  pixelpress stats                     # space savings report
  pixelpress batch revert              # undo everything

Single files can be handled without a store:

  pixelpress convert photo.jpg --format avif --quality 70
  pixelpress thumbs photo.jpg

Run 'pixelpress config init' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Store root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to <root>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe engines and report their capabilities
    Engines,
    /// Convert a single image to webp or avif
    Convert {
        file: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
    },
    /// Generate size derivatives for a single image
    Thumbs {
        file: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
    },
    /// Run a chunked operation over the whole store
    Batch {
        /// convert, revert or sanitize
        action: BatchKind,
    },
    /// Report space savings across the store
    Stats,
    /// Manage the attachment store
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum StoreCommand {
    /// Create an empty store manifest in the root
    Init,
    /// Catalogue images found under the root
    Import,
    /// List catalogued items
    Ls,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print a stock config.toml with all options documented
    Init,
    /// Print the resolved configuration
    Show,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join("config.toml"));
    let config = config::load_config_file(&config_path)?;

    match cli.command {
        Command::Engines => {
            let registry = EngineRegistry::with_default_engines(None);
            output::print_engine_report(registry.infos());
        }
        Command::Convert { file, encode } => {
            let registry = EngineRegistry::with_default_engines(None);
            let format = encode.format.unwrap_or(config.format);
            let quality = encode.quality.map(Quality::new).unwrap_or(config.quality);
            let preference = preference_of(&encode, &config);

            let validation = registry.validate(&preference, format);
            if !validation.valid {
                return Err(validation.message.into());
            }
            let engine = registry
                .choose(format, &preference)
                .ok_or_else(|| format!("no available engine writes {format}"))?;

            let source_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or("source path has no file name")?;
            let dest = file.with_file_name(naming::converted_file_name(&source_name, format));
            let request = convert::ConversionRequest {
                source: file.clone(),
                dest: dest.clone(),
                format,
                quality,
            };
            let outcome = convert::convert(engine, &request, &config.limits);
            output::print_conversion_outcome(&file, &dest, &outcome);
            if let Some(reason) = outcome.failure_reason() {
                return Err(reason.to_string().into());
            }
        }
        Command::Thumbs { file, encode } => {
            let registry = EngineRegistry::with_default_engines(None);
            let quality = encode.quality.map(Quality::new).unwrap_or(config.quality);
            let preference = preference_of(&encode, &config);
            let engine = registry
                .geometry_engine(&preference)
                .ok_or("no available engine")?;

            let set = thumbs::generate(engine, &file, None, &config.normalized_sizes(), quality)?;
            if set.is_empty() {
                println!("no derivatives generated");
            } else {
                println!("{}", file.display());
                output::print_derivatives(set.iter());
            }
        }
        Command::Batch { action } => {
            let registry = EngineRegistry::with_default_engines(None);
            let mut store = FileStore::open(&cli.root)?;
            let sanitizer = BaselineSanitizer::new();
            let orchestrator = Orchestrator::new(&registry, &sanitizer, &config);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || output::print_progress(rx));
            let result = orchestrator.drive(&mut store, action, Some(&tx));
            drop(tx);
            printer.join().expect("printer thread panicked");
            let summary = result?;

            if action == BatchKind::Convert {
                println!("{}", SavingsReport::collect(&store)?);
            }
            if !summary.errors.is_empty() {
                return Err(format!("{} items failed", summary.errors.len()).into());
            }
        }
        Command::Stats => {
            let store = FileStore::open(&cli.root)?;
            println!("{}", SavingsReport::collect(&store)?);
        }
        Command::Store { command } => match command {
            StoreCommand::Init => {
                FileStore::create(&cli.root)?;
                println!("Initialized store in {}", cli.root.display());
            }
            StoreCommand::Import => {
                let registry = EngineRegistry::with_default_engines(None);
                let mut store = FileStore::open_or_create(&cli.root)?;
                let summary = store.import(registry.geometry_engine(&config.engine))?;
                println!("{summary}");
            }
            StoreCommand::Ls => {
                let store = FileStore::open(&cli.root)?;
                output::print_store_listing(store.items());
            }
        },
        Command::Config { command } => match command {
            ConfigCommand::Init => {
                print!("{}", config::stock_config_toml());
            }
            ConfigCommand::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}

fn preference_of(encode: &EncodeArgs, config: &config::PipelineConfig) -> EnginePreference {
    match &encode.engine {
        Some(name) => EnginePreference::from_name(name),
        None => config.engine.clone(),
    }
}

/// Logging goes to stderr so stdout stays parseable. `PIXELPRESS_LOG` wins
/// over the verbosity flags.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("PIXELPRESS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
