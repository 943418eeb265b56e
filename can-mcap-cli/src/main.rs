//! CAN MCAP CLI Application
//!
//! Command-line interface for the can-mcap-decoder library:
//! - `convert`: DBC + pcapng capture → MCAP file
//! - `info`: inspect the messages and signals of a DBC file

use anyhow::{Context, Result};
use can_mcap_decoder::{CanFrame, Compression, ContainerWriter, Decoder, McapSink};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

mod config;
mod interrupt;
mod report;

/// CAN MCAP - Decode CAN captures into MCAP files
#[derive(Parser, Debug)]
#[command(name = "can-mcap-cli")]
#[command(about = "Decode CAN signals from pcapng captures into MCAP files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a pcapng capture into an MCAP file
    Convert(ConvertArgs),
    /// Show the messages and signals of a DBC file
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// DBC file with the message definitions
    #[arg(long, value_name = "FILE")]
    dbc_file: Option<PathBuf>,

    /// pcapng capture to convert
    #[arg(long, value_name = "FILE")]
    pcapng_file: Option<PathBuf>,

    /// Output MCAP file (default: mcap/<capture name>.mcap)
    #[arg(long, value_name = "FILE")]
    mcap_file: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// First topic segment (default: can)
    #[arg(long, value_name = "PREFIX")]
    topic_prefix: Option<String>,

    /// Chunk compression: zstd, lz4 or none
    #[arg(long, value_name = "ALGORITHM")]
    compression: Option<Compression>,

    /// Target chunk size in bytes
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<u64>,

    /// Maximum number of frames to read (for testing)
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Print every decoded signal
    #[arg(long)]
    print_signals: bool,

    /// Print the conversion summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// DBC file to inspect
    #[arg(long, value_name = "FILE")]
    dbc_file: PathBuf,

    /// List the signals of every message
    #[arg(long)]
    signals: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    log::info!("CAN MCAP CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_mcap_decoder::VERSION);

    match cli.command {
        Command::Convert(args) => convert(args, cli.quiet),
        Command::Info(args) => info(args),
    }
}

/// Load the dictionary, stream the capture and write the MCAP file
fn convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    let mut app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };
    app_config.apply(config::Overrides {
        dbc_file: args.dbc_file,
        capture_file: args.pcapng_file,
        mcap_file: args.mcap_file,
        topic_prefix: args.topic_prefix,
        compression: args.compression,
        chunk_size: args.chunk_size,
    });
    let plan = app_config.into_plan()?;

    log::info!(
        "Converting {:?} with {:?} into {:?}",
        plan.capture_file,
        plan.dbc_file,
        plan.mcap_file
    );

    let mut decoder = Decoder::new();
    decoder
        .add_dbc(&plan.dbc_file)
        .with_context(|| format!("Failed to load DBC file {:?}", plan.dbc_file))?;

    let frames = can_mcap_decoder::open_capture(&plan.capture_file)
        .with_context(|| format!("Failed to open capture {:?}", plan.capture_file))?;
    let frames: Box<dyn Iterator<Item = can_mcap_decoder::Result<CanFrame>>> = match args.max_frames {
        Some(limit) => Box::new(frames.take(limit)),
        None => Box::new(frames),
    };

    let sink = McapSink::create(&plan.mcap_file, &plan.writer)
        .with_context(|| format!("Failed to create MCAP file {:?}", plan.mcap_file))?;
    let writer = ContainerWriter::new(sink, &plan.writer)?;

    let cancel = Arc::new(AtomicBool::new(false));
    // Detached; it ends with the process
    let _watcher = interrupt::cancel_on_ctrl_c(Arc::clone(&cancel))?;

    let result = decoder.convert_with(frames, &writer, &cancel, |signal| {
        if args.print_signals {
            println!("{}", report::signal_line(signal));
        }
    });

    // Finalize whatever was written, even when the conversion failed
    let closed = writer.close();
    let stats = result.with_context(|| format!("Conversion of {:?} failed", plan.capture_file))?;
    closed.with_context(|| format!("Failed to finalize MCAP file {:?}", plan.mcap_file))?;

    if stats.cancelled {
        log::warn!(
            "Conversion cancelled after {} frames; {:?} holds the signals written so far",
            stats.frames_read,
            plan.mcap_file
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if !quiet {
        print!(
            "{}",
            report::conversion_summary(&stats, &writer.channels(), &plan.mcap_file)
        );
    }
    Ok(())
}

/// Print database statistics for a DBC file
fn info(args: InfoArgs) -> Result<()> {
    let mut decoder = Decoder::new();
    decoder
        .add_dbc(&args.dbc_file)
        .with_context(|| format!("Failed to load DBC file {:?}", args.dbc_file))?;

    print!("{}", report::database_info(decoder.database(), args.signals));
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
