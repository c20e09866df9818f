use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parz_codecs::codec_by_name;
use parz_core::format::TRAILER_SIZE;
use parz_core::{compress_stream, decompress_stream, read_trailer, PipelineConfig, DEFAULT_BLOCK_SIZE};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "parz",
    about = "Block-parallel streaming compressor with a CRC-32 trailer",
    version
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a byte stream
    Compress {
        /// Source file ("-" reads stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
        /// Destination file ("-" writes stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
        /// Number of compress workers (default: logical CPU count)
        #[arg(short = 'p', long = "processes")]
        processes: Option<usize>,
        /// Codec to use: deflate | zstd | passthrough
        #[arg(short, long, default_value = "deflate")]
        codec: String,
        /// Codec compression level (deflate 0–9, zstd 1–22)
        #[arg(long)]
        level: Option<i32>,
        /// Raw bytes per block (default: 131072 = 128 KB)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },
    /// Decompress a stream and verify its trailer
    Decompress {
        /// Source file ("-" reads stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
        /// Destination file ("-" writes stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
        /// Codec the stream was compressed with
        #[arg(short, long, default_value = "deflate")]
        codec: String,
    },
    /// Print the trailer of a compressed file
    Inspect {
        /// Compressed file to inspect
        file: PathBuf,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_thread_names(true)
        .init();
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read + Send>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("opening input file {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn create_output(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = File::create(path).with_context(|| format!("creating output file {:?}", path))?;
    Ok(Box::new(file))
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn throughput(bytes: u64, secs: f64) -> String {
    if secs <= 0.0 {
        return "n/a".to_string();
    }
    format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    processes: Option<usize>,
    codec_name: &str,
    level: Option<i32>,
    block_size: usize,
) -> anyhow::Result<()> {
    let codec = codec_by_name(codec_name, level)?;
    let workers = processes.unwrap_or_else(num_cpus::get);
    let config = PipelineConfig::new(block_size, workers);
    config.validate()?;

    let src = open_input(&input)?;
    let dst = create_output(&output)?;
    let report = compress_stream(src, dst, codec.as_ref(), &config)
        .with_context(|| format!("compressing {:?}", input))?;

    let secs = report.elapsed.as_secs_f64();
    eprintln!("  codec       : {}", codec.name());
    eprintln!("  workers     : {}", report.workers);
    eprintln!("  block size  : {}", human_bytes(block_size as u64));
    eprintln!("  blocks      : {}", report.blocks);
    eprintln!("  raw size    : {}", human_bytes(report.raw_bytes));
    eprintln!("  compressed  : {}", human_bytes(report.output_bytes()));
    eprintln!("  ratio       : {:.2}x", report.ratio());
    eprintln!("  crc32       : {:08x}", report.checksum.crc32);
    eprintln!("  throughput  : {}", throughput(report.raw_bytes, secs));
    eprintln!("  elapsed     : {:.3}s", secs);
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, codec_name: &str) -> anyhow::Result<()> {
    let codec = codec_by_name(codec_name, None)?;
    let src = open_input(&input)?;
    let dst = create_output(&output)?;

    let t0 = Instant::now();
    let report = decompress_stream(src, dst, codec.as_ref())
        .with_context(|| format!("decompressing {:?}", input))?;
    let secs = t0.elapsed().as_secs_f64();

    eprintln!("  codec       : {}", codec.name());
    eprintln!("  compressed  : {}", human_bytes(report.payload_bytes + TRAILER_SIZE as u64));
    eprintln!("  raw size    : {}", human_bytes(report.raw_bytes));
    eprintln!("  crc32       : {:08x} (verified)", report.crc32);
    eprintln!("  throughput  : {}", throughput(report.raw_bytes, secs));
    eprintln!("  elapsed     : {:.3}s", secs);
    Ok(())
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let f = File::open(&file).with_context(|| format!("opening {:?}", file))?;
    let (trailer, payload_len) = read_trailer(f)?;

    println!("=== parz stream: {:?} ===", file);
    println!();
    println!("  payload        : {}", human_bytes(payload_len));
    println!("  trailer crc32  : {:08x}", trailer.crc32);
    println!(
        "  trailer length : {} ({} mod 2^32)",
        human_bytes(trailer.raw_len as u64),
        trailer.raw_len
    );
    if trailer.raw_len > 0 {
        println!(
            "  ratio          : {:.2}x (assuming input under 4 GB)",
            trailer.raw_len as f64 / (payload_len + TRAILER_SIZE as u64) as f64
        );
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Compress {
            input,
            output,
            processes,
            codec,
            level,
            block_size,
        } => run_compress(input, output, processes, &codec, level, block_size),
        Commands::Decompress {
            input,
            output,
            codec,
        } => run_decompress(input, output, &codec),
        Commands::Inspect { file } => run_inspect(file),
    }
}
