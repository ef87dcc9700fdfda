use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use seqmatch::codec::encode_transfer;
use seqmatch::pipeline::{PipelineBackend, PipelineConfig};
use seqmatch::score_output::write_scores;
use seqmatch::seq_reader::read_sequences;
use seqmatch::session::{
    AcceleratorSession, BatchDescriptor, TransferPool, DEFAULT_POOL_CAPACITY,
};

#[derive(Parser)]
#[command(name = "seqmatch")]
#[command(about = "Matches variable-length sequences from a sequence database against a specimen panel", long_about = None)]
#[command(version)]
struct Cli {
    /// Query database: one sequence per line (.gz supported)
    #[arg(value_name = "DATABASE")]
    database: PathBuf,

    /// Specimen (reference panel): one sequence per line (.gz supported)
    #[arg(value_name = "SPECIMEN")]
    specimen: PathBuf,

    /// Output file for the raw score matrix
    #[arg(value_name = "SCORES")]
    scores: PathBuf,

    /// Number of parallel scoring lanes
    #[arg(short = 'l', long, value_name = "INT", default_value = "20")]
    lanes: usize,

    /// Seconds to wait for batch completion before giving up
    #[arg(short = 't', long, value_name = "SECONDS", default_value = "60")]
    timeout: u64,

    /// Verbosity: 1=error, 2=warning, 3=info, 4=debug, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: u8,
}

fn run(cli: &Cli) -> Result<()> {
    let queries = read_sequences(&cli.database)
        .with_context(|| format!("reading query database {}", cli.database.display()))?;
    log::info!("read {} sequences from the database", queries.len());

    let panel = read_sequences(&cli.specimen)
        .with_context(|| format!("reading specimen panel {}", cli.specimen.display()))?;
    log::info!("read {} sequences from the specimen", panel.len());

    let config = PipelineConfig {
        lanes: cli.lanes,
        ..PipelineConfig::default()
    };
    let pool = TransferPool::new(DEFAULT_POOL_CAPACITY);
    let mut session = AcceleratorSession::new(pool, Duration::from_secs(cli.timeout));
    session
        .open(Box::new(PipelineBackend::new(config)))
        .context("opening accelerator session")?;

    // Stage the batch: five transfer buffers, exactly the layout the
    // backend consumes.
    let (query_words, query_lengths) = encode_transfer(&queries);
    let (panel_words, panel_lengths) = encode_transfer(&panel);
    let score_bytes = queries.len() * panel.len();

    let desc = BatchDescriptor {
        query_seqs: session.allocate_buffer(query_words.len())?,
        query_lengths: session.allocate_buffer(query_lengths.len())?,
        query_count: queries.len() as u32,
        panel_seqs: session.allocate_buffer(panel_words.len())?,
        panel_lengths: session.allocate_buffer(panel_lengths.len())?,
        panel_count: panel.len() as u32,
        scores: session.allocate_buffer(score_bytes)?,
    };
    session
        .buffer_mut(desc.query_seqs)?
        .copy_from_slice(&query_words);
    session
        .buffer_mut(desc.query_lengths)?
        .copy_from_slice(&query_lengths);
    session
        .buffer_mut(desc.panel_seqs)?
        .copy_from_slice(&panel_words);
    session
        .buffer_mut(desc.panel_lengths)?
        .copy_from_slice(&panel_lengths);

    log::info!(
        "calculating scores: {} x {} = {} comparisons",
        queries.len(),
        panel.len(),
        score_bytes
    );
    let start = Instant::now();
    let comparisons = session.run_batch(&desc)?;
    let elapsed = start.elapsed();
    log::info!(
        "calculated {} scores in {:.3} s ({:.0} comparisons/s)",
        comparisons,
        elapsed.as_secs_f64(),
        comparisons as f64 / elapsed.as_secs_f64()
    );

    let scores: Vec<i8> = session
        .buffer(desc.scores)?
        .iter()
        .map(|&b| b as i8)
        .collect();
    write_scores(&cli.scores, &scores)
        .with_context(|| format!("writing scores to {}", cli.scores.display()))?;
    log::info!("scores dumped to {}", cli.scores.display());

    for handle in [
        desc.query_seqs,
        desc.query_lengths,
        desc.panel_seqs,
        desc.panel_lengths,
        desc.scores,
    ] {
        session.release_buffer(handle)?;
    }
    session.close();

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace, // 5+ = trace
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(&cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
