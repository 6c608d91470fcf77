//! Batch command implementation.

use super::output::{format_batch_csv, format_batch_text};
use super::{BatchFormat, CliError, load_config, seed_or_now};
use deeprts::batch::{BatchConfig, run_batch_stats, skirmish_config};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} games ({per_sec})";

/// Options for the batch command.
#[derive(Debug)]
pub(crate) struct BatchOptions {
    pub(crate) games: u64,
    pub(crate) seed: Option<u64>,
    pub(crate) threads: Option<usize>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) batch: BatchConfig,
    pub(crate) format: BatchFormat,
    pub(crate) progress: bool,
}

/// Execute the batch command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or output fails.
pub(crate) fn execute(options: BatchOptions) -> Result<(), CliError> {
    let config = load_config(options.config.as_deref(), skirmish_config())?;

    // Set thread pool size if specified
    if let Some(num_threads) = options.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let base_seed = seed_or_now(options.seed);

    let pb = if options.progress {
        let pb = ProgressBar::new(options.games);
        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .map_err(|e| CliError::new(format!("Invalid progress template: {e}")))?
            .progress_chars("=>-");
        pb.set_style(style);
        pb
    } else {
        ProgressBar::hidden()
    };

    let start = Instant::now();
    let stats = run_batch_stats(base_seed, options.games, &config, &options.batch, || {
        pb.inc(1);
    });
    pb.finish_and_clear();
    let duration = start.elapsed();

    #[allow(clippy::cast_precision_loss)]
    let games_per_sec = if duration.as_secs_f64() > 0.0 {
        stats.games_played as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    match options.format {
        BatchFormat::Text => {
            println!("Base seed: {base_seed}");
            println!();
            print!("{}", format_batch_text(&stats));
            println!();
            println!(
                "Duration: {:.2}s ({games_per_sec:.0} games/sec)",
                duration.as_secs_f64()
            );
        }
        BatchFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        BatchFormat::Csv => print!("{}", format_batch_csv(&stats)),
    }

    Ok(())
}
