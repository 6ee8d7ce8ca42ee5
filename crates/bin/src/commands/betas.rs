//! The `betas` subcommand: rolling beta estimation over a CSV universe.

use crate::io::read_csv;
use albany::pipeline::{BetaPipelineConfig, run_beta_pipeline};
use albany::panel::PanelConfig;
use albany_beta::{BatchConfig, RollingCapmConfig, default_workers};
use albany_output::{RunSummary, write_frame_csv};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Parameters collected from the command line.
pub(crate) struct BetasParams<'a> {
    pub returns: &'a Path,
    pub factor: &'a Path,
    pub period_col: &'a str,
    pub daily: bool,
    pub window: usize,
    pub min_obs: usize,
    pub min_observations: Option<usize>,
    pub batch_size: usize,
    pub workers: Option<usize>,
    pub output: &'a Path,
    pub json: bool,
}

/// Entities need more raw observations than the window is long before they
/// are worth densifying at all, unless the caller overrides the threshold.
pub(crate) const fn effective_min_observations(
    min_observations: Option<usize>,
    window: usize,
) -> usize {
    match min_observations {
        Some(n) => n,
        None => window + 1,
    }
}

pub(crate) fn run(params: &BetasParams<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let returns = read_csv(params.returns)?;
    let factor = read_csv(params.factor)?;

    let cfg = BetaPipelineConfig {
        panel: PanelConfig {
            min_observations: effective_min_observations(params.min_observations, params.window),
        },
        rolling: RollingCapmConfig {
            window: params.window,
            min_obs: params.min_obs,
        },
        batch: BatchConfig {
            batch_size: params.batch_size,
            workers: params.workers.unwrap_or_else(default_workers),
            monthly_output: params.daily,
        },
    };

    let mut bar: Option<ProgressBar> = None;
    let out = run_beta_pipeline(&returns, &factor, params.period_col, &cfg, |outcome| {
        let bar = bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(outcome.n_batches as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .expect("valid template")
                    .progress_chars("█▓░"),
            );
            bar.set_message("Estimating betas...");
            bar
        });
        bar.inc(1);
    })?;
    if let Some(bar) = bar {
        bar.finish_with_message(format!("{} beta records", out.betas.height()));
    }

    let mut betas = out.betas;
    write_frame_csv(&mut betas, params.output)?;

    let mut summary = RunSummary::new("betas".to_string(), out.stats);
    if let Some((start, end)) = out.period_range {
        summary = summary.with_period(start, end);
    }
    if params.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
        println!("wrote {}", params.output.display());
    }

    Ok(())
}
