use tracing::{debug, info, warn};

use crate::config::BenchConfig;
use crate::errors::BenchError;
use crate::filter::integer_mean;
use crate::launch::{Invocation, Launcher};
use crate::parse::OutputParser;
use crate::types::{CellId, ModeSpec, ResultMatrix};

/// Outcome of a single configuration cell that produced a value.
#[derive(Debug, Clone, PartialEq)]
pub struct CellReport {
    pub millis: u64,
    pub samples: usize,
    pub failed_runs: usize,
    pub excluded: usize,
}

/// Everything a complete run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub matrix: ResultMatrix,
    /// Cells left out of the matrix, in the order they were benchmarked.
    pub missing: Vec<CellId>,
    pub failed_runs: usize,
    pub excluded_samples: usize,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Drives the program under test across every configured cell.
///
/// Cells run one after another, and so do repetitions within a cell; each
/// repetition blocks until its child process exits.
pub struct BenchmarkRunner<L, P> {
    config: BenchConfig,
    launcher: L,
    parser: P,
}

impl<L: Launcher, P: OutputParser> BenchmarkRunner<L, P> {
    pub fn new(config: BenchConfig, launcher: L, parser: P) -> Self {
        BenchmarkRunner {
            config,
            launcher,
            parser,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn run(&self) -> RunReport {
        let mut report = RunReport::default();

        for mode in &self.config.modes {
            report.matrix.ensure_mode(&mode.name);

            for &threads in self.config.threads_for(mode) {
                let cell = CellId {
                    mode: mode.name.clone(),
                    threads,
                };
                info!(cell = %cell, "benchmarking");

                let (result, failed) = self.run_cell(mode, threads);
                report.failed_runs += failed;
                match result {
                    Ok(cell_report) => {
                        report.excluded_samples += cell_report.excluded;
                        if !report.matrix.record(&mode.name, threads, cell_report.millis) {
                            warn!(cell = %cell, millis = cell_report.millis, "cell already recorded, result discarded");
                            continue;
                        }
                        info!(
                            cell = %cell,
                            millis = cell_report.millis,
                            samples = cell_report.samples,
                            "cell averaged"
                        );
                    }
                    Err(err) => {
                        if let BenchError::AllFiltered { count, .. } = &err {
                            report.excluded_samples += count;
                        }
                        warn!(cell = %cell, "{}", err);
                        report.missing.push(cell);
                    }
                }
            }
        }

        report
    }

    /// Run every repetition of one cell and reduce the samples to a value.
    ///
    /// Also returns the number of repetitions that yielded no sample.
    pub fn run_cell(&self, mode: &ModeSpec, threads: u32) -> (Result<CellReport, BenchError>, usize) {
        let cell = CellId {
            mode: mode.name.clone(),
            threads,
        };
        let invocation = self.invocation(mode, threads);

        let mut samples = Vec::with_capacity(self.config.runs);
        let mut failed = 0;
        for run in 1..=self.config.runs {
            match self.sample(&invocation) {
                Ok(millis) => {
                    debug!(cell = %cell, run, millis, "parsed time");
                    samples.push(millis);
                }
                Err(err) => {
                    failed += 1;
                    warn!(cell = %cell, run, "run skipped: {}", err);
                }
            }
        }

        (self.reduce(&cell, &samples, failed), failed)
    }

    fn reduce(&self, cell: &CellId, samples: &[u64], failed: usize) -> Result<CellReport, BenchError> {
        if samples.is_empty() {
            return Err(BenchError::NoSamples {
                cell: cell.to_string(),
            });
        }

        let outcome = self.config.filter.apply(samples);
        for value in &outcome.dropped {
            warn!(
                cell = %cell,
                "excluded outlier: {}ms (avg {:.2}ms)",
                value, outcome.mean
            );
        }

        let millis = integer_mean(&outcome.kept).ok_or_else(|| BenchError::AllFiltered {
            cell: cell.to_string(),
            count: samples.len(),
        })?;

        Ok(CellReport {
            millis,
            samples: outcome.kept.len(),
            failed_runs: failed,
            excluded: outcome.dropped.len(),
        })
    }

    fn sample(&self, invocation: &Invocation) -> Result<u64, BenchError> {
        let run = self
            .launcher
            .launch(invocation)
            .map_err(|source| BenchError::Spawn {
                program: invocation.program.display().to_string(),
                source,
            })?;

        if !run.success {
            return Err(BenchError::ProcessFailed {
                command: invocation.to_string(),
                status: run.status_text(),
            });
        }

        self.parser.parse(&run.stdout)
    }

    /// `[pre args...] [mode-id] <threads> [extra args...]`
    pub fn invocation(&self, mode: &ModeSpec, threads: u32) -> Invocation {
        let mut args = self.config.pre_args.clone();
        if let Some(id) = &mode.id {
            args.push(id.clone());
        }
        args.push(threads.to_string());
        args.extend(self.config.extra_args.iter().cloned());

        Invocation {
            program: self.config.program.clone(),
            args,
        }
    }
}
