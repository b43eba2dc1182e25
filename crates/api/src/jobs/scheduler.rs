//! Periodic maintenance tasks for the relay: offline replay sweeps, admin
//! feed reconciliation and pool gauges.

use metrics::counter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often a job fires.
#[derive(Debug, Clone, Copy)]
pub enum JobFrequency {
    Seconds(u64),
    Minutes(u64),
}

impl JobFrequency {
    /// Period between runs, clamped to at least one second.
    pub fn duration(&self) -> Duration {
        let secs = match self {
            JobFrequency::Seconds(secs) => *secs,
            JobFrequency::Minutes(mins) => mins.saturating_mul(60),
        };
        Duration::from_secs(secs.max(1))
    }
}

/// A unit of recurring maintenance work.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Stable identifier, used as the `job` log field and metric label.
    fn name(&self) -> &'static str;

    fn frequency(&self) -> JobFrequency;

    /// One pass of the job. An error is logged and the job keeps its schedule.
    async fn execute(&self) -> Result<(), String>;
}

/// Owns the recurring jobs and their stop signal.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Spawns one task per job. The first run happens one period after start.
    pub fn start(&mut self) {
        info!(job_count = self.jobs.len(), "Maintenance jobs starting");

        for job in &self.jobs {
            let handle = tokio::spawn(run_periodically(
                Arc::clone(job),
                self.shutdown_rx.clone(),
            ));
            self.handles.push(handle);
        }
    }

    /// Signals every job to stop after its current pass.
    pub fn shutdown(&self) {
        info!("Maintenance jobs stopping");
        let _ = self.shutdown_tx.send(true);
    }

    /// Joins the job tasks. Returns `false` when `timeout` elapsed first.
    pub async fn wait_for_shutdown(self, timeout: Duration) -> bool {
        debug!(timeout_ms = timeout.as_millis(), "Joining maintenance jobs");

        let join_all = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Maintenance job task aborted");
                }
            }
        };

        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => {
                info!("Maintenance jobs stopped");
                true
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis(), "Maintenance jobs still running at deadline");
                false
            }
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_periodically(job: Arc<dyn Job>, mut stop: watch::Receiver<bool>) {
    let name = job.name();
    let period = job.frequency().duration();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval fires immediately once
    ticker.tick().await;

    debug!(job = name, period_ms = period.as_millis(), "Maintenance job armed");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let started = Instant::now();
                let result = job.execute().await;
                let elapsed_ms = started.elapsed().as_millis();
                match result {
                    Ok(()) => {
                        counter!("background_job_runs_total", "job" => name, "outcome" => "ok")
                            .increment(1);
                        debug!(job = name, elapsed_ms = elapsed_ms, "Maintenance pass done");
                    }
                    Err(e) => {
                        counter!("background_job_runs_total", "job" => name, "outcome" => "error")
                            .increment(1);
                        error!(job = name, elapsed_ms = elapsed_ms, error = %e, "Maintenance pass failed");
                    }
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    debug!(job = name, "Maintenance job stopped");
                    break;
                }
            }
        }
    }
}
