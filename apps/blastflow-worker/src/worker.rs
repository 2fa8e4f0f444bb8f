use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time};

use blastflow_pipeline::{AdmissionQueue, BatchReport, PipelineContext};

use crate::Result;

pub struct WorkerState {
	pub ctx: Arc<PipelineContext>,
	pub queue: Arc<AdmissionQueue>,
	pub batch_interval: Duration,
	pub max_batch_requests: usize,
}
impl WorkerState {
	pub fn new(
		ctx: Arc<PipelineContext>,
		queue: Arc<AdmissionQueue>,
		cfg: &blastflow_config::Pipeline,
	) -> Self {
		Self {
			ctx,
			queue,
			batch_interval: Duration::from_millis(cfg.batch_interval_ms),
			max_batch_requests: cfg.max_batch_requests as usize,
		}
	}
}

/// Drains one micro-batch from the backlog and runs it. Returns `None` when nothing was waiting.
pub async fn run_once(state: &WorkerState) -> Result<Option<BatchReport>> {
	let requests = state.queue.drain(state.max_batch_requests);

	if requests.is_empty() {
		return Ok(None);
	}

	Ok(Some(blastflow_pipeline::run_batch(&state.ctx, requests).await?))
}

/// Runs a batch every interval until `stop` flips to `true`.
///
/// The stop signal is only observed between batches, so a batch in flight always completes.
pub async fn run_worker(state: WorkerState, mut stop: watch::Receiver<bool>) -> Result<()> {
	let mut ticker = time::interval(state.batch_interval);

	ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = ticker.tick() => {},
			changed = stop.changed() => {
				if changed.is_err() || *stop.borrow() {
					break;
				}

				continue;
			},
		}

		if *stop.borrow() {
			break;
		}
		if let Err(err) = run_once(&state).await {
			tracing::error!(error = %err, "Micro-batch failed.");
		}
	}

	tracing::info!(pending = state.queue.len(), "Worker stopped.");

	Ok(())
}
