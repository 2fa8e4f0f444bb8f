use std::sync::Arc;

use blastflow_domain::ScoredHit;

use crate::{PipelineContext, PipelineEvent, Result, Stage, fanout::SearchTask, guard};

#[derive(Debug, Default)]
pub struct SearchOutput {
	pub pairs: usize,
	pub hits: Vec<ScoredHit>,
	pub failures: usize,
}
impl SearchOutput {
	fn absorb(&mut self, other: Self) {
		self.pairs += other.pairs;
		self.hits.extend(other.hits);
		self.failures += other.failures;
	}
}

/// Runs the preliminary search for every task on the worker its partition maps to.
///
/// A failed or panicking pair contributes zero hits. It is logged and reported as an event, and never fails
/// the batch.
pub async fn run_search(
	ctx: &Arc<PipelineContext>,
	tasks: Vec<SearchTask>,
) -> Result<SearchOutput> {
	let locality = ctx.locality();
	let exchange = ctx.exchange();
	let buckets = exchange.shuffle(tasks, |task| locality.worker(task.partition.id));
	let outputs = exchange
		.run(buckets, |worker, bucket| {
			let ctx = Arc::clone(ctx);

			async move { search_bucket(&ctx, worker, bucket).await }
		})
		.await?;
	let mut merged = SearchOutput::default();

	for output in outputs {
		merged.absorb(output);
	}

	Ok(merged)
}

async fn search_bucket(
	ctx: &PipelineContext,
	worker: usize,
	tasks: Vec<SearchTask>,
) -> SearchOutput {
	let mut output = SearchOutput::default();

	for task in tasks {
		let request_id = task.request.id.clone();
		let partition_id = task.partition.id;

		output.pairs += 1;

		ctx.events
			.emit(&PipelineEvent::JobStarted { request_id: request_id.clone(), partition_id });

		match guard::contain(ctx.engines.search.search(&task.partition, &task.request)).await {
			Ok(found) => {
				ctx.events.emit(&PipelineEvent::JobDone {
					request_id,
					partition_id,
					hits: found.len(),
				});
				output.hits.extend(found.into_iter().map(|hit| {
					ScoredHit::new(partition_id, &task.request, hit.max_score, hit.payload)
				}));
			},
			Err(err) => {
				tracing::error!(
					error = %err,
					worker,
					request_id = %request_id,
					partition_id,
					"Search failed. Treating pair as zero hits."
				);
				ctx.events.emit(&PipelineEvent::EngineFailed {
					stage: Stage::Search,
					request_id,
					partition_id,
					message: err.to_string(),
				});

				output.failures += 1;
			},
		}
	}

	output
}
