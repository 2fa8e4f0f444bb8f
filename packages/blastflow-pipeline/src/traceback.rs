use std::{collections::BTreeMap, sync::Arc};

use blastflow_domain::{ScoredHit, TracebackRecord};

use crate::{PipelineContext, PipelineEvent, Result, Stage, guard};

#[derive(Debug, Default)]
pub struct TracebackOutput {
	pub groups: usize,
	pub records: Vec<TracebackRecord>,
	pub failures: usize,
}

/// Calls the traceback engine once per `(partition, request)` group of surviving hits.
///
/// Groups are routed by partition like the search stage. A failed group yields no records and
/// leaves its siblings untouched.
pub async fn run_traceback(
	ctx: &Arc<PipelineContext>,
	survivors: Vec<ScoredHit>,
) -> Result<TracebackOutput> {
	let locality = ctx.locality();
	let exchange = ctx.exchange();
	let buckets = exchange.shuffle(survivors, |hit| locality.worker(hit.partition_id));
	let outputs = exchange
		.run(buckets, |worker, bucket| {
			let ctx = Arc::clone(ctx);

			async move { traceback_bucket(&ctx, worker, bucket).await }
		})
		.await?;
	let mut merged = TracebackOutput::default();

	for output in outputs {
		merged.groups += output.groups;
		merged.records.extend(output.records);
		merged.failures += output.failures;
	}

	Ok(merged)
}

async fn traceback_bucket(
	ctx: &PipelineContext,
	worker: usize,
	hits: Vec<ScoredHit>,
) -> TracebackOutput {
	let mut groups: BTreeMap<(u32, String), Vec<ScoredHit>> = BTreeMap::new();

	for hit in hits {
		groups.entry((hit.partition_id, hit.request_id.clone())).or_default().push(hit);
	}

	let mut output = TracebackOutput::default();

	for ((partition_id, request_id), group) in groups {
		output.groups += 1;

		match guard::contain(traceback_group(ctx, partition_id, &group)).await {
			Ok(records) => output.records.extend(records),
			Err(err) => {
				tracing::error!(
					error = %err,
					worker,
					request_id = %request_id,
					partition_id,
					hits = group.len(),
					"Traceback failed. Group yields no records."
				);
				ctx.events.emit(&PipelineEvent::EngineFailed {
					stage: Stage::Traceback,
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

async fn traceback_group(
	ctx: &PipelineContext,
	partition_id: u32,
	group: &[ScoredHit],
) -> color_eyre::Result<Vec<TracebackRecord>> {
	let Some(first) = group.first() else {
		return Ok(Vec::new());
	};
	let partition = ctx
		.catalog
		.get(partition_id)
		.ok_or_else(|| color_eyre::eyre::eyre!("Partition {partition_id} is not in the catalog."))?;
	let request = Arc::clone(&first.request);
	let records = ctx.engines.traceback.traceback(group, partition, &request).await?;

	Ok(records
		.into_iter()
		.map(|record| TracebackRecord {
			partition_id,
			request_id: request.id.clone(),
			evalue: record.evalue,
			score: record.score,
			seqid_hash: record.seqid_hash,
			payload: record.payload,
			top_n_traceback: request.top_n_traceback,
		})
		.collect())
}
