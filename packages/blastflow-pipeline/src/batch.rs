use std::{collections::BTreeMap, sync::Arc};

use time::OffsetDateTime;

use blastflow_domain::Request;

use crate::{
	PipelineContext, Result, cutoff, fanout, filter,
	merge::{self, WrittenArtifact},
	search, traceback,
};

/// What one micro-batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
	pub started_at: Option<OffsetDateTime>,
	pub requests: usize,
	pub pairs: usize,
	pub hits: usize,
	pub survivors: usize,
	pub traceback_groups: usize,
	pub traceback_records: usize,
	pub search_failures: usize,
	pub traceback_failures: usize,
	pub write_failures: usize,
	pub cutoffs: BTreeMap<String, i32>,
	pub artifacts: Vec<WrittenArtifact>,
}

/// Runs `requests` through every stage: fan-out, search, cutoff, filter, traceback, then
/// merge and write.
///
/// Engine and write failures are absorbed per pair, group or request and show up only in the
/// report and the event sink. An error here means a worker task itself died.
pub async fn run_batch(
	ctx: &Arc<PipelineContext>,
	requests: Vec<Arc<Request>>,
) -> Result<BatchReport> {
	let mut report = BatchReport {
		started_at: Some(OffsetDateTime::now_utc()),
		requests: requests.len(),
		..Default::default()
	};

	if requests.is_empty() {
		return Ok(report);
	}

	tracing::info!(requests = requests.len(), partitions = ctx.catalog.len(), "Batch started.");

	let tasks = fanout::fan_out(&ctx.catalog, &requests);
	let searched = search::run_search(ctx, tasks).await?;

	report.pairs = searched.pairs;
	report.hits = searched.hits.len();
	report.search_failures = searched.failures;

	let cutoffs = cutoff::compute_cutoffs(ctx, &searched.hits).await?;

	report.cutoffs =
		cutoffs.iter().map(|(request_id, cutoff)| (request_id.clone(), cutoff.threshold)).collect();

	let filtered = filter::apply_cutoffs(ctx, searched.hits, &cutoffs).await?;

	report.survivors = filtered.survivors.len();

	let traced = traceback::run_traceback(ctx, filtered.survivors).await?;

	report.traceback_groups = traced.groups;
	report.traceback_records = traced.records.len();
	report.traceback_failures = traced.failures;

	let merged = merge::merge_and_write(ctx, traced.records).await?;

	report.write_failures = merged.write_failures;
	report.artifacts = merged.written;

	tracing::info!(
		requests = report.requests,
		pairs = report.pairs,
		hits = report.hits,
		survivors = report.survivors,
		traceback_records = report.traceback_records,
		artifacts = report.artifacts.len(),
		search_failures = report.search_failures,
		traceback_failures = report.traceback_failures,
		write_failures = report.write_failures,
		"Batch finished."
	);

	Ok(report)
}
