use std::{collections::BTreeMap, num::NonZeroU32, sync::Arc};

use blastflow_domain::{Cutoff, ScoredHit};

use crate::{PipelineContext, PipelineEvent, Result};

/// The slice of a hit the cutoff needs. Hits themselves stay where they are.
#[derive(Debug, Clone)]
struct ScoreEntry {
	request_id: String,
	max_score: i32,
	top_n_prelim: NonZeroU32,
}

/// Threshold for one request: the `top_n`-th largest score when there are more than `top_n`
/// scores, otherwise [`Cutoff::NONE`].
pub fn compute_threshold(mut scores: Vec<i32>, top_n: NonZeroU32) -> i32 {
	let k = top_n.get() as usize;

	if scores.len() <= k {
		return Cutoff::NONE;
	}

	scores.sort_unstable_by(|a, b| b.cmp(a));

	scores[k - 1]
}

/// Regroups every hit's score by request and computes one cutoff per request.
///
/// This is the only full shuffle by request in the pipeline. Results are keyed by request id.
pub async fn compute_cutoffs(
	ctx: &Arc<PipelineContext>,
	hits: &[ScoredHit],
) -> Result<BTreeMap<String, Cutoff>> {
	let request_key = ctx.request_key();
	let exchange = ctx.exchange();
	let entries = hits.iter().map(|hit| ScoreEntry {
		request_id: hit.request_id.clone(),
		max_score: hit.max_score,
		top_n_prelim: hit.top_n_prelim,
	});
	let buckets = exchange.shuffle(entries, |entry| request_key.worker(&entry.request_id));
	let outputs = exchange
		.run(buckets, |_, bucket| {
			let ctx = Arc::clone(ctx);

			async move { cutoffs_for_bucket(&ctx, bucket) }
		})
		.await?;

	Ok(outputs.into_iter().flatten().map(|cutoff| (cutoff.request_id.clone(), cutoff)).collect())
}

fn cutoffs_for_bucket(ctx: &PipelineContext, entries: Vec<ScoreEntry>) -> Vec<Cutoff> {
	let mut grouped: BTreeMap<String, (NonZeroU32, Vec<i32>)> = BTreeMap::new();

	for entry in entries {
		// Every hit of a request carries the same K; the first one seen wins.
		grouped
			.entry(entry.request_id)
			.or_insert_with(|| (entry.top_n_prelim, Vec::new()))
			.1
			.push(entry.max_score);
	}

	grouped
		.into_iter()
		.map(|(request_id, (top_n, scores))| {
			let hits = scores.len();
			let threshold = compute_threshold(scores, top_n);

			tracing::debug!(request_id = %request_id, threshold, hits, "Cutoff computed.");
			ctx.events.emit(&PipelineEvent::CutoffComputed {
				request_id: request_id.clone(),
				threshold,
				hits,
			});

			Cutoff { request_id, threshold }
		})
		.collect()
}
