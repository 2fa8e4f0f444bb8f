use std::{collections::BTreeMap, sync::Arc};

use ahash::AHashMap;

use blastflow_domain::{Cutoff, ScoredHit};

use crate::{PipelineContext, Result};

/// One side of the hit/cutoff join, routed by request id.
#[derive(Debug)]
enum JoinSide {
	Cutoff(Cutoff),
	Hit(ScoredHit),
}
impl JoinSide {
	fn request_id(&self) -> &str {
		match self {
			Self::Cutoff(cutoff) => &cutoff.request_id,
			Self::Hit(hit) => &hit.request_id,
		}
	}
}

#[derive(Debug, Default)]
pub struct FilterOutput {
	pub survivors: Vec<ScoredHit>,
	pub dropped: usize,
}

/// Keeps hits whose score reaches their request's cutoff.
///
/// Hits and cutoffs are routed with the same request-key partitioner, so each worker joins only
/// its own bucket. Dropped hits are not errors.
pub async fn apply_cutoffs(
	ctx: &Arc<PipelineContext>,
	hits: Vec<ScoredHit>,
	cutoffs: &BTreeMap<String, Cutoff>,
) -> Result<FilterOutput> {
	let request_key = ctx.request_key();
	let exchange = ctx.exchange();
	let sides =
		cutoffs.values().cloned().map(JoinSide::Cutoff).chain(hits.into_iter().map(JoinSide::Hit));
	let buckets = exchange.shuffle(sides, |side| request_key.worker(side.request_id()));
	let outputs = exchange.run(buckets, |_, bucket| async move { join_bucket(bucket) }).await?;
	let mut merged = FilterOutput::default();

	for output in outputs {
		merged.survivors.extend(output.survivors);
		merged.dropped += output.dropped;
	}

	Ok(merged)
}

fn join_bucket(bucket: Vec<JoinSide>) -> FilterOutput {
	let mut cutoffs: AHashMap<String, Cutoff> = AHashMap::new();
	let mut hits = Vec::new();

	for side in bucket {
		match side {
			JoinSide::Cutoff(cutoff) => {
				cutoffs.insert(cutoff.request_id.clone(), cutoff);
			},
			JoinSide::Hit(hit) => hits.push(hit),
		}
	}

	let mut output = FilterOutput::default();

	for hit in hits {
		let Some(cutoff) = cutoffs.get(&hit.request_id) else {
			tracing::warn!(request_id = %hit.request_id, "Hit has no cutoff. Dropping it.");

			output.dropped += 1;

			continue;
		};

		if cutoff.admits(hit.max_score) {
			output.survivors.push(hit);
		} else {
			output.dropped += 1;
		}
	}

	output
}
