use std::{collections::BTreeMap, sync::Arc};

use blastflow_domain::{FramedResult, TracebackRecord, significance_order};

use crate::{PipelineContext, PipelineEvent, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
	pub request_id: String,
	pub key: String,
	pub records: usize,
	pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct MergeOutput {
	pub written: Vec<WrittenArtifact>,
	pub write_failures: usize,
}

/// Sorts a request's records into canonical order and keeps the first `top_n_traceback`.
///
/// Records equal on every comparator field keep ascending partition order, and the engine's
/// order within one partition, so repeated runs frame identical bytes.
pub fn select_top(mut records: Vec<TracebackRecord>) -> Vec<TracebackRecord> {
	let Some(top_n) = records.first().map(|record| record.top_n_traceback.get() as usize) else {
		return records;
	};

	records.sort_by(|a, b| {
		significance_order(a, b).then_with(|| a.partition_id.cmp(&b.partition_id))
	});
	records.truncate(top_n);

	records
}

/// Regroups traceback records by request, frames the top records and writes one artifact per
/// request. A request without records writes nothing. Failed writes are logged and not retried.
pub async fn merge_and_write(
	ctx: &Arc<PipelineContext>,
	records: Vec<TracebackRecord>,
) -> Result<MergeOutput> {
	let request_key = ctx.request_key();
	let exchange = ctx.exchange();
	let buckets = exchange.shuffle(records, |record| request_key.worker(&record.request_id));
	let outputs = exchange
		.run(buckets, |_, bucket| {
			let ctx = Arc::clone(ctx);

			async move { merge_bucket(&ctx, bucket).await }
		})
		.await?;
	let mut merged = MergeOutput::default();

	for output in outputs {
		merged.written.extend(output.written);
		merged.write_failures += output.write_failures;
	}

	merged.written.sort_by(|a, b| a.request_id.cmp(&b.request_id));

	Ok(merged)
}

async fn merge_bucket(ctx: &PipelineContext, records: Vec<TracebackRecord>) -> MergeOutput {
	let mut grouped: BTreeMap<String, Vec<TracebackRecord>> = BTreeMap::new();

	for record in records {
		grouped.entry(record.request_id.clone()).or_default().push(record);
	}

	let mut output = MergeOutput::default();

	for (request_id, records) in grouped {
		let framed = FramedResult::frame(&request_id, &select_top(records));
		let name = framed.artifact_name();
		let bytes = framed.bytes.len();

		match ctx.sink.write(&name, framed.bytes).await {
			Ok(key) => {
				tracing::info!(
					request_id = %request_id,
					key = %key,
					records = framed.records,
					bytes,
					"Result written."
				);
				ctx.events.emit(&PipelineEvent::ResultWritten {
					request_id: request_id.clone(),
					key: key.clone(),
					records: framed.records,
					bytes,
				});
				output.written.push(WrittenArtifact {
					request_id,
					key,
					records: framed.records,
					bytes,
				});
			},
			Err(err) => {
				tracing::error!(
					error = %err,
					request_id = %request_id,
					artifact = %name,
					"Result write failed. Result is lost for this batch."
				);
				ctx.events
					.emit(&PipelineEvent::WriteFailed { request_id, message: err.to_string() });

				output.write_failures += 1;
			},
		}
	}

	output
}

#[cfg(test)]
mod tests {
	use std::num::NonZeroU32;

	use super::*;

	fn record(
		partition_id: u32,
		evalue: i32,
		score: i32,
		seqid_hash: i32,
		top_n: u32,
	) -> TracebackRecord {
		TracebackRecord {
			partition_id,
			request_id: "R1".to_string(),
			evalue,
			score,
			seqid_hash,
			payload: vec![partition_id as u8],
			top_n_traceback: NonZeroU32::new(top_n).expect("non-zero"),
		}
	}

	#[test]
	fn keeps_top_n_in_canonical_order() {
		let records = vec![
			record(0, 100, 10, 1, 2),
			record(1, 900, 5, 1, 2),
			record(2, 900, 50, 1, 2),
		];
		let top: Vec<_> = select_top(records).into_iter().map(|r| r.partition_id).collect();

		assert_eq!(top, vec![2, 1]);
	}

	#[test]
	fn takes_everything_when_fewer_than_n() {
		assert_eq!(select_top(vec![record(0, 1, 1, 1, 5)]).len(), 1);
		assert!(select_top(Vec::new()).is_empty());
	}

	#[test]
	fn full_ties_keep_ascending_partition_order() {
		let records = vec![record(4, 7, 7, 7, 3), record(1, 7, 7, 7, 3), record(2, 7, 7, 7, 3)];
		let top: Vec<_> = select_top(records).into_iter().map(|r| r.partition_id).collect();

		assert_eq!(top, vec![1, 2, 4]);
	}
}
