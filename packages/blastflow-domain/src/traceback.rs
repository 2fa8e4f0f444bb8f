use std::{cmp::Ordering, num::NonZeroU32};

/// One fully detailed alignment produced by the traceback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracebackRecord {
	pub partition_id: u32,
	pub request_id: String,
	/// `-10000 * ln(E-value)` as reported by the engine.
	pub evalue: i32,
	pub score: i32,
	pub seqid_hash: i32,
	/// Self-delimiting encoded alignment; concatenated as-is into the framed result.
	pub payload: Vec<u8>,
	pub top_n_traceback: NonZeroU32,
}

/// Canonical order for traceback records: descending `evalue` field, then descending `score`,
/// then descending `seqid_hash`.
pub fn significance_order(a: &TracebackRecord, b: &TracebackRecord) -> Ordering {
	b.evalue
		.cmp(&a.evalue)
		.then_with(|| b.score.cmp(&a.score))
		.then_with(|| b.seqid_hash.cmp(&a.seqid_hash))
}
