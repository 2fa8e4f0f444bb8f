use std::{num::NonZeroU32, sync::Arc};

use crate::Request;

/// One preliminary hit list from a single shard for a single request.
///
/// `top_n_prelim` is copied from the request so the cutoff stage needs no lookup. The request
/// itself travels along by reference because the traceback engine needs its query and parameters
/// and stages never re-fetch it.
#[derive(Debug, Clone)]
pub struct ScoredHit {
	pub partition_id: u32,
	pub request_id: String,
	pub max_score: i32,
	pub payload: Vec<u8>,
	pub top_n_prelim: NonZeroU32,
	pub request: Arc<Request>,
}
impl ScoredHit {
	pub fn new(
		partition_id: u32,
		request: &Arc<Request>,
		max_score: i32,
		payload: Vec<u8>,
	) -> Self {
		Self {
			partition_id,
			request_id: request.id.clone(),
			max_score,
			payload,
			top_n_prelim: request.top_n_prelim,
			request: Arc::clone(request),
		}
	}
}

/// Minimum score a hit needs to reach traceback. Zero disables filtering for the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutoff {
	pub request_id: String,
	pub threshold: i32,
}
impl Cutoff {
	pub const NONE: i32 = 0;

	/// Hits equal to the threshold pass, so the survivor set may exceed `top_n_prelim`.
	pub fn admits(&self, score: i32) -> bool {
		self.threshold == Self::NONE || score >= self.threshold
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_threshold_admits_everything() {
		let cutoff = Cutoff { request_id: "r".into(), threshold: 0 };

		assert!(cutoff.admits(i32::MIN));
		assert!(cutoff.admits(0));
	}

	#[test]
	fn boundary_ties_are_admitted() {
		let cutoff = Cutoff { request_id: "r".into(), threshold: 35 };

		assert!(cutoff.admits(35));
		assert!(cutoff.admits(60));
		assert!(!cutoff.admits(34));
	}
}
