use std::sync::Arc;

use blastflow_domain::{PartitionCatalog, PartitionDescriptor, Request};

/// One unit of preliminary search work.
#[derive(Debug, Clone)]
pub struct SearchTask {
	pub partition: Arc<PartitionDescriptor>,
	pub request: Arc<Request>,
}

/// Pairs every request with every partition. Every shard must be searched, so this is a full
/// cartesian product. Tasks come out request-major, partitions ascending.
pub fn fan_out(catalog: &PartitionCatalog, requests: &[Arc<Request>]) -> Vec<SearchTask> {
	requests
		.iter()
		.flat_map(|request| {
			catalog.iter().map(move |partition| SearchTask {
				partition: Arc::clone(partition),
				request: Arc::clone(request),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::num::NonZeroU32;

	use blastflow_domain::PartitionDescriptor;

	use super::*;

	fn request(id: &str) -> Arc<Request> {
		Arc::new(Request {
			id: id.to_string(),
			db_tag: "nt".to_string(),
			query_sequence: "ACGT".to_string(),
			query_url: String::new(),
			program: "blastn".to_string(),
			parameters: String::new(),
			top_n_prelim: NonZeroU32::MIN,
			top_n_traceback: NonZeroU32::MIN,
			start_time: None,
			admitted_at: time::OffsetDateTime::UNIX_EPOCH,
		})
	}

	#[test]
	fn pairs_every_request_with_every_partition() {
		let catalog = PartitionCatalog::new(
			(0..3).map(|nr| PartitionDescriptor::from_pattern("/db", "nt", nr, true)),
		);
		let tasks = fan_out(&catalog, &[request("A"), request("B")]);
		let pairs: Vec<_> =
			tasks.iter().map(|task| (task.request.id.as_str(), task.partition.id)).collect();

		assert_eq!(pairs, vec![("A", 0), ("A", 1), ("A", 2), ("B", 0), ("B", 1), ("B", 2)]);
	}

	#[test]
	fn empty_catalog_yields_no_work() {
		assert!(fan_out(&PartitionCatalog::default(), &[request("A")]).is_empty());
	}
}
