use std::num::NonZeroU32;

/// Routes `(partition, request)` pairs by partition id so a shard keeps landing on the same
/// worker across batches.
#[derive(Debug, Clone, Copy)]
pub struct LocalityPartitioner {
	workers: NonZeroU32,
}
impl LocalityPartitioner {
	pub fn new(workers: NonZeroU32) -> Self {
		Self { workers }
	}

	pub fn worker(&self, partition_id: u32) -> usize {
		(partition_id % self.workers.get()) as usize
	}
}

/// Routes anything keyed by request id. Every regrouping by request uses this partitioner, which
/// is what co-locates a request's hits with its cutoff.
#[derive(Debug, Clone, Copy)]
pub struct RequestKeyPartitioner {
	workers: NonZeroU32,
}
impl RequestKeyPartitioner {
	pub fn new(workers: NonZeroU32) -> Self {
		Self { workers }
	}

	pub fn worker(&self, request_id: &str) -> usize {
		let hash = blake3::hash(request_id.as_bytes());
		let mut prefix = [0_u8; 8];

		prefix.copy_from_slice(&hash.as_bytes()[..8]);

		(u64::from_le_bytes(prefix) % u64::from(self.workers.get())) as usize
	}
}
