use std::{collections::BTreeMap, sync::{Arc, OnceLock}};

/// One database shard. Shared read-only by every stage once the catalog is loaded.
#[derive(Debug)]
pub struct PartitionDescriptor {
	pub id: u32,
	pub name: String,
	/// Path or bucket url handed to the engine.
	pub location: String,
	pub pattern: String,
	size: OnceLock<u64>,
}
impl PartitionDescriptor {
	pub fn new(id: u32, name: String, location: String, pattern: String) -> Self {
		Self { id, name, location, pattern, size: OnceLock::new() }
	}

	pub fn with_size(id: u32, name: String, location: String, pattern: String, size: u64) -> Self {
		let descriptor = Self::new(id, name, location, pattern);
		let _ = descriptor.size.set(size);

		descriptor
	}

	/// Derives shard `nr` of `pattern` below `base`.
	///
	/// Shards below 100 use a two-digit suffix (`nt.07`). A nested layout repeats the shard name
	/// as a directory (`base/nt.07/nt.07`).
	pub fn from_pattern(base: &str, pattern: &str, nr: u32, flat: bool) -> Self {
		let name = shard_name(pattern, nr);
		let base = base.trim_end_matches('/');
		let location =
			if flat { format!("{base}/{name}") } else { format!("{base}/{name}/{name}") };

		Self::new(nr, name, location, pattern.to_string())
	}

	pub fn known_size(&self) -> Option<u64> {
		self.size.get().copied()
	}

	/// Returns the size, resolving it once with `resolve` when the catalog did not know it.
	pub fn size_or_resolve(&self, resolve: impl FnOnce(&Self) -> u64) -> u64 {
		*self.size.get_or_init(|| resolve(self))
	}
}

pub fn shard_name(pattern: &str, nr: u32) -> String {
	if nr < 100 { format!("{pattern}.{nr:02}") } else { format!("{pattern}.{nr}") }
}

/// The static shard set for one run, indexed by partition id.
#[derive(Debug, Clone, Default)]
pub struct PartitionCatalog {
	partitions: BTreeMap<u32, Arc<PartitionDescriptor>>,
}
impl PartitionCatalog {
	pub fn new(descriptors: impl IntoIterator<Item = PartitionDescriptor>) -> Self {
		let partitions = descriptors
			.into_iter()
			.map(|descriptor| (descriptor.id, Arc::new(descriptor)))
			.collect();

		Self { partitions }
	}

	pub fn get(&self, id: u32) -> Option<&Arc<PartitionDescriptor>> {
		self.partitions.get(&id)
	}

	/// Partitions in ascending id order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<PartitionDescriptor>> {
		self.partitions.values()
	}

	pub fn len(&self) -> usize {
		self.partitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.partitions.is_empty()
	}
}
