use std::{collections::BTreeMap, path::Path};

use blastflow_config::Catalog;
use blastflow_domain::{PartitionCatalog, PartitionDescriptor};

use crate::{
	Error, Result,
	bucket::{BucketClient, BucketPath},
	listing::{self, NameSize},
};

/// Builds the run's partition catalog from configuration.
///
/// Listing mode enumerates `location` and keeps one shard per base name. Pattern mode derives
/// `num_partitions` shard descriptors without touching storage; their sizes resolve lazily.
pub async fn load_catalog(cfg: &Catalog) -> Result<PartitionCatalog> {
	let descriptors = if cfg.is_listing() { list_shards(cfg).await? } else { pattern_shards(cfg) };

	tracing::info!(
		location = %cfg.location,
		partitions = descriptors.len(),
		listing = cfg.is_listing(),
		"Partition catalog loaded."
	);

	Ok(PartitionCatalog::new(descriptors))
}

/// Keeps entries that end in one of `extensions`, strips it and merges entries that share the
/// resulting base name. Sizes of merged entries are summed. The result is sorted by name.
pub fn unique_by_extension(entries: &[NameSize], extensions: &[String]) -> Vec<NameSize> {
	let mut merged: BTreeMap<&str, u64> = BTreeMap::new();

	for entry in entries {
		let Some(base) = extensions.iter().find_map(|ext| entry.name.strip_suffix(ext.as_str()))
		else {
			continue;
		};

		if base.is_empty() {
			continue;
		}

		*merged.entry(base).or_default() += entry.size;
	}

	merged.into_iter().map(|(name, size)| NameSize { name: name.to_string(), size }).collect()
}

/// Total size of every partition, resolving unknown sizes from the local filesystem.
pub fn total_size(catalog: &PartitionCatalog) -> u64 {
	catalog.iter().map(|partition| partition.size_or_resolve(resolve_local_size)).sum()
}

/// Sums the on-disk files of the shard's volume, next to its location.
///
/// Locations that are not local paths resolve to zero.
pub fn resolve_local_size(partition: &PartitionDescriptor) -> u64 {
	if BucketPath::parse(&partition.location).is_some() {
		return 0;
	}

	let Some(parent) = Path::new(&partition.location).parent() else {
		return 0;
	};

	listing::sum_volume_sizes(parent, &partition.name)
}

async fn list_shards(cfg: &Catalog) -> Result<Vec<PartitionDescriptor>> {
	let (entries, bucket) = match BucketPath::parse(&cfg.location) {
		Some(path) => {
			let client = BucketClient::new(&cfg.api_base, cfg.auth_token.clone(), 30_000)?;

			(client.list(&path).await?, Some(path))
		},
		None if cfg.location.starts_with("gs://") => {
			return Err(Error::InvalidLocation(cfg.location.clone()));
		},
		None => (listing::list_dir(Path::new(&cfg.location)).await?, None),
	};
	let mut shards = unique_by_extension(&entries, &cfg.extensions);

	if cfg.limit > 0 {
		shards.truncate(cfg.limit as usize);
	}

	let base = cfg.location.trim_end_matches('/');
	let descriptors = shards
		.into_iter()
		.zip(0_u32..)
		.map(|(shard, id)| {
			let location = match &bucket {
				Some(path) => path.url_for(&shard.name),
				None => format!("{base}/{}", shard.name),
			};
			let name = shard.name.rsplit('/').next().unwrap_or(&shard.name).to_string();

			PartitionDescriptor::with_size(id, name, location, cfg.pattern.clone(), shard.size)
		})
		.collect();

	Ok(descriptors)
}

fn pattern_shards(cfg: &Catalog) -> Vec<PartitionDescriptor> {
	let count = if cfg.limit > 0 { cfg.num_partitions.min(cfg.limit) } else { cfg.num_partitions };

	(0..count)
		.map(|nr| {
			PartitionDescriptor::from_pattern(&cfg.location, &cfg.pattern, nr, cfg.flat_layout)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(name: &str, size: u64) -> NameSize {
		NameSize { name: name.to_string(), size }
	}

	#[test]
	fn dedupes_by_base_name_and_sums_sizes() {
		let entries = vec![
			entry("nt.01.nsq", 10),
			entry("nt.00.nsq", 100),
			entry("nt.00.nin", 5),
			entry("nt.00.nhr", 7),
			entry("README", 1),
		];
		let shards = unique_by_extension(&entries, &[".nsq".to_string(), ".nin".to_string()]);

		assert_eq!(shards, vec![entry("nt.00", 105), entry("nt.01", 10)]);
	}

	#[test]
	fn bare_extension_is_not_a_shard() {
		let shards = unique_by_extension(&[entry(".nsq", 3)], &[".nsq".to_string()]);

		assert!(shards.is_empty());
	}
}
