use std::path::Path;

use crate::{Error, Result};

/// A listed file: its name relative to the listed location and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSize {
	pub name: String,
	pub size: u64,
}

/// Lists the regular files directly inside `dir`, sorted by name.
pub async fn list_dir(dir: &Path) -> Result<Vec<NameSize>> {
	let mut entries = Vec::new();
	let mut read_dir = tokio::fs::read_dir(dir).await.map_err(Error::io(dir))?;

	while let Some(entry) = read_dir.next_entry().await.map_err(Error::io(dir))? {
		let path = entry.path();
		let metadata = entry.metadata().await.map_err(Error::io(&path))?;

		if !metadata.is_file() {
			continue;
		}

		let Some(name) = entry.file_name().to_str().map(str::to_string) else {
			tracing::warn!(path = %path.display(), "Skipping non-UTF-8 file name.");

			continue;
		};

		entries.push(NameSize { name, size: metadata.len() });
	}

	entries.sort_by(|a, b| a.name.cmp(&b.name));

	Ok(entries)
}

/// Sums the sizes of the files in `dir` that belong to `volume`: the file named exactly `volume`
/// and every `volume.<ext>` file.
///
/// Unreadable directories count as empty.
pub fn sum_volume_sizes(dir: &Path, volume: &str) -> u64 {
	let Ok(read_dir) = std::fs::read_dir(dir) else {
		return 0;
	};

	read_dir
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.file_name().to_str().is_some_and(|name| belongs_to(name, volume)))
		.filter_map(|entry| entry.metadata().ok())
		.filter(|metadata| metadata.is_file())
		.map(|metadata| metadata.len())
		.sum()
}

fn belongs_to(name: &str, volume: &str) -> bool {
	match name.strip_prefix(volume) {
		Some(rest) => rest.is_empty() || rest.starts_with('.'),
		None => false,
	}
}
