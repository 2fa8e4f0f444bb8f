use std::path::{Path, PathBuf};

use uuid::Uuid;

use blastflow_config::{Output, OutputKind};

use crate::{Error, Result, bucket::BucketClient};

/// Destination for framed result artifacts.
///
/// Each `put` writes one whole object. Nothing is retried here; callers decide what a failed
/// write means.
#[derive(Debug, Clone)]
pub enum ResultStore {
	/// A local path, or a distributed filesystem mounted at one.
	Local { root: PathBuf, key_prefix: String },
	Bucket { client: BucketClient, bucket: String, key_prefix: String },
}
impl ResultStore {
	pub fn from_config(cfg: &Output) -> Result<Self> {
		match cfg.kind {
			OutputKind::Local => Ok(Self::Local {
				root: PathBuf::from(&cfg.location),
				key_prefix: cfg.key_prefix.clone(),
			}),
			OutputKind::Bucket => {
				let bucket = cfg.location.trim_start_matches("gs://").trim_end_matches('/');

				if bucket.is_empty() || bucket.contains('/') {
					return Err(Error::InvalidLocation(cfg.location.clone()));
				}

				let client =
					BucketClient::new(&cfg.api_base, cfg.auth_token.clone(), cfg.timeout_ms)?;

				Ok(Self::Bucket {
					client,
					bucket: bucket.to_string(),
					key_prefix: cfg.key_prefix.clone(),
				})
			},
		}
	}

	pub fn key_for(&self, name: &str) -> String {
		let prefix = match self {
			Self::Local { key_prefix, .. } | Self::Bucket { key_prefix, .. } => key_prefix,
		};

		format!("{prefix}{name}")
	}

	/// Stores `bytes` under `name` below the configured prefix and returns the object key.
	pub async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
		let key = self.key_for(name);

		match self {
			Self::Local { root, .. } => write_local(&root.join(&key), &bytes).await?,
			Self::Bucket { client, bucket, .. } => client.upload(bucket, &key, bytes).await?,
		}

		tracing::debug!(key = %key, "Result artifact stored.");

		Ok(key)
	}
}

/// Writes through a sibling temp file and renames it so readers never see a partial artifact.
async fn write_local(path: &Path, bytes: &[u8]) -> Result<()> {
	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent).await.map_err(Error::io(parent))?;
	}

	let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));

	tokio::fs::write(&tmp, bytes).await.map_err(Error::io(&tmp))?;

	if let Err(err) = tokio::fs::rename(&tmp, path).await {
		let _ = tokio::fs::remove_file(&tmp).await;

		return Err(Error::Io { path: path.to_path_buf(), source: err });
	}

	Ok(())
}
