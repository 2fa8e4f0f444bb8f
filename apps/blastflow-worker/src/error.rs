use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read {path:?}.")]
	Read { path: PathBuf, source: std::io::Error },
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Pipeline(#[from] blastflow_pipeline::Error),
}
