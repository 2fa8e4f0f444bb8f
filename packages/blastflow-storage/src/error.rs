use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("I/O failed at {path:?}.")]
	Io { path: PathBuf, source: std::io::Error },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error("Invalid location: {0}")]
	InvalidLocation(String),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}
impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
		let path = path.into();

		move |source| Self::Io { path, source }
	}
}
