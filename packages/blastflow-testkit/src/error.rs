pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Config(#[from] blastflow_config::Error),

	#[error(transparent)]
	Pipeline(#[from] blastflow_pipeline::Error),
}
