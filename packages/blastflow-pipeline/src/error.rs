#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid pipeline configuration: {message}")]
	InvalidConfig { message: String },
	#[error("Worker {worker} stopped before finishing its bucket.")]
	Worker { worker: usize, source: tokio::task::JoinError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
