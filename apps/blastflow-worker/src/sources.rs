use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use time::OffsetDateTime;
use tokio::{
	io::{AsyncBufReadExt, BufReader},
	net::{TcpListener, TcpStream},
};

use blastflow_domain::Request;
use blastflow_pipeline::{AdmissionQueue, EventSink, PipelineEvent, Submitted};

use crate::{Error, Result};

const LIST_SOURCE_PREFIX: &str = ":src=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admitted {
	Accepted,
	Rejected,
	Duplicate,
}

/// Parses raw ingestion records and hands valid ones to the backlog.
#[derive(Clone)]
pub struct Admitter {
	queue: Arc<AdmissionQueue>,
	events: Arc<dyn EventSink>,
	partitions: usize,
}
impl Admitter {
	pub fn new(queue: Arc<AdmissionQueue>, events: Arc<dyn EventSink>, partitions: usize) -> Self {
		Self { queue, events, partitions }
	}

	/// Waits while the backlog is full. Rejections are logged and emitted, never dropped silently.
	pub async fn admit(&self, raw: &str) -> Admitted {
		let request = match Request::parse(raw, OffsetDateTime::now_utc()) {
			Ok(request) => request,
			Err(rejection) => {
				tracing::warn!(
					code = ?rejection.code,
					rid = ?rejection.rid,
					detail = %rejection.detail,
					"Request rejected."
				);
				self.events.emit(&PipelineEvent::rejected(&rejection));

				return Admitted::Rejected;
			},
		};
		let request_id = request.id.clone();

		match self.queue.submit(request).await {
			Submitted::Accepted => {
				self.events.emit(&PipelineEvent::RequestAdmitted {
					request_id,
					partitions: self.partitions,
				});

				Admitted::Accepted
			},
			Submitted::Duplicate(_) => {
				tracing::warn!(request_id = %request_id, "Duplicate request ignored.");

				Admitted::Duplicate
			},
		}
	}

	pub async fn admit_file(&self, path: &Path) -> Result<Admitted> {
		let raw = tokio::fs::read_to_string(path)
			.await
			.map_err(|source| Error::Read { path: path.to_path_buf(), source })?;

		Ok(self.admit(&raw).await)
	}
}

/// Accepts TCP connections forever. Each line on a connection is one ingestion record.
pub async fn serve_socket(listener: TcpListener, admitter: Admitter) -> Result<()> {
	loop {
		let (stream, peer) = listener.accept().await?;
		let admitter = admitter.clone();

		tracing::debug!(%peer, "Request connection accepted.");
		tokio::spawn(async move {
			if let Err(err) = read_connection(stream, &admitter).await {
				tracing::warn!(%peer, error = %err, "Request connection failed.");
			}
		});
	}
}

async fn read_connection(stream: TcpStream, admitter: &Admitter) -> Result<()> {
	let mut lines = BufReader::new(stream).lines();

	while let Some(line) = lines.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}

		admitter.admit(&line).await;
	}

	Ok(())
}

/// Resolves the request files named by a list file.
///
/// Blank lines and `#` comments are skipped. A `:src=<dir>` line makes every following entry
/// relative to `<dir>` until the next such line.
pub fn parse_request_list(contents: &str) -> Vec<PathBuf> {
	let mut source: Option<PathBuf> = None;
	let mut paths = Vec::new();

	for line in contents.lines() {
		let line = line.trim();

		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		if let Some(dir) = line.strip_prefix(LIST_SOURCE_PREFIX) {
			source = (!dir.is_empty()).then(|| PathBuf::from(dir));

			continue;
		}

		paths.push(match &source {
			Some(dir) => dir.join(line),
			None => PathBuf::from(line),
		});
	}

	paths
}

/// Admits every request file named in `list`, in list order. Unreadable entries are logged and
/// skipped.
pub async fn admit_list(list: &Path, admitter: &Admitter) -> Result<usize> {
	let contents = tokio::fs::read_to_string(list)
		.await
		.map_err(|source| Error::Read { path: list.to_path_buf(), source })?;

	tracing::info!(list = %list.display(), "Request list started.");

	Ok(admit_paths(parse_request_list(&contents), admitter).await)
}

/// Admits every `*.json` file directly in `dir`, in file name order.
pub async fn admit_dir(dir: &Path, admitter: &Admitter) -> Result<usize> {
	let mut read_dir = tokio::fs::read_dir(dir)
		.await
		.map_err(|source| Error::Read { path: dir.to_path_buf(), source })?;
	let mut paths = Vec::new();

	while let Some(entry) = read_dir.next_entry().await? {
		let path = entry.path();

		if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
			paths.push(path);
		}
	}

	paths.sort();

	tracing::info!(dir = %dir.display(), files = paths.len(), "Request directory started.");

	Ok(admit_paths(paths, admitter).await)
}

async fn admit_paths(paths: Vec<PathBuf>, admitter: &Admitter) -> usize {
	let mut accepted = 0;

	for path in paths {
		match admitter.admit_file(&path).await {
			Ok(Admitted::Accepted) => accepted += 1,
			Ok(_) => {},
			Err(err) => {
				tracing::warn!(path = %path.display(), error = %err, "Request file skipped.");
			},
		}
	}

	accepted
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn list_skips_comments_and_applies_source_prefix() {
		let list = concat!(
			"# nightly batch\n",
			"a.json\n",
			"\n",
			":src=/srv/requests\n",
			"b.json\n",
			"  c.json  \n",
			":src=\n",
			"d.json\n",
		);

		assert_eq!(parse_request_list(list), vec![
			PathBuf::from("a.json"),
			PathBuf::from("/srv/requests/b.json"),
			PathBuf::from("/srv/requests/c.json"),
			PathBuf::from("d.json"),
		]);
	}
}
