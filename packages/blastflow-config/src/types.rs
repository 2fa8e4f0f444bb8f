use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub catalog: Catalog,
	pub pipeline: Pipeline,
	pub admission: Admission,
	pub sources: Sources,
	pub engine: Engine,
	pub output: Output,
	#[serde(default)]
	pub events: Events,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

/// Where the database shards live and how they are enumerated.
///
/// With a non-empty `extensions` list the catalog is built by listing `location` (a local
/// directory or a `gs://bucket/prefix` url). Otherwise `num_partitions` shards are derived from
/// `pattern`.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
	pub location: String,
	#[serde(default)]
	pub pattern: String,
	#[serde(default)]
	pub extensions: Vec<String>,
	#[serde(default)]
	pub num_partitions: u32,
	#[serde(default)]
	pub flat_layout: bool,
	/// Zero keeps every listed shard.
	#[serde(default)]
	pub limit: u32,
	#[serde(default = "default_storage_api_base")]
	pub api_base: String,
	pub auth_token: Option<String>,
}
impl Catalog {
	pub fn is_listing(&self) -> bool {
		!self.extensions.is_empty()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
	pub num_workers: u32,
	pub batch_interval_ms: u64,
	#[serde(default = "default_max_batch_requests")]
	pub max_batch_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Admission {
	pub max_backlog: u32,
	#[serde(default = "default_retry_interval_ms")]
	pub retry_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sources {
	pub socket_bind: Option<String>,
	pub request_list: Option<PathBuf>,
	pub request_dir: Option<PathBuf>,
}
impl Sources {
	pub fn is_empty(&self) -> bool {
		self.socket_bind.is_none() && self.request_list.is_none() && self.request_dir.is_none()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Engine {
	pub api_base: String,
	#[serde(default = "default_search_path")]
	pub search_path: String,
	#[serde(default = "default_traceback_path")]
	pub traceback_path: String,
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
	/// A local path, or a distributed filesystem mounted locally.
	Local,
	Bucket,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Output {
	pub kind: OutputKind,
	/// Directory for `local`, bucket name for `bucket`.
	pub location: String,
	#[serde(default)]
	pub key_prefix: String,
	#[serde(default = "default_storage_api_base")]
	pub api_base: String,
	pub auth_token: Option<String>,
	#[serde(default = "default_output_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Events {
	pub log_request: bool,
	pub log_job_start: bool,
	pub log_job_done: bool,
	pub log_cutoff: bool,
	pub log_final: bool,
	/// Optional `host:port` that receives every emitted event as one text line.
	pub forward_addr: Option<String>,
}

fn default_storage_api_base() -> String {
	"https://storage.googleapis.com".to_string()
}

fn default_max_batch_requests() -> u32 {
	64
}

fn default_retry_interval_ms() -> u64 {
	250
}

fn default_search_path() -> String {
	"/search".to_string()
}

fn default_traceback_path() -> String {
	"/traceback".to_string()
}

fn default_output_timeout_ms() -> u64 {
	30_000
}
