mod error;

pub use error::{Error, Result};

use std::{
	collections::{BTreeMap, BTreeSet},
	num::NonZeroU32,
	path::{Path, PathBuf},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;
use uuid::Uuid;

use blastflow_domain::{PartitionCatalog, PartitionDescriptor, Request, ScoredHit};
use blastflow_engine::{EngineHit, EngineRecord};
use blastflow_pipeline::{
	BoxFuture, Engines, EventCategory, EventSink, PipelineContext, PipelineEvent, ResultSink,
	SearchEngine, TracebackEngine,
};

pub const SAMPLE_CONFIG: &str = r#"
[service]
log_level = "debug"

[catalog]
location = "/data/blast/db"
pattern = "nt_50M"
num_partitions = 3

[pipeline]
num_workers = 2
batch_interval_ms = 50

[admission]
max_backlog = 8
retry_interval_ms = 5

[sources]
request_dir = "/tmp/blastflow/requests"

[engine]
api_base = "http://127.0.0.1:9000"
timeout_ms = 5000

[output]
kind = "local"
location = "/tmp/blastflow"
key_prefix = "output"
"#;

/// A uniquely named scratch directory, removed again on drop.
pub struct TestDir {
	path: PathBuf,
}
impl TestDir {
	pub fn new() -> Result<Self> {
		let path = std::env::temp_dir().join(format!("blastflow_test_{}", Uuid::new_v4().simple()));

		std::fs::create_dir_all(&path)?;

		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Writes `bytes` at `relative`, creating parent directories.
	pub fn write(&self, relative: &str, bytes: impl AsRef<[u8]>) -> Result<PathBuf> {
		let path = self.path.join(relative);

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		std::fs::write(&path, bytes)?;

		Ok(path)
	}
}
impl Drop for TestDir {
	fn drop(&mut self) {
		if let Err(err) = std::fs::remove_dir_all(&self.path) {
			eprintln!("Failed to remove test directory {}: {err}.", self.path.display());
		}
	}
}

/// One traceback invocation as the engine saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracebackCall {
	pub partition_id: u32,
	pub request_id: String,
	pub scores: Vec<i32>,
}

/// Deterministic search and traceback engine driven by per-`(partition, request)` scripts.
///
/// Unscripted searches return no hits. Unscripted tracebacks turn each hit into one record with
/// `evalue` and `score` equal to the hit's score, `seqid_hash` equal to the partition id and the
/// hit payload carried through.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
	hits: BTreeMap<(u32, String), Vec<EngineHit>>,
	records: BTreeMap<(u32, String), Vec<EngineRecord>>,
	failing_search: BTreeSet<(u32, String)>,
	failing_traceback: BTreeSet<(u32, String)>,
	panicking_search: BTreeSet<(u32, String)>,
	panicking_traceback: BTreeSet<(u32, String)>,
	search_calls: AtomicUsize,
	traceback_calls: Mutex<Vec<TracebackCall>>,
}
impl ScriptedEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Scripts one hit per score, in the given order.
	pub fn with_scores(mut self, partition_id: u32, request_id: &str, scores: &[i32]) -> Self {
		let hits = scores
			.iter()
			.map(|score| EngineHit {
				max_score: *score,
				payload: hit_payload(partition_id, *score),
			})
			.collect();

		self.hits.insert((partition_id, request_id.to_string()), hits);

		self
	}

	pub fn with_records(
		mut self,
		partition_id: u32,
		request_id: &str,
		records: Vec<EngineRecord>,
	) -> Self {
		self.records.insert((partition_id, request_id.to_string()), records);

		self
	}

	pub fn fail_search(mut self, partition_id: u32, request_id: &str) -> Self {
		self.failing_search.insert((partition_id, request_id.to_string()));

		self
	}

	pub fn fail_traceback(mut self, partition_id: u32, request_id: &str) -> Self {
		self.failing_traceback.insert((partition_id, request_id.to_string()));

		self
	}

	pub fn panic_search(mut self, partition_id: u32, request_id: &str) -> Self {
		self.panicking_search.insert((partition_id, request_id.to_string()));

		self
	}

	pub fn panic_traceback(mut self, partition_id: u32, request_id: &str) -> Self {
		self.panicking_traceback.insert((partition_id, request_id.to_string()));

		self
	}

	pub fn search_calls(&self) -> usize {
		self.search_calls.load(Ordering::SeqCst)
	}

	/// Calls sorted by partition then request, independent of worker scheduling.
	pub fn traceback_calls(&self) -> Vec<TracebackCall> {
		let mut calls = self.traceback_calls.lock().unwrap_or_else(|err| err.into_inner()).clone();

		calls.sort_by(|a, b| {
			(a.partition_id, &a.request_id).cmp(&(b.partition_id, &b.request_id))
		});

		calls
	}
}
impl SearchEngine for ScriptedEngine {
	fn search<'a>(
		&'a self,
		partition: &'a PartitionDescriptor,
		request: &'a Request,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EngineHit>>> {
		Box::pin(async move {
			self.search_calls.fetch_add(1, Ordering::SeqCst);

			let key = (partition.id, request.id.clone());

			if self.panicking_search.contains(&key) {
				panic!("Scripted search panic on partition {}.", partition.id);
			}
			if self.failing_search.contains(&key) {
				return Err(eyre::eyre!("Scripted search failure on partition {}.", partition.id));
			}

			Ok(self.hits.get(&key).cloned().unwrap_or_default())
		})
	}
}
impl TracebackEngine for ScriptedEngine {
	fn traceback<'a>(
		&'a self,
		hits: &'a [ScoredHit],
		partition: &'a PartitionDescriptor,
		request: &'a Request,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EngineRecord>>> {
		Box::pin(async move {
			self.traceback_calls.lock().unwrap_or_else(|err| err.into_inner()).push(
				TracebackCall {
					partition_id: partition.id,
					request_id: request.id.clone(),
					scores: hits.iter().map(|hit| hit.max_score).collect(),
				},
			);

			let key = (partition.id, request.id.clone());

			if self.panicking_traceback.contains(&key) {
				panic!("Scripted traceback panic on partition {}.", partition.id);
			}
			if self.failing_traceback.contains(&key) {
				return Err(eyre::eyre!(
					"Scripted traceback failure on partition {}.",
					partition.id
				));
			}
			if let Some(records) = self.records.get(&key) {
				return Ok(records.clone());
			}

			Ok(hits
				.iter()
				.map(|hit| EngineRecord {
					evalue: hit.max_score,
					score: hit.max_score,
					seqid_hash: partition.id as i32,
					payload: hit.payload.clone(),
				})
				.collect())
		})
	}
}

/// Payload the scripted engine attaches to a hit: the partition byte followed by the score.
pub fn hit_payload(partition_id: u32, score: i32) -> Vec<u8> {
	let mut payload = vec![partition_id as u8];

	payload.extend_from_slice(&score.to_be_bytes());

	payload
}

/// In-memory result sink. Keys get an `output/` prefix like a configured store would add.
#[derive(Debug, Default)]
pub struct MemorySink {
	objects: Mutex<BTreeMap<String, Vec<u8>>>,
	failing: BTreeSet<String>,
	attempts: AtomicUsize,
}
impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every write of artifact `name` fails.
	pub fn failing_on(mut self, name: &str) -> Self {
		self.failing.insert(name.to_string());

		self
	}

	pub fn get(&self, key: &str) -> Option<Vec<u8>> {
		self.objects.lock().unwrap_or_else(|err| err.into_inner()).get(key).cloned()
	}

	pub fn keys(&self) -> Vec<String> {
		self.objects.lock().unwrap_or_else(|err| err.into_inner()).keys().cloned().collect()
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}
impl ResultSink for MemorySink {
	fn write<'a>(
		&'a self,
		name: &'a str,
		bytes: Vec<u8>,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			self.attempts.fetch_add(1, Ordering::SeqCst);

			if self.failing.contains(name) {
				return Err(eyre::eyre!("Scripted write failure for {name}."));
			}

			let key = format!("output/{name}");

			self.objects.lock().unwrap_or_else(|err| err.into_inner()).insert(key.clone(), bytes);

			Ok(key)
		})
	}
}

#[derive(Debug, Default)]
pub struct RecordingEvents {
	events: Mutex<Vec<PipelineEvent>>,
}
impl RecordingEvents {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<PipelineEvent> {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn of(&self, category: EventCategory) -> Vec<PipelineEvent> {
		self.events().into_iter().filter(|event| event.category() == category).collect()
	}
}
impl EventSink for RecordingEvents {
	fn emit(&self, event: &PipelineEvent) {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).push(event.clone());
	}
}

pub fn test_config() -> Result<blastflow_config::Config> {
	Ok(blastflow_config::parse(SAMPLE_CONFIG)?)
}

pub fn request(id: &str, top_n_prelim: u32, top_n_traceback: u32) -> Request {
	Request {
		id: id.to_string(),
		db_tag: "nt_50M".to_string(),
		query_sequence: "ACGTACGTAC".to_string(),
		query_url: String::new(),
		program: "blastn".to_string(),
		parameters: "{}".to_string(),
		top_n_prelim: NonZeroU32::new(top_n_prelim).unwrap_or(NonZeroU32::MIN),
		top_n_traceback: NonZeroU32::new(top_n_traceback).unwrap_or(NonZeroU32::MIN),
		start_time: None,
		admitted_at: time::OffsetDateTime::UNIX_EPOCH,
	}
}

/// `count` flat-layout shards of `nt_50M` below `/db`, ids `0..count`.
pub fn catalog(count: u32) -> PartitionCatalog {
	PartitionCatalog::new(
		(0..count).map(|nr| PartitionDescriptor::from_pattern("/db", "nt_50M", nr, true)),
	)
}

/// A context whose engines are both `engine`.
pub fn context(
	catalog: PartitionCatalog,
	engine: Arc<ScriptedEngine>,
	sink: Arc<MemorySink>,
	events: Arc<RecordingEvents>,
	num_workers: u32,
) -> Result<Arc<PipelineContext>> {
	let engines = Engines { search: engine.clone(), traceback: engine };
	let ctx = PipelineContext::new(catalog, engines, sink, events, num_workers)?;

	Ok(Arc::new(ctx))
}
