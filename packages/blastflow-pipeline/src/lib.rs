pub mod admission;
pub mod batch;
pub mod cutoff;
pub mod events;
pub mod exchange;
pub mod fanout;
pub mod filter;
pub mod merge;
pub mod partitioner;
pub mod search;
pub mod traceback;

mod error;
mod guard;

pub use admission::{AdmissionQueue, Offer, Submitted};
pub use batch::{BatchReport, run_batch};
pub use error::{Error, Result};
pub use events::{EventCategory, LineForwarder, PipelineEvent, SelectedEvents, Stage, TracingEvents};
pub use exchange::Exchange;
pub use partitioner::{LocalityPartitioner, RequestKeyPartitioner};

use std::{future::Future, num::NonZeroU32, pin::Pin, sync::Arc};

use blastflow_domain::{PartitionCatalog, PartitionDescriptor, Request, ScoredHit};
use blastflow_engine::{EngineHit, EngineRecord, HttpEngine};
use blastflow_storage::store::ResultStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait SearchEngine
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		partition: &'a PartitionDescriptor,
		request: &'a Request,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EngineHit>>>;
}

pub trait TracebackEngine
where
	Self: Send + Sync,
{
	fn traceback<'a>(
		&'a self,
		hits: &'a [ScoredHit],
		partition: &'a PartitionDescriptor,
		request: &'a Request,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EngineRecord>>>;
}

/// Output destination for framed results. Returns the key the artifact was stored under.
pub trait ResultSink
where
	Self: Send + Sync,
{
	fn write<'a>(
		&'a self,
		name: &'a str,
		bytes: Vec<u8>,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Side channel for pipeline notifications. Must not block.
pub trait EventSink
where
	Self: Send + Sync,
{
	fn emit(&self, event: &PipelineEvent);
}

#[derive(Clone)]
pub struct Engines {
	pub search: Arc<dyn SearchEngine>,
	pub traceback: Arc<dyn TracebackEngine>,
}
impl Engines {
	pub fn http(engine: HttpEngine) -> Self {
		let engine = Arc::new(DefaultEngine(engine));

		Self { search: engine.clone(), traceback: engine }
	}
}

/// Everything a stage may read. Built once per run and never mutated afterwards.
pub struct PipelineContext {
	pub catalog: PartitionCatalog,
	pub engines: Engines,
	pub sink: Arc<dyn ResultSink>,
	pub events: Arc<dyn EventSink>,
	pub workers: NonZeroU32,
}
impl PipelineContext {
	pub fn new(
		catalog: PartitionCatalog,
		engines: Engines,
		sink: Arc<dyn ResultSink>,
		events: Arc<dyn EventSink>,
		num_workers: u32,
	) -> Result<Self> {
		let workers = NonZeroU32::new(num_workers).ok_or_else(|| Error::InvalidConfig {
			message: "num_workers must be greater than zero.".to_string(),
		})?;

		Ok(Self { catalog, engines, sink, events, workers })
	}

	pub fn exchange(&self) -> Exchange {
		Exchange::new(self.workers)
	}

	pub fn locality(&self) -> LocalityPartitioner {
		LocalityPartitioner::new(self.workers)
	}

	pub fn request_key(&self) -> RequestKeyPartitioner {
		RequestKeyPartitioner::new(self.workers)
	}
}

struct DefaultEngine(HttpEngine);

impl SearchEngine for DefaultEngine {
	fn search<'a>(
		&'a self,
		partition: &'a PartitionDescriptor,
		request: &'a Request,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EngineHit>>> {
		Box::pin(async move { Ok(self.0.search(partition, request).await?) })
	}
}

impl TracebackEngine for DefaultEngine {
	fn traceback<'a>(
		&'a self,
		hits: &'a [ScoredHit],
		partition: &'a PartitionDescriptor,
		request: &'a Request,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EngineRecord>>> {
		Box::pin(async move { Ok(self.0.traceback(hits, partition, request).await?) })
	}
}

impl ResultSink for ResultStore {
	fn write<'a>(
		&'a self,
		name: &'a str,
		bytes: Vec<u8>,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move { Ok(self.put(name, bytes).await?) })
	}
}
