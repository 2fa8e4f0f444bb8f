pub mod sources;
pub mod worker;

mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing_subscriber::EnvFilter;

use blastflow_config::Config;
use blastflow_engine::HttpEngine;
use blastflow_pipeline::{
	AdmissionQueue, Engines, EventSink, LineForwarder, PipelineContext, SelectedEvents,
	TracingEvents,
};
use blastflow_storage::{catalog as shards, store::ResultStore};

use crate::{sources::Admitter, worker::WorkerState};

#[derive(Debug, Parser)]
#[command(
	version = blastflow_cli::VERSION,
	rename_all = "kebab",
	styles = blastflow_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Request list file submitted once at startup, in addition to the configured sources.
	#[arg(long, value_name = "FILE")]
	pub request_list: Option<PathBuf>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = blastflow_config::load(&args.config)?;

	init_tracing(&config)?;

	let catalog = shards::load_catalog(&config.catalog).await?;
	let total_size = {
		let catalog = catalog.clone();

		tokio::task::spawn_blocking(move || shards::total_size(&catalog)).await?
	};

	tracing::info!(partitions = catalog.len(), total_size, "Database catalog ready.");

	let engines = Engines::http(HttpEngine::new(&config.engine)?);
	let sink = Arc::new(ResultStore::from_config(&config.output)?);
	let events = build_events(&config.events);
	let partitions = catalog.len();
	let ctx = Arc::new(PipelineContext::new(
		catalog,
		engines,
		sink,
		events.clone(),
		config.pipeline.num_workers,
	)?);
	let queue = Arc::new(AdmissionQueue::from_config(&config.admission));
	let admitter = Admitter::new(queue.clone(), events, partitions);
	let sources = spawn_sources(&config, args.request_list, admitter).await?;
	let (stop_tx, stop_rx) = watch::channel(false);

	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => tracing::info!("Stop requested. Finishing the current batch."),
			Err(err) => tracing::error!(error = %err, "Failed to listen for stop signal."),
		}

		let _ = stop_tx.send(true);
	});

	worker::run_worker(WorkerState::new(ctx, queue, &config.pipeline), stop_rx).await?;

	for source in sources {
		source.abort();
	}

	Ok(())
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).try_init().map_err(|err| {
		color_eyre::eyre::eyre!("Failed to install the tracing subscriber: {err}")
	})?;

	Ok(())
}

/// Tracing always receives events; a forward address adds the line forwarder.
pub fn build_events(cfg: &blastflow_config::Events) -> Arc<dyn EventSink> {
	let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingEvents)];

	if let Some(addr) = cfg.forward_addr.clone() {
		sinks.push(Arc::new(LineForwarder::spawn(addr)));
	}

	Arc::new(SelectedEvents::new(cfg.clone(), sinks))
}

async fn spawn_sources(
	config: &Config,
	extra_list: Option<PathBuf>,
	admitter: Admitter,
) -> color_eyre::Result<Vec<tokio::task::JoinHandle<()>>> {
	let mut handles = Vec::new();

	if let Some(bind) = config.sources.socket_bind.as_deref() {
		let listener = TcpListener::bind(bind).await?;
		let admitter = admitter.clone();

		tracing::info!(addr = %listener.local_addr()?, "Request socket listening.");
		handles.push(tokio::spawn(async move {
			if let Err(err) = sources::serve_socket(listener, admitter).await {
				tracing::error!(error = %err, "Request socket stopped.");
			}
		}));
	}

	let lists = config.sources.request_list.iter().cloned().chain(extra_list);

	for list in lists {
		let admitter = admitter.clone();

		handles.push(tokio::spawn(async move {
			match sources::admit_list(&list, &admitter).await {
				Ok(accepted) => {
					tracing::info!(list = %list.display(), accepted, "Request list done.");
				},
				Err(err) => tracing::error!(error = %err, "Request list failed."),
			}
		}));
	}

	if let Some(dir) = config.sources.request_dir.clone() {
		handles.push(tokio::spawn(async move {
			match sources::admit_dir(&dir, &admitter).await {
				Ok(accepted) => {
					tracing::info!(dir = %dir.display(), accepted, "Request directory done.");
				},
				Err(err) => tracing::error!(error = %err, "Request directory failed."),
			}
		}));
	}

	Ok(handles)
}
