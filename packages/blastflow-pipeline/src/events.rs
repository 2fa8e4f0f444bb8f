use std::{fmt, sync::Arc};

use tokio::{io::AsyncWriteExt, net::TcpStream, sync::mpsc};

use blastflow_domain::{RejectCode, Rejection};

use crate::EventSink;

const FORWARD_QUEUE: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Search,
	Traceback,
}

/// Switchable categories. Failures are not switchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
	Request,
	JobStart,
	JobDone,
	Cutoff,
	Final,
	Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
	RequestAdmitted { request_id: String, partitions: usize },
	RequestRejected {
		code: RejectCode,
		rid: Option<String>,
		protocol: Option<String>,
		detail: String,
	},
	JobStarted { request_id: String, partition_id: u32 },
	JobDone { request_id: String, partition_id: u32, hits: usize },
	EngineFailed { stage: Stage, request_id: String, partition_id: u32, message: String },
	CutoffComputed { request_id: String, threshold: i32, hits: usize },
	ResultWritten { request_id: String, key: String, records: usize, bytes: usize },
	WriteFailed { request_id: String, message: String },
}
impl PipelineEvent {
	pub fn rejected(rejection: &Rejection) -> Self {
		Self::RequestRejected {
			code: rejection.code,
			rid: rejection.rid.clone(),
			protocol: rejection.protocol.clone(),
			detail: rejection.detail.clone(),
		}
	}

	pub fn category(&self) -> EventCategory {
		match self {
			Self::RequestAdmitted { .. } => EventCategory::Request,
			Self::JobStarted { .. } => EventCategory::JobStart,
			Self::JobDone { .. } => EventCategory::JobDone,
			Self::CutoffComputed { .. } => EventCategory::Cutoff,
			Self::ResultWritten { .. } => EventCategory::Final,
			Self::RequestRejected { .. } | Self::EngineFailed { .. } | Self::WriteFailed { .. } =>
				EventCategory::Failure,
		}
	}
}
impl fmt::Display for PipelineEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::RequestAdmitted { request_id, partitions } => {
				write!(f, "request {request_id} admitted partitions={partitions}")
			},
			Self::RequestRejected { code, rid, protocol, detail } => write!(
				f,
				"request {} rejected code={code:?} protocol={} detail={detail}",
				rid.as_deref().unwrap_or("-"),
				protocol.as_deref().unwrap_or("-"),
			),
			Self::JobStarted { request_id, partition_id } => {
				write!(f, "job start request={request_id} partition={partition_id}")
			},
			Self::JobDone { request_id, partition_id, hits } => {
				write!(f, "job done request={request_id} partition={partition_id} hits={hits}")
			},
			Self::EngineFailed { stage, request_id, partition_id, message } => write!(
				f,
				"{stage:?} failed request={request_id} partition={partition_id} error={message}"
			),
			Self::CutoffComputed { request_id, threshold, hits } => {
				write!(f, "cutoff request={request_id} threshold={threshold} hits={hits}")
			},
			Self::ResultWritten { request_id, key, records, bytes } => {
				write!(f, "final request={request_id} key={key} records={records} bytes={bytes}")
			},
			Self::WriteFailed { request_id, message } => {
				write!(f, "write failed request={request_id} error={message}")
			},
		}
	}
}

/// Fans events out to `sinks`, dropping the categories switched off in configuration.
pub struct SelectedEvents {
	switches: blastflow_config::Events,
	sinks: Vec<Arc<dyn EventSink>>,
}
impl SelectedEvents {
	pub fn new(switches: blastflow_config::Events, sinks: Vec<Arc<dyn EventSink>>) -> Self {
		Self { switches, sinks }
	}

	pub fn allows(&self, category: EventCategory) -> bool {
		match category {
			EventCategory::Request => self.switches.log_request,
			EventCategory::JobStart => self.switches.log_job_start,
			EventCategory::JobDone => self.switches.log_job_done,
			EventCategory::Cutoff => self.switches.log_cutoff,
			EventCategory::Final => self.switches.log_final,
			EventCategory::Failure => true,
		}
	}
}
impl EventSink for SelectedEvents {
	fn emit(&self, event: &PipelineEvent) {
		if !self.allows(event.category()) {
			return;
		}

		for sink in &self.sinks {
			sink.emit(event);
		}
	}
}

/// Writes every event as a structured tracing record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;
impl EventSink for TracingEvents {
	fn emit(&self, event: &PipelineEvent) {
		match event.category() {
			EventCategory::Failure => tracing::warn!(event = %event, "Pipeline event."),
			_ => tracing::info!(event = %event, "Pipeline event."),
		}
	}
}

/// Forwards each event as one text line to a TCP listener.
///
/// `emit` never blocks. Lines are queued for a background task that connects lazily and
/// reconnects after a failed write; lines that cannot be queued or delivered are dropped.
#[derive(Debug, Clone)]
pub struct LineForwarder {
	tx: mpsc::Sender<String>,
}
impl LineForwarder {
	/// Must be called inside a tokio runtime.
	pub fn spawn(addr: String) -> Self {
		let (tx, rx) = mpsc::channel(FORWARD_QUEUE);

		tokio::spawn(forward_lines(addr, rx));

		Self { tx }
	}
}
impl EventSink for LineForwarder {
	fn emit(&self, event: &PipelineEvent) {
		if let Err(err) = self.tx.try_send(event.to_string()) {
			tracing::warn!(error = %err, "Event forwarding queue rejected a line.");
		}
	}
}

async fn forward_lines(addr: String, mut rx: mpsc::Receiver<String>) {
	let mut stream: Option<TcpStream> = None;

	while let Some(mut line) = rx.recv().await {
		line.push('\n');

		if stream.is_none() {
			match TcpStream::connect(&addr).await {
				Ok(connected) => stream = Some(connected),
				Err(err) => {
					tracing::warn!(addr = %addr, error = %err, "Event forwarding connect failed.");

					continue;
				},
			}
		}

		if let Some(connected) = stream.as_mut()
			&& let Err(err) = connected.write_all(line.as_bytes()).await
		{
			tracing::warn!(addr = %addr, error = %err, "Event forwarding write failed.");

			stream = None;
		}
	}
}
