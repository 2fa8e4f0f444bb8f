use std::{collections::VecDeque, sync::{Arc, Mutex}, time::Duration};

use ahash::AHashSet;

use blastflow_domain::Request;

/// Outcome of offering a request to the backlog.
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
	Accepted,
	/// The backlog is at capacity. The request is handed back for a later retry.
	Full(Arc<Request>),
	/// A request with the same id is already waiting.
	Duplicate(Arc<Request>),
}

/// Final outcome of [`AdmissionQueue::submit`], which never gives up on a full backlog.
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
	Accepted,
	Duplicate(Arc<Request>),
}

#[derive(Debug, Default)]
struct Backlog {
	queue: VecDeque<Arc<Request>>,
	ids: AHashSet<String>,
}

/// Bounded FIFO of admitted requests waiting for the next micro-batch.
#[derive(Debug)]
pub struct AdmissionQueue {
	capacity: usize,
	retry_interval: Duration,
	backlog: Mutex<Backlog>,
}
impl AdmissionQueue {
	pub fn new(capacity: u32, retry_interval: Duration) -> Self {
		Self { capacity: capacity as usize, retry_interval, backlog: Mutex::default() }
	}

	pub fn from_config(cfg: &blastflow_config::Admission) -> Self {
		Self::new(cfg.max_backlog, Duration::from_millis(cfg.retry_interval_ms))
	}

	pub fn offer(&self, request: Arc<Request>) -> Offer {
		let mut backlog = self.backlog.lock().unwrap_or_else(|err| err.into_inner());

		if backlog.ids.contains(&request.id) {
			return Offer::Duplicate(request);
		}
		if backlog.queue.len() >= self.capacity {
			return Offer::Full(request);
		}

		backlog.ids.insert(request.id.clone());
		backlog.queue.push_back(request);

		Offer::Accepted
	}

	/// Offers `request` until it is accepted or found to be a duplicate, sleeping the retry
	/// interval whenever the backlog is full.
	pub async fn submit(&self, request: Request) -> Submitted {
		let mut request = Arc::new(request);

		loop {
			match self.offer(request) {
				Offer::Accepted => return Submitted::Accepted,
				Offer::Duplicate(request) => return Submitted::Duplicate(request),
				Offer::Full(returned) => {
					tracing::debug!(request_id = %returned.id, "Backlog full. Retrying admission.");

					request = returned;

					tokio::time::sleep(self.retry_interval).await;
				},
			}
		}
	}

	/// Removes up to `max` requests in admission order.
	pub fn drain(&self, max: usize) -> Vec<Arc<Request>> {
		let mut backlog = self.backlog.lock().unwrap_or_else(|err| err.into_inner());
		let count = max.min(backlog.queue.len());
		let drained: Vec<_> = backlog.queue.drain(..count).collect();

		for request in &drained {
			backlog.ids.remove(&request.id);
		}

		drained
	}

	pub fn len(&self) -> usize {
		self.backlog.lock().unwrap_or_else(|err| err.into_inner()).queue.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
