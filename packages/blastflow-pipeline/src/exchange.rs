use std::{future::Future, num::NonZeroU32};

use crate::{Error, Result};

/// An in-process stand-in for a keyed shuffle over a fixed worker pool.
///
/// [`Exchange::shuffle`] moves items into one bucket per worker. [`Exchange::run`] processes every
/// non-empty bucket on its own task and returns only after all of them finish, which is the
/// barrier each regrouping needs.
#[derive(Debug, Clone, Copy)]
pub struct Exchange {
	workers: NonZeroU32,
}
impl Exchange {
	pub fn new(workers: NonZeroU32) -> Self {
		Self { workers }
	}

	pub fn workers(&self) -> NonZeroU32 {
		self.workers
	}

	/// Buckets keep the input order of their items.
	pub fn shuffle<T>(
		&self,
		items: impl IntoIterator<Item = T>,
		route: impl Fn(&T) -> usize,
	) -> Vec<Vec<T>> {
		let count = self.workers.get() as usize;
		let mut buckets: Vec<Vec<T>> = (0..count).map(|_| Vec::new()).collect();

		for item in items {
			let worker = route(&item) % count;

			buckets[worker].push(item);
		}

		buckets
	}

	/// Outputs come back in worker order, not completion order.
	pub async fn run<T, R, F, Fut>(&self, buckets: Vec<Vec<T>>, task: F) -> Result<Vec<R>>
	where
		T: Send + 'static,
		R: Send + 'static,
		F: Fn(usize, Vec<T>) -> Fut,
		Fut: Future<Output = R> + Send + 'static,
	{
		let handles: Vec<_> = buckets
			.into_iter()
			.enumerate()
			.filter(|(_, bucket)| !bucket.is_empty())
			.map(|(worker, bucket)| (worker, tokio::spawn(task(worker, bucket))))
			.collect();
		let mut outputs = Vec::with_capacity(handles.len());

		for (worker, handle) in handles {
			outputs.push(handle.await.map_err(|source| Error::Worker { worker, source })?);
		}

		Ok(outputs)
	}
}
