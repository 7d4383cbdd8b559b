use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::TaskClass;

/// Default number of concurrently executing units of work.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Bounded worker pool for fire-and-forget units of work.
///
/// Submission never blocks the caller: every unit is spawned immediately and
/// waits for one of `size` permits before its body runs. The queue of waiting
/// units is unbounded; concurrency is not.
#[derive(Debug, Clone)]
pub struct WorkerPool {
	name: Arc<str>,
	size: usize,
	permits: Arc<Semaphore>,
	tracker: TaskTracker,
}

impl WorkerPool {
	/// Creates a pool running at most `size` units at once.
	///
	/// # Panics
	///
	/// Panics if `size` is zero.
	pub fn new(name: impl Into<String>, size: usize) -> Self {
		assert!(size > 0, "worker pool size must be non-zero");
		Self {
			name: Arc::from(name.into()),
			size,
			permits: Arc::new(Semaphore::new(size)),
			tracker: TaskTracker::new(),
		}
	}

	/// Returns the pool name used in diagnostics.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the maximum number of concurrently running units.
	pub fn size(&self) -> usize {
		self.size
	}

	/// Returns the number of submitted units that have not finished yet,
	/// including those still waiting for a permit.
	pub fn in_flight(&self) -> usize {
		self.tracker.len()
	}

	/// Submits one unit of work. The result is not observed.
	pub fn submit<F>(&self, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		tracing::trace!(
			worker_class = TaskClass::Dispatch.as_str(),
			pool = %self.name,
			in_flight = self.tracker.len(),
			"worker.pool.submit"
		);
		let permits = Arc::clone(&self.permits);
		let handle = crate::spawn::runtime_handle();
		self.tracker.spawn_on(
			async move {
				let Ok(_permit) = permits.acquire_owned().await else {
					return;
				};
				fut.await;
			},
			&handle,
		);
	}

	/// Waits until every unit submitted so far has finished.
	///
	/// The pool keeps accepting work afterwards.
	pub async fn wait_idle(&self) {
		self.tracker.close();
		self.tracker.wait().await;
		self.tracker.reopen();
	}
}
