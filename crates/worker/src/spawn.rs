use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

use crate::TaskClass;

/// Handle of the runtime socket pumps and handlers run on.
///
/// Inside a tokio runtime this is the caller's runtime. Sockets opened from
/// outside one, such as a bus client built by synchronous code, keep their
/// pumps on a shared two-thread runtime owned by this crate.
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("busrpc-worker-global")
			.build()
			.expect("failed to build busrpc-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task tagged with its worker class.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Spawns blocking work tagged with its worker class.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	runtime_handle().spawn_blocking(f)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spawn_outside_a_runtime_uses_the_global_one() {
		let (tx, rx) = std::sync::mpsc::channel();
		let _task = spawn(TaskClass::Io, async move {
			let name = std::thread::current().name().map(str::to_owned);
			let _ = tx.send(name);
		});
		let name = rx.recv_timeout(std::time::Duration::from_secs(5)).expect("task ran");
		assert_eq!(name.as_deref(), Some("busrpc-worker-global"));
	}
}
