//! Worker primitives shared by busrpc components.
//!
//! * [`spawn`] / [`spawn_blocking`]: class-tagged task spawning on the ambient runtime
//! * [`WorkerPool`]: bounded fire-and-forget execution of submitted units of work
//! * [`join_error_panic_message`]: panic payload extraction for failed joins

mod class;
mod panic;
mod pool;
mod spawn;

pub use class::TaskClass;
pub use panic::join_error_panic_message;
pub use pool::{DEFAULT_POOL_SIZE, WorkerPool};
pub use spawn::{spawn, spawn_blocking};
