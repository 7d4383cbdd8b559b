//! busrpc command line.
//!
//! Runs the broadcast bus as a daemon and issues calls against a running bus:
//! - `busrpc bus`: relay until interrupted
//! - `busrpc call` / `survey` / `send`: request, scatter/gather, fire-and-forget
//! - `busrpc echo`: answer one method with its input, for smoke testing

use std::path::PathBuf;
use std::time::Duration;

use busrpc::{Client, Endpoints, Server, ServerOptions};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "busrpc")]
#[command(about = "RPC over a local publish/subscribe bus")]
struct Args {
	/// Broadcast socket path (bus fan-out side)
	#[arg(long, global = true, value_name = "PATH")]
	broadcast: Option<PathBuf>,

	/// Subscribe socket path (bus intake side)
	#[arg(long, global = true, value_name = "PATH")]
	subscribe: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the bus relay until interrupted
	Bus,
	/// Call a method and print its reply
	Call {
		method: String,
		#[arg(default_value = "")]
		payload: String,
		/// Reply timeout in milliseconds
		#[arg(long, default_value_t = 3000)]
		timeout_ms: u64,
	},
	/// Call a method on every responder and print one reply per line
	Survey {
		method: String,
		#[arg(default_value = "")]
		payload: String,
		/// Per-reply timeout in milliseconds
		#[arg(long, default_value_t = 500)]
		timeout_ms: u64,
	},
	/// Publish a request without waiting for a reply
	Send {
		method: String,
		#[arg(default_value = "")]
		payload: String,
	},
	/// Serve a method that replies with its input until interrupted
	Echo {
		/// Method name to serve
		#[arg(long, default_value = "echo")]
		method: String,
		/// Concurrent handler invocations
		#[arg(long, default_value_t = 4, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
		workers: usize,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let mut endpoints = Endpoints::from_env();
	if let Some(path) = args.broadcast {
		endpoints.broadcast = path;
	}
	if let Some(path) = args.subscribe {
		endpoints.subscribe = path;
	}

	match args.command {
		Command::Bus => run_bus(endpoints).await?,
		Command::Call { method, payload, timeout_ms } => {
			let client = Client::connect(endpoints).await?;
			let reply = client.request_timeout(&method, &payload, Duration::from_millis(timeout_ms)).await?;
			println!("{reply}");
		}
		Command::Survey { method, payload, timeout_ms } => {
			let client = Client::connect(endpoints).await?;
			for reply in client.survey_timeout(&method, &payload, Duration::from_millis(timeout_ms)).await? {
				println!("{reply}");
			}
		}
		Command::Send { method, payload } => {
			let client = Client::connect(endpoints).await?;
			client.singleshot(&method, &payload).await?;
		}
		Command::Echo { method, workers } => {
			let mut server = Server::connect(endpoints, ServerOptions { workers }).await?;
			server.register(method.as_str(), |payload| Ok(payload.to_owned()))?;
			server.start().await?;
			info!(method = %method, "serving echo; press Ctrl-C to stop");
			tokio::signal::ctrl_c().await?;
			server.stop().await?;
		}
	}

	Ok(())
}

async fn run_bus(endpoints: Endpoints) -> Result<(), Box<dyn std::error::Error>> {
	for path in [&endpoints.broadcast, &endpoints.subscribe] {
		if let Some(parent) = path.parent()
			&& !parent.as_os_str().is_empty()
			&& !parent.exists()
		{
			std::fs::create_dir_all(parent)?;
		}
	}
	info!(
		broadcast = %endpoints.broadcast.display(),
		subscribe = %endpoints.subscribe.display(),
		"starting busrpc bus"
	);

	let shutdown = CancellationToken::new();
	let on_signal = shutdown.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("interrupt received, stopping bus");
		}
		on_signal.cancel();
	});

	busrpc::bus::serve(&endpoints, shutdown).await?;
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("busrpc=debug,busrpc_transport=debug,info")
			} else {
				EnvFilter::new("busrpc=info,warn")
			}
		})
	};

	if let Some(log_dir) = std::env::var("BUSRPC_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("busrpc.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "busrpc tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn echo_rejects_zero_workers() {
		assert!(Args::try_parse_from(["busrpc", "echo", "--workers", "0"]).is_err());
		let args = Args::try_parse_from(["busrpc", "echo", "--workers", "2"]).unwrap();
		assert!(matches!(args.command, Command::Echo { workers: 2, .. }));
	}
}
