//! Shared setup for end-to-end bus tests.

#![allow(dead_code)]

use busrpc::{Bus, Client, Endpoints, Server, ServerOptions};

/// An isolated messaging domain living in its own temp directory.
pub struct Domain {
	pub bus: Bus,
	pub endpoints: Endpoints,
	pub dir: tempfile::TempDir,
}

impl Domain {
	pub async fn start() -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let dir = tempfile::tempdir().expect("failed to create temp dir");
		let endpoints = Endpoints::in_dir(dir.path());
		let bus = Bus::bind(endpoints.clone()).await.expect("bus failed to bind");
		Self { bus, endpoints, dir }
	}

	pub async fn client(&self) -> Client {
		Client::connect(self.endpoints.clone()).await.expect("client failed to connect")
	}

	pub async fn server(&self) -> Server {
		Server::connect(self.endpoints.clone(), ServerOptions::default())
			.await
			.expect("server failed to connect")
	}

	/// Starts a server answering `echo` with its input.
	pub async fn echo_server(&self) -> Server {
		let mut server = self.server().await;
		server.register("echo", |payload| Ok(payload.to_owned())).expect("register echo");
		server.start().await.expect("start echo server");
		server
	}
}
