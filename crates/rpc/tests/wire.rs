//! Interop with peers speaking the bare envelope format directly.

mod common;

use std::time::Duration;

use busrpc::envelope::{Direction, topic_prefix};
use busrpc::{Client, Endpoints, Error, Server, ServerOptions};
use busrpc_transport::{PubSocket, SubSocket};
use bytes::Bytes;
use common::Domain;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn uncorrelated_request_gets_uncorrelated_reply() -> std::io::Result<()> {
	let domain = Domain::start().await;
	let _server = domain.echo_server().await;

	let mut listener = SubSocket::connect(&domain.endpoints.broadcast).await?;
	listener.subscribe(topic_prefix(Direction::Reply, "echo"));
	let talker = PubSocket::connect(&domain.endpoints.subscribe).await?;
	talker.send(Bytes::from_static(b"/req/echo/:hi")).await?;

	let reply = listener.recv_timeout(Duration::from_secs(2)).await?;
	assert_eq!(reply.as_deref(), Some(&b"/rep/echo/:hi"[..]));
	Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_envelopes_do_not_stop_the_server() -> std::io::Result<()> {
	let domain = Domain::start().await;
	let _server = domain.echo_server().await;
	let client = domain.client().await;

	let talker = PubSocket::connect(&domain.endpoints.subscribe).await?;
	talker.send(Bytes::from_static(b"/req/echo/no-separator")).await?;
	talker.send(Bytes::from_static(b"/req/echo/:\xff")).await?;

	assert_eq!(client.request("echo", "ok").await.expect("server still answers"), "ok");
	Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_participant_sees_requests_on_the_broadcast_side() -> std::io::Result<()> {
	let domain = Domain::start().await;
	let mut tap = SubSocket::connect(&domain.endpoints.broadcast).await?;
	tap.subscribe("/req/");
	let client = domain.client().await;

	client.singleshot("audit", "entry").await.expect("singleshot");
	let seen = tap.recv_timeout(Duration::from_secs(2)).await?;
	assert_eq!(seen.as_deref(), Some(&b"/req/audit/:entry"[..]));
	Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn calls_fail_once_the_bus_is_gone() {
	let domain = Domain::start().await;
	let client = domain.client().await;
	let Domain { bus, endpoints, dir: _dir } = domain;

	bus.shutdown().await;
	assert!(!endpoints.broadcast.exists());
	assert!(matches!(client.request("echo", "x").await, Err(Error::Io(_))));
}

#[tokio::test]
async fn connecting_without_a_bus_fails() {
	let dir = tempfile::tempdir().expect("tempdir");
	let endpoints = Endpoints::in_dir(dir.path());
	assert!(matches!(Client::connect(endpoints.clone()).await, Err(Error::Io(_))));
	assert!(matches!(Server::connect(endpoints, ServerOptions::default()).await, Err(Error::Io(_))));
}
