// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator binary for the recap LLM gateway.

use std::path::PathBuf;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use recap_server::{logging, LlmGateway};
use recap_server_config::{load_config, load_config_with_file};

#[derive(Parser, Debug)]
#[command(name = "recap-server", about = "Recap LLM gateway", version)]
struct Args {
	/// TOML config file (default: /etc/recap/server.toml)
	#[arg(long, short, env = "RECAP_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Load configuration, migrate the database and run the encryption self-test
	Check,
	/// Print a new random value for RECAP_ENCRYPTION_MASTER_KEY
	GenerateKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Command::GenerateKey = args.command {
		let key = recap_server_secrets::generate_key();
		println!("{}", BASE64.encode(key.as_slice()));
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => load_config_with_file(path),
		None => load_config(),
	}
	.context("failed to load configuration")?;

	logging::init_tracing(&config.logging);

	tracing::info!(database = %config.database.url, "checking recap-server");

	let gateway = LlmGateway::start(&config)
		.await
		.context("failed to start LLM gateway")?;

	let healthy = gateway.encryption_healthy();
	gateway.shutdown().await;
	anyhow::ensure!(healthy, "encryption self-test failed");

	println!("ok: database {} migrated, encryption healthy", config.database.url);
	Ok(())
}
