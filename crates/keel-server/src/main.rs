// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! keel-server operator binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use keel_drafts_core::{AppId, EnvId, ProtectionState, ResourceKind, UserId};
use keel_server::operator::{operator_context, DetachedLockTargets, DetachedPublisher};
use keel_server::params::parse_params;
use keel_server::{Collaborators, DraftsRuntime};
use keel_server_config::{LogFormat, ServerConfig};
use keel_server_drafts::{JsonPayloadValidator, StaticLockRules};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Operator tool for protected configuration drafts.
#[derive(Parser, Debug)]
#[command(name = "keel-server", about = "Protected configuration drafts", version)]
struct Cli {
	/// Path to a TOML config file (defaults to /etc/keel/server.toml)
	#[arg(long, global = true, env = "KEEL_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Create or upgrade the database schema
	Migrate,
	/// Evaluate a CEL expression
	Eval {
		#[arg(long)]
		expr: String,
		/// Parameter as name=type:value, repeatable
		#[arg(long = "param")]
		params: Vec<String>,
	},
	/// Inspect or change configuration protection
	Protection {
		#[command(subcommand)]
		command: ProtectionCommand,
	},
	/// Inspect pending drafts
	Drafts {
		#[command(subcommand)]
		command: DraftsCommand,
	},
}

#[derive(Args, Debug)]
struct Target {
	#[arg(long)]
	app: i32,
	#[arg(long, allow_negative_numbers = true)]
	env: i32,
}

#[derive(Subcommand, Debug)]
enum ProtectionCommand {
	Get {
		#[command(flatten)]
		target: Target,
	},
	Set {
		#[command(flatten)]
		target: Target,
		/// enabled or disabled
		#[arg(long)]
		state: ProtectionState,
		/// Acting user, defaults to the configured system user
		#[arg(long)]
		user: Option<i32>,
	},
	History {
		#[command(flatten)]
		target: Target,
	},
}

#[derive(Subcommand, Debug)]
enum DraftsCommand {
	/// Pending drafts per environment
	Count {
		#[arg(long)]
		app: i32,
		#[arg(long = "env", required = true, allow_negative_numbers = true)]
		envs: Vec<i32>,
	},
	List {
		#[command(flatten)]
		target: Target,
		/// configmap, secret or deployment-template
		#[arg(long)]
		kind: ResourceKind,
	},
}

fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	match config.logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
			.init(),
		LogFormat::Text => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();

	if let Command::Version = cli.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config = match &cli.config {
		Some(path) => keel_server_config::load_config_with_file(path)?,
		None => keel_server_config::load_config()?,
	};
	init_tracing(&config);

	if let Command::Eval { expr, params } = &cli.command {
		let params = parse_params(params.iter().map(String::as_str))?;
		let cel = keel_cel::CelEvaluator::with_capacity(config.cel.cache_capacity);
		println!("{}", cel.evaluate(expr, &params)?);
		return Ok(());
	}

	tracing::info!(database = %config.database.url, "opening database");
	let pool = keel_server_db::create_pool_with(
		&config.database.url,
		keel_server_db::PoolSettings {
			max_connections: config.database.max_connections,
			busy_timeout: config.database.busy_timeout(),
		},
	)
	.await?;
	keel_server_db::run_migrations(&pool).await?;
	if let Command::Migrate = cli.command {
		println!("migrations applied");
		return Ok(());
	}

	let runtime = DraftsRuntime::build(
		&config,
		pool,
		Collaborators {
			publisher: Arc::new(DetachedPublisher),
			validator: Arc::new(JsonPayloadValidator),
			lock_rules: Arc::new(StaticLockRules(Vec::new())),
			lock_targets: Arc::new(DetachedLockTargets),
		},
	);
	let system_user = UserId(config.drafts.system_user_id);

	match cli.command {
		Command::Protection { command } => match command {
			ProtectionCommand::Get { target } => {
				let state = runtime
					.registry
					.get_protection(AppId(target.app), EnvId(target.env), None)
					.await?;
				println!("{state}");
			}
			ProtectionCommand::Set {
				target,
				state,
				user,
			} => {
				let user = user.map_or(system_user, UserId);
				runtime
					.registry
					.set_protection(AppId(target.app), EnvId(target.env), state, user, None)
					.await?;
				println!("{state}");
			}
			ProtectionCommand::History { target } => {
				let history = runtime
					.registry
					.list_history(AppId(target.app), EnvId(target.env), None)
					.await?;
				print_json(&history)?;
			}
		},
		Command::Drafts { command } => {
			let caller = operator_context(system_user)?;
			match command {
				DraftsCommand::Count { app, envs } => {
					let envs: Vec<EnvId> = envs.into_iter().map(EnvId).collect();
					let counts = runtime
						.service
						.get_drafts_count(&caller, AppId(app), &envs)
						.await?;
					print_json(&counts)?;
				}
				DraftsCommand::List { target, kind } => {
					let drafts = runtime
						.service
						.list_drafts(&caller, AppId(target.app), EnvId(target.env), kind)
						.await?;
					print_json(&drafts)?;
				}
			}
		}
		Command::Version | Command::Migrate | Command::Eval { .. } => {}
	}
	Ok(())
}
