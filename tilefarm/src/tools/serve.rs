use anyhow::{Context, Result};
use std::path::PathBuf;
use tilefarm::{config::Config, server::TileFarmServer};
use tokio::time::{Duration, sleep};

#[derive(clap::Args, Debug)]
#[command(disable_version_flag = true)]
pub struct Subcommand {
	/// Path to a configuration file (YAML format).
	/// Command line arguments override configuration file settings.
	#[arg(short = 'c', long, value_name = "FILE", display_order = 0)]
	pub config: Option<PathBuf>,

	/// Serve via socket ip. Default: 0.0.0.0
	#[arg(short = 'i', long, display_order = 0)]
	pub ip: Option<String>,

	/// Serve via port. Default: 8080
	#[arg(short, long, display_order = 0)]
	pub port: Option<u16>,

	/// Disable the `/api` endpoints, serving only `/status` and the admin control plane.
	#[arg(long, display_order = 1)]
	pub disable_api: Option<bool>,

	/// Shutdown server automatically after x milliseconds.
	#[arg(long, display_order = 4)]
	pub auto_shutdown: Option<u64>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let mut config = if let Some(config_path) = &arguments.config {
		Config::from_path(config_path).context("run `tilefarm serve --help` to see the configuration options")?
	} else {
		Config::default()
	};
	config.apply_env_overrides();

	config.server.override_optional_ip(&arguments.ip);
	config.server.override_optional_port(&arguments.port);
	config.server.override_optional_disable_api(&arguments.disable_api);

	let mut server = TileFarmServer::from_config(config).await?;
	server.start().await?;
	log::info!("tile farm listening on port {}", server.get_port());

	if let Some(milliseconds) = arguments.auto_shutdown {
		sleep(Duration::from_millis(milliseconds)).await;
		server.stop().await;
	} else {
		loop {
			sleep(Duration::from_secs(60)).await;
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::tests::run_command;
	use anyhow::Result;

	#[test]
	fn test_local() -> Result<()> {
		run_command(vec!["tilefarm", "serve", "-i", "127.0.0.1", "-p", "65101", "--auto-shutdown", "200"])?;
		Ok(())
	}

	#[test]
	fn test_disable_api() -> Result<()> {
		run_command(vec![
			"tilefarm",
			"serve",
			"-i",
			"127.0.0.1",
			"-p",
			"65102",
			"--disable-api",
			"true",
			"--auto-shutdown",
			"200",
		])?;
		Ok(())
	}
}
