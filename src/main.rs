//! Hotmart OAuth proxy server.

// crates.io
use clap::Parser;
use color_eyre::Result;
// self
use hotmart_proxy::{
	config::{Cli, Config},
	obs, server,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_tracing();

	let config = Config::try_from(Cli::parse())?;

	server::serve(config).await
}
