use anyhow::Context;
use gpucaps_probe::Config;
use gpucaps_schema::args::{clap::Parser, Args};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse(args.log_level.as_deref().unwrap_or_default())
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref())?;
    gpucaps_cli::run(args.command, &config)
}
