use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // The terminal owns stdout; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cfg = warpviz::config::Config::parse();
    if cfg.list_devices {
        warpviz::capture::list_input_devices()?;
        return Ok(());
    }

    warpviz::app::run(cfg)
}
