use anyhow::Result;
use env_logger::Env;

use glue_engine::{cli, runtime};

fn main() -> Result<()> {
    let args = cli::parse()?;
    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    runtime::execute(args)
}
