use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glue_formats::WalkMap;

/// Prints a room walk map as ASCII (or JSON) for inspection.
#[derive(Parser, Debug)]
#[command(about = "Dump a walk map grid", version)]
struct Args {
    /// Path to the walk map file
    path: PathBuf,

    /// Emit the decoded grid as JSON instead of ASCII
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let bytes =
        fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let map = WalkMap::parse(&bytes)
        .with_context(|| format!("decoding walk map {}", args.path.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&map).context("serializing walk map to JSON")?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "{}x{} cells, {} walkable ({})",
        map.width(),
        map.height(),
        map.walkable_count(),
        args.path.display()
    );
    print!("{}", map.render_ascii());
    Ok(())
}
