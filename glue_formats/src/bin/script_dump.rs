use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glue_formats::TextParser;

/// Prints the tokenized command lines of a room, object or conversation file.
#[derive(Parser, Debug)]
#[command(about = "Dump tokenized script lines", version)]
struct Args {
    /// Path to the text definition file
    path: PathBuf,

    /// Emit the lines as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let bytes =
        fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let name = args
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("script")
        .to_string();
    let parser = TextParser::from_bytes(name, &bytes);

    if args.json {
        let json = serde_json::to_string_pretty(parser.lines())
            .context("serializing script lines to JSON")?;
        println!("{json}");
        return Ok(());
    }

    for line in parser.lines() {
        println!(
            "{line:>5}  {cmd:<12} {args:?}",
            line = line.line,
            cmd = line.cmd,
            args = line.arg_list()
        );
    }
    Ok(())
}
