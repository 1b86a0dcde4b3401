use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use crate::object::Verb;

#[derive(Parser, Debug)]
#[command(
    about = "Plays a room of the adventure data headlessly and reports what the scripts asked for",
    version
)]
pub struct Args {
    /// Path to the extracted game data directory
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Room to enter at start (e.g. 1203)
    #[arg(long)]
    pub room: Option<u16>,

    /// Upper bound on ticks run after entering and after each verb
    #[arg(long, default_value_t = 500)]
    pub ticks: usize,

    /// Verb to apply once the room settles, as VERB:OBJECT (repeatable)
    #[arg(long = "verb", value_name = "VERB:OBJECT")]
    pub verbs: Vec<String>,

    /// Seed for random variables
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Inventory resource name
    #[arg(long, default_value = "inv.txt")]
    pub inventory: String,

    /// Path to write the host event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write a save record when the run finishes
    #[arg(long)]
    pub save_out: Option<PathBuf>,

    /// Resume from a save record instead of entering --room
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Print every host event as it happens
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Start {
    Room(u16),
    Save(PathBuf),
}

#[derive(Debug)]
pub struct RunArgs {
    pub data_root: PathBuf,
    pub start: Start,
    pub ticks: usize,
    pub verbs: Vec<(Verb, String)>,
    pub seed: u64,
    pub inventory: String,
    pub event_log_json: Option<PathBuf>,
    pub save_out: Option<PathBuf>,
    pub verbose: bool,
}

pub fn parse() -> Result<RunArgs> {
    let args = Args::parse();
    args.into_run_args()
}

/// Splits `VERB:OBJECT`; the object may itself contain colons.
pub fn parse_verb(arg: &str) -> Result<(Verb, String)> {
    let (verb, object) = arg
        .split_once(':')
        .ok_or_else(|| anyhow!("--verb {arg:?} is not VERB:OBJECT"))?;
    let verb = verb.trim().parse::<Verb>().map_err(|err| anyhow!(err))?;
    let object = object.trim();
    if object.is_empty() {
        bail!("--verb {arg:?} names no object");
    }
    Ok((verb, object.to_string()))
}

impl Args {
    pub fn into_run_args(self) -> Result<RunArgs> {
        let start = match (self.room, self.load) {
            (Some(_), Some(_)) => bail!("--room cannot be combined with --load"),
            (Some(room), None) => Start::Room(room),
            (None, Some(path)) => Start::Save(path),
            (None, None) => bail!("either --room or --load is required"),
        };
        let verbs = self
            .verbs
            .iter()
            .map(|arg| parse_verb(arg))
            .collect::<Result<Vec<_>>>()?;

        Ok(RunArgs {
            data_root: self.data_root,
            start,
            ticks: self.ticks,
            verbs,
            seed: self.seed,
            inventory: self.inventory,
            event_log_json: self.event_log_json,
            save_out: self.save_out,
            verbose: self.verbose,
        })
    }
}
