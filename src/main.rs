//! Cabinet CLI - builds the emulator's machine-info database and runs
//! machines through the worker protocol.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::select;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cabinet::infodb::structs::Machine;
use cabinet::prelude::*;
use cabinet::worker::{query_version, ChatterType};

/// Cabinet - emulator front-end tool
#[derive(Parser)]
#[command(name = "cabinet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the info database from the emulator's -listxml output
    BuildDb {
        /// Path to the emulator executable
        #[arg(short, long, env = "CABINET_EMULATOR")]
        emulator: Option<PathBuf>,

        /// Read a saved -listxml document instead of running the emulator
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output database file
        #[arg(short, long, env = "CABINET_DB")]
        db: PathBuf,
    },

    /// Show a summary of the info database
    Info {
        /// Database file
        #[arg(short, long, env = "CABINET_DB")]
        db: PathBuf,

        /// Report the database as stale unless it was built by this emulator
        #[arg(short, long, env = "CABINET_EMULATOR")]
        emulator: Option<PathBuf>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List machines in the info database
    List {
        /// Database file
        #[arg(short, long, env = "CABINET_DB")]
        db: PathBuf,

        /// Filter pattern for machine names (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show year, manufacturer and parent
        #[arg(long)]
        detailed: bool,
    },

    /// Show everything the database knows about one machine
    Machine {
        /// Machine name
        name: String,

        /// Database file
        #[arg(short, long, env = "CABINET_DB")]
        db: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the emulator's version string
    Version {
        /// Path to the emulator executable
        #[arg(short, long, env = "CABINET_EMULATOR")]
        emulator: PathBuf,
    },

    /// Run a machine, reading worker commands from stdin
    Run {
        /// Machine name
        machine: String,

        /// Software to load
        software: Option<String>,

        /// Path to the emulator executable
        #[arg(short, long, env = "CABINET_EMULATOR")]
        emulator: PathBuf,

        /// Slot option, may be repeated
        #[arg(long = "slot", value_name = "SLOT=OPTION", value_parser = parse_slot)]
        slots: Vec<(String, String)>,

        #[command(flatten)]
        paths: PathArgs,

        /// Echo every command and response
        #[arg(long)]
        chatter: bool,

        /// Print status updates as JSON lines
        #[arg(long)]
        json: bool,
    },
}

/// Emulator search paths.
#[derive(Args)]
struct PathArgs {
    #[arg(long, env = "CABINET_ROMPATH")]
    rompath: Option<PathBuf>,
    #[arg(long, env = "CABINET_SAMPLEPATH")]
    samplepath: Option<PathBuf>,
    #[arg(long, env = "CABINET_CFG_DIRECTORY")]
    cfg_directory: Option<PathBuf>,
    #[arg(long, env = "CABINET_NVRAM_DIRECTORY")]
    nvram_directory: Option<PathBuf>,
    #[arg(long, env = "CABINET_HASHPATH")]
    hashpath: Option<PathBuf>,
    #[arg(long, env = "CABINET_ARTPATH")]
    artpath: Option<PathBuf>,
    #[arg(long, env = "CABINET_PLUGINSPATH")]
    pluginspath: Option<PathBuf>,
    #[arg(long, env = "CABINET_CHEATPATH")]
    cheatpath: Option<PathBuf>,
}

impl From<PathArgs> for SearchPaths {
    fn from(args: PathArgs) -> Self {
        Self {
            roms: args.rompath,
            samples: args.samplepath,
            config: args.cfg_directory,
            nvram: args.nvram_directory,
            hash: args.hashpath,
            artwork: args.artpath,
            plugins: args.pluginspath,
            cheats: args.cheatpath,
        }
    }
}

fn parse_slot(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(slot, option)| (slot.to_owned(), option.to_owned()))
        .ok_or_else(|| format!("expected SLOT=OPTION, got '{value}'"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildDb { emulator, input, db } => {
            cmd_build_db(emulator.as_deref(), input.as_deref(), &db)?;
        }
        Commands::Info { db, emulator, json } => {
            cmd_info(&db, emulator.as_deref(), json)?;
        }
        Commands::List { db, filter, detailed } => {
            cmd_list(&db, filter.as_deref(), detailed)?;
        }
        Commands::Machine { name, db, json } => {
            cmd_machine(&db, &name, json)?;
        }
        Commands::Version { emulator } => {
            println!("{}", query_version(&emulator).context("Failed to query emulator version")?);
        }
        Commands::Run { machine, software, emulator, slots, paths, chatter, json } => {
            let options = LaunchOptions {
                machine,
                software,
                slot_options: slots,
                attach_window: None,
                paths: paths.into(),
            };
            cmd_run(&emulator, &options, chatter, json)?;
        }
    }

    Ok(())
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn cmd_build_db(emulator: Option<&Path>, input: Option<&Path>, db: &Path) -> Result<()> {
    let task = ListXmlTask::new(db);
    let (tx, rx) = crossbeam_channel::unbounded();
    let start = Instant::now();

    let worker = match (input, emulator) {
        (Some(input), _) => {
            println!("Reading -listxml document: {}", input.display());
            let file = File::open(input).context("Failed to open -listxml document")?;
            std::thread::spawn(move || task.process(BufReader::with_capacity(1 << 16, file), &tx))
        }
        (None, Some(emulator)) => {
            println!("Running {} -listxml", emulator.display());
            task.spawn(emulator, tx).context("Failed to start emulator")?
        }
        (None, None) => anyhow::bail!("Either --emulator or --input is required"),
    };

    let pb = spinner()?;
    let mut status = None;
    for event in rx {
        match event {
            ListXmlEvent::Progress { machine_count, name, description } => {
                if machine_count % 64 == 0 {
                    pb.set_message(format!("{machine_count} machines: {name} ({description})"));
                }
            }
            ListXmlEvent::Result { status: result } => status = Some(result),
        }
    }
    pb.finish_and_clear();
    worker.join().ok();

    match status {
        Some(ListXmlStatus::Success) => {
            let database = InfoDatabase::open(db, None).context("Failed to load the new database")?;
            println!(
                "Built {} machines ({} bytes) in {:?}",
                database.machines().len(),
                database.byte_len(),
                start.elapsed()
            );
            Ok(())
        }
        Some(ListXmlStatus::Aborted) => anyhow::bail!("Build aborted"),
        Some(ListXmlStatus::Error(message)) => anyhow::bail!(message),
        None => anyhow::bail!("Build ended without a result"),
    }
}

fn open_db(path: &Path, expected_version: Option<&str>) -> Result<InfoDatabase> {
    match InfoDatabase::open(path, expected_version) {
        Ok(db) => Ok(db),
        Err(e) if e.needs_rebuild() => {
            tracing::debug!(path = %path.display(), error = %e, "info database is stale");
            Err(anyhow::anyhow!(e).context(format!(
                "{} needs to be rebuilt (run `cabinet build-db`)",
                path.display()
            )))
        }
        Err(e) => Err(anyhow::anyhow!(e).context("Failed to open info database")),
    }
}

fn cmd_info(path: &Path, emulator: Option<&Path>, json: bool) -> Result<()> {
    let expected = emulator
        .map(|emulator| query_version(emulator))
        .transpose()
        .context("Failed to query emulator version")?;
    let db = open_db(path, expected.as_deref())?;
    let counts = db.counts();

    let rows: [(&str, u32); 16] = [
        ("machines", counts.machines),
        ("biossets", counts.biossets),
        ("roms", counts.roms),
        ("disks", counts.disks),
        ("devices", counts.devices),
        ("slots", counts.slots),
        ("slot_options", counts.slot_options),
        ("features", counts.features),
        ("chips", counts.chips),
        ("displays", counts.displays),
        ("samples", counts.samples),
        ("configurations", counts.configurations),
        ("configuration_settings", counts.configuration_settings),
        ("configuration_conditions", counts.configuration_conditions),
        ("software_lists", counts.software_lists),
        ("ram_options", counts.ram_options),
    ];

    if json {
        let tables: serde_json::Map<String, serde_json::Value> =
            rows.iter().map(|&(name, count)| (name.to_owned(), count.into())).collect();
        let value = serde_json::json!({
            "version": db.version().as_str(),
            "bytes": db.byte_len(),
            "tables": tables,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Version: {}", db.version());
    println!("Size:    {} bytes", db.byte_len());
    for (name, count) in rows {
        println!("{:>26} {:>8}", name, count);
    }

    Ok(())
}

fn cmd_list(path: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let db = open_db(path, None)?;
    let filter = filter.map(name_filter).transpose()?;

    let mut count = 0;
    for machine in db.machines().iter() {
        let name = machine.name();
        if let Some(pattern) = &filter {
            if !pattern.matches_with(&name, NAME_MATCH) {
                continue;
            }
        }

        if detailed {
            println!(
                "{:<16} {:>4} {:<24} {:<16} {}",
                name,
                machine.year(),
                machine.manufacturer(),
                machine.clone_of().map(|p| p.name().to_owned_string()).unwrap_or_default(),
                machine.description()
            );
        } else {
            println!("{}", name);
        }
        count += 1;
    }

    println!("\nTotal: {} machines", count);

    Ok(())
}

#[derive(Serialize)]
struct RomSummary {
    name: String,
    size: u32,
    crc: Option<String>,
    sha1: Option<String>,
    region: String,
    status: String,
}

#[derive(Serialize)]
struct SlotSummary {
    name: String,
    options: Vec<String>,
    default: Option<String>,
}

#[derive(Serialize)]
struct MachineSummary {
    name: String,
    description: String,
    year: String,
    manufacturer: String,
    sourcefile: String,
    clone_of: Option<String>,
    rom_of: Option<String>,
    runnable: bool,
    status: String,
    emulation: String,
    save_state: Option<bool>,
    roms: Vec<RomSummary>,
    devices: Vec<String>,
    slots: Vec<SlotSummary>,
    software_lists: Vec<String>,
    ram_options: Vec<u32>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl MachineSummary {
    fn new(machine: Entry<'_, Machine>) -> Self {
        Self {
            name: machine.name().to_owned_string(),
            description: machine.description().to_owned_string(),
            year: machine.year().to_owned_string(),
            manufacturer: machine.manufacturer().to_owned_string(),
            sourcefile: machine.sourcefile().to_owned_string(),
            clone_of: machine.clone_of().map(|m| m.name().to_owned_string()),
            rom_of: machine.rom_of().map(|m| m.name().to_owned_string()),
            runnable: machine.runnable(),
            status: machine.quality_status().to_string(),
            emulation: machine.quality_emulation().to_string(),
            save_state: machine.save_state_supported().as_option(),
            roms: machine
                .roms()
                .iter()
                .map(|rom| RomSummary {
                    name: rom.name().to_owned_string(),
                    size: rom.size(),
                    crc: rom.crc().map(|crc| hex(&crc)),
                    sha1: rom.sha1().map(|sha1| hex(&sha1)),
                    region: rom.region().to_owned_string(),
                    status: rom.status().to_string(),
                })
                .collect(),
            devices: machine
                .devices()
                .iter()
                .map(|d| format!("{} ({})", d.instance_name(), d.device_type()))
                .collect(),
            slots: machine
                .slots()
                .iter()
                .map(|slot| SlotSummary {
                    name: slot.name().to_owned_string(),
                    options: slot.options().iter().map(|o| o.name().to_owned_string()).collect(),
                    default: slot.default_option().map(|o| o.name().to_owned_string()),
                })
                .collect(),
            software_lists: machine
                .software_lists()
                .iter()
                .map(|l| l.name().to_owned_string())
                .collect(),
            ram_options: machine.ram_options().iter().map(|r| r.value()).collect(),
        }
    }
}

fn cmd_machine(path: &Path, name: &str, json: bool) -> Result<()> {
    let db = open_db(path, None)?;
    let machine = db
        .find_machine(name)
        .with_context(|| format!("No machine named '{name}'"))?;
    let summary = MachineSummary::new(machine);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} - {}", summary.name, summary.description);
    println!("  {} {} ({})", summary.year, summary.manufacturer, summary.sourcefile);
    if let Some(parent) = &summary.clone_of {
        println!("  Clone of: {}", parent);
    }
    println!("  Status: {}, emulation: {}", summary.status, summary.emulation);
    for rom in &summary.roms {
        println!(
            "  ROM {:<20} {:>8} {} {}",
            rom.name,
            rom.size,
            rom.crc.as_deref().unwrap_or("--------"),
            rom.status
        );
    }
    for device in &summary.devices {
        println!("  Device {}", device);
    }
    for slot in &summary.slots {
        println!(
            "  Slot {}: {} (default {})",
            slot.name,
            slot.options.join(", "),
            slot.default.as_deref().unwrap_or("none")
        );
    }
    if !summary.software_lists.is_empty() {
        println!("  Software lists: {}", summary.software_lists.join(", "));
    }

    Ok(())
}

fn cmd_run(emulator: &Path, options: &LaunchOptions, chatter: bool, json: bool) -> Result<()> {
    let (tx, events) = crossbeam_channel::unbounded();
    let args = options.arguments();
    tracing::debug!(emulator = %emulator.display(), ?args, "launching");
    let mut session = Session::launch(emulator, &args, tx).context("Failed to launch emulator")?;
    session.set_chatter_enabled(chatter);

    let (line_tx, lines) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut state = StatusState::default();
    let mut stdin_open = true;
    loop {
        let input = if stdin_open { lines.clone() } else { crossbeam_channel::never() };
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                match event {
                    SessionEvent::StatusUpdate(update) => {
                        if json {
                            println!("{}", serde_json::to_string(&update)?);
                        }
                        state.apply(update);
                        if !json {
                            println!(
                                "[{}] {} throttle {:.2}",
                                if state.paused { "paused" } else { "running" },
                                state.speed_text,
                                state.throttle_rate
                            );
                        }
                    }
                    SessionEvent::Chatter { kind, text } => {
                        let arrow = match kind {
                            ChatterType::Command => ">>",
                            ChatterType::GoodResponse => "<<",
                            ChatterType::ErrorResponse => "!!",
                        };
                        eprintln!("{arrow} {text}");
                    }
                    SessionEvent::Responded { response, .. } => {
                        if !response.is_ok() {
                            eprintln!("error: {}", response.text);
                        }
                    }
                    SessionEvent::CommandDropped { command } => {
                        eprintln!("dropped: {}", command.trim_end());
                    }
                    SessionEvent::Completed { success, error_message } => {
                        session.wait_timeout(Duration::from_secs(5)).ok();
                        if !success {
                            anyhow::bail!(error_message.unwrap_or_else(|| "Emulator failed".into()));
                        }
                        return Ok(());
                    }
                }
            }
            recv(input) -> line => match line {
                Ok(line) if !line.trim().is_empty() => {
                    if let Err(e) = session.issue_full_command_line(line.trim()) {
                        tracing::warn!(command = line.trim(), error = %e, "command rejected");
                    }
                }
                Ok(_) => {}
                Err(_) => {
                    // stdin closed
                    stdin_open = false;
                    session.abort().ok();
                }
            },
        }
    }

    session
        .abort_and_wait(Duration::from_secs(5))
        .context("Emulator did not shut down")?;
    Ok(())
}

/// Compile a `list` filter. A pattern without wildcards matches anywhere in the name.
fn name_filter(pattern: &str) -> Result<glob::Pattern> {
    let pattern = if pattern.contains(['*', '?', '[']) {
        pattern.to_owned()
    } else {
        format!("*{pattern}*")
    };
    glob::Pattern::new(&pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))
}

const NAME_MATCH: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        name_filter(pattern).unwrap().matches_with(name, NAME_MATCH)
    }

    #[test]
    fn test_filter_wildcards() {
        assert!(matches("a*b", "abab"));
        assert!(matches("*b", "bab"));
        assert!(matches("pac*", "pacman"));
        assert!(!matches("pac*", "mspacman"));
        assert!(matches("?acman", "pacman"));
        assert!(!matches("a*b", "abba1"));
    }

    #[test]
    fn test_filter_plain_text_is_substring() {
        assert!(matches("man", "mspacman"));
        assert!(matches("PAC", "pacman"));
        assert!(!matches("galaga", "pacman"));
    }

    #[test]
    fn test_filter_rejects_bad_pattern() {
        assert!(name_filter("[a").is_err());
    }
}
