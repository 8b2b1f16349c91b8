mod commands;

use std::io::{self, Write};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{CommandFactory, Parser};
use commands::{Cli, Commands, StagingCommand};
use easyscan::db::{request_repo, transfer_repo};
use easyscan::sanitize::{redact_host, redact_path};
use easyscan::{load_config, Config, Database, Dispatcher};
use serde::Serialize;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    easyscan::logging::init_tracing(&config.logging)?;

    match args.command {
        Some(Commands::CheckConfig) => check_config(&config),
        Some(Commands::Recent { limit }) => recent(&config, limit),
        Some(Commands::Stats { from, to }) => stats(&config, from, to),
        Some(Commands::Resend { id }) => resend(&config, id).await,
        Some(Commands::Staging { command }) => staging(&config, command),
        None => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    }
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config.database.resolved_path();
    Database::open(&path).with_context(|| format!("opening database {}", redact_path(&path)))
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration OK (version {})", config.version);
    println!("  database:        {}", redact_path(&config.database.resolved_path()));
    println!("  staging:         {}", redact_path(&config.staging.resolved_directory()));
    println!(
        "  remote:          {}:{} ({:?})",
        redact_host(&config.remote.host),
        config.remote.port,
        config.remote.host_key_policy
    );
    println!("  remote data:     {}", config.remote.data_directory);
    println!("  remote count:    {}", config.remote.count_directory);
    println!("  identity domain: {}", config.identity.required_domain);
    println!("  debug:           {}", config.debug);
    Ok(())
}

fn recent(config: &Config, limit: u64) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let records = request_repo::recent(&db, limit)?;
    if records.is_empty() {
        println!("No scan requests");
    }
    for record in records {
        println!(
            "{}  {}",
            record.created_at().format("%Y-%m-%d %H:%M:%S"),
            record
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport {
    date_begin: NaiveDate,
    date_end: NaiveDate,
    count: u64,
}

/// First and last second of the local calendar days `from..=to`, in UTC.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    if to < from {
        return Err(anyhow!("--to ({}) is before --from ({})", to, from));
    }
    let start = Local
        .from_local_datetime(&from.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| anyhow!("{} has no local midnight", from))?;
    let end_time = NaiveTime::from_hms_opt(23, 59, 59).ok_or_else(|| anyhow!("invalid time"))?;
    let end = Local
        .from_local_datetime(&to.and_time(end_time))
        .latest()
        .ok_or_else(|| anyhow!("{} has no local end of day", to))?;
    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

fn stats(config: &Config, from: NaiveDate, to: NaiveDate) -> anyhow::Result<()> {
    let (start, end) = day_bounds(from, to)?;
    let db = open_database(config)?;
    let count = request_repo::count_between(&db, start, end)?;
    let report = StatsReport {
        date_begin: from,
        date_end: to,
        count,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn resend(config: &Config, id: i64) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let dispatcher = Dispatcher::from_config(config, db);
    match dispatcher.resend(id).await {
        Ok(pair) => {
            info!(request_id = id, stem = %pair.stem(), "Resend complete");
            println!("Sent {} and {}", pair.data_file_name(), pair.count_file_name());
            Ok(())
        }
        Err(e) => {
            error!(request_id = id, error = %e, "Resend failed");
            Err(e.into())
        }
    }
}

fn staging(config: &Config, command: StagingCommand) -> anyhow::Result<()> {
    let staging_area = easyscan::TransferStaging::new(config.staging.resolved_directory());
    match command {
        StagingCommand::List => {
            let entries = staging_area.entries()?;
            if entries.is_empty() {
                println!("Staging directory is empty");
            }
            for entry in entries {
                println!("{}", entry);
            }
            let unsent = transfer_repo::count_unsent(&open_database(config)?)?;
            if unsent > 0 {
                println!("{} request(s) whose last transfer failed; see `resend`", unsent);
            }
            Ok(())
        }
        StagingCommand::Clear { yes } => {
            let entries = staging_area.entries()?;
            if entries.is_empty() {
                println!("Staging directory is empty");
                return Ok(());
            }
            for entry in &entries {
                println!("{}", entry);
            }
            if !yes && !prompt_confirm("Remove these staged files?", Some(false))? {
                return Ok(());
            }
            let removed = staging_area.clear()?;
            info!(count = removed.len(), "Staging directory cleared");
            println!("Removed {} file(s)", removed.len());
            Ok(())
        }
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => {
                if let Some(value) = default {
                    return Ok(value);
                }
            }
            _ => {}
        }
        println!("Please answer y or n.");
    }
}
