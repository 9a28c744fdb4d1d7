//! `resque` - CLI for the ambulance booking composer and donor registry
//!
//! This binary drives the same handlers a graphical front end would, printing
//! results to stdout and status lines to stderr.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

use resque::booking::BookingComposer;
use resque::cli::{
    BookCommand, Cli, Command, ConfigCommand, DonorCommand, FilterArgs, LocateCommand,
    OutputFormat,
};
use resque::geo::{GeoResolver, NominatimGeocoder};
use resque::handlers::{self, Command as UiCommand};
use resque::storage::{spawn_change_poller, KeyValueStore, SqliteStore};
use resque::{init_logging, Config, DonorRecord, Registry, UuidIds};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Book(cmd) => handle_book(&config, &cmd),
        Command::Locate(cmd) => handle_locate(&config, &cmd).await,
        Command::Donor(cmd) => handle_donor(&config, cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// Print handler output. An error status ends the command with that message.
fn apply(commands: Vec<UiCommand>, format: OutputFormat) -> anyhow::Result<()> {
    let mut failure = None;
    for command in commands {
        match command {
            UiCommand::ShowMessage(text) => println!("{text}\n"),
            UiCommand::OpenUri(uri) | UiCommand::PrefillPickup(uri) => println!("{uri}"),
            UiCommand::ShowStatus { message, is_error } => {
                if is_error {
                    failure = Some(message);
                } else if !message.is_empty() {
                    eprintln!("{message}");
                }
            }
            UiCommand::ShowFieldErrors(report) => {
                for (field, message) in report.iter() {
                    eprintln!("  {field}: {message}");
                }
            }
            UiCommand::RenderDonors(donors) => print_donors(&donors, format)?,
            UiCommand::ClearDonorForm => {}
        }
    }

    match failure {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn handle_book(config: &Config, cmd: &BookCommand) -> anyhow::Result<()> {
    let composer = BookingComposer::new(&config.dispatch);
    let form = cmd.form();
    let now = Utc::now();

    if cmd.json {
        let output = match composer.compose(&form, cmd.resolved.as_deref(), now) {
            Ok(booking) => serde_json::to_value(&booking)?,
            Err(report) => serde_json::json!({ "errors": report }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    apply(
        handlers::on_booking_submit(&composer, &form, cmd.resolved.as_deref(), now),
        OutputFormat::Plain,
    )
}

async fn handle_locate(config: &Config, cmd: &LocateCommand) -> anyhow::Result<()> {
    let device = cmd
        .device()
        .ok_or_else(|| anyhow!("pass --lat and --lon, --unavailable, or --denied"))?;
    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    let resolver = GeoResolver::new(Arc::new(device), Arc::new(geocoder));
    let timeout = cmd
        .timeout_ms
        .map_or_else(|| config.geocode_timeout(), Duration::from_millis);

    apply(vec![handlers::on_locate_started()], OutputFormat::Plain)?;
    apply(
        handlers::on_locate(&resolver, timeout).await,
        OutputFormat::Plain,
    )
}

fn open_registry(config: &Config) -> anyhow::Result<Registry<Arc<SqliteStore>>> {
    let path = config.database_path();
    debug!(path = %path.display(), "Opening donor registry");
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open registry at {}", path.display()))?;
    Ok(Registry::new(Arc::new(store), &config.storage.registry_key))
}

async fn handle_donor(config: &Config, cmd: DonorCommand) -> anyhow::Result<()> {
    let registry = open_registry(config)?;

    match cmd {
        DonorCommand::Register(register) => apply(
            handlers::on_donor_submit(&registry, &register.form(), &UuidIds, Utc::now()),
            OutputFormat::Table,
        ),
        DonorCommand::List(list) => apply(
            handlers::on_donor_search(&registry, &list.filter.query()),
            list.format,
        ),
        DonorCommand::Stats { json } => {
            let stats = registry.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Donor registry");
                println!("--------------");
                println!("Database:  {}", config.database_path().display());
                println!("Donors:    {}", stats.total);
                for (group, count) in &stats.by_group {
                    println!("  {group:<4} {count}");
                }
                if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                    println!("Oldest:    {}", oldest.to_rfc3339());
                    println!("Newest:    {}", newest.to_rfc3339());
                }
            }
            Ok(())
        }
        DonorCommand::Watch(filter) => watch_donors(config, &registry, &filter).await,
    }
}

async fn watch_donors(
    config: &Config,
    registry: &Registry<Arc<SqliteStore>>,
    filter: &FilterArgs,
) -> anyhow::Result<()> {
    let query = filter.query();
    let mut events = registry.store().subscribe();
    let (poller, task) = spawn_change_poller(Arc::clone(registry.store()), config.poll_interval());

    apply(handlers::on_donor_search(registry, &query), OutputFormat::Table)?;
    let mut last = registry.fingerprint()?;
    info!("Watching donor registry, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let current = registry.fingerprint()?;
                if current == last {
                    debug!("Registry unchanged, skipping re-render");
                    continue;
                }
                last = current;
                println!();
                apply(
                    handlers::on_storage_event(registry, &event, &query),
                    OutputFormat::Table,
                )?;
            }
        }
    }

    poller.stop();
    task.await?;
    Ok(())
}

fn print_donors(donors: &[DonorRecord], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(donors)?),
        OutputFormat::Plain => {
            for donor in donors {
                println!(
                    "{} ({}) {} {}",
                    donor.name, donor.blood_group, donor.phone, donor.city
                );
                if !donor.notes.is_empty() {
                    println!("  {}", donor.notes);
                }
            }
        }
        OutputFormat::Table => {
            if donors.is_empty() {
                return Ok(());
            }
            println!(
                "{:<24} {:<5} {:<16} {:<16} NOTES",
                "NAME", "GROUP", "PHONE", "CITY"
            );
            for donor in donors {
                println!(
                    "{:<24} {:<5} {:<16} {:<16} {}",
                    donor.name,
                    donor.blood_group.as_str(),
                    donor.phone,
                    donor.city,
                    donor.notes
                );
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Dispatch]");
                println!("  Base URL:       {}", config.dispatch.base_url);
                println!("  Destination:    {}", config.dispatch.destination);
                println!("  Title:          {}", config.dispatch.title);
                println!();
                println!("[Geocoder]");
                println!("  Endpoint:       {}", config.geocoder.endpoint);
                println!("  Timeout (ms):   {}", config.geocoder.timeout_ms);
                println!("  User agent:     {}", config.geocoder.user_agent);
                println!();
                println!("[Storage]");
                println!("  Database path:  {}", config.database_path().display());
                println!("  Registry key:   {}", config.storage.registry_key);
                println!("  Poll (ms):      {}", config.storage.poll_interval_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
