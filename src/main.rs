mod config;
mod db;
mod error;
mod export;
mod models;
mod position;
mod processor;
mod store;

use anyhow::{bail, Context};
use chrono::Local;
use config::AppConfig;
use position::feed::FeedProvider;
use position::PositionSource;
use processor::trip_engine::{SampleOutcome, TripEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use store::sqlite::SqliteStore;
use store::PersistenceStore;
use tracing::{error, info, warn};

const USAGE: &str = "usage: trip-tracker <start ODOMETER PURPOSE... | track | end ODOMETER | status | history | export [PATH] | delete ID>";

#[derive(Debug, PartialEq)]
enum Command {
    Start { odometer: f64, purpose: String },
    Track,
    End { odometer: f64 },
    Status,
    History,
    Export { path: Option<PathBuf> },
    Delete { id: String },
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let odometer = |raw: Option<&String>| -> anyhow::Result<f64> {
            let raw = raw.context(USAGE)?;
            raw.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid odometer reading '{}'", raw))
        };

        match args.first().map(String::as_str) {
            Some("start") => {
                let odometer = odometer(args.get(1))?;
                let purpose = args[2..].join(" ");
                if purpose.trim().is_empty() {
                    bail!("a trip purpose is required\n{}", USAGE);
                }
                Ok(Command::Start { odometer, purpose })
            }
            Some("track") => Ok(Command::Track),
            Some("end") => Ok(Command::End {
                odometer: odometer(args.get(1))?,
            }),
            Some("status") => Ok(Command::Status),
            Some("history") => Ok(Command::History),
            Some("export") => Ok(Command::Export {
                path: args.get(1).map(PathBuf::from),
            }),
            Some("delete") => Ok(Command::Delete {
                id: args.get(1).context(USAGE)?.clone(),
            }),
            _ => bail!(USAGE),
        }
    }
}

fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Applies position events until Ctrl-C or until the subscription ends.
async fn track(engine: &mut TripEngine) -> anyhow::Result<()> {
    if engine.current_trip().is_none() {
        println!("No active trip");
        return Ok(());
    }

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; the trip stays active and resumes on next start");
                break;
            }
            event = engine.process_next() => event,
        };

        match event {
            None => {
                warn!("Position subscription closed");
                break;
            }
            Some(Ok(SampleOutcome::Applied)) => {
                if let Some(trip) = engine.current_trip() {
                    info!(
                        "{:.2} km, {}, {:.1} km/h",
                        trip.distance_km,
                        format_duration(trip.duration_seconds),
                        trip.average_speed_kmh
                    );
                }
            }
            Some(Ok(SampleOutcome::SourceError(e))) => warn!("GPS: {}", e),
            Some(Ok(_)) => {}
            Some(Err(e)) => error!("Failed to apply position update: {}", e),
        }
    }

    let counters = engine.counters();
    info!(
        "Tracking stopped: {} accepted, {} out of order, {} rejected, {} invalid fixes discarded",
        counters.accepted,
        counters.stale,
        counters.rejected,
        engine.position().discarded()
    );
    if engine.position().is_tracking() {
        engine.suspend();
    }
    Ok(())
}

fn print_status(engine: &TripEngine) {
    let Some(trip) = engine.current_trip() else {
        println!("No active trip ({} completed)", engine.history().len());
        return;
    };

    println!("{:?} trip {} ({})", engine.state(), trip.id, trip.purpose);
    println!("  distance:  {:.2} km", trip.distance_km);
    println!("  duration:  {}", format_duration(trip.duration_seconds));
    println!("  avg speed: {:.1} km/h", trip.average_speed_kmh);
    println!("  odometer:  {}", trip.start_odometer);
    println!("  points:    {}", trip.route.len());
    if let Some(point) = engine.position().last_sample().or(trip.last_point()) {
        println!("  GPS:       {} (±{:.0} m)", point.accuracy_grade(), point.accuracy);
    }
    println!("  permission: {:?}", engine.position().permission());
    if let Some(e) = engine.position().last_error() {
        println!("  last GPS error: {}", e);
    }
    for diagnostic in engine.diagnostics() {
        println!("  storage warning: {}", diagnostic);
    }
}

fn print_history(engine: &TripEngine) {
    if engine.history().is_empty() {
        println!("No completed trips");
        return;
    }
    for trip in engine.history() {
        println!(
            "{}  {}  {:.2} km  {}  {:.1} km/h  odometer {} -> {} ({})",
            trip.id,
            trip.purpose,
            trip.distance_km,
            format_duration(trip.duration_seconds),
            trip.average_speed_kmh,
            trip.start_odometer,
            trip.end_odometer.map(|v| v.to_string()).unwrap_or_default(),
            trip.odometer_distance()
                .map(|d| format!("{:.1} driven", d))
                .unwrap_or_default()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    info!("Opened trip database");

    let store: Arc<dyn PersistenceStore> = Arc::new(SqliteStore::new(pool));
    let provider = Arc::new(FeedProvider::new(
        &config.position_feed,
        Duration::from_millis(config.feed_poll_interval_ms),
    ));
    let source = PositionSource::new(provider, config.continuous_options());
    let mut engine = TripEngine::init(store, source, config.one_shot_options()).await?;

    match command {
        Command::Start { odometer, purpose } => {
            let trip = match engine.start_trip(&purpose, odometer).await {
                Ok(trip) => trip,
                Err(e) if e.is_state_error() => {
                    bail!("{}; finish it first with `trip-tracker end ODOMETER`", e)
                }
                Err(e) => return Err(e.into()),
            };
            println!("Started trip {} ({})", trip.id, trip.purpose);
            track(&mut engine).await?;
        }
        Command::Track => track(&mut engine).await?,
        Command::End { odometer } => {
            let trip = engine.end_trip(odometer).await?;
            println!(
                "Trip completed: {:.2} km in {} ({:.1} km/h)",
                trip.distance_km,
                format_duration(trip.duration_seconds),
                trip.average_speed_kmh
            );
        }
        Command::Status => print_status(&engine),
        Command::History => print_history(&engine),
        Command::Export { path } => {
            let path = path.unwrap_or_else(|| {
                PathBuf::from(export::export_file_name(Local::now().date_naive()))
            });
            let csv = export::to_csv(engine.history(), &Local);
            tokio::fs::write(&path, csv).await?;
            println!("Exported {} trips to {}", engine.history().len(), path.display());
        }
        Command::Delete { id } => {
            if engine.delete_trip(&id).await? {
                println!("Deleted trip {}", id);
            } else {
                println!("No completed trip with id {}", id);
            }
        }
    }

    engine.suspend();
    Ok(())
}
