mod commands;
mod context;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use fieldmon_core::{Presence, StoreId};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fieldmon")]
#[command(about = "Field visit tracking for retail stores")]
struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List catalog stores with their current presence state
    Stores {
        /// Only show stores in this state
        #[arg(long, value_enum)]
        state: Option<PresenceArg>,
    },
    /// Show visits, the open task and plans for one store
    Show { store: StoreId },
    /// Record a visit
    Visit {
        store: StoreId,
        /// Visit date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Who made the visit; defaults to FIELDMON_OBSERVER
        #[arg(long)]
        observer: Option<String>,
        #[arg(long, default_value = "")]
        comment: String,
        /// Our office's product was present
        #[arg(long)]
        ours: bool,
        /// Another office's product was present
        #[arg(long)]
        others: bool,
    },
    /// Schedule a future visit
    Plan {
        store: StoreId,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Close the open task for a store
    CompleteTask { store: StoreId },
    /// Override a store's coordinates
    #[command(allow_negative_numbers = true)]
    Move { store: StoreId, lat: f64, lng: f64 },
    /// Summarise the recency window
    Stats {
        /// Include a per-day breakdown
        #[arg(long)]
        daily: bool,
    },
    /// Poll the ledger and print presence counts until interrupted
    Watch {
        /// Seconds between refreshes; defaults to FIELDMON_POLL_INTERVAL_SECS
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PresenceArg {
    Our,
    Other,
    Editing,
    None,
}

impl From<PresenceArg> for Presence {
    fn from(arg: PresenceArg) -> Self {
        match arg {
            PresenceArg::Our => Presence::Our,
            PresenceArg::Other => Presence::Other,
            PresenceArg::Editing => Presence::Editing,
            PresenceArg::None => Presence::None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = fieldmon_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("fieldmon ready; run with --help to list commands");
        return Ok(());
    };

    let mut session = context::open_session(&config).await?;
    let today = session.policy().today();
    let json = cli.json;

    match command {
        Commands::Stores { state } => {
            commands::run_stores(&session, today, state.map(Presence::from), json)?;
        }
        Commands::Show { store } => commands::run_show(&session, &store, json)?,
        Commands::Visit {
            store,
            date,
            observer,
            comment,
            ours,
            others,
        } => {
            let input = fieldmon_client::VisitInput {
                store_id: store,
                date: date.unwrap_or(today),
                observer: observer.unwrap_or_else(|| config.default_observer.clone()),
                comment,
                our_presence: ours,
                other_presence: others,
            };
            commands::run_visit(&mut session, input, today).await?;
        }
        Commands::Plan { store, date, note } => {
            commands::run_plan(&mut session, store, date, note).await?;
        }
        Commands::CompleteTask { store } => {
            commands::run_complete_task(&mut session, &store).await?;
        }
        Commands::Move { store, lat, lng } => {
            commands::run_move(&mut session, &store, lat, lng).await?;
        }
        Commands::Stats { daily } => commands::run_stats(&session, today, daily, json)?,
        Commands::Watch { interval_secs } => {
            let interval = interval_secs.unwrap_or(config.poll_interval_secs).max(1);
            commands::run_watch(&mut session, std::time::Duration::from_secs(interval)).await;
        }
    }

    Ok(())
}
