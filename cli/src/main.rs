mod commands;
mod config;
mod server;

use anyhow::Result;
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    LogEntry, cmd_bg_list, cmd_bg_log, cmd_chart, cmd_graph_list, cmd_graph_show, cmd_history,
    cmd_log, cmd_spike_factor, cmd_stats, cmd_user_add, cmd_user_show, cmd_variability,
    parse_utc_offset,
};
use crate::config::Config;
use sugarlog_core::models::Granularity;
use sugarlog_core::service::SugarService;

#[derive(Parser)]
#[command(
    name = "sugarlog",
    version,
    about = "Track sugar intake and blood sugar, and chart it over time"
)]
struct Cli {
    /// UTC offset used for calendar days (e.g. +07:00, -05:00, Z)
    #[arg(
        long,
        global = true,
        default_value = "+00:00",
        value_parser = offset_arg,
        allow_hyphen_values = true
    )]
    utc_offset: FixedOffset,
    #[command(subcommand)]
    command: Commands,
}

fn offset_arg(s: &str) -> Result<FixedOffset, String> {
    parse_utc_offset(s).map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Log a sugar consumption entry
    Log {
        /// User ID
        user: i64,
        /// Sugar in grams (omit when unknown)
        sugar: Option<f64>,
        /// What was consumed (e.g. "soda", "cake")
        #[arg(short = 't', long = "type", default_value = "other")]
        category: String,
        /// Amount consumed (grams or millilitres)
        #[arg(short, long)]
        amount: Option<f64>,
        /// Free-form context (e.g. "after lunch")
        #[arg(short, long)]
        context: Option<String>,
        /// When it was consumed (RFC 3339 or "YYYY-MM-DD HH:MM", default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List consumption entries
    History {
        /// User ID
        user: i64,
        /// First day (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        start: Option<String>,
        /// Last day (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record and list blood sugar readings
    Bg {
        #[command(subcommand)]
        command: BgCommands,
    },
    /// Build a sugar chart and store it as a graph
    Chart {
        /// Bucket size: daily, weekly or monthly
        granularity: Granularity,
        /// User ID
        user: i64,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stored graphs
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },
    /// Show rolling sugar totals and risk for a day (defaults to today)
    Stats {
        /// User ID
        user: i64,
        /// Anchor date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show blood sugar variability over a date range
    Variability {
        /// User ID
        user: i64,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add {
        /// Email address (unique)
        email: String,
        /// Full name
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user
    Show {
        /// User ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BgCommands {
    /// Record a blood sugar reading in mg/dL
    Log {
        /// User ID
        user: i64,
        /// Reading in mg/dL
        value: f64,
        /// Measurement date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Measurement time (HH:MM, default: midnight)
        #[arg(long)]
        time: Option<String>,
        /// Context (e.g. "fasting", "after dinner")
        #[arg(short, long)]
        context: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List blood sugar readings
    List {
        /// User ID
        user: i64,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GraphCommands {
    /// Show one stored graph
    Show {
        /// Graph ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a user's graphs, newest first
    List {
        /// User ID
        user: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show or set the expected blood sugar rise per gram of sugar
    SpikeFactor {
        /// New factor in mg/dL per gram
        value: Option<f64>,
        /// Restore the default factor
        #[arg(long)]
        reset: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sugarlog=info,sugarlog_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = SugarService::new(&config.db_path)?.with_offset(cli.utc_offset);

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add { email, name, json } => cmd_user_add(&svc, &email, name, json),
            UserCommands::Show { id, json } => cmd_user_show(&svc, id, json),
        },
        Commands::Log {
            user,
            sugar,
            category,
            amount,
            context,
            at,
            json,
        } => cmd_log(
            &svc,
            user,
            LogEntry {
                sugar_g: sugar,
                category,
                amount,
                context,
                at,
            },
            json,
        ),
        Commands::History {
            user,
            start,
            end,
            json,
        } => cmd_history(&svc, user, start, end, json),
        Commands::Bg { command } => match command {
            BgCommands::Log {
                user,
                value,
                date,
                time,
                context,
                json,
            } => cmd_bg_log(
                &svc,
                user,
                value,
                date,
                time.as_deref(),
                context.as_deref(),
                json,
            ),
            BgCommands::List {
                user,
                start,
                end,
                json,
            } => cmd_bg_list(&svc, user, start, end, json),
        },
        Commands::Chart {
            granularity,
            user,
            start,
            end,
            json,
        } => cmd_chart(&svc, granularity, user, &start, &end, json),
        Commands::Graph { command } => match command {
            GraphCommands::Show { id, json } => cmd_graph_show(&svc, id, json),
            GraphCommands::List { user, json } => cmd_graph_list(&svc, user, json),
        },
        Commands::Stats { user, date, json } => cmd_stats(&svc, user, date, json),
        Commands::Variability {
            user,
            start,
            end,
            json,
        } => cmd_variability(&svc, user, &start, &end, json),
        Commands::Config { command } => match command {
            ConfigCommands::SpikeFactor { value, reset, json } => {
                cmd_spike_factor(&svc, value, reset, json)
            }
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(svc, port, &bind, api_key, new_api_key).await
        }
    }
}
