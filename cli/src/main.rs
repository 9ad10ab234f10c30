mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_calibrate, cmd_calibrate_all, cmd_calibration_history, cmd_food_delete, cmd_food_history,
    cmd_food_log, cmd_food_summary, cmd_import_logs, cmd_target_set, cmd_target_show,
    cmd_user_add, cmd_user_delete, cmd_user_list, cmd_user_switch, cmd_weight_delete,
    cmd_weight_history, cmd_weight_log, resolve_user,
};
use crate::config::Config;
use bob_core::service::BobService;

#[derive(Parser)]
#[command(
    name = "bob",
    version,
    about = "A diet coach that learns your metabolism",
    long_about = "\n\n  ██████╗  ██████╗ ██████╗
  ██╔══██╗██╔═══██╗██╔══██╗
  ██████╔╝██║   ██║██████╔╝
  ██╔══██╗██║   ██║██╔══██╗
  ██████╔╝╚██████╔╝██████╔╝
  ╚═════╝  ╚═════╝ ╚═════╝
   targets that learn from your logs.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage user profiles
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage the daily calorie target
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Log meals and review daily intake
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Recalibrate calorie targets from recent logs
    Calibrate {
        /// Profile to calibrate (default: current user)
        #[arg(short, long, conflicts_with = "all")]
        user: Option<String>,
        /// Calibrate every profile
        #[arg(long)]
        all: bool,
        /// Analysis window in days
        #[arg(short, long, default_value = "14")]
        window: i64,
        /// Preview the adjustment without applying it
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show past target adjustments
    History {
        /// Profile to show (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import data from external sources
    Import {
        #[command(subcommand)]
        command: ImportCommands,
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
enum ImportCommands {
    /// Import food or weight logs from a CSV export (kind detected from the header)
    Logs {
        /// Path to the CSV file
        file: std::path::PathBuf,
        /// Profile to import into (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a profile
    Add {
        /// Profile name
        name: String,
        /// Goal: lose, maintain, gain
        #[arg(short, long, default_value = "maintain")]
        goal: String,
        /// Starting daily calorie target
        #[arg(short, long, default_value = "2000")]
        calories: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a profile and all its logs
    Delete {
        /// Profile name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a profile the default for other commands
    Switch {
        /// Profile name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TargetCommands {
    /// Set the daily calorie target by hand
    Set {
        /// Daily calorie target
        calories: i64,
        /// Profile to update (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current target
    Show {
        /// Profile to show (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Profile to log for (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history
    History {
        /// Number of days to show (default: all)
        #[arg(short, long)]
        days: Option<u32>,
        /// Profile to show (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Weight entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log a meal
    Log {
        /// Meal label: breakfast, lunch, dinner, snack
        meal: String,
        /// Total calories for the meal
        calories: f64,
        /// What was eaten (free-form item names)
        items: Vec<String>,
        /// Total protein in grams
        #[arg(long)]
        protein: Option<f64>,
        /// Total carbs in grams
        #[arg(long)]
        carbs: Option<f64>,
        /// Total fat in grams
        #[arg(long)]
        fat: Option<f64>,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Profile to log for (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's meals and totals (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Profile to show (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show food entries for the last N days
    History {
        /// Number of days to show (default: all)
        #[arg(short, long)]
        days: Option<u32>,
        /// Profile to show (default: current user)
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food entry by ID
    Delete {
        /// Food entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = BobService::open(&config.db_path())?;

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add {
                name,
                goal,
                calories,
                json,
            } => cmd_user_add(&svc, &name, &goal, calories, json),
            UserCommands::List { json } => cmd_user_list(&svc, json),
            UserCommands::Delete { name, json } => cmd_user_delete(&svc, &name, json),
            UserCommands::Switch { name, json } => cmd_user_switch(&svc, &name, json),
        },
        Commands::Target { command } => match command {
            TargetCommands::Set {
                calories,
                user,
                json,
            } => {
                let user = resolve_user(&svc, user)?;
                cmd_target_set(&svc, &user, calories, json)
            }
            TargetCommands::Show { user, json } => {
                let user = resolve_user(&svc, user)?;
                cmd_target_show(&svc, &user, json)
            }
        },
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                user,
                json,
            } => {
                let user = resolve_user(&svc, user)?;
                cmd_weight_log(&svc, &user, value, &unit, date, json)
            }
            WeightCommands::History { days, user, json } => {
                let user = resolve_user(&svc, user)?;
                cmd_weight_history(&svc, &user, days, json)
            }
            WeightCommands::Delete { id, json } => cmd_weight_delete(&svc, id, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Log {
                meal,
                calories,
                items,
                protein,
                carbs,
                fat,
                date,
                user,
                json,
            } => {
                let user = resolve_user(&svc, user)?;
                cmd_food_log(
                    &svc, &user, &meal, &items, calories, protein, carbs, fat, date, json,
                )
            }
            FoodCommands::Summary { date, user, json } => {
                let user = resolve_user(&svc, user)?;
                cmd_food_summary(&svc, &user, date, json)
            }
            FoodCommands::History { days, user, json } => {
                let user = resolve_user(&svc, user)?;
                cmd_food_history(&svc, &user, days, json)
            }
            FoodCommands::Delete { id, json } => cmd_food_delete(&svc, id, json),
        },
        Commands::Calibrate {
            user,
            all,
            window,
            dry_run,
            json,
        } => {
            if all {
                cmd_calibrate_all(&svc, window, dry_run, json)
            } else {
                let user = resolve_user(&svc, user)?;
                cmd_calibrate(&svc, &user, window, dry_run, json)
            }
        }
        Commands::History { user, json } => {
            let user = resolve_user(&svc, user)?;
            cmd_calibration_history(&svc, &user, json)
        }
        Commands::Import { command } => match command {
            ImportCommands::Logs {
                file,
                user,
                dry_run,
                json,
            } => {
                let user = resolve_user(&svc, user)?;
                cmd_import_logs(&svc, &user, &file, dry_run, json)
            }
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let key = config.api_key()?;
                if key.is_new() {
                    eprintln!("Generated new API key: {}", key.reveal());
                    eprintln!("Include in requests: Authorization: Bearer {}", key.reveal());
                }
                Some(key)
            };
            server::start_server(svc, port, &bind, api_key).await
        }
    }
}
