//! Command line interface for the `evolv` binary.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;

use crate::client::{ApiClient, AppController, TerminalRenderer};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::forecast::Scenario;
use crate::impact::{
    DataCenterSpec, DataCenterTier, DataSources, FallbackDataSources, HttpDataSources,
    WATER_GALLONS_PER_SERVER,
};
use crate::llm::LlmClient;
use crate::notifications::PushMessage;
use crate::server::{AppState, GatewayServer};
use crate::state::{SqliteStateStore, StateStore};
use crate::stream::{SessionState, StreamSession};

#[derive(Parser, Debug)]
#[command(name = "evolv", version)]
#[command(about = "Data center impact analyzer gateway and terminal client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the API gateway
    Serve {
        /// Disable the random demo notifications
        #[arg(long)]
        no_demo: bool,
    },

    /// Stream an impact analysis for a location
    Analyze {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Size preset: small, medium, large, mega
        #[arg(long)]
        size: Option<String>,
        /// Custom power draw in MW (switches to custom figures)
        #[arg(long)]
        power_mw: Option<f64>,
        #[arg(long)]
        servers: Option<u32>,
        #[arg(long)]
        square_feet: Option<u32>,
        #[arg(long)]
        employees: Option<u32>,
    },

    /// Stream a growth forecast for a location
    Forecast {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, default_value = "5")]
        years: u32,
        /// conservative, moderate, aggressive
        #[arg(long, default_value = "moderate")]
        scenario: String,
        /// Starting size preset
        #[arg(long, default_value = "small")]
        size: String,
    },

    /// Ask the team assistant a question
    Ask {
        #[arg(long)]
        team: String,
        #[arg(long)]
        question: String,
    },

    /// List teams
    Teams,

    /// List notifications
    Notifications {
        /// Mark every notification read first
        #[arg(long)]
        read_all: bool,
    },

    /// Follow live notifications
    Watch,

    /// Inspect or clear the persisted client state
    State {
        #[command(subcommand)]
        action: StateCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum StateCommands {
    /// Show the cached selection
    Show,
    /// Forget the cached selection
    Clear,
}

fn tier(name: &str) -> AppResult<DataCenterTier> {
    DataCenterTier::from_name(name).ok_or_else(|| AppError::Validation {
        message: format!("Unknown size preset '{}'", name),
    })
}

fn session_exit_code(session: &StreamSession) -> i32 {
    match session.state() {
        SessionState::Completed => 0,
        _ => 1,
    }
}

/// Execute a parsed command, returning the process exit code
pub async fn run(cli: Cli, config: Config) -> AppResult<i32> {
    match cli.command {
        Commands::Serve { no_demo } => serve(config, !no_demo).await,
        Commands::Analyze {
            lat,
            lng,
            size,
            power_mw,
            servers,
            square_feet,
            employees,
        } => {
            let mut controller = controller(&config).await?;
            controller.select_location(lat, lng).await?;

            if let Some(power_mw) = power_mw {
                let servers = servers.unwrap_or(1_000);
                controller
                    .set_custom_config(DataCenterSpec {
                        name: "Custom Data Center".to_string(),
                        power_mw,
                        servers,
                        square_feet: square_feet.unwrap_or(50_000),
                        water_gallons_per_day: servers as u64 * WATER_GALLONS_PER_SERVER,
                        employees: employees.unwrap_or(50),
                    })
                    .await?;
            } else if let Some(size) = size {
                controller.select_preset(tier(&size)?).await?;
            } else if controller.state().config.is_none() {
                controller.select_preset(DataCenterTier::Medium).await?;
            }

            let mut renderer = TerminalRenderer::new(io::stdout());
            let session = controller.analyze_impact(&mut renderer).await?;
            Ok(session_exit_code(&session))
        }
        Commands::Forecast {
            lat,
            lng,
            years,
            scenario,
            size,
        } => {
            let mut controller = controller(&config).await?;
            controller.select_location(lat, lng).await?;
            controller.set_forecast_years(years);
            controller.set_forecast_scenario(Scenario::from_name(&scenario).ok_or_else(|| {
                AppError::Validation {
                    message: format!("Unknown scenario '{}'", scenario),
                }
            })?);
            controller.set_forecast_size(tier(&size)?);

            let mut renderer = TerminalRenderer::new(io::stdout());
            let session = controller.run_forecast(&mut renderer).await?;
            Ok(session_exit_code(&session))
        }
        Commands::Ask { team, question } => {
            let answer = api(&config)?.ask(&team, &question).await?;
            println!("{}", answer);
            Ok(0)
        }
        Commands::Teams => {
            for team in api(&config)?.teams().await? {
                println!(
                    "{:<10} {:<14} lead: {:<13} members: {:<3} focus: {}",
                    team.id, team.name, team.lead, team.members, team.focus
                );
            }
            Ok(0)
        }
        Commands::Notifications { read_all } => {
            let api = api(&config)?;
            if read_all {
                api.mark_all_read().await?;
            }
            for n in api.notifications().await? {
                let marker = if n.unread { "●" } else { " " };
                println!("{} [{}] {} {} ({})", marker, n.kind, n.title, n.message, n.time);
            }
            Ok(0)
        }
        Commands::Watch => {
            api(&config)?
                .watch_notifications(|message| {
                    let line = match message {
                        PushMessage::Connected { message } => message,
                        PushMessage::Notification { data } => {
                            format!("[{}] {}: {}", data.kind, data.title, data.message)
                        }
                    };
                    let mut stdout = io::stdout().lock();
                    writeln!(stdout, "{}", line).is_ok()
                })
                .await?;
            Ok(0)
        }
        Commands::State { action } => {
            let store = SqliteStateStore::new(&config.state).await?;
            match action {
                StateCommands::Show => {
                    let state = store.load().await?;
                    match state.cache_info(Utc::now()) {
                        Some(info) => {
                            println!(
                                "Location: {:.4}, {:.4}",
                                info.location.lat, info.location.lng
                            );
                            println!("Facility: {}", info.config.spec.name);
                            println!("Saved: {}", info.age);
                        }
                        None => println!("No cached selection"),
                    }
                    if state.last_analysis.is_some() {
                        println!("Last analysis: available");
                    }
                }
                StateCommands::Clear => {
                    store.clear().await?;
                    println!("Cleared cached state");
                }
            }
            Ok(0)
        }
    }
}

fn api(config: &Config) -> AppResult<ApiClient> {
    Ok(ApiClient::from_config(config)?)
}

async fn controller(config: &Config) -> AppResult<AppController> {
    let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::new(&config.state).await?);
    AppController::load(api(config)?, store).await
}

async fn serve(config: Config, demo: bool) -> AppResult<i32> {
    let llm = LlmClient::new(&config.llm, config.request.clone())?;
    if !llm.is_configured() {
        tracing::warn!("XAI_API_KEY is not set; AI routes will report errors");
    }

    let sources: Arc<dyn DataSources> = if config.data.has_any_key() {
        Arc::new(HttpDataSources::new(&config.data, &config.request)?)
    } else {
        tracing::info!("No data API keys set; impact analyses use fallback figures");
        Arc::new(FallbackDataSources)
    };

    let state = Arc::new(AppState::new(config, llm, sources));
    GatewayServer::new(state)
        .with_demo_notifications(demo)
        .serve()
        .await?;
    Ok(0)
}
