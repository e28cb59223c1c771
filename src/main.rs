//! Restaurant POS service - main entry point
//!
//! One binary serves the HTTP API and runs the scheduled batch jobs
//! (analytics rollup, weekly recommendation, stale-order cleanup) as
//! subcommands so cron or a systemd timer can drive them.

use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use restaurant_pos::analytics::generate_reports;
use restaurant_pos::auth::TokenService;
use restaurant_pos::clock;
use restaurant_pos::config::AppConfig;
use restaurant_pos::db::Database;
use restaurant_pos::email::build_mailer;
use restaurant_pos::face::HttpFaceEmbedder;
use restaurant_pos::http::{serve, shutdown_signal, AppState};
use restaurant_pos::job_span;
use restaurant_pos::llm::build_provider;
use restaurant_pos::observability::{init_default_logging, metrics, HealthChecker};
use restaurant_pos::orders::{cancel_stale_pending_orders, seed_order_history};
use restaurant_pos::recommendation::{generate_weekly_recommendation, RecommendationOutcome};
use restaurant_pos::users;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Restaurant ordering, POS and analytics service
#[derive(Parser)]
#[command(name = "restaurant-pos")]
#[command(about = "Restaurant ordering, point-of-sale and sales analytics service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Write daily, weekly, monthly and yearly KPI snapshots
    GenerateAnalytics {
        /// Treat this local date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Write the weekly recommendation for the newest weekly snapshot
    GenerateRecommendation,
    /// Cancel pending orders older than the configured timeout
    CancelStaleOrders,
    /// Generate synthetic completed-order history
    Seed {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// RNG seed for a reproducible history
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Create an active admin account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting restaurant-pos v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => run_server(config).await,
        Commands::GenerateAnalytics { today } => {
            timed_job("generate_analytics", generate_analytics(&config, today)).await
        }
        Commands::GenerateRecommendation => {
            timed_job("generate_recommendation", generate_recommendation(&config)).await
        }
        Commands::CancelStaleOrders => {
            timed_job("cancel_stale_orders", cancel_stale_orders(&config)).await
        }
        Commands::Seed { start, end, seed } => {
            timed_job("seed_orders", seed_orders(&config, start, end, seed)).await
        }
        Commands::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
        } => create_admin(config, email, password, first_name, last_name),
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(AppConfig::load_from_file(path)?)
        }
        None => {
            for path_str in ["restaurant.toml", "config/restaurant.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AppConfig::load_from_file(&path)?);
                }
            }
            Err("No configuration file found. Provide one with -c/--config or create restaurant.toml".into())
        }
    }
}

fn open_database(config: &AppConfig) -> Result<Database, Box<dyn std::error::Error>> {
    Ok(Database::open(&config.database.path)?)
}

async fn run_server(config: AppConfig) -> CliResult {
    let db = open_database(&config)?;
    let tokens = TokenService::from_config(&config)?;
    let mailer = build_mailer(&config)?;
    let face = Arc::new(HttpFaceEmbedder::new(&config.face, config.face_timeout())?);
    let checker = HealthChecker::new(db.clone(), config.recommendation.knowledge_base_path.clone());

    let state = AppState::new(db, config, tokens, mailer, face);
    serve(state, checker, shutdown_signal()).await?;
    Ok(())
}

/// Time a batch job and record its outcome
async fn timed_job<F>(job: &'static str, work: F) -> CliResult
where
    F: std::future::Future<Output = CliResult>,
{
    let started = Instant::now();
    let result = work.instrument(job_span!(job = job)).await;
    metrics().job_finished(job, started.elapsed(), result.is_ok());
    result
}

async fn generate_analytics(config: &AppConfig, today: Option<NaiveDate>) -> CliResult {
    let db = open_database(config)?;
    let offset = config.local_offset();
    let today = today.unwrap_or_else(|| clock::today(offset));
    let periods = generate_reports(&db, today, offset, Utc::now())?;
    info!(reports = periods.len(), %today, "Analytics generation complete");
    Ok(())
}

async fn generate_recommendation(config: &AppConfig) -> CliResult {
    let db = open_database(config)?;
    let provider = build_provider(config)?;
    match generate_weekly_recommendation(&db, provider.as_ref(), config).await? {
        RecommendationOutcome::Stored { report_id } => {
            info!(report_id, "Recommendation saved");
            Ok(())
        }
        RecommendationOutcome::NothingPending => Ok(()),
        RecommendationOutcome::Failed { report_id, reason } => {
            Err(format!("recommendation for report {report_id} failed: {reason}").into())
        }
    }
}

async fn cancel_stale_orders(config: &AppConfig) -> CliResult {
    let db = open_database(config)?;
    let timeout = Duration::minutes(config.orders.pending_timeout_minutes);
    cancel_stale_pending_orders(&db, Utc::now(), timeout)?;
    Ok(())
}

async fn seed_orders(
    config: &AppConfig,
    start: NaiveDate,
    end: NaiveDate,
    seed: Option<u64>,
) -> CliResult {
    let db = open_database(config)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let summary = seed_order_history(&db, start, end, config.local_offset(), &mut rng)?;
    info!(days = summary.days, orders = summary.orders, "Seeding complete");
    Ok(())
}

fn create_admin(
    config: AppConfig,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> CliResult {
    let db = open_database(&config)?;
    let user = users::create_admin(&db, &email, &password, &first_name, &last_name)?;
    info!(user_id = user.id, email = %user.email, "Admin account created");
    Ok(())
}

fn handle_config_command(config: AppConfig, show: bool) -> CliResult {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if config.get_jwt_secret().is_err() {
        warn!(
            "Token secret variable {} is not set",
            config.auth.secret_key_env
        );
    }
    if config.get_llm_api_key().is_err() {
        warn!("LLM API key variable {} is not set", config.llm.api_key_env);
    }
    if !config.recommendation.knowledge_base_path.exists() {
        warn!(
            "Knowledge base not found at {}",
            config.recommendation.knowledge_base_path.display()
        );
    }

    info!("Configuration validation complete");
    Ok(())
}
