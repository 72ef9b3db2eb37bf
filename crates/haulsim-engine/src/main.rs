//! Bootstrap binary for the haulsim logistics simulation.
//!
//! Wires the `PostgreSQL` store, the bank and market clients, and the
//! simulation clock into a [`BootstrapOrchestrator`], runs one bootstrap,
//! and then keeps the clock running until the process is interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `haulsim-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulation clock
//! 4. Build the database gateway and the HTTP clients
//! 5. Run the bootstrap and log its report
//! 6. Start the clock, with auto-sync if an endpoint is configured
//! 7. Wait for Ctrl-C, then stop the clock and close the pool

mod adapters;
mod error;

use std::path::Path;
use std::sync::Arc;

use haulsim_clients::{BankClient, HttpClientConfig, MarketClient};
use haulsim_clock::Clock;
use haulsim_core::bootstrap::BootstrapOrchestrator;
use haulsim_core::config::{HaulsimConfig, LogFormat, LoggingConfig};
use haulsim_db::PostgresConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::{HttpBank, HttpMarket, PgGateway};
use crate::error::EngineError;

/// Configuration file read from the working directory.
const CONFIG_PATH: &str = "haulsim-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a client cannot be
/// built, or a core bootstrap phase fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_tracing(&config.logging);
    info!("haulsim-engine starting");
    info!(
        real_minutes_per_sim_day = config.clock.real_minutes_per_sim_day,
        max_attempts = config.bootstrap.max_attempts,
        bank_url = %config.infrastructure.bank_url,
        market_url = %config.infrastructure.market_url,
        "Configuration loaded"
    );

    let clock = Arc::new(Clock::new(&config.clock).map_err(EngineError::from)?);
    info!(speed = clock.speed(), "Simulation clock created");

    let infra = &config.infrastructure;
    let gateway = PgGateway::new(
        PostgresConfig::new(&infra.postgres_url)
            .with_max_connections(infra.postgres_max_connections)
            .with_connect_timeout(infra.postgres_connect_timeout()),
    );
    let bank_config = HttpClientConfig::new(&infra.bank_url).with_timeout(infra.http_timeout());
    let bank = BankClient::new(bank_config).map_err(EngineError::from)?;
    let market_config = HttpClientConfig::new(&infra.market_url).with_timeout(infra.http_timeout());
    let market = MarketClient::new(market_config).map_err(EngineError::from)?;

    let orchestrator = BootstrapOrchestrator::new(
        gateway,
        HttpBank(bank),
        HttpMarket(market),
        Arc::clone(&clock),
        config.bootstrap,
    );

    let report = orchestrator.run().await.map_err(EngineError::from)?;
    info!(
        bank_account = report
            .bank_account
            .as_ref()
            .map_or("none", |account| account.account_number.as_str()),
        loan_requested = %report.loan.requested_amount,
        loan_attempted = %report.loan.attempted_amount,
        loan_approved = report.loan.approved,
        fleet = ?report.fleet,
        "Simulation environment ready"
    );

    clock
        .start(
            config.clock.start_time,
            config.clock.sync_endpoint.as_deref(),
            config.clock.sync_interval(),
        )
        .map_err(EngineError::from)?;

    tokio::signal::ctrl_c().await.map_err(EngineError::from)?;
    info!("Shutdown requested");

    clock.stop();
    info!(sim_time = %clock.now(), "Simulation clock stopped");
    orchestrator.persistence().close().await;
    info!("haulsim-engine stopped");
    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], or defaults if it is absent.
///
/// Environment overrides apply in both cases.
fn load_config() -> Result<HaulsimConfig, EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(HaulsimConfig::from_file(path)?)
    } else {
        let mut config = HaulsimConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
