//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the process, so `main`
//! can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: haulsim_core::config::ConfigError,
    },

    /// The simulation clock rejected its configuration.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: haulsim_clock::ClockError,
    },

    /// A bank or market client could not be built.
    #[error("client error: {source}")]
    Client {
        /// The underlying client error.
        #[from]
        source: haulsim_clients::ClientError,
    },

    /// A core bootstrap phase failed.
    #[error(transparent)]
    Bootstrap(#[from] haulsim_core::bootstrap::BootstrapError),

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
