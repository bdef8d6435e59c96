//! Error types for the demo binary.
//!
//! [`DemoError`] wraps every failure mode between startup and the final
//! report so `main` can propagate with `?`.

/// Top-level error for the demo binary.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: microcollab_core::config::ConfigError,
    },

    /// The marketplace engine rejected an operation.
    #[error("marketplace error: {source}")]
    Market {
        /// The underlying engine error.
        #[from]
        source: microcollab_core::MarketError,
    },

    /// Rendering the final report failed.
    #[error("report error: {source}")]
    Report {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
