//! Cordlink - gateway session client
//!
//! Application crate around the `gatewire` library.
//!
//! ## Architecture
//!
//! - **gatewire**: gateway session library (re-exported from workspace)
//! - **bin_common**: settings, logging and shutdown handling for binaries
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use cordlink::bin_common::{load_config_from_env, BotSettings, ConfigType};
//! use cordlink::gatewire::GatewayClient;
//! ```

// Re-export workspace libraries for convenience
pub use gatewire;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod settings;
    pub mod shutdown;

    pub use cli::{load_config_from_env, ConfigType};
    pub use logging::init_tracing;
    pub use settings::{BotSettings, ConfigError, GatewaySettings, PresenceSettings};
    pub use shutdown::ShutdownManager;
}
