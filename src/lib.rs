//! Gateherd Probe - Main Library
//!
//! This crate wires the gateherd orchestration library into a runnable
//! probe binary: load a client config, start the supervised connection
//! tree and watch it work.
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use gateherd_probe::bin_common::{config_path_from_env, load_client_config};
//!
//! let path = config_path_from_env();
//! ```

// Re-export the workspace library for convenience
pub use gateherd;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{config_path_from_env, load_client_config, parse_args, CONFIG_PATH_ENV};
}
