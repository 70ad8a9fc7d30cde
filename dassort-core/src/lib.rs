//! dassort core library: domain types, YAML configuration, errors.
//!
//! - [`types`]: profiles, router rules, remote targets
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load + validate the `*.yaml` files of a config directory

pub mod config;
pub mod error;
pub mod types;

pub use config::{load_dir, parse_file, ConfigEntry, RunDefaults};
pub use error::ConfigError;
pub use types::{
    CommandRule, CopyProtocol, Profile, ProfileName, RemoteTarget, RouteRule, RouterConfig,
    Settings,
};
