//! Discover the IP addresses of nodes from a single configuration string.
//!
//! The configuration is a `key=value key=value ...` string. The `provider`
//! key selects the backend, every other key is provider specific:
//!
//! ```text
//! provider=aws region=eu-west-1 tag_key=consul tag_value=server
//! provider=digitalocean region=lon1 tag_name=cool-tag api_token="..."
//! provider=dns query=consul.service.example. server=10.0.0.2
//! ```
//!
//! Query DO for droplets in region "lon1" and with tag "cool-tag"
//! ```rust no_run
//! use node_addrs::get_addresses;
//!
//! #[tokio::main]
//! async fn main() {
//!     let res = get_addresses("provider=digitalocean region=lon1 tag_name=cool-tag").await;
//!     match res {
//!         Ok(addrs) => println!("{:?}", addrs),
//!         Err(e) => println!("Error: {}", e),
//!     };
//! }
//! ```
//!
//! Build the set of providers yourself and dispatch through [`Discover`]
//! ```rust no_run
//! use node_addrs::{cmd::CmdProvider, Discover, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = Registry::new();
//!     registry.register("cmd", CmdProvider).unwrap();
//!     registry.set_user_agent("my-agent/1.0");
//!
//!     let d = Discover::new(registry);
//!     let addrs = d
//!         .addrs(r#"provider=cmd cmdline="cat /etc/peers""#, Some(log::logger()))
//!         .await;
//!     println!("{:?}", addrs);
//! }
//! ```
mod config;
mod errors;
mod logger;
mod providers;
mod registry;

pub use config::{Config, PROVIDER_KEY};
pub use errors::{ConfigError, DiscoverError, ProviderError};
pub use logger::Logger;
pub use providers::*;
pub use registry::{Discover, Registry, GLOBAL_HELP};

/// Discovers node addresses with every compiled-in provider, logging through
/// the `log` facade.
pub async fn get_addresses(cfg: &str) -> Result<Vec<String>, DiscoverError> {
    Discover::default().addrs(cfg, Some(log::logger())).await
}
