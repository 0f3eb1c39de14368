#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "cmd")]
pub mod cmd;
#[cfg(feature = "digitalocean")]
pub mod digitalocean;
#[cfg(feature = "dns")]
pub mod dns;
#[cfg(feature = "hcloud")]
pub mod hcloud;
#[cfg(feature = "linode")]
pub mod linode;
#[cfg(feature = "vultr")]
pub mod vultr;

#[cfg(feature = "reqwest")]
mod http;

use std::env;

use crate::{config::Config, errors::ProviderError, logger::Logger};

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Retrieve IP addresses of nodes in this provider.
    ///
    /// `args` is the full parsed configuration, `provider` key included.
    /// Finding no nodes is not an error and yields an empty list.
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError>;

    /// Returns text explaining how to use this provider.
    ///
    /// That means which attributes are available and what the value of those
    /// attributes can be. Any other information that the user of this
    /// provider needs to know should also be explained.
    fn help(&self) -> &'static str;

    /// Sets the user agent sent with outbound HTTP requests.
    ///
    /// Providers without an HTTP identity ignore it.
    fn set_user_agent(&mut self, _user_agent: &str) {}
}

/// Fails unless the config selects the provider called `name`.
pub(crate) fn check_provider(args: &Config, name: &str) -> Result<(), ProviderError> {
    match args.provider() {
        Some(p) if p == name => Ok(()),
        p => Err(ProviderError::InvalidProvider(
            p.unwrap_or_default().to_string(),
        )),
    }
}

/// Returns the value of `key`, or of the environment variable `env` when the
/// key is absent or empty.
pub(crate) fn arg_or_env(args: &Config, key: &str, env: &str) -> Option<String> {
    match args.get(key) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => env::var(env).ok().filter(|v| !v.is_empty()),
    }
}

/// Returns the value of a required key.
pub(crate) fn required_arg<'a>(args: &'a Config, key: &str) -> Result<&'a str, ProviderError> {
    match args.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProviderError::MissingArgument(key.to_string())),
    }
}

/// Parses an optional key with `FromStr`, falling back to `default`.
pub(crate) fn parsed_arg<T>(args: &Config, key: &str, default: T) -> Result<T, ProviderError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match args.get(key) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| {
            ProviderError::MalformedArgument(format!("{}={}", key, value), e.to_string())
        }),
    }
}

/// The address family and scope a provider should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrType {
    PrivateV4,
    PublicV4,
    PrivateV6,
    PublicV6,
}

impl Default for AddrType {
    fn default() -> Self {
        AddrType::PrivateV4
    }
}

impl std::str::FromStr for AddrType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "private_v4" => Ok(AddrType::PrivateV4),
            "public_v4" => Ok(AddrType::PublicV4),
            "private_v6" => Ok(AddrType::PrivateV6),
            "public_v6" => Ok(AddrType::PublicV6),
            _ => Err(
                "expected one of private_v4, public_v4, private_v6 or public_v6".to_string(),
            ),
        }
    }
}

impl std::fmt::Display for AddrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AddrType::PrivateV4 => "private_v4",
            AddrType::PublicV4 => "public_v4",
            AddrType::PrivateV6 => "private_v6",
            AddrType::PublicV6 => "public_v6",
        };
        f.write_str(name)
    }
}
