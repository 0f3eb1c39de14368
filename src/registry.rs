use std::{collections::BTreeMap, fmt};

use log::Log;

use crate::{
    config::Config,
    errors::DiscoverError,
    logger::Logger,
    providers::Provider,
};

/// Describes the format of the configuration string for address discovery.
/// The provider specific options follow it in [`Registry::help`].
pub const GLOBAL_HELP: &str = "The options for discovering ip addresses are provided as a
single string value in \"key=value key=value ...\" format. Values containing
spaces, '=' or '\"' must be enclosed in double quotes; inside quotes \\\" and \\\\
stand for a quote and a backslash.

  provider=aws region=eu-west-1 ...

The options are provider specific and are listed below.
";

/// The set of providers a [`Discover`] can dispatch to, keyed by name.
///
/// Built once at startup, then handed to [`Discover::new`]. Registration
/// needs `&mut self`, so it cannot race with dispatch.
#[derive(Default)]
pub struct Registry {
    providers: BTreeMap<String, Box<dyn Provider>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every provider compiled into this crate.
    pub fn with_default_providers() -> Self {
        #[allow(unused_mut)]
        let mut providers: BTreeMap<String, Box<dyn Provider>> = BTreeMap::new();

        #[cfg(feature = "aws")]
        providers.insert("aws".into(), Box::new(crate::providers::aws::AWSProvider));
        #[cfg(feature = "cmd")]
        providers.insert("cmd".into(), Box::new(crate::providers::cmd::CmdProvider));
        #[cfg(feature = "digitalocean")]
        providers.insert(
            "digitalocean".into(),
            Box::new(crate::providers::digitalocean::DOProvider::default()),
        );
        #[cfg(feature = "dns")]
        providers.insert("dns".into(), Box::new(crate::providers::dns::DnsProvider));
        #[cfg(feature = "hcloud")]
        providers.insert(
            "hcloud".into(),
            Box::new(crate::providers::hcloud::HcloudProvider::default()),
        );
        #[cfg(feature = "linode")]
        providers.insert(
            "linode".into(),
            Box::new(crate::providers::linode::LinodeProvider::default()),
        );
        #[cfg(feature = "vultr")]
        providers.insert(
            "vultr".into(),
            Box::new(crate::providers::vultr::VultrProvider::default()),
        );

        Self { providers }
    }

    /// Registers `provider` under `name`. A name can only be registered once.
    pub fn register<P>(&mut self, name: impl Into<String>, provider: P) -> Result<(), DiscoverError>
    where
        P: Provider + 'static,
    {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(DiscoverError::DuplicateProvider(name));
        }
        self.providers.insert(name, Box::new(provider));
        Ok(())
    }

    /// Builder style [`register`](Self::register).
    pub fn with<P>(mut self, name: impl Into<String>, provider: P) -> Result<Self, DiscoverError>
    where
        P: Provider + 'static,
    {
        self.register(name, provider)?;
        Ok(self)
    }

    /// Passes `user_agent` to every provider that sends one.
    pub fn set_user_agent(&mut self, user_agent: &str) {
        for provider in self.providers.values_mut() {
            provider.set_user_agent(user_agent);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    /// The registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// The global help followed by the help of every registered provider.
    pub fn help(&self) -> String {
        let mut help = GLOBAL_HELP.to_string();
        for provider in self.providers.values() {
            help.push('\n');
            help.push_str(provider.help());
        }
        help
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Resolves configuration strings to node addresses.
///
/// Each call is independent: the configuration is parsed, the provider named
/// by its `provider` key is looked up and called once. Errors from the
/// provider are returned as they are, tagged with the provider name; there is
/// no retry.
#[derive(Debug)]
pub struct Discover {
    registry: Registry,
}

impl Default for Discover {
    fn default() -> Self {
        Self::new(Registry::with_default_providers())
    }
}

impl Discover {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn help(&self) -> String {
        self.registry.help()
    }

    /// Discovers the addresses of the nodes matching `cfg`.
    ///
    /// Log records go to `logger`; with `None` they are dropped.
    pub async fn addrs(
        &self,
        cfg: &str,
        logger: Option<&dyn Log>,
    ) -> Result<Vec<String>, DiscoverError> {
        let config = Config::parse(cfg)?;
        self.addrs_config(&config, logger).await
    }

    /// Like [`addrs`](Self::addrs) for an already parsed configuration.
    pub async fn addrs_config(
        &self,
        config: &Config,
        logger: Option<&dyn Log>,
    ) -> Result<Vec<String>, DiscoverError> {
        let name = config.provider().ok_or(DiscoverError::MissingProvider)?;
        let provider = self
            .registry
            .get(name)
            .ok_or_else(|| DiscoverError::UnknownProvider(name.to_string()))?;

        let l = match logger {
            Some(sink) => Logger::new(sink),
            None => Logger::discard(),
        };

        provider
            .addrs(config, l)
            .await
            .map_err(|source| DiscoverError::Provider {
                provider: name.to_string(),
                source,
            })
    }
}
