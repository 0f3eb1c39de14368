use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use hickory_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    TokioAsyncResolver,
};

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{check_provider, parsed_arg, required_arg, Provider};

const NAME: &str = "dns";
const TARGET: &str = "discover-dns";
const DEFAULT_SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));
const DEFAULT_PORT: u16 = 53;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Looks up the A records of a name against one DNS server.
#[derive(Debug, Clone, Default)]
pub struct DnsProvider;

struct Lookup<'a> {
    query: &'a str,
    server: IpAddr,
    port: u16,
    timeout: Duration,
}

impl<'a> Lookup<'a> {
    fn from_args(args: &'a Config) -> Result<Self, ProviderError> {
        let query = required_arg(args, "query")?;
        let server = parsed_arg(args, "server", DEFAULT_SERVER)?;
        let port = parsed_arg(args, "port", DEFAULT_PORT)?;
        let timeout: humantime::Duration =
            parsed_arg(args, "timeout", humantime::Duration::from(DEFAULT_TIMEOUT))?;

        Ok(Self {
            query,
            server,
            port,
            timeout: timeout.into(),
        })
    }

    fn resolver(&self) -> TokioAsyncResolver {
        let servers = NameServerConfigGroup::from_ips_clear(&[self.server], self.port, true);
        let config = ResolverConfig::from_parts(None, vec![], servers);

        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        opts.attempts = 1;

        TokioAsyncResolver::tokio(config, opts)
    }
}

#[async_trait::async_trait]
impl Provider for DnsProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let lookup = Lookup::from_args(args)?;
        l.debug(
            TARGET,
            format_args!(
                "Using query={} server={} port={} timeout={:?}",
                lookup.query, lookup.server, lookup.port, lookup.timeout
            ),
        );

        let addrs = match lookup.resolver().ipv4_lookup(lookup.query).await {
            Ok(records) => records.iter().map(|a| a.0.to_string()).collect(),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Vec::new(),
                _ => {
                    return Err(ProviderError::RequestFailed(format!(
                        "Failed to process query: {}",
                        e
                    )))
                }
            },
        };

        l.debug(TARGET, format_args!("found addrs {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "DNS:

    provider: \"dns\"
    query:    The DNS query to lookup.  Required.
    server:   The DNS server to query.  Default \"8.8.8.8\" (Google DNS).
    port:     The DNS port to use.      Default: \"53\" (standard DNS port).
    timeout:  The DNS lookup timeout.   Default \"5s\" (five seconds).
"
    }
}
