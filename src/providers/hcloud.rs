use serde::Deserialize;

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{arg_or_env, check_provider, http, AddrType, Provider};

const NAME: &str = "hcloud";
const TARGET: &str = "discover-hcloud";
const DEFAULT_BASE_URL: &str = "https://api.hetzner.cloud";
const PER_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
struct ListServersResponse {
    servers: Vec<Server>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Server {
    id: u64,
    name: String,
    public_net: PublicNet,
    #[serde(default)]
    private_net: Vec<PrivateNet>,
    datacenter: Datacenter,
}

#[derive(Debug, Deserialize)]
struct PublicNet {
    ipv4: Option<PublicIp>,
    ipv6: Option<PublicIp>,
}

#[derive(Debug, Deserialize)]
struct PublicIp {
    ip: String,
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
struct PrivateNet {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct Datacenter {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
}

/// Discovers running Hetzner Cloud servers by label selector.
#[derive(Debug, Clone)]
pub struct HcloudProvider {
    base_url: String,
    user_agent: Option<String>,
}

impl Default for HcloudProvider {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl HcloudProvider {
    /// Points the provider at another API root, e.g. a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
        }
    }

    async fn get_servers(
        &self,
        label_selector: &str,
        api_token: &str,
    ) -> Result<Vec<Server>, ProviderError> {
        let client = http::client(self.user_agent.as_deref())?;
        let mut servers = Vec::new();
        let mut page = 1;

        loop {
            let mut query = vec![
                ("status", "running".to_string()),
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ];
            if !label_selector.is_empty() {
                query.push(("label_selector", label_selector.to_string()));
            }

            let req = client
                .get(format!("{}/v1/servers", self.base_url))
                .query(&query)
                .bearer_auth(api_token);

            let data: ListServersResponse = http::get_json(req).await?;
            servers.extend(data.servers);

            match data.meta.pagination.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(servers)
    }
}

/// The first usable address of the requested type. The IPv6 entry of a
/// server is its /64 network; the network address itself is returned.
fn server_ip(server: &Server, addr_type: AddrType, l: Logger<'_>) -> Option<String> {
    let ip = match addr_type {
        AddrType::PublicV4 => public_ip(server.public_net.ipv4.as_ref()),
        AddrType::PublicV6 => public_ip(server.public_net.ipv6.as_ref())
            .map(|ip| ip.split('/').next().unwrap_or_default().to_string()),
        _ => server.private_net.first().map(|net| net.ip.clone()),
    };

    match &ip {
        Some(ip) => l.info(
            TARGET,
            format_args!(
                "instance {} ({}) has {} IP {}",
                server.name, server.id, addr_type, ip
            ),
        ),
        None => l.debug(
            TARGET,
            format_args!(
                "instance {} ({}) has no valid associated IP address",
                server.name, server.id
            ),
        ),
    }
    ip
}

fn public_ip(ip: Option<&PublicIp>) -> Option<String> {
    ip.filter(|ip| !ip.blocked).map(|ip| ip.ip.clone())
}

fn address_type(args: &Config, l: Logger<'_>) -> AddrType {
    match args.get("address_type") {
        None | Some("") => {
            l.info(
                TARGET,
                format_args!("address type not provided, using 'private_v4'"),
            );
            AddrType::PrivateV4
        }
        Some(value) => match value.parse() {
            Ok(AddrType::PrivateV6) | Err(_) => {
                l.warn(
                    TARGET,
                    format_args!(
                        "address_type {} is invalid, falling back to 'private_v4'. valid values are: private_v4, public_v4, public_v6",
                        value
                    ),
                );
                AddrType::PrivateV4
            }
            Ok(addr_type) => addr_type,
        },
    }
}

#[async_trait::async_trait]
impl Provider for HcloudProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let label_selector = args.get("label_selector").unwrap_or_default();
        let location = args.get("location").filter(|loc| !loc.is_empty());
        let addr_type = address_type(args, l);
        let api_token = arg_or_env(args, "api_token", "HCLOUD_TOKEN")
            .ok_or_else(|| ProviderError::MissingArgument("api_token".into()))?;

        l.debug(
            TARGET,
            format_args!(
                "using address_type={} label_selector={} location={}",
                addr_type,
                label_selector,
                location.unwrap_or_default()
            ),
        );

        let servers = self.get_servers(label_selector, &api_token).await?;

        let addrs = servers
            .iter()
            .filter(|s| location.map_or(true, |loc| s.datacenter.location.name == loc))
            .filter_map(|s| server_ip(s, addr_type, l))
            .collect::<Vec<_>>();

        l.debug(TARGET, format_args!("found IP addresses: {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "Hetzner Cloud:

    provider:       \"hcloud\"
    location:       The Hetzner Cloud datacenter location to filter by (eg. \"fsn1\")
    label_selector: The label selector to filter by
    address_type:   \"private_v4\", \"public_v4\" or \"public_v6\", defaults to \"private_v4\". In the case of private networks, the first one will be used
    api_token:      The Hetzner Cloud API token to use, can also be provided by environment variable: HCLOUD_TOKEN

    Servers whose primary public IP is blocked are skipped for public address types;
    floating IPs are not considered.
"
    }

    fn set_user_agent(&mut self, user_agent: &str) {
        self.user_agent = Some(user_agent.to_string());
    }
}
