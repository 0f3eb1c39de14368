use std::net::Ipv4Addr;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{arg_or_env, check_provider, http, parsed_arg, AddrType, Provider};

const NAME: &str = "linode";
const TARGET: &str = "discover-linode";
const DEFAULT_BASE_URL: &str = "https://api.linode.com";
const PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct ListInstancesResponse {
    data: Vec<Instance>,
    page: u32,
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct Instance {
    id: u64,
    label: String,
    #[serde(default)]
    ipv4: Vec<String>,
    ipv6: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstanceIps {
    ipv6: Ipv6Ips,
}

#[derive(Debug, Deserialize)]
struct Ipv6Ips {
    link_local: Option<IpAddress>,
}

#[derive(Debug, Deserialize)]
struct IpAddress {
    address: String,
}

/// Discovers Linode instances by region and tag.
#[derive(Debug, Clone)]
pub struct LinodeProvider {
    base_url: String,
    user_agent: Option<String>,
}

impl Default for LinodeProvider {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl LinodeProvider {
    /// Points the provider at another API root, e.g. a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
        }
    }

    async fn list_instances(
        &self,
        client: &reqwest::Client,
        api_token: &str,
        filter: &str,
    ) -> Result<Vec<Instance>, ProviderError> {
        let mut instances = Vec::new();
        let mut page = 1;

        loop {
            let req = client
                .get(format!("{}/v4/linode/instances", self.base_url))
                .query(&[("page", page.to_string()), ("page_size", PAGE_SIZE.to_string())])
                .header("X-Filter", filter)
                .bearer_auth(api_token);

            let data: ListInstancesResponse = http::get_json(req).await?;
            instances.extend(data.data);

            if data.page >= data.pages {
                break;
            }
            page = data.page + 1;
        }

        Ok(instances)
    }

    async fn link_local_addr(
        &self,
        client: &reqwest::Client,
        api_token: &str,
        id: u64,
    ) -> Result<Option<String>, ProviderError> {
        let req = client
            .get(format!("{}/v4/linode/instances/{}/ips", self.base_url, id))
            .bearer_auth(api_token);

        let ips: InstanceIps = http::get_json(req).await.map_err(|e| {
            ProviderError::RequestFailed(format!(
                "Fetching Linode IP address for instance {} failed: {}",
                id, e
            ))
        })?;
        Ok(ips
            .ipv6
            .link_local
            .map(|ip| ip.address)
            .filter(|a| !a.is_empty()))
    }
}

/// The `X-Filter` header selecting instances; empty criteria are left out.
fn instance_filter(region: &str, tag_name: &str) -> String {
    let mut filter = Map::new();
    if !region.is_empty() {
        filter.insert("region".into(), Value::String(region.into()));
    }
    if !tag_name.is_empty() {
        filter.insert("tags".into(), Value::String(tag_name.into()));
    }
    Value::Object(filter).to_string()
}

fn is_private(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>().map_or(false, |ip| ip.is_private())
}

/// Addresses available without a further API call.
fn instance_addrs(instance: &Instance, addr_type: AddrType) -> Vec<String> {
    match addr_type {
        AddrType::PublicV4 => instance
            .ipv4
            .iter()
            .filter(|ip| !is_private(ip))
            .cloned()
            .collect(),
        AddrType::PublicV6 => instance
            .ipv6
            .iter()
            .filter_map(|ip| ip.split('/').next())
            .filter(|ip| !ip.is_empty())
            .map(String::from)
            .collect(),
        _ => instance
            .ipv4
            .iter()
            .filter(|ip| is_private(ip))
            .cloned()
            .collect(),
    }
}

#[async_trait::async_trait]
impl Provider for LinodeProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let addr_type = parsed_arg(args, "address_type", AddrType::PrivateV4)?;
        let region = args.get("region").unwrap_or_default();
        let tag_name = args.get("tag_name").unwrap_or_default();
        let api_token = arg_or_env(args, "api_token", "LINODE_TOKEN")
            .ok_or_else(|| ProviderError::MissingArgument("api_token".into()))?;

        l.debug(
            TARGET,
            format_args!(
                "Using address_type={} region={} tag_name={}",
                addr_type, region, tag_name
            ),
        );

        let client = http::client(self.user_agent.as_deref())?;
        let filter = instance_filter(region, tag_name);
        let instances = self
            .list_instances(&client, &api_token, &filter)
            .await
            .map_err(|e| {
                ProviderError::RequestFailed(format!("Fetching Linode instances failed: {}", e))
            })?;

        let mut addrs = Vec::new();
        for instance in &instances {
            let found: Vec<String> = if addr_type == AddrType::PrivateV6 {
                self.link_local_addr(&client, &api_token, instance.id)
                    .await?
                    .into_iter()
                    .collect()
            } else {
                instance_addrs(instance, addr_type)
            };

            for addr in &found {
                l.info(
                    TARGET,
                    format_args!(
                        "Found instance {} ({}) with {} IP: {}",
                        instance.label, instance.id, addr_type, addr
                    ),
                );
            }
            addrs.extend(found);
        }

        l.debug(TARGET, format_args!("Found ip addresses: {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "Linode:

    provider:     \"linode\"
    api_token:    The Linode API token to use
    region:       The Linode region to filter on
    tag_name:     The tag name to filter on
    address_type: \"private_v4\", \"public_v4\", \"private_v6\" or \"public_v6\". (default: \"private_v4\")

    Variables can also be provided by environment variables:
    export LINODE_TOKEN for api_token
"
    }

    fn set_user_agent(&mut self, user_agent: &str) {
        self.user_agent = Some(user_agent.to_string());
    }
}
