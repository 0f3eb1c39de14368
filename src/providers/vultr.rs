use serde::Deserialize;

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{arg_or_env, check_provider, http, Provider};

const NAME: &str = "vultr";
const TARGET: &str = "discover-vultr";
const DEFAULT_BASE_URL: &str = "https://api.vultr.com";
const PER_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
struct ListInstancesResponse {
    instances: Vec<Instance>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    links: Links,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    next: String,
}

#[derive(Debug, Deserialize)]
struct Instance {
    id: String,
    label: String,
    region: String,
    #[serde(default)]
    internal_ip: String,
}

/// Discovers the internal addresses of Vultr instances by tag.
#[derive(Debug, Clone)]
pub struct VultrProvider {
    base_url: String,
    user_agent: Option<String>,
}

impl Default for VultrProvider {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl VultrProvider {
    /// Points the provider at another API root, e.g. a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
        }
    }

    async fn list_instances_by_tag(
        &self,
        tag_name: &str,
        api_token: &str,
    ) -> Result<Vec<Instance>, ProviderError> {
        let client = http::client(self.user_agent.as_deref())?;
        let mut instances = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("per_page", PER_PAGE.to_string())];
            if !tag_name.is_empty() {
                query.push(("tag", tag_name.to_string()));
            }
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }

            let req = client
                .get(format!("{}/v2/instances", self.base_url))
                .query(&query)
                .bearer_auth(api_token);

            let data: ListInstancesResponse = http::get_json(req).await?;
            instances.extend(data.instances);

            if data.meta.links.next.is_empty() {
                break;
            }
            cursor = data.meta.links.next;
        }

        Ok(instances)
    }
}

fn instance_addrs(instances: &[Instance], region: &str, l: Logger<'_>) -> Vec<String> {
    instances
        .iter()
        .filter(|i| region.is_empty() || i.region == region)
        .filter(|i| !i.internal_ip.is_empty())
        .map(|i| {
            l.info(
                TARGET,
                format_args!(
                    "Found instance {} ({}) with private IP: {}",
                    i.label, i.id, i.internal_ip
                ),
            );
            i.internal_ip.clone()
        })
        .collect()
}

#[async_trait::async_trait]
impl Provider for VultrProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let region = args.get("region").unwrap_or_default();
        let tag_name = args.get("tag_name").unwrap_or_default();
        let api_token = arg_or_env(args, "api_token", "VULTR_API_KEY")
            .ok_or_else(|| ProviderError::MissingArgument("api_token".into()))?;

        l.debug(
            TARGET,
            format_args!("Using region={} tag_name={}", region, tag_name),
        );

        let instances = self.list_instances_by_tag(tag_name, &api_token).await?;
        let addrs = instance_addrs(&instances, region, l);

        l.debug(TARGET, format_args!("Found ip addresses: {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "Vultr:

    provider:  \"vultr\"
    region:    The Vultr region to filter on
    tag_name:  The tag name to filter on
    api_token: The Vultr API Token to use, can also be provided by environment variable: VULTR_API_KEY
"
    }

    fn set_user_agent(&mut self, user_agent: &str) {
        self.user_agent = Some(user_agent.to_string());
    }
}
