use serde::Deserialize;

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{arg_or_env, check_provider, http, Provider};

const NAME: &str = "digitalocean";
const TARGET: &str = "discover-digitalocean";
const DEFAULT_BASE_URL: &str = "https://api.digitalocean.com";
const PER_PAGE: usize = 200;

#[derive(Debug, Clone, Deserialize)]
struct ListDropletsResponse {
    pub droplets: Vec<Droplet>,
}

#[derive(Debug, Clone, Deserialize)]
struct Droplet {
    pub id: u64,
    pub name: String,
    pub networks: Networks,
    pub region: DropletRegion,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DropletRegion {
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Networks {
    #[serde(default)]
    pub v4: Vec<Network>,
}

#[derive(Debug, Clone, Deserialize)]
struct Network {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub variant: String,
}

/// Discovers the private IPv4 addresses of DigitalOcean droplets by tag.
#[derive(Debug, Clone)]
pub struct DOProvider {
    base_url: String,
    user_agent: Option<String>,
}

impl Default for DOProvider {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl DOProvider {
    /// Points the provider at another API root, e.g. a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
        }
    }

    async fn get_droplets(
        &self,
        tag_name: &str,
        api_token: &str,
    ) -> Result<Vec<Droplet>, ProviderError> {
        let client = http::client(self.user_agent.as_deref())?;
        let mut droplets = Vec::new();
        let mut page = 1;

        loop {
            let req = client
                .get(format!("{}/v2/droplets", self.base_url))
                .query(&[
                    ("page", page.to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("tag_name", tag_name.to_string()),
                ])
                .bearer_auth(api_token);

            let data: ListDropletsResponse = http::get_json(req).await?;
            let droplets_count = data.droplets.len();
            droplets.extend(data.droplets);

            page += 1;

            if droplets_count < PER_PAGE {
                break;
            }
        }

        Ok(droplets)
    }
}

/// The tags a droplet must carry: `tag_names` is a comma separated list and
/// wins over the single `tag_name`.
fn tag_names(args: &Config) -> Result<Vec<&str>, ProviderError> {
    let tags: Vec<&str> = match args.get("tag_names") {
        Some(names) => names
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect(),
        None => args
            .get("tag_name")
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect(),
    };

    if tags.is_empty() {
        return Err(ProviderError::MissingArgument("tag_name".into()));
    }
    Ok(tags)
}

fn droplet_addrs(
    droplets: Vec<Droplet>,
    region: Option<&str>,
    tags: &[&str],
    l: Logger<'_>,
) -> Vec<String> {
    droplets
        .into_iter()
        .filter(|droplet| region.map_or(true, |r| droplet.region.slug == r))
        .filter(|droplet| tags.iter().all(|t| droplet.tags.iter().any(|dt| dt == t)))
        .flat_map(|droplet| {
            let name = droplet.name;
            let id = droplet.id;
            droplet
                .networks
                .v4
                .into_iter()
                .filter(|network| network.variant == "private")
                .map(move |network| {
                    l.info(
                        TARGET,
                        format_args!(
                            "Found instance {} ({}) with private IP: {}",
                            name, id, network.ip_address
                        ),
                    );
                    network.ip_address
                })
        })
        .collect()
}

#[async_trait::async_trait]
impl Provider for DOProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let region = args.get("region").filter(|r| !r.is_empty());
        let tags = tag_names(args)?;
        let api_token = arg_or_env(args, "api_token", "DIGITALOCEAN_TOKEN")
            .ok_or_else(|| ProviderError::MissingArgument("api_token".into()))?;

        l.debug(
            TARGET,
            format_args!(
                "Using region={} tag_names={}",
                region.unwrap_or_default(),
                tags.join(",")
            ),
        );

        let droplets = self.get_droplets(tags[0], &api_token).await?;
        l.debug(TARGET, format_args!("Found {} droplets", droplets.len()));

        let addrs = droplet_addrs(droplets, region, &tags, l);
        l.debug(TARGET, format_args!("Found ip addresses: {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "DigitalOcean:

    provider:  \"digitalocean\"
    region:    The DigitalOcean region to filter on
    tag_name:  The tag name to filter on
    tag_names: A comma separated list of tag names; droplets must carry all of them
    api_token: The DigitalOcean API token to use

    The api_token can also be provided by the DIGITALOCEAN_TOKEN environment variable.
"
    }

    fn set_user_agent(&mut self, user_agent: &str) {
        self.user_agent = Some(user_agent.to_string());
    }
}
