use std::str::FromStr;

use rusoto_core::{HttpClient, Region};
use rusoto_credential::{ChainProvider, StaticProvider};
use rusoto_ec2::{DescribeInstancesRequest, Ec2, Ec2Client, Filter, Instance, Reservation};

use crate::{config::Config, errors::ProviderError, logger::Logger};

use super::{check_provider, parsed_arg, required_arg, AddrType, Provider};

const NAME: &str = "aws";
const TARGET: &str = "discover-aws";

/// Discovers running EC2 instances by tag.
#[derive(Debug, Clone, Default)]
pub struct AWSProvider;

struct Query<'a> {
    tag_key: &'a str,
    tag_value: &'a str,
    region: Region,
    addr_type: AddrType,
    access_key_id: Option<&'a str>,
    secret_access_key: Option<&'a str>,
    session_token: Option<&'a str>,
}

impl<'a> Query<'a> {
    fn from_args(args: &'a Config, l: Logger<'_>) -> Result<Self, ProviderError> {
        let tag_key = required_arg(args, "tag_key")?;
        let tag_value = required_arg(args, "tag_value")?;

        let addr_type = parsed_arg(args, "addr_type", AddrType::PrivateV4)?;
        if addr_type == AddrType::PrivateV6 {
            return Err(ProviderError::MalformedArgument(
                format!("addr_type={}", addr_type),
                "Valid values are private_v4, public_v4 or public_v6".to_string(),
            ));
        }

        // https://rusoto.github.io/rusoto/rusoto_core/region/enum.Region.html
        let region = match args.get("region").filter(|r| !r.is_empty()) {
            Some(value) => Region::from_str(value).map_err(|_| {
                ProviderError::MalformedArgument(
                    format!("region={}", value),
                    "The value is not a valid AWS Region".to_string(),
                )
            })?,
            None => {
                l.info(
                    TARGET,
                    format_args!("Region not provided. Using the region of the environment"),
                );
                Region::default()
            }
        };

        let region = match args.get("endpoint").filter(|e| !e.is_empty()) {
            Some(endpoint) => {
                l.info(TARGET, format_args!("Endpoint is {}", endpoint));
                Region::Custom {
                    name: region.name().to_string(),
                    endpoint: endpoint.to_string(),
                }
            }
            None => region,
        };

        let non_empty = |key: &str| args.get(key).filter(|v| !v.is_empty());

        Ok(Query {
            tag_key,
            tag_value,
            region,
            addr_type,
            access_key_id: non_empty("access_key_id"),
            secret_access_key: non_empty("secret_access_key"),
            session_token: non_empty("session_token"),
        })
    }

    fn client(&self, l: Logger<'_>) -> Result<Ec2Client, ProviderError> {
        let dispatcher = HttpClient::new()
            .map_err(|e| ProviderError::RequestFailed(format!("{:?}", e)))?;

        match (self.access_key_id, self.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                l.debug(TARGET, format_args!("Static credentials provided"));
                let credentials = StaticProvider::new(
                    access_key.to_string(),
                    secret_key.to_string(),
                    self.session_token.map(String::from),
                    None,
                );
                Ok(Ec2Client::new_with(
                    dispatcher,
                    credentials,
                    self.region.clone(),
                ))
            }
            _ => {
                l.debug(
                    TARGET,
                    format_args!(
                        "Using environment variables, shared credentials or instance role"
                    ),
                );
                Ok(Ec2Client::new_with(
                    dispatcher,
                    ChainProvider::new(),
                    self.region.clone(),
                ))
            }
        }
    }

    async fn get_reservations(&self, l: Logger<'_>) -> Result<Vec<Reservation>, ProviderError> {
        let client = self.client(l)?;

        let filters = vec![
            Filter {
                name: Some(format!("tag:{}", self.tag_key)),
                values: Some(vec![self.tag_value.to_string()]),
            },
            Filter {
                name: Some("instance-state-name".into()),
                values: Some(vec!["running".into()]),
            },
        ];

        l.debug(
            TARGET,
            format_args!(
                "Using region={} tag_key={} tag_value={} addr_type={}",
                self.region.name(),
                self.tag_key,
                self.tag_value,
                self.addr_type
            ),
        );

        let mut reservations = Vec::new();
        let mut next_token = None;
        loop {
            let input = DescribeInstancesRequest {
                filters: Some(filters.clone()),
                next_token: next_token.take(),
                ..Default::default()
            };

            let res = client.describe_instances(input).await.map_err(|e| {
                ProviderError::RequestFailed(format!("DescribeInstances failed: {}", e))
            })?;

            reservations.extend(res.reservations.unwrap_or_default());
            match res.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(reservations)
    }
}

fn instance_addrs(instance: Instance, addr_type: AddrType, l: Logger<'_>) -> Vec<String> {
    let instance_id = instance.instance_id.unwrap_or_default();
    l.debug(TARGET, format_args!("Found instance {}", instance_id));

    match addr_type {
        AddrType::PublicV4 => match instance.public_ip_address {
            Some(addr) => {
                l.info(
                    TARGET,
                    format_args!("Instance {} has public ip {}", instance_id, addr),
                );
                vec![addr]
            }
            None => {
                l.debug(
                    TARGET,
                    format_args!("Instance {} has no public ip", instance_id),
                );
                vec![]
            }
        },
        AddrType::PublicV6 => {
            let network_interfaces = instance.network_interfaces.unwrap_or_default();
            l.debug(
                TARGET,
                format_args!(
                    "Instance {} has {} network interfaces",
                    instance_id,
                    network_interfaces.len()
                ),
            );

            let mut addrs = Vec::new();
            for interface in network_interfaces {
                let interface_id = interface.network_interface_id.unwrap_or_default();
                let ipv6_addresses = match interface.ipv_6_addresses {
                    Some(ipv6) => ipv6,
                    None => {
                        l.debug(
                            TARGET,
                            format_args!(
                                "Instance {} has no IPv6 on NetworkInterfaceId {}",
                                instance_id, interface_id
                            ),
                        );
                        continue;
                    }
                };

                for addr in ipv6_addresses.into_iter().filter_map(|a| a.ipv_6_address) {
                    l.info(
                        TARGET,
                        format_args!(
                            "Instance {} has IPv6 {} on NetworkInterfaceId {}",
                            instance_id, addr, interface_id
                        ),
                    );
                    addrs.push(addr);
                }
            }
            addrs
        }
        // EC2-Classic instances have no private ip
        _ => match instance.private_ip_address {
            Some(addr) => {
                l.info(
                    TARGET,
                    format_args!("Instance {} has private ip {}", instance_id, addr),
                );
                vec![addr]
            }
            None => {
                l.debug(
                    TARGET,
                    format_args!("Instance {} has no private ip", instance_id),
                );
                vec![]
            }
        },
    }
}

fn reservation_addrs(
    reservations: Vec<Reservation>,
    addr_type: AddrType,
    l: Logger<'_>,
) -> Vec<String> {
    l.debug(
        TARGET,
        format_args!("Found {} reservations", reservations.len()),
    );

    reservations
        .into_iter()
        .flat_map(|reservation| {
            let instances = reservation.instances.unwrap_or_default();
            l.debug(
                TARGET,
                format_args!(
                    "Reservation {} has {} instances",
                    reservation.reservation_id.unwrap_or_default(),
                    instances.len()
                ),
            );
            instances
        })
        .flat_map(|instance| instance_addrs(instance, addr_type, l))
        .collect()
}

#[async_trait::async_trait]
impl Provider for AWSProvider {
    async fn addrs(&self, args: &Config, l: Logger<'_>) -> Result<Vec<String>, ProviderError> {
        check_provider(args, NAME)?;

        let query = Query::from_args(args, l)?;
        l.info(
            TARGET,
            format_args!("Filter instances with {}={}", query.tag_key, query.tag_value),
        );
        let reservations = query.get_reservations(l).await?;

        let addrs = reservation_addrs(reservations, query.addr_type, l);
        l.debug(TARGET, format_args!("Found ip addresses: {:?}", addrs));
        Ok(addrs)
    }

    fn help(&self) -> &'static str {
        "Amazon AWS:

    provider:          \"aws\"
    region:            The AWS region. Default to region of instance.
    tag_key:           The tag key to filter on
    tag_value:         The tag value to filter on
    addr_type:         \"private_v4\", \"public_v4\" or \"public_v6\". Defaults to \"private_v4\".
    access_key_id:     The AWS access key to use
    secret_access_key: The AWS secret access key to use
    session_token:     The AWS session token to use with temporary credentials
    endpoint:          The endpoint URL of EC2 to use. If not set the AWS client will set
                       this value, which defaults to the ec2 public dns for the specified
                       region

    The only required IAM permission is 'ec2:DescribeInstances'. If the agent is
    running on AWS instance it is recommended you use an IAM role, otherwise it is
    recommended you make a dedicated IAM user and access key used only for auto-joining.
"
    }
}

#[cfg(test)]
mod test {
    use rusoto_ec2::{InstanceIpv6Address, InstanceNetworkInterface};

    use super::*;

    fn reservations() -> Vec<Reservation> {
        vec![Reservation {
            reservation_id: Some("r-1".into()),
            instances: Some(vec![
                Instance {
                    instance_id: Some("i-1".into()),
                    private_ip_address: Some("10.0.0.1".into()),
                    public_ip_address: Some("203.0.113.1".into()),
                    network_interfaces: Some(vec![InstanceNetworkInterface {
                        network_interface_id: Some("eni-1".into()),
                        ipv_6_addresses: Some(vec![InstanceIpv6Address {
                            ipv_6_address: Some("2001:db8::1".into()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
                Instance {
                    instance_id: Some("i-2".into()),
                    private_ip_address: Some("10.0.0.2".into()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }]
    }

    #[test]
    fn collects_addresses_by_type() {
        let l = Logger::discard();
        assert_eq!(
            reservation_addrs(reservations(), AddrType::PrivateV4, l),
            vec!["10.0.0.1", "10.0.0.2"]
        );
        assert_eq!(
            reservation_addrs(reservations(), AddrType::PublicV4, l),
            vec!["203.0.113.1"]
        );
        assert_eq!(
            reservation_addrs(reservations(), AddrType::PublicV6, l),
            vec!["2001:db8::1"]
        );
    }

    #[test]
    fn no_reservations_is_empty() {
        assert!(reservation_addrs(vec![], AddrType::PrivateV4, Logger::discard()).is_empty());
    }

    #[test]
    fn query_requires_tags_and_valid_region() {
        let l = Logger::discard();
        let args = Config::parse("provider=aws tag_value=server").unwrap();
        assert!(matches!(
            Query::from_args(&args, l),
            Err(ProviderError::MissingArgument(key)) if key == "tag_key"
        ));

        let args = Config::parse("provider=aws tag_key=consul tag_value=server region=mars-1")
            .unwrap();
        assert!(matches!(
            Query::from_args(&args, l),
            Err(ProviderError::MalformedArgument(arg, _)) if arg == "region=mars-1"
        ));
    }

    #[test]
    fn query_applies_endpoint_and_credentials() {
        let args = Config::parse(
            "provider=aws tag_key=consul tag_value=server region=eu-west-1 endpoint=http://localhost:4566 access_key_id=AK secret_access_key=SK",
        )
        .unwrap();
        let query = Query::from_args(&args, Logger::discard()).unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(
            query.region,
            Region::Custom {
                name: "eu-west-1".into(),
                endpoint: "http://localhost:4566".into(),
            }
        );
        assert_eq!(query.access_key_id, Some("AK"));
        assert_eq!(query.secret_access_key, Some("SK"));
        assert_eq!(query.session_token, None);
        assert_eq!(query.addr_type, AddrType::PrivateV4);
    }
}
