//! Endpoint resolution for upstream AWS requests.

use std::fmt;

use serde_json::{Map, Value};

/// Where and how to send a request upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL without a trailing slash, e.g. `https://sqs.eu-west-1.amazonaws.com`.
    pub url: String,
    /// Region in the credential scope.
    pub signing_region: String,
    /// Service name in the credential scope.
    pub signing_service: String,
}

/// Resolves the endpoint of a service in a region.
pub trait EndpointResolver: Send + Sync + fmt::Debug {
    /// Resolve the endpoint for an operation with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AuthProxyError::Endpoint`](crate::AuthProxyError::Endpoint)
    /// if no endpoint is known.
    fn resolve(
        &self,
        service: &str,
        region: &str,
        params: &Map<String, Value>,
    ) -> Result<Endpoint, crate::AuthProxyError>;
}

/// An AWS partition: the regions it owns and the DNS suffix of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Partition {
    name: &'static str,
    region_prefix: &'static str,
    dns_suffix: &'static str,
    default_region: &'static str,
}

const AWS: Partition = Partition {
    name: "aws",
    region_prefix: "",
    dns_suffix: "amazonaws.com",
    default_region: "us-east-1",
};

/// Partitions other than `aws`, matched by region prefix.
const PARTITIONS: &[Partition] = &[
    Partition {
        name: "aws-cn",
        region_prefix: "cn-",
        dns_suffix: "amazonaws.com.cn",
        default_region: "cn-north-1",
    },
    Partition {
        name: "aws-us-gov",
        region_prefix: "us-gov-",
        dns_suffix: "amazonaws.com",
        default_region: "us-gov-west-1",
    },
    Partition {
        name: "aws-iso",
        region_prefix: "us-iso-",
        dns_suffix: "c2s.ic.gov",
        default_region: "us-iso-east-1",
    },
    Partition {
        name: "aws-iso-b",
        region_prefix: "us-isob-",
        dns_suffix: "sc2s.sgov.gov",
        default_region: "us-isob-east-1",
    },
    Partition {
        name: "aws-iso-e",
        region_prefix: "eu-isoe-",
        dns_suffix: "cloud.adc-e.uk",
        default_region: "eu-isoe-west-1",
    },
    Partition {
        name: "aws-iso-f",
        region_prefix: "us-isof-",
        dns_suffix: "csp.hci.ic.gov",
        default_region: "us-isof-south-1",
    },
    Partition {
        name: "aws-eusc",
        region_prefix: "eusc-",
        dns_suffix: "amazonaws.eu",
        default_region: "eusc-de-east-1",
    },
];

impl Partition {
    /// The partition owning `region`. Pseudo-regions such as `aws-global` or
    /// `aws-cn-global` name their partition.
    fn of(region: &str) -> Self {
        if let Some(name) = region.strip_suffix("-global") {
            return PARTITIONS
                .iter()
                .copied()
                .find(|p| p.name == name)
                .unwrap_or(AWS);
        }
        PARTITIONS
            .iter()
            .copied()
            .find(|p| region.starts_with(p.region_prefix))
            .unwrap_or(AWS)
    }
}

/// Services with one endpoint per partition: `(service, partition, host,
/// signing region)`.
const GLOBAL_ENDPOINTS: &[(&str, &str, &str, &str)] = &[
    ("iam", "aws", "iam.amazonaws.com", "us-east-1"),
    ("iam", "aws-cn", "iam.cn-north-1.amazonaws.com.cn", "cn-north-1"),
    ("iam", "aws-us-gov", "iam.us-gov.amazonaws.com", "us-gov-west-1"),
    ("route53", "aws", "route53.amazonaws.com", "us-east-1"),
    ("route53", "aws-cn", "route53.amazonaws.com.cn", "cn-northwest-1"),
    ("route53", "aws-us-gov", "route53.us-gov.amazonaws.com", "us-gov-west-1"),
    ("cloudfront", "aws", "cloudfront.amazonaws.com", "us-east-1"),
    ("cloudfront", "aws-cn", "cloudfront.cn-northwest-1.amazonaws.com.cn", "cn-northwest-1"),
    ("organizations", "aws", "organizations.us-east-1.amazonaws.com", "us-east-1"),
    ("organizations", "aws-cn", "organizations.cn-northwest-1.amazonaws.com.cn", "cn-northwest-1"),
    ("organizations", "aws-us-gov", "organizations.us-gov-west-1.amazonaws.com", "us-gov-west-1"),
    ("shield", "aws", "shield.us-east-1.amazonaws.com", "us-east-1"),
    ("waf", "aws", "waf.amazonaws.com", "us-east-1"),
    ("budgets", "aws", "budgets.amazonaws.com", "us-east-1"),
    ("ce", "aws", "ce.us-east-1.amazonaws.com", "us-east-1"),
    ("sts", "aws-global", "sts.amazonaws.com", "us-east-1"),
];

/// Resolver for the AWS partitions.
///
/// Regional services resolve to `{prefix}.{region}.{dns suffix}`; global
/// services to their partition endpoint. S3 requests addressing a bucket
/// resolve to the bucket's virtual host.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEndpointResolver;

impl EndpointResolver for DefaultEndpointResolver {
    fn resolve(
        &self,
        service: &str,
        region: &str,
        params: &Map<String, Value>,
    ) -> Result<Endpoint, crate::AuthProxyError> {
        if region.is_empty() || service.is_empty() {
            return Err(crate::AuthProxyError::Endpoint(format!(
                "service {service:?} in region {region:?}"
            )));
        }
        let partition = Partition::of(region);
        let signing_service = signing_name(service).to_owned();

        // `sts` is only global when addressed through the pseudo-region.
        let global_key = if service == "sts" { region } else { partition.name };
        if let Some((_, _, host, signing_region)) = GLOBAL_ENDPOINTS
            .iter()
            .find(|(s, p, _, _)| *s == service && *p == global_key)
        {
            return Ok(Endpoint {
                url: format!("https://{host}"),
                signing_region: (*signing_region).to_owned(),
                signing_service,
            });
        }

        let region = if region.ends_with("-global") {
            partition.default_region
        } else {
            region
        };
        let suffix = partition.dns_suffix;
        let url = if service == "s3" {
            let host = if region == "us-east-1" {
                format!("s3.{suffix}")
            } else {
                format!("s3.{region}.{suffix}")
            };
            let bucket = params
                .get("Bucket")
                .and_then(Value::as_str)
                .filter(|b| !b.is_empty() && !b.contains('.'));
            match bucket {
                Some(bucket) => format!("https://{bucket}.{host}"),
                None => format!("https://{host}"),
            }
        } else {
            format!("https://{}.{region}.{suffix}", endpoint_prefix(service))
        };

        Ok(Endpoint {
            url,
            signing_region: region.to_owned(),
            signing_service,
        })
    }
}

/// Resolver that sends every request to one base URL. Used to point the
/// proxy at a stand-in for AWS.
#[derive(Debug, Clone)]
pub struct StaticEndpointResolver {
    base_url: String,
}

impl StaticEndpointResolver {
    /// Resolve every service to `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

impl EndpointResolver for StaticEndpointResolver {
    fn resolve(
        &self,
        service: &str,
        region: &str,
        _params: &Map<String, Value>,
    ) -> Result<Endpoint, crate::AuthProxyError> {
        Ok(Endpoint {
            url: self.base_url.clone(),
            signing_region: region.to_owned(),
            signing_service: signing_name(service).to_owned(),
        })
    }
}

/// Host label of a service's regional endpoint.
fn endpoint_prefix(service: &str) -> &str {
    match service {
        "cloudwatch" => "monitoring",
        "ses" | "sesv2" => "email",
        "stepfunctions" => "states",
        other => other,
    }
}

/// Service name used in the credential scope.
fn signing_name(service: &str) -> &str {
    match service {
        "cloudwatch" => "monitoring",
        "sesv2" => "ses",
        "stepfunctions" => "states",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolve(service: &str, region: &str, params: Value) -> Endpoint {
        DefaultEndpointResolver
            .resolve(service, region, params.as_object().unwrap())
            .unwrap()
    }

    #[test]
    fn test_should_resolve_regional_endpoints() {
        let endpoint = resolve("sqs", "eu-west-1", json!({}));
        assert_eq!(endpoint.url, "https://sqs.eu-west-1.amazonaws.com");
        assert_eq!(endpoint.signing_region, "eu-west-1");
        assert_eq!(endpoint.signing_service, "sqs");

        let endpoint = resolve("dynamodb", "cn-north-1", json!({}));
        assert_eq!(endpoint.url, "https://dynamodb.cn-north-1.amazonaws.com.cn");
    }

    #[test]
    fn test_should_resolve_cloudwatch_to_monitoring() {
        let endpoint = resolve("cloudwatch", "us-west-2", json!({}));
        assert_eq!(endpoint.url, "https://monitoring.us-west-2.amazonaws.com");
        assert_eq!(endpoint.signing_service, "monitoring");
    }

    #[test]
    fn test_should_resolve_s3_virtual_hosts() {
        let endpoint = resolve("s3", "eu-west-1", json!({"Bucket": "photos"}));
        assert_eq!(endpoint.url, "https://photos.s3.eu-west-1.amazonaws.com");
        let endpoint = resolve("s3", "us-east-1", json!({"Bucket": "photos"}));
        assert_eq!(endpoint.url, "https://photos.s3.amazonaws.com");
        let endpoint = resolve("s3", "us-east-1", json!({"Bucket": ""}));
        assert_eq!(endpoint.url, "https://s3.amazonaws.com");
        let endpoint = resolve("s3", "eu-west-1", json!({"Bucket": "my.dotted.bucket"}));
        assert_eq!(endpoint.url, "https://s3.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_should_resolve_iam_globally() {
        let endpoint = resolve("iam", "eu-central-1", json!({}));
        assert_eq!(endpoint.url, "https://iam.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-east-1");
    }

    #[test]
    fn test_should_resolve_global_services_per_partition() {
        let endpoint = resolve("route53", "eu-west-1", json!({}));
        assert_eq!(endpoint.url, "https://route53.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-east-1");

        let endpoint = resolve("cloudfront", "ap-southeast-2", json!({}));
        assert_eq!(endpoint.url, "https://cloudfront.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-east-1");

        let endpoint = resolve("organizations", "us-west-2", json!({}));
        assert_eq!(endpoint.url, "https://organizations.us-east-1.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-east-1");

        let endpoint = resolve("iam", "cn-northwest-1", json!({}));
        assert_eq!(endpoint.url, "https://iam.cn-north-1.amazonaws.com.cn");
        assert_eq!(endpoint.signing_region, "cn-north-1");

        let endpoint = resolve("route53", "us-gov-east-1", json!({}));
        assert_eq!(endpoint.url, "https://route53.us-gov.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-gov-west-1");
    }

    #[test]
    fn test_should_resolve_sts_regionally_unless_global() {
        let endpoint = resolve("sts", "eu-west-1", json!({}));
        assert_eq!(endpoint.url, "https://sts.eu-west-1.amazonaws.com");
        assert_eq!(endpoint.signing_region, "eu-west-1");

        let endpoint = resolve("sts", "aws-global", json!({}));
        assert_eq!(endpoint.url, "https://sts.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-east-1");
    }

    #[test]
    fn test_should_use_partition_dns_suffix() {
        assert_eq!(
            resolve("sqs", "us-gov-west-1", json!({})).url,
            "https://sqs.us-gov-west-1.amazonaws.com"
        );
        assert_eq!(
            resolve("sqs", "us-iso-east-1", json!({})).url,
            "https://sqs.us-iso-east-1.c2s.ic.gov"
        );
        assert_eq!(
            resolve("s3", "cn-north-1", json!({"Bucket": "photos"})).url,
            "https://photos.s3.cn-north-1.amazonaws.com.cn"
        );
        assert_eq!(
            resolve("dynamodb", "eusc-de-east-1", json!({})).url,
            "https://dynamodb.eusc-de-east-1.amazonaws.eu"
        );
        assert_eq!(
            resolve("sqs", "aws-cn-global", json!({})).url,
            "https://sqs.cn-north-1.amazonaws.com.cn"
        );
    }

    #[test]
    fn test_should_map_endpoint_prefix_and_signing_name() {
        let endpoint = resolve("stepfunctions", "eu-west-1", json!({}));
        assert_eq!(endpoint.url, "https://states.eu-west-1.amazonaws.com");
        assert_eq!(endpoint.signing_service, "states");

        let endpoint = resolve("sesv2", "eu-west-1", json!({}));
        assert_eq!(endpoint.url, "https://email.eu-west-1.amazonaws.com");
        assert_eq!(endpoint.signing_service, "ses");
    }

    #[test]
    fn test_should_reject_missing_region() {
        let params = Map::new();
        assert!(DefaultEndpointResolver.resolve("sqs", "", &params).is_err());
    }

    #[test]
    fn test_should_resolve_everything_to_static_url() {
        let resolver = StaticEndpointResolver::new("http://127.0.0.1:9000/");
        let endpoint = resolver.resolve("sqs", "eu-west-1", &Map::new()).unwrap();
        assert_eq!(endpoint.url, "http://127.0.0.1:9000");
        assert_eq!(endpoint.signing_region, "eu-west-1");
    }
}
