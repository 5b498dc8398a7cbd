//! Compiled forwarding rules for one service.
//!
//! Patterns are compiled once, when a proxy is registered. Matching is
//! prefix-anchored: a pattern must match starting at the first character of
//! the resource or operation name, but may stop before its end.

use regex::Regex;

use crate::error::{ProxyError, ProxyResult};
use crate::model::ProxyServiceConfig;

/// Compiled form of a [`ProxyServiceConfig`].
#[derive(Debug, Clone)]
pub struct ServiceRules {
    resources: Vec<Regex>,
    operations: Option<Vec<Regex>>,
    read_only: bool,
}

impl ServiceRules {
    /// Compile the patterns of a service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidPattern`] if any pattern fails to compile.
    pub fn compile(service: &str, config: &ProxyServiceConfig) -> ProxyResult<Self> {
        let resources = config
            .resource_names()
            .iter()
            .map(|pattern| compile_anchored(service, pattern))
            .collect::<ProxyResult<Vec<_>>>()?;

        let operations = config
            .operations
            .as_ref()
            .map(|patterns| {
                patterns
                    .iter()
                    .map(|pattern| compile_anchored(service, pattern))
                    .collect::<ProxyResult<Vec<_>>>()
            })
            .transpose()?;

        Ok(Self {
            resources,
            operations,
            read_only: config.read_only,
        })
    }

    /// Whether any candidate resource identifier matches any resource pattern.
    ///
    /// `None` means the service has no resource model; such requests always
    /// pass the resource check.
    #[must_use]
    pub fn matches_resource(&self, candidates: Option<&[String]>) -> bool {
        let Some(candidates) = candidates else {
            return true;
        };
        self.resources
            .iter()
            .any(|pattern| candidates.iter().any(|c| pattern.is_match(c)))
    }

    /// Whether the operation passes the configured operation patterns.
    #[must_use]
    pub fn matches_operation(&self, operation: &str) -> bool {
        self.operations
            .as_ref()
            .is_none_or(|patterns| patterns.iter().any(|p| p.is_match(operation)))
    }

    /// Whether only read-only requests may be forwarded.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.read_only
    }
}

fn compile_anchored(service: &str, pattern: &str) -> ProxyResult<Regex> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|source| ProxyError::InvalidPattern {
        service: service.to_owned(),
        pattern: pattern.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourcePatterns;

    fn rules(resources: &[&str], operations: Option<&[&str]>) -> ServiceRules {
        let config = ProxyServiceConfig {
            resources: Some(ResourcePatterns::Many(
                resources.iter().map(ToString::to_string).collect(),
            )),
            operations: operations.map(|ops| ops.iter().map(ToString::to_string).collect()),
            read_only: false,
        };
        ServiceRules::compile("test", &config).unwrap()
    }

    #[test]
    fn test_should_match_resource_as_prefix() {
        let rules = rules(&["arn:aws:s3:::my-bucket"], None);
        let hit = vec!["arn:aws:s3:::my-bucket-2".to_owned()];
        let miss = vec!["xarn:aws:s3:::my-bucket".to_owned()];
        assert!(rules.matches_resource(Some(&hit)));
        assert!(!rules.matches_resource(Some(&miss)));
    }

    #[test]
    fn test_should_match_any_candidate_against_any_pattern() {
        let rules = rules(&["nope", ".*:test-queue-aws"], None);
        let candidates = vec![
            "http://localhost/000000000000/test-queue-aws".to_owned(),
            "arn:aws:sqs:us-east-1:000000000000:test-queue-aws".to_owned(),
        ];
        assert!(rules.matches_resource(Some(&candidates)));
    }

    #[test]
    fn test_should_pass_services_without_resource_model() {
        let rules = rules(&["never"], None);
        assert!(rules.matches_resource(None));
    }

    #[test]
    fn test_should_match_operations_when_configured() {
        let rules = rules(&[".*"], Some(&["Get.*", "ListQueues"]));
        assert!(rules.matches_operation("GetQueueUrl"));
        assert!(rules.matches_operation("ListQueues"));
        assert!(!rules.matches_operation("SendMessage"));
    }

    #[test]
    fn test_should_allow_all_operations_when_unset() {
        assert!(rules(&[".*"], None).matches_operation("DeleteQueue"));
    }

    #[test]
    fn test_should_reject_invalid_operation_pattern() {
        let config = ProxyServiceConfig {
            operations: Some(vec!["Get[".to_owned()]),
            ..ProxyServiceConfig::default()
        };
        let err = ServiceRules::compile("sqs", &config).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidPattern { ref service, .. } if service == "sqs"));
    }
}
