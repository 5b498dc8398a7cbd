//! Common AWS type definitions.

use std::fmt;

/// Regions recognized when extracting a region token from a hostname.
const KNOWN_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-east-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-southeast-5",
    "ap-southeast-6",
    "ap-southeast-7",
    "ca-central-1",
    "ca-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-isoe-west-1",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eusc-de-east-1",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "mx-central-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-iso-east-1",
    "us-iso-west-1",
    "us-isob-east-1",
    "us-isof-east-1",
    "us-isof-south-1",
    "us-west-1",
    "us-west-2",
];

/// AWS Account ID (12-digit string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Default account ID used by the local emulator.
    pub const DEFAULT: &str = "000000000000";

    /// Create a new account ID from a string.
    ///
    /// # Errors
    /// Returns an error if the account ID is not a 12-digit numeric string.
    pub fn new(id: impl Into<String>) -> Result<Self, crate::ProxyError> {
        let id = id.into();
        if !Self::is_valid(&id) {
            return Err(crate::ProxyError::InvalidAccountId(id));
        }
        Ok(Self(id))
    }

    /// Derive the account ID for an access key.
    ///
    /// The emulator treats a 12-digit access key as the account ID itself;
    /// any other key maps to [`AccountId::DEFAULT`].
    #[must_use]
    pub fn from_access_key(access_key_id: &str) -> Self {
        if Self::is_valid(access_key_id) {
            Self(access_key_id.to_owned())
        } else {
            Self::default()
        }
    }

    /// Get the account ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(id: &str) -> bool {
        id.len() == 12 && id.chars().all(|c| c.is_ascii_digit())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AWS Region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Default region.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Returns `true` if `name` is a known AWS region.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        KNOWN_REGIONS.binary_search(&name).is_ok()
    }

    /// Find the first known region token embedded in a hostname.
    ///
    /// The host is split on `.`, `:` and `/`, so both
    /// `sqs.us-east-2.amazonaws.com` and `localhost:4566/us-west-1` resolve.
    #[must_use]
    pub fn from_host(host: &str) -> Option<Self> {
        host.split(['.', ':', '/'])
            .find(|segment| Self::is_known(segment))
            .map(Self::new)
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_valid_account_id() {
        let id = AccountId::new("123456789012").unwrap();
        assert_eq!(id.as_str(), "123456789012");
    }

    #[test]
    fn test_should_reject_invalid_account_id() {
        assert!(AccountId::new("12345").is_err());
        assert!(AccountId::new("abcdefghijkl").is_err());
        assert!(AccountId::new("1234567890123").is_err());
    }

    #[test]
    fn test_should_derive_account_id_from_access_key() {
        assert_eq!(
            AccountId::from_access_key("111122223333").as_str(),
            "111122223333"
        );
        assert_eq!(AccountId::from_access_key("test").as_str(), "000000000000");
    }

    #[test]
    fn test_should_keep_known_regions_sorted() {
        let mut sorted = KNOWN_REGIONS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, KNOWN_REGIONS);
    }

    #[test]
    fn test_should_recognize_known_regions() {
        assert!(AwsRegion::is_known("us-east-2"));
        assert!(AwsRegion::is_known("eu-west-1"));
        assert!(!AwsRegion::is_known("localhost"));
        assert!(!AwsRegion::is_known("us-east-9"));
    }

    #[test]
    fn test_should_recognize_recent_regions() {
        for region in ["ap-east-2", "ap-southeast-6", "ap-southeast-7", "mx-central-1", "eusc-de-east-1"] {
            assert!(AwsRegion::is_known(region), "{region}");
        }
        assert_eq!(
            AwsRegion::from_host("photos.s3.ap-southeast-7.amazonaws.com"),
            Some(AwsRegion::new("ap-southeast-7"))
        );
        assert_eq!(
            AwsRegion::from_host("sqs.ap-east-2.localhost.localstack.cloud:4566"),
            Some(AwsRegion::new("ap-east-2"))
        );
    }

    #[test]
    fn test_should_extract_region_from_host() {
        assert_eq!(
            AwsRegion::from_host("sqs.us-east-2.localhost.localstack.cloud:4566"),
            Some(AwsRegion::new("us-east-2"))
        );
        assert_eq!(
            AwsRegion::from_host("localhost:4566/eu-central-1"),
            Some(AwsRegion::new("eu-central-1"))
        );
        assert_eq!(AwsRegion::from_host("localhost:4566"), None);
    }

    #[test]
    fn test_should_use_default_region() {
        let region = AwsRegion::default();
        assert_eq!(region.as_str(), "us-east-1");
    }
}
