//! CloudFront distributions and their policies.
use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct OriginAccessControlConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub origin_access_control_origin_type: String,
    pub signing_behavior: String,
    pub signing_protocol: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct OriginAccessControl {
    pub origin_access_control_config: OriginAccessControlConfig,
}

impl OriginAccessControl {
    /// Signs every request to an S3 origin with SigV4.
    pub fn s3(name: impl Into<String>) -> Self {
        OriginAccessControl {
            origin_access_control_config: OriginAccessControlConfig {
                name: name.into(),
                description: None,
                origin_access_control_origin_type: "s3".to_owned(),
                signing_behavior: "always".to_owned(),
                signing_protocol: "sigv4".to_owned(),
            },
        }
    }
}

impl Resource for OriginAccessControl {
    type Output = Token;

    fn resource_type(&self) -> &str {
        "AWS::CloudFront::OriginAccessControl"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        Token::attribute(logical_id, "Id")
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct ParametersInCacheKeyAndForwardedToOrigin {
    pub enable_accept_encoding_gzip: bool,
    pub enable_accept_encoding_brotli: bool,
    pub cookies_config: serde_json::Value,
    pub headers_config: serde_json::Value,
    pub query_strings_config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
pub struct CachePolicyConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "DefaultTTL")]
    pub default_ttl: u64,
    #[serde(rename = "MinTTL")]
    pub min_ttl: u64,
    #[serde(rename = "MaxTTL")]
    pub max_ttl: u64,
    #[serde(rename = "ParametersInCacheKeyAndForwardedToOrigin")]
    pub parameters: ParametersInCacheKeyAndForwardedToOrigin,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct CachePolicy {
    pub cache_policy_config: CachePolicyConfig,
}

impl CachePolicy {
    /// A policy caching on nothing but the path, with compression enabled.
    pub fn new(name: impl Into<String>, default_ttl: u64) -> Self {
        CachePolicy {
            cache_policy_config: CachePolicyConfig {
                name: name.into(),
                comment: None,
                default_ttl,
                min_ttl: 0,
                max_ttl: 31_536_000,
                parameters: ParametersInCacheKeyAndForwardedToOrigin {
                    enable_accept_encoding_gzip: true,
                    enable_accept_encoding_brotli: true,
                    cookies_config: serde_json::json!({ "CookieBehavior": "none" }),
                    headers_config: serde_json::json!({ "HeaderBehavior": "none" }),
                    query_strings_config: serde_json::json!({ "QueryStringBehavior": "none" }),
                },
            },
        }
    }
}

impl Resource for CachePolicy {
    type Output = Token;

    fn resource_type(&self) -> &str {
        "AWS::CloudFront::CachePolicy"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        Token::attribute(logical_id, "Id")
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct S3OriginConfig {
    /// Empty when access is granted through an origin access control.
    pub origin_access_identity: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: Token,
    pub s3_origin_config: S3OriginConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_access_control_id: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: String,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub cache_policy_id: Token,
    pub compress: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
pub struct CustomErrorResponse {
    #[serde(rename = "ErrorCode")]
    pub error_code: u16,
    #[serde(rename = "ResponseCode")]
    pub response_code: u16,
    #[serde(rename = "ResponsePagePath")]
    pub response_page_path: String,
    #[serde(rename = "ErrorCachingMinTTL")]
    pub error_caching_min_ttl: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    pub cloud_front_default_certificate: bool,
    pub minimum_protocol_version: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub enabled: bool,
    pub default_root_object: String,
    pub http_version: String,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_error_responses: Vec<CustomErrorResponse>,
    #[serde(rename = "WebACLId", skip_serializing_if = "Option::is_none")]
    pub web_acl_id: Option<Token>,
    pub viewer_certificate: ViewerCertificate,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Distribution {
    pub distribution_config: DistributionConfig,
}

#[derive(Clone, Debug)]
pub struct DistributionOutput {
    pub id: Token,
    pub domain_name: Token,
}

impl Resource for Distribution {
    type Output = DistributionOutput;

    fn resource_type(&self) -> &str {
        "AWS::CloudFront::Distribution"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        DistributionOutput {
            id: Token::reference(logical_id),
            domain_name: Token::attribute(logical_id, "DomainName"),
        }
    }
}
