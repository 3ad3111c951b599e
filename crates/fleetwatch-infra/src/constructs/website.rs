//! The web app: a private bucket served through CloudFront.
use synth::{
    aws::{
        cloudfront::{
            CachePolicy, CustomErrorResponse, DefaultCacheBehavior, Distribution,
            DistributionConfig, Origin, OriginAccessControl, S3OriginConfig, ViewerCertificate,
        },
        iam::{PolicyDocument, Principal, Statement},
        s3::{Bucket, BucketPolicy, Encryption, PublicAccessBlockConfiguration},
    },
    DeletionPolicy, Stack, Token,
};

use crate::{config::Config, Result};

pub const ORIGIN_ID: &str = "SiteBucketOrigin";
pub const INDEX_DOCUMENT: &str = "index.html";
/// One hour.
pub const DEFAULT_TTL: u64 = 3600;
pub const MINIMUM_PROTOCOL_VERSION: &str = "TLSv1.2_2021";

pub const OUTPUT_SITE_BUCKET: &str = "SiteBucket";
pub const OUTPUT_DISTRIBUTION_ID: &str = "CloudFrontDistributionId";
pub const OUTPUT_DOMAIN_NAME: &str = "DomainName";
pub const OUTPUT_URL: &str = "Url";

pub const ALL_METHODS: [&str; 7] = ["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"];

pub struct WebsiteProps {
    /// Web ACL guarding the distribution.
    pub web_acl_arn: Option<Token>,
}

#[derive(Clone, Debug)]
pub struct WebsiteOutputs {
    pub bucket_name: Token,
    pub distribution_id: Token,
    pub domain_name: Token,
    pub url: Token,
}

/// Single page app routing: unknown paths get the index document.
fn spa_error_responses() -> Vec<CustomErrorResponse> {
    [403, 404]
        .into_iter()
        .map(|error_code| CustomErrorResponse {
            error_code,
            response_code: 200,
            response_page_path: format!("/{INDEX_DOCUMENT}"),
            error_caching_min_ttl: 0,
        })
        .collect()
}

pub fn website(stack: &mut Stack, config: &Config, props: &WebsiteProps) -> Result<WebsiteOutputs> {
    let bucket = stack.resource(
        "SiteBucket",
        Bucket {
            bucket_name: None,
            encryption: Some(Encryption::S3Managed),
            public_access_block: Some(PublicAccessBlockConfiguration::block_all()),
        },
    )?;
    bucket.deletion_policy(stack, DeletionPolicy::Delete)?;

    let access_control = stack.resource(
        "SiteOriginAccessControl",
        OriginAccessControl::s3(format!("{}-site", config.stack_name)),
    )?;
    let cache_policy = stack.resource(
        "SiteCachePolicy",
        CachePolicy::new(format!("{}-site", config.stack_name), DEFAULT_TTL),
    )?;
    let distribution = stack.resource(
        "SiteDistribution",
        Distribution {
            distribution_config: DistributionConfig {
                comment: Some(format!("{} web app", config.stack_name)),
                enabled: true,
                default_root_object: INDEX_DOCUMENT.to_owned(),
                http_version: "http2".to_owned(),
                origins: vec![Origin {
                    id: ORIGIN_ID.to_owned(),
                    domain_name: bucket.output().regional_domain_name.clone(),
                    s3_origin_config: S3OriginConfig {
                        origin_access_identity: String::new(),
                    },
                    origin_access_control_id: Some(access_control.output().clone()),
                }],
                default_cache_behavior: DefaultCacheBehavior {
                    target_origin_id: ORIGIN_ID.to_owned(),
                    viewer_protocol_policy: "https-only".to_owned(),
                    allowed_methods: ALL_METHODS.map(str::to_owned).to_vec(),
                    cached_methods: vec!["GET".to_owned(), "HEAD".to_owned()],
                    cache_policy_id: cache_policy.output().clone(),
                    compress: true,
                },
                custom_error_responses: spa_error_responses(),
                web_acl_id: props.web_acl_arn.clone(),
                viewer_certificate: ViewerCertificate {
                    cloud_front_default_certificate: true,
                    minimum_protocol_version: MINIMUM_PROTOCOL_VERSION.to_owned(),
                },
            },
        },
    )?;

    let bucket_arns = [bucket.output().arn.clone(), bucket.output().objects_arn()];
    let distribution_arn = Token::concat([
        format!("arn:{}:cloudfront::{}:distribution/", synth::aws::PARTITION, config.account)
            .into(),
        distribution.output().id.clone(),
    ]);
    stack.resource(
        "SiteBucketPolicy",
        BucketPolicy {
            bucket: bucket.output().name.clone(),
            policy_document: PolicyDocument::new([
                Statement {
                    sid: Some("EnforceTLS".to_owned()),
                    ..Statement::deny(["s3:*"], bucket_arns)
                        .with_principal(Principal::Anyone)
                        .with_condition("Bool", "aws:SecureTransport", "false")
                },
                Statement {
                    sid: Some("AllowCloudFrontRead".to_owned()),
                    ..Statement::allow(["s3:GetObject"], [bucket.output().objects_arn()])
                        .with_principal(Principal::Service("cloudfront.amazonaws.com".to_owned()))
                        .with_condition("StringEquals", "AWS:SourceArn", distribution_arn)
                },
            ]),
        },
    )?;

    let outputs = WebsiteOutputs {
        bucket_name: bucket.output().name.clone(),
        distribution_id: distribution.output().id.clone(),
        domain_name: distribution.output().domain_name.clone(),
        url: Token::concat(["https://".into(), distribution.output().domain_name.clone()]),
    };
    stack.output(OUTPUT_SITE_BUCKET, &outputs.bucket_name, None)?;
    stack.output(OUTPUT_DISTRIBUTION_ID, &outputs.distribution_id, None)?;
    stack.output(OUTPUT_DOMAIN_NAME, &outputs.domain_name, None)?;
    stack.output(OUTPUT_URL, &outputs.url, None)?;
    Ok(outputs)
}
