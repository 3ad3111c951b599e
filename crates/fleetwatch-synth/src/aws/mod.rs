//! Typed AWS resource declarations.
//!
//! Each type serializes to the `Properties` of its CloudFormation resource.

pub mod appsync;
pub mod cloudfront;
pub mod cognito;
pub mod custom;
pub mod dynamodb;
pub mod events;
pub mod iam;
pub mod lambda;
pub mod logs;
pub mod s3;
pub mod ssm;
pub mod wafv2;

/// The only partition FleetWatch deploys to.
pub const PARTITION: &str = "aws";

/// Formats an ARN for a resource in the given service, region and account.
pub fn arn(service: &str, region: &str, account: &str, resource: &str) -> String {
    format!("arn:{PARTITION}:{service}:{region}:{account}:{resource}")
}

/// Formats the ARN of an AWS managed IAM policy.
pub fn managed_policy_arn(name: &str) -> String {
    format!("arn:{PARTITION}:iam::aws:policy/{name}")
}
