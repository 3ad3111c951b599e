//! S3 buckets.
use crate::{HasDependencies, Resource, Token};

use super::iam::PolicyDocument;

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlockConfiguration {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    pub fn block_all() -> Self {
        PublicAccessBlockConfiguration {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, HasDependencies)]
pub enum Encryption {
    /// SSE-S3
    S3Managed,
    KmsManaged,
}

#[derive(Debug, Clone, PartialEq, HasDependencies)]
pub struct Bucket {
    pub bucket_name: Option<String>,
    pub encryption: Option<Encryption>,
    pub public_access_block: Option<PublicAccessBlockConfiguration>,
}

impl serde::Serialize for Bucket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        if let Some(name) = &self.bucket_name {
            map.serialize_entry("BucketName", name)?;
        }
        if let Some(encryption) = self.encryption {
            let algorithm = match encryption {
                Encryption::S3Managed => "AES256",
                Encryption::KmsManaged => "aws:kms",
            };
            map.serialize_entry(
                "BucketEncryption",
                &serde_json::json!({
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": { "SSEAlgorithm": algorithm }
                    }]
                }),
            )?;
        }
        if let Some(block) = &self.public_access_block {
            map.serialize_entry("PublicAccessBlockConfiguration", block)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug)]
pub struct BucketOutput {
    pub name: Token,
    pub arn: Token,
    pub regional_domain_name: Token,
}

impl BucketOutput {
    /// ARN covering every object in the bucket.
    pub fn objects_arn(&self) -> Token {
        Token::concat([self.arn.clone(), "/*".into()])
    }
}

impl Resource for Bucket {
    type Output = BucketOutput;

    fn resource_type(&self) -> &str {
        "AWS::S3::Bucket"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        BucketOutput {
            name: Token::reference(logical_id),
            arn: Token::attribute(logical_id, "Arn"),
            regional_domain_name: Token::attribute(logical_id, "RegionalDomainName"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct BucketPolicy {
    pub bucket: Token,
    pub policy_document: PolicyDocument,
}

impl Resource for BucketPolicy {
    type Output = ();

    fn resource_type(&self) -> &str {
        "AWS::S3::BucketPolicy"
    }

    fn output(&self, _logical_id: &str) -> Self::Output {}
}
