//! Cognito user pools and identity pools.
use std::collections::BTreeMap;

use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordPolicy {
    pub minimum_length: u32,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_numbers: bool,
    pub require_symbols: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Policies {
    pub password_policy: PasswordPolicy,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct AdminCreateUserConfig {
    pub allow_admin_create_user_only: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct SmsConfiguration {
    pub sns_caller_arn: Token,
    pub external_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum MfaConfiguration {
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OPTIONAL")]
    Optional,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct UserPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pool_name: Option<String>,
    pub admin_create_user_config: AdminCreateUserConfig,
    pub policies: Policies,
    pub mfa_configuration: MfaConfiguration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enabled_mfas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_configuration: Option<SmsConfiguration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alias_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auto_verified_attributes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct UserPoolOutput {
    pub id: Token,
    pub arn: Token,
    pub provider_name: Token,
}

impl Resource for UserPool {
    type Output = UserPoolOutput;

    fn resource_type(&self) -> &str {
        "AWS::Cognito::UserPool"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        UserPoolOutput {
            id: Token::reference(logical_id),
            arn: Token::attribute(logical_id, "Arn"),
            provider_name: Token::attribute(logical_id, "ProviderName"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolClient {
    pub user_pool_id: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub generate_secret: bool,
    pub explicit_auth_flows: Vec<String>,
    pub supported_identity_providers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct UserPoolClientOutput {
    pub id: Token,
}

impl Resource for UserPoolClient {
    type Output = UserPoolClientOutput;

    fn resource_type(&self) -> &str {
        "AWS::Cognito::UserPoolClient"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        UserPoolClientOutput {
            id: Token::reference(logical_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct CognitoIdentityProvider {
    pub client_id: Token,
    pub provider_name: Token,
    pub server_side_token_check: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_pool_name: Option<String>,
    pub allow_unauthenticated_identities: bool,
    pub cognito_identity_providers: Vec<CognitoIdentityProvider>,
}

#[derive(Clone, Debug)]
pub struct IdentityPoolOutput {
    pub id: Token,
}

impl Resource for IdentityPool {
    type Output = IdentityPoolOutput;

    fn resource_type(&self) -> &str {
        "AWS::Cognito::IdentityPool"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        IdentityPoolOutput {
            id: Token::reference(logical_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityPoolRoleAttachment {
    pub identity_pool_id: Token,
    /// `authenticated` and/or `unauthenticated` -> role ARN.
    pub roles: BTreeMap<String, Token>,
}

impl Resource for IdentityPoolRoleAttachment {
    type Output = ();

    fn resource_type(&self) -> &str {
        "AWS::Cognito::IdentityPoolRoleAttachment"
    }

    fn output(&self, _logical_id: &str) -> Self::Output {}
}
