//! Cognito user pool, web client and identity pool.
//!
//! Users are created by administrators only. Signed in users get the
//! authenticated role through the identity pool.
use std::collections::BTreeMap;

use snafu::prelude::*;
use synth::{
    aws::{
        cognito::{
            AdminCreateUserConfig, CognitoIdentityProvider, IdentityPool,
            IdentityPoolRoleAttachment, MfaConfiguration, PasswordPolicy, Policies,
            SmsConfiguration, UserPool, UserPoolClient,
        },
        iam::{Conditions, PolicyDocument, Principal, Role, Statement},
        ssm::Parameter,
    },
    DeletionPolicy, Stack, Token,
};

use crate::{config::Config, MissingIdentityProviderSnafu, Result};

pub const IDENTITY_SERVICE: &str = "cognito-identity.amazonaws.com";

pub const WEB_CLIENT_AUTH_FLOWS: [&str; 4] = [
    "ALLOW_USER_PASSWORD_AUTH",
    "ALLOW_USER_SRP_AUTH",
    "ALLOW_CUSTOM_AUTH",
    "ALLOW_REFRESH_TOKEN_AUTH",
];

pub fn user_pool(sms_role_arn: Token, external_id: impl Into<String>) -> UserPool {
    UserPool {
        user_pool_name: None,
        admin_create_user_config: AdminCreateUserConfig {
            allow_admin_create_user_only: true,
        },
        policies: Policies {
            password_policy: PasswordPolicy {
                minimum_length: 8,
                require_lowercase: true,
                require_uppercase: true,
                require_numbers: true,
                require_symbols: true,
            },
        },
        mfa_configuration: MfaConfiguration::Optional,
        enabled_mfas: vec!["SMS_MFA".to_owned(), "SOFTWARE_TOKEN_MFA".to_owned()],
        sms_configuration: Some(SmsConfiguration {
            sns_caller_arn: sms_role_arn,
            external_id: external_id.into(),
        }),
        alias_attributes: vec!["email".to_owned(), "preferred_username".to_owned()],
        auto_verified_attributes: vec!["email".to_owned()],
    }
}

/// The role Cognito sends SMS messages with.
fn sms_role(external_id: &str) -> Role {
    Role {
        description: None,
        assume_role_policy_document: PolicyDocument::new([Statement::allow(
            ["sts:AssumeRole"],
            Vec::<Token>::new(),
        )
        .with_principal(Principal::Service("cognito-idp.amazonaws.com".to_owned()))
        .with_condition("StringEquals", "sts:ExternalId", external_id)]),
        managed_policy_arns: vec![],
        policies: vec![],
    }
    .with_policy("UserPoolSmsPolicy", [Statement::allow(["sns:Publish"], ["*"])])
}

#[derive(Clone, Debug)]
pub struct IdentityPoolProps {
    pub providers: Vec<CognitoIdentityProvider>,
}

#[derive(Clone, Debug)]
pub struct IdentityPoolOutputs {
    pub id: Token,
    pub authenticated_role_arn: Token,
}

/// Declares an identity pool over `providers` with its authenticated role.
///
/// Errs if there are no providers.
pub fn identity_pool(stack: &mut Stack, props: &IdentityPoolProps) -> Result<IdentityPoolOutputs> {
    ensure!(!props.providers.is_empty(), MissingIdentityProviderSnafu);
    let pool = stack.resource(
        "IdentityPool",
        IdentityPool {
            identity_pool_name: None,
            allow_unauthenticated_identities: false,
            cognito_identity_providers: props.providers.clone(),
        },
    )?;
    let mut conditions = Conditions::new();
    conditions.insert(
        "StringEquals".to_owned(),
        BTreeMap::from([(
            format!("{IDENTITY_SERVICE}:aud"),
            pool.output().id.clone(),
        )]),
    );
    conditions.insert(
        "ForAnyValue:StringLike".to_owned(),
        BTreeMap::from([(format!("{IDENTITY_SERVICE}:amr"), "authenticated".into())]),
    );
    let role = stack.resource(
        "DefaultAuthenticatedRole",
        Role::assumed_by_federated(IDENTITY_SERVICE, conditions),
    )?;
    stack.resource(
        "IdentityPoolRoleAttachment",
        IdentityPoolRoleAttachment {
            identity_pool_id: pool.output().id.clone(),
            roles: BTreeMap::from([("authenticated".to_owned(), role.output().arn.clone())]),
        },
    )?;
    Ok(IdentityPoolOutputs {
        id: pool.output().id.clone(),
        authenticated_role_arn: role.output().arn.clone(),
    })
}

#[derive(Clone, Debug)]
pub struct IdentityOutputs {
    pub user_pool_id: Token,
    pub user_pool_arn: Token,
    pub web_client_id: Token,
    pub identity_pool_id: Token,
    pub authenticated_role_arn: Token,
}

pub fn identity(stack: &mut Stack, config: &Config) -> Result<IdentityOutputs> {
    let external_id = format!("{}-UserPool", config.stack_name);
    let sms_role = stack.resource("UserPoolSmsRole", sms_role(&external_id))?;
    let user_pool = stack.resource(
        "UserPool",
        user_pool(sms_role.output().arn.clone(), external_id),
    )?;
    user_pool.deletion_policy(stack, DeletionPolicy::Delete)?;
    let web_client = stack.resource(
        "UserPoolWebClient",
        UserPoolClient {
            user_pool_id: user_pool.output().id.clone(),
            client_name: Some("WebClient".to_owned()),
            generate_secret: false,
            explicit_auth_flows: WEB_CLIENT_AUTH_FLOWS.map(str::to_owned).to_vec(),
            supported_identity_providers: vec!["COGNITO".to_owned()],
        },
    )?;
    let identity_pool = identity_pool(
        stack,
        &IdentityPoolProps {
            providers: vec![CognitoIdentityProvider {
                client_id: web_client.output().id.clone(),
                provider_name: user_pool.output().provider_name.clone(),
                server_side_token_check: false,
            }],
        },
    )?;

    let parameters = [
        ("CognitoUserPoolIdParameter", "user-pool-id", &user_pool.output().id),
        ("CognitoIdentityPoolIdParameter", "identity-pool-id", &identity_pool.id),
        ("CognitoWebClientIdParameter", "web-client-id", &web_client.output().id),
    ];
    for (id, name, value) in parameters {
        stack.resource(
            id,
            Parameter::string(format!("/{}/cognito/{name}", config.stack_name), value),
        )?;
    }

    Ok(IdentityOutputs {
        user_pool_id: user_pool.output().id.clone(),
        user_pool_arn: user_pool.output().arn.clone(),
        web_client_id: web_client.output().id.clone(),
        identity_pool_id: identity_pool.id,
        authenticated_role_arn: identity_pool.authenticated_role_arn,
    })
}
