//! IAM roles and policy documents.
use std::collections::BTreeMap;

use crate::{HasDependencies, Resource, Token};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl HasDependencies for Effect {}

#[derive(Clone, Debug, PartialEq, serde::Serialize, HasDependencies)]
pub enum Principal {
    Service(String),
    Federated(String),
    #[serde(rename = "*")]
    Anyone,
}

/// Condition operator -> condition key -> value.
pub type Conditions = BTreeMap<String, BTreeMap<String, Token>>;

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Token>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Conditions,
}

impl Statement {
    pub fn allow<A, R>(
        actions: impl IntoIterator<Item = A>,
        resources: impl IntoIterator<Item = R>,
    ) -> Self
    where
        A: Into<String>,
        R: Into<Token>,
    {
        Statement {
            effect: Effect::Allow,
            action: actions.into_iter().map(Into::into).collect(),
            resource: resources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn deny<A, R>(
        actions: impl IntoIterator<Item = A>,
        resources: impl IntoIterator<Item = R>,
    ) -> Self
    where
        A: Into<String>,
        R: Into<Token>,
    {
        Statement {
            effect: Effect::Deny,
            ..Self::allow(actions, resources)
        }
    }

    pub fn with_principal(self, principal: Principal) -> Self {
        Statement {
            principal: Some(principal),
            ..self
        }
    }

    pub fn with_condition(
        self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Token>,
    ) -> Self {
        let mut condition = self.condition;
        condition
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        Statement { condition, ..self }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: impl IntoIterator<Item = Statement>) -> Self {
        PolicyDocument {
            version: POLICY_VERSION.to_owned(),
            statement: statement.into_iter().collect(),
        }
    }
}

/// An inline policy.
#[derive(Clone, Debug, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
}

impl Role {
    /// A role that the given service principal may assume.
    pub fn assumed_by_service(service: impl Into<String>) -> Self {
        Role {
            description: None,
            assume_role_policy_document: PolicyDocument::new([Statement::allow(
                ["sts:AssumeRole"],
                Vec::<Token>::new(),
            )
            .with_principal(Principal::Service(service.into()))]),
            managed_policy_arns: vec![],
            policies: vec![],
        }
    }

    /// A role assumed through web identity federation.
    pub fn assumed_by_federated(provider: impl Into<String>, conditions: Conditions) -> Self {
        let mut statement = Statement::allow(["sts:AssumeRoleWithWebIdentity"], Vec::<Token>::new())
            .with_principal(Principal::Federated(provider.into()));
        statement.condition = conditions;
        Role {
            description: None,
            assume_role_policy_document: PolicyDocument::new([statement]),
            managed_policy_arns: vec![],
            policies: vec![],
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Role {
            description: Some(description.into()),
            ..self
        }
    }

    /// Attaches an AWS managed policy, eg `service-role/AWSLambdaBasicExecutionRole`.
    pub fn with_managed_policy(self, name: &str) -> Self {
        let mut managed_policy_arns = self.managed_policy_arns;
        managed_policy_arns.push(super::managed_policy_arn(name));
        Role {
            managed_policy_arns,
            ..self
        }
    }

    /// Adds an inline policy made of the given statements.
    ///
    /// An empty set of statements adds nothing.
    pub fn with_policy(
        self,
        name: impl Into<String>,
        statements: impl IntoIterator<Item = Statement>,
    ) -> Self {
        let document = PolicyDocument::new(statements);
        if document.statement.is_empty() {
            return self;
        }
        let mut policies = self.policies;
        policies.push(Policy {
            policy_name: name.into(),
            policy_document: document,
        });
        Role { policies, ..self }
    }
}

#[derive(Clone, Debug)]
pub struct RoleOutput {
    pub arn: Token,
    pub name: Token,
}

impl Resource for Role {
    type Output = RoleOutput;

    fn resource_type(&self) -> &str {
        "AWS::IAM::Role"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        RoleOutput {
            arn: Token::attribute(logical_id, "Arn"),
            name: Token::reference(logical_id),
        }
    }
}
