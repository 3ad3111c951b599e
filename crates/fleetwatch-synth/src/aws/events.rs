//! EventBridge rules.
use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Target {
    pub arn: Token,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Rule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schedule_expression: String,
    pub state: String,
    pub targets: Vec<Target>,
}

impl Rule {
    /// An enabled rule firing on `schedule_expression`, eg `rate(1 minute)`.
    pub fn schedule(schedule_expression: impl Into<String>, targets: Vec<Target>) -> Self {
        Rule {
            description: None,
            schedule_expression: schedule_expression.into(),
            state: "ENABLED".to_owned(),
            targets,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuleOutput {
    pub arn: Token,
}

impl Resource for Rule {
    type Output = RuleOutput;

    fn resource_type(&self) -> &str {
        "AWS::Events::Rule"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        RuleOutput {
            arn: Token::attribute(logical_id, "Arn"),
        }
    }
}
