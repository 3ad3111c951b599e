//! CloudWatch log groups.
use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_group_name: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_in_days: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct LogGroupOutput {
    pub name: Token,
    pub arn: Token,
}

impl Resource for LogGroup {
    type Output = LogGroupOutput;

    fn resource_type(&self) -> &str {
        "AWS::Logs::LogGroup"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        LogGroupOutput {
            name: Token::reference(logical_id),
            arn: Token::attribute(logical_id, "Arn"),
        }
    }
}
