//! SSM parameters.
use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Type")]
    pub kind: String,
    pub value: Token,
}

impl Parameter {
    /// A plain `String` parameter.
    pub fn string(name: impl Into<String>, value: impl Into<Token>) -> Self {
        Parameter {
            name: Some(name.into()),
            description: None,
            kind: "String".to_owned(),
            value: value.into(),
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Parameter {
            description: Some(description.into()),
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParameterOutput {
    pub name: Token,
}

impl Resource for Parameter {
    type Output = ParameterOutput;

    fn resource_type(&self) -> &str {
        "AWS::SSM::Parameter"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        ParameterOutput {
            name: Token::reference(logical_id),
        }
    }
}
