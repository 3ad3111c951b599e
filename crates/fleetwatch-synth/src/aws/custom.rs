//! CloudFormation custom resources.
use std::collections::BTreeMap;

use crate::{HasDependencies, Resource, Token};

/// A custom resource property value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(untagged)]
pub enum PropertyValue {
    Single(Token),
    List(Vec<Token>),
}

impl From<Token> for PropertyValue {
    fn from(value: Token) -> Self {
        PropertyValue::Single(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Single(value.into())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Single(value.into())
    }
}

impl From<Vec<Token>> for PropertyValue {
    fn from(value: Vec<Token>) -> Self {
        PropertyValue::List(value)
    }
}

/// A resource backed by a Lambda function, eg `Custom::FleetIndexing`.
///
/// Properties are handed to the function verbatim, next to `ServiceToken`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
pub struct CustomResource {
    #[serde(skip)]
    pub resource_type: String,
    #[serde(rename = "ServiceToken")]
    pub service_token: Token,
    #[serde(flatten)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl CustomResource {
    pub fn new(resource_type: impl Into<String>, service_token: Token) -> Self {
        CustomResource {
            resource_type: resource_type.into(),
            service_token,
            properties: BTreeMap::default(),
        }
    }

    pub fn with_property(self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        let mut properties = self.properties;
        properties.insert(name.into(), value.into());
        CustomResource { properties, ..self }
    }
}

#[derive(Clone, Debug)]
pub struct CustomResourceOutput {
    logical_id: String,
}

impl CustomResourceOutput {
    /// The physical id reported by the handler.
    pub fn reference(&self) -> Token {
        Token::reference(&self.logical_id)
    }

    /// A value from the `Data` reported by the handler.
    pub fn attribute(&self, name: &str) -> Token {
        Token::attribute(&self.logical_id, name)
    }
}

impl Resource for CustomResource {
    type Output = CustomResourceOutput;

    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        CustomResourceOutput {
            logical_id: logical_id.to_owned(),
        }
    }
}
