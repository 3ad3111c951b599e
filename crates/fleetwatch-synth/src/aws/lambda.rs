//! AWS Lambda infrastructure.
use std::collections::BTreeMap;

use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum Runtime {
    #[serde(rename = "python3.10")]
    Python310,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum Architecture {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

/// Location of a deployment package in S3.
#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Code {
    pub s3_bucket: String,
    pub s3_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Environment {
    pub variables: BTreeMap<String, Token>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub runtime: Runtime,
    pub handler: String,
    pub code: Code,
    pub role: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<Architecture>,
}

impl Function {
    pub fn new(runtime: Runtime, handler: impl Into<String>, code: Code, role: Token) -> Self {
        Function {
            description: None,
            runtime,
            handler: handler.into(),
            code,
            role,
            timeout: None,
            memory_size: None,
            layers: vec![],
            environment: None,
            architectures: vec![],
        }
    }

    /// Timeout in seconds.
    pub fn with_timeout(self, timeout: u32) -> Self {
        Function {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Memory in megabytes.
    pub fn with_memory_size(self, memory_size: u32) -> Self {
        Function {
            memory_size: Some(memory_size),
            ..self
        }
    }

    pub fn with_layers(self, layers: impl IntoIterator<Item = Token>) -> Self {
        let mut all = self.layers;
        all.extend(layers);
        Function {
            layers: all,
            ..self
        }
    }

    pub fn with_env(self, name: impl Into<String>, value: impl Into<Token>) -> Self {
        let mut environment = self.environment.unwrap_or_default();
        environment.variables.insert(name.into(), value.into());
        Function {
            environment: Some(environment),
            ..self
        }
    }

    pub fn with_architecture(self, architecture: Architecture) -> Self {
        Function {
            architectures: vec![architecture],
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionOutput {
    pub arn: Token,
    pub name: Token,
}

impl Resource for Function {
    type Output = FunctionOutput;

    fn resource_type(&self) -> &str {
        "AWS::Lambda::Function"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        FunctionOutput {
            arn: Token::attribute(logical_id, "Arn"),
            name: Token::reference(logical_id),
        }
    }
}

/// Grants a service principal permission to invoke a function.
#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Permission {
    pub action: String,
    pub function_name: Token,
    pub principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_arn: Option<Token>,
}

impl Permission {
    pub fn invoke(function_name: Token, principal: impl Into<String>) -> Self {
        Permission {
            action: "lambda:InvokeFunction".to_owned(),
            function_name,
            principal: principal.into(),
            source_arn: None,
        }
    }
}

impl Resource for Permission {
    type Output = ();

    fn resource_type(&self) -> &str {
        "AWS::Lambda::Permission"
    }

    fn output(&self, _logical_id: &str) -> Self::Output {}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct LayerVersion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: Code,
    pub compatible_runtimes: Vec<Runtime>,
}

#[derive(Clone, Debug)]
pub struct LayerVersionOutput {
    pub arn: Token,
}

impl Resource for LayerVersion {
    type Output = LayerVersionOutput;

    fn resource_type(&self) -> &str {
        "AWS::Lambda::LayerVersion"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        LayerVersionOutput {
            arn: Token::reference(logical_id),
        }
    }
}
