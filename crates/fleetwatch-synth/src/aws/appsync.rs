//! AppSync GraphQL APIs, data sources and resolvers.
use crate::{HasDependencies, Resource, Token};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum AuthenticationType {
    #[serde(rename = "AMAZON_COGNITO_USER_POOLS")]
    UserPool,
    #[serde(rename = "AWS_IAM")]
    Iam,
    #[serde(rename = "API_KEY")]
    ApiKey,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolConfig {
    pub user_pool_id: Token,
    pub aws_region: String,
    /// `ALLOW` or `DENY`
    pub default_action: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct AdditionalAuthenticationProvider {
    pub authentication_type: AuthenticationType,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct LogConfig {
    pub cloud_watch_logs_role_arn: Token,
    /// `NONE`, `ERROR` or `ALL`
    pub field_log_level: String,
    pub exclude_verbose_content: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct GraphQlApi {
    pub name: String,
    pub authentication_type: AuthenticationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pool_config: Option<UserPoolConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_authentication_providers: Vec<AdditionalAuthenticationProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfig>,
    pub xray_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct GraphQlApiOutput {
    pub api_id: Token,
    pub arn: Token,
    pub graphql_url: Token,
}

impl Resource for GraphQlApi {
    type Output = GraphQlApiOutput;

    fn resource_type(&self) -> &str {
        "AWS::AppSync::GraphQLApi"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        GraphQlApiOutput {
            api_id: Token::attribute(logical_id, "ApiId"),
            arn: Token::attribute(logical_id, "Arn"),
            graphql_url: Token::attribute(logical_id, "GraphQLUrl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct GraphQlSchema {
    pub api_id: Token,
    pub definition: String,
}

impl Resource for GraphQlSchema {
    type Output = ();

    fn resource_type(&self) -> &str {
        "AWS::AppSync::GraphQLSchema"
    }

    fn output(&self, _logical_id: &str) -> Self::Output {}
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, HasDependencies)]
pub enum DataSourceType {
    #[serde(rename = "AWS_LAMBDA")]
    Lambda,
    #[serde(rename = "AMAZON_DYNAMODB")]
    DynamoDb,
    #[serde(rename = "NONE")]
    None,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct LambdaConfig {
    pub lambda_function_arn: Token,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct DynamoDbConfig {
    pub table_name: Token,
    pub aws_region: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct DataSource {
    pub api_id: Token,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Type")]
    pub kind: DataSourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_role_arn: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_config: Option<LambdaConfig>,
    #[serde(rename = "DynamoDBConfig", skip_serializing_if = "Option::is_none")]
    pub dynamo_db_config: Option<DynamoDbConfig>,
}

impl DataSource {
    pub fn lambda(
        api_id: Token,
        name: impl Into<String>,
        function_arn: Token,
        service_role_arn: Token,
    ) -> Self {
        DataSource {
            api_id,
            name: name.into(),
            description: None,
            kind: DataSourceType::Lambda,
            service_role_arn: Some(service_role_arn),
            lambda_config: Some(LambdaConfig {
                lambda_function_arn: function_arn,
            }),
            dynamo_db_config: None,
        }
    }

    pub fn dynamodb(
        api_id: Token,
        name: impl Into<String>,
        table_name: Token,
        region: impl Into<String>,
        service_role_arn: Token,
    ) -> Self {
        DataSource {
            api_id,
            name: name.into(),
            description: None,
            kind: DataSourceType::DynamoDb,
            service_role_arn: Some(service_role_arn),
            lambda_config: None,
            dynamo_db_config: Some(DynamoDbConfig {
                table_name,
                aws_region: region.into(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DataSourceOutput {
    pub arn: Token,
    pub name: Token,
}

impl Resource for DataSource {
    type Output = DataSourceOutput;

    fn resource_type(&self) -> &str {
        "AWS::AppSync::DataSource"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        DataSourceOutput {
            arn: Token::attribute(logical_id, "DataSourceArn"),
            name: Token::attribute(logical_id, "Name"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Resolver {
    pub api_id: Token,
    pub type_name: String,
    pub field_name: String,
    pub data_source_name: Token,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_mapping_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mapping_template: Option<String>,
}

impl Resolver {
    /// A `UNIT` resolver of `type_name.field_name`.
    pub fn unit(
        api_id: Token,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        data_source_name: Token,
    ) -> Self {
        Resolver {
            api_id,
            type_name: type_name.into(),
            field_name: field_name.into(),
            data_source_name,
            kind: "UNIT".to_owned(),
            request_mapping_template: None,
            response_mapping_template: None,
        }
    }

    pub fn with_templates(
        self,
        request: Option<impl Into<String>>,
        response: Option<impl Into<String>>,
    ) -> Self {
        Resolver {
            request_mapping_template: request.map(Into::into),
            response_mapping_template: response.map(Into::into),
            ..self
        }
    }
}

impl Resource for Resolver {
    type Output = Token;

    fn resource_type(&self) -> &str {
        "AWS::AppSync::Resolver"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        Token::attribute(logical_id, "ResolverArn")
    }
}
