//! Construct builders.
//!
//! A construct is a function declaring a group of related resources:
//! `fn(&mut Stack, &Config, &Props) -> Result<Outputs>`. The outputs carry
//! the tokens later constructs need.
use synth::{
    aws::{
        appsync::{DataSource, GraphQlSchema, Resolver},
        dynamodb::{self, Table},
        iam::{Role, Statement},
        lambda::{Function, Runtime},
    },
    Stack, StackResource, Token,
};

use crate::{assets::AssetCatalog, config::Config, Result};

pub mod api;
pub mod custom_resources;
pub mod device_stats;
pub mod firewall;
pub mod fleet;
pub mod identity;
pub mod user_preferences;
pub mod website;

pub const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";
pub const PYTHON_HANDLER: &str = "handler.lambda_handler";
pub const PYTHON_PATH: &str = "/var/task:/opt/python";

/// Forwards errors reported by a resolver function and passes its data through.
pub const RESPONSE_TEMPLATE: &str = r#"
#if (!$util.isNull($ctx.result.errors))
  #foreach($error in $ctx.result.errors)
    $util.appendError($error.message, $error.type)
  #end
#end
$utils.toJson($ctx.result.data)"#;

/// Returns the result item of a DynamoDB resolver.
pub const DYNAMODB_RESULT_TEMPLATE: &str = "$util.toJson($ctx.result)";

/// `arn:aws:iot:<region>:<account>:<resource>`
pub fn iot_arn(config: &Config, resource: &str) -> String {
    synth::aws::arn("iot", &config.region, &config.account, resource)
}

/// ARN of the fleet index.
pub fn thing_index_arn(config: &Config) -> String {
    iot_arn(config, "index/AWS_Things")
}

/// Every Python function asset used by the app stack.
pub fn python_functions() -> Vec<&'static str> {
    let mut functions = fleet::FLEET_FUNCTIONS
        .iter()
        .map(|function| function.asset)
        .collect::<Vec<_>>();
    functions.extend(device_stats::FUNCTIONS);
    functions
}

/// Outputs of the [`api`] construct, shared by every resolver.
#[derive(Clone, Debug)]
pub struct ApiOutputs {
    pub api_id: Token,
    pub arn: Token,
    pub graphql_url: Token,
    /// ARN of the shared Python layer.
    pub layer_arn: Token,
    pub schema: StackResource<GraphQlSchema>,
}

/// A Python function declared with [`python_function`].
#[derive(Clone, Debug)]
pub struct PythonFunctionProps<'a> {
    /// Logical id prefix, eg `ListThings`.
    pub id: &'a str,
    pub asset: &'a str,
    pub runtime: Runtime,
    pub timeout: Option<u32>,
    pub memory_size: Option<u32>,
    pub statements: Vec<Statement>,
    pub env: Vec<(&'a str, Token)>,
    pub layer: Option<Token>,
}

#[derive(Clone, Debug)]
pub struct PythonFunction {
    pub role: StackResource<Role>,
    pub function: StackResource<Function>,
}

/// Declares `<id>Role` and `<id>Function`.
pub fn python_function(
    stack: &mut Stack,
    assets: &AssetCatalog,
    props: &PythonFunctionProps,
) -> Result<PythonFunction> {
    let role = stack.resource(
        format!("{}Role", props.id),
        Role::assumed_by_service("lambda.amazonaws.com")
            .with_managed_policy(BASIC_EXECUTION_POLICY)
            .with_policy(format!("{}Policy", props.id), props.statements.clone()),
    )?;
    let mut function = Function::new(
        props.runtime,
        PYTHON_HANDLER,
        assets.code(props.asset)?,
        role.output().arn.clone(),
    )
    .with_env("PYTHONPATH", PYTHON_PATH)
    .with_layers(props.layer.clone());
    if let Some(timeout) = props.timeout {
        function = function.with_timeout(timeout);
    }
    if let Some(memory_size) = props.memory_size {
        function = function.with_memory_size(memory_size);
    }
    for (name, value) in props.env.iter() {
        function = function.with_env(*name, value);
    }
    let function = stack.resource(format!("{}Function", props.id), function)?;
    Ok(PythonFunction { role, function })
}

/// Declares `<id>DataSource` invoking `function`, and the role AppSync
/// invokes it with.
pub fn lambda_data_source(
    stack: &mut Stack,
    api: &ApiOutputs,
    id: &str,
    function: &StackResource<Function>,
) -> Result<StackResource<DataSource>> {
    let arn = function.output().arn.clone();
    let role = stack.resource(
        format!("{id}DataSourceRole"),
        Role::assumed_by_service("appsync.amazonaws.com").with_policy(
            format!("{id}DataSourcePolicy"),
            [Statement::allow(
                ["lambda:InvokeFunction"],
                [arn.clone(), Token::concat([arn.clone(), ":*".into()])],
            )],
        ),
    )?;
    let data_source = stack.resource(
        format!("{id}DataSource"),
        DataSource::lambda(
            api.api_id.clone(),
            format!("{id}DataSource"),
            arn,
            role.output().arn.clone(),
        ),
    )?;
    Ok(data_source)
}

/// Declares `<id>DataSource` over `table`, with read and write access.
pub fn dynamodb_data_source(
    stack: &mut Stack,
    config: &Config,
    api: &ApiOutputs,
    id: &str,
    table: &StackResource<Table>,
) -> Result<StackResource<DataSource>> {
    let actions = dynamodb::READ_ACTIONS
        .into_iter()
        .chain(dynamodb::WRITE_ACTIONS)
        .fold(vec![], |mut actions, action| {
            if !actions.contains(&action) {
                actions.push(action);
            }
            actions
        });
    let role = stack.resource(
        format!("{id}DataSourceRole"),
        Role::assumed_by_service("appsync.amazonaws.com").with_policy(
            format!("{id}DataSourcePolicy"),
            [Statement::allow(
                actions,
                [table.output().arn.clone(), table.output().indexes_arn()],
            )],
        ),
    )?;
    let data_source = stack.resource(
        format!("{id}DataSource"),
        DataSource::dynamodb(
            api.api_id.clone(),
            format!("{id}DataSource"),
            table.output().name.clone(),
            &config.region,
            role.output().arn.clone(),
        ),
    )?;
    Ok(data_source)
}

/// Declares the resolver of `type_name.field_name`, eg `QueryListThingsResolver`.
///
/// Resolvers can only be created once the schema defines their field.
pub fn resolver(
    stack: &mut Stack,
    api: &ApiOutputs,
    type_name: &str,
    field_name: &str,
    data_source: &StackResource<DataSource>,
    request_template: Option<&str>,
    response_template: &str,
) -> Result<StackResource<Resolver>> {
    let id = format!("{type_name}{}Resolver", upper_first(field_name));
    let resolver = stack.resource(
        &id,
        Resolver::unit(
            api.api_id.clone(),
            type_name,
            field_name,
            data_source.output().name.clone(),
        )
        .with_templates(request_template, Some(response_template)),
    )?;
    resolver.depends_on(stack, &api.schema)?;
    Ok(resolver)
}

/// `listThings` -> `ListThings`
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
