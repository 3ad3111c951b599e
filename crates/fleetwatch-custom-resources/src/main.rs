use fleetwatch_custom_resources::{
    cfn::{self, CustomResourceResponse},
    handler::{self, Services},
    indexing::aws::IotIndexing,
    ssm_reader::SsmParameters,
};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn function_handler(
    services: &Services<IotIndexing, SsmParameters>,
    http: &reqwest::Client,
    event: LambdaEvent<Value>,
) -> Result<CustomResourceResponse, Error> {
    let (url, response) = handler::answer(services, event.payload).await?;
    cfn::send_response(http, &url, &response).await?;
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();
    let cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let services = Services {
        indexing: IotIndexing::new(&cfg),
        parameters: SsmParameters::new(&cfg),
    };
    let http = reqwest::Client::new();
    lambda_runtime::run(service_fn(|event| {
        function_handler(&services, &http, event)
    }))
    .await
}
