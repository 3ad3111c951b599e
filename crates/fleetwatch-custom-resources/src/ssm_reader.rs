//! Reads SSM parameters from another region.
use std::future::Future;

use anyhow::Context;

pub trait ParameterSource {
    fn get_parameter(
        &self,
        name: &str,
        region: &str,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// Parameters read through `aws-sdk-ssm`, with one client per requested
/// region.
#[derive(Clone, Debug)]
pub struct SsmParameters {
    cfg: aws_config::SdkConfig,
}

impl SsmParameters {
    pub fn new(cfg: &aws_config::SdkConfig) -> Self {
        SsmParameters { cfg: cfg.clone() }
    }

    fn client(&self, region: &str) -> aws_sdk_ssm::Client {
        let config = aws_sdk_ssm::config::Builder::from(&self.cfg)
            .region(aws_sdk_ssm::config::Region::new(region.to_owned()))
            .build();
        aws_sdk_ssm::Client::from_conf(config)
    }
}

impl ParameterSource for SsmParameters {
    async fn get_parameter(&self, name: &str, region: &str) -> anyhow::Result<String> {
        tracing::info!("reading parameter '{name}' in {region}");
        let out = self
            .client(region)
            .get_parameter()
            .name(name)
            .send()
            .await
            .with_context(|| format!("could not get parameter '{name}' in {region}"))?;
        let value = out
            .parameter()
            .and_then(|p| p.value())
            .with_context(|| format!("parameter '{name}' has no value"))?;
        Ok(value.to_owned())
    }
}
