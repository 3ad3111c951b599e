//! [`IndexingApi`] over the AWS IoT control plane.
use aws_sdk_iot::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{
        DeviceDefenderIndexingMode, IndexingFilter, NamedShadowIndexingMode,
        ThingConnectivityIndexingMode, ThingGroupIndexingConfiguration, ThingGroupIndexingMode,
        ThingIndexingConfiguration, ThingIndexingMode as SdkThingIndexingMode,
    },
};

use super::{
    decode_shadow_names, ApiError, ApiErrorKind, ConnectivityMode, DefenderMode, IndexingApi,
    IndexingConfiguration, ShadowNameEncoding, ThingIndexingMode, Toggle,
};

/// Reserved shadow holding software package versions.
pub const PACKAGE_SHADOW: &str = "$package";

#[derive(Clone, Debug)]
pub struct IotIndexing {
    client: aws_sdk_iot::Client,
}

impl IotIndexing {
    pub fn new(cfg: &aws_config::SdkConfig) -> Self {
        IotIndexing {
            client: aws_sdk_iot::Client::new(cfg),
        }
    }
}

fn classify<E>(err: &SdkError<E>) -> ApiErrorKind
where
    E: ProvideErrorMetadata,
{
    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
    ) {
        return ApiErrorKind::Transient;
    }
    match err.code() {
        Some("InvalidRequestException") => ApiErrorKind::Rejected,
        Some("ThrottlingException")
        | Some("ServiceUnavailableException")
        | Some("InternalFailureException") => ApiErrorKind::Transient,
        _ => ApiErrorKind::Other,
    }
}

fn api_error<E>(err: SdkError<E>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    ApiError::new(classify(&err), DisplayErrorContext(&err).to_string())
}

fn from_sdk(
    things: Option<&ThingIndexingConfiguration>,
    groups: Option<&ThingGroupIndexingConfiguration>,
) -> IndexingConfiguration {
    let mut cfg = IndexingConfiguration::default();
    if let Some(things) = things {
        cfg.thing_indexing = match things.thing_indexing_mode() {
            SdkThingIndexingMode::Registry => ThingIndexingMode::Registry,
            SdkThingIndexingMode::RegistryAndShadow => ThingIndexingMode::RegistryAndShadow,
            _ => ThingIndexingMode::Off,
        };
        if let Some(ThingConnectivityIndexingMode::Status) = things.thing_connectivity_indexing_mode()
        {
            cfg.connectivity = ConnectivityMode::Status;
        }
        if let Some(DeviceDefenderIndexingMode::Violations) = things.device_defender_indexing_mode() {
            cfg.device_defender = DefenderMode::Violations;
        }
        let names = decode_shadow_names(
            things
                .filter()
                .map(IndexingFilter::named_shadow_names)
                .unwrap_or_default(),
        );
        if let Some(NamedShadowIndexingMode::On) = things.named_shadow_indexing_mode() {
            cfg.named_shadows = Toggle::On;
            if names.iter().any(|name| name == PACKAGE_SHADOW) {
                cfg.packages = Toggle::On;
            }
        }
        cfg.named_shadow_names = names;
    }
    if let Some(ThingGroupIndexingMode::On) = groups.map(|g| g.thing_group_indexing_mode()) {
        cfg.thing_groups = Toggle::On;
    }
    cfg
}

fn to_sdk(
    cfg: &IndexingConfiguration,
    encoding: ShadowNameEncoding,
) -> Result<(ThingIndexingConfiguration, ThingGroupIndexingConfiguration), ApiError> {
    // Package versions are indexed through their reserved named shadow.
    let mut names = cfg.named_shadow_names.clone();
    if cfg.packages == Toggle::On && !names.iter().any(|n| n == PACKAGE_SHADOW) {
        names.push(PACKAGE_SHADOW.to_owned());
    }
    let named_shadows_on = cfg.named_shadows == Toggle::On || cfg.packages == Toggle::On;

    let filter = if names.is_empty() {
        None
    } else {
        Some(
            IndexingFilter::builder()
                .set_named_shadow_names(Some(encoding.encode(&names)))
                .build(),
        )
    };
    let things = ThingIndexingConfiguration::builder()
        .thing_indexing_mode(match cfg.thing_indexing {
            ThingIndexingMode::Off => SdkThingIndexingMode::Off,
            ThingIndexingMode::Registry => SdkThingIndexingMode::Registry,
            ThingIndexingMode::RegistryAndShadow => SdkThingIndexingMode::RegistryAndShadow,
        })
        .thing_connectivity_indexing_mode(match cfg.connectivity {
            ConnectivityMode::Off => ThingConnectivityIndexingMode::Off,
            ConnectivityMode::Status => ThingConnectivityIndexingMode::Status,
        })
        .device_defender_indexing_mode(match cfg.device_defender {
            DefenderMode::Off => DeviceDefenderIndexingMode::Off,
            DefenderMode::Violations => DeviceDefenderIndexingMode::Violations,
        })
        .named_shadow_indexing_mode(if named_shadows_on {
            NamedShadowIndexingMode::On
        } else {
            NamedShadowIndexingMode::Off
        })
        .set_filter(filter)
        .build()
        .map_err(|e| ApiError::new(ApiErrorKind::Other, e.to_string()))?;
    let groups = ThingGroupIndexingConfiguration::builder()
        .thing_group_indexing_mode(match cfg.thing_groups {
            Toggle::Off => ThingGroupIndexingMode::Off,
            Toggle::On => ThingGroupIndexingMode::On,
        })
        .build()
        .map_err(|e| ApiError::new(ApiErrorKind::Other, e.to_string()))?;
    Ok((things, groups))
}

impl IndexingApi for IotIndexing {
    async fn fetch(&self) -> Result<Option<IndexingConfiguration>, ApiError> {
        let out = self
            .client
            .get_indexing_configuration()
            .send()
            .await
            .map_err(api_error)?;
        let things = out.thing_indexing_configuration();
        let groups = out.thing_group_indexing_configuration();
        if things.is_none() && groups.is_none() {
            return Ok(None);
        }
        Ok(Some(from_sdk(things, groups)))
    }

    async fn submit(
        &self,
        configuration: &IndexingConfiguration,
        encoding: ShadowNameEncoding,
    ) -> Result<(), ApiError> {
        let (things, groups) = to_sdk(configuration, encoding)?;
        tracing::debug!("updating indexing configuration: {things:?} {groups:?}");
        self.client
            .update_indexing_configuration()
            .thing_indexing_configuration(things)
            .thing_group_indexing_configuration(groups)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}
