use std::{collections::BTreeMap, sync::Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{
    cfn::{CustomResourceResponse, RequestType, ResponseStatus},
    handler::{self, Services, FLEET_INDEXING_PHYSICAL_ID},
    indexing::*,
    ssm_reader::ParameterSource,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct Calls {
    stored: Option<IndexingConfiguration>,
    /// Every submit attempt, accepted or not.
    submits: Vec<(IndexingConfiguration, ShadowNameEncoding)>,
    rejected: usize,
}

/// An in-memory fleet registry.
#[derive(Default)]
struct FakeRegistry {
    calls: Mutex<Calls>,
    reject_listed_names: bool,
    reject_all_names: bool,
    thing_indexing_error: Option<ApiErrorKind>,
    packages_error: Option<ApiErrorKind>,
    /// Switches connectivity back off right after this many submits, as an
    /// overlapping run holding an older snapshot would.
    clobber_connectivity_after: Option<usize>,
    clobber_always: bool,
}

impl FakeRegistry {
    fn stored(&self) -> Option<IndexingConfiguration> {
        self.calls.lock().unwrap().stored.clone()
    }

    fn submit_count(&self) -> usize {
        self.calls.lock().unwrap().submits.len()
    }

    fn rejected(&self) -> usize {
        self.calls.lock().unwrap().rejected
    }

    fn encodings(&self) -> Vec<ShadowNameEncoding> {
        self.calls
            .lock()
            .unwrap()
            .submits
            .iter()
            .map(|(_, encoding)| *encoding)
            .collect()
    }
}

impl IndexingApi for FakeRegistry {
    async fn fetch(&self) -> Result<Option<IndexingConfiguration>, ApiError> {
        Ok(self.stored())
    }

    async fn submit(
        &self,
        configuration: &IndexingConfiguration,
        encoding: ShadowNameEncoding,
    ) -> Result<(), ApiError> {
        let mut calls = self.calls.lock().unwrap();
        calls
            .submits
            .push((configuration.clone(), encoding));
        let stored = calls.stored.clone().unwrap_or_default();

        let refuse = |calls: &mut Calls, kind, message: &str| {
            calls.rejected += 1;
            Err(ApiError::new(kind, message))
        };
        if let Some(kind) = self.thing_indexing_error {
            if configuration.thing_indexing > stored.thing_indexing {
                return refuse(&mut *calls, kind, "thing indexing failed");
            }
        }
        if let Some(kind) = self.packages_error {
            if configuration.packages > stored.packages {
                return refuse(&mut *calls, kind, "software package indexing is not available");
            }
        }
        let names_on = configuration.named_shadows == Toggle::On
            && !configuration.named_shadow_names.is_empty();
        if names_on && self.reject_all_names {
            return refuse(&mut *calls, ApiErrorKind::Rejected, "invalid namedShadowNames");
        }
        if names_on
            && self.reject_listed_names
            && encoding == ShadowNameEncoding::List
            && configuration.named_shadow_names.len() > 1
        {
            return refuse(&mut *calls, ApiErrorKind::Rejected, "invalid namedShadowNames");
        }

        let mut accepted = configuration.clone();
        accepted.named_shadow_names = encoding.encode(&configuration.named_shadow_names);
        let count = calls.submits.len();
        let clobber = self.clobber_always
            || self.clobber_connectivity_after.is_some_and(|after| after == count);
        if clobber && accepted.packages == Toggle::On {
            accepted.connectivity = ConnectivityMode::Off;
        }
        calls.stored = Some(accepted);
        Ok(())
    }
}

fn desired() -> IndexingConfiguration {
    IndexingConfiguration::desired(DEFAULT_SHADOW_NAMES)
}

#[tokio::test]
async fn enables_everything_from_scratch() {
    init_logging();
    let registry = FakeRegistry::default();
    let report = bootstrap(&registry, &desired()).await.unwrap();

    assert!(report.converged);
    assert_eq!(1, report.passes);
    assert_eq!(6, registry.submit_count());
    assert_eq!(
        Feature::ORDER.to_vec(),
        report.steps.iter().map(|s| s.feature).collect::<Vec<_>>()
    );
    assert_eq!(6, report.count(FeatureOutcome::Enabled));
    assert_eq!(desired(), report.final_configuration);
}

#[tokio::test]
async fn named_shadows_fall_back_to_delimited() {
    init_logging();
    let registry = FakeRegistry {
        reject_listed_names: true,
        ..Default::default()
    };
    let report = bootstrap(&registry, &desired()).await.unwrap();

    assert_eq!(
        Some(FeatureOutcome::EnabledWithFallback),
        report.outcome(Feature::NamedShadows)
    );
    assert_eq!(1, registry.rejected());
    assert_eq!(1, report.count(FeatureOutcome::EnabledWithFallback));
    for feature in Feature::ORDER {
        assert!(
            report.final_configuration.satisfies(feature, &desired()),
            "{feature} is not enabled"
        );
    }
    assert!(report.converged);
    assert_eq!(
        vec!["$package,state,schedule".to_owned()],
        registry.stored().unwrap().named_shadow_names
    );
    // the delimited shape sticks for the rest of the run
    assert_eq!(
        vec![
            ShadowNameEncoding::List,
            ShadowNameEncoding::List,
            ShadowNameEncoding::List,
            ShadowNameEncoding::Delimited,
            ShadowNameEncoding::Delimited,
            ShadowNameEncoding::Delimited,
            ShadowNameEncoding::Delimited,
        ],
        registry.encodings()
    );
}

#[tokio::test]
async fn named_shadows_are_skipped_when_both_shapes_fail() {
    init_logging();
    let registry = FakeRegistry {
        reject_all_names: true,
        packages_error: Some(ApiErrorKind::Rejected),
        ..Default::default()
    };
    let report = bootstrap(&registry, &desired()).await.unwrap();

    assert_eq!(Some(FeatureOutcome::Skipped), report.outcome(Feature::NamedShadows));
    assert_eq!(
        Some(FeatureOutcome::Enabled),
        report.outcome(Feature::DeviceDefender)
    );
    assert_eq!(
        Some(FeatureOutcome::Enabled),
        report.outcome(Feature::ThingGroups)
    );
    assert_eq!(Toggle::Off, report.final_configuration.named_shadows);
    assert!(report.converged);
}

#[tokio::test]
async fn thing_indexing_failure_aborts() {
    init_logging();
    let registry = FakeRegistry {
        thing_indexing_error: Some(ApiErrorKind::Other),
        ..Default::default()
    };
    let err = bootstrap(&registry, &desired()).await.unwrap_err();

    assert!(
        matches!(
            err,
            BootstrapError::Submit {
                feature: Feature::ThingIndexing,
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(1, registry.submit_count());
    assert_eq!(None, registry.stored());
}

#[tokio::test]
async fn later_failures_keep_earlier_features() {
    init_logging();
    struct FailingDefender(FakeRegistry);

    impl IndexingApi for FailingDefender {
        async fn fetch(&self) -> Result<Option<IndexingConfiguration>, ApiError> {
            self.0.fetch().await
        }

        async fn submit(
            &self,
            configuration: &IndexingConfiguration,
            encoding: ShadowNameEncoding,
        ) -> Result<(), ApiError> {
            if configuration.device_defender == DefenderMode::Violations {
                return Err(ApiError::new(ApiErrorKind::Transient, "throttled"));
            }
            self.0.submit(configuration, encoding).await
        }
    }

    let registry = FailingDefender(FakeRegistry::default());
    let err = bootstrap(&registry, &desired()).await.unwrap_err();
    assert!(
        matches!(
            err,
            BootstrapError::Submit {
                feature: Feature::DeviceDefender,
                ..
            }
        ),
        "{err}"
    );
    let stored = registry.0.stored().unwrap();
    assert_eq!(ThingIndexingMode::RegistryAndShadow, stored.thing_indexing);
    assert_eq!(ConnectivityMode::Status, stored.connectivity);
    assert_eq!(Toggle::On, stored.named_shadows);
    assert_eq!(Toggle::Off, stored.thing_groups);
}

#[tokio::test]
async fn unsupported_packages_still_succeed() {
    init_logging();
    let registry = FakeRegistry {
        packages_error: Some(ApiErrorKind::Unsupported),
        ..Default::default()
    };
    let report = bootstrap(&registry, &desired()).await.unwrap();
    assert_eq!(Some(FeatureOutcome::Unsupported), report.outcome(Feature::Packages));
    assert!(report.converged);
    assert_eq!(1, report.passes);

    let registry = FakeRegistry {
        packages_error: Some(ApiErrorKind::Transient),
        ..Default::default()
    };
    let report = bootstrap(&registry, &desired()).await.unwrap();
    assert_eq!(Some(FeatureOutcome::ErrorIgnored), report.outcome(Feature::Packages));
    assert_eq!(Toggle::Off, report.final_configuration.packages);
}

#[tokio::test]
async fn reruns_are_idempotent() {
    init_logging();
    let registry = FakeRegistry {
        reject_listed_names: true,
        ..Default::default()
    };
    let first = bootstrap(&registry, &desired()).await.unwrap();
    let submits = registry.submit_count();

    let second = bootstrap(&registry, &desired()).await.unwrap();
    assert_eq!(first.final_configuration, second.final_configuration);
    assert_eq!(submits, registry.submit_count());
    assert_eq!(6, second.count(FeatureOutcome::AlreadyEnabled));
}

#[tokio::test]
async fn merges_never_lower_existing_modes() {
    init_logging();
    let registry = FakeRegistry::default();
    registry.calls.lock().unwrap().stored = Some(IndexingConfiguration {
        named_shadows: Toggle::On,
        named_shadow_names: vec!["firmware".to_owned()],
        ..Default::default()
    });
    let report = bootstrap(&registry, &desired()).await.unwrap();
    assert_eq!(
        vec!["firmware", "$package", "state", "schedule"],
        report.final_configuration.named_shadow_names
    );

    let lower = IndexingConfiguration {
        thing_indexing: ThingIndexingMode::Registry,
        ..Default::default()
    };
    let merged = report
        .final_configuration
        .enable(Feature::ThingIndexing, &lower);
    assert_eq!(ThingIndexingMode::RegistryAndShadow, merged.thing_indexing);
}

#[tokio::test]
async fn regressions_trigger_another_pass() {
    init_logging();
    let registry = FakeRegistry {
        clobber_connectivity_after: Some(6),
        ..Default::default()
    };
    let report = bootstrap(&registry, &desired()).await.unwrap();
    assert_eq!(2, report.passes);
    assert!(report.converged);
    let second_pass = report
        .steps
        .iter()
        .filter(|s| s.pass == 2)
        .map(|s| (s.feature, s.outcome))
        .collect::<Vec<_>>();
    assert_eq!(
        (Feature::Connectivity, FeatureOutcome::Enabled),
        second_pass[1]
    );
    assert_eq!(5, second_pass.iter().filter(|(_, o)| *o == FeatureOutcome::AlreadyEnabled).count());

    let registry = FakeRegistry {
        clobber_always: true,
        ..Default::default()
    };
    let report = bootstrap(&registry, &desired()).await.unwrap();
    assert_eq!(MAX_PASSES, report.passes);
    assert!(!report.converged);
}

#[test]
fn shadow_names_decode_from_either_shape() {
    assert_eq!(
        vec!["a", "b", "c"],
        decode_shadow_names(["a,b", "c", " b "])
    );
    assert_eq!(
        vec!["a,b".to_owned()],
        ShadowNameEncoding::Delimited.encode(&["a".to_owned(), "b".to_owned()])
    );
    assert!(ShadowNameEncoding::Delimited.encode(&[]).is_empty());
}

#[derive(Default)]
struct FakeParameters(BTreeMap<(String, String), String>);

impl ParameterSource for FakeParameters {
    async fn get_parameter(&self, name: &str, region: &str) -> anyhow::Result<String> {
        self.0
            .get(&(name.to_owned(), region.to_owned()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("ParameterNotFound: {name}"))
    }
}

fn services() -> Services<FakeRegistry, FakeParameters> {
    Services {
        indexing: FakeRegistry::default(),
        parameters: FakeParameters(BTreeMap::from_iter([(
            (
                "waf_acl_arn_fleetwatch-waf".to_owned(),
                "us-east-1".to_owned(),
            ),
            "arn:aws:wafv2:us-east-1:123456789012:global/webacl/acl/abc".to_owned(),
        )])),
    }
}

fn event(request_type: &str, resource_type: &str, properties: serde_json::Value) -> serde_json::Value {
    json!({
        "RequestType": request_type,
        "ResponseURL": "https://cloudformation-custom-resource-response.s3.amazonaws.com/signed",
        "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/fleetwatch/guid",
        "RequestId": "request-1",
        "ResourceType": resource_type,
        "LogicalResourceId": "FleetIndexing",
        "ResourceProperties": properties,
    })
}

#[tokio::test]
async fn fleet_indexing_event() {
    init_logging();
    let services = services();
    let request = handler::parse_request(event(
        "Create",
        "Custom::FleetIndexing",
        json!({
            "ServiceToken": "arn:aws:lambda:eu-west-1:123456789012:function:cr",
            "NamedShadowNames": ["state", "schedule"],
            "DeploymentTimestamp": "2026-10-19T00:00:00Z",
        }),
    ))
    .unwrap();
    assert_eq!(RequestType::Create, request.request_type);
    assert_eq!(None, request.physical_resource_id);

    let response = handler::respond(&services, &request).await;
    assert_eq!(
        json!({
            "Status": "SUCCESS",
            "PhysicalResourceId": FLEET_INDEXING_PHYSICAL_ID,
            "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/fleetwatch/guid",
            "RequestId": "request-1",
            "LogicalResourceId": "FleetIndexing",
            "Data": { "Status": "SUCCESS" },
        }),
        serde_json::to_value(&response).unwrap()
    );
    assert_eq!(
        vec!["state", "schedule"],
        services.indexing.stored().unwrap().named_shadow_names
    );
}

#[tokio::test]
async fn fleet_indexing_delete_changes_nothing() {
    init_logging();
    let services = services();
    let mut payload = event("Delete", "Custom::FleetIndexing", json!({}));
    payload["PhysicalResourceId"] = json!(FLEET_INDEXING_PHYSICAL_ID);
    let request = handler::parse_request(payload).unwrap();
    let response = handler::respond(&services, &request).await;
    assert_eq!(ResponseStatus::Success, response.status);
    assert_eq!(0, services.indexing.submit_count());
}

#[tokio::test]
async fn fleet_indexing_failure_is_reported() {
    init_logging();
    let services = Services {
        indexing: FakeRegistry {
            thing_indexing_error: Some(ApiErrorKind::Other),
            ..Default::default()
        },
        parameters: FakeParameters::default(),
    };
    let mut payload = event("Update", "Custom::FleetIndexing", json!({}));
    payload["PhysicalResourceId"] = json!(FLEET_INDEXING_PHYSICAL_ID);
    let request = handler::parse_request(payload).unwrap();
    let response = handler::respond(&services, &request).await;
    assert_eq!(ResponseStatus::Failed, response.status);
    assert_eq!(FLEET_INDEXING_PHYSICAL_ID, response.physical_resource_id);
    assert_eq!(
        Some(
            "Fleet indexing bootstrap failed: Could not enable thing indexing: \
             Other: thing indexing failed"
                .to_owned()
        ),
        response.reason
    );
}

#[tokio::test]
async fn parameter_reader_event() {
    init_logging();
    let services = services();
    let request = handler::parse_request(event(
        "Update",
        "Custom::SsmParameterReader",
        json!({
            "ParameterName": "waf_acl_arn_fleetwatch-waf",
            "Region": "us-east-1",
        }),
    ))
    .unwrap();
    let handled = handler::dispatch(&services, &request).await.unwrap();
    assert_eq!("waf_acl_arn_fleetwatch-waf-us-east-1", handled.physical_resource_id);
    assert_eq!(
        json!({ "Value": "arn:aws:wafv2:us-east-1:123456789012:global/webacl/acl/abc" }),
        serde_json::Value::Object(handled.data)
    );

    let request = handler::parse_request(event(
        "Create",
        "Custom::SsmParameterReader",
        json!({ "ParameterName": "missing", "Region": "us-east-1" }),
    ))
    .unwrap();
    let response = handler::respond(&services, &request).await;
    assert_eq!(ResponseStatus::Failed, response.status);
    assert_eq!("FleetIndexing", response.physical_resource_id);
    assert!(response
        .reason
        .as_deref()
        .is_some_and(|reason| reason.contains("ParameterNotFound: missing")));
}

#[tokio::test]
async fn malformed_requests_fail() {
    init_logging();
    let services = services();
    let request = handler::parse_request(event(
        "Create",
        "Custom::SsmParameterReader",
        json!({ "Region": "us-east-1" }),
    ))
    .unwrap();
    let response = handler::respond(&services, &request).await;
    assert_eq!(
        Some("Missing resource property 'ParameterName'".to_owned()),
        response.reason
    );

    let request =
        handler::parse_request(event("Create", "Custom::Nope", json!({}))).unwrap();
    let response: CustomResourceResponse = handler::respond(&services, &request).await;
    assert_eq!(
        Some("Unsupported custom resource type 'Custom::Nope'".to_owned()),
        response.reason
    );

    assert!(handler::parse_request(json!({ "RequestType": "Create" })).is_err());
}

#[tokio::test]
async fn unparseable_events_are_answered() {
    init_logging();
    let services = services();
    let mut payload = event("Recreate", "Custom::FleetIndexing", json!({}));
    payload["PhysicalResourceId"] = json!(FLEET_INDEXING_PHYSICAL_ID);
    let (url, response) = handler::answer(&services, payload).await.unwrap();
    assert_eq!(
        "https://cloudformation-custom-resource-response.s3.amazonaws.com/signed",
        url
    );
    assert_eq!(ResponseStatus::Failed, response.status);
    assert_eq!(FLEET_INDEXING_PHYSICAL_ID, response.physical_resource_id);
    assert_eq!("request-1", response.request_id);
    assert!(response
        .reason
        .as_deref()
        .is_some_and(|reason| reason.starts_with("Could not parse the custom resource event: ")));
    assert_eq!(0, services.indexing.submit_count());

    // nowhere to send an answer
    assert!(handler::answer(&services, json!({ "RequestType": "Create" }))
        .await
        .is_err());

    let (_, response) = handler::answer(
        &services,
        event("Delete", "Custom::FleetIndexing", json!({})),
    )
    .await
    .unwrap();
    assert_eq!(ResponseStatus::Success, response.status);
}
