//! IoT fleet indexing bootstrap.
//!
//! The registry only accepts a complete indexing configuration on each
//! update, so features are switched on one at a time: fetch the current
//! configuration, turn one more feature on, submit the whole thing, repeat.
//!
//! Every step re-reads the configuration right before writing it and merges
//! only ever turn features on. Two bootstraps running at once (overlapping
//! deployments) can interleave without switching each other's features off,
//! and a final verification pass repeats the run if anything regressed
//! anyway.
use std::future::Future;

use snafu::prelude::*;

pub mod aws;

/// Named shadows indexed by default.
pub const DEFAULT_SHADOW_NAMES: [&str; 3] = ["$package", "state", "schedule"];

/// Ordered passes over the features before giving up on convergence.
pub const MAX_PASSES: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThingIndexingMode {
    #[default]
    Off,
    Registry,
    RegistryAndShadow,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityMode {
    #[default]
    Off,
    Status,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefenderMode {
    #[default]
    Off,
    Violations,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Toggle {
    #[default]
    Off,
    On,
}

/// A full snapshot of the registry's indexing configuration.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingConfiguration {
    pub thing_indexing: ThingIndexingMode,
    pub connectivity: ConnectivityMode,
    pub device_defender: DefenderMode,
    pub named_shadows: Toggle,
    pub named_shadow_names: Vec<String>,
    pub thing_groups: Toggle,
    pub packages: Toggle,
}

/// One independently enabled indexing feature, in bootstrap order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Feature {
    ThingIndexing,
    Connectivity,
    NamedShadows,
    DeviceDefender,
    ThingGroups,
    Packages,
}

impl Feature {
    /// Thing indexing comes first, every other feature requires it.
    pub const ORDER: [Feature; 6] = [
        Feature::ThingIndexing,
        Feature::Connectivity,
        Feature::NamedShadows,
        Feature::DeviceDefender,
        Feature::ThingGroups,
        Feature::Packages,
    ];
}

impl core::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Feature::ThingIndexing => "thing indexing",
            Feature::Connectivity => "thing connectivity",
            Feature::NamedShadows => "named shadow indexing",
            Feature::DeviceDefender => "device defender indexing",
            Feature::ThingGroups => "thing group indexing",
            Feature::Packages => "software package indexing",
        })
    }
}

/// Splits delimited entries and drops duplicates, keeping the first
/// occurrence of each name.
pub fn decode_shadow_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Vec<String> {
    let mut decoded: Vec<String> = vec![];
    for entry in names {
        for name in entry.as_ref().split(',').map(str::trim) {
            if !name.is_empty() && !decoded.iter().any(|n| n == name) {
                decoded.push(name.to_owned());
            }
        }
    }
    decoded
}

impl IndexingConfiguration {
    /// The configuration the bootstrap converges to.
    pub fn desired<S: AsRef<str>>(shadow_names: impl IntoIterator<Item = S>) -> Self {
        IndexingConfiguration {
            thing_indexing: ThingIndexingMode::RegistryAndShadow,
            connectivity: ConnectivityMode::Status,
            device_defender: DefenderMode::Violations,
            named_shadows: Toggle::On,
            named_shadow_names: decode_shadow_names(shadow_names),
            thing_groups: Toggle::On,
            packages: Toggle::On,
        }
    }

    fn has_shadow_names(&self, names: &[String]) -> bool {
        let current = decode_shadow_names(&self.named_shadow_names);
        names.iter().all(|name| current.contains(name))
    }

    /// Returns `true` if `feature` is at least as enabled here as in `desired`.
    pub fn satisfies(&self, feature: Feature, desired: &IndexingConfiguration) -> bool {
        match feature {
            Feature::ThingIndexing => self.thing_indexing >= desired.thing_indexing,
            Feature::Connectivity => self.connectivity >= desired.connectivity,
            Feature::NamedShadows => {
                self.named_shadows >= desired.named_shadows
                    && self.has_shadow_names(&desired.named_shadow_names)
            }
            Feature::DeviceDefender => self.device_defender >= desired.device_defender,
            Feature::ThingGroups => self.thing_groups >= desired.thing_groups,
            Feature::Packages => self.packages >= desired.packages,
        }
    }

    /// Returns a copy with `feature` raised to its `desired` setting.
    ///
    /// Never lowers a mode and never drops a shadow name.
    pub fn enable(&self, feature: Feature, desired: &IndexingConfiguration) -> Self {
        let mut next = self.clone();
        match feature {
            Feature::ThingIndexing => {
                next.thing_indexing = self.thing_indexing.max(desired.thing_indexing)
            }
            Feature::Connectivity => next.connectivity = self.connectivity.max(desired.connectivity),
            Feature::NamedShadows => {
                next.named_shadows = self.named_shadows.max(desired.named_shadows);
                next.named_shadow_names = decode_shadow_names(
                    self.named_shadow_names
                        .iter()
                        .chain(desired.named_shadow_names.iter()),
                );
            }
            Feature::DeviceDefender => {
                next.device_defender = self.device_defender.max(desired.device_defender)
            }
            Feature::ThingGroups => next.thing_groups = self.thing_groups.max(desired.thing_groups),
            Feature::Packages => next.packages = self.packages.max(desired.packages),
        }
        next
    }
}

/// How named shadow names are put on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowNameEncoding {
    /// One entry per name.
    List,
    /// All names joined by commas into a single entry.
    Delimited,
}

impl ShadowNameEncoding {
    pub fn encode(&self, names: &[String]) -> Vec<String> {
        match self {
            ShadowNameEncoding::List => names.to_vec(),
            ShadowNameEncoding::Delimited if names.is_empty() => vec![],
            ShadowNameEncoding::Delimited => vec![names.join(",")],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The request was understood and refused.
    Rejected,
    /// The feature is not available here.
    Unsupported,
    /// Throttling, timeouts and outages.
    Transient,
    Other,
}

#[derive(Clone, Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }
}

/// The registry's indexing configuration API.
pub trait IndexingApi {
    /// Returns the current configuration, or `None` if indexing was never
    /// configured.
    fn fetch(
        &self,
    ) -> impl Future<Output = Result<Option<IndexingConfiguration>, ApiError>> + Send;

    /// Replaces the whole configuration.
    fn submit(
        &self,
        configuration: &IndexingConfiguration,
        encoding: ShadowNameEncoding,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum FeatureOutcome {
    Enabled,
    /// Nothing was submitted.
    AlreadyEnabled,
    /// Enabled using [`ShadowNameEncoding::Delimited`].
    EnabledWithFallback,
    /// Both shadow name encodings were refused.
    Skipped,
    Unsupported,
    ErrorIgnored,
}

impl FeatureOutcome {
    pub fn is_enabled(&self) -> bool {
        matches!(
            self,
            FeatureOutcome::Enabled
                | FeatureOutcome::AlreadyEnabled
                | FeatureOutcome::EnabledWithFallback
        )
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub pass: usize,
    pub feature: Feature,
    pub outcome: FeatureOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub steps: Vec<StepReport>,
    pub passes: usize,
    pub final_configuration: IndexingConfiguration,
    pub converged: bool,
}

impl BootstrapReport {
    /// The outcome of the last step run for `feature`.
    pub fn outcome(&self, feature: Feature) -> Option<FeatureOutcome> {
        self.steps
            .iter()
            .rev()
            .find(|step| step.feature == feature)
            .map(|step| step.outcome)
    }

    /// Number of steps of the given outcome across all passes.
    pub fn count(&self, outcome: FeatureOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }
}

#[derive(Debug, Snafu)]
pub enum BootstrapError {
    #[snafu(display("Could not read the indexing configuration before enabling {feature}"))]
    Fetch { feature: Feature, source: ApiError },

    #[snafu(display("Could not enable {feature}"))]
    Submit { feature: Feature, source: ApiError },
}

/// Runs the bootstrap against `api` until `desired` is reached, or
/// [`MAX_PASSES`] ordered passes have been made.
///
/// ## Errors
/// Errs if the configuration cannot be read, or if any feature other than
/// named shadows and software packages cannot be enabled. Features enabled
/// before the failure stay enabled.
pub async fn bootstrap<A: IndexingApi>(
    api: &A,
    desired: &IndexingConfiguration,
) -> Result<BootstrapReport, BootstrapError> {
    let mut encoding = ShadowNameEncoding::List;
    let mut steps = vec![];
    let mut final_configuration = IndexingConfiguration::default();
    let mut converged = false;
    let mut passes = 0;

    while passes < MAX_PASSES && !converged {
        passes += 1;
        tracing::info!("fleet indexing pass {passes}");
        let pass_start = steps.len();
        for feature in Feature::ORDER {
            let step = run_step(api, desired, feature, &mut encoding, passes).await?;
            tracing::info!("  {feature}: {:?}", step.outcome);
            steps.push(step);
        }

        match api.fetch().await {
            Ok(current) => {
                final_configuration = current.unwrap_or_default();
                let regressed = steps[pass_start..]
                    .iter()
                    .filter(|step| step.outcome.is_enabled())
                    .filter(|step| !final_configuration.satisfies(step.feature, desired))
                    .map(|step| step.feature.to_string())
                    .collect::<Vec<_>>();
                converged = regressed.is_empty();
                if !converged {
                    tracing::warn!("not converged after pass {passes}: {}", regressed.join(", "));
                }
            }
            Err(e) => {
                tracing::warn!("could not verify the indexing configuration: {e}");
                break;
            }
        }
    }

    if !converged {
        tracing::warn!("fleet indexing did not converge after {passes} passes");
    }
    Ok(BootstrapReport {
        steps,
        passes,
        final_configuration,
        converged,
    })
}

async fn run_step<A: IndexingApi>(
    api: &A,
    desired: &IndexingConfiguration,
    feature: Feature,
    encoding: &mut ShadowNameEncoding,
    pass: usize,
) -> Result<StepReport, BootstrapError> {
    let report = |outcome, detail: Option<String>| StepReport {
        pass,
        feature,
        outcome,
        detail,
    };

    let current = match api.fetch().await {
        Ok(current) => current.unwrap_or_default(),
        Err(source) if feature == Feature::Packages => {
            return Ok(report(FeatureOutcome::ErrorIgnored, Some(source.to_string())));
        }
        Err(source) => return Err(BootstrapError::Fetch { feature, source }),
    };
    if current.satisfies(feature, desired) {
        return Ok(report(FeatureOutcome::AlreadyEnabled, None));
    }
    let next = current.enable(feature, desired);

    match feature {
        Feature::NamedShadows => {
            let first = *encoding;
            let first_err = match api.submit(&next, first).await {
                Ok(()) if first == ShadowNameEncoding::List => {
                    return Ok(report(FeatureOutcome::Enabled, None));
                }
                Ok(()) => return Ok(report(FeatureOutcome::EnabledWithFallback, None)),
                Err(e) => e,
            };
            if first == ShadowNameEncoding::Delimited {
                tracing::warn!("skipping {feature}: {first_err}");
                return Ok(report(FeatureOutcome::Skipped, Some(first_err.to_string())));
            }
            tracing::warn!("{feature} refused with one entry per name ({first_err}), retrying with a single delimited entry");
            match api.submit(&next, ShadowNameEncoding::Delimited).await {
                Ok(()) => {
                    *encoding = ShadowNameEncoding::Delimited;
                    Ok(report(FeatureOutcome::EnabledWithFallback, None))
                }
                Err(e) => {
                    tracing::warn!("skipping {feature}: {e}");
                    Ok(report(
                        FeatureOutcome::Skipped,
                        Some(format!("{first_err}; {e}")),
                    ))
                }
            }
        }
        Feature::Packages => match api.submit(&next, *encoding).await {
            Ok(()) => Ok(report(FeatureOutcome::Enabled, None)),
            Err(e) if matches!(e.kind, ApiErrorKind::Rejected | ApiErrorKind::Unsupported) => {
                tracing::info!("{feature} is not available: {e}");
                Ok(report(FeatureOutcome::Unsupported, Some(e.to_string())))
            }
            Err(e) => {
                tracing::warn!("ignoring failure to enable {feature}: {e}");
                Ok(report(FeatureOutcome::ErrorIgnored, Some(e.to_string())))
            }
        },
        _ => {
            api.submit(&next, *encoding)
                .await
                .context(SubmitSnafu { feature })?;
            Ok(report(FeatureOutcome::Enabled, None))
        }
    }
}
