//! # Synth
//!
//! Synth is the declaration toolkit behind the FleetWatch infrastructure.
//! Resources are plain Rust structs describing CloudFormation resources.
//! A [`Stack`] collects them, tracks the dependencies between them as a
//! Directed Acyclic Graph, and synthesizes a deployment [`Template`].
//!
//! ## Concepts
//!
//! - **Declarations**: the desired state of a resource, as defined in code.
//!   Every declaration has a logical id unique within its stack.
//! - **Tokens**: values that only exist once the deployment engine has
//!   created a resource (ARNs, generated ids). A [`StackResource`] hands out
//!   its tokens through [`StackResource::output`], and any declaration that
//!   holds one depends on that resource.
//! - **Plans**: the difference between the template synthesized by this run
//!   and the one synthesized by the previous run.
//!
//! ## Error Handling
//!
//! All operations return [`Error`], which encompasses every failure the
//! toolkit reports. Synthesis never panics on bad declarations: a missing
//! dependency, a duplicate logical id or a dependency cycle is an error.

// Allows the derive macro to name this crate from inside it.
extern crate self as synth;

use std::{collections::HashMap, ops::Deref};

use snafu::prelude::*;

pub use fleetwatch_synth_derive::HasDependencies;

mod app;
pub mod aws;
mod has_dependencies_impl;
mod template;
#[cfg(test)]
mod test;
pub mod token;
pub mod utils;

pub use app::{App, Manifest, ManifestStack};
pub use template::Template;
pub use token::Token;

/// Top-level error enum that encompasses all errors.
#[derive(snafu::Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{source}:\n{}",
                source.chain()
                    .map(|e| format!("{e}"))
                    .collect::<Vec<_>>()
                    .join("\n -> ")))]
    Synth { source: anyhow::Error },

    #[snafu(display("Could not read file '{path:?}': {source}"))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not serialize '{name}': {source}"))]
    Serialize {
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Could not deserialize '{name}': {source}"))]
    Deserialize {
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Could not build schedule: {msg}"))]
    Schedule { msg: String },

    #[snafu(display("Could not create file {path:?}: {source}"))]
    CreateFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not write file {path:?}: {source}"))]
    WriteFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "Invalid logical id '{id}', logical ids must be non-empty and alphanumeric"
    ))]
    InvalidLogicalId { id: String },

    #[snafu(display("'{id}' is already declared in stack '{stack}'"))]
    Duplicate { id: String, stack: String },

    #[snafu(display(
        "Could not find a resource by the name '{name}', required by '{dependent}'"
    ))]
    MissingResource { name: String, dependent: String },

    #[snafu(display("Could not find a stack by the name '{name}'"))]
    MissingStack { name: String },

    #[snafu(display("Stack '{name}' cannot depend on itself"))]
    SelfDependency { name: String },
}

impl From<anyhow::Error> for Error {
    fn from(source: anyhow::Error) -> Self {
        Error::Synth { source }
    }
}

type Result<T, E = Error> = core::result::Result<T, E>;

/// IaC resources.
///
/// Represents a resource declared in a deployment template, eg
/// `AWS::DynamoDB::Table`. The struct's serialized form is the resource's
/// `Properties`.
pub trait Resource:
    core::fmt::Debug + Clone + PartialEq + HasDependencies + serde::Serialize + 'static
{
    /// Deploy-time values this resource exposes to other declarations.
    type Output: core::fmt::Debug + Clone;

    /// The CloudFormation resource type.
    fn resource_type(&self) -> &str;

    /// Returns the tokens of this resource when declared as `logical_id`.
    fn output(&self, logical_id: &str) -> Self::Output;
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct Dependencies {
    /// Logical ids of the resources depended upon.
    inner: Vec<String>,
}

impl IntoIterator for Dependencies {
    type Item = String;

    type IntoIter = <Vec<String> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl FromIterator<String> for Dependencies {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Dependencies {
            inner: iter.into_iter().collect(),
        }
    }
}

impl core::fmt::Display for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner.join(", "))
    }
}

impl Dependencies {
    /// Merges two sets of dependencies, keeping the first occurrence of each.
    pub fn merge(self, other: Self) -> Self {
        let mut inner = self.inner;
        for dep in other.inner {
            if !inner.contains(&dep) {
                inner.push(dep);
            }
        }
        Dependencies { inner }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.iter().any(|dep| dep == id)
    }
}

/// Tracks dependencies between resources.
///
/// This trait can be derived, and has a default implementation that
/// reports zero dependencies.
pub trait HasDependencies {
    fn dependencies(&self) -> Dependencies {
        Dependencies::default()
    }
}

/// What happens to a resource when it leaves the stack or is replaced.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// The change a plan would make to a resource.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Action {
    Create,
    Update,
    Unchanged,
    Destroy,
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Unchanged => "unchanged",
            Action::Destroy => "destroy",
        })
    }
}

/// Returns `true` if `id` is a valid CloudFormation logical id.
pub fn is_valid_logical_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Clone, Debug)]
struct Declaration {
    id: String,
    resource_type: String,
    properties: serde_json::Value,
    /// Resources referenced by tokens in the properties.
    references: Dependencies,
    /// Explicit `DependsOn` edges.
    depends_on: Vec<String>,
    deletion_policy: Option<DeletionPolicy>,
}

impl Declaration {
    fn to_template_entry(&self) -> serde_json::Value {
        let mut entry = serde_json::Map::new();
        entry.insert("Type".into(), self.resource_type.clone().into());
        if !self.properties.as_object().is_some_and(|props| props.is_empty()) {
            entry.insert("Properties".into(), self.properties.clone());
        }
        if !self.depends_on.is_empty() {
            entry.insert("DependsOn".into(), self.depends_on.clone().into());
        }
        if let Some(policy) = self.deletion_policy {
            let policy = serde_json::json!(policy);
            entry.insert("DeletionPolicy".into(), policy.clone());
            entry.insert("UpdateReplacePolicy".into(), policy);
        }
        serde_json::Value::Object(entry)
    }
}

#[derive(Clone, Debug)]
struct StackOutput {
    id: String,
    value: Token,
    description: Option<String>,
}

/// A declared resource.
///
/// Dereferences to the declared definition.
#[derive(Clone, Debug)]
pub struct StackResource<T: Resource> {
    /// Logical id of the resource
    id: String,
    /// Definition in _code_
    definition: T,
    output: T::Output,
}

impl<T: Resource> Deref for StackResource<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.definition
    }
}

impl<T: Resource> AsRef<T> for StackResource<T> {
    fn as_ref(&self) -> &T {
        &self.definition
    }
}

impl<T: Resource> StackResource<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deploy-time values of this resource, to use in other declarations.
    pub fn output(&self) -> &T::Output {
        &self.output
    }

    /// `{"Ref": ...}` of this resource.
    pub fn reference(&self) -> Token {
        Token::reference(&self.id)
    }

    /// Adds an explicit `DependsOn` edge from this resource to `resource`.
    pub fn depends_on<X: Resource>(
        &self,
        stack: &mut Stack,
        resource: &StackResource<X>,
    ) -> Result<()> {
        let this = stack.declaration_mut(&self.id)?;
        if !this.depends_on.contains(&resource.id) {
            this.depends_on.push(resource.id.clone());
        }
        Ok(())
    }

    /// Sets both the deletion and update-replace policies of this resource.
    pub fn deletion_policy(&self, stack: &mut Stack, policy: DeletionPolicy) -> Result<()> {
        stack.declaration_mut(&self.id)?.deletion_policy = Some(policy);
        Ok(())
    }
}

/// A single planned action for a resource.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedAction {
    /// The logical id.
    pub id: String,
    /// The action to be taken.
    pub action: Action,
    /// The CloudFormation resource type.
    pub resource_type: String,
    /// Whether the resource is no longer declared.
    pub is_orphan: bool,
}

/// A plan of actions produced by [`Stack::plan`].
#[derive(Clone, Debug)]
pub struct Plan {
    pub stack: String,
    /// The planned actions, in schedule order, followed by destructions.
    pub actions: Vec<PlannedAction>,
    /// Rendered diffs of updated resources, by logical id.
    pub changes: Vec<(String, String)>,
}

impl Plan {
    /// Returns `true` if applying this plan would change anything.
    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|action| action.action != Action::Unchanged)
    }

    pub fn count(&self, action: Action) -> usize {
        self.actions.iter().filter(|a| a.action == action).count()
    }
}

impl core::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "stack '{}':", self.stack)?;
        if !self.has_changes() {
            f.write_str("  No changes.\n")?;
            return Ok(());
        }
        for action in self.actions.iter() {
            if action.action == Action::Unchanged {
                continue;
            }
            let orphan_marker = if action.is_orphan { " (orphan)" } else { "" };
            writeln!(
                f,
                "  {} '{}' [{}]{}",
                action.action, action.id, action.resource_type, orphan_marker
            )?;
        }
        Ok(())
    }
}

/// A named, independently deployable collection of resource declarations.
pub struct Stack {
    name: String,
    region: String,
    account: String,
    description: Option<String>,
    declarations: Vec<Declaration>,
    keys: HashMap<String, usize>,
    outputs: Vec<StackOutput>,
}

impl Stack {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            account: account.into(),
            description: None,
            declarations: vec![],
            keys: HashMap::default(),
            outputs: vec![],
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Returns `true` if a resource with this logical id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    /// Returns `true` if an output with this id exists.
    ///
    /// Outputs and resources are separate namespaces, so an output may share
    /// its id with a resource.
    pub fn contains_output(&self, id: &str) -> bool {
        self.outputs.iter().any(|output| output.id == id)
    }

    /// Logical ids of declared resources, in declaration order.
    pub fn logical_ids(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(|d| d.id.as_str())
    }

    fn declaration_mut(&mut self, id: &str) -> Result<&mut Declaration> {
        let key = *self.keys.get(id).context(MissingResourceSnafu {
            name: id.to_owned(),
            dependent: self.name.clone(),
        })?;
        Ok(&mut self.declarations[key])
    }

    fn ensure_new_id(&self, id: &str, taken: bool) -> Result<()> {
        ensure!(
            is_valid_logical_id(id),
            InvalidLogicalIdSnafu { id: id.to_owned() }
        );
        ensure!(
            !taken,
            DuplicateSnafu {
                id: id.to_owned(),
                stack: self.name.clone(),
            }
        );
        Ok(())
    }

    fn ensure_declared(&self, dependencies: &Dependencies, dependent: &str) -> Result<()> {
        for dep in dependencies.clone() {
            ensure!(
                self.keys.contains_key(&dep),
                MissingResourceSnafu {
                    name: dep,
                    dependent: dependent.to_owned(),
                }
            );
        }
        Ok(())
    }

    /// Declares a resource.
    ///
    /// ## Errors
    /// Errs if the logical id is invalid or already taken, or if the
    /// definition references a resource that has not been declared yet.
    pub fn resource<T: Resource>(
        &mut self,
        id: impl AsRef<str>,
        definition: T,
    ) -> Result<StackResource<T>> {
        let id = id.as_ref();
        self.ensure_new_id(id, self.contains(id))?;
        let references = definition.dependencies();
        self.ensure_declared(&references, id)?;

        let properties = serde_json::to_value(&definition).context(SerializeSnafu {
            name: id.to_owned(),
        })?;
        let resource_type = definition.resource_type().to_owned();
        log::debug!("declaring {resource_type} '{id}' in '{}'", self.name);
        if !references.is_empty() {
            log::trace!("  referencing {references}");
        }
        self.keys.insert(id.to_owned(), self.declarations.len());
        self.declarations.push(Declaration {
            id: id.to_owned(),
            resource_type,
            properties,
            references,
            depends_on: vec![],
            deletion_policy: None,
        });

        Ok(StackResource {
            id: id.to_owned(),
            output: definition.output(id),
            definition,
        })
    }

    /// Declares a stack output.
    pub fn output(
        &mut self,
        id: impl AsRef<str>,
        value: impl Into<Token>,
        description: Option<&str>,
    ) -> Result<()> {
        let id = id.as_ref();
        self.ensure_new_id(id, self.contains_output(id))?;
        let value = value.into();
        self.ensure_declared(&value.dependencies(), id)?;
        self.outputs.push(StackOutput {
            id: id.to_owned(),
            value,
            description: description.map(str::to_owned),
        });
        Ok(())
    }

    /// Orders the declared resources into batches, where every resource
    /// comes after everything it depends on.
    pub fn schedule(&self) -> Result<Vec<Vec<String>>> {
        let mut dag: dagga::Dag<usize, usize> = dagga::Dag::default();
        for (key, declaration) in self.declarations.iter().enumerate() {
            let mut reads = vec![];
            let explicit = declaration.depends_on.iter().cloned();
            for dep in declaration.references.clone().into_iter().chain(explicit) {
                let dep_key = self.keys.get(&dep).context(MissingResourceSnafu {
                    name: dep.clone(),
                    dependent: declaration.id.clone(),
                })?;
                if !reads.contains(dep_key) {
                    reads.push(*dep_key);
                }
            }
            dag.add_node(
                dagga::Node::new(key)
                    .with_name(declaration.id.clone())
                    .with_reads(reads)
                    .with_result(key),
            );
        }
        if dag.is_empty() {
            return Ok(vec![]);
        }
        let schedule = dag
            .build_schedule()
            .map_err(|e| Error::Schedule { msg: e.to_string() })?;
        Ok(schedule
            .batches
            .into_iter()
            .map(|batch| {
                let mut keys = batch
                    .into_iter()
                    .map(|node| node.into_inner())
                    .collect::<Vec<_>>();
                keys.sort();
                keys.into_iter()
                    .map(|key| self.declarations[key].id.clone())
                    .collect()
            })
            .collect())
    }

    pub fn get_schedule_string(&self) -> Result<String, Error> {
        struct Proxy {
            batches: Vec<Vec<String>>,
        }

        impl core::fmt::Display for Proxy {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.batches.is_empty() {
                    f.write_str("--- No resources.\n")?;
                }
                for (i, batch) in self.batches.iter().enumerate() {
                    let i = i + 1;
                    f.write_str("--- step ")?;
                    f.write_fmt(format_args!("{i}\n"))?;
                    for id in batch.iter() {
                        f.write_str("  ")?;
                        f.write_str(id)?;
                        f.write_str("\n")?;
                    }
                    f.write_str("---\n")?;
                }
                Ok(())
            }
        }

        let proxy = Proxy {
            batches: self.schedule()?,
        };
        Ok(proxy.to_string())
    }

    fn scheduled_declarations(&self) -> Result<Vec<&Declaration>> {
        Ok(self
            .schedule()?
            .into_iter()
            .flatten()
            .filter_map(|id| self.keys.get(&id).map(|key| &self.declarations[*key]))
            .collect())
    }

    /// Synthesizes the deployment template.
    pub fn synth(&self) -> Result<Template> {
        log::info!("synthesizing stack '{}'", self.name);
        let mut template = Template {
            description: self.description.clone(),
            ..Default::default()
        };
        for declaration in self.scheduled_declarations()? {
            template
                .resources
                .insert(declaration.id.clone(), declaration.to_template_entry());
        }
        for output in self.outputs.iter() {
            let mut entry = serde_json::Map::new();
            if let Some(description) = &output.description {
                entry.insert("Description".into(), description.clone().into());
            }
            entry.insert(
                "Value".into(),
                serde_json::to_value(&output.value).context(SerializeSnafu {
                    name: output.id.clone(),
                })?,
            );
            template
                .outputs
                .insert(output.id.clone(), serde_json::Value::Object(entry));
        }
        log::debug!(
            "  {} resources, {} outputs",
            template.resources.len(),
            template.outputs.len()
        );
        Ok(template)
    }

    /// Compares the current declarations against a previously synthesized
    /// template.
    ///
    /// Resources found in `previous` but no longer declared are flagged as
    /// orphans and planned for destruction, dependents first.
    pub fn plan(&self, previous: Option<&Template>) -> Result<Plan> {
        let empty = Template::default();
        let previous = previous.unwrap_or(&empty);
        let mut actions = vec![];
        let mut changes = vec![];

        for declaration in self.scheduled_declarations()? {
            let entry = declaration.to_template_entry();
            let action = match previous.resources.get(&declaration.id) {
                None => Action::Create,
                Some(prev) if *prev == entry => Action::Unchanged,
                Some(prev) => {
                    let prev = serde_json::to_string_pretty(prev).context(SerializeSnafu {
                        name: declaration.id.clone(),
                    })?;
                    let next = serde_json::to_string_pretty(&entry).context(SerializeSnafu {
                        name: declaration.id.clone(),
                    })?;
                    let cmp = pretty_assertions::StrComparison::new(&prev, &next);
                    let change_string = format!("{cmp}")
                        .lines()
                        .map(|line| format!("  {line}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    log::info!("updating '{}':\n{change_string}", declaration.id);
                    changes.push((declaration.id.clone(), change_string));
                    Action::Update
                }
            };
            actions.push(PlannedAction {
                id: declaration.id.clone(),
                action,
                resource_type: declaration.resource_type.clone(),
                is_orphan: false,
            });
        }

        for (id, entry) in previous.resources.iter().rev() {
            if self.keys.contains_key(id) {
                continue;
            }
            let resource_type = entry
                .get("Type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
                .to_owned();
            log::warn!("orphan detected: '{id}' ({resource_type}) will be destroyed");
            actions.push(PlannedAction {
                id: id.clone(),
                action: Action::Destroy,
                resource_type,
                is_orphan: true,
            });
        }

        Ok(Plan {
            stack: self.name.clone(),
            actions,
            changes,
        })
    }
}
