//! Applications: several stacks deployed together.
use snafu::prelude::*;

use crate::{
    template::write_file, DuplicateSnafu, Error, MissingStackSnafu, Plan, Result,
    SelfDependencySnafu, SerializeSnafu, Stack, Template,
};

pub const MANIFEST_FILE: &str = "manifest.json";

/// One stack entry of a [`Manifest`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStack {
    pub name: String,
    pub region: String,
    pub account: String,
    pub template_file: String,
    pub dependencies: Vec<String>,
}

/// Describes a synthesized app. Stacks are listed in deploy order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub version: String,
    pub stacks: Vec<ManifestStack>,
}

impl Manifest {
    pub fn stack(&self, name: &str) -> Option<&ManifestStack> {
        self.stacks.iter().find(|stack| stack.name == name)
    }
}

/// The file name a stack's template is written to.
pub fn template_file_name(stack_name: &str) -> String {
    format!("{stack_name}.template.json")
}

#[derive(Default)]
pub struct App {
    stacks: Vec<Stack>,
    /// `(dependent, dependency)` pairs of stack names.
    dependencies: Vec<(String, String)>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&mut self, stack: Stack) -> Result<()> {
        ensure!(
            self.stack(stack.name()).is_none(),
            DuplicateSnafu {
                id: stack.name().to_owned(),
                stack: "app".to_owned(),
            }
        );
        log::debug!("adding stack '{}' ({})", stack.name(), stack.region());
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|stack| stack.name() == name)
    }

    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.iter()
    }

    /// Requires `dependency` to be deployed before `dependent`.
    pub fn stack_depends_on(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        for name in [dependent, dependency] {
            ensure!(
                self.stack(name).is_some(),
                MissingStackSnafu {
                    name: name.to_owned()
                }
            );
        }
        ensure!(
            dependent != dependency,
            SelfDependencySnafu {
                name: dependent.to_owned()
            }
        );
        let edge = (dependent.to_owned(), dependency.to_owned());
        if !self.dependencies.contains(&edge) {
            self.dependencies.push(edge);
        }
        Ok(())
    }

    /// Names of the stacks `name` depends on.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|(dependent, _)| dependent == name)
            .map(|(_, dependency)| dependency.clone())
            .collect()
    }

    /// Returns the stacks in deploy order.
    pub fn deploy_order(&self) -> Result<Vec<&Stack>> {
        let mut dag: dagga::Dag<usize, usize> = dagga::Dag::default();
        for (key, stack) in self.stacks.iter().enumerate() {
            let reads = self
                .dependencies_of(stack.name())
                .into_iter()
                .filter_map(|dep| self.stacks.iter().position(|s| s.name() == dep))
                .collect::<Vec<_>>();
            dag.add_node(
                dagga::Node::new(key)
                    .with_name(stack.name().to_owned())
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
        let mut order = vec![];
        for batch in schedule.batches {
            let mut keys = batch
                .into_iter()
                .map(|node| node.into_inner())
                .collect::<Vec<_>>();
            keys.sort();
            order.extend(keys.into_iter().map(|key| &self.stacks[key]));
        }
        Ok(order)
    }

    /// Diffs every stack against the templates found in `out_dir`.
    pub fn plan(&self, out_dir: impl AsRef<std::path::Path>) -> Result<Vec<Plan>> {
        let out_dir = out_dir.as_ref();
        self.deploy_order()?
            .into_iter()
            .map(|stack| {
                let previous = Template::read(out_dir.join(template_file_name(stack.name())))?;
                stack.plan(previous.as_ref())
            })
            .collect()
    }

    /// Writes every stack's template and the manifest to `out_dir`.
    pub async fn synth(&self, out_dir: impl AsRef<std::path::Path>) -> Result<Manifest> {
        let out_dir = out_dir.as_ref();
        let mut manifest = Manifest {
            version: "1".to_owned(),
            stacks: vec![],
        };
        for stack in self.deploy_order()? {
            let template = stack.synth()?;
            let template_file = template_file_name(stack.name());
            template.save(out_dir.join(&template_file)).await?;
            manifest.stacks.push(ManifestStack {
                name: stack.name().to_owned(),
                region: stack.region().to_owned(),
                account: stack.account().to_owned(),
                template_file,
                dependencies: self.dependencies_of(stack.name()),
            });
        }
        let contents = serde_json::to_string_pretty(&manifest).context(SerializeSnafu {
            name: MANIFEST_FILE.to_owned(),
        })?;
        let path = out_dir.join(MANIFEST_FILE);
        log::info!("writing manifest to {path:?}");
        write_file(&path, contents.as_bytes()).await?;
        Ok(manifest)
    }
}
