//! Deployment configuration.
//!
//! [`ContextInputs`] gathers everything the environment has to say: CLI
//! context, environment variables, the git branch and the optional
//! `fleetwatch.toml`. [`Config::resolve`] turns those inputs into a
//! [`Config`] without touching the environment itself.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use snafu::prelude::*;

/// The WAF stack has to live here for its ACL to be usable by CloudFront.
pub const WAF_REGION: &str = "us-east-1";
pub const STACK_PREFIX: &str = "FleetWatch";
pub const DEFAULT_BRANCH: &str = "dev";
/// Only CI may deploy a stack by this name.
pub const RESERVED_STACK_NAME: &str = "main";
pub const CONFIG_FILE: &str = "fleetwatch.toml";

pub const PR_SOURCE_BRANCH_VAR: &str = "GITHUB_PULL_REQUEST_SOURCE_BRANCH";
pub const GITHUB_ACTIONS_VAR: &str = "GITHUB_ACTIONS";
pub const DEPLOY_ACCOUNT_VAR: &str = "CDK_DEPLOY_ACCOUNT";
pub const DEPLOY_REGION_VAR: &str = "CDK_DEPLOY_REGION";
pub const DEFAULT_ACCOUNT_VAR: &str = "CDK_DEFAULT_ACCOUNT";
pub const DEFAULT_REGION_VAR: &str = "CDK_DEFAULT_REGION";

/// Environment variables that take part in resolution.
pub const ENV_VARS: [&str; 6] = [
    PR_SOURCE_BRANCH_VAR,
    GITHUB_ACTIONS_VAR,
    DEPLOY_ACCOUNT_VAR,
    DEPLOY_REGION_VAR,
    DEFAULT_ACCOUNT_VAR,
    DEFAULT_REGION_VAR,
];

pub const DEFAULT_ASSETS_DIR: &str = "backend/appsync";
pub const DEFAULT_SCHEMA_PATH: &str = "shared/src/appsync/schema/schema.graphql";
pub const DEFAULT_WEB_DIST_DIR: &str = "web-app/dist";
pub const DEFAULT_CUSTOM_RESOURCE_BOOTSTRAP: &str = "target/lambda/custom-resources/bootstrap";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Could not read config file {path:?}: {source}"))]
    ReadConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not parse config file {path:?}: {source}"))]
    ParseConfigFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Could not read git HEAD at {path:?}: {source}"))]
    ReadGitHead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not determine the current directory: {source}"))]
    CurrentDir { source: std::io::Error },

    #[snafu(display("Stack name \"{name}\" is not allowed outside of GitHub Actions"))]
    ReservedStackName { name: String },

    #[snafu(display(
        "Missing {name}, pass --{name} or set {deploy_var} or {default_var}"
    ))]
    MissingContext {
        name: &'static str,
        deploy_var: &'static str,
        default_var: &'static str,
    },
}

type Result<T, E = Error> = core::result::Result<T, E>;

/// Defaults read from `fleetwatch.toml`.
///
/// ```toml
/// account = "123456789012"
/// region = "eu-west-1"
/// asset-bucket = "my-assets"
/// web-dist-dir = "web-app/dist"
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub account: Option<String>,
    pub region: Option<String>,
    pub asset_bucket: Option<String>,
    pub assets_dir: Option<PathBuf>,
    pub schema_path: Option<PathBuf>,
    pub web_dist_dir: Option<PathBuf>,
    pub custom_resource_bootstrap: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        toml::from_str(contents).context(ParseConfigFileSnafu { path })
    }

    /// Reads the file at `path`. A missing file is an empty config.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config file at {path:?}");
            return Ok(Self::default());
        }
        log::debug!("reading config file {path:?}");
        let contents = std::fs::read_to_string(path).context(ReadConfigFileSnafu { path })?;
        Self::parse(path, &contents)
    }
}

/// Everything configuration is resolved from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextInputs {
    /// The `--stack-name` override.
    pub stack_name: Option<String>,
    pub account: Option<String>,
    pub region: Option<String>,
    /// Values of [`ENV_VARS`].
    pub env: BTreeMap<String, String>,
    /// The branch checked out in the working tree, if any.
    pub git_branch: Option<String>,
    pub file: FileConfig,
    /// RFC 3339 time of this deployment.
    pub deployment_timestamp: String,
}

impl ContextInputs {
    /// Gathers inputs from the process environment, the working tree and
    /// the config file.
    pub fn from_environment(
        stack_name: Option<String>,
        account: Option<String>,
        region: Option<String>,
        config_file: &Path,
    ) -> Result<Self> {
        let env = ENV_VARS
            .iter()
            .filter_map(|name| {
                std::env::var(name)
                    .ok()
                    .map(|value| (name.to_string(), value))
            })
            .collect();
        let cwd = std::env::current_dir().context(CurrentDirSnafu)?;
        let git_branch = match find_dir_up(&cwd, ".git") {
            Some(dir) => git_head_branch(&dir.join(".git"))?,
            None => {
                log::info!("no .git directory found above {cwd:?}");
                None
            }
        };
        Ok(ContextInputs {
            stack_name,
            account,
            region,
            env,
            git_branch,
            file: FileConfig::read(config_file)?,
            deployment_timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Returns the value of an environment variable, treating empty values as unset.
    fn var(&self, name: &str) -> Option<String> {
        self.env.get(name).filter(|value| !value.is_empty()).cloned()
    }
}

/// Returns the closest ancestor of `start` (itself included) containing `name`.
pub fn find_dir_up(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(name).exists())
        .map(Path::to_path_buf)
}

/// Returns the branch `HEAD` points at, or `None` for a detached `HEAD`.
///
/// `git_path` is either a `.git` directory or a `.git` file pointing at one,
/// as in worktrees and submodules.
pub fn git_head_branch(git_path: &Path) -> Result<Option<String>> {
    let git_dir = if git_path.is_file() {
        let contents =
            std::fs::read_to_string(git_path).context(ReadGitHeadSnafu { path: git_path })?;
        match contents.trim().strip_prefix("gitdir:") {
            Some(dir) => {
                let dir = PathBuf::from(dir.trim());
                match git_path.parent() {
                    Some(parent) if dir.is_relative() => parent.join(dir),
                    _ => dir,
                }
            }
            None => return Ok(None),
        }
    } else {
        git_path.to_path_buf()
    };
    let head = git_dir.join("HEAD");
    let contents = std::fs::read_to_string(&head).context(ReadGitHeadSnafu { path: head })?;
    Ok(contents
        .trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::to_owned))
}

/// Replaces every character that is not allowed in a stack name with `-`.
pub fn sanitize_stack_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

fn first_set(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
}

/// Resolved deployment configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub branch: String,
    /// `FleetWatch-<branch or override>`
    pub stack_name: String,
    pub waf_stack_name: String,
    pub account: String,
    pub region: String,
    pub waf_region: String,
    /// Bucket holding the Lambda deployment packages.
    pub asset_bucket: String,
    /// Holds `lambda-functions/python/<name>` and `lambda-layers/python`.
    pub assets_dir: PathBuf,
    pub schema_path: PathBuf,
    pub web_dist_dir: PathBuf,
    /// The built custom resource handler.
    pub custom_resource_bootstrap: PathBuf,
    pub deployment_timestamp: String,
}

impl Config {
    pub fn resolve(inputs: &ContextInputs) -> Result<Self> {
        let branch = first_set([inputs.var(PR_SOURCE_BRANCH_VAR), inputs.git_branch.clone()])
            .unwrap_or_else(|| DEFAULT_BRANCH.to_owned());
        let base = first_set([inputs.stack_name.clone()]).unwrap_or_else(|| branch.clone());
        let base = sanitize_stack_name(&base);
        ensure!(
            base != RESERVED_STACK_NAME || inputs.var(GITHUB_ACTIONS_VAR).is_some(),
            ReservedStackNameSnafu { name: base }
        );
        let stack_name = format!("{STACK_PREFIX}-{base}");
        let waf_stack_name = format!("{stack_name}-waf");

        let account = first_set([
            inputs.account.clone(),
            inputs.var(DEPLOY_ACCOUNT_VAR),
            inputs.var(DEFAULT_ACCOUNT_VAR),
            inputs.file.account.clone(),
        ])
        .context(MissingContextSnafu {
            name: "account",
            deploy_var: DEPLOY_ACCOUNT_VAR,
            default_var: DEFAULT_ACCOUNT_VAR,
        })?;
        let region = first_set([
            inputs.region.clone(),
            inputs.var(DEPLOY_REGION_VAR),
            inputs.var(DEFAULT_REGION_VAR),
            inputs.file.region.clone(),
        ])
        .context(MissingContextSnafu {
            name: "region",
            deploy_var: DEPLOY_REGION_VAR,
            default_var: DEFAULT_REGION_VAR,
        })?;

        let file = &inputs.file;
        let asset_bucket = file
            .asset_bucket
            .clone()
            .unwrap_or_else(|| format!("fleetwatch-assets-{account}-{region}"));
        let config = Config {
            branch,
            stack_name,
            waf_stack_name,
            account,
            region,
            waf_region: WAF_REGION.to_owned(),
            asset_bucket,
            assets_dir: file
                .assets_dir
                .clone()
                .unwrap_or_else(|| DEFAULT_ASSETS_DIR.into()),
            schema_path: file
                .schema_path
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA_PATH.into()),
            web_dist_dir: file
                .web_dist_dir
                .clone()
                .unwrap_or_else(|| DEFAULT_WEB_DIST_DIR.into()),
            custom_resource_bootstrap: file
                .custom_resource_bootstrap
                .clone()
                .unwrap_or_else(|| DEFAULT_CUSTOM_RESOURCE_BOOTSTRAP.into()),
            deployment_timestamp: inputs.deployment_timestamp.clone(),
        };
        log::info!(
            "resolved stack '{}' for branch '{}' in {}/{}",
            config.stack_name,
            config.branch,
            config.account,
            config.region
        );
        Ok(config)
    }

    /// Name of the SSM parameter holding the CloudFront web ACL ARN.
    pub fn waf_parameter_name(&self) -> String {
        format!("waf_acl_arn_{}", self.waf_stack_name)
    }
}
