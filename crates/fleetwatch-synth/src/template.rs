//! Synthesized CloudFormation templates.
use serde_json::{Map, Value};
use snafu::prelude::*;
use tokio::io::AsyncWriteExt;

use crate::{
    CreateFileSnafu, DeserializeSnafu, Error, ReadFileSnafu, SerializeSnafu, WriteFileSnafu,
};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template.
///
/// Resources and outputs keep their insertion order, which is the order
/// they were scheduled in.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resources: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_owned(),
            description: None,
            resources: Map::default(),
            outputs: Map::default(),
        }
    }
}

impl Template {
    /// Returns the `Type` of the resource with the given logical id.
    pub fn resource_type(&self, logical_id: &str) -> Option<&str> {
        self.resources
            .get(logical_id)
            .and_then(|entry| entry.get("Type"))
            .and_then(Value::as_str)
    }

    /// Returns the `Properties` of the resource with the given logical id.
    pub fn properties(&self, logical_id: &str) -> Option<&Value> {
        self.resources
            .get(logical_id)
            .and_then(|entry| entry.get("Properties"))
    }

    /// Reads a previously written template, if one exists at `path`.
    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Option<Self>, Error> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no previous template at {path:?}");
            return Ok(None);
        }
        log::debug!("{path:?} exists, reading the previous template");
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu {
            path: path.to_path_buf(),
        })?;
        let template = serde_json::from_str(&contents).context(DeserializeSnafu {
            name: path.display().to_string(),
        })?;
        Ok(Some(template))
    }

    pub fn to_json_string(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).context(SerializeSnafu {
            name: "template".to_owned(),
        })
    }

    /// Writes the template to `path`, creating parent directories as needed.
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Error> {
        let path = path.as_ref();
        log::info!("writing template to {path:?}");
        let contents = self.to_json_string()?;
        write_file(path, contents.as_bytes()).await
    }
}

pub(crate) async fn write_file(path: &std::path::Path, contents: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(&parent)
            .await
            .context(CreateFileSnafu { path: parent })?;
    }
    let mut file = tokio::fs::File::create(&path)
        .await
        .context(CreateFileSnafu { path })?;
    file.write_all(contents)
        .await
        .context(WriteFileSnafu { path })?;
    // tokio finishes writes on a blocking task, flushing waits for it
    file.flush().await.context(WriteFileSnafu { path })?;
    Ok(())
}
