//! Publishing the web app once the app stack is deployed.
//!
//! Reads the app stack's outputs, writes the frontend `config.json` into
//! the built web app, uploads it to the site bucket and invalidates the
//! distribution's cache.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::{
    config::Config,
    constructs::website::{OUTPUT_DISTRIBUTION_ID, OUTPUT_SITE_BUCKET},
    frontend::{FrontendConfig, CONFIG_FILE},
    Error, IoSnafu, ListFilesSnafu, MissingOutputSnafu, Result,
};

/// What [`publish_site`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteReport {
    pub bucket: String,
    pub uploaded: Vec<String>,
    pub invalidation_id: Option<String>,
}

fn aws_error(action: impl Into<String>, source: impl Into<anyhow::Error>) -> Error {
    Error::Aws {
        action: action.into(),
        source: source.into(),
    }
}

/// The outputs of a deployed stack, by output key.
pub async fn stack_outputs(
    client: &aws_sdk_cloudformation::Client,
    stack_name: &str,
) -> Result<BTreeMap<String, String>> {
    let response = client
        .describe_stacks()
        .stack_name(stack_name)
        .send()
        .await
        .map_err(|e| aws_error(format!("describe stack '{stack_name}'"), e))?;
    let outputs = response
        .stacks()
        .iter()
        .flat_map(|stack| stack.outputs())
        .filter_map(|output| {
            Some((
                output.output_key()?.to_owned(),
                output.output_value()?.to_owned(),
            ))
        })
        .collect::<BTreeMap<_, _>>();
    log::debug!("stack '{stack_name}' has {} outputs", outputs.len());
    Ok(outputs)
}

/// Writes `config.json` into `dist_dir`.
pub async fn write_frontend_config(dist_dir: &Path, config: &FrontendConfig) -> Result<PathBuf> {
    let path = dist_dir.join(CONFIG_FILE);
    tokio::fs::write(&path, config.to_json()?)
        .await
        .context(IoSnafu {
            msg: "Could not write",
            path: &path,
        })?;
    log::info!("wrote frontend config to {path:?}");
    Ok(path)
}

/// `index.html` -> `text/html`
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("js" | "mjs") => "text/javascript",
        Some("css") => "text/css",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Object keys for the files under `dir`, relative and slash separated.
pub fn site_keys(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = synth::utils::list_files(dir).context(ListFilesSnafu { path: dir })?;
    files.sort();
    Ok(files
        .into_iter()
        .filter_map(|file| {
            let key = file
                .strip_prefix(dir)
                .ok()?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((key, file))
        })
        .collect())
}

/// Uploads every file under `dir` to `bucket`.
pub async fn upload_site(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    dir: &Path,
) -> Result<Vec<String>> {
    let mut uploaded = vec![];
    for (key, file) in site_keys(dir)? {
        let body = aws_sdk_s3::primitives::ByteStream::from_path(&file)
            .await
            .map_err(|e| aws_error(format!("read {file:?}"), e))?;
        log::debug!("uploading s3://{bucket}/{key}");
        client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type(content_type(&file))
            .body(body)
            .send()
            .await
            .map_err(|e| aws_error(format!("upload {key}"), e))?;
        uploaded.push(key);
    }
    log::info!("uploaded {} files to s3://{bucket}", uploaded.len());
    Ok(uploaded)
}

/// Invalidates every cached path of the distribution.
pub async fn invalidate(
    client: &aws_sdk_cloudfront::Client,
    distribution_id: &str,
) -> Result<Option<String>> {
    use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};

    let paths = Paths::builder()
        .quantity(1)
        .items("/*")
        .build()
        .map_err(|e| aws_error("build invalidation paths", e))?;
    let batch = InvalidationBatch::builder()
        .paths(paths)
        .caller_reference(chrono::Utc::now().to_rfc3339())
        .build()
        .map_err(|e| aws_error("build invalidation batch", e))?;
    let response = client
        .create_invalidation()
        .distribution_id(distribution_id)
        .invalidation_batch(batch)
        .send()
        .await
        .map_err(|e| aws_error(format!("invalidate distribution '{distribution_id}'"), e))?;
    let id = response
        .invalidation()
        .map(|invalidation| invalidation.id().to_owned());
    log::info!("invalidating distribution '{distribution_id}': {id:?}");
    Ok(id)
}

/// Configures, uploads and invalidates the web app of the deployed app stack.
pub async fn publish_site(config: &Config, sdk_config: &aws_config::SdkConfig) -> Result<SiteReport> {
    let cloudformation = aws_sdk_cloudformation::Client::new(sdk_config);
    let outputs = stack_outputs(&cloudformation, &config.stack_name).await?;
    let output = |name: &str| -> Result<String> {
        outputs.get(name).cloned().context(MissingOutputSnafu {
            name,
            stack: &config.stack_name,
        })
    };
    let bucket = output(OUTPUT_SITE_BUCKET)?;
    let distribution_id = output(OUTPUT_DISTRIBUTION_ID)?;

    let frontend = FrontendConfig::from_outputs(&config.stack_name, &outputs)?;
    write_frontend_config(&config.web_dist_dir, &frontend).await?;

    let s3 = aws_sdk_s3::Client::new(sdk_config);
    let uploaded = upload_site(&s3, &bucket, &config.web_dist_dir).await?;

    let cloudfront = aws_sdk_cloudfront::Client::new(sdk_config);
    let invalidation_id = invalidate(&cloudfront, &distribution_id).await?;
    Ok(SiteReport {
        bucket,
        uploaded,
        invalidation_id,
    })
}
