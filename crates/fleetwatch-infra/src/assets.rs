//! Lambda deployment packages.
//!
//! Every asset is zipped and stored under a content-addressed key, so a
//! function's `Code` only changes when the code itself does.
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use aws_sdk_s3::{error::SdkError, operation::head_object::HeadObjectError};
use snafu::prelude::*;
use synth::aws::lambda::Code;

use crate::{
    config::Config, DuplicateAssetSnafu, Error, HashAssetSnafu, IoSnafu, MissingAssetSnafu,
    Result, UnknownAssetSnafu, ZipSnafu,
};

pub const KEY_PREFIX: &str = "assets";
/// Name of the custom resource handler's asset.
pub const CUSTOM_RESOURCE_ASSET: &str = "custom-resources";
/// Name of the shared Python layer's asset.
pub const PYTHON_LAYER_ASSET: &str = "python-layer";

#[derive(Clone, Debug, PartialEq)]
pub enum AssetSource {
    /// Zipped as is, paths relative to the directory.
    Directory(PathBuf),
    /// A compiled custom runtime, zipped as an executable `bootstrap`.
    Bootstrap(PathBuf),
}

impl AssetSource {
    pub fn path(&self) -> &Path {
        match self {
            AssetSource::Directory(path) | AssetSource::Bootstrap(path) => path,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Asset {
    pub name: String,
    pub source: AssetSource,
    /// Lowercase hex sha256 of the source.
    pub hash: String,
}

impl Asset {
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.hash)
    }

    /// The object key in the asset bucket.
    pub fn key(&self) -> String {
        format!("{KEY_PREFIX}/{}", self.file_name())
    }
}

/// What [`AssetCatalog::publish`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

/// The assets referenced by a set of stacks.
#[derive(Clone, Debug)]
pub struct AssetCatalog {
    bucket: String,
    assets: Vec<Asset>,
}

impl AssetCatalog {
    pub fn new(bucket: impl Into<String>) -> Self {
        AssetCatalog {
            bucket: bucket.into(),
            assets: vec![],
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    fn register(&mut self, name: &str, source: AssetSource) -> Result<&Asset> {
        ensure!(
            self.get(name).is_none(),
            DuplicateAssetSnafu { name }
        );
        let hash = synth::utils::sha256_digest(source.path())
            .context(HashAssetSnafu { name })?
            .context(MissingAssetSnafu {
                name,
                path: source.path(),
            })?;
        log::debug!("asset '{name}' {:?} hashes to {hash}", source.path());
        self.assets.push(Asset {
            name: name.to_owned(),
            source,
            hash,
        });
        // just pushed
        Ok(&self.assets[self.assets.len() - 1])
    }

    /// Registers a directory of code, eg a Python function or layer.
    pub fn register_dir(&mut self, name: &str, dir: impl Into<PathBuf>) -> Result<&Asset> {
        let dir = dir.into();
        ensure!(dir.is_dir(), MissingAssetSnafu { name, path: dir });
        self.register(name, AssetSource::Directory(dir))
    }

    /// Registers a compiled `bootstrap` executable.
    pub fn register_bootstrap(&mut self, name: &str, file: impl Into<PathBuf>) -> Result<&Asset> {
        let file = file.into();
        ensure!(file.is_file(), MissingAssetSnafu { name, path: file });
        self.register(name, AssetSource::Bootstrap(file))
    }

    /// The S3 location of a registered asset.
    pub fn code(&self, name: &str) -> Result<Code> {
        let asset = self.get(name).context(UnknownAssetSnafu { name })?;
        Ok(Code {
            s3_bucket: self.bucket.clone(),
            s3_key: asset.key(),
        })
    }

    /// Writes every asset's zip to `out_dir`, returning the paths written.
    ///
    /// Entries carry a fixed timestamp, so packaging the same source twice
    /// gives the same bytes.
    pub fn package(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir).context(IoSnafu {
            msg: "Could not create asset directory",
            path: out_dir,
        })?;
        let mut written = vec![];
        for asset in self.assets.iter() {
            let path = out_dir.join(asset.file_name());
            log::info!("packaging asset '{}' into {path:?}", asset.name);
            write_zip(asset, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Uploads the packaged assets in `out_dir` to the asset bucket,
    /// skipping keys that already exist.
    pub async fn publish(
        &self,
        client: &aws_sdk_s3::Client,
        out_dir: &Path,
    ) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        for asset in self.assets.iter() {
            let key = asset.key();
            let exists = match client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => true,
                Err(err) => published_check(err, &key)?,
            };
            if exists {
                log::info!("asset '{}' already published as {key}", asset.name);
                report.skipped.push(key);
                continue;
            }
            let path = out_dir.join(asset.file_name());
            let body = aws_sdk_s3::primitives::ByteStream::from_path(&path)
                .await
                .map_err(|e| Error::Aws {
                    action: format!("read {path:?}"),
                    source: e.into(),
                })?;
            log::info!("uploading asset '{}' to s3://{}/{key}", asset.name, self.bucket);
            client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type("application/zip")
                .body(body)
                .send()
                .await
                .map_err(|e| Error::Aws {
                    action: format!("upload {key}"),
                    source: e.into(),
                })?;
            report.uploaded.push(key);
        }
        Ok(report)
    }
}

/// Only a missing object means the asset still needs uploading. Anything
/// else, like a 403 or throttling, is an error.
pub fn published_check<R>(err: SdkError<HeadObjectError, R>, key: &str) -> Result<bool>
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if err.as_service_error().is_some_and(HeadObjectError::is_not_found) {
        return Ok(false);
    }
    Err(Error::Aws {
        action: format!("check for {key}"),
        source: err.into(),
    })
}

fn write_zip(asset: &Asset, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).context(IoSnafu {
        msg: "Could not create",
        path,
    })?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    let entries = match &asset.source {
        AssetSource::Bootstrap(file) => vec![("bootstrap".to_owned(), file.clone(), 0o755)],
        AssetSource::Directory(dir) => synth::utils::list_files(dir)
            .context(HashAssetSnafu { name: &asset.name })?
            .into_iter()
            .filter_map(|file| {
                let relative = file.strip_prefix(dir).ok()?;
                // zip entries always use forward slashes
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((name, file, 0o644))
            })
            .collect(),
    };
    for (name, source, mode) in entries {
        let bytes = std::fs::read(&source).context(IoSnafu {
            msg: "Could not read",
            path: &source,
        })?;
        zip.start_file(name, options.unix_permissions(mode))
            .context(ZipSnafu { name: &asset.name })?;
        zip.write_all(&bytes).context(IoSnafu {
            msg: "Could not write",
            path,
        })?;
    }
    zip.finish().context(ZipSnafu { name: &asset.name })?;
    Ok(())
}

/// Python function directories, by asset name.
pub fn python_function_dir(config: &Config, function: &str) -> PathBuf {
    config
        .assets_dir
        .join("lambda-functions")
        .join("python")
        .join(function)
}

/// Registers every asset the app stack uses.
pub fn catalog(config: &Config) -> Result<AssetCatalog> {
    let mut catalog = AssetCatalog::new(&config.asset_bucket);
    catalog.register_bootstrap(CUSTOM_RESOURCE_ASSET, &config.custom_resource_bootstrap)?;
    catalog.register_dir(PYTHON_LAYER_ASSET, config.assets_dir.join("lambda-layers"))?;
    for function in crate::constructs::python_functions() {
        catalog.register_dir(function, python_function_dir(config, function))?;
    }
    log::info!(
        "{} assets for s3://{}",
        catalog.assets.len(),
        catalog.bucket
    );
    Ok(catalog)
}
