//! Deployable artifacts and their upload destinations.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use uuid::Uuid;

/// Where an asset's resolved remote reference must be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Dotted property path relative to the owning item body.
    pub path: String,
    /// Resolved remote reference to substitute at `path`.
    pub value: Value,
}

impl Destination {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Deployment target of a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub region: Option<String>,
    pub account_id: Option<String>,
}

impl Environment {
    pub fn new(region: Option<String>, account_id: Option<String>) -> Self {
        Self { region, account_id }
    }

    /// Parse a cloud-assembly environment string such as
    /// `aws://123456789012/us-east-1`. Unresolved placeholders become `None`.
    pub fn from_assembly_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("aws://")?;
        let (account, region) = rest.split_once('/')?;
        let known = |s: &str| {
            if s.is_empty() || s.starts_with("unknown-") {
                None
            } else {
                Some(s.to_string())
            }
        };
        Some(Self {
            region: known(region),
            account_id: known(account),
        })
    }

    /// Render back to the `aws://<account>/<region>` form.
    pub fn to_assembly_uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account_id.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

/// Packaging format of a deployable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PackageType {
    #[default]
    Zip,
    Image,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Zip => "Zip",
            PackageType::Image => "Image",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Zip" => Some(PackageType::Zip),
            "Image" => Some(PackageType::Image),
            _ => None,
        }
    }

    /// Read the `PackageType` property of a resource, defaulting to `Zip`.
    pub fn from_properties(properties: Option<&Value>) -> Self {
        properties
            .and_then(|p| p.get("PackageType"))
            .and_then(Value::as_str)
            .and_then(Self::from_str)
            .unwrap_or_default()
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity and bookkeeping shared by every asset variant.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    pub asset_id: String,
    pub destinations: Vec<Destination>,
    /// Template property the asset originated from.
    pub source_property: Option<String>,
    pub extra_details: IndexMap<String, Value>,
}

impl AssetInfo {
    pub fn new() -> Self {
        Self {
            asset_id: Uuid::new_v4().to_string(),
            destinations: Vec::new(),
            source_property: None,
            extra_details: IndexMap::new(),
        }
    }
}

impl Default for AssetInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// A file or directory uploaded to object storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileAsset {
    pub info: AssetInfo,
    pub bucket_name: Option<String>,
    pub object_key: Option<String>,
    pub object_version: Option<String>,
    pub source_path: Option<String>,
    /// Path after a build or transform step.
    pub updated_source_path: Option<String>,
}

impl FileAsset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_source_property(mut self, property: impl Into<String>) -> Self {
        self.info.source_property = Some(property.into());
        self
    }

    /// Path that should be uploaded: the built output if any, else the source.
    pub fn effective_source_path(&self) -> Option<&str> {
        self.updated_source_path
            .as_deref()
            .or(self.source_path.as_deref())
    }

    /// `s3://bucket/key[?versionId=..]` once bucket and key are known.
    pub fn remote_uri(&self) -> Option<String> {
        let bucket = self.bucket_name.as_deref()?;
        let key = self.object_key.as_deref()?;
        Some(match &self.object_version {
            Some(version) => format!("s3://{bucket}/{key}?versionId={version}"),
            None => format!("s3://{bucket}/{key}"),
        })
    }
}

/// A container image pushed to a registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAsset {
    pub info: AssetInfo,
    pub repository_name: Option<String>,
    /// e.g. `123456789012.dkr.ecr.us-west-2.amazonaws.com`
    pub registry: Option<String>,
    pub image_tag: Option<String>,
    pub source_local_image: Option<String>,
    pub source_path: Option<String>,
    pub docker_file_name: Option<String>,
    pub build_args: Option<IndexMap<String, String>>,
    /// Build stage.
    pub target: Option<String>,
}

impl ImageAsset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_image(mut self, image: impl Into<String>) -> Self {
        self.source_local_image = Some(image.into());
        self
    }

    pub fn with_source_property(mut self, property: impl Into<String>) -> Self {
        self.info.source_property = Some(property.into());
        self
    }

    /// `registry/repository_name:image_tag` once all three are known.
    pub fn image_uri(&self) -> Option<String> {
        Some(format!(
            "{}/{}:{}",
            self.registry.as_deref()?,
            self.repository_name.as_deref()?,
            self.image_tag.as_deref()?
        ))
    }
}

/// A local artifact that must be uploaded before deployment.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    File(FileAsset),
    Image(ImageAsset),
}

impl Asset {
    pub fn info(&self) -> &AssetInfo {
        match self {
            Asset::File(a) => &a.info,
            Asset::Image(a) => &a.info,
        }
    }

    pub fn info_mut(&mut self) -> &mut AssetInfo {
        match self {
            Asset::File(a) => &mut a.info,
            Asset::Image(a) => &mut a.info,
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.info().asset_id
    }

    pub fn source_property(&self) -> Option<&str> {
        self.info().source_property.as_deref()
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.info().destinations
    }

    pub fn destinations_mut(&mut self) -> &mut Vec<Destination> {
        &mut self.info_mut().destinations
    }

    /// Package type implied by the concrete variant.
    pub fn package_type(&self) -> PackageType {
        match self {
            Asset::File(_) => PackageType::Zip,
            Asset::Image(_) => PackageType::Image,
        }
    }

    pub fn as_file(&self) -> Option<&FileAsset> {
        match self {
            Asset::File(a) => Some(a),
            Asset::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageAsset> {
        match self {
            Asset::Image(a) => Some(a),
            Asset::File(_) => None,
        }
    }

    pub fn source_path(&self) -> Option<&str> {
        match self {
            Asset::File(a) => a.source_path.as_deref(),
            Asset::Image(a) => a.source_path.as_deref(),
        }
    }

    /// Remote reference once the asset has been placed.
    pub fn remote_reference(&self) -> Option<String> {
        match self {
            Asset::File(a) => a.remote_uri(),
            Asset::Image(a) => a.image_uri(),
        }
    }
}

impl From<FileAsset> for Asset {
    fn from(asset: FileAsset) -> Self {
        Asset::File(asset)
    }
}

impl From<ImageAsset> for Asset {
    fn from(asset: ImageAsset) -> Self {
        Asset::Image(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_ids_are_generated_and_unique() {
        let a = FileAsset::new();
        let b = FileAsset::new();
        assert!(!a.info.asset_id.is_empty());
        assert_ne!(a.info.asset_id, b.info.asset_id);
        assert!(a.info.destinations.is_empty());
        assert!(a.info.source_property.is_none());
    }

    #[test]
    fn test_image_uri_requires_all_parts() {
        let mut image = ImageAsset::new();
        image.registry = Some("123.dkr.ecr.us-west-2.amazonaws.com".into());
        image.repository_name = Some("repo".into());
        assert!(image.image_uri().is_none());

        image.image_tag = Some("v1".into());
        assert_eq!(
            image.image_uri().as_deref(),
            Some("123.dkr.ecr.us-west-2.amazonaws.com/repo:v1")
        );
    }

    #[test]
    fn test_file_remote_uri_with_version() {
        let mut file = FileAsset::new();
        file.bucket_name = Some("bucket".into());
        file.object_key = Some("prefix/key".into());
        assert_eq!(file.remote_uri().as_deref(), Some("s3://bucket/prefix/key"));

        file.object_version = Some("v1".into());
        assert_eq!(
            file.remote_uri().as_deref(),
            Some("s3://bucket/prefix/key?versionId=v1")
        );
    }

    #[test]
    fn test_package_type_follows_variant() {
        assert_eq!(Asset::from(FileAsset::new()).package_type(), PackageType::Zip);
        assert_eq!(Asset::from(ImageAsset::new()).package_type(), PackageType::Image);
    }

    #[test]
    fn test_environment_from_assembly_uri() {
        let env = Environment::from_assembly_uri("aws://012345/ap-southeast-1").unwrap();
        assert_eq!(env.account_id.as_deref(), Some("012345"));
        assert_eq!(env.region.as_deref(), Some("ap-southeast-1"));

        let unknown = Environment::from_assembly_uri("aws://unknown-account/unknown-region").unwrap();
        assert_eq!(unknown, Environment::default());
        assert_eq!(unknown.to_assembly_uri(), "aws://unknown-account/unknown-region");
    }
}
