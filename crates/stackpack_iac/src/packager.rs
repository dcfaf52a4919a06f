//! Packaging: assign remote locations to every asset and write them back.

use serde_yaml::{Mapping, Value};
use stackpack_model::{
    Asset, Destination, FileAsset, ImageAsset, Project, ResourceTypeTables, Stack, RESOURCES_SECTION,
};
use tracing::{debug, info};

use crate::error::{IacError, IacResult};
use crate::locations::LocationUpdateReport;
use crate::plugin::IacPlugin;

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub bucket: String,
    pub key: String,
    pub version: Option<String>,
}

/// Where a pushed image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLocation {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

/// Transfers artifacts to remote storage.
pub trait ArtifactPublisher {
    fn publish_file(&self, asset: &FileAsset) -> IacResult<FileLocation>;

    fn publish_image(&self, asset: &ImageAsset) -> IacResult<ImageLocation>;
}

/// Publisher that computes locations without transferring anything.
///
/// Files land at `s3://<bucket>/<prefix>/<asset_id>`, images at
/// `<repository>:<asset_id>`.
#[derive(Debug, Clone, Default)]
pub struct DryRunPublisher {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    /// Full repository URI, `registry/repository`.
    pub image_repository: Option<String>,
}

impl DryRunPublisher {
    pub fn new(bucket: Option<String>, prefix: Option<String>, image_repository: Option<String>) -> Self {
        Self {
            bucket,
            prefix,
            image_repository,
        }
    }
}

impl ArtifactPublisher for DryRunPublisher {
    fn publish_file(&self, asset: &FileAsset) -> IacResult<FileLocation> {
        let bucket = self
            .bucket
            .clone()
            .ok_or_else(|| IacError::Publish("no bucket configured; use --s3-bucket".to_string()))?;
        let id = &asset.info.asset_id;
        let key = match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{id}"),
            _ => id.clone(),
        };
        Ok(FileLocation {
            bucket,
            key,
            version: None,
        })
    }

    fn publish_image(&self, asset: &ImageAsset) -> IacResult<ImageLocation> {
        let repository = self
            .image_repository
            .as_deref()
            .ok_or_else(|| IacError::Publish("no image repository configured; use --image-repository".to_string()))?;
        let (registry, repository) = repository
            .split_once('/')
            .ok_or_else(|| IacError::Publish(format!("image repository '{repository}' has no registry")))?;
        Ok(ImageLocation {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: asset.info.asset_id.clone(),
        })
    }
}

/// Drives publishing and location updates for a project.
pub struct Packager<'a> {
    plugin: &'a dyn IacPlugin,
    publisher: &'a dyn ArtifactPublisher,
    tables: &'a ResourceTypeTables,
}

impl<'a> Packager<'a> {
    pub fn new(plugin: &'a dyn IacPlugin, publisher: &'a dyn ArtifactPublisher, tables: &'a ResourceTypeTables) -> Self {
        Self {
            plugin,
            publisher,
            tables,
        }
    }

    pub fn package_project(&self, project: &mut Project) -> IacResult<LocationUpdateReport> {
        let mut report = LocationUpdateReport::default();
        for stack in project.stacks.iter_mut() {
            report.merge(self.package_stack(stack)?);
        }
        Ok(report)
    }

    /// Package nested stacks first, then the stack itself.
    pub fn package_stack(&self, stack: &mut Stack) -> IacResult<LocationUpdateReport> {
        let mut report = LocationUpdateReport::default();
        for child in stack.nested_stacks_mut() {
            report.merge(self.package_stack(child)?);
        }

        let mut published = Vec::new();
        for section in stack.dict_sections_mut() {
            let prefix = if section.section_name() == Some(RESOURCES_SECTION) {
                "Properties."
            } else {
                ""
            };
            for item in section.section_items_mut() {
                if !item.is_packageable(self.tables) {
                    continue;
                }
                let Some(dict) = item.as_dict_mut() else {
                    continue;
                };
                for index in 0..dict.assets.len() {
                    let Some(property) = dict.assets[index].source_property().map(str::to_string) else {
                        continue;
                    };
                    let path = format!("{prefix}{property}");
                    let current = dict.lookup(&path).cloned();
                    let fields = dict
                        .lookup("Type")
                        .and_then(Value::as_str)
                        .filter(|_| !prefix.is_empty())
                        .and_then(|t| self.tables.bucket_key_fields(t, &property))
                        .map(|(bucket, key)| (bucket.to_string(), key.to_string()));
                    let asset = &mut dict.assets[index];
                    let resolved = self.publish(asset, current.as_ref(), fields)?;
                    set_destination(asset, path, resolved);
                    published.push(asset.clone());
                }
            }
        }

        for asset in published {
            if let Some(slot) = stack.assets.iter_mut().find(|a| a.asset_id() == asset.asset_id()) {
                *slot = asset;
            }
        }

        report.merge(self.plugin.update_packaged_locations(stack));
        info!(
            "Packaged stack '{}': {} updated, {} unchanged, {} failed",
            stack.stack_id(),
            report.applied,
            report.already_applied,
            report.failures.len()
        );
        Ok(report)
    }

    /// Publish one asset and return the value its property should hold.
    ///
    /// `fields` names the bucket and key fields when the property only
    /// accepts an object mapping.
    fn publish(
        &self,
        asset: &mut Asset,
        current: Option<&Value>,
        fields: Option<(String, String)>,
    ) -> IacResult<Value> {
        match asset {
            Asset::File(file) => {
                let location = self.publisher.publish_file(file)?;
                debug!("Asset {} -> s3://{}/{}", file.info.asset_id, location.bucket, location.key);
                file.bucket_name = Some(location.bucket.clone());
                file.object_key = Some(location.key.clone());
                file.object_version = location.version.clone();
                Ok(file_reference(file, &location, current, fields))
            }
            Asset::Image(image) => {
                let location = self.publisher.publish_image(image)?;
                image.registry = Some(location.registry);
                image.repository_name = Some(location.repository);
                image.image_tag = Some(location.tag);
                let uri = image.image_uri().unwrap_or_default();
                debug!("Asset {} -> {}", image.info.asset_id, uri);
                Ok(Value::String(uri))
            }
        }
    }
}

/// Properties with required object fields get a mapping of those fields,
/// existing bucket/key mappings keep their shape, anything else becomes a URI.
fn file_reference(
    file: &FileAsset,
    location: &FileLocation,
    current: Option<&Value>,
    fields: Option<(String, String)>,
) -> Value {
    let object = |bucket_field: &str, key_field: &str| {
        let mut mapping = Mapping::new();
        mapping.insert(bucket_field.into(), location.bucket.clone().into());
        mapping.insert(key_field.into(), location.key.clone().into());
        Value::Mapping(mapping)
    };

    if let Some((bucket_field, key_field)) = fields {
        return object(&bucket_field, &key_field);
    }
    if let Some(current) = current.and_then(Value::as_mapping) {
        for (bucket_field, key_field) in [("S3Bucket", "S3Key"), ("Bucket", "Key")] {
            if current.contains_key(bucket_field) && current.contains_key(key_field) {
                return object(bucket_field, key_field);
            }
        }
    }
    Value::String(file.remote_uri().unwrap_or_default())
}

fn set_destination(asset: &mut Asset, path: String, resolved: Value) {
    let destinations = asset.destinations_mut();
    match destinations.iter_mut().find(|d| d.path == path) {
        Some(existing) => existing.value = resolved,
        None => destinations.push(Destination::new(path, resolved)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::CfnPlugin;
    use crate::plugin::PluginContext;
    use stackpack_model::OrderedContainer;

    fn stack(yaml: &str) -> Stack {
        Stack::from_template(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    fn attach(stack: &mut Stack, key: &str, asset: Asset) {
        stack.assets.push(asset.clone());
        stack.resources_mut().unwrap().resource_mut(key).unwrap().assets.push(asset);
    }

    fn publisher() -> DryRunPublisher {
        DryRunPublisher::new(
            Some("bucket".into()),
            Some("app/".into()),
            Some("123456789012.dkr.ecr.eu-west-1.amazonaws.com/app".into()),
        )
    }

    #[test]
    fn test_dry_run_locations() {
        let file = FileAsset::new();
        let location = publisher().publish_file(&file).unwrap();
        assert_eq!(location.key, format!("app/{}", file.info.asset_id));

        let image = ImageAsset::new();
        let location = publisher().publish_image(&image).unwrap();
        assert_eq!(location.registry, "123456789012.dkr.ecr.eu-west-1.amazonaws.com");
        assert_eq!(location.repository, "app");

        assert!(matches!(
            DryRunPublisher::default().publish_file(&file),
            Err(IacError::Publish(_))
        ));
    }

    #[test]
    fn test_package_rewrites_code_uri() {
        let mut stack = stack(
            "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      CodeUri: src/\n",
        );
        let asset: Asset = FileAsset::new()
            .with_source_path("/app/src")
            .with_source_property("CodeUri")
            .into();
        let id = asset.asset_id().to_string();
        attach(&mut stack, "Fn", asset);

        let plugin = CfnPlugin::new(PluginContext::new());
        let tables = ResourceTypeTables::default();
        let publisher = publisher();
        let packager = Packager::new(&plugin, &publisher, &tables);

        let report = packager.package_stack(&mut stack).unwrap();
        assert_eq!(report.applied, 1);
        let resource = stack.resources().unwrap().resource("Fn").unwrap();
        assert_eq!(
            resource.lookup("Properties.CodeUri"),
            Some(&Value::String(format!("s3://bucket/app/{id}")))
        );
        assert_eq!(stack.assets[0].as_file().unwrap().bucket_name.as_deref(), Some("bucket"));

        let again = packager.package_stack(&mut stack).unwrap();
        assert_eq!((again.applied, again.already_applied), (0, 1));
        assert_eq!(resource_destinations(&stack, "Fn"), 1);
    }

    fn resource_destinations(stack: &Stack, key: &str) -> usize {
        stack.resources().unwrap().resource(key).unwrap().assets[0].destinations().len()
    }

    #[test]
    fn test_bucket_key_mapping_keeps_shape() {
        let mut stack = stack(
            "Resources:\n  Fn:\n    Type: AWS::Lambda::Function\n    Properties:\n      Code:\n        S3Bucket: old\n        S3Key: old\n",
        );
        attach(&mut stack, "Fn", FileAsset::new().with_source_property("Code").into());

        let plugin = CfnPlugin::new(PluginContext::new());
        let tables = ResourceTypeTables::default();
        let publisher = publisher();
        Packager::new(&plugin, &publisher, &tables).package_stack(&mut stack).unwrap();

        let code = stack.resources().unwrap().resource("Fn").unwrap().lookup("Properties.Code").cloned();
        assert_eq!(code.as_ref().and_then(|c| c.get("S3Bucket")), Some(&Value::String("bucket".into())));
        assert!(stack.resources().unwrap().resource("Fn").unwrap().contains_key("Type"));
    }

    #[test]
    fn test_local_lambda_code_becomes_object_mapping() {
        let mut stack = stack(
            "Resources:\n  Fn:\n    Type: AWS::Lambda::Function\n    Properties:\n      Code: ./src\n  Layer:\n    Type: AWS::Lambda::LayerVersion\n    Properties:\n      Content: ./layer\n",
        );
        let code: Asset = FileAsset::new().with_source_property("Code").into();
        let content: Asset = FileAsset::new().with_source_property("Content").into();
        let (code_id, content_id) = (code.asset_id().to_string(), content.asset_id().to_string());
        attach(&mut stack, "Fn", code);
        attach(&mut stack, "Layer", content);

        let plugin = CfnPlugin::new(PluginContext::new());
        let tables = ResourceTypeTables::default();
        let publisher = publisher();
        let report = Packager::new(&plugin, &publisher, &tables).package_stack(&mut stack).unwrap();
        assert_eq!(report.applied, 2);

        let resources = stack.resources().unwrap();
        let code = resources.resource("Fn").unwrap().lookup("Properties.Code").unwrap();
        assert_eq!(code.get("S3Bucket"), Some(&Value::String("bucket".into())));
        assert_eq!(code.get("S3Key"), Some(&Value::String(format!("app/{code_id}"))));
        let content = resources.resource("Layer").unwrap().lookup("Properties.Content").unwrap();
        assert_eq!(content.get("S3Key"), Some(&Value::String(format!("app/{content_id}"))));
    }

    #[test]
    fn test_image_asset_gets_image_uri() {
        let mut stack = stack(
            "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      PackageType: Image\n      ImageUri: app:latest\n",
        );
        let asset: Asset = ImageAsset::new().with_local_image("app:latest").with_source_property("ImageUri").into();
        let tag = asset.asset_id().to_string();
        attach(&mut stack, "Fn", asset);

        let plugin = CfnPlugin::new(PluginContext::new());
        let tables = ResourceTypeTables::default();
        let publisher = publisher();
        Packager::new(&plugin, &publisher, &tables).package_stack(&mut stack).unwrap();

        assert_eq!(
            stack.resources().unwrap().resource("Fn").unwrap().lookup("Properties.ImageUri"),
            Some(&Value::String(format!("123456789012.dkr.ecr.eu-west-1.amazonaws.com/app:{tag}")))
        );
    }
}
