//! Native declarative-template backend.
//!
//! Reads a template (and any local nested templates it references) into a
//! single-stack [`Project`], discovering local artifacts along the way, and
//! writes stacks back out as `<build_dir>/<stack_id>/template.yaml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use stackpack_model::resource_types::BASE_DIR_TYPES;
use stackpack_model::{
    value, Asset, FileAsset, ImageAsset, OrderedContainer, PackageType, Project, Stack, METADATA_SECTION,
    RESOURCES_SECTION,
};
use tracing::{debug, info, warn};

use crate::error::{IacError, IacResult};
use crate::locations::{apply_packaged_locations, LocationUpdateReport};
use crate::plugin::{IacPlugin, PluginContext};
use crate::template::{is_local_path, relative_path, resolve_local_path, template_path_string, TemplateReader};
use crate::writer::TemplateWriter;

pub const CFN: &str = "CFN";

pub const CFN_FILE_PATTERNS: &[&str] = &["template.yaml", "template.yml", "template.json"];

pub const TEMPLATE_PATH_KEY: &str = "template_path";
pub const PARENT_STACK_TEMPLATE_PATH_KEY: &str = "parent_stack_template_path";
pub const TEMPLATE_BUILD_PATH_KEY: &str = "template_build_path";

/// Backend for plain templates.
#[derive(Debug, Clone)]
pub struct CfnPlugin {
    context: PluginContext,
}

impl CfnPlugin {
    pub fn new(context: PluginContext) -> Self {
        Self { context }
    }

    /// Constructor registered with the plugin registry.
    pub fn create(context: PluginContext) -> Box<dyn IacPlugin> {
        Box::new(Self::new(context))
    }

    fn locate_template(&self, lookup_paths: &[PathBuf]) -> IacResult<PathBuf> {
        if let Some(template_file) = self.context.template_file() {
            return Ok(template_file);
        }

        for dir in lookup_paths {
            for pattern in CFN_FILE_PATTERNS {
                let candidate = dir.join(pattern);
                if candidate.is_file() {
                    debug!("Found template {:?}", candidate);
                    return Ok(candidate);
                }
            }
        }

        let searched = lookup_paths.first().cloned().unwrap_or_else(|| PathBuf::from("."));
        Err(IacError::parse(
            searched,
            format!("no template found (looked for {})", CFN_FILE_PATTERNS.join(", ")),
        ))
    }

    fn build_stack(
        &self,
        path: &Path,
        name: Option<&str>,
        is_nested: bool,
        visiting: &mut Vec<PathBuf>,
    ) -> IacResult<Stack> {
        let path = fs::canonicalize(path).map_err(|e| IacError::parse(path, e.to_string()))?;
        if visiting.contains(&path) {
            let chain = visiting
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(IacError::parse(&path, format!("nested stack cycle: {chain}")));
        }
        visiting.push(path.clone());

        let template = TemplateReader::read(&path)?;
        let mut stack = Stack::from_template(template).map_err(|e| IacError::parse(&path, e.to_string()))?;
        let template_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let base_dir = self.context.base_dir().unwrap_or_else(|| template_dir.clone());

        if let Some(name) = name {
            stack.set_name(name);
        }
        stack.is_nested = is_nested;
        stack.origin_dir = template_dir.clone();

        self.discover_resource_assets(&mut stack, &path, &template_dir, &base_dir, visiting)?;
        self.discover_metadata_assets(&mut stack, &template_dir);

        stack
            .extra_details
            .insert(TEMPLATE_PATH_KEY.to_string(), Value::String(template_path_string(&path)));
        visiting.pop();
        Ok(stack)
    }

    fn discover_resource_assets(
        &self,
        stack: &mut Stack,
        template_path: &Path,
        template_dir: &Path,
        base_dir: &Path,
        visiting: &mut Vec<PathBuf>,
    ) -> IacResult<()> {
        let tables = self.context.resource_types();
        let keys: Vec<String> = stack
            .resources()
            .map(|r| r.keys().map(str::to_string).collect())
            .unwrap_or_default();

        for key in keys {
            let Some(resource) = stack.resources().and_then(|r| r.resource(&key)) else {
                continue;
            };
            let Some(resource_type) = resource.resource_type().map(str::to_string) else {
                continue;
            };
            let properties = resource.properties().cloned().unwrap_or(Value::Null);
            let package_type = PackageType::from_properties(Some(&properties));
            let mut assets: Vec<Asset> = Vec::new();
            let mut nested_stack = None;

            let nested_property = tables.nested_stack_property(&resource_type);
            if let Some(location_property) = nested_property {
                let location = properties
                    .get(location_property)
                    .and_then(Value::as_str)
                    .filter(|l| is_local_path(l));
                if let Some(location) = location {
                    let nested_path = resolve_local_path(location, template_dir);
                    let mut child = self.build_stack(&nested_path, Some(key.as_str()), true, visiting)?;
                    child.extra_details.insert(
                        PARENT_STACK_TEMPLATE_PATH_KEY.to_string(),
                        Value::String(template_path_string(template_path)),
                    );
                    assets.push(
                        FileAsset::new()
                            .with_source_path(template_path_string(&nested_path))
                            .with_source_property(location_property)
                            .into(),
                    );
                    nested_stack = Some(Box::new(child));
                }
            }

            if package_type == PackageType::Zip {
                let reference_dir = if BASE_DIR_TYPES.contains(&resource_type.as_str()) {
                    base_dir
                } else {
                    template_dir
                };
                for property in tables.local_path_properties(&resource_type) {
                    if Some(property.as_str()) == nested_property {
                        continue;
                    }
                    let location = value::lookup(&properties, property)
                        .and_then(Value::as_str)
                        .filter(|l| is_local_path(l));
                    if let Some(location) = location {
                        let source = resolve_local_path(location, reference_dir);
                        assets.push(
                            FileAsset::new()
                                .with_source_path(template_path_string(&source))
                                .with_source_property(property.as_str())
                                .into(),
                        );
                    }
                }
            }

            if package_type == PackageType::Image {
                for property in tables.image_properties(&resource_type) {
                    let image = value::lookup(&properties, property)
                        .and_then(Value::as_str)
                        .filter(|i| !i.is_empty());
                    if let Some(image) = image {
                        assets.push(
                            ImageAsset::new()
                                .with_local_image(image)
                                .with_source_property(property.as_str())
                                .into(),
                        );
                    }
                }
            }

            if !assets.is_empty() {
                debug!("Resource {} has {} local assets", key, assets.len());
            }
            stack.assets.extend(assets.iter().cloned());
            if let Some(resource) = stack.resources_mut().and_then(|r| r.resource_mut(&key)) {
                resource.assets = assets;
                resource.nested_stack = nested_stack;
            }
        }
        Ok(())
    }

    fn discover_metadata_assets(&self, stack: &mut Stack, template_dir: &Path) {
        let tables = self.context.resource_types();
        let mut discovered = Vec::new();

        let Some(metadata) = stack.get_mut(METADATA_SECTION).and_then(|s| s.as_dict_mut()) else {
            return;
        };
        for item in metadata.section_items_mut() {
            let Some(key) = item.item_id().map(str::to_string) else {
                continue;
            };
            let Some(item) = item.as_dict_mut() else {
                continue;
            };
            let properties = tables.metadata_local_paths.get(&key).cloned().unwrap_or_default();
            for property in properties {
                let location = item
                    .lookup(&property)
                    .and_then(Value::as_str)
                    .filter(|l| is_local_path(l));
                if let Some(location) = location {
                    let source = resolve_local_path(location, template_dir);
                    let asset: Asset = FileAsset::new()
                        .with_source_path(template_path_string(&source))
                        .with_source_property(property)
                        .into();
                    item.assets.push(asset.clone());
                    discovered.push(asset);
                }
            }
        }
        stack.assets.extend(discovered);
    }

    fn write_stack(&self, stack: &mut Stack, build_dir: &Path, use_json: bool) -> IacResult<()> {
        let stack_dir = build_dir.join(stack.stack_id());
        let file_name = if use_json { "template.json" } else { "template.yaml" };
        let build_path = stack_dir.join(file_name);
        stack.extra_details.insert(
            TEMPLATE_BUILD_PATH_KEY.to_string(),
            Value::String(template_path_string(&build_path)),
        );

        let tables = self.context.resource_types();
        if let Some(resources) = stack.resources_mut() {
            for resource in resources.resources_mut() {
                let Some(location_property) = resource.resource_type().and_then(|t| tables.nested_stack_property(t))
                else {
                    continue;
                };
                let location_property = location_property.to_string();
                let Some(child) = resource.nested_stack.as_deref_mut() else {
                    continue;
                };
                self.write_stack(child, &stack_dir, use_json)?;
                // Relative to the parent template, whatever form `build_dir` takes.
                let child_path = child
                    .extra_details
                    .get(TEMPLATE_BUILD_PATH_KEY)
                    .and_then(Value::as_str)
                    .map(|p| template_path_string(&relative_path(&stack_dir, Path::new(p))));

                for asset in resource.assets.iter_mut() {
                    if let Asset::File(file) = asset {
                        if file.info.source_property.as_deref() == Some(location_property.as_str()) {
                            file.updated_source_path = child_path.clone();
                        }
                    }
                }
            }
        }

        let output = TemplateWriter::render_with_updated_paths(stack, &stack_dir, |section, property| {
            if section == RESOURCES_SECTION {
                format!("Properties.{property}")
            } else {
                property.to_string()
            }
        });
        TemplateWriter::write_template(&build_path, &output, use_json)?;
        info!("Wrote stack '{}' to {:?}", stack.stack_id(), build_path);
        Ok(())
    }
}

impl IacPlugin for CfnPlugin {
    fn read_project(&self, lookup_paths: &[PathBuf]) -> IacResult<Project> {
        let template_path = self.locate_template(lookup_paths)?;
        let mut visiting = Vec::new();
        let stack = self.build_stack(&template_path, self.context.stack_name(), false, &mut visiting)?;
        info!("Read template project from {:?}", template_path);

        let mut project = Project::new(vec![stack]);
        project
            .extra_details
            .insert(TEMPLATE_PATH_KEY.to_string(), Value::String(template_path_string(&template_path)));
        Ok(project)
    }

    fn write_project(&self, project: &mut Project, build_dir: &Path) -> IacResult<bool> {
        if project.stacks.is_empty() {
            return Err(IacError::InvalidProject("project has no stacks".to_string()));
        }

        let use_json = self.context.use_json();
        for stack in project.stacks.iter_mut() {
            match self.write_stack(stack, build_dir, use_json) {
                Ok(()) => {}
                Err(e @ (IacError::WriteFailure { .. } | IacError::Io(_))) => {
                    warn!("Failed to write stack '{}': {}", stack.stack_id(), e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn update_packaged_locations(&self, stack: &mut Stack) -> LocationUpdateReport {
        apply_packaged_locations(stack, self.context.resource_types())
    }

    fn get_iac_file_patterns(&self) -> &'static [&'static str] {
        CFN_FILE_PATTERNS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{BASE_DIR, TEMPLATE_FILE};
    use stackpack_model::SectionItem;
    use tempfile::tempdir;

    const TEMPLATE: &str = r#"AWSTemplateFormatVersion: "2010-09-09"
Resources:
  HelloFunction:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: hello/
      Handler: app.handler
  ImageFunction:
    Type: AWS::Serverless::Function
    Properties:
      PackageType: Image
      ImageUri: hello-image:latest
  RemoteFunction:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: s3://bucket/code.zip
Metadata:
  AWS::ServerlessRepo::Application:
    Name: demo
    LicenseUrl: LICENSE.txt
"#;

    #[test]
    fn test_discovers_local_assets() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("template.yaml"), TEMPLATE).unwrap();

        let plugin = CfnPlugin::new(PluginContext::new());
        let project = plugin.read_project(&[dir.path().to_path_buf()]).unwrap();
        let stack = project.default_stack().unwrap();
        let resources = stack.resources().unwrap();

        let hello = resources.resource("HelloFunction").unwrap();
        assert_eq!(hello.assets.len(), 1);
        let file = hello.assets[0].as_file().unwrap();
        assert_eq!(file.info.source_property.as_deref(), Some("CodeUri"));
        assert!(file.source_path.as_deref().unwrap().ends_with("hello"));

        let image = resources.resource("ImageFunction").unwrap();
        assert_eq!(
            image.assets[0].as_image().unwrap().source_local_image.as_deref(),
            Some("hello-image:latest")
        );

        assert!(resources.resource("RemoteFunction").unwrap().assets.is_empty());

        let metadata = stack.get(METADATA_SECTION).and_then(|s| s.as_dict()).unwrap();
        let repo = metadata.get("AWS::ServerlessRepo::Application").unwrap();
        assert_eq!(repo.assets().len(), 1);
        assert!(matches!(repo, SectionItem::Dict(_)));

        assert_eq!(stack.assets.len(), 3);
        assert!(stack.extra_details.contains_key(TEMPLATE_PATH_KEY));
    }

    #[test]
    fn test_base_dir_applies_to_functions_only() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        fs::write(
            dir.path().join("template.yaml"),
            "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      CodeUri: src\n  Api:\n    Type: AWS::Serverless::Api\n    Properties:\n      DefinitionUri: api.yaml\n",
        )
        .unwrap();

        let context = PluginContext::new().with_option(BASE_DIR, base.path().to_string_lossy());
        let project = CfnPlugin::new(context).read_project(&[dir.path().to_path_buf()]).unwrap();
        let resources = project.stacks[0].resources().unwrap();

        let code = resources.resource("Fn").unwrap().assets[0].source_path().unwrap().to_string();
        let api = resources.resource("Api").unwrap().assets[0].source_path().unwrap().to_string();
        assert!(code.starts_with(&template_path_string(base.path())));
        assert!(!api.starts_with(&template_path_string(base.path())));
    }

    #[test]
    fn test_missing_template_is_parse_error() {
        let dir = tempdir().unwrap();
        let plugin = CfnPlugin::new(PluginContext::new());
        assert!(matches!(
            plugin.read_project(&[dir.path().to_path_buf()]),
            Err(IacError::ProjectParse { .. })
        ));
    }

    #[test]
    fn test_explicit_template_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "Resources:\n  Topic:\n    Type: AWS::SNS::Topic\n").unwrap();

        let context = PluginContext::new().with_option(TEMPLATE_FILE, path.to_string_lossy());
        let project = CfnPlugin::new(context).read_project(&[]).unwrap();
        assert_eq!(project.stacks.len(), 1);
    }

    #[test]
    fn test_write_rejects_empty_project() {
        let dir = tempdir().unwrap();
        let plugin = CfnPlugin::new(PluginContext::new());
        assert!(matches!(
            plugin.write_project(&mut Project::default(), dir.path()),
            Err(IacError::InvalidProject(_))
        ));
    }

    #[test]
    fn test_write_under_a_file_reports_failure() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(dir.path().join("template.yaml"), TEMPLATE).unwrap();
        let blocker = out.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let plugin = CfnPlugin::new(PluginContext::new());
        let mut project = plugin.read_project(&[dir.path().to_path_buf()]).unwrap();
        assert!(!plugin.write_project(&mut project, &blocker.join("build")).unwrap());

        assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_updated_source_path_is_written() {
        let dir = tempdir().unwrap();
        let build = tempdir().unwrap();
        fs::write(dir.path().join("template.yaml"), TEMPLATE).unwrap();

        let plugin = CfnPlugin::new(PluginContext::new());
        let mut project = plugin.read_project(&[dir.path().to_path_buf()]).unwrap();
        let built = build.path().join("HelloFunction");
        {
            let stack = &mut project.stacks[0];
            stack.set_name("App");
            let hello = stack.resources_mut().unwrap().resource_mut("HelloFunction").unwrap();
            if let Some(Asset::File(file)) = hello.assets.first_mut() {
                file.updated_source_path = Some(template_path_string(&built));
            }
        }

        assert!(plugin.write_project(&mut project, build.path()).unwrap());
        let written = fs::read_to_string(build.path().join("App").join("template.yaml")).unwrap();
        let written: Value = serde_yaml::from_str(&written).unwrap();
        assert_eq!(
            value::lookup(&written, "Resources.HelloFunction.Properties.CodeUri"),
            Some(&Value::String("../HelloFunction".into()))
        );
        assert_eq!(
            value::lookup(&written, "Resources.RemoteFunction.Properties.CodeUri"),
            Some(&Value::String("s3://bucket/code.zip".into()))
        );
    }
}
