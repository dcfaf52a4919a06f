//! Cloud-assembly backend.
//!
//! Reads a synthesized assembly (`manifest.json` plus one template per
//! stack artifact) and writes it back as an assembly of the same shape.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::json;
use serde_yaml::Value;
use stackpack_model::resource_types::AWS_CLOUDFORMATION_STACK;
use stackpack_model::{
    Asset, Environment, FileAsset, ImageAsset, OrderedContainer, Project, SectionItem, Stack,
    PARAMETERS_SECTION,
};
use tracing::{debug, info, warn};

use crate::cfn::{PARENT_STACK_TEMPLATE_PATH_KEY, TEMPLATE_BUILD_PATH_KEY, TEMPLATE_PATH_KEY};
use crate::error::{IacError, IacResult};
use crate::locations::{apply_packaged_locations, LocationUpdateReport};
use crate::plugin::{IacPlugin, PluginContext};
use crate::template::{normalize, template_path_string, TemplateReader};
use crate::writer::TemplateWriter;

pub const CDK: &str = "CDK";

pub const CDK_FILE_PATTERNS: &[&str] = &["cdk.json", "manifest.json"];

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ASSEMBLY_DIR: &str = "cdk.out";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";
pub const DEFAULT_MANIFEST_VERSION: &str = "21.0.0";

/// Stack detail holding the template file name inside the assembly.
pub const TEMPLATE_FILE_KEY: &str = "template_file";
/// Project detail holding the manifest schema version.
pub const MANIFEST_VERSION_KEY: &str = "manifest_version";

const ASSET_PATH: &str = "aws:asset:path";
const ASSET_PROPERTY: &str = "aws:asset:property";
const ASSET_DOCKERFILE: &str = "aws:asset:dockerfile-path";
const ASSET_BUILD_ARGS: &str = "aws:asset:docker-build-args";
const ASSET_BUILD_TARGET: &str = "aws:asset:docker-build-target";
const NESTED_TEMPLATE_SUFFIX: &str = ".template.json";

/// Backend for synthesized cloud assemblies.
#[derive(Debug, Clone)]
pub struct CdkPlugin {
    context: PluginContext,
}

impl CdkPlugin {
    pub fn new(context: PluginContext) -> Self {
        Self { context }
    }

    /// Constructor registered with the plugin registry.
    pub fn create(context: PluginContext) -> Box<dyn IacPlugin> {
        Box::new(Self::new(context))
    }

    /// The first directory holding a manifest: the lookup path itself or its
    /// `cdk.out`. An explicit `cdk_app` directory is searched first.
    fn locate_assembly(&self, lookup_paths: &[PathBuf]) -> IacResult<PathBuf> {
        let explicit = self.context.cdk_app().map(PathBuf::from).filter(|p| p.is_dir());
        for dir in explicit.iter().chain(lookup_paths) {
            for candidate in [dir.clone(), dir.join(ASSEMBLY_DIR)] {
                if candidate.join(MANIFEST_FILE).is_file() {
                    debug!("Found cloud assembly at {:?}", candidate);
                    return Ok(candidate);
                }
            }
        }

        let searched = lookup_paths.first().cloned().unwrap_or_else(|| PathBuf::from("."));
        Err(IacError::parse(
            searched,
            format!("no cloud assembly found (looked for {MANIFEST_FILE} and {ASSEMBLY_DIR}/{MANIFEST_FILE})"),
        ))
    }

    fn read_manifest(path: &Path) -> IacResult<serde_json::Value> {
        let content = fs::read_to_string(path).map_err(|e| IacError::parse(path, e.to_string()))?;
        let manifest: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| IacError::parse(path, e.to_string()))?;
        if !manifest.get("artifacts").map_or(false, serde_json::Value::is_object) {
            return Err(IacError::parse(path, "manifest has no 'artifacts' object"));
        }
        Ok(manifest)
    }

    fn build_stack(
        &self,
        assembly_dir: &Path,
        template_file: &str,
        name: &str,
        is_nested: bool,
        visiting: &mut Vec<PathBuf>,
    ) -> IacResult<Stack> {
        let path = normalize(&assembly_dir.join(template_file));
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
        stack.set_name(name);
        stack.is_nested = is_nested;
        stack.origin_dir = assembly_dir.to_path_buf();
        stack
            .extra_details
            .insert(TEMPLATE_FILE_KEY.to_string(), Value::String(template_file.to_string()));
        stack
            .extra_details
            .insert(TEMPLATE_PATH_KEY.to_string(), Value::String(template_path_string(&path)));

        Self::mark_synthesized_parameters(&mut stack);
        self.discover_assets(&mut stack, &path, assembly_dir, visiting)?;

        visiting.pop();
        Ok(stack)
    }

    fn mark_synthesized_parameters(stack: &mut Stack) {
        let Some(parameters) = stack.get_mut(PARAMETERS_SECTION).and_then(|s| s.as_dict_mut()) else {
            return;
        };
        for item in parameters.section_items_mut() {
            if let SectionItem::Parameter(parameter) = item {
                let key = parameter.key().unwrap_or_default();
                if key == "BootstrapVersion" || key.starts_with("AssetParameters") {
                    parameter.added_by_iac = true;
                }
            }
        }
    }

    fn discover_assets(
        &self,
        stack: &mut Stack,
        template_path: &Path,
        assembly_dir: &Path,
        visiting: &mut Vec<PathBuf>,
    ) -> IacResult<()> {
        let keys: Vec<String> = stack
            .resources()
            .map(|r| r.keys().map(str::to_string).collect())
            .unwrap_or_default();

        for key in keys {
            let Some(resource) = stack.resources().and_then(|r| r.resource(&key)) else {
                continue;
            };
            let Some(metadata) = resource.get("Metadata").cloned() else {
                continue;
            };
            let is_stack_resource = resource.resource_type() == Some(AWS_CLOUDFORMATION_STACK);
            let (Some(asset_path), Some(property)) = (
                metadata.get(ASSET_PATH).and_then(Value::as_str),
                metadata.get(ASSET_PROPERTY).and_then(Value::as_str),
            ) else {
                continue;
            };

            let source_path = template_path_string(&normalize(&assembly_dir.join(asset_path)));
            let mut nested_stack = None;
            let asset: Asset = if metadata.get(ASSET_DOCKERFILE).is_some() {
                let mut image = ImageAsset::new().with_source_property(property);
                image.source_path = Some(source_path);
                image.docker_file_name = metadata.get(ASSET_DOCKERFILE).and_then(Value::as_str).map(str::to_string);
                image.target = metadata.get(ASSET_BUILD_TARGET).and_then(Value::as_str).map(str::to_string);
                image.build_args = metadata.get(ASSET_BUILD_ARGS).and_then(Value::as_mapping).map(|args| {
                    args.iter()
                        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                        .collect::<IndexMap<_, _>>()
                });
                image.into()
            } else {
                if is_stack_resource && asset_path.ends_with(NESTED_TEMPLATE_SUFFIX) {
                    let mut child = self.build_stack(assembly_dir, asset_path, &key, true, visiting)?;
                    child.extra_details.insert(
                        PARENT_STACK_TEMPLATE_PATH_KEY.to_string(),
                        Value::String(template_path_string(template_path)),
                    );
                    nested_stack = Some(Box::new(child));
                }
                FileAsset::new()
                    .with_source_path(source_path)
                    .with_source_property(property)
                    .into()
            };

            debug!("Resource {} has asset {}", key, asset.asset_id());
            stack.assets.push(asset.clone());
            if let Some(resource) = stack.resources_mut().and_then(|r| r.resource_mut(&key)) {
                resource.assets.push(asset);
                resource.nested_stack = nested_stack;
            }
        }
        Ok(())
    }

    fn template_file_of(stack: &Stack) -> String {
        stack
            .extra_details
            .get(TEMPLATE_FILE_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", stack.stack_id(), NESTED_TEMPLATE_SUFFIX))
    }

    fn write_stack(&self, stack: &mut Stack, build_dir: &Path) -> IacResult<String> {
        let template_file = Self::template_file_of(stack);
        let build_path = build_dir.join(&template_file);
        stack.extra_details.insert(
            TEMPLATE_BUILD_PATH_KEY.to_string(),
            Value::String(template_path_string(&build_path)),
        );

        if let Some(resources) = stack.resources_mut() {
            for resource in resources.resources_mut() {
                let Some(child) = resource.nested_stack.as_deref_mut() else {
                    continue;
                };
                let child_path = Some(self.write_stack(child, build_dir)?);
                for asset in resource.assets.iter_mut() {
                    if let Asset::File(file) = asset {
                        file.updated_source_path = child_path.clone();
                    }
                }
            }
        }

        // Assembly asset paths are relative to the assembly directory.
        let output =
            TemplateWriter::render_with_updated_paths(stack, build_dir, |_, _| format!("Metadata.{ASSET_PATH}"));
        TemplateWriter::write_template(&build_path, &output, true)?;
        info!("Wrote stack '{}' to {:?}", stack.stack_id(), build_path);
        Ok(template_file)
    }

    fn manifest_for(project: &Project, template_files: &[String]) -> serde_json::Value {
        let version = project
            .extra_details
            .get(MANIFEST_VERSION_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MANIFEST_VERSION);

        let mut artifacts = serde_json::Map::new();
        for (stack, template_file) in project.stacks.iter().zip(template_files) {
            let environment = stack
                .environments
                .first()
                .cloned()
                .unwrap_or_default()
                .to_assembly_uri();
            artifacts.insert(
                stack.stack_id().to_string(),
                json!({
                    "type": STACK_ARTIFACT_TYPE,
                    "environment": environment,
                    "properties": { "templateFile": template_file },
                }),
            );
        }
        json!({ "version": version, "artifacts": artifacts })
    }
}

impl IacPlugin for CdkPlugin {
    fn read_project(&self, lookup_paths: &[PathBuf]) -> IacResult<Project> {
        let assembly_dir = self.locate_assembly(lookup_paths)?;
        let manifest_path = assembly_dir.join(MANIFEST_FILE);
        let manifest = Self::read_manifest(&manifest_path)?;

        let mut stacks = Vec::new();
        let artifacts = manifest.get("artifacts").and_then(serde_json::Value::as_object);
        for (artifact_id, artifact) in artifacts.into_iter().flatten() {
            if artifact.get("type").and_then(serde_json::Value::as_str) != Some(STACK_ARTIFACT_TYPE) {
                continue;
            }
            let template_file = artifact
                .pointer("/properties/templateFile")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    IacError::parse(&manifest_path, format!("artifact '{artifact_id}' has no templateFile"))
                })?;

            let mut visiting = Vec::new();
            let mut stack = self.build_stack(&assembly_dir, template_file, artifact_id, false, &mut visiting)?;
            if let Some(environment) = artifact
                .get("environment")
                .and_then(serde_json::Value::as_str)
                .and_then(Environment::from_assembly_uri)
            {
                stack.environments.push(environment);
            }
            stacks.push(stack);
        }

        if stacks.is_empty() {
            return Err(IacError::parse(&manifest_path, "assembly contains no stacks"));
        }
        info!("Read {} stacks from {:?}", stacks.len(), assembly_dir);

        let mut project = Project::new(stacks);
        if let Some(version) = manifest.get("version").and_then(serde_json::Value::as_str) {
            project
                .extra_details
                .insert(MANIFEST_VERSION_KEY.to_string(), Value::String(version.to_string()));
        }
        Ok(project)
    }

    fn write_project(&self, project: &mut Project, build_dir: &Path) -> IacResult<bool> {
        if project.stacks.is_empty() {
            return Err(IacError::InvalidProject("project has no stacks".to_string()));
        }

        let mut template_files = Vec::with_capacity(project.stacks.len());
        for stack in project.stacks.iter_mut() {
            match self.write_stack(stack, build_dir) {
                Ok(file) => template_files.push(file),
                Err(e @ (IacError::WriteFailure { .. } | IacError::Io(_))) => {
                    warn!("Failed to write stack '{}': {}", stack.stack_id(), e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }

        let manifest = Self::manifest_for(project, &template_files);
        match TemplateWriter::write_json(&build_dir.join(MANIFEST_FILE), &manifest) {
            Ok(()) => Ok(true),
            Err(e @ IacError::WriteFailure { .. }) => {
                warn!("Failed to write manifest: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn update_packaged_locations(&self, stack: &mut Stack) -> LocationUpdateReport {
        apply_packaged_locations(stack, self.context.resource_types())
    }

    fn get_iac_file_patterns(&self) -> &'static [&'static str] {
        CDK_FILE_PATTERNS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackpack_model::PackageType;
    use tempfile::tempdir;

    fn write_assembly(dir: &Path) {
        fs::write(
            dir.join(MANIFEST_FILE),
            r#"{
  "version": "30.0.0",
  "artifacts": {
    "Tree": { "type": "cdk:tree", "properties": { "file": "tree.json" } },
    "AppStack": {
      "type": "aws:cloudformation:stack",
      "environment": "aws://123456789012/eu-west-1",
      "properties": { "templateFile": "AppStack.template.json" }
    }
  }
}"#,
        )
        .unwrap();
        fs::write(
            dir.join("AppStack.template.json"),
            r#"{
  "Parameters": {
    "BootstrapVersion": { "Type": "AWS::SSM::Parameter::Value<String>" },
    "Stage": { "Type": "String" }
  },
  "Resources": {
    "Fn": {
      "Type": "AWS::Lambda::Function",
      "Properties": { "Code": { "S3Bucket": "b", "S3Key": "k" } },
      "Metadata": { "aws:asset:path": "asset.abc", "aws:asset:property": "Code" }
    },
    "ImageFn": {
      "Type": "AWS::Lambda::Function",
      "Properties": { "PackageType": "Image", "Code": { "ImageUri": "x" } },
      "Metadata": {
        "aws:asset:path": "asset.img",
        "aws:asset:property": "Code.ImageUri",
        "aws:asset:dockerfile-path": "Dockerfile",
        "aws:asset:docker-build-args": { "MODE": "prod" }
      }
    }
  }
}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_read_assembly() {
        let dir = tempdir().unwrap();
        write_assembly(dir.path());

        let project = CdkPlugin::new(PluginContext::new())
            .read_project(&[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(project.stacks.len(), 1);

        let stack = &project.stacks[0];
        assert_eq!(stack.name(), "AppStack");
        assert_eq!(stack.environments[0].region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            stack.get_overrideable_parameters().keys().copied().collect::<Vec<_>>(),
            vec!["Stage"]
        );
        assert!(stack.has_assets_of_package_type(PackageType::Zip));
        assert_eq!(stack.find_function_resources_of_package_type(PackageType::Image).len(), 1);

        let image = stack.resources().unwrap().resource("ImageFn").unwrap().assets[0]
            .as_image()
            .unwrap()
            .clone();
        assert_eq!(image.docker_file_name.as_deref(), Some("Dockerfile"));
        assert_eq!(image.build_args.unwrap().get("MODE").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_read_from_project_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cdk.json"), "{\"app\": \"node app.js\"}").unwrap();
        let out = dir.path().join(ASSEMBLY_DIR);
        fs::create_dir_all(&out).unwrap();
        write_assembly(&out);

        let project = CdkPlugin::new(PluginContext::new())
            .read_project(&[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(project.stacks[0].origin_dir(), out.as_path());
    }

    #[test]
    fn test_unsynthesized_project_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cdk.json"), "{}").unwrap();
        assert!(matches!(
            CdkPlugin::new(PluginContext::new()).read_project(&[dir.path().to_path_buf()]),
            Err(IacError::ProjectParse { .. })
        ));
    }

    #[test]
    fn test_nested_template_cycle() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"artifacts": {"Root": {"type": "aws:cloudformation:stack", "properties": {"templateFile": "Root.template.json"}}}}"#,
        )
        .unwrap();
        let nested = |target: &str| {
            format!(
                r#"{{"Resources": {{"Nested": {{"Type": "AWS::CloudFormation::Stack",
                    "Properties": {{"TemplateURL": "x"}},
                    "Metadata": {{"aws:asset:path": "{target}", "aws:asset:property": "TemplateURL"}}}}}}}}"#
            )
        };
        fs::write(dir.path().join("Root.template.json"), nested("Child.nested.template.json")).unwrap();
        fs::write(dir.path().join("Child.nested.template.json"), nested("Root.template.json")).unwrap();

        let err = CdkPlugin::new(PluginContext::new())
            .read_project(&[dir.path().to_path_buf()])
            .unwrap_err();
        assert!(err.to_string().contains("nested stack cycle"));
    }

    #[test]
    fn test_write_under_a_file_reports_failure() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_assembly(dir.path());
        let blocker = out.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let plugin = CdkPlugin::new(PluginContext::new());
        let mut project = plugin.read_project(&[dir.path().to_path_buf()]).unwrap();
        assert!(!plugin.write_project(&mut project, &blocker.join("cdk.out")).unwrap());

        assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_produces_readable_assembly() {
        let dir = tempdir().unwrap();
        let build = tempdir().unwrap();
        write_assembly(dir.path());

        let plugin = CdkPlugin::new(PluginContext::new());
        let mut project = plugin.read_project(&[dir.path().to_path_buf()]).unwrap();
        assert!(plugin.write_project(&mut project, build.path()).unwrap());

        let reread = plugin.read_project(&[build.path().to_path_buf()]).unwrap();
        assert_eq!(reread.stack_names().collect::<Vec<_>>(), vec!["AppStack"]);
        assert_eq!(reread.stacks[0].as_dict(), project.stacks[0].as_dict());
        assert_eq!(reread.stacks[0].environments, project.stacks[0].environments);
        assert_eq!(
            reread.extra_details.get(MANIFEST_VERSION_KEY),
            Some(&Value::String("30.0.0".into()))
        );
    }
}
