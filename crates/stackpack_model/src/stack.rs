//! The unit of deployment: an ordered set of template sections.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::asset::{Asset, Environment, PackageType};
use crate::container::OrderedContainer;
use crate::error::{ModelError, ModelResult};
use crate::resource_types::FUNCTION_TYPES;
use crate::section::{
    DictSection, Parameter, Resource, Section, SectionSchema, SimpleSection, PARAMETERS_SECTION,
    RESOURCES_SECTION,
};
use crate::value;

/// A deployable stack.
///
/// Sections keep their source order. Plain values assigned through
/// [`OrderedContainer::set`] are wrapped using the stack's [`SectionSchema`].
#[derive(Debug, Clone)]
pub struct Stack {
    stack_id: Option<String>,
    name: Option<String>,
    pub origin_dir: PathBuf,
    pub is_nested: bool,
    sections: IndexMap<String, Section>,
    pub assets: Vec<Asset>,
    pub environments: Vec<Environment>,
    pub extra_details: IndexMap<String, Value>,
    schema: Arc<SectionSchema>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::with_schema(Arc::new(SectionSchema::default()))
    }
}

impl PartialEq for Stack {
    fn eq(&self, other: &Self) -> bool {
        self.stack_id == other.stack_id
            && self.name == other.name
            && self.origin_dir == other.origin_dir
            && self.is_nested == other.is_nested
            && self.sections == other.sections
            && self.assets == other.assets
            && self.environments == other.environments
            && self.extra_details == other.extra_details
    }
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Arc<SectionSchema>) -> Self {
        Self {
            stack_id: None,
            name: None,
            origin_dir: PathBuf::from("."),
            is_nested: false,
            sections: IndexMap::new(),
            assets: Vec::new(),
            environments: Vec::new(),
            extra_details: IndexMap::new(),
            schema,
        }
    }

    /// Build a stack from a parsed template. The top level must be a mapping.
    pub fn from_template(template: Value) -> ModelResult<Self> {
        Self::from_template_with_schema(template, Arc::new(SectionSchema::default()))
    }

    pub fn from_template_with_schema(template: Value, schema: Arc<SectionSchema>) -> ModelResult<Self> {
        let mapping = match template {
            Value::Mapping(mapping) => mapping,
            _ => return Err(ModelError::NotAMapping("template root".to_string())),
        };

        let mut stack = Self::with_schema(schema);
        for (key, section) in mapping {
            let key = value::key_to_string(&key)
                .ok_or_else(|| ModelError::NotAMapping("template root (non-string key)".to_string()))?;
            stack.set(key, section);
        }
        debug!("Built stack with {} sections", stack.sections.len());
        Ok(stack)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit id if set, otherwise the name.
    pub fn stack_id(&self) -> &str {
        self.stack_id.as_deref().unwrap_or_else(|| self.name())
    }

    pub fn set_stack_id(&mut self, stack_id: impl Into<String>) {
        self.stack_id = Some(stack_id.into());
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn origin_dir(&self) -> &Path {
        &self.origin_dir
    }

    pub fn schema(&self) -> &Arc<SectionSchema> {
        &self.schema
    }

    /// Store a pre-built section under its own name.
    pub fn insert_section(&mut self, section: Section) -> Option<Section> {
        let name = section.section_name().unwrap_or_default().to_string();
        self.sections.insert(name, section)
    }

    /// Wrapped read of a section.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.get_mut(name)
    }

    /// Unwrapped read: the scalar of a simple section.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.sections.get(name).and_then(Section::as_scalar)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn dict_sections(&self) -> impl Iterator<Item = &DictSection> {
        self.sections.values().filter_map(Section::as_dict)
    }

    pub fn dict_sections_mut(&mut self) -> impl Iterator<Item = &mut DictSection> {
        self.sections.values_mut().filter_map(Section::as_dict_mut)
    }

    /// The canonical `Resources` section.
    pub fn resources(&self) -> Option<&DictSection> {
        self.sections.get(RESOURCES_SECTION).and_then(Section::as_dict)
    }

    pub fn resources_mut(&mut self) -> Option<&mut DictSection> {
        self.sections
            .get_mut(RESOURCES_SECTION)
            .and_then(Section::as_dict_mut)
    }

    pub fn parameters(&self) -> Option<&DictSection> {
        self.sections.get(PARAMETERS_SECTION).and_then(Section::as_dict)
    }

    pub fn has_assets_of_package_type(&self, package_type: PackageType) -> bool {
        self.assets.iter().any(|a| a.package_type() == package_type)
    }

    /// Function resources whose first asset is of the given package type.
    ///
    /// The asset variant decides, not the resource's `PackageType` property.
    pub fn find_function_resources_of_package_type(&self, package_type: PackageType) -> Vec<&Resource> {
        self.resources()
            .into_iter()
            .flat_map(|section| section.resources())
            .filter(|r| r.resource_type().map_or(false, |t| FUNCTION_TYPES.contains(&t)))
            .filter(|r| r.assets.first().map(Asset::package_type) == Some(package_type))
            .collect()
    }

    /// Parameters the author declared, in source order.
    pub fn get_overrideable_parameters(&self) -> IndexMap<&str, &Parameter> {
        self.parameters()
            .into_iter()
            .flat_map(|section| section.iter())
            .filter_map(|(key, item)| item.as_parameter().map(|p| (key, p)))
            .filter(|(_, p)| !p.added_by_iac)
            .collect()
    }

    /// Nested stacks embedded by resources, in resource order.
    pub fn nested_stacks(&self) -> impl Iterator<Item = (&Resource, &Stack)> {
        self.resources()
            .into_iter()
            .flat_map(|section| section.resources())
            .filter_map(|r| r.nested_stack.as_deref().map(|s| (r, s)))
    }

    pub fn nested_stacks_mut(&mut self) -> impl Iterator<Item = &mut Stack> {
        self.resources_mut()
            .into_iter()
            .flat_map(|section| section.resources_mut())
            .filter_map(|r| r.nested_stack.as_deref_mut())
    }

    /// Plain nested mapping of every section, in order.
    pub fn as_dict(&self) -> Value {
        self.to_value()
    }

    pub fn is_truthy(&self) -> bool {
        !self.sections.is_empty()
    }
}

impl OrderedContainer for Stack {
    type Entry = Section;

    fn get(&self, key: &str) -> Option<&Section> {
        self.sections.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Section> {
        self.sections.get_mut(key)
    }

    /// String-keyed mappings become dict sections whose items are wrapped by
    /// the schema's factory for `key`; anything else becomes a simple section.
    fn set(&mut self, key: impl Into<String>, raw: Value) {
        let key = key.into();
        let section = match raw {
            Value::Mapping(mapping) if mapping.keys().all(|k| value::key_to_string(k).is_some()) => {
                let mut section = DictSection::with_factory(key.clone(), self.schema.factory_for(&key));
                for (item_key, item) in mapping {
                    if let Some(item_key) = value::key_to_string(&item_key) {
                        section.set(item_key, item);
                    }
                }
                Section::Dict(section)
            }
            other => Section::Simple(SimpleSection::new(key.clone(), other)),
        };
        self.sections.insert(key, section);
    }

    fn remove(&mut self, key: &str) -> Option<Section> {
        self.sections.shift_remove(key)
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    fn len(&self) -> usize {
        self.sections.len()
    }

    fn to_value(&self) -> Value {
        let mut mapping = Mapping::with_capacity(self.sections.len());
        for (name, section) in &self.sections {
            mapping.insert(Value::String(name.clone()), section.to_value());
        }
        Value::Mapping(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{FileAsset, ImageAsset};
    use crate::section::SectionItem;

    const TEMPLATE: &str = r#"
AWSTemplateFormatVersion: "2010-09-09"
Parameters:
  Stage:
    Type: String
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: src/
  Topic:
    Type: AWS::SNS::Topic
Outputs:
  Arn:
    Value: !GetAtt Fn.Arn
"#;

    fn stack() -> Stack {
        Stack::from_template(serde_yaml::from_str(TEMPLATE).unwrap()).unwrap()
    }

    #[test]
    fn test_from_template_wraps_sections() {
        let stack = stack();
        assert_eq!(
            stack.keys().collect::<Vec<_>>(),
            vec!["AWSTemplateFormatVersion", "Parameters", "Resources", "Outputs"]
        );
        assert_eq!(
            stack.value("AWSTemplateFormatVersion"),
            Some(&Value::String("2010-09-09".into()))
        );
        assert!(matches!(
            stack.resources().and_then(|r| r.get("Fn")),
            Some(SectionItem::Resource(_))
        ));
        assert!(matches!(
            stack.parameters().and_then(|p| p.get("Stage")),
            Some(SectionItem::Parameter(_))
        ));
    }

    #[test]
    fn test_as_dict_round_trips() {
        let original: Value = serde_yaml::from_str(TEMPLATE).unwrap();
        assert_eq!(stack().as_dict(), original);
    }

    #[test]
    fn test_from_template_rejects_scalar_root() {
        assert!(Stack::from_template(Value::String("nope".into())).is_err());
    }

    #[test]
    fn test_identity_defaults() {
        let mut stack = Stack::new();
        assert_eq!(stack.name(), "");
        assert_eq!(stack.stack_id(), "");
        assert_eq!(stack.origin_dir(), Path::new("."));

        stack.set_name("App");
        assert_eq!(stack.stack_id(), "App");
        stack.set_stack_id("AppStack");
        assert_eq!(stack.stack_id(), "AppStack");
        assert_eq!(stack.name(), "App");
    }

    #[test]
    fn test_package_type_follows_asset_variant() {
        let mut stack = stack();
        let fn_resource = stack.resources_mut().unwrap().resource_mut("Fn").unwrap();
        fn_resource.assets.push(ImageAsset::new().into());
        stack.assets.push(ImageAsset::new().into());

        assert!(stack.has_assets_of_package_type(PackageType::Image));
        assert!(!stack.has_assets_of_package_type(PackageType::Zip));
        assert_eq!(stack.find_function_resources_of_package_type(PackageType::Image).len(), 1);
        assert!(stack.find_function_resources_of_package_type(PackageType::Zip).is_empty());

        stack.assets.push(FileAsset::new().into());
        assert!(stack.has_assets_of_package_type(PackageType::Zip));
    }

    #[test]
    fn test_setting_scalar_makes_simple_section() {
        let mut stack = Stack::new();
        stack.set("Description", Value::String("demo".into()));
        assert!(matches!(stack.get("Description"), Some(Section::Simple(_))));
        stack.remove("Description");
        assert!(!stack.is_truthy());
    }
}
