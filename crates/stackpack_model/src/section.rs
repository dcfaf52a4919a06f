//! Template sections and the items they contain.
//!
//! A [`Section`] is either a single scalar ([`SimpleSection`]) or an ordered
//! map of items ([`DictSection`]). Items are tagged variants sharing an
//! [`ItemIdentity`]; dict-like items embed a [`DictSectionItem`] by value.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::asset::Asset;
use crate::container::OrderedContainer;
use crate::resource_types::ResourceTypeTables;
use crate::stack::Stack;
use crate::value::{self, Body};

pub const RESOURCES_SECTION: &str = "Resources";
pub const PARAMETERS_SECTION: &str = "Parameters";
pub const METADATA_SECTION: &str = "Metadata";
pub const OUTPUTS_SECTION: &str = "Outputs";

/// Constructor used to wrap a plain mapping assigned into a section.
pub type ItemFactory = fn(String, Body) -> SectionItem;

/// Key and optional stable identity of a section item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIdentity {
    pub key: Option<String>,
    item_id: Option<String>,
}

impl ItemIdentity {
    pub fn new(key: Option<String>) -> Self {
        Self { key, item_id: None }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Explicit identity if one was set, otherwise the key.
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref().or(self.key.as_deref())
    }

    pub fn set_item_id(&mut self, item_id: impl Into<String>) {
        self.item_id = Some(item_id.into());
    }
}

/// A scalar entry inside a dict section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleSectionItem {
    pub identity: ItemIdentity,
    pub value: Value,
}

impl SimpleSectionItem {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            identity: ItemIdentity::new(Some(key.into())),
            value,
        }
    }

    pub fn is_truthy(&self) -> bool {
        value::is_truthy(&self.value)
    }
}

/// A mapping entry inside a dict section, with attached assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictSectionItem {
    pub identity: ItemIdentity,
    body: Body,
    pub assets: Vec<Asset>,
    pub extra_details: IndexMap<String, Value>,
}

impl DictSectionItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_body(key, Body::new())
    }

    pub fn with_body(key: impl Into<String>, body: Body) -> Self {
        Self {
            identity: ItemIdentity::new(Some(key.into())),
            body,
            assets: Vec::new(),
            extra_details: IndexMap::new(),
        }
    }

    pub fn with_assets(mut self, assets: Vec<Asset>) -> Self {
        self.assets = assets;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.identity.key()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.identity.item_id()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// A plain item is packageable once it carries at least one asset.
    pub fn is_packageable(&self) -> bool {
        !self.assets.is_empty()
    }

    pub fn find_asset_by_source_property(&self, source_property: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|a| a.source_property() == Some(source_property))
    }

    pub fn find_asset_by_source_property_mut(&mut self, source_property: &str) -> Option<&mut Asset> {
        self.assets
            .iter_mut()
            .find(|a| a.source_property() == Some(source_property))
    }

    /// Resolve a dotted property path inside the body.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        value::lookup_in_body(&self.body, path)
    }

    pub fn is_truthy(&self) -> bool {
        !self.body.is_empty()
    }
}

impl OrderedContainer for DictSectionItem {
    type Entry = Value;

    fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.body.get_mut(key)
    }

    fn set(&mut self, key: impl Into<String>, value: Value) {
        self.body.insert(key.into(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.body.shift_remove(key)
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.body.keys().map(String::as_str)
    }

    fn len(&self) -> usize {
        self.body.len()
    }

    fn to_value(&self) -> Value {
        value::body_to_value(&self.body)
    }
}

/// One entry of the `Resources` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub base: DictSectionItem,
    /// Set when the resource embeds another stack.
    pub nested_stack: Option<Box<Stack>>,
}

impl Resource {
    pub fn new(key: impl Into<String>) -> Self {
        Self::from(DictSectionItem::new(key))
    }

    pub fn with_body(key: impl Into<String>, body: Body) -> Self {
        Self::from(DictSectionItem::with_body(key, body))
    }

    pub fn with_assets(mut self, assets: Vec<Asset>) -> Self {
        self.base.assets = assets;
        self
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.base.get("Type").and_then(Value::as_str)
    }

    pub fn properties(&self) -> Option<&Value> {
        self.base.get("Properties")
    }

    pub fn has_inline_code(&self) -> bool {
        self.properties()
            .and_then(Value::as_mapping)
            .map_or(false, |props| props.contains_key("InlineCode"))
    }

    /// Whether packaging should look at this resource at all.
    ///
    /// Computed from the body alone: inline code is never packageable,
    /// otherwise the declared type must belong to one of the three
    /// packageable classes.
    pub fn is_packageable(&self, tables: &ResourceTypeTables) -> bool {
        if self.has_inline_code() {
            return false;
        }
        self.resource_type()
            .map_or(false, |t| tables.is_packageable_type(t))
    }
}

impl From<DictSectionItem> for Resource {
    fn from(base: DictSectionItem) -> Self {
        Self {
            base,
            nested_stack: None,
        }
    }
}

impl Deref for Resource {
    type Target = DictSectionItem;

    fn deref(&self) -> &DictSectionItem {
        &self.base
    }
}

impl DerefMut for Resource {
    fn deref_mut(&mut self) -> &mut DictSectionItem {
        &mut self.base
    }
}

/// One entry of the `Parameters` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameter {
    pub base: DictSectionItem,
    /// Synthesized by the backend rather than written by the author.
    pub added_by_iac: bool,
}

impl Parameter {
    pub fn new(key: impl Into<String>) -> Self {
        Self::from(DictSectionItem::new(key))
    }

    pub fn with_body(key: impl Into<String>, body: Body) -> Self {
        Self::from(DictSectionItem::with_body(key, body))
    }

    pub fn added_by_iac(mut self, added: bool) -> Self {
        self.added_by_iac = added;
        self
    }
}

impl From<DictSectionItem> for Parameter {
    fn from(base: DictSectionItem) -> Self {
        Self {
            base,
            added_by_iac: false,
        }
    }
}

impl Deref for Parameter {
    type Target = DictSectionItem;

    fn deref(&self) -> &DictSectionItem {
        &self.base
    }
}

impl DerefMut for Parameter {
    fn deref_mut(&mut self) -> &mut DictSectionItem {
        &mut self.base
    }
}

/// An entry of a [`DictSection`].
#[derive(Debug, Clone, PartialEq)]
pub enum SectionItem {
    Simple(SimpleSectionItem),
    Dict(DictSectionItem),
    Resource(Resource),
    Parameter(Parameter),
}

impl SectionItem {
    pub fn identity(&self) -> &ItemIdentity {
        match self {
            SectionItem::Simple(i) => &i.identity,
            SectionItem::Dict(i) => &i.identity,
            SectionItem::Resource(r) => &r.base.identity,
            SectionItem::Parameter(p) => &p.base.identity,
        }
    }

    fn identity_mut(&mut self) -> &mut ItemIdentity {
        match self {
            SectionItem::Simple(i) => &mut i.identity,
            SectionItem::Dict(i) => &mut i.identity,
            SectionItem::Resource(r) => &mut r.base.identity,
            SectionItem::Parameter(p) => &mut p.base.identity,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.identity().key()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.identity().item_id()
    }

    /// The dict-like part of any non-scalar item.
    pub fn as_dict(&self) -> Option<&DictSectionItem> {
        match self {
            SectionItem::Simple(_) => None,
            SectionItem::Dict(i) => Some(i),
            SectionItem::Resource(r) => Some(&r.base),
            SectionItem::Parameter(p) => Some(&p.base),
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut DictSectionItem> {
        match self {
            SectionItem::Simple(_) => None,
            SectionItem::Dict(i) => Some(i),
            SectionItem::Resource(r) => Some(&mut r.base),
            SectionItem::Parameter(p) => Some(&mut p.base),
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            SectionItem::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_resource_mut(&mut self) -> Option<&mut Resource> {
        match self {
            SectionItem::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            SectionItem::Parameter(p) => Some(p),
            _ => None,
        }
    }

    /// The scalar of a simple item.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            SectionItem::Simple(i) => Some(&i.value),
            _ => None,
        }
    }

    pub fn assets(&self) -> &[Asset] {
        self.as_dict().map_or(&[], |d| d.assets.as_slice())
    }

    pub fn is_packageable(&self, tables: &ResourceTypeTables) -> bool {
        match self {
            SectionItem::Simple(_) => false,
            SectionItem::Resource(r) => r.is_packageable(tables),
            SectionItem::Dict(i) => i.is_packageable(),
            SectionItem::Parameter(p) => p.base.is_packageable(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            SectionItem::Simple(i) => i.value.clone(),
            other => other
                .as_dict()
                .map(|d| d.to_value())
                .unwrap_or_default(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            SectionItem::Simple(i) => i.is_truthy(),
            other => other.as_dict().map_or(false, DictSectionItem::is_truthy),
        }
    }
}

impl From<SimpleSectionItem> for SectionItem {
    fn from(item: SimpleSectionItem) -> Self {
        SectionItem::Simple(item)
    }
}

impl From<DictSectionItem> for SectionItem {
    fn from(item: DictSectionItem) -> Self {
        SectionItem::Dict(item)
    }
}

impl From<Resource> for SectionItem {
    fn from(item: Resource) -> Self {
        SectionItem::Resource(item)
    }
}

impl From<Parameter> for SectionItem {
    fn from(item: Parameter) -> Self {
        SectionItem::Parameter(item)
    }
}

/// Default constructor for sections without a registered item kind.
pub fn generic_item(key: String, body: Body) -> SectionItem {
    SectionItem::Dict(DictSectionItem::with_body(key, body))
}

pub fn resource_item(key: String, body: Body) -> SectionItem {
    SectionItem::Resource(Resource::with_body(key, body))
}

pub fn parameter_item(key: String, body: Body) -> SectionItem {
    SectionItem::Parameter(Parameter::with_body(key, body))
}

/// Section name → item constructor registry.
///
/// A stack consults its schema whenever a plain mapping is assigned as a
/// section, so new section kinds are added with [`register`](Self::register).
#[derive(Debug, Clone)]
pub struct SectionSchema {
    factories: IndexMap<String, ItemFactory>,
}

impl Default for SectionSchema {
    fn default() -> Self {
        let mut schema = Self::empty();
        schema.register(RESOURCES_SECTION, resource_item);
        schema.register(PARAMETERS_SECTION, parameter_item);
        schema
    }
}

impl SectionSchema {
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    pub fn register(&mut self, section_name: impl Into<String>, factory: ItemFactory) {
        self.factories.insert(section_name.into(), factory);
    }

    pub fn factory_for(&self, section_name: &str) -> ItemFactory {
        self.factories
            .get(section_name)
            .copied()
            .unwrap_or(generic_item)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// A section holding a single scalar value (e.g. `AWSTemplateFormatVersion`).
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSection {
    pub section_name: String,
    pub value: Value,
}

impl SimpleSection {
    pub fn new(section_name: impl Into<String>, value: Value) -> Self {
        Self {
            section_name: section_name.into(),
            value,
        }
    }

    pub fn is_truthy(&self) -> bool {
        value::is_truthy(&self.value)
    }
}

/// A section holding an ordered map of items.
#[derive(Debug, Clone)]
pub struct DictSection {
    section_name: Option<String>,
    items: IndexMap<String, SectionItem>,
    factory: ItemFactory,
}

impl PartialEq for DictSection {
    fn eq(&self, other: &Self) -> bool {
        self.section_name == other.section_name && self.items == other.items
    }
}

impl Default for DictSection {
    fn default() -> Self {
        Self {
            section_name: None,
            items: IndexMap::new(),
            factory: generic_item,
        }
    }
}

impl DictSection {
    /// Create a section whose item kind follows the default schema.
    pub fn new(section_name: impl Into<String>) -> Self {
        let section_name = section_name.into();
        let factory = SectionSchema::default().factory_for(&section_name);
        Self::with_factory(section_name, factory)
    }

    pub fn with_factory(section_name: impl Into<String>, factory: ItemFactory) -> Self {
        Self {
            section_name: Some(section_name.into()),
            items: IndexMap::new(),
            factory,
        }
    }

    /// Build a section from items, keyed by each item's key.
    pub fn with_items(section_name: impl Into<String>, items: Vec<SectionItem>) -> Self {
        let mut section = Self::new(section_name);
        for item in items {
            section.insert_item(item);
        }
        section
    }

    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    /// Insert an already wrapped item under its own key.
    pub fn insert_item(&mut self, item: SectionItem) -> Option<SectionItem> {
        let key = item.key().unwrap_or_default().to_string();
        self.items.insert(key, item)
    }

    /// Insert an already wrapped item under `key`, adopting the key if the
    /// item has none.
    pub fn insert(&mut self, key: impl Into<String>, mut item: SectionItem) -> Option<SectionItem> {
        let key = key.into();
        if item.key().is_none() {
            item.identity_mut().key = Some(key.clone());
        }
        self.items.insert(key, item)
    }

    /// Unwrapped read: the scalar stored under `key`, if that entry is a
    /// simple item.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.items.get(key).and_then(SectionItem::as_scalar)
    }

    /// Wrapped read: the item stored under `key`, whatever its kind.
    pub fn item(&self, key: &str) -> Option<&SectionItem> {
        self.items.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionItem)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn section_items(&self) -> impl Iterator<Item = &SectionItem> {
        self.items.values()
    }

    pub fn section_items_mut(&mut self) -> impl Iterator<Item = &mut SectionItem> {
        self.items.values_mut()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.items.values().filter_map(SectionItem::as_resource)
    }

    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.items.values_mut().filter_map(SectionItem::as_resource_mut)
    }

    pub fn resource(&self, key: &str) -> Option<&Resource> {
        self.items.get(key).and_then(SectionItem::as_resource)
    }

    pub fn resource_mut(&mut self, key: &str) -> Option<&mut Resource> {
        self.items.get_mut(key).and_then(SectionItem::as_resource_mut)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.items.values().filter_map(SectionItem::as_parameter)
    }

    pub fn is_truthy(&self) -> bool {
        !self.items.is_empty()
    }
}

impl OrderedContainer for DictSection {
    type Entry = SectionItem;

    fn get(&self, key: &str) -> Option<&SectionItem> {
        self.items.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut SectionItem> {
        self.items.get_mut(key)
    }

    /// Mappings go through the section's item factory, scalars become
    /// simple items. Mappings with keys that are not strings are kept
    /// verbatim as simple items.
    fn set(&mut self, key: impl Into<String>, raw: Value) {
        let key = key.into();
        let item = match raw {
            Value::Mapping(mapping) => match value::mapping_to_body(mapping.clone(), &key) {
                Ok(body) => (self.factory)(key.clone(), body),
                Err(_) => {
                    debug!("Keeping '{}' verbatim: mapping has non-string keys", key);
                    SectionItem::Simple(SimpleSectionItem::new(key.clone(), Value::Mapping(mapping)))
                }
            },
            other => SectionItem::Simple(SimpleSectionItem::new(key.clone(), other)),
        };
        self.items.insert(key, item);
    }

    fn remove(&mut self, key: &str) -> Option<SectionItem> {
        self.items.shift_remove(key)
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn to_value(&self) -> Value {
        let mut mapping = Mapping::with_capacity(self.items.len());
        for (key, item) in &self.items {
            mapping.insert(Value::String(key.clone()), item.to_value());
        }
        Value::Mapping(mapping)
    }
}

/// A top-level template section.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Simple(SimpleSection),
    Dict(DictSection),
}

impl Section {
    pub fn section_name(&self) -> Option<&str> {
        match self {
            Section::Simple(s) => Some(&s.section_name),
            Section::Dict(d) => d.section_name(),
        }
    }

    pub fn as_dict(&self) -> Option<&DictSection> {
        match self {
            Section::Dict(d) => Some(d),
            Section::Simple(_) => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut DictSection> {
        match self {
            Section::Dict(d) => Some(d),
            Section::Simple(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Section::Simple(s) => Some(&s.value),
            Section::Dict(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Section::Simple(s) => s.value.clone(),
            Section::Dict(d) => d.to_value(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Section::Simple(s) => s.is_truthy(),
            Section::Dict(d) => d.is_truthy(),
        }
    }
}

impl From<SimpleSection> for Section {
    fn from(section: SimpleSection) -> Self {
        Section::Simple(section)
    }
}

impl From<DictSection> for Section {
    fn from(section: DictSection) -> Self {
        Section::Dict(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, FileAsset, ImageAsset};

    fn mapping(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_item_id_falls_back_to_key() {
        let mut item = DictSectionItem::new("MyFunction");
        assert_eq!(item.item_id(), Some("MyFunction"));
        item.identity.set_item_id("Renamed");
        assert_eq!(item.key(), Some("MyFunction"));
        assert_eq!(item.item_id(), Some("Renamed"));
        assert_eq!(ItemIdentity::default().item_id(), None);
    }

    #[test]
    fn test_dict_item_delegates_to_body() {
        let mut item = DictSectionItem::new("Item");
        assert!(!item.is_truthy());
        item.set("foo", Value::String("bar".into()));
        item.set("baz", Value::String("bax".into()));
        assert_eq!(item.get("foo"), Some(&Value::String("bar".into())));
        assert_eq!(item.len(), 2);
        assert_eq!(item.keys().collect::<Vec<_>>(), vec!["foo", "baz"]);

        item.remove("foo");
        assert_eq!(item.keys().collect::<Vec<_>>(), vec!["baz"]);
        assert!(item.is_truthy());
    }

    #[test]
    fn test_find_asset_by_source_property() {
        let item = DictSectionItem::new("Fn").with_assets(vec![
            Asset::from(FileAsset::new().with_source_property("CodeUri")),
            Asset::from(ImageAsset::new().with_source_property("ImageUri")),
        ]);
        assert!(item.is_packageable());
        assert!(matches!(
            item.find_asset_by_source_property("ImageUri"),
            Some(Asset::Image(_))
        ));
        assert!(item.find_asset_by_source_property("Missing").is_none());
    }

    #[test]
    fn test_resource_packageable_by_type() {
        let tables = ResourceTypeTables::default();
        let mut resource = Resource::new("Fn");
        resource.set("Type", Value::String("AWS::Serverless::Function".into()));
        assert!(resource.is_packageable(&tables));

        let mut stage = Resource::new("Stage");
        stage.set("Type", Value::String("AWS::ApiGateway::Stage".into()));
        assert!(!stage.is_packageable(&tables));
    }

    #[test]
    fn test_inline_code_is_never_packageable() {
        let tables = ResourceTypeTables::default();
        let mut resource = Resource::new("Fn");
        resource.set("Type", Value::String("AWS::Serverless::Function".into()));
        resource.set("Properties", mapping("InlineCode: print(1)"));
        assert!(!resource.is_packageable(&tables));

        let mut untyped = Resource::new("Other");
        untyped.set("Properties", mapping("InlineCode: print(1)"));
        assert!(!untyped.is_packageable(&tables));
    }

    #[test]
    fn test_dict_section_wraps_by_section_name() {
        let mut resources = DictSection::new(RESOURCES_SECTION);
        resources.set("Fn", mapping("Type: AWS::Serverless::Function"));
        resources.set("Note", Value::String("scalar".into()));
        assert!(matches!(resources.get("Fn"), Some(SectionItem::Resource(_))));
        assert_eq!(resources.value("Note"), Some(&Value::String("scalar".into())));

        let mut params = DictSection::new(PARAMETERS_SECTION);
        params.set("Stage", mapping("Type: String"));
        assert!(matches!(params.get("Stage"), Some(SectionItem::Parameter(_))));

        let mut outputs = DictSection::new(OUTPUTS_SECTION);
        outputs.set("Url", mapping("Value: x"));
        let item = outputs.get("Url").unwrap();
        assert!(matches!(item, SectionItem::Dict(_)));
        assert_eq!(item.to_value(), mapping("Value: x"));
    }

    #[test]
    fn test_empty_dict_section_is_falsy() {
        let mut section = DictSection::default();
        assert!(!section.is_truthy());
        section.insert_item(DictSectionItem::new("a").into());
        assert!(section.is_truthy());
    }

    #[test]
    fn test_simple_section_truthiness() {
        let mut section = SimpleSection::new("Description", Value::String("val".into()));
        assert!(section.is_truthy());
        section.value = Value::Null;
        assert!(!section.is_truthy());
    }

    #[test]
    fn test_custom_factory_registration() {
        fn output_item(key: String, body: Body) -> SectionItem {
            let mut item = DictSectionItem::with_body(key, body);
            item.extra_details.insert("kind".into(), Value::String("output".into()));
            SectionItem::Dict(item)
        }

        let mut schema = SectionSchema::default();
        schema.register(OUTPUTS_SECTION, output_item);
        let mut outputs = DictSection::with_factory(OUTPUTS_SECTION, schema.factory_for(OUTPUTS_SECTION));
        outputs.set("Url", mapping("Value: x"));

        let item = outputs.get("Url").and_then(SectionItem::as_dict).unwrap();
        assert_eq!(item.extra_details.get("kind"), Some(&Value::String("output".into())));
    }

    #[test]
    fn test_section_order_preserved_on_remove() {
        let mut section = DictSection::new(RESOURCES_SECTION);
        for key in ["A", "B", "C"] {
            section.set(key, mapping("Type: AWS::SNS::Topic"));
        }
        section.remove("B");
        assert_eq!(section.keys().collect::<Vec<_>>(), vec!["A", "C"]);
    }
}
