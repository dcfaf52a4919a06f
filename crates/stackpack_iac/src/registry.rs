//! Registry of IaC backends and source-tree detection.

use std::fs;
use std::path::Path;

use glob::Pattern;
use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cdk::{CdkPlugin, CDK, CDK_FILE_PATTERNS, MANIFEST_FILE, STACK_ARTIFACT_TYPE};
use crate::cfn::{CfnPlugin, CFN, CFN_FILE_PATTERNS};
use crate::error::{IacError, IacResult};
use crate::plugin::{IacPlugin, PluginContext, CDK_APP};

/// Constructs a backend from its context.
pub type PluginConstructor = fn(PluginContext) -> Box<dyn IacPlugin>;

/// A backend together with the rules that select it for a source tree.
#[derive(Clone)]
pub struct PluginDefinition {
    pub project_type: String,
    file_rules: Vec<Pattern>,
    content_rules: Vec<(Pattern, Regex)>,
    /// Options only this project type accepts.
    pub additional_options: Vec<String>,
    constructor: PluginConstructor,
}

impl PluginDefinition {
    pub fn new(project_type: impl Into<String>, constructor: PluginConstructor) -> Self {
        Self {
            project_type: project_type.into(),
            file_rules: Vec::new(),
            content_rules: Vec::new(),
            additional_options: Vec::new(),
            constructor,
        }
    }

    /// Add a file name glob that identifies this project type.
    pub fn with_file_rule(mut self, pattern: &str) -> IacResult<Self> {
        let pattern = Pattern::new(pattern).map_err(|e| IacError::InvalidRule(format!("{pattern}: {e}")))?;
        self.file_rules.push(pattern);
        Ok(self)
    }

    pub fn with_file_rules(self, patterns: &[&str]) -> IacResult<Self> {
        patterns.iter().try_fold(self, |definition, p| definition.with_file_rule(p))
    }

    /// Require files matching `file_pattern` to also contain `content`.
    pub fn with_content_rule(mut self, file_pattern: &str, content: &str) -> IacResult<Self> {
        let pattern =
            Pattern::new(file_pattern).map_err(|e| IacError::InvalidRule(format!("{file_pattern}: {e}")))?;
        let regex = Regex::new(content).map_err(|e| IacError::InvalidRule(format!("{content}: {e}")))?;
        self.content_rules.push((pattern, regex));
        Ok(self)
    }

    pub fn with_additional_option(mut self, option: impl Into<String>) -> Self {
        self.additional_options.push(option.into());
        self
    }

    pub fn create(&self, context: PluginContext) -> Box<dyn IacPlugin> {
        (self.constructor)(context)
    }

    /// Whether `path` identifies a project of this type.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.file_rules.iter().any(|p| p.matches(name)) {
            return false;
        }

        let mut applicable = self.content_rules.iter().filter(|(p, _)| p.matches(name)).peekable();
        if applicable.peek().is_none() {
            return true;
        }
        match fs::read_to_string(path) {
            Ok(content) => applicable.all(|(_, regex)| regex.is_match(&content)),
            Err(e) => {
                debug!("Cannot read {:?} for detection: {}", path, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("project_type", &self.project_type)
            .field("file_rules", &self.file_rules.iter().map(Pattern::as_str).collect::<Vec<_>>())
            .field("additional_options", &self.additional_options)
            .finish()
    }
}

/// Ordered registry of backends keyed by project type.
///
/// Detection tries definitions in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    definitions: IndexMap<String, PluginDefinition>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the template backend followed by the cloud-assembly backend.
    pub fn with_defaults() -> IacResult<Self> {
        let mut registry = Self::new();
        registry.register(PluginDefinition::new(CFN, CfnPlugin::create).with_file_rules(CFN_FILE_PATTERNS)?);
        registry.register(
            PluginDefinition::new(CDK, CdkPlugin::create)
                .with_file_rules(CDK_FILE_PATTERNS)?
                .with_content_rule(MANIFEST_FILE, &regex::escape(STACK_ARTIFACT_TYPE))?
                .with_additional_option(CDK_APP),
        );
        Ok(registry)
    }

    /// Register a definition, replacing any with the same project type.
    pub fn register(&mut self, definition: PluginDefinition) {
        debug!("Registering plugin: {}", definition.project_type);
        self.definitions.insert(definition.project_type.clone(), definition);
    }

    pub fn get(&self, project_type: &str) -> Option<&PluginDefinition> {
        self.definitions.get(project_type)
    }

    pub fn get_required(&self, project_type: &str) -> IacResult<&PluginDefinition> {
        self.get(project_type)
            .ok_or_else(|| IacError::UnknownProjectType(project_type.to_string()))
    }

    /// Construct the backend registered for `project_type`.
    pub fn create(&self, project_type: &str, context: PluginContext) -> IacResult<Box<dyn IacPlugin>> {
        Ok(self.get_required(project_type)?.create(context))
    }

    pub fn project_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// The first definition with a matching file directly inside `dir`.
    pub fn detect(&self, dir: &Path) -> IacResult<&PluginDefinition> {
        let files: Vec<_> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        for definition in self.definitions.values() {
            if let Some(file) = files.iter().find(|f| definition.matches(f)) {
                info!("Detected {} project from {:?}", definition.project_type, file);
                return Ok(definition);
            }
        }
        Err(IacError::NoProjectDetected(dir.to_path_buf()))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("project_types", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}
