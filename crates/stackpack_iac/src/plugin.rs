//! The backend contract and the options a backend is constructed with.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use stackpack_model::{Project, ResourceTypeTables, Stack};

use crate::error::IacResult;
use crate::locations::LocationUpdateReport;

pub const TEMPLATE_FILE: &str = "template_file";
pub const BASE_DIR: &str = "base_dir";
pub const USE_JSON: &str = "use_json";
pub const STACK_NAME: &str = "stack_name";
pub const CDK_APP: &str = "cdk_app";
pub const PROJECT_TYPE: &str = "project_type";

/// Contract every IaC backend satisfies.
///
/// Implementations are stateless between calls: nothing read by
/// [`read_project`](IacPlugin::read_project) is cached for a later
/// [`write_project`](IacPlugin::write_project); the project handed in is
/// authoritative.
#[cfg_attr(test, mockall::automock)]
pub trait IacPlugin: Send + Sync {
    /// Search `lookup_paths` in order and build the project graph.
    ///
    /// Fails with [`IacError::ProjectParse`](crate::IacError::ProjectParse)
    /// when nothing recognizable is found or the content is malformed.
    fn read_project(&self, lookup_paths: &[PathBuf]) -> IacResult<Project>;

    /// Serialize every stack under `build_dir`.
    ///
    /// Returns `Ok(false)` when a file could not be written; errors are
    /// reserved for projects that cannot be written at all.
    fn write_project(&self, project: &mut Project, build_dir: &Path) -> IacResult<bool>;

    /// Write every asset destination back into the owning item bodies.
    fn update_packaged_locations(&self, stack: &mut Stack) -> LocationUpdateReport;

    /// File name patterns that identify this backend's sources, in priority order.
    fn get_iac_file_patterns(&self) -> &'static [&'static str];
}

/// Command-line options handed to a backend, keyed by option name.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    options: IndexMap<String, String>,
    resource_types: Arc<ResourceTypeTables>,
}

impl PluginContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_option(name, value);
        self
    }

    pub fn with_resource_types(mut self, tables: ResourceTypeTables) -> Self {
        self.resource_types = Arc::new(tables);
        self
    }

    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name.into(), value.into());
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn resource_types(&self) -> &ResourceTypeTables {
        &self.resource_types
    }

    pub fn template_file(&self) -> Option<PathBuf> {
        self.option(TEMPLATE_FILE).map(PathBuf::from)
    }

    pub fn base_dir(&self) -> Option<PathBuf> {
        self.option(BASE_DIR).map(PathBuf::from)
    }

    pub fn use_json(&self) -> bool {
        matches!(self.option(USE_JSON), Some("true") | Some("1") | Some("yes"))
    }

    pub fn stack_name(&self) -> Option<&str> {
        self.option(STACK_NAME)
    }

    pub fn cdk_app(&self) -> Option<&str> {
        self.option(CDK_APP)
    }

    pub fn project_type(&self) -> Option<&str> {
        self.option(PROJECT_TYPE)
    }
}
