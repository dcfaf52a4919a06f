//! CLI command definitions.
//!
//! Each subcommand maps to one step of the packaging workflow.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stackpack_iac::plugin::{BASE_DIR, CDK_APP, PROJECT_TYPE, STACK_NAME, TEMPLATE_FILE};
use stackpack_iac::{validate_context, IacPlugin, PluginContext, PluginRegistry};
use stackpack_model::{Project, ResourceTypeTables};
use tracing::{debug, info};

pub mod detect;
pub mod list;
pub mod package;

/// stackpack - read, package and rewrite infrastructure-as-code projects
#[derive(Parser)]
#[command(name = "stackpack")]
#[command(version, about = "stackpack - read, package and rewrite infrastructure-as-code projects")]
#[command(long_about = r#"
stackpack reads a template project or a synthesized cloud assembly into one
object model, assigns remote locations to its local artifacts and writes the
rewritten project back out.

COMMANDS:
  detect   → Show which project type a directory holds
  list     → List stacks, resources or parameters
  package  → Assign artifact locations and write the packaged project

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  5 - IaC error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the project type of a directory
    Detect(detect::DetectArgs),

    /// List stacks, resources or parameters of a project
    List(list::ListArgs),

    /// Package a project for deployment
    Package(package::PackageArgs),
}

/// Options shared by every command that reads a project.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Project type (CFN or CDK); detected when omitted
    #[arg(long)]
    pub project_type: Option<String>,

    /// Template file to read instead of searching the project directory
    #[arg(short, long)]
    pub template_file: Option<PathBuf>,

    /// Cloud assembly directory of a CDK project
    #[arg(long)]
    pub cdk_app: Option<PathBuf>,

    /// Stack to operate on
    #[arg(long)]
    pub stack_name: Option<String>,

    /// Directory that function and layer paths are relative to
    #[arg(short, long)]
    pub base_dir: Option<PathBuf>,

    /// Resource type tables (.toml or .yaml) replacing or extending the defaults
    #[arg(long)]
    pub resource_types: Option<PathBuf>,
}

/// A project read through the backend that owns it.
pub struct LoadedProject {
    pub project_type: String,
    pub context: PluginContext,
    pub plugin: Box<dyn IacPlugin>,
    pub project: Project,
}

fn path_option(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ProjectArgs {
    /// Backend options derived from the flags.
    pub fn context(&self, project_type: &str) -> Result<PluginContext> {
        let mut context = PluginContext::new().with_option(PROJECT_TYPE, project_type);
        if let Some(template_file) = &self.template_file {
            context.set_option(TEMPLATE_FILE, path_option(template_file));
        }
        if let Some(cdk_app) = &self.cdk_app {
            context.set_option(CDK_APP, path_option(cdk_app));
        }
        if let Some(stack_name) = &self.stack_name {
            context.set_option(STACK_NAME, stack_name.as_str());
        }
        if let Some(base_dir) = &self.base_dir {
            context.set_option(BASE_DIR, path_option(base_dir));
        }
        if let Some(path) = &self.resource_types {
            let tables = ResourceTypeTables::from_file(path)
                .with_context(|| format!("Failed to load resource types from {}", path.display()))?;
            context = context.with_resource_types(tables);
        }
        Ok(context)
    }

    /// The explicit project type, or the one detected in the project directory.
    pub fn resolve_project_type(&self, registry: &PluginRegistry) -> Result<String> {
        if let Some(project_type) = &self.project_type {
            return Ok(project_type.to_uppercase());
        }
        let definition = registry
            .detect(&self.project_dir)
            .with_context(|| format!("Use '--project-type' to choose one of: {}", types(registry)))?;
        Ok(definition.project_type.clone())
    }

    /// Resolve, validate and read the project.
    pub fn load(&self, context_options: &[(&str, String)]) -> Result<LoadedProject> {
        let registry = PluginRegistry::with_defaults()?;
        let project_type = self.resolve_project_type(&registry)?;
        let mut context = self.context(&project_type)?;
        for (name, value) in context_options {
            context.set_option(*name, value.as_str());
        }
        validate_context(&registry, &project_type, &context)?;
        debug!("Plugin options: {:?}", context.options().collect::<Vec<_>>());

        let plugin = registry.create(&project_type, context.clone())?;
        let project = plugin
            .read_project(&[self.project_dir.clone()])
            .with_context(|| format!("Failed to read {} project", project_type))?;
        info!("Loaded {} project with {} stacks", project_type, project.stacks.len());

        Ok(LoadedProject {
            project_type,
            context,
            plugin,
            project,
        })
    }
}

fn types(registry: &PluginRegistry) -> String {
    registry.project_types().collect::<Vec<_>>().join(", ")
}
