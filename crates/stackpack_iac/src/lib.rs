//! # stackpack_iac
//!
//! IaC backends and packaging for stackpack.
//!
//! This crate reads source trees into the [`stackpack_model`] object model,
//! writes them back out, and rewrites asset references once artifacts have
//! remote locations.
//!
//! ## Features
//!
//! - [`IacPlugin`] backend contract with a template backend ([`CfnPlugin`])
//!   and a cloud-assembly backend ([`CdkPlugin`])
//! - [`PluginRegistry`] for selecting a backend by project type or by
//!   detecting it from a directory
//! - Packaged-location rewriting with per-destination reporting
//! - Atomic output writes
//!
//! ## Example
//!
//! ```rust,no_run
//! use stackpack_iac::{DryRunPublisher, Packager, PluginContext, PluginRegistry};
//! use std::path::{Path, PathBuf};
//!
//! let registry = PluginRegistry::with_defaults().unwrap();
//! let definition = registry.detect(Path::new("./my-app")).unwrap();
//! let context = PluginContext::new();
//! let plugin = definition.create(context.clone());
//!
//! let mut project = plugin.read_project(&[PathBuf::from("./my-app")]).unwrap();
//! let publisher = DryRunPublisher::new(Some("my-bucket".into()), None, None);
//! Packager::new(plugin.as_ref(), &publisher, context.resource_types())
//!     .package_project(&mut project)
//!     .unwrap();
//! plugin.write_project(&mut project, Path::new("./my-app/.stackpack/build")).unwrap();
//! ```

pub mod cdk;
pub mod cfn;
pub mod error;
pub mod locations;
pub mod packager;
pub mod plugin;
pub mod registry;
pub mod template;
pub mod validation;
pub mod writer;

pub use cdk::{CdkPlugin, CDK};
pub use cfn::{CfnPlugin, CFN};
pub use error::{IacError, IacResult};
pub use locations::{apply_packaged_locations, LocationUpdateReport};
pub use packager::{ArtifactPublisher, DryRunPublisher, FileLocation, ImageLocation, Packager};
pub use plugin::{IacPlugin, PluginContext};
pub use registry::{PluginConstructor, PluginDefinition, PluginRegistry};
pub use template::TemplateReader;
pub use validation::{select_stack, select_stack_mut, validate_context};
pub use writer::TemplateWriter;
