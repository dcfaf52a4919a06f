//! # stackpack_model
//!
//! In-memory model of an infrastructure-as-code project for stackpack.
//!
//! A [`Project`] holds ordered [`Stack`]s. A stack holds ordered
//! [`Section`]s, and dict sections hold [`SectionItem`]s such as
//! [`Resource`] and [`Parameter`]. Items carry the [`Asset`]s that must be
//! uploaded before deployment and the [`Destination`]s their remote
//! references are written back to.
//!
//! ## Example
//!
//! ```rust
//! use stackpack_model::{OrderedContainer, ResourceTypeTables, Stack};
//!
//! let template = serde_yaml::from_str(
//!     "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      CodeUri: src/\n",
//! )
//! .unwrap();
//! let stack = Stack::from_template(template).unwrap();
//!
//! let tables = ResourceTypeTables::default();
//! let function = stack.resources().and_then(|r| r.resource("Fn")).unwrap();
//! assert!(function.is_packageable(&tables));
//! assert_eq!(stack.len(), 1);
//! ```

pub mod asset;
pub mod container;
pub mod error;
pub mod project;
pub mod resource_types;
pub mod section;
pub mod stack;
pub mod value;

pub use asset::{Asset, AssetInfo, Destination, Environment, FileAsset, ImageAsset, PackageType};
pub use container::OrderedContainer;
pub use error::{ModelError, ModelResult};
pub use project::Project;
pub use resource_types::ResourceTypeTables;
pub use section::{
    DictSection, DictSectionItem, ItemFactory, ItemIdentity, Parameter, Resource, Section, SectionItem,
    SectionSchema, SimpleSection, SimpleSectionItem, METADATA_SECTION, OUTPUTS_SECTION, PARAMETERS_SECTION,
    RESOURCES_SECTION,
};
pub use stack::Stack;
pub use value::Body;
