//! Resource type classification tables.
//!
//! Packageability is decided by three externally configured tables:
//! nested-stack types, types with local file-path properties, and types with
//! a container-image component. The defaults mirror the AWS SAM resource
//! catalogue; deployments may load their own tables from TOML or YAML.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, ModelResult};

pub const AWS_SERVERLESS_FUNCTION: &str = "AWS::Serverless::Function";
pub const AWS_LAMBDA_FUNCTION: &str = "AWS::Lambda::Function";
pub const AWS_SERVERLESS_LAYERVERSION: &str = "AWS::Serverless::LayerVersion";
pub const AWS_LAMBDA_LAYERVERSION: &str = "AWS::Lambda::LayerVersion";
pub const AWS_SERVERLESS_API: &str = "AWS::Serverless::Api";
pub const AWS_SERVERLESS_HTTPAPI: &str = "AWS::Serverless::HttpApi";
pub const AWS_SERVERLESS_STATEMACHINE: &str = "AWS::Serverless::StateMachine";
pub const AWS_SERVERLESS_APPLICATION: &str = "AWS::Serverless::Application";
pub const AWS_SERVERLESSREPO_APPLICATION: &str = "AWS::ServerlessRepo::Application";
pub const AWS_APPSYNC_GRAPHQLSCHEMA: &str = "AWS::AppSync::GraphQLSchema";
pub const AWS_APPSYNC_RESOLVER: &str = "AWS::AppSync::Resolver";
pub const AWS_APPSYNC_FUNCTIONCONFIGURATION: &str = "AWS::AppSync::FunctionConfiguration";
pub const AWS_APIGATEWAY_RESTAPI: &str = "AWS::ApiGateway::RestApi";
pub const AWS_ELASTICBEANSTALK_APPLICATIONVERSION: &str = "AWS::ElasticBeanstalk::ApplicationVersion";
pub const AWS_CLOUDFORMATION_MODULEVERSION: &str = "AWS::CloudFormation::ModuleVersion";
pub const AWS_CLOUDFORMATION_RESOURCEVERSION: &str = "AWS::CloudFormation::ResourceVersion";
pub const AWS_CLOUDFORMATION_STACK: &str = "AWS::CloudFormation::Stack";
pub const AWS_GLUE_JOB: &str = "AWS::Glue::Job";
pub const AWS_STEPFUNCTIONS_STATEMACHINE: &str = "AWS::StepFunctions::StateMachine";
pub const AWS_ECR_REPOSITORY: &str = "AWS::ECR::Repository";

/// Resource types that represent deployable functions.
pub const FUNCTION_TYPES: &[&str] = &[AWS_SERVERLESS_FUNCTION, AWS_LAMBDA_FUNCTION];

/// Types whose local paths resolve against the project base directory
/// rather than the template directory.
pub const BASE_DIR_TYPES: &[&str] = &[
    AWS_SERVERLESS_FUNCTION,
    AWS_LAMBDA_FUNCTION,
    AWS_SERVERLESS_LAYERVERSION,
    AWS_LAMBDA_LAYERVERSION,
];

/// Classification tables consulted by packaging and asset discovery.
/// Missing tables in a loaded file are empty, not the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeTables {
    /// Resource type → property holding the nested template location.
    #[serde(default)]
    pub nested_stacks: IndexMap<String, String>,
    /// Resource type → property paths that may hold local file paths.
    #[serde(default)]
    pub local_paths: IndexMap<String, Vec<String>>,
    /// Resource type → property paths that may hold a local image reference.
    #[serde(default)]
    pub image_components: IndexMap<String, Vec<String>>,
    /// Metadata key → property paths that may hold local file paths.
    #[serde(default)]
    pub metadata_local_paths: IndexMap<String, Vec<String>>,
    /// Resource type → property → `(bucket field, key field)` for properties
    /// that only accept an object mapping, never an `s3://` URI.
    #[serde(default)]
    pub bucket_key_properties: IndexMap<String, IndexMap<String, (String, String)>>,
}

/// On-disk form of the tables. `extend = true` merges into the defaults.
#[derive(Debug, Deserialize)]
struct TablesFile {
    #[serde(default)]
    extend: bool,
    #[serde(flatten)]
    tables: ResourceTypeTables,
}

impl Default for ResourceTypeTables {
    fn default() -> Self {
        Self::aws_sam()
    }
}

fn props(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl ResourceTypeTables {
    /// Empty tables: nothing is packageable.
    pub fn empty() -> Self {
        Self {
            nested_stacks: IndexMap::new(),
            local_paths: IndexMap::new(),
            image_components: IndexMap::new(),
            metadata_local_paths: IndexMap::new(),
            bucket_key_properties: IndexMap::new(),
        }
    }

    /// The AWS SAM resource catalogue.
    pub fn aws_sam() -> Self {
        let appsync_templates = [
            "RequestMappingTemplateS3Location",
            "ResponseMappingTemplateS3Location",
            "CodeS3Location",
        ];

        let local_paths = IndexMap::from([
            (AWS_SERVERLESS_FUNCTION.to_string(), props(&["CodeUri"])),
            (AWS_SERVERLESS_API.to_string(), props(&["DefinitionUri"])),
            (AWS_SERVERLESS_HTTPAPI.to_string(), props(&["DefinitionUri"])),
            (AWS_APPSYNC_GRAPHQLSCHEMA.to_string(), props(&["DefinitionS3Location"])),
            (AWS_APPSYNC_RESOLVER.to_string(), props(&appsync_templates)),
            (AWS_APPSYNC_FUNCTIONCONFIGURATION.to_string(), props(&appsync_templates)),
            (AWS_LAMBDA_FUNCTION.to_string(), props(&["Code"])),
            (AWS_APIGATEWAY_RESTAPI.to_string(), props(&["BodyS3Location"])),
            (AWS_ELASTICBEANSTALK_APPLICATIONVERSION.to_string(), props(&["SourceBundle"])),
            (AWS_SERVERLESS_LAYERVERSION.to_string(), props(&["ContentUri"])),
            (AWS_LAMBDA_LAYERVERSION.to_string(), props(&["Content"])),
            (AWS_GLUE_JOB.to_string(), props(&["Command.ScriptLocation"])),
            (AWS_SERVERLESS_STATEMACHINE.to_string(), props(&["DefinitionUri"])),
            (AWS_STEPFUNCTIONS_STATEMACHINE.to_string(), props(&["DefinitionS3Location"])),
            (AWS_CLOUDFORMATION_MODULEVERSION.to_string(), props(&["ModulePackage"])),
            (AWS_CLOUDFORMATION_RESOURCEVERSION.to_string(), props(&["SchemaHandlerPackage"])),
        ]);

        let image_components = IndexMap::from([
            (AWS_SERVERLESS_FUNCTION.to_string(), props(&["ImageUri"])),
            (AWS_LAMBDA_FUNCTION.to_string(), props(&["Code.ImageUri"])),
            (AWS_ECR_REPOSITORY.to_string(), props(&["RepositoryName"])),
        ]);

        let nested_stacks = IndexMap::from([
            (AWS_SERVERLESS_APPLICATION.to_string(), "Location".to_string()),
            (AWS_CLOUDFORMATION_STACK.to_string(), "TemplateURL".to_string()),
        ]);

        let metadata_local_paths = IndexMap::from([(
            AWS_SERVERLESSREPO_APPLICATION.to_string(),
            props(&["LicenseUrl", "ReadmeUrl"]),
        )]);

        let object = |bucket: &str, key: &str| (bucket.to_string(), key.to_string());
        let bucket_key_properties = IndexMap::from([
            (
                AWS_LAMBDA_FUNCTION.to_string(),
                IndexMap::from([("Code".to_string(), object("S3Bucket", "S3Key"))]),
            ),
            (
                AWS_LAMBDA_LAYERVERSION.to_string(),
                IndexMap::from([("Content".to_string(), object("S3Bucket", "S3Key"))]),
            ),
            (
                AWS_ELASTICBEANSTALK_APPLICATIONVERSION.to_string(),
                IndexMap::from([("SourceBundle".to_string(), object("S3Bucket", "S3Key"))]),
            ),
            (
                AWS_APIGATEWAY_RESTAPI.to_string(),
                IndexMap::from([("BodyS3Location".to_string(), object("Bucket", "Key"))]),
            ),
            (
                AWS_STEPFUNCTIONS_STATEMACHINE.to_string(),
                IndexMap::from([("DefinitionS3Location".to_string(), object("Bucket", "Key"))]),
            ),
        ]);

        Self {
            nested_stacks,
            local_paths,
            image_components,
            metadata_local_paths,
            bucket_key_properties,
        }
    }

    /// Load tables from a `.toml`, `.yaml` or `.yml` file.
    pub fn from_file(path: &Path) -> ModelResult<Self> {
        debug!("Loading resource type tables from {:?}", path);
        let content = fs::read_to_string(path)?;
        let is_toml = path.extension().map_or(false, |ext| ext == "toml");
        let file: TablesFile = if is_toml {
            toml::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        if file.tables.nested_stacks.values().any(|p| p.is_empty()) {
            return Err(ModelError::ResourceTypes {
                path: path.to_path_buf(),
                message: "nested stack location property must not be empty".to_string(),
            });
        }

        if file.extend {
            let mut merged = Self::default();
            merged.merge(file.tables);
            Ok(merged)
        } else {
            Ok(file.tables)
        }
    }

    /// Merge `other` into these tables; entries in `other` win.
    pub fn merge(&mut self, other: ResourceTypeTables) {
        self.nested_stacks.extend(other.nested_stacks);
        self.local_paths.extend(other.local_paths);
        self.image_components.extend(other.image_components);
        self.metadata_local_paths.extend(other.metadata_local_paths);
        self.bucket_key_properties.extend(other.bucket_key_properties);
    }

    pub fn is_nested_stack(&self, resource_type: &str) -> bool {
        self.nested_stacks.contains_key(resource_type)
    }

    pub fn has_local_paths(&self, resource_type: &str) -> bool {
        self.local_paths.contains_key(resource_type)
    }

    pub fn has_image_component(&self, resource_type: &str) -> bool {
        self.image_components.contains_key(resource_type)
    }

    /// True when the type belongs to any of the three packageable classes.
    pub fn is_packageable_type(&self, resource_type: &str) -> bool {
        self.is_nested_stack(resource_type)
            || self.has_local_paths(resource_type)
            || self.has_image_component(resource_type)
    }

    pub fn nested_stack_property(&self, resource_type: &str) -> Option<&str> {
        self.nested_stacks.get(resource_type).map(String::as_str)
    }

    pub fn local_path_properties(&self, resource_type: &str) -> &[String] {
        self.local_paths.get(resource_type).map_or(&[], Vec::as_slice)
    }

    pub fn image_properties(&self, resource_type: &str) -> &[String] {
        self.image_components.get(resource_type).map_or(&[], Vec::as_slice)
    }

    /// Field names of the object mapping `property` of `resource_type` must hold.
    pub fn bucket_key_fields(&self, resource_type: &str, property: &str) -> Option<(&str, &str)> {
        self.bucket_key_properties
            .get(resource_type)?
            .get(property)
            .map(|(bucket, key)| (bucket.as_str(), key.as_str()))
    }

    /// Iterate `(resource type, property)` pairs for help output.
    pub fn packageable_locations(&self) -> impl Iterator<Item = (&str, &str)> {
        let nested = self
            .nested_stacks
            .iter()
            .map(|(t, p)| (t.as_str(), p.as_str()));
        let locals = self
            .local_paths
            .iter()
            .chain(self.image_components.iter())
            .flat_map(|(t, ps)| ps.iter().map(move |p| (t.as_str(), p.as_str())));
        nested.chain(locals)
    }
}
