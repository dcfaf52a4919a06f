//! Package command - Assign artifact locations and write the packaged project.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use indexmap::IndexMap;
use stackpack_iac::plugin::USE_JSON;
use stackpack_iac::{select_stack, DryRunPublisher, Packager};
use tracing::{info, warn};

use super::ProjectArgs;
use crate::config::{StackpackConfig, DEFAULT_CONFIG_ENV, DEFAULT_CONFIG_FILE};

const COMMAND_NAME: &str = "package";

#[derive(Args, Debug, Default)]
pub struct PackageArgs {
    /// Bucket that file artifacts are uploaded to
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Key prefix for uploaded file artifacts
    #[arg(long)]
    s3_prefix: Option<String>,

    /// Repository URI (`registry/repository`) that images are pushed to
    #[arg(long)]
    image_repository: Option<String>,

    /// Directory the packaged project is written to
    #[arg(short, long, default_value = ".stackpack/package")]
    output_dir: PathBuf,

    /// Write templates as JSON
    #[arg(long)]
    use_json: bool,

    /// Config file with command defaults
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Environment table to read from the config file
    #[arg(long, env = "STACKPACK_CONFIG_ENV", default_value = DEFAULT_CONFIG_ENV)]
    config_env: String,

    #[command(flatten)]
    project: ProjectArgs,
}

impl PackageArgs {
    /// Fill flags left unset from config parameters.
    fn apply_config(&mut self, params: &IndexMap<String, String>) {
        let fill = |slot: &mut Option<String>, name: &str| {
            if slot.is_none() {
                *slot = params.get(name).cloned();
            }
        };
        fill(&mut self.s3_bucket, "s3_bucket");
        fill(&mut self.s3_prefix, "s3_prefix");
        fill(&mut self.image_repository, "image_repository");
        fill(&mut self.project.stack_name, "stack_name");
        fill(&mut self.project.project_type, "project_type");

        if !self.use_json {
            self.use_json = params.get("use_json").map_or(false, |v| v == "true");
        }
        if self.project.base_dir.is_none() {
            self.project.base_dir = params.get("base_dir").map(PathBuf::from);
        }
        if self.project.template_file.is_none() {
            self.project.template_file = params.get("template_file").map(PathBuf::from);
        }
    }
}

pub fn execute(mut args: PackageArgs) -> Result<()> {
    let config_path = if args.config_file.is_absolute() {
        args.config_file.clone()
    } else {
        args.project.project_dir.join(&args.config_file)
    };
    let config = StackpackConfig::load(&config_path)?;
    args.apply_config(&config.parameters(&args.config_env, COMMAND_NAME));

    if args.s3_bucket.is_none() && args.image_repository.is_none() {
        bail!("Missing option '--s3-bucket' or '--image-repository'");
    }

    let mut loaded = args.project.load(&[(USE_JSON, args.use_json.to_string())])?;
    if let Some(name) = args.project.stack_name.as_deref() {
        select_stack(&loaded.project, Some(name))?;
        loaded.project.stacks.retain(|s| s.name() == name);
    }

    info!("Packaging {} project", loaded.project_type);
    let publisher = DryRunPublisher::new(args.s3_bucket.clone(), args.s3_prefix.clone(), args.image_repository.clone());
    let report = Packager::new(loaded.plugin.as_ref(), &publisher, loaded.context.resource_types())
        .package_project(&mut loaded.project)?;

    for failure in &report.failures {
        warn!("{}", failure);
    }
    if !report.is_complete() {
        bail!(
            "IaC references could not be updated: {} of {} failed",
            report.failures.len(),
            report.total()
        );
    }

    if !loaded.plugin.write_project(&mut loaded.project, &args.output_dir)? {
        bail!("Failed to write packaged project to {}", args.output_dir.display());
    }

    println!(
        "Packaged {} stack(s): {} reference(s) updated, {} already current",
        loaded.project.stacks.len(),
        report.applied,
        report.already_applied
    );
    println!("Output written to {}", args.output_dir.display());
    Ok(())
}
