//! Detect command - Show which backend owns a directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use stackpack_iac::{PluginContext, PluginRegistry};
use tracing::info;

#[derive(Args)]
pub struct DetectArgs {
    /// Directory to inspect
    #[arg(default_value = ".")]
    dir: PathBuf,
}

pub fn execute(args: DetectArgs) -> Result<()> {
    info!("Detecting project type in {}", args.dir.display());

    let registry = PluginRegistry::with_defaults()?;
    let definition = registry.detect(&args.dir)?;
    let plugin = definition.create(PluginContext::new());

    println!("{}", definition.project_type);
    println!("  file patterns: {}", plugin.get_iac_file_patterns().join(", "));
    if !definition.additional_options.is_empty() {
        let options: Vec<String> = definition
            .additional_options
            .iter()
            .map(|o| format!("--{}", o.replace('_', "-")))
            .collect();
        println!("  extra options: {}", options.join(", "));
    }

    Ok(())
}
