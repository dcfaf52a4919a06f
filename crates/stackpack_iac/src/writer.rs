//! All-or-nothing file writes for generated templates and manifests.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_yaml::Value;
use stackpack_model::{value, Stack};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{IacError, IacResult};
use crate::template::{relative_path, template_path_string, TemplateReader};

/// Writer for build output.
///
/// Content goes to a temporary file in the destination directory first and
/// is renamed into place, so a failed write never leaves a partial file.
pub struct TemplateWriter;

impl TemplateWriter {
    /// Write a template as YAML or JSON.
    pub fn write_template(path: &Path, template: &Value, use_json: bool) -> IacResult<()> {
        let content = TemplateReader::render(template, use_json)?;
        Self::write_atomically(path, &content)
    }

    /// Write a JSON document.
    pub fn write_json(path: &Path, document: &serde_json::Value) -> IacResult<()> {
        let mut content = serde_json::to_string_pretty(document)?;
        content.push('\n');
        Self::write_atomically(path, &content)
    }

    /// The stack as it should be written to `output_dir`.
    ///
    /// Every file asset with both a source property and an updated source
    /// path has the value at `target(section, property)` inside its item
    /// replaced by that path, made relative to `output_dir` when absolute.
    /// Assets that already have destinations keep their packaged value.
    /// The stack itself is not modified.
    pub fn render_with_updated_paths<F>(stack: &Stack, output_dir: &Path, target: F) -> Value
    where
        F: Fn(&str, &str) -> String,
    {
        let mut output = stack.as_dict();

        for section in stack.dict_sections() {
            let section_name = section.section_name().unwrap_or_default();
            for (key, item) in section.iter() {
                let local_files = item
                    .assets()
                    .iter()
                    .filter_map(|a| a.as_file())
                    .filter(|f| f.info.destinations.is_empty());
                for file in local_files {
                    let (Some(property), Some(updated)) =
                        (file.info.source_property.as_deref(), file.updated_source_path.as_deref())
                    else {
                        continue;
                    };

                    let updated = Path::new(updated);
                    let rewritten = if updated.is_absolute() {
                        relative_path(output_dir, updated)
                    } else {
                        updated.to_path_buf()
                    };
                    let path = target(section_name, property);
                    let slot = output
                        .get_mut(section_name)
                        .and_then(|s| s.get_mut(key))
                        .and_then(|item| value::lookup_mut(item, &path));
                    match slot {
                        Some(slot) => *slot = Value::String(template_path_string(&rewritten)),
                        None => warn!("Cannot rewrite {}.{}: path not found", key, path),
                    }
                }
            }
        }
        output
    }

    pub fn write_atomically(path: &Path, content: &str) -> IacResult<()> {
        debug!("Writing {:?}", path);
        let failure = |message: String| IacError::WriteFailure {
            path: path.to_path_buf(),
            message,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| failure(e.to_string()))?;

        let mut staged = NamedTempFile::new_in(parent).map_err(|e| failure(e.to_string()))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|e| failure(e.to_string()))?;
        staged.persist(path).map_err(|e| failure(e.error.to_string()))?;
        Ok(())
    }
}
