//! Template file reading and local path helpers.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{IacError, IacResult};

const REMOTE_PREFIXES: &[&str] = &["s3://", "http://", "https://"];
const FILE_SCHEME: &str = "file://";

/// Reader for template files.
pub struct TemplateReader;

impl TemplateReader {
    /// Read and structurally validate a template.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML so that
    /// short-form intrinsic tags survive.
    pub fn read(path: &Path) -> IacResult<Value> {
        debug!("Reading template from {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| IacError::parse(path, e.to_string()))?;
        let is_json = path.extension().map_or(false, |ext| ext == "json");
        let template: Value = if is_json {
            let json: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| IacError::parse(path, e.to_string()))?;
            serde_yaml::to_value(json)?
        } else {
            serde_yaml::from_str(&content).map_err(|e| IacError::parse(path, e.to_string()))?
        };

        Self::validate(path, &template)?;
        Ok(template)
    }

    fn validate(path: &Path, template: &Value) -> IacResult<()> {
        let mapping = template
            .as_mapping()
            .ok_or_else(|| IacError::parse(path, "template root must be a mapping"))?;
        match mapping.get("Resources") {
            Some(resources) if !resources.is_mapping() => {
                Err(IacError::parse(path, "'Resources' must be a mapping"))
            }
            _ => Ok(()),
        }
    }

    /// Render a template as YAML, or as JSON with intrinsics in long form.
    pub fn render(template: &Value, use_json: bool) -> IacResult<String> {
        if use_json {
            let mut rendered = serde_json::to_string_pretty(&to_long_form(template))?;
            rendered.push('\n');
            Ok(rendered)
        } else {
            Ok(serde_yaml::to_string(template)?)
        }
    }
}

/// Rewrite short-form intrinsic tags (`!Ref X`, `!GetAtt A.B`, `!Sub ...`)
/// into their mapping form so the value can be emitted as JSON.
pub fn to_long_form(value: &Value) -> Value {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let inner = match (name, &tagged.value) {
                ("GetAtt", Value::String(s)) => match s.split_once('.') {
                    Some((resource, attribute)) => Value::Sequence(vec![
                        Value::String(resource.to_string()),
                        Value::String(attribute.to_string()),
                    ]),
                    None => Value::String(s.clone()),
                },
                (_, other) => to_long_form(other),
            };
            let key = match name {
                "Ref" | "Condition" => name.to_string(),
                _ => format!("Fn::{name}"),
            };
            let mut mapping = Mapping::new();
            mapping.insert(Value::String(key), inner);
            Value::Mapping(mapping)
        }
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .iter()
                .map(|(k, v)| (k.clone(), to_long_form(v)))
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.iter().map(to_long_form).collect()),
        other => other.clone(),
    }
}

/// A non-empty string that does not point at a remote location.
pub fn is_local_path(location: &str) -> bool {
    !location.is_empty() && !REMOTE_PREFIXES.iter().any(|p| location.starts_with(p))
}

/// Resolve a template location against `reference_dir`.
pub fn resolve_local_path(location: &str, reference_dir: &Path) -> PathBuf {
    let location = Path::new(location.strip_prefix(FILE_SCHEME).unwrap_or(location));
    if location.is_absolute() {
        normalize(location)
    } else {
        normalize(&reference_dir.join(location))
    }
}

/// Lexically remove `.` and resolve `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Path of `target` relative to the directory `from_dir`.
pub fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    let from = normalize(from_dir);
    let target = normalize(target);
    let from: Vec<Component> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// Render a path with forward slashes for use inside templates.
pub fn template_path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_local_path() {
        assert!(is_local_path("src/"));
        assert!(is_local_path("file:///tmp/nested.yaml"));
        assert!(!is_local_path(""));
        assert!(!is_local_path("s3://bucket/key"));
        assert!(!is_local_path("https://example.com/t.yaml"));
    }

    #[test]
    fn test_resolve_local_path() {
        assert_eq!(
            resolve_local_path("./child/../nested.yaml", Path::new("/app")),
            PathBuf::from("/app/nested.yaml")
        );
        assert_eq!(
            resolve_local_path("file:///abs/t.yaml", Path::new("/app")),
            PathBuf::from("/abs/t.yaml")
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/build/Root"), Path::new("/build/Root/Child/template.yaml")),
            PathBuf::from("Child/template.yaml")
        );
        assert_eq!(
            relative_path(Path::new("/build/Root"), Path::new("/src/hello")),
            PathBuf::from("../../src/hello")
        );
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), PathBuf::from("."));
    }

    #[test]
    fn test_long_form_intrinsics() {
        let value: Value = serde_yaml::from_str("A: !Ref Foo\nB: !GetAtt Fn.Arn\nC: !Sub '${X}'\n").unwrap();
        let expected: Value = serde_yaml::from_str(
            "A: {Ref: Foo}\nB: {'Fn::GetAtt': [Fn, Arn]}\nC: {'Fn::Sub': '${X}'}\n",
        )
        .unwrap();
        assert_eq!(to_long_form(&value), expected);
    }

    #[test]
    fn test_read_rejects_non_mapping_resources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("template.yaml");
        fs::write(&path, "Resources: [a, b]\n").unwrap();
        assert!(matches!(TemplateReader::read(&path), Err(IacError::ProjectParse { .. })));

        fs::write(&path, "just a string\n").unwrap();
        assert!(matches!(TemplateReader::read(&path), Err(IacError::ProjectParse { .. })));
    }

    #[test]
    fn test_read_json_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("template.json");
        fs::write(&path, "{\"Resources\": {\"Topic\": {\"Type\": \"AWS::SNS::Topic\"}}}").unwrap();
        let template = TemplateReader::read(&path).unwrap();
        assert!(template.get("Resources").map_or(false, Value::is_mapping));
    }
}
