//! Writing packaged asset locations back into a stack.

use serde_yaml::Value;
use stackpack_model::{value, ResourceTypeTables, Stack};
use tracing::{debug, warn};

use crate::error::IacError;

/// Outcome of applying every destination of a stack.
#[derive(Debug, Default)]
pub struct LocationUpdateReport {
    /// Destinations whose value was written.
    pub applied: usize,
    /// Destinations whose target already held the value.
    pub already_applied: usize,
    /// Destinations whose path did not resolve.
    pub failures: Vec<IacError>,
}

impl LocationUpdateReport {
    /// True when every destination was applied or already in place.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.applied + self.already_applied + self.failures.len()
    }

    pub fn merge(&mut self, other: LocationUpdateReport) {
        self.applied += other.applied;
        self.already_applied += other.already_applied;
        self.failures.extend(other.failures);
    }
}

/// Apply the destinations of every asset of every packageable item in every
/// dict section of `stack`. Nested stacks are left alone.
pub fn apply_packaged_locations(stack: &mut Stack, tables: &ResourceTypeTables) -> LocationUpdateReport {
    let mut report = LocationUpdateReport::default();

    for section in stack.dict_sections_mut() {
        for item in section.section_items_mut() {
            if !item.is_packageable(tables) {
                continue;
            }
            let key = item.key().unwrap_or_default().to_string();
            let Some(dict) = item.as_dict_mut() else {
                continue;
            };

            let destinations: Vec<(String, Value)> = dict
                .assets
                .iter()
                .flat_map(|asset| asset.destinations())
                .map(|d| (d.path.clone(), d.value.clone()))
                .collect();

            for (path, resolved) in destinations {
                match value::set_in_body(dict.body_mut(), &path, resolved) {
                    Ok(true) => {
                        debug!("Updated {}.{}", key, path);
                        report.applied += 1;
                    }
                    Ok(false) => report.already_applied += 1,
                    Err(e) => {
                        warn!("Cannot update {}.{}: {}", key, path, e);
                        report.failures.push(IacError::InvalidTemplateReference {
                            item: key.clone(),
                            path,
                        });
                    }
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackpack_model::{Destination, FileAsset, OrderedContainer, SectionItem};

    fn stack_with_destination(path: &str) -> Stack {
        let template = serde_yaml::from_str(
            "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      CodeUri: src/\n",
        )
        .unwrap();
        let mut stack = Stack::from_template(template).unwrap();
        let mut asset = FileAsset::new().with_source_property("CodeUri");
        asset.info.destinations.push(Destination::new(path, "s3://bucket/key"));
        stack
            .resources_mut()
            .unwrap()
            .resource_mut("Fn")
            .unwrap()
            .assets
            .push(asset.into());
        stack
    }

    fn code_uri(stack: &Stack) -> Option<&Value> {
        stack
            .resources()
            .and_then(|r| r.resource("Fn"))
            .and_then(|r| r.lookup("Properties.CodeUri"))
    }

    #[test]
    fn test_apply_is_idempotent() {
        let tables = ResourceTypeTables::default();
        let mut stack = stack_with_destination("Properties.CodeUri");

        let first = apply_packaged_locations(&mut stack, &tables);
        assert!(first.is_complete());
        assert_eq!(first.applied, 1);
        let after_first = stack.as_dict();

        let second = apply_packaged_locations(&mut stack, &tables);
        assert!(second.is_complete());
        assert_eq!(second.applied, 0);
        assert_eq!(second.already_applied, 1);
        assert_eq!(stack.as_dict(), after_first);
        assert_eq!(code_uri(&stack), Some(&Value::String("s3://bucket/key".into())));
    }

    #[test]
    fn test_unresolved_path_is_reported() {
        let tables = ResourceTypeTables::default();
        let mut stack = stack_with_destination("Properties.Missing");

        let report = apply_packaged_locations(&mut stack, &tables);
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.total(), 1);
        assert!(matches!(
            &report.failures[0],
            IacError::InvalidTemplateReference { item, path } if item == "Fn" && path == "Properties.Missing"
        ));
        assert_eq!(code_uri(&stack), Some(&Value::String("src/".into())));
    }

    #[test]
    fn test_partial_failure_still_applies_the_rest() {
        let tables = ResourceTypeTables::default();
        let mut stack = stack_with_destination("Properties.CodeUri");
        stack.resources_mut().unwrap().resource_mut("Fn").unwrap().assets[0]
            .destinations_mut()
            .push(Destination::new("Properties.Missing", "s3://bucket/other"));

        let report = apply_packaged_locations(&mut stack, &tables);
        assert!(!report.is_complete());
        assert_eq!(report.applied, 1);
        assert_eq!(report.already_applied, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.total(), 2);
        assert_eq!(code_uri(&stack), Some(&Value::String("s3://bucket/key".into())));
    }

    #[test]
    fn test_metadata_items_with_assets_are_updated() {
        let template = serde_yaml::from_str(
            "Metadata:\n  AWS::ServerlessRepo::Application:\n    LicenseUrl: LICENSE\n",
        )
        .unwrap();
        let mut stack = Stack::from_template(template).unwrap();
        let mut asset = FileAsset::new().with_source_property("LicenseUrl");
        asset.info.destinations.push(Destination::new("LicenseUrl", "s3://bucket/license"));
        let item = stack
            .get_mut("Metadata")
            .and_then(|s| s.as_dict_mut())
            .and_then(|s| s.get_mut("AWS::ServerlessRepo::Application"))
            .and_then(SectionItem::as_dict_mut)
            .unwrap();
        item.assets.push(asset.into());

        let report = apply_packaged_locations(&mut stack, &ResourceTypeTables::default());
        assert_eq!(report.applied, 1);
    }
}
