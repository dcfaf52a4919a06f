//! Command option checks that depend on the selected project type.

use stackpack_model::{Project, Stack};

use crate::error::{IacError, IacResult};
use crate::plugin::PluginContext;
use crate::registry::PluginRegistry;

fn flag(option: &str) -> String {
    format!("--{}", option.replace('_', "-"))
}

/// Reject options that belong to a different project type.
pub fn validate_context(registry: &PluginRegistry, project_type: &str, context: &PluginContext) -> IacResult<()> {
    let definition = registry.get_required(project_type)?;

    for other in registry.definitions().filter(|d| d.project_type != definition.project_type) {
        for option in &other.additional_options {
            if definition.additional_options.contains(option) || context.option(option).is_none() {
                continue;
            }
            return Err(IacError::InvalidContext(format!(
                "Option '{}' cannot be used for Project Type '{}'",
                flag(option),
                definition.project_type
            )));
        }
    }
    Ok(())
}

/// The stack a command should operate on.
///
/// A named stack must exist. Without a name the project must hold exactly
/// one stack.
pub fn select_stack<'a>(project: &'a Project, stack_name: Option<&str>) -> IacResult<&'a Stack> {
    if let Some(name) = stack_name {
        return project
            .find_stack_by_name(name)
            .ok_or_else(|| IacError::StackSelection(format!("Stack with stack name '{name}' not found.")));
    }

    match project.stacks.as_slice() {
        [stack] => Ok(stack),
        [] => Err(IacError::InvalidProject("project has no stacks".to_string())),
        _ => Err(IacError::StackSelection(
            "More than one stack found. Use '--stack-name' to specify the stack.".to_string(),
        )),
    }
}

/// Mutable counterpart of [`select_stack`].
pub fn select_stack_mut<'a>(project: &'a mut Project, stack_name: Option<&str>) -> IacResult<&'a mut Stack> {
    select_stack(project, stack_name)?;
    let stack = match stack_name {
        Some(name) => project.find_stack_by_name_mut(name),
        None => project.stacks.first_mut(),
    };
    stack.ok_or_else(|| IacError::InvalidProject("project has no stacks".to_string()))
}
