//! Root of the model returned by every backend.

use indexmap::IndexMap;
use serde_yaml::Value;

use crate::stack::Stack;

/// An ordered list of stacks. The first stack is the default one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    pub stacks: Vec<Stack>,
    pub extra_details: IndexMap<String, Value>,
}

impl Project {
    pub fn new(stacks: Vec<Stack>) -> Self {
        Self {
            stacks,
            extra_details: IndexMap::new(),
        }
    }

    pub fn default_stack(&self) -> Option<&Stack> {
        self.stacks.first()
    }

    pub fn default_stack_mut(&mut self) -> Option<&mut Stack> {
        self.stacks.first_mut()
    }

    pub fn find_stack_by_name(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    pub fn find_stack_by_name_mut(&mut self, name: &str) -> Option<&mut Stack> {
        self.stacks.iter_mut().find(|s| s.name() == name)
    }

    pub fn stack_names(&self) -> impl Iterator<Item = &str> {
        self.stacks.iter().map(Stack::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let project = Project::new(vec![Stack::new().named("A"), Stack::new().named("B")]);
        assert_eq!(project.default_stack().map(Stack::name), Some("A"));
        assert_eq!(project.find_stack_by_name("B").map(Stack::name), Some("B"));
        assert!(project.find_stack_by_name("C").is_none());
        assert!(Project::default().default_stack().is_none());
    }
}
