//! Names visible through a template global, captured so they can be shadowed.

use std::collections::HashSet;

use boa_engine::{Context, JsObject, JsResult};

use crate::sandbox::identifier::is_valid_variable_name;
use crate::sandbox::reflect::own_property_names;

/// Every bindable property name of a template object and its prototype chain.
///
/// Names are ordered by first occurrence: the template's own keys, then
/// each ancestor's. Each name appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalSnapshot {
    names: Vec<String>,
}

impl GlobalSnapshot {
    /// Walk `template` and its ancestors, collecting own property names
    /// (enumerable or not) that are valid variable names.
    ///
    /// The template is only read; nothing is cached between calls.
    pub fn capture(template: &JsObject, context: &mut Context) -> JsResult<Self> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let mut current = Some(template.clone());
        while let Some(object) = current {
            for key in own_property_names(&object, context)? {
                if seen.insert(key.clone()) && is_valid_variable_name(&key, context) {
                    names.push(key);
                }
            }
            current = object.prototype();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(names = names.len(), "captured global snapshot");

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
