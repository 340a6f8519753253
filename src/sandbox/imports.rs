//! Caller-supplied bindings injected into a sandbox.

use boa_engine::{Context, JsResult, JsString, JsValue};

use crate::sandbox::reflect::{object_of, own_enumerable_keys};

/// Import names and their values, in the source object's enumeration order.
#[derive(Debug, Clone, Default)]
pub struct ImportsMap {
    names: Vec<String>,
    values: Vec<JsValue>,
}

impl ImportsMap {
    /// Read the own enumerable properties of `imports`.
    ///
    /// `undefined`, `null`, and other non-objects produce an empty map; the
    /// entry points reject non-object imports before getting here. Values
    /// are read once, running getters.
    pub fn from_value(imports: &JsValue, context: &mut Context) -> JsResult<Self> {
        let Some(object) = object_of(imports) else {
            return Ok(Self::default());
        };
        let names = own_enumerable_keys(&object, context)?;
        let values = names
            .iter()
            .map(|name| object.get(JsString::from(name.as_str()), context))
            .collect::<JsResult<Vec<_>>>()?;
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[JsValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Pairs of name and value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsValue)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }
}
