//! Sandbox configuration with builder pattern.

use std::rc::Rc;

use crate::error::{Result, SandboxError};
use crate::sandbox::identifier::looks_like_identifier;
use crate::sandbox::limits::{DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_NESTING_DEPTH};

/// Globals every shadow global gets a property for (the ES2017 set).
pub const CANONICAL_GLOBALS: &[&str] = &[
    "Infinity",
    "NaN",
    "undefined",
    "eval",
    "console",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "encodeURI",
    "decodeURI",
    "encodeURIComponent",
    "decodeURIComponent",
    "Array",
    "ArrayBuffer",
    "Boolean",
    "DataView",
    "Date",
    "Error",
    "EvalError",
    "Float32Array",
    "Float64Array",
    "Function",
    "Int8Array",
    "Int16Array",
    "Int32Array",
    "Map",
    "Number",
    "Object",
    "Proxy",
    "Promise",
    "RangeError",
    "ReferenceError",
    "RegExp",
    "Set",
    "String",
    "Symbol",
    "SyntaxError",
    "TypeError",
    "Uint8Array",
    "Uint8ClampedArray",
    "Uint16Array",
    "Uint32Array",
    "URIError",
    "WeakMap",
    "WeakSet",
    "JSON",
    "Math",
    "Reflect",
    "NativeError",
    "setTimeout",
    "setInterval",
    "setImmediate",
];

/// Names that resolve to the shadow global itself.
pub const SELF_REFERENCE_NAMES: &[&str] = &["self", "global", "globalThis"];

thread_local! {
    static DEFAULT_CONFIG: Rc<SandboxConfig> = Rc::new(SandboxConfig::default());
}

/// Configuration for an [`IsolatedEvaluator`](crate::IsolatedEvaluator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Globals copied onto (or aliased by) each shadow global.
    pub canonical_globals: Vec<String>,
    /// Names bound to the shadow global itself.
    pub self_reference_names: Vec<String>,
    /// Engine recursion limit for evaluators built from this config.
    pub max_call_depth: usize,
    /// Sandboxes (through the `eval` and `Function` aliases) allowed to be
    /// active inside one another before a `RangeError` is thrown.
    pub max_nesting_depth: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            canonical_globals: CANONICAL_GLOBALS.iter().map(|s| s.to_string()).collect(),
            self_reference_names: SELF_REFERENCE_NAMES.iter().map(|s| s.to_string()).collect(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            return Err(SandboxError::Config("max_call_depth must be at least 1".to_string()));
        }
        if self.max_nesting_depth == 0 {
            return Err(SandboxError::Config("max_nesting_depth must be at least 1".to_string()));
        }
        if let Some(name) = self
            .self_reference_names
            .iter()
            .find(|name| !looks_like_identifier(name))
        {
            return Err(SandboxError::Config(format!(
                "self reference name {name:?} is not a valid identifier"
            )));
        }
        Ok(())
    }

    /// The default configuration, shared by the free entry points.
    pub(crate) fn shared_default() -> Rc<Self> {
        DEFAULT_CONFIG.with(Rc::clone)
    }

    pub fn is_self_reference(&self, name: &str) -> bool {
        self.self_reference_names.iter().any(|n| n == name)
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    canonical_globals: Option<Vec<String>>,
    self_reference_names: Option<Vec<String>>,
    max_call_depth: Option<usize>,
    max_nesting_depth: Option<usize>,
}

impl SandboxConfigBuilder {
    /// Replace the list of canonical globals.
    pub fn canonical_globals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.canonical_globals = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the names that refer to the shadow global itself.
    pub fn self_reference_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.self_reference_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set the engine recursion limit.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    /// Set how many sandboxes may be nested through `eval` and `Function`.
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = Some(depth);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            canonical_globals: self.canonical_globals.unwrap_or(default.canonical_globals),
            self_reference_names: self.self_reference_names.unwrap_or(default.self_reference_names),
            max_call_depth: self.max_call_depth.unwrap_or(default.max_call_depth),
            max_nesting_depth: self.max_nesting_depth.unwrap_or(default.max_nesting_depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.canonical_globals.len(), CANONICAL_GLOBALS.len());
        assert_eq!(config.self_reference_names, ["self", "global", "globalThis"]);
        assert_eq!(config.max_call_depth, 512);
        assert_eq!(config.max_nesting_depth, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SandboxConfig::builder()
            .canonical_globals(["Math", "JSON"])
            .self_reference_names(["window"])
            .max_call_depth(16)
            .max_nesting_depth(2)
            .build();

        assert_eq!(config.canonical_globals, ["Math", "JSON"]);
        assert!(config.is_self_reference("window"));
        assert!(!config.is_self_reference("self"));
        assert_eq!(config.max_call_depth, 16);
        assert_eq!(config.max_nesting_depth, 2);
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = SandboxConfig::builder().max_call_depth(0).build();
        assert!(config.validate().unwrap_err().is_config());
        let config = SandboxConfig::builder().max_nesting_depth(0).build();
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_validate_rejects_bad_self_name() {
        let config = SandboxConfig::builder().self_reference_names(["self", "not valid"]).build();
        assert!(matches!(config.validate(), Err(SandboxError::Config(msg)) if msg.contains("not valid")));
    }
}
