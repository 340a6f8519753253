//! Error types for the shadow-eval sandbox.

use boa_engine::{Context, JsError, JsNativeError, JsString, JsValue};
use thiserror::Error;

use crate::sandbox::reflect::{object_of, string_of};

/// Errors that can occur while building or running an isolated callable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SandboxError {
    /// An argument had the wrong runtime type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A shadow global was constructed without the private sentinel.
    #[error("Illegal constructor")]
    IllegalConstruction,

    /// The code failed to compile.
    #[error("compile error: {message}")]
    Compile {
        /// What the compiler rejected.
        message: String,
    },

    /// An exception escaped the evaluated code.
    #[error("{name}: {message}")]
    Runtime {
        /// The error's `name` (e.g. "TypeError"), or "Uncaught" when the
        /// thrown value is not an error object.
        name: String,
        /// The error's `message`, or the thrown value rendered as a string.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SandboxError {
    /// Describe an error raised by the engine.
    ///
    /// Engine errors and thrown error objects contribute their `name` and
    /// `message`. Any other thrown value is rendered and reported as
    /// "Uncaught".
    pub fn from_js_error(error: &JsError, context: &mut Context) -> Self {
        if let Some(native) = error.as_native() {
            return Self::from_native(native);
        }
        let thrown = error.as_opaque().map(|value| value.clone()).unwrap_or_else(JsValue::undefined);
        if let Some(object) = object_of(&thrown) {
            let name = object
                .get(JsString::from("name"), context)
                .ok()
                .as_ref()
                .and_then(string_of);
            if let Some(name) = name {
                let message = object
                    .get(JsString::from("message"), context)
                    .ok()
                    .as_ref()
                    .and_then(string_of)
                    .unwrap_or_default();
                return SandboxError::Runtime { name, message };
            }
        }
        SandboxError::Runtime {
            name: "Uncaught".to_string(),
            message: string_of(&thrown).unwrap_or_else(|| thrown.display().to_string()),
        }
    }

    fn from_native(native: &JsNativeError) -> Self {
        let rendered = native.to_string();
        let (name, message) = rendered.split_once(": ").unwrap_or((rendered.as_str(), ""));
        SandboxError::Runtime {
            name: name.to_string(),
            message: message.to_string(),
        }
    }

    /// Like [`from_js_error`](Self::from_js_error), but a `SyntaxError`
    /// becomes [`SandboxError::Compile`].
    pub(crate) fn from_compile_error(error: &JsError, context: &mut Context) -> Self {
        match Self::from_js_error(error, context) {
            SandboxError::Runtime { name, message } if name == "SyntaxError" => {
                #[cfg(feature = "tracing")]
                tracing::debug!("compile failed: {message}");
                SandboxError::Compile { message }
            }
            other => other,
        }
    }

    /// Check if this error represents a rejected argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, SandboxError::InvalidArgument(_))
    }

    /// Check if this error represents a guarded constructor call.
    pub fn is_illegal_construction(&self) -> bool {
        matches!(self, SandboxError::IllegalConstruction)
    }

    /// Check if this error represents a compile failure.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, SandboxError::Compile { .. })
    }

    /// Check if this error represents an uncaught script exception.
    pub fn is_runtime_error(&self) -> bool {
        matches!(self, SandboxError::Runtime { .. })
    }

    /// Check if this error represents an invalid configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, SandboxError::Config(_))
    }

    /// The script error name for runtime errors, e.g. "RangeError".
    pub fn exception_name(&self) -> Option<&str> {
        match self {
            SandboxError::Runtime { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<SandboxError> for JsError {
    fn from(err: SandboxError) -> Self {
        let native = match err {
            SandboxError::Compile { message } => JsNativeError::syntax().with_message(message),
            SandboxError::IllegalConstruction => JsNativeError::typ().with_message("Illegal constructor"),
            SandboxError::InvalidArgument(message) => JsNativeError::typ().with_message(message),
            other => JsNativeError::error().with_message(other.to_string()),
        };
        native.into()
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn thrown(context: &mut Context, source: &str) -> SandboxError {
        let err = context.eval(Source::from_bytes(source)).unwrap_err();
        SandboxError::from_js_error(&err, context)
    }

    #[test]
    fn test_from_native_error() {
        let mut context = Context::default();
        let err: JsError = JsNativeError::range().with_message("too deep").into();
        let err = SandboxError::from_js_error(&err, &mut context);
        assert_eq!(
            err,
            SandboxError::Runtime {
                name: "RangeError".to_string(),
                message: "too deep".to_string(),
            }
        );
        assert_eq!(err.to_string(), "RangeError: too deep");
        assert_eq!(err.exception_name(), Some("RangeError"));
    }

    #[test]
    fn test_from_thrown_error_object() {
        let mut context = Context::default();
        let err = thrown(&mut context, "throw new TypeError('bad input')");
        assert_eq!(err.to_string(), "TypeError: bad input");
    }

    #[test]
    fn test_from_thrown_primitive() {
        let mut context = Context::default();
        assert_eq!(
            thrown(&mut context, "throw 42"),
            SandboxError::Runtime {
                name: "Uncaught".to_string(),
                message: "42".to_string(),
            }
        );
        assert_eq!(thrown(&mut context, "throw 'plain'").to_string(), "Uncaught: plain");
    }

    #[test]
    fn test_from_error_like_object() {
        let mut context = Context::default();
        let err = thrown(&mut context, "throw {name: 'CustomError', message: 'boom'}");
        assert_eq!(err.to_string(), "CustomError: boom");
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let mut context = Context::default();
        let err = context.eval(Source::from_bytes("return (")).unwrap_err();
        let err = SandboxError::from_compile_error(&err, &mut context);
        assert!(err.is_compile_error());
        assert!(err.to_string().starts_with("compile error: "));
    }

    #[test]
    fn test_into_js_error_maps_kinds() {
        let err: JsError = SandboxError::Compile {
            message: "bad".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "SyntaxError: bad");
        let err: JsError = SandboxError::IllegalConstruction.into();
        assert_eq!(err.to_string(), "TypeError: Illegal constructor");
    }

    #[test]
    fn test_error_helpers() {
        let invalid = SandboxError::InvalidArgument("imports cannot be of type \"string\"".to_string());
        assert!(invalid.is_invalid_argument());
        assert!(!invalid.is_runtime_error());
        assert!(SandboxError::IllegalConstruction.is_illegal_construction());
        assert!(SandboxError::Config("x".to_string()).is_config());
        assert_eq!(invalid.exception_name(), None);
    }
}
