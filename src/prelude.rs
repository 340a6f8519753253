//! Prelude module for convenient imports.

pub use crate::error::{Result, SandboxError};
pub use crate::sandbox::{
    config::SandboxConfig,
    executor::{evaluate, evaluate_value, evaluate_with_params, Callable, ExecutionResult, IsolatedEvaluator},
};
pub use boa_engine::{Context, JsObject, JsValue, Source};
