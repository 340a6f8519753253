//! # Shadow Eval
//!
//! Run JavaScript against a copy of the global environment instead of the
//! real one, on top of the [Boa](https://boajs.dev) engine.
//!
//! [`evaluate`] compiles a string of code into a [`Callable`]. Invoking it
//! runs the code as a strict-mode function body whose free identifiers
//! resolve, in order, against:
//!
//! - **Imports**: the own enumerable properties of an imports object
//! - **The shadow global**: a fresh per-callable object holding copies of
//!   the canonical globals (`Math`, `JSON`, `Object`, ...)
//! - **Shadowed names**: every other name of the template global, and of
//!   the context's own global, bound to `undefined`
//!
//! Anything else is a `ReferenceError`. Writes land on the shadow, never on
//! the template.
//!
//! ## Example
//!
//! ```rust
//! use shadow_eval::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut context = Context::default();
//!     let imports = context
//!         .eval(Source::from_bytes("({x: 5})"))
//!         .map_err(|err| SandboxError::from_js_error(&err, &mut context))?;
//!
//!     let callable = evaluate(&mut context, "return x * 2", &imports, None)?;
//!     assert_eq!(callable.call(&[], &mut context)?.as_number(), Some(10.0));
//!
//!     let add = evaluate_with_params(&mut context, ["a", "b"], "return a + b", None)?
//!         .call(&[], &mut context)?;
//!     let add = add.as_object().map(|add| add.clone()).expect("a function");
//!     let sum = add
//!         .call(&JsValue::undefined(), &[3.into(), 4.into()], &mut context)
//!         .map_err(|err| SandboxError::from_js_error(&err, &mut context))?;
//!     assert_eq!(sum.as_number(), Some(7.0));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Security Model
//!
//! Isolation comes from name resolution, not from a separate heap:
//!
//! 1. **Shadowing**: template globals outside the canonical list resolve to
//!    `undefined`
//! 2. **Self references**: `self`, `global`, and `globalThis` point at the
//!    shadow
//! 3. **Re-entrant evaluation**: `eval` and `Function` compile into new
//!    sandboxes rather than the ambient evaluator
//! 4. **Guarded construction**: shadows can only be created by this crate
//!
//! Objects reachable through copied globals (e.g. `Object.prototype`) are
//! shared with the template, and there are no limits on CPU time or
//! memory. This is not a hardened security boundary.

pub mod error;
pub mod prelude;
pub mod sandbox;

// Re-export main types at crate root for convenience
pub use boa_engine::{Context, JsObject, JsValue, Source};
pub use error::{Result, SandboxError};
pub use sandbox::config::{SandboxConfig, SandboxConfigBuilder};
pub use sandbox::executor::{
    evaluate, evaluate_value, evaluate_with_params, Callable, ExecutionMetadata, ExecutionResult,
    IsolatedEvaluator,
};
pub use sandbox::identifier::is_valid_variable_name;
pub use sandbox::imports::ImportsMap;
pub use sandbox::io::{install_console, CapturedOutput, ConsoleOutput};
pub use sandbox::limits::{NestingStats, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_NESTING_DEPTH};
pub use sandbox::shadow::{AliasInstall, ShadowGlobal};
pub use sandbox::snapshot::GlobalSnapshot;
