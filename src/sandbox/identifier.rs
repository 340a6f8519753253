//! Identifier filter: which property names can be bound as bare variables.

use boa_engine::{Context, JsString};

/// Cheap lexical screen run before asking the engine.
///
/// Accepts ASCII and Unicode letters, digits, `$` and `_`. Anything with
/// whitespace, punctuation or line terminators can never be a single
/// binding and is never handed to the compiler.
pub(crate) fn looks_like_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

/// Returns `true` when `name` can be declared as a variable.
///
/// The check asks the engine's `Function` constructor to compile
/// `var <name>` as a sloppy-mode body. Keywords such as `class` or `null`
/// fail to compile and are rejected; `eval`, `arguments`, `let` and
/// `static` compile and are accepted.
pub fn is_valid_variable_name(name: &str, context: &mut Context) -> bool {
    if !looks_like_identifier(name) {
        return false;
    }
    let function = context.intrinsics().constructors().function().constructor();
    function
        .construct(&[JsString::from(format!("var {name}")).into()], None, context)
        .is_ok()
}
