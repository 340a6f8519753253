//! Source text for the nested scopes that isolated code runs in.
//!
//! Four functions are nested around the user code:
//!
//! 1. parameters named after every shadowed global, so those names bind
//!    to `undefined` instead of the global environment;
//! 2. a `with` block over its single argument, the shadow global;
//! 3. parameters named after the imports;
//! 4. the body, which hides `arguments` and runs the code in strict mode.
//!
//! Calling layer 1 with nothing, layer 2 with the shadow and layer 3 with
//! the import values yields layer 4.

use crate::sandbox::executor::Entry;

/// Build the wrapper for `code`.
///
/// `code` must already have been checked to compile as a strict function
/// body with the entry's parameters, so it cannot close the enclosing
/// functions early.
pub(crate) fn source(shadowed: &[String], imports: &[String], code: &str, entry: Entry<'_>) -> String {
    let body = match entry {
        Entry::Body => format!("return (() => {{\n\"use strict\";\n{code}\n}})();"),
        Entry::Function(params) => {
            format!("return (function ({}) {{\n\"use strict\";\n{code}\n}});", params.join(", "))
        }
    };
    format!(
        "(function ({}) {{ return function () {{ with (arguments[0]) {{ return function ({}) {{ return function () {{ arguments = void 0;\n{body}\n}}; }}; }} }}; }})",
        shadowed.join(", "),
        imports.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_layers() {
        let text = source(&["Math".to_string()], &["x".to_string()], "return x", Entry::Body);
        assert!(text.starts_with("(function (Math) { return function () { with (arguments[0]) { return function (x) {"));
        assert!(text.contains("arguments = void 0;"));
        assert!(text.contains("return (() => {\n\"use strict\";\nreturn x\n})();"));
    }

    #[test]
    fn test_function_layers() {
        let params = ["a".to_string(), "b".to_string()];
        let text = source(&[], &[], "return a + b", Entry::Function(&params));
        assert!(text.contains("return (function (a, b) {\n\"use strict\";\nreturn a + b\n});"));
    }

    #[test]
    fn test_trailing_line_comment_is_closed() {
        let text = source(&[], &[], "return 1 // done", Entry::Body);
        assert!(text.contains("return 1 // done\n})();"));
    }
}
