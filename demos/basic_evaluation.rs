//! Basic example of evaluating code against a shadow global.
//!
//! Run with: cargo run --example basic_evaluation

use shadow_eval::prelude::*;

fn show(value: &JsValue) -> String {
    value.display().to_string()
}

fn main() -> Result<()> {
    let mut evaluator = IsolatedEvaluator::new(SandboxConfig::default())?;
    let none = JsValue::undefined();

    // Simple arithmetic
    println!("=== Test 1: Simple arithmetic ===");
    let callable = evaluator.evaluate("return 1 + 1", &none, None)?;
    println!("result: {}", show(&evaluator.call(&callable, &[])?));

    // Imports become variables
    println!("\n=== Test 2: Imports ===");
    let imports = evaluator.eval_value("({x: 5, name: 'sandbox'})")?;
    let callable = evaluator.evaluate("return name + ': ' + x * 2", &imports, None)?;
    println!("result: {}", show(&evaluator.call(&callable, &[])?));

    // Console output is captured
    println!("\n=== Test 3: Console output ===");
    let code = r#"
for (var i = 0; i < 3; i++) {
    console.log("Count: " + i);
}
return i;
"#;
    let callable = evaluator.evaluate(code, &none, None)?;
    let result = evaluator.execute(&callable, &[])?;
    println!("stdout:\n{}", result.stdout);
    println!("value: {}", show(&result.value));
    println!("duration: {:?}", result.metadata.duration);

    // Writes stay inside the sandbox
    println!("\n=== Test 4: Isolation ===");
    let callable = evaluator.evaluate(
        "global.marker = 1; parseInt = null; return typeof global.marker",
        &none,
        None,
    )?;
    println!("inside: {}", show(&evaluator.call(&callable, &[])?));
    println!("ambient marker: {}", show(&evaluator.eval_value("typeof globalThis.marker")?));
    println!("ambient parseInt: {}", show(&evaluator.eval_value("typeof parseInt")?));

    // eval and Function re-enter the sandbox
    println!("\n=== Test 5: Nested evaluation ===");
    let callable = evaluator.evaluate(
        "return eval('return 2 + 2') + Function('a', 'return a * 10')(1)",
        &none,
        None,
    )?;
    let result = evaluator.execute(&callable, &[])?;
    println!("result: {} (peak nesting {})", show(&result.value), result.metadata.peak_nesting_depth);

    // Parameterized functions
    println!("\n=== Test 6: Parameters ===");
    let add = evaluator.evaluate_with_params(["a", "b"], "return a + b", None)?;
    let add = evaluator.call(&add, &[])?;
    if let Some(add) = add.as_object() {
        let sum = add
            .call(&JsValue::undefined(), &[3.into(), 4.into()], evaluator.context())
            .map_err(|err| SandboxError::from_js_error(&err, evaluator.context()))?;
        println!("add(3, 4) = {}", show(&sum));
    }

    // Errors
    println!("\n=== Test 7: Errors ===");
    let callable = evaluator.evaluate("throw new TypeError('bad input')", &none, None)?;
    match evaluator.call(&callable, &[]) {
        Ok(value) => println!("unexpected: {}", show(&value)),
        Err(e) => println!("runtime error: {e}"),
    }
    match evaluator.evaluate("return (", &none, None) {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("compile error: {e}"),
    }
    let not_an_object = evaluator.eval_value("'not-an-object'")?;
    match evaluator.evaluate("return 1", &not_an_object, None) {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("invalid argument: {e}"),
    }

    Ok(())
}
