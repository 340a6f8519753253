//! Console capture for evaluated code.

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsResult, JsString, JsValue, NativeFunction};
use boa_gc::{Finalize, Trace};

use crate::sandbox::reflect::string_of;

/// A text buffer that captures console output.
#[derive(Clone, Debug, Default)]
pub struct CapturedOutput {
    buffer: Rc<RefCell<String>>,
}

impl CapturedOutput {
    /// Create a new captured output buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn write_line(&self, line: &str) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push_str(line);
        buffer.push('\n');
    }

    /// Get the captured output as a string.
    pub fn to_string_lossy(&self) -> String {
        self.buffer.borrow().clone()
    }

    /// Everything written after `mark`, a length previously read from
    /// [`len`](Self::len).
    pub fn since(&self, mark: usize) -> String {
        self.buffer.borrow().get(mark..).unwrap_or_default().to_string()
    }

    /// Clear the buffer.
    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
    }

    /// Get the length of captured data in bytes.
    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where `console.*` writes for one context.
#[derive(Clone, Debug, Default)]
pub struct ConsoleOutput {
    /// `console.log`, `console.info` and `console.debug`.
    pub stdout: CapturedOutput,
    /// `console.warn` and `console.error`.
    pub stderr: CapturedOutput,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Trace, Finalize)]
struct ConsoleSink {
    #[unsafe_ignore_trace]
    output: CapturedOutput,
}

fn write_args(_this: &JsValue, args: &[JsValue], sink: &ConsoleSink, _context: &mut Context) -> JsResult<JsValue> {
    let line = args
        .iter()
        .map(|arg| string_of(arg).unwrap_or_else(|| arg.display().to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    sink.output.write_line(&line);
    Ok(JsValue::undefined())
}

fn sink(output: &CapturedOutput) -> NativeFunction {
    NativeFunction::from_copy_closure_with_captures(
        write_args,
        ConsoleSink {
            output: output.clone(),
        },
    )
}

/// Define a global `console` whose methods append to `output`.
///
/// The global is writable and configurable but not enumerable, like the
/// other built-ins.
pub fn install_console(context: &mut Context, output: &ConsoleOutput) -> JsResult<()> {
    let console = ObjectInitializer::new(context)
        .function(sink(&output.stdout), js_string!("log"), 0)
        .function(sink(&output.stdout), js_string!("info"), 0)
        .function(sink(&output.stdout), js_string!("debug"), 0)
        .function(sink(&output.stderr), js_string!("warn"), 0)
        .function(sink(&output.stderr), js_string!("error"), 0)
        .build();
    context.register_global_property(
        JsString::from("console"),
        console,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;
    Ok(())
}
