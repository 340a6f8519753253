//! Entry points: compile code into isolated callables.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use boa_engine::object::FunctionObjectBuilder;
use boa_engine::vm::RuntimeLimits;
use boa_engine::{js_string, Context, JsNativeError, JsObject, JsResult, JsValue, NativeFunction, Source};
use boa_gc::{Finalize, Trace};

use crate::error::{Result, SandboxError};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::identifier::is_valid_variable_name;
use crate::sandbox::imports::ImportsMap;
use crate::sandbox::io::{install_console, ConsoleOutput};
use crate::sandbox::limits::measure;
use crate::sandbox::reflect::{check_syntax, object_of, type_name};
use crate::sandbox::shadow::{AliasInstall, ShadowGlobal};
use crate::sandbox::snapshot::GlobalSnapshot;
use crate::sandbox::wrapper;

/// Result of running a [`Callable`] through [`IsolatedEvaluator::execute`].
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// What the code returned.
    pub value: JsValue,
    /// `console.log`/`info`/`debug` output produced during the run.
    pub stdout: String,
    /// `console.warn`/`error` output produced during the run.
    pub stderr: String,
    /// Timing and nesting information.
    pub metadata: ExecutionMetadata,
}

/// Measurements of a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionMetadata {
    /// Wall-clock time spent in the call.
    pub duration: Duration,
    /// Deepest sandbox nesting reached through `eval` and `Function`.
    pub peak_nesting_depth: usize,
    /// Whether a nested sandbox was refused for exceeding
    /// [`SandboxConfig::max_nesting_depth`].
    pub nesting_limit_exceeded: bool,
}

/// How the compiled code is entered.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Entry<'a> {
    /// Run as a function body on every call.
    Body,
    /// Produce a function with these parameters on every call.
    Function(&'a [String]),
}

/// Compiled code bound to its own shadow global.
#[derive(Clone, Trace, Finalize)]
pub struct Callable {
    function: JsObject,
    shadow: ShadowGlobal,
}

impl Callable {
    /// Invoke with the shadow global as `this`.
    pub fn call(&self, args: &[JsValue], context: &mut Context) -> Result<JsValue> {
        self.call_with_this(&JsValue::undefined(), args, context)
    }

    /// Invoke with `this` as the receiver; nullish receivers become the
    /// shadow global.
    pub fn call_with_this(&self, this: &JsValue, args: &[JsValue], context: &mut Context) -> Result<JsValue> {
        self.invoke(this, args, context)
            .map_err(|err| SandboxError::from_js_error(&err, context))
    }

    /// The shadow global this callable runs against.
    pub fn shadow_global(&self) -> &ShadowGlobal {
        &self.shadow
    }

    /// A script function running this callable, for handing to other code.
    pub fn to_value(&self) -> JsValue {
        self.function.clone().into()
    }

    pub(crate) fn invoke(&self, this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        self.function.call(this, args, context)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("shadow", &self.shadow)
            .finish_non_exhaustive()
    }
}

#[derive(Trace, Finalize)]
struct Invocation {
    shadow: ShadowGlobal,
    closure: JsObject,
}

fn run_closure(this: &JsValue, args: &[JsValue], invocation: &Invocation, context: &mut Context) -> JsResult<JsValue> {
    invocation.shadow.finalize(context)?;
    let receiver = if this.is_null_or_undefined() {
        invocation.shadow.to_value()
    } else {
        this.clone()
    };
    invocation.closure.call(&receiver, args, context)
}

fn callable_layer(value: &JsValue) -> JsResult<JsObject> {
    object_of(value)
        .filter(JsObject::is_callable)
        .ok_or_else(|| JsNativeError::typ().with_message("sandbox layer is not a function").into())
}

/// Names the wrapper binds to `undefined`: everything visible through the
/// template, plus the context's own globals when the template is another
/// object, since the wrapper itself is compiled in global scope.
fn shadowed_names(template: &JsObject, context: &mut Context) -> JsResult<Vec<String>> {
    let mut names = GlobalSnapshot::capture(template, context)?.names().to_vec();
    let global = context.global_object();
    if !JsObject::equals(template, &global) {
        let mut seen: HashSet<String> = names.iter().cloned().collect();
        for name in GlobalSnapshot::capture(&global, context)?.names() {
            if seen.insert(name.clone()) {
                names.push(name.clone());
            }
        }
    }
    Ok(names)
}

/// Build a callable running `code` against a new shadow of `template`.
///
/// Import names must already be valid variable names.
pub(crate) fn compile(
    code: &str,
    entry: Entry<'_>,
    imports: &ImportsMap,
    template: &JsObject,
    config: &Rc<SandboxConfig>,
    install: AliasInstall,
    context: &mut Context,
) -> JsResult<Callable> {
    let params: &[String] = match entry {
        Entry::Body => &[],
        Entry::Function(params) => params,
    };
    check_syntax(params, code, context)?;

    let shadowed = shadowed_names(template, context)?;
    let shadow = ShadowGlobal::new(template, config, install, context)?;
    let source = wrapper::source(&shadowed, imports.names(), code, entry);

    let factory = context.eval(Source::from_bytes(&source))?;
    let layer = callable_layer(&factory)?.call(&JsValue::undefined(), &[], context)?;
    let layer = callable_layer(&layer)?.call(&JsValue::undefined(), &[shadow.to_value()], context)?;
    let closure = callable_layer(&layer)?.call(&JsValue::undefined(), imports.values(), context)?;
    let closure = callable_layer(&closure)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        shadowed = shadowed.len(),
        imports = imports.len(),
        "compiled isolated callable"
    );

    let invocation = Invocation {
        shadow: shadow.clone(),
        closure,
    };
    let function = FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(run_closure, invocation),
    )
    .name(js_string!("isolated"))
    .length(0)
    .build();
    Ok(Callable {
        function: function.into(),
        shadow,
    })
}

fn check_imports(imports: &JsValue) -> Result<()> {
    if imports.is_null_or_undefined() {
        return Ok(());
    }
    match object_of(imports) {
        Some(object) if !object.is_callable() => Ok(()),
        _ => Err(SandboxError::InvalidArgument(format!(
            "imports cannot be of type \"{}\"",
            type_name(imports)
        ))),
    }
}

/// Reject names that cannot be bound as parameters, and repeats.
fn check_names(names: &[String], what: &str, context: &mut Context) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !is_valid_variable_name(name, context) {
            return Err(SandboxError::Compile {
                message: format!("invalid {what} name {name:?}"),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(SandboxError::Compile {
                message: format!("duplicate {what} name {name:?}"),
            });
        }
    }
    Ok(())
}

fn evaluate_in(
    context: &mut Context,
    config: &Rc<SandboxConfig>,
    code: &str,
    imports: &JsValue,
    template: Option<&JsObject>,
) -> Result<Callable> {
    check_imports(imports)?;
    let template = template.cloned().unwrap_or_else(|| context.global_object());
    let imports =
        ImportsMap::from_value(imports, context).map_err(|err| SandboxError::from_js_error(&err, context))?;
    check_names(imports.names(), "import", context)?;
    compile(code, Entry::Body, &imports, &template, config, AliasInstall::Lazy, context)
        .map_err(|err| SandboxError::from_compile_error(&err, context))
}

fn evaluate_with_params_in<I>(
    context: &mut Context,
    config: &Rc<SandboxConfig>,
    params: I,
    code: &str,
    template: Option<&JsObject>,
) -> Result<Callable>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let params: Vec<String> = params.into_iter().map(|p| p.as_ref().to_string()).collect();
    check_names(&params, "parameter", context)?;
    let template = template.cloned().unwrap_or_else(|| context.global_object());
    compile(
        code,
        Entry::Function(&params),
        &ImportsMap::default(),
        &template,
        config,
        AliasInstall::Eager,
        context,
    )
    .map_err(|err| SandboxError::from_compile_error(&err, context))
}

fn code_string(code: &JsValue, context: &mut Context) -> Result<String> {
    if code.is_null_or_undefined() {
        return Ok(String::new());
    }
    code.to_string(context)
        .map(|code| code.to_std_string_escaped())
        .map_err(|err| SandboxError::from_js_error(&err, context))
}

/// Compile `code` as a function body running against a shadow of
/// `template` (default: the context's global object).
///
/// # Arguments
/// * `code` - The function body; its own `return` controls the result.
/// * `imports` - An object whose own enumerable properties become
///   variables, or `undefined`/`null` for none.
/// * `template` - The global object to copy.
///
/// # Errors
/// [`SandboxError::InvalidArgument`] when `imports` is neither an object
/// nor nullish, [`SandboxError::Compile`] when `code` does not compile or
/// an import key is not a valid variable name.
///
/// ```rust
/// use shadow_eval::{evaluate, Context, JsValue};
///
/// let mut context = Context::default();
/// let callable = evaluate(&mut context, "return 1 + 1", &JsValue::undefined(), None).unwrap();
/// let value = callable.call(&[], &mut context).unwrap();
/// assert_eq!(value.as_number(), Some(2.0));
/// ```
pub fn evaluate(
    context: &mut Context,
    code: &str,
    imports: &JsValue,
    template: Option<&JsObject>,
) -> Result<Callable> {
    evaluate_in(context, &SandboxConfig::shared_default(), code, imports, template)
}

/// [`evaluate`] for code given as a script value. `undefined` and `null`
/// compile to an empty body; anything else is converted with `String()`.
pub fn evaluate_value(
    context: &mut Context,
    code: &JsValue,
    imports: &JsValue,
    template: Option<&JsObject>,
) -> Result<Callable> {
    let code = code_string(code, context)?;
    evaluate(context, &code, imports, template)
}

/// Compile `code` as the body of a function taking `params`.
///
/// Invoking the returned callable yields that function. The `eval` alias
/// is installed before any code runs, and functions made by the
/// `Function` alias get `undefined` as their fallback receiver.
///
/// # Errors
/// [`SandboxError::Compile`] when a parameter is not a valid variable
/// name, a name repeats, or `code` does not compile.
pub fn evaluate_with_params<I>(
    context: &mut Context,
    params: I,
    code: &str,
    template: Option<&JsObject>,
) -> Result<Callable>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    evaluate_with_params_in(context, &SandboxConfig::shared_default(), params, code, template)
}

/// An engine context prepared for isolated evaluation.
///
/// The context gets the configured recursion limit and a `console` whose
/// output is captured; [`execute`](Self::execute) reports the output of
/// each run.
pub struct IsolatedEvaluator {
    context: Context,
    config: Rc<SandboxConfig>,
    console: ConsoleOutput,
}

impl IsolatedEvaluator {
    /// Create an evaluator, rejecting invalid configurations.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        config.validate()?;
        let mut context = Context::default();
        let mut limits = RuntimeLimits::default();
        limits.set_recursion_limit(config.max_call_depth);
        context.set_runtime_limits(limits);

        let console = ConsoleOutput::new();
        if let Err(err) = install_console(&mut context, &console) {
            return Err(SandboxError::from_js_error(&err, &mut context));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            max_call_depth = config.max_call_depth,
            max_nesting_depth = config.max_nesting_depth,
            "created isolated evaluator"
        );

        Ok(Self {
            context,
            config: Rc::new(config),
            console,
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The underlying engine context.
    pub fn context(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The context's real global object, the default template.
    pub fn global(&self) -> JsObject {
        self.context.global_object()
    }

    pub fn console(&self) -> &ConsoleOutput {
        &self.console
    }

    /// Run `source` directly in the context, outside any sandbox.
    pub fn eval_value(&mut self, source: &str) -> Result<JsValue> {
        self.context
            .eval(Source::from_bytes(source))
            .map_err(|err| SandboxError::from_js_error(&err, &mut self.context))
    }

    /// [`evaluate`] with this evaluator's configuration.
    pub fn evaluate(&mut self, code: &str, imports: &JsValue, template: Option<&JsObject>) -> Result<Callable> {
        evaluate_in(&mut self.context, &self.config, code, imports, template)
    }

    /// [`evaluate_value`] with this evaluator's configuration.
    pub fn evaluate_value(
        &mut self,
        code: &JsValue,
        imports: &JsValue,
        template: Option<&JsObject>,
    ) -> Result<Callable> {
        let code = code_string(code, &mut self.context)?;
        self.evaluate(&code, imports, template)
    }

    /// [`evaluate_with_params`] with this evaluator's configuration.
    pub fn evaluate_with_params<I>(&mut self, params: I, code: &str, template: Option<&JsObject>) -> Result<Callable>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        evaluate_with_params_in(&mut self.context, &self.config, params, code, template)
    }

    /// Invoke `callable` with the shadow global as `this`.
    pub fn call(&mut self, callable: &Callable, args: &[JsValue]) -> Result<JsValue> {
        callable.call(args, &mut self.context)
    }

    /// Invoke `callable` with the shadow global as `this`, capturing
    /// console output and nesting statistics.
    pub fn execute(&mut self, callable: &Callable, args: &[JsValue]) -> Result<ExecutionResult> {
        let stdout_mark = self.console.stdout.len();
        let stderr_mark = self.console.stderr.len();
        let start = Instant::now();
        let context = &mut self.context;
        let (result, stats) = measure(|| callable.invoke(&JsValue::undefined(), args, context));
        let duration = start.elapsed();
        let value = result.map_err(|err| SandboxError::from_js_error(&err, &mut self.context))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(?duration, peak_nesting = stats.peak_depth, "executed callable");

        Ok(ExecutionResult {
            value,
            stdout: self.console.stdout.since(stdout_mark),
            stderr: self.console.stderr.since(stderr_mark),
            metadata: ExecutionMetadata {
                duration,
                peak_nesting_depth: stats.peak_depth,
                nesting_limit_exceeded: stats.limit_exceeded,
            },
        })
    }
}

impl fmt::Debug for IsolatedEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedEvaluator")
            .field("config", &self.config)
            .field("console", &self.console)
            .finish_non_exhaustive()
    }
}
