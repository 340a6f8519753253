//! The shadow global: a stand-in for the template global that isolated code
//! sees instead of the real one.
//!
//! Each canonical global becomes an own property of the shadow. Data
//! properties are copied at construction, accessors read through to the
//! template, and `eval`/`Function` are replaced by aliases that re-enter
//! the sandbox instead of reaching the ambient evaluator. The self-reference
//! names (`self`, `global`, `globalThis`) resolve to the shadow itself.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::property::{Attribute, PropertyDescriptor};
use boa_engine::{
    js_string, Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsSymbol, JsValue, NativeFunction,
};
use boa_gc::{Finalize, Trace};

use crate::error::{Result, SandboxError};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::executor::{compile, Callable, Entry};
use crate::sandbox::imports::ImportsMap;
use crate::sandbox::limits::NestingGuard;
use crate::sandbox::reflect::{
    check_syntax, object_of, own_property_descriptor, own_property_names, string_of, OwnDescriptor,
};

thread_local! {
    static SENTINEL: Option<JsSymbol> = JsSymbol::new(Some(js_string!("Global")));
}

fn sentinel() -> JsValue {
    SENTINEL.with(|sentinel| sentinel.clone().map(JsValue::from).unwrap_or_else(JsValue::undefined))
}

fn guard(token: Option<&JsValue>) -> Result<()> {
    let held = SENTINEL.with(|sentinel| match (token, sentinel) {
        (Some(token), Some(sentinel)) => token.strict_equals(&JsValue::from(sentinel.clone())),
        _ => false,
    });
    if held {
        Ok(())
    } else {
        Err(SandboxError::IllegalConstruction)
    }
}

/// When the `eval` alias is installed, and where `Function`-produced
/// functions get their receiver when called without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasInstall {
    /// `eval` is installed by [`ShadowGlobal::finalize`], right before user
    /// code first runs. `Function` results fall back to the shadow.
    Lazy,
    /// `eval` is installed during construction. `Function` results fall
    /// back to `undefined`.
    Eager,
}

/// A per-sandbox copy of the template global's canonical properties.
#[derive(Clone, Trace, Finalize)]
pub struct ShadowGlobal {
    object: JsObject,
    template: JsObject,
    #[unsafe_ignore_trace]
    config: Rc<SandboxConfig>,
    #[unsafe_ignore_trace]
    finalized: Rc<Cell<bool>>,
}

impl ShadowGlobal {
    /// Guarded constructor.
    ///
    /// `args[0]` must be the crate's private sentinel, so this always fails
    /// with [`SandboxError::IllegalConstruction`] outside the crate.
    pub fn construct(args: &[JsValue], context: &mut Context) -> Result<Self> {
        guard(args.first())?;
        let template = context.global_object();
        Self::build(&template, &SandboxConfig::shared_default(), AliasInstall::Lazy, context)
            .map_err(|err| SandboxError::from_js_error(&err, context))
    }

    pub(crate) fn new(
        template: &JsObject,
        config: &Rc<SandboxConfig>,
        install: AliasInstall,
        context: &mut Context,
    ) -> JsResult<Self> {
        guard(Some(&sentinel()))?;
        Self::build(template, config, install, context)
    }

    fn build(
        template: &JsObject,
        config: &Rc<SandboxConfig>,
        install: AliasInstall,
        context: &mut Context,
    ) -> JsResult<Self> {
        let constructor = FunctionObjectBuilder::new(context.realm(), NativeFunction::from_fn_ptr(global_constructor))
            .name(js_string!("Global"))
            .length(0)
            .constructor(true)
            .build();
        let prototype = ObjectInitializer::new(context)
            .property(
                js_string!("constructor"),
                constructor,
                Attribute::WRITABLE | Attribute::CONFIGURABLE,
            )
            .build();
        let object = ObjectInitializer::new(context).build();
        object.set_prototype(Some(prototype));

        for name in &config.canonical_globals {
            if config.is_self_reference(name) || name == "eval" {
                continue;
            }
            let key = JsString::from(name.as_str());
            let descriptor = if name == "Function" {
                let fallback = match install {
                    AliasInstall::Lazy => object.clone().into(),
                    AliasInstall::Eager => JsValue::undefined(),
                };
                let alias = function_alias(template, config, fallback, context);
                hidden(alias.into())
            } else {
                match own_property_descriptor(template, name, context)? {
                    None => hidden(JsValue::undefined()),
                    Some(OwnDescriptor::Accessor {
                        enumerable,
                        configurable,
                    }) => read_through(template, &key, enumerable, configurable, context),
                    Some(OwnDescriptor::Data {
                        value,
                        writable,
                        enumerable,
                        configurable,
                    }) => PropertyDescriptor::builder()
                        .value(value)
                        .writable(writable)
                        .enumerable(enumerable)
                        .configurable(configurable)
                        .build(),
                }
            };
            object.define_property_or_throw(key, descriptor, context)?;
        }
        for name in &config.self_reference_names {
            let descriptor = PropertyDescriptor::builder()
                .value(object.clone())
                .writable(true)
                .enumerable(true)
                .configurable(true)
                .build();
            object.define_property_or_throw(JsString::from(name.as_str()), descriptor, context)?;
        }

        let shadow = ShadowGlobal {
            object,
            template: template.clone(),
            config: Rc::clone(config),
            finalized: Rc::new(Cell::new(false)),
        };
        if install == AliasInstall::Eager {
            shadow.finalize(context)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            canonical = config.canonical_globals.len(),
            eager = install == AliasInstall::Eager,
            "constructed shadow global"
        );

        Ok(shadow)
    }

    /// Install the `eval` alias. Runs once; later calls do nothing.
    pub fn finalize(&self, context: &mut Context) -> JsResult<()> {
        if self.finalized.replace(true) {
            return Ok(());
        }
        let alias = FunctionObjectBuilder::new(
            context.realm(),
            NativeFunction::from_copy_closure_with_captures(run_eval, self.clone()),
        )
        .name(js_string!("eval"))
        .length(1)
        .build();
        let descriptor = PropertyDescriptor::builder()
            .value(alias)
            .writable(true)
            .enumerable(true)
            .configurable(true)
            .build();
        self.object.define_property_or_throw(js_string!("eval"), descriptor, context)?;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.get()
    }

    /// The script-visible shadow object.
    pub fn object(&self) -> &JsObject {
        &self.object
    }

    /// The object this shadow was built from.
    pub fn template(&self) -> &JsObject {
        &self.template
    }

    pub fn to_value(&self) -> JsValue {
        self.object.clone().into()
    }

    /// Own property names of the shadow object, enumerable or not.
    pub fn own_keys(&self, context: &mut Context) -> Result<Vec<String>> {
        own_property_names(&self.object, context).map_err(|err| SandboxError::from_js_error(&err, context))
    }
}

impl fmt::Debug for ShadowGlobal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowGlobal")
            .field("finalized", &self.finalized.get())
            .field("self_reference_names", &self.config.self_reference_names)
            .finish_non_exhaustive()
    }
}

fn hidden(value: JsValue) -> PropertyDescriptor {
    PropertyDescriptor::builder()
        .value(value)
        .writable(true)
        .enumerable(false)
        .configurable(true)
        .build()
}

/// The `constructor` scripts see on a shadow. Without the sentinel (which
/// scripts can never hold) it throws `TypeError: Illegal constructor`.
fn global_constructor(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    Ok(ShadowGlobal::construct(args, context)?.to_value())
}

#[derive(Trace, Finalize)]
struct TemplateKey {
    template: JsObject,
    #[unsafe_ignore_trace]
    key: JsString,
}

fn read_template(_this: &JsValue, _args: &[JsValue], target: &TemplateKey, context: &mut Context) -> JsResult<JsValue> {
    target.template.get(target.key.clone(), context)
}

fn drop_write(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::undefined())
}

/// An accessor pair for a template accessor.
///
/// Reads always go through the template's current value. Writes are
/// dropped; the template's setter is never called.
fn read_through(
    template: &JsObject,
    key: &JsString,
    enumerable: bool,
    configurable: bool,
    context: &mut Context,
) -> PropertyDescriptor {
    let name = key.to_std_string_escaped();
    let target = TemplateKey {
        template: template.clone(),
        key: key.clone(),
    };
    let getter = FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(read_template, target),
    )
    .name(JsString::from(format!("get {name}")))
    .length(0)
    .build();
    let setter = FunctionObjectBuilder::new(context.realm(), NativeFunction::from_fn_ptr(drop_write))
        .name(JsString::from(format!("set {name}")))
        .length(1)
        .build();
    PropertyDescriptor::builder()
        .get(getter)
        .set(setter)
        .enumerable(enumerable)
        .configurable(configurable)
        .build()
}

/// `eval` inside a sandbox: strings run as a nested isolated callable whose
/// template is the current shadow; anything else is returned as is.
fn run_eval(_this: &JsValue, args: &[JsValue], shadow: &ShadowGlobal, context: &mut Context) -> JsResult<JsValue> {
    let code = args.get_or_undefined(0);
    let Some(source) = string_of(code) else {
        return Ok(code.clone());
    };
    let _nesting = NestingGuard::enter(shadow.config.max_nesting_depth)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(len = source.len(), "entering nested eval");

    compile(
        &source,
        Entry::Body,
        &ImportsMap::default(),
        &shadow.object,
        &shadow.config,
        AliasInstall::Lazy,
        context,
    )?
    .invoke(&JsValue::undefined(), &[], context)
}

#[derive(Trace, Finalize)]
struct FunctionAlias {
    template: JsObject,
    fallback: JsValue,
    #[unsafe_ignore_trace]
    config: Rc<SandboxConfig>,
}

#[derive(Trace, Finalize)]
struct Produced {
    factory: Callable,
    fallback: JsValue,
    #[unsafe_ignore_trace]
    max_nesting: usize,
}

/// `Function` inside a sandbox.
///
/// `Function(p1, ..., pn, body)` compiles `(function(p1, ..., pn) { body })`
/// as a nested isolated callable against `template`. The returned function
/// produces a fresh instance on each call and applies it with the caller's
/// receiver, or `fallback` when that is nullish.
fn function_alias(
    template: &JsObject,
    config: &Rc<SandboxConfig>,
    fallback: JsValue,
    context: &mut Context,
) -> JsObject {
    let alias = FunctionAlias {
        template: template.clone(),
        fallback,
        config: Rc::clone(config),
    };
    FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(construct_function, alias),
    )
    .name(js_string!("Function"))
    .length(1)
    .constructor(true)
    .build()
    .into()
}

fn construct_function(
    _this: &JsValue,
    args: &[JsValue],
    alias: &FunctionAlias,
    context: &mut Context,
) -> JsResult<JsValue> {
    let (body, params) = match args.split_last() {
        Some((body, params)) => (
            body.to_string(context)?.to_std_string_escaped(),
            params
                .iter()
                .map(|param| param.to_string(context).map(|param| param.to_std_string_escaped()))
                .collect::<JsResult<Vec<_>>>()?,
        ),
        None => (String::new(), Vec::new()),
    };
    check_syntax(&params, &body, context)?;
    let source = format!("return (function({}) {{\n{}\n}});", params.join(","), body);

    #[cfg(feature = "tracing")]
    tracing::debug!(params = params.len(), "compiling nested Function");

    let factory = compile(
        &source,
        Entry::Body,
        &ImportsMap::default(),
        &alias.template,
        &alias.config,
        AliasInstall::Lazy,
        context,
    )?;
    let produced = Produced {
        factory,
        fallback: alias.fallback.clone(),
        max_nesting: alias.config.max_nesting_depth,
    };
    let function = FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(call_produced, produced),
    )
    .name(js_string!("anonymous"))
    .length(params.len())
    .build();
    Ok(function.into())
}

fn call_produced(this: &JsValue, args: &[JsValue], produced: &Produced, context: &mut Context) -> JsResult<JsValue> {
    let _nesting = NestingGuard::enter(produced.max_nesting)?;
    let function = produced.factory.invoke(&JsValue::undefined(), &[], context)?;
    let function = object_of(&function)
        .filter(JsObject::is_callable)
        .ok_or_else(|| JsNativeError::typ().with_message("Function body did not produce a function"))?;
    let receiver = if this.is_null_or_undefined() {
        produced.fallback.clone()
    } else {
        this.clone()
    };
    function.call(&receiver, args, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn shadow_of(template: &JsObject, context: &mut Context) -> ShadowGlobal {
        ShadowGlobal::new(template, &Rc::new(SandboxConfig::default()), AliasInstall::Lazy, context).unwrap()
    }

    fn object(context: &mut Context, source: &str) -> JsObject {
        let value = context.eval(Source::from_bytes(source)).unwrap();
        object_of(&value).unwrap()
    }

    #[test]
    fn test_construct_requires_sentinel() {
        let mut context = Context::default();
        assert_eq!(
            ShadowGlobal::construct(&[], &mut context).unwrap_err(),
            SandboxError::IllegalConstruction
        );
        let forged: JsValue = JsSymbol::new(Some(js_string!("Global"))).unwrap().into();
        assert!(ShadowGlobal::construct(&[forged], &mut context)
            .unwrap_err()
            .is_illegal_construction());
    }

    #[test]
    fn test_construct_with_sentinel() {
        let mut context = Context::default();
        let shadow = ShadowGlobal::construct(&[sentinel()], &mut context).unwrap();
        let math = shadow.object().get(js_string!("Math"), &mut context).unwrap();
        assert!(math.is_object());
        assert!(!shadow.is_finalized());
    }

    #[test]
    fn test_data_properties_are_copied() {
        let mut context = Context::default();
        let template = object(
            &mut context,
            "var t = {Math: 1}; Object.defineProperty(t, 'NaN', {value: NaN}); t",
        );
        let shadow = shadow_of(&template, &mut context);

        match own_property_descriptor(shadow.object(), "NaN", &mut context).unwrap() {
            Some(OwnDescriptor::Data {
                writable,
                enumerable,
                configurable,
                ..
            }) => assert!(!writable && !enumerable && !configurable),
            other => panic!("unexpected descriptor {other:?}"),
        }

        shadow
            .object()
            .set(js_string!("Math"), JsValue::from(2), true, &mut context)
            .unwrap();
        let original = template.get(js_string!("Math"), &mut context).unwrap();
        assert_eq!(original.as_number(), Some(1.0));
    }

    #[test]
    fn test_missing_properties_are_undefined() {
        let mut context = Context::default();
        let template = object(&mut context, "({})");
        let shadow = shadow_of(&template, &mut context);
        match own_property_descriptor(shadow.object(), "setTimeout", &mut context).unwrap() {
            Some(OwnDescriptor::Data {
                value,
                writable,
                enumerable,
                configurable,
            }) => {
                assert!(value.is_undefined());
                assert!(writable && !enumerable && configurable);
            }
            other => panic!("unexpected descriptor {other:?}"),
        }
    }

    #[test]
    fn test_self_references_are_identity() {
        let mut context = Context::default();
        let template = object(&mut context, "({})");
        let shadow = shadow_of(&template, &mut context);
        for name in ["self", "global", "globalThis"] {
            let value = shadow.object().get(JsString::from(name), &mut context).unwrap();
            assert!(value.strict_equals(&shadow.to_value()), "{name}");
        }
    }

    #[test]
    fn test_eval_installed_by_finalize() {
        let mut context = Context::default();
        let global = context.global_object();
        let shadow = shadow_of(&global, &mut context);
        assert!(!shadow.own_keys(&mut context).unwrap().contains(&"eval".to_string()));
        shadow.finalize(&mut context).unwrap();
        shadow.finalize(&mut context).unwrap();
        assert!(shadow.is_finalized());
        assert!(matches!(
            own_property_descriptor(shadow.object(), "eval", &mut context).unwrap(),
            Some(OwnDescriptor::Data { enumerable: true, .. })
        ));
    }

    #[test]
    fn test_eager_install() {
        let mut context = Context::default();
        let global = context.global_object();
        let config = Rc::new(SandboxConfig::default());
        let shadow = ShadowGlobal::new(&global, &config, AliasInstall::Eager, &mut context).unwrap();
        assert!(shadow.is_finalized());
        assert!(shadow.own_keys(&mut context).unwrap().contains(&"eval".to_string()));
    }

    #[test]
    fn test_function_alias_is_hidden() {
        let mut context = Context::default();
        let global = context.global_object();
        let shadow = shadow_of(&global, &mut context);
        assert!(matches!(
            own_property_descriptor(shadow.object(), "Function", &mut context).unwrap(),
            Some(OwnDescriptor::Data { enumerable: false, .. })
        ));
        let ambient = global.get(js_string!("Function"), &mut context).unwrap();
        let alias = shadow.object().get(js_string!("Function"), &mut context).unwrap();
        assert!(!alias.strict_equals(&ambient));
    }

    #[test]
    fn test_accessor_reads_track_template() {
        let mut context = Context::default();
        let template = object(
            &mut context,
            "var store = 1; ({ get Date() { return store; } })",
        );
        let shadow = shadow_of(&template, &mut context);

        let read = shadow.object().get(js_string!("Date"), &mut context).unwrap();
        assert_eq!(read.as_number(), Some(1.0));
        context.eval(Source::from_bytes("store = 2")).unwrap();
        let read = shadow.object().get(js_string!("Date"), &mut context).unwrap();
        assert_eq!(read.as_number(), Some(2.0));
    }

    #[test]
    fn test_accessor_writes_never_reach_template() {
        let mut context = Context::default();
        let template = object(
            &mut context,
            "var written = 0; ({ get Map() { return written; }, set Map(v) { written = v; } })",
        );
        let shadow = shadow_of(&template, &mut context);

        shadow
            .object()
            .set(js_string!("Map"), JsValue::from(7), true, &mut context)
            .unwrap();
        let written = context.eval(Source::from_bytes("written")).unwrap();
        assert_eq!(written.as_number(), Some(0.0));
        let read = shadow.object().get(js_string!("Map"), &mut context).unwrap();
        assert_eq!(read.as_number(), Some(0.0));
    }

    #[test]
    fn test_script_constructor_is_guarded() {
        let mut context = Context::default();
        let template = object(&mut context, "({})");
        let shadow = shadow_of(&template, &mut context);
        let prototype = shadow.object().prototype().unwrap();
        let constructor = prototype.get(js_string!("constructor"), &mut context).unwrap();
        let constructor = object_of(&constructor).unwrap();
        let err = constructor
            .call(&JsValue::undefined(), &[JsValue::from(1)], &mut context)
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Illegal constructor");
    }

    #[test]
    fn test_own_keys_are_canonical_or_self() {
        let mut context = Context::default();
        let global = context.global_object();
        let config = Rc::new(SandboxConfig::default());
        let shadow = ShadowGlobal::new(&global, &config, AliasInstall::Eager, &mut context).unwrap();
        for key in shadow.own_keys(&mut context).unwrap() {
            assert!(
                config.canonical_globals.contains(&key) || config.is_self_reference(&key),
                "unexpected own key {key}"
            );
        }
    }
}
