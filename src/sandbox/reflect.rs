//! Property reflection through the realm's own `Object` built-ins.
//!
//! Going through `Object.getOwnPropertyNames` and friends keeps the results
//! identical to what scripts observe, including enumeration order.

use boa_engine::{Context, JsNativeError, JsObject, JsResult, JsString, JsValue};

/// A property descriptor read back from a script object.
#[derive(Debug, Clone)]
pub(crate) enum OwnDescriptor {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        enumerable: bool,
        configurable: bool,
    },
}

pub(crate) fn object_of(value: &JsValue) -> Option<JsObject> {
    value.as_object().map(|object| object.clone())
}

/// The string contents of `value`, if it is a string primitive.
pub(crate) fn string_of(value: &JsValue) -> Option<String> {
    value.as_string().map(|s| s.to_std_string_escaped())
}

/// The `typeof` of a value, as scripts would report it.
pub(crate) fn type_name(value: &JsValue) -> &'static str {
    if value.is_undefined() {
        "undefined"
    } else if value.is_null() {
        "object"
    } else if value.is_boolean() {
        "boolean"
    } else if value.is_number() {
        "number"
    } else if value.is_string() {
        "string"
    } else if value.is_symbol() {
        "symbol"
    } else if value.is_bigint() {
        "bigint"
    } else if value.is_callable() {
        "function"
    } else {
        "object"
    }
}

fn object_builtin(name: &str, context: &mut Context) -> JsResult<JsObject> {
    let object = context.intrinsics().constructors().object().constructor();
    let function = object.get(JsString::from(name), context)?;
    object_of(&function)
        .filter(JsObject::is_callable)
        .ok_or_else(|| JsNativeError::typ().with_message(format!("Object.{name} is not a function")).into())
}

fn call_object_builtin(name: &str, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    object_builtin(name, context)?.call(&JsValue::undefined(), args, context)
}

/// Items `0..length` of an array-like object.
pub(crate) fn array_values(array: &JsObject, context: &mut Context) -> JsResult<Vec<JsValue>> {
    let length = array.get(JsString::from("length"), context)?.to_u32(context)?;
    (0..length).map(|index| array.get(index, context)).collect()
}

fn string_list(value: &JsValue, context: &mut Context) -> JsResult<Vec<String>> {
    let Some(array) = object_of(value) else {
        return Ok(Vec::new());
    };
    Ok(array_values(&array, context)?
        .iter()
        .filter_map(string_of)
        .collect())
}

/// `Object.getOwnPropertyNames(object)`: string keys, enumerable or not.
pub(crate) fn own_property_names(object: &JsObject, context: &mut Context) -> JsResult<Vec<String>> {
    let names = call_object_builtin("getOwnPropertyNames", &[object.clone().into()], context)?;
    string_list(&names, context)
}

/// `Object.keys(object)`: own enumerable string keys.
pub(crate) fn own_enumerable_keys(object: &JsObject, context: &mut Context) -> JsResult<Vec<String>> {
    let keys = call_object_builtin("keys", &[object.clone().into()], context)?;
    string_list(&keys, context)
}

pub(crate) fn own_property_descriptor(
    object: &JsObject,
    name: &str,
    context: &mut Context,
) -> JsResult<Option<OwnDescriptor>> {
    let descriptor = call_object_builtin(
        "getOwnPropertyDescriptor",
        &[object.clone().into(), JsString::from(name).into()],
        context,
    )?;
    let Some(descriptor) = object_of(&descriptor) else {
        return Ok(None);
    };
    let flag = |key: &str, context: &mut Context| -> JsResult<bool> {
        Ok(descriptor.get(JsString::from(key), context)?.to_boolean())
    };
    let enumerable = flag("enumerable", context)?;
    let configurable = flag("configurable", context)?;
    if descriptor.has_own_property(JsString::from("get"), context)?
        || descriptor.has_own_property(JsString::from("set"), context)?
    {
        return Ok(Some(OwnDescriptor::Accessor {
            enumerable,
            configurable,
        }));
    }
    Ok(Some(OwnDescriptor::Data {
        value: descriptor.get(JsString::from("value"), context)?,
        writable: flag("writable", context)?,
        enumerable,
        configurable,
    }))
}

/// Trial-compile a strict function body with the given parameters using
/// the realm's `Function` constructor. Nothing runs.
pub(crate) fn check_syntax(params: &[String], body: &str, context: &mut Context) -> JsResult<()> {
    let function = context.intrinsics().constructors().function().constructor();
    let mut args: Vec<JsValue> = params
        .iter()
        .map(|param| JsString::from(param.as_str()).into())
        .collect();
    args.push(JsString::from(format!("\"use strict\";\n{body}")).into());
    function.construct(&args, None, context)?;
    Ok(())
}
