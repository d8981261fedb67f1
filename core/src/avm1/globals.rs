//! The global object and the handful of built-ins the core itself owns:
//! numeric parsing, escaping, property-flag manipulation, timers, and the
//! `Object`/`Function` prototypes. The wider class library is the host's.

use crate::avm1::environment::Environment;
use crate::avm1::error::Error;
use crate::avm1::function::{self, Executable, NativeFunction};
use crate::avm1::object::{self, ObjectData, ObjectId};
use crate::avm1::property::Attribute;
use crate::avm1::Value;
use crate::backend::timers::TimerCallback;
use crate::context::VmContext;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// RFC 1738 §2.2: everything but alphanumerics and the safe punctuation
/// is percent-encoded, over the raw byte sequence.
const URL_ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// The attributes most built-in members carry.
fn default_flags() -> Attribute {
    Attribute::DONT_DELETE | Attribute::DONT_ENUM
}

/// A function object with no `prototype` of its own, for built-in
/// methods.
fn bare_native(ctx: &mut VmContext, function: NativeFunction) -> ObjectId {
    let mut data = ObjectData::with_proto(Some(ctx.prototypes.function), ctx.player_version);
    data.executable = Some(Executable::Native(function));
    ctx.objects.insert(data)
}

fn define_function(ctx: &mut VmContext, on: ObjectId, name: &str, function: NativeFunction) {
    let func = bare_native(ctx, function);
    object::define_value(ctx, on, name, Value::Function(func), default_flags());
}

/// Populate the global object and the system prototypes. Called once at
/// context construction.
pub fn create_globals(ctx: &mut VmContext) {
    let globals = ctx.globals;
    let object_proto = ctx.prototypes.object;
    let function_proto = ctx.prototypes.function;

    // Object.prototype.
    define_function(ctx, object_proto, "toString", object_to_string);
    define_function(ctx, object_proto, "valueOf", object_value_of);
    define_function(ctx, object_proto, "hasOwnProperty", object_has_own_property);
    define_function(ctx, object_proto, "isPrototypeOf", object_is_prototype_of);
    define_function(ctx, object_proto, "addProperty", object_add_property);
    define_function(ctx, object_proto, "watch", object_watch);
    define_function(ctx, object_proto, "unwatch", object_unwatch);

    // Function.prototype: call/apply exist from SWF 6 up.
    let call_fn = bare_native(ctx, function_call);
    object::define_value(
        ctx,
        function_proto,
        "call",
        Value::Function(call_fn),
        default_flags() | Attribute::ONLY_SWF6_UP,
    );
    let apply_fn = bare_native(ctx, function_apply);
    object::define_value(
        ctx,
        function_proto,
        "apply",
        Value::Function(apply_fn),
        default_flags() | Attribute::ONLY_SWF6_UP,
    );

    // The Object and Function constructors share the prototypes every
    // object already hangs off.
    let object_ctor = bare_native(ctx, object_constructor);
    object::define_value(
        ctx,
        object_ctor,
        "prototype",
        Value::Object(object_proto),
        Attribute::DONT_ENUM | Attribute::DONT_DELETE,
    );
    ctx.object_mut(object_proto).constructor = Some(object_ctor);
    object::define_value(
        ctx,
        object_proto,
        "constructor",
        Value::Function(object_ctor),
        default_flags(),
    );
    object::define_value(ctx, globals, "Object", Value::Function(object_ctor), default_flags());

    let function_ctor = bare_native(ctx, function_constructor);
    object::define_value(
        ctx,
        function_ctor,
        "prototype",
        Value::Object(function_proto),
        Attribute::DONT_ENUM | Attribute::DONT_DELETE,
    );
    ctx.object_mut(function_proto).constructor = Some(function_ctor);
    object::define_value(
        ctx,
        globals,
        "Function",
        Value::Function(function_ctor),
        default_flags(),
    );

    // Global functions.
    define_function(ctx, globals, "parseInt", parse_int);
    define_function(ctx, globals, "parseFloat", parse_float);
    define_function(ctx, globals, "escape", escape);
    define_function(ctx, globals, "unescape", unescape);
    define_function(ctx, globals, "isNaN", is_nan);
    define_function(ctx, globals, "isFinite", is_finite);
    define_function(ctx, globals, "trace", trace);
    define_function(ctx, globals, "ASSetPropFlags", as_set_prop_flags);
    define_function(ctx, globals, "setInterval", set_interval);
    define_function(ctx, globals, "setTimeout", set_timeout);
    define_function(ctx, globals, "clearInterval", clear_interval);
    define_function(ctx, globals, "clearTimeout", clear_interval);
    define_function(ctx, globals, "getTimer", get_timer);

    object::define_value(ctx, globals, "NaN", Value::Number(f64::NAN), default_flags());
    object::define_value(
        ctx,
        globals,
        "Infinity",
        Value::Number(f64::INFINITY),
        default_flags(),
    );
}

// Object builtins.

fn object_constructor(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    match args.first() {
        Some(value) if value.coerce_to_object(ctx).is_some() => Ok(value.clone()),
        _ => match this {
            // Invoked via `new`: the fresh object is the result.
            Value::Object(_) => Ok(this),
            _ => {
                let proto = ctx.prototypes.object;
                let obj = ctx.alloc_object(Some(proto), env.swf_version());
                Ok(Value::Object(obj))
            }
        },
    }
}

fn function_constructor(
    _ctx: &mut VmContext,
    _env: &mut Environment,
    this: Value,
    _args: &[Value],
) -> Result<Value, Error> {
    Ok(this)
}

fn object_to_string(
    ctx: &mut VmContext,
    _env: &mut Environment,
    this: Value,
    _args: &[Value],
) -> Result<Value, Error> {
    Ok(match this {
        Value::Function(_) => "[type Function]".into(),
        Value::Object(id) if ctx.object(id).display.is_some() => {
            let node = ctx.object(id).display;
            match node {
                Some(node) => ctx.display.path(node).into(),
                None => "[object Object]".into(),
            }
        }
        _ => "[object Object]".into(),
    })
}

fn object_value_of(
    _ctx: &mut VmContext,
    _env: &mut Environment,
    this: Value,
    _args: &[Value],
) -> Result<Value, Error> {
    Ok(this)
}

fn object_has_own_property(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let name = match args.first() {
        Some(name) => name.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Bool(false)),
    };
    let result = this
        .coerce_to_object(ctx)
        .map(|obj| object::has_own_property(ctx, obj, &name))
        .unwrap_or(false);
    Ok(Value::Bool(result))
}

fn object_is_prototype_of(
    ctx: &mut VmContext,
    _env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let this_id = match this.as_object_id() {
        Some(id) => id,
        None => return Ok(Value::Bool(false)),
    };
    let mut current = args
        .first()
        .and_then(|v| v.coerce_to_object(ctx))
        .and_then(|obj| ctx.object(obj).proto);
    let mut hops = 0;
    while let Some(proto) = current {
        if proto == this_id {
            return Ok(Value::Bool(true));
        }
        hops += 1;
        if hops > 256 {
            log_ascoding!("Circular prototype chain in isPrototypeOf");
            break;
        }
        current = ctx.object(proto).proto;
    }
    Ok(Value::Bool(false))
}

fn object_add_property(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let obj = match this.coerce_to_object(ctx) {
        Some(obj) => obj,
        None => return Ok(Value::Bool(false)),
    };
    let name = match args.first() {
        Some(name) => name.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Bool(false)),
    };
    let getter = args.get(1).cloned().unwrap_or(Value::Undefined);
    let setter = args.get(2).cloned().unwrap_or(Value::Undefined);
    if name.is_empty() || !function::is_callable(ctx, &getter) {
        return Ok(Value::Bool(false));
    }
    let getter = match getter.as_object_id() {
        Some(id) => id,
        None => return Ok(Value::Bool(false)),
    };
    let setter = if function::is_callable(ctx, &setter) {
        setter.as_object_id()
    } else {
        None
    };
    object::add_property(ctx, obj, &name, getter, setter, Attribute::empty());
    Ok(Value::Bool(true))
}

fn object_watch(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let obj = match this.coerce_to_object(ctx) {
        Some(obj) => obj,
        None => return Ok(Value::Bool(false)),
    };
    let name = match args.first() {
        Some(name) => name.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Bool(false)),
    };
    let callback = args.get(1).cloned().unwrap_or(Value::Undefined);
    if !function::is_callable(ctx, &callback) {
        return Ok(Value::Bool(false));
    }
    let callback = match callback.as_object_id() {
        Some(id) => id,
        None => return Ok(Value::Bool(false)),
    };
    let extra = args.get(2).cloned().unwrap_or(Value::Undefined);
    object::watch(ctx, obj, name, callback, extra);
    Ok(Value::Bool(true))
}

fn object_unwatch(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let obj = match this.coerce_to_object(ctx) {
        Some(obj) => obj,
        None => return Ok(Value::Bool(false)),
    };
    let name = match args.first() {
        Some(name) => name.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Bool(false)),
    };
    Ok(Value::Bool(object::unwatch(ctx, obj, &name)))
}

// Function builtins.

fn function_call(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let func = match this.as_object_id() {
        Some(id) => id,
        None => return Ok(Value::Undefined),
    };
    let receiver = args.first().cloned().unwrap_or(Value::Undefined);
    let call_args = if args.is_empty() { &[] } else { &args[1..] };
    function::call_object(ctx, env, func, receiver, call_args)
}

fn function_apply(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let func = match this.as_object_id() {
        Some(id) => id,
        None => return Ok(Value::Undefined),
    };
    let receiver = args.first().cloned().unwrap_or(Value::Undefined);
    let mut call_args = Vec::new();
    if let Some(array) = args.get(1).and_then(|v| v.coerce_to_object(ctx)) {
        let length = object::get_member(ctx, env, array, "length")?
            .unwrap_or(Value::Undefined)
            .coerce_to_f64(ctx, env)?;
        let length = if length.is_finite() && length > 0.0 {
            length as usize
        } else {
            0
        };
        for i in 0..length {
            let element = object::get_member(ctx, env, array, &i.to_string())?
                .unwrap_or(Value::Undefined);
            call_args.push(element);
        }
    }
    function::call_object(ctx, env, func, receiver, &call_args)
}

// Global functions.

/// `parseInt(string[, radix])` with the player's base-detection rules:
/// a `0x` prefix means 16 (a following `+` is legal, a `-` is not), a
/// leading zero over octal digits means 8, anything else is 10. Leading
/// whitespace is only skipped on the decimal path.
fn parse_int(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let s = match args.first() {
        Some(value) => value.coerce_to_string(ctx, env)?,
        None => {
            log_ascoding!("parseInt needs at least one argument");
            return Ok(Value::Undefined);
        }
    };
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut negative = false;
    let mut base: u32 = 10;

    if bytes.len() >= 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
        base = 16;
        i = 2;
        match bytes.get(i) {
            Some(b'+') => i += 1,
            Some(b'-') => return Ok(Value::Number(f64::NAN)),
            _ => {}
        }
    } else if matches!(bytes.first(), Some(b'0') | Some(b'-') | Some(b'+')) {
        base = 8;
        match bytes[0] {
            b'-' => {
                negative = true;
                i = 1;
            }
            b'+' => i = 1,
            _ => {}
        }
        if bytes.get(i) != Some(&b'0') {
            base = 10;
        } else if matches!(bytes.get(i + 1), Some(b'x') | Some(b'X')) {
            // "-0x…" and "+0x…" have no value.
            return Ok(Value::Number(f64::NAN));
        } else if bytes[i..].iter().any(|b| !(b'0'..=b'7').contains(b)) {
            base = 10;
        }
    } else {
        while matches!(bytes.get(i), Some(b' ') | Some(b'\n') | Some(b'\t') | Some(b'\r')) {
            i += 1;
        }
        match bytes.get(i) {
            Some(b'-') => {
                negative = true;
                i += 1;
            }
            Some(b'+') => i += 1,
            _ => {}
        }
    }

    // An explicit radix overrides the detection but not the position the
    // digits start at.
    if let Some(radix) = args.get(1) {
        let radix = radix.coerce_to_i32(ctx, env)?;
        if radix < 2 || radix > 36 {
            return Ok(Value::Number(f64::NAN));
        }
        base = radix as u32;
    }

    let mut digits = bytes[i.min(bytes.len())..]
        .iter()
        .map(|&b| digit_value(b));
    let mut result = match digits.next() {
        Some(Some(digit)) if u32::from(digit) < base => f64::from(digit),
        _ => return Ok(Value::Number(f64::NAN)),
    };
    for digit in digits {
        match digit {
            Some(digit) if u32::from(digit) < base => {
                result = result * base as f64 + f64::from(digit);
            }
            _ => break,
        }
    }
    if negative {
        result = -result;
    }
    Ok(Value::Number(result))
}

fn digit_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'z' => Some(b - b'a' + 10),
        b'A'..=b'Z' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// `parseFloat(string)`: strict parse of the longest numeric prefix.
fn parse_float(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let s = match args.first() {
        Some(value) => value.coerce_to_string(ctx, env)?,
        None => {
            log_ascoding!("parseFloat needs one argument");
            return Ok(Value::Undefined);
        }
    };
    let trimmed = s.trim_start_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let end = numeric_prefix_len(trimmed);
    let result = trimmed[..end].parse::<f64>().unwrap_or(f64::NAN);
    Ok(Value::Number(result))
}

/// The length of the longest prefix shaped like a decimal literal:
/// `[+-] digits [. digits] [eE [+-] digits]`.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
        i += 1;
    }
    let mut seen_digits = i > int_start;
    if bytes.get(i) == Some(&b'.') {
        let frac_start = i + 1;
        let mut j = frac_start;
        while matches!(bytes.get(j), Some(b) if b.is_ascii_digit()) {
            j += 1;
        }
        if j > frac_start || seen_digits {
            i = j;
            seen_digits = seen_digits || j > frac_start;
        }
    }
    if !seen_digits {
        return 0;
    }
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        let exp_start = j;
        while matches!(bytes.get(j), Some(b) if b.is_ascii_digit()) {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

fn escape(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let s = match args.first() {
        Some(value) => value.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Undefined),
    };
    Ok(utf8_percent_encode(&s, URL_ESCAPED).to_string().into())
}

fn unescape(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let s = match args.first() {
        Some(value) => value.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Undefined),
    };
    let decoded = percent_decode_str(&s).decode_utf8_lossy().to_string();
    Ok(decoded.into())
}

fn is_nan(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    match args.first() {
        Some(value) => Ok(Value::Bool(value.coerce_to_f64(ctx, env)?.is_nan())),
        None => Ok(Value::Undefined),
    }
}

fn is_finite(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    match args.first() {
        Some(value) => Ok(Value::Bool(value.coerce_to_f64(ctx, env)?.is_finite())),
        None => Ok(Value::Undefined),
    }
}

fn trace(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let text = match args.first() {
        Some(value) => value.coerce_to_string(ctx, env)?,
        None => return Ok(Value::Undefined),
    };
    avm_trace!("{}", text);
    Ok(Value::Undefined)
}

fn as_set_prop_flags(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    if args.len() < 3 {
        log_ascoding!("ASSetPropFlags needs at least three arguments");
        return Ok(Value::Undefined);
    }
    let obj = match args[0].coerce_to_object(ctx) {
        Some(obj) => obj,
        None => {
            log_ascoding!("ASSetPropFlags: first argument is not an object");
            return Ok(Value::Undefined);
        }
    };
    let set_true = args[2].coerce_to_i32(ctx, env)? as u16;
    let set_false = match args.get(3) {
        Some(value) => value.coerce_to_i32(ctx, env)? as u16,
        None => 0,
    };
    object::set_prop_flags(ctx, env, obj, &args[1], set_true, set_false)?;
    Ok(Value::Undefined)
}

fn set_interval(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    create_timer(ctx, env, this, args, true)
}

fn set_timeout(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    create_timer(ctx, env, this, args, false)
}

fn create_timer(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
    repeat: bool,
) -> Result<Value, Error> {
    let (callback, interval_index) = match args.first() {
        Some(value) if function::is_callable(ctx, value) => {
            let func = match value.as_object_id() {
                Some(id) => id,
                None => return Ok(Value::Undefined),
            };
            (TimerCallback::Function(func), 1)
        }
        Some(value) => match value.coerce_to_object(ctx) {
            Some(obj) => {
                let method_name = args
                    .get(1)
                    .cloned()
                    .unwrap_or(Value::Undefined)
                    .coerce_to_string(ctx, env)?
                    .to_string();
                (
                    TimerCallback::Method {
                        this: obj,
                        method_name,
                    },
                    2,
                )
            }
            None => return Ok(Value::Undefined),
        },
        None => return Ok(Value::Undefined),
    };
    let interval = match args.get(interval_index) {
        Some(Value::Undefined) | None => return Ok(Value::Undefined),
        Some(value) => value.coerce_to_i32(ctx, env)?,
    };
    let params = args.get(interval_index + 1..).unwrap_or(&[]).to_vec();
    let id = ctx.timers.set_interval(interval, callback, params, repeat);
    Ok(Value::Number(f64::from(id)))
}

fn clear_interval(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let id = args
        .first()
        .cloned()
        .unwrap_or(Value::Undefined)
        .coerce_to_i32(ctx, env)?;
    if !ctx.timers.clear_interval(id) {
        log::info!("clearInterval: timer {} does not exist", id);
    }
    Ok(Value::Undefined)
}

fn get_timer(
    ctx: &mut VmContext,
    _env: &mut Environment,
    _this: Value,
    _args: &[Value],
) -> Result<Value, Error> {
    Ok(Value::Number(ctx.timers.elapsed_millis() as f64))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::with_vm;
    use pretty_assertions::assert_eq;

    fn call_global(
        ctx: &mut VmContext,
        env: &mut Environment,
        name: &str,
        args: &[Value],
    ) -> Value {
        let func = env.get_variable(ctx, name, &[]).unwrap();
        func.call(ctx, env, Value::Undefined, args).unwrap()
    }

    fn number(value: Value) -> f64 {
        match value {
            Value::Number(n) => n,
            other => panic!("Expected a number, got {:?}", other),
        }
    }

    #[test]
    fn parse_int_edge_cases() {
        with_vm(6, |ctx, env, _root| {
            assert_eq!(
                number(call_global(ctx, env, "parseInt", &["0x10".into()])),
                16.0
            );
            assert!(
                number(call_global(ctx, env, "parseInt", &["0x-10".into()])).is_nan()
            );
            assert_eq!(
                number(call_global(ctx, env, "parseInt", &["0x+10".into()])),
                16.0
            );
            assert!(
                number(call_global(ctx, env, "parseInt", &["-0x10".into()])).is_nan()
            );
            assert_eq!(
                number(call_global(ctx, env, "parseInt", &["010".into()])),
                8.0
            );
            assert_eq!(
                number(call_global(ctx, env, "parseInt", &[" 010".into()])),
                10.0
            );
            assert_eq!(
                number(call_global(
                    ctx,
                    env,
                    "parseInt",
                    &["ZZ".into(), Value::Number(36.0)]
                )),
                1295.0
            );
            assert!(number(call_global(
                ctx,
                env,
                "parseInt",
                &["10".into(), Value::Number(1.0)]
            ))
            .is_nan());
            assert_eq!(
                number(call_global(ctx, env, "parseInt", &["-10".into()])),
                -10.0
            );
            assert_eq!(
                number(call_global(ctx, env, "parseInt", &["08".into()])),
                8.0
            );
            assert!(
                number(call_global(ctx, env, "parseInt", &["zz".into()])).is_nan()
            );
        });
    }

    #[test]
    fn parse_float_prefixes() {
        with_vm(6, |ctx, env, _root| {
            assert_eq!(
                number(call_global(ctx, env, "parseFloat", &["3.75abc".into()])),
                3.75
            );
            assert_eq!(
                number(call_global(ctx, env, "parseFloat", &["  -2.5e2xyz".into()])),
                -250.0
            );
            assert!(
                number(call_global(ctx, env, "parseFloat", &["abc".into()])).is_nan()
            );
            assert_eq!(
                number(call_global(ctx, env, "parseFloat", &[".5".into()])),
                0.5
            );
            assert!(
                number(call_global(ctx, env, "parseFloat", &["e10".into()])).is_nan()
            );
        });
    }

    #[test]
    fn escape_round_trip() {
        with_vm(6, |ctx, env, _root| {
            let escaped = call_global(ctx, env, "escape", &["a b&c/d".into()]);
            assert_eq!(escaped, Value::from("a%20b%26c%2Fd"));
            let back = call_global(ctx, env, "unescape", &[escaped]);
            assert_eq!(back, Value::from("a b&c/d"));
            // Decoding is case-insensitive.
            let lower = call_global(ctx, env, "unescape", &["a%2fb".into()]);
            assert_eq!(lower, Value::from("a/b"));
        });
    }

    #[test]
    fn is_nan_and_is_finite() {
        with_vm(6, |ctx, env, _root| {
            assert_eq!(
                call_global(ctx, env, "isNaN", &["Hello".into()]),
                Value::Bool(true)
            );
            assert_eq!(
                call_global(ctx, env, "isNaN", &["0x10".into()]),
                Value::Bool(false)
            );
            assert_eq!(
                call_global(ctx, env, "isFinite", &[Value::Number(1.0)]),
                Value::Bool(true)
            );
            assert_eq!(
                call_global(ctx, env, "isFinite", &[Value::Number(f64::INFINITY)]),
                Value::Bool(false)
            );
        });
    }

    #[test]
    fn as_set_prop_flags_hides_from_enumeration() {
        with_vm(7, |ctx, env, _root| {
            let o = ctx.alloc_object(None, 7);
            for name in ["a", "b", "c"] {
                object::set_member(ctx, env, o, name, Value::Number(1.0)).unwrap();
            }
            call_global(
                ctx,
                env,
                "ASSetPropFlags",
                &[
                    Value::Object(o),
                    "b".into(),
                    Value::Number(1.0),
                    Value::Number(0.0),
                ],
            );
            let keys: Vec<String> = object::get_keys(ctx, o)
                .iter()
                .map(|k| k.to_string())
                .collect();
            assert_eq!(keys, vec!["a", "c"]);
            assert!(object::has_own_property(ctx, o, "b"));
        });
    }

    #[test]
    fn watch_through_the_prototype() {
        with_vm(7, |ctx, env, _root| {
            // o.watch("n", function(prop, old, new, x) { return new * x; }, 10)
            let o = ctx.alloc_object(Some(ctx.prototypes.object), 7);
            let callback = ctx.alloc_native_function(|ctx, env, _this, args| {
                let new = args.get(2).cloned().unwrap_or(Value::Undefined);
                let extra = args.get(3).cloned().unwrap_or(Value::Undefined);
                Ok(Value::Number(
                    new.coerce_to_f64(ctx, env)? * extra.coerce_to_f64(ctx, env)?,
                ))
            });

            let watch = object::get_member(ctx, env, o, "watch")
                .unwrap()
                .unwrap();
            let result = watch
                .call(
                    ctx,
                    env,
                    Value::Object(o),
                    &["n".into(), Value::Function(callback), Value::Number(10.0)],
                )
                .unwrap();
            assert_eq!(result, Value::Bool(true));

            object::set_member(ctx, env, o, "n", Value::Number(5.0)).unwrap();
            assert_eq!(
                object::get_member(ctx, env, o, "n").unwrap(),
                Some(Value::Number(50.0))
            );

            let unwatch = object::get_member(ctx, env, o, "unwatch")
                .unwrap()
                .unwrap();
            let result = unwatch
                .call(ctx, env, Value::Object(o), &["n".into()])
                .unwrap();
            assert_eq!(result, Value::Bool(true));
            object::set_member(ctx, env, o, "n", Value::Number(7.0)).unwrap();
            assert_eq!(
                object::get_member(ctx, env, o, "n").unwrap(),
                Some(Value::Number(7.0))
            );
        });
    }

    #[test]
    fn call_and_apply() {
        with_vm(7, |ctx, env, _root| {
            fn sum_with_this(
                ctx: &mut VmContext,
                env: &mut Environment,
                this: Value,
                args: &[Value],
            ) -> Result<Value, Error> {
                let mut total = 0.0;
                if let Some(obj) = this.as_object_id() {
                    if let Some(base) = object::get_member(ctx, env, obj, "base")? {
                        total += base.coerce_to_f64(ctx, env)?;
                    }
                }
                for arg in args {
                    total += arg.coerce_to_f64(ctx, env)?;
                }
                Ok(Value::Number(total))
            }
            let func = ctx.alloc_native_function(sum_with_this);
            let receiver = ctx.alloc_object(None, 7);
            object::set_member(ctx, env, receiver, "base", Value::Number(100.0)).unwrap();

            let call = object::get_member(ctx, env, func, "call").unwrap().unwrap();
            let result = call
                .call(
                    ctx,
                    env,
                    Value::Function(func),
                    &[
                        Value::Object(receiver),
                        Value::Number(1.0),
                        Value::Number(2.0),
                    ],
                )
                .unwrap();
            assert_eq!(result, Value::Number(103.0));

            // apply unpacks an arguments array.
            let args_array = ctx.alloc_object(Some(ctx.prototypes.object), 7);
            object::set_member(ctx, env, args_array, "0", Value::Number(3.0)).unwrap();
            object::set_member(ctx, env, args_array, "1", Value::Number(4.0)).unwrap();
            object::set_member(ctx, env, args_array, "length", Value::Number(2.0)).unwrap();
            let apply = object::get_member(ctx, env, func, "apply")
                .unwrap()
                .unwrap();
            let result = apply
                .call(
                    ctx,
                    env,
                    Value::Function(func),
                    &[Value::Object(receiver), Value::Object(args_array)],
                )
                .unwrap();
            assert_eq!(result, Value::Number(107.0));
        });
    }

    #[test]
    fn object_constructor_allocates() {
        with_vm(7, |ctx, env, _root| {
            let ctor = env.get_variable(ctx, "Object", &[]).unwrap();
            let id = ctor.as_object_id().unwrap();
            let instance = function::construct(ctx, env, id, &[]).unwrap();
            let obj = instance.as_object_id().unwrap();
            assert!(object::instance_of(ctx, obj, id));
        });
    }
}
