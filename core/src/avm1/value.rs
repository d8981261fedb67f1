use crate::avm1::environment::Environment;
use crate::avm1::error::Error;
use crate::avm1::{function, object, ObjectId};
use crate::context::VmContext;
use crate::display_object::DisplayRef;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectId),
    Function(ObjectId),
    /// A soft reference to a display-graph node. Never compares equal to a
    /// plain object, even one the node currently resolves to.
    MovieClip(DisplayRef),
}

/// The probe order used by primitive conversion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl From<String> for Value {
    fn from(string: String) -> Self {
        Value::String(string.into())
    }
}

impl From<&str> for Value {
    fn from(string: &str) -> Self {
        Value::String(string.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(string: Rc<str>) -> Self {
        Value::String(string)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

/// Same-type equality without coercion. `NaN == NaN` holds and signed
/// zeroes compare equal (the language, not IEEE).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::MovieClip(a), Value::MovieClip(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Object(_) | Value::Function(_))
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) | Value::Function(id) => Some(*id),
            _ => None,
        }
    }

    /// The object behind this value, resolving a display reference to its
    /// scripted object. Primitives have no object form here (the boxing
    /// classes live with the host's class library).
    pub fn coerce_to_object(&self, ctx: &VmContext) -> Option<ObjectId> {
        match self {
            Value::Object(id) | Value::Function(id) => Some(*id),
            Value::MovieClip(clip) => clip
                .resolve(&*ctx.display)
                .and_then(|node| ctx.display.scripted_object(node)),
            _ => None,
        }
    }

    /// ECMA-262 ToNumber over a value already known to be primitive.
    pub fn primitive_to_number(&self, swf_version: u8) -> f64 {
        match self {
            Value::Undefined | Value::Null => {
                if swf_version >= 7 {
                    f64::NAN
                } else {
                    0.0
                }
            }
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s, swf_version),
            Value::MovieClip(_) => f64::NAN,
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// ECMA-262 ToNumber. May call `valueOf` on objects and re-enter the
    /// interpreter.
    pub fn coerce_to_f64(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<f64, Error> {
        match self {
            Value::Object(_) | Value::Function(_) => {
                match self.to_primitive(ctx, env, Some(Hint::Number)) {
                    Ok(prim) => Ok(prim.primitive_to_number(env.swf_version())),
                    // A function with no usable valueOf coerces to 0 before
                    // SWF 6, NaN afterwards.
                    Err(Error::Coercion) => {
                        if matches!(self, Value::Function(_)) && env.swf_version() < 6 {
                            Ok(0.0)
                        } else {
                            Ok(f64::NAN)
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            _ => Ok(self.primitive_to_number(env.swf_version())),
        }
    }

    pub fn coerce_to_i32(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<i32, Error> {
        Ok(f64_to_wrapping_i32(self.coerce_to_f64(ctx, env)?))
    }

    pub fn coerce_to_u32(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<u32, Error> {
        Ok(f64_to_wrapping_u32(self.coerce_to_f64(ctx, env)?))
    }

    pub fn coerce_to_u16(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<u16, Error> {
        Ok(f64_to_wrapping_u32(self.coerce_to_f64(ctx, env)?) as u16)
    }

    /// Stringify without calling into script. Objects report their
    /// placeholder text.
    pub fn into_string(&self, ctx: &VmContext, swf_version: u8) -> Rc<str> {
        match self {
            Value::Undefined => {
                if swf_version <= 6 {
                    "".into()
                } else {
                    "undefined".into()
                }
            }
            Value::Null => "null".into(),
            Value::Bool(true) => "true".into(),
            Value::Bool(false) => "false".into(),
            Value::Number(n) => f64_to_string(*n).into(),
            Value::String(s) => Rc::clone(s),
            Value::MovieClip(clip) => clip.target_path(&*ctx.display),
            Value::Object(_) => "[type Object]".into(),
            Value::Function(_) => "[type Function]".into(),
        }
    }

    /// ECMA-262 ToString. Objects are probed via `toString`; a probe that
    /// yields no string falls back to the placeholder text, which is what
    /// the reference player does even though ECMA says otherwise.
    pub fn coerce_to_string(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<Rc<str>, Error> {
        match self {
            Value::Object(_) | Value::Function(_) => {
                match self.to_primitive(ctx, env, Some(Hint::String)) {
                    Ok(Value::String(s)) => Ok(s),
                    Ok(_) | Err(Error::Coercion) => {
                        Ok(self.into_string(ctx, env.swf_version()))
                    }
                    Err(e) => Err(e),
                }
            }
            _ => Ok(self.into_string(ctx, env.swf_version())),
        }
    }

    /// ECMA-262 ToPrimitive with the reference player's hint rules: the
    /// default hint is Number, except `Date` instances prefer String from
    /// SWF 6 up. Probes must resolve to callables and must themselves
    /// return primitives, or the conversion fails.
    pub fn to_primitive(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
        hint: Option<Hint>,
    ) -> Result<Value, Error> {
        let id = match self {
            Value::Object(id) | Value::Function(id) => *id,
            Value::MovieClip(clip) => {
                return Ok(match hint {
                    Some(Hint::String) => {
                        Value::String(clip.target_path(&*ctx.display))
                    }
                    _ => Value::Number(f64::NAN),
                });
            }
            _ => return Ok(self.clone()),
        };

        let hint = hint.unwrap_or_else(|| {
            if env.swf_version() > 5 && object::has_date_relay(ctx, id) {
                Hint::String
            } else {
                Hint::Number
            }
        });

        let probes: [&str; 2] = match hint {
            Hint::Number => ["valueOf", "toString"],
            Hint::String => ["toString", "valueOf"],
        };

        let mut method = Value::Undefined;
        for probe in &probes {
            if let Some(candidate) = object::get_member(ctx, env, id, probe)? {
                if function::is_callable(ctx, &candidate) {
                    method = candidate;
                    break;
                }
            }
        }
        if !function::is_callable(ctx, &method) {
            return Err(Error::Coercion);
        }

        let result = method.call(ctx, env, self.clone(), &[])?;
        if result.is_primitive() {
            Ok(result)
        } else {
            Err(Error::Coercion)
        }
    }

    /// The three version-gated truthiness tables.
    pub fn as_bool(&self, swf_version: u8) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => {
                if swf_version == 6 {
                    n.is_finite() && *n != 0.0
                } else {
                    !n.is_nan() && *n != 0.0
                }
            }
            Value::String(s) => {
                if swf_version >= 7 {
                    !s.is_empty()
                } else {
                    match &**s {
                        "true" => true,
                        "false" => false,
                        _ => {
                            let n = string_to_number(s, swf_version);
                            !n.is_nan() && n != 0.0
                        }
                    }
                }
            }
            Value::Object(_) | Value::Function(_) | Value::MovieClip(_) => true,
            Value::Undefined | Value::Null => false,
        }
    }

    /// ECMA-262 11.9.3 abstract equality, with the reference player's
    /// deviations: `NaN == NaN`, functions compare as null before SWF 6,
    /// and display references only equal the identical node.
    pub fn abstract_eq(
        &self,
        other: &Value,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<bool, Error> {
        let version = env.swf_version();
        let self_nullish = self.is_nullish(version);
        let other_nullish = other.is_nullish(version);
        if self_nullish || other_nullish {
            return Ok(self_nullish == other_nullish);
        }

        // Identity for objects and functions.
        if let (Some(a), Some(b)) = (self.as_object_id(), other.as_object_id()) {
            return Ok(a == b);
        }

        match (self, other) {
            (Value::MovieClip(a), Value::MovieClip(b)) => {
                let a = a.resolve(&*ctx.display);
                let b = b.resolve(&*ctx.display);
                return Ok(a.is_some() && a == b);
            }
            (Value::MovieClip(clip), other_val) | (other_val, Value::MovieClip(clip)) => {
                if let Some(id) = other_val.as_object_id() {
                    let node_obj = clip
                        .resolve(&*ctx.display)
                        .and_then(|node| ctx.display.scripted_object(node));
                    return Ok(node_obj == Some(id));
                }
            }
            _ => {}
        }

        if self.same_type_as(other) {
            return Ok(self.equals_same_type(other, ctx));
        }

        match (self, other) {
            (Value::Number(a), Value::String(_)) => {
                let b = other.primitive_to_number(version);
                if !b.is_finite() {
                    return Ok(false);
                }
                Ok(Value::Number(*a).equals_same_type(&Value::Number(b), ctx))
            }
            (Value::String(_), Value::Number(b)) => {
                let a = self.primitive_to_number(version);
                if !a.is_finite() {
                    return Ok(false);
                }
                Ok(Value::Number(a).equals_same_type(&Value::Number(*b), ctx))
            }
            (Value::Bool(_), _) => Value::Number(self.primitive_to_number(version))
                .abstract_eq(other, ctx, env),
            (_, Value::Bool(_)) => {
                self.abstract_eq(&Value::Number(other.primitive_to_number(version)), ctx, env)
            }
            _ => {
                // One side is an object (or a display reference): convert
                // to primitives and recurse if any conversion made
                // progress.
                let p = match self.to_primitive(ctx, env, None) {
                    Ok(p) => p,
                    Err(Error::Coercion) => return Ok(false),
                    Err(e) => return Err(e),
                };
                let q = match other.to_primitive(ctx, env, None) {
                    Ok(q) => q,
                    Err(Error::Coercion) => return Ok(false),
                    Err(e) => return Err(e),
                };
                let progressed = !p.strict_equals(self, ctx) || !q.strict_equals(other, ctx);
                if progressed {
                    p.abstract_eq(&q, ctx, env)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// ECMA-262 11.8.5 abstract relational comparison. Yields `Undefined`
    /// when either side is NaN.
    pub fn abstract_lt(
        &self,
        other: &Value,
        ctx: &mut VmContext,
        env: &mut Environment,
    ) -> Result<Value, Error> {
        let version = env.swf_version();
        let prim_self = match self.to_primitive(ctx, env, Some(Hint::Number)) {
            Ok(v) => v,
            Err(Error::Coercion) => Value::Number(f64::NAN),
            Err(e) => return Err(e),
        };
        let prim_other = match other.to_primitive(ctx, env, Some(Hint::Number)) {
            Ok(v) => v,
            Err(Error::Coercion) => Value::Number(f64::NAN),
            Err(e) => return Err(e),
        };

        if let (Value::String(a), Value::String(b)) = (&prim_self, &prim_other) {
            return Ok(Value::Bool(a.as_bytes() < b.as_bytes()));
        }

        let a = prim_self.primitive_to_number(version);
        let b = prim_other.primitive_to_number(version);
        if a.is_nan() || b.is_nan() {
            return Ok(Value::Undefined);
        }
        Ok(Value::Bool(a < b))
    }

    /// Strict equality: same type, then same-type comparison (which keeps
    /// the `NaN === NaN` quirk).
    pub fn strict_equals(&self, other: &Value, ctx: &VmContext) -> bool {
        self.same_type_as(other) && self.equals_same_type(other, ctx)
    }

    fn same_type_as(&self, other: &Value) -> bool {
        use Value::*;
        matches!(
            (self, other),
            (Undefined, Undefined)
                | (Null, Null)
                | (Bool(_), Bool(_))
                | (Number(_), Number(_))
                | (String(_), String(_))
                | (Object(_), Object(_))
                | (Function(_), Function(_))
                | (MovieClip(_), MovieClip(_))
        )
    }

    fn equals_same_type(&self, other: &Value, ctx: &VmContext) -> bool {
        match (self, other) {
            (Value::MovieClip(a), Value::MovieClip(b)) => {
                let a = a.resolve(&*ctx.display);
                a.is_some() && a == b.resolve(&*ctx.display)
            }
            _ => self == other,
        }
    }

    fn is_nullish(&self, swf_version: u8) -> bool {
        match self {
            Value::Undefined | Value::Null => true,
            // Functions compare like null before SWF 6.
            Value::Function(_) => swf_version < 6,
            _ => false,
        }
    }

    /// The `typeof` operator.
    pub fn type_of(&self, ctx: &VmContext) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Function(id) => {
                if ctx.object(*id).is_super {
                    "object"
                } else {
                    "function"
                }
            }
            Value::MovieClip(clip) => match clip.resolve(&*ctx.display) {
                // Non-sprite characters report plain "object".
                Some(node) if !ctx.display.is_movie_clip(node) => "object",
                _ => "movieclip",
            },
        }
    }

    /// Invoke this value as a function.
    pub fn call(
        &self,
        ctx: &mut VmContext,
        env: &mut Environment,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Error> {
        match self.as_object_id() {
            Some(id) => function::call_object(ctx, env, id, this, args),
            None => {
                log_ascoding!("Tried to call a non-function value");
                Ok(Value::Undefined)
            }
        }
    }

    /// SWF 4 had no boolean values; comparisons pushed 1 or 0.
    pub fn from_bool(value: bool, swf_version: u8) -> Value {
        if swf_version >= 5 {
            Value::Bool(value)
        } else {
            Value::Number(if value { 1.0 } else { 0.0 })
        }
    }
}

/// ECMA-262 ToUint32: truncate, then wrap modulo 2³².
pub fn f64_to_wrapping_u32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc() % 4_294_967_296.0;
    if m < 0.0 {
        (m + 4_294_967_296.0) as u32
    } else {
        m as u32
    }
}

/// ECMA-262 ToInt32.
pub fn f64_to_wrapping_i32(n: f64) -> i32 {
    f64_to_wrapping_u32(n) as i32
}

/// String-to-number conversion used by ToNumber.
///
/// The whole (trimmed) string must be a decimal literal; there is no
/// longest-prefix parsing here (that's `parseFloat`). Hex literals are
/// recognized from SWF 5 up when the `0x` prefix is the very first
/// character, before any trimming, and parse as a wrapping 32-bit value,
/// which also covers `0xRRGGBB` color literals.
pub fn string_to_number(s: &str, swf_version: u8) -> f64 {
    let failure = if swf_version <= 4 { 0.0 } else { f64::NAN };

    if swf_version >= 5 && (s.starts_with("0x") || s.starts_with("0X")) {
        let digits = &s[2..];
        if digits.is_empty() {
            return failure;
        }
        let mut n: u32 = 0;
        for c in digits.bytes() {
            let digit = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => return f64::NAN,
            };
            n = n.wrapping_shl(4) | u32::from(digit);
        }
        return f64::from(n as i32);
    }

    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c'));
    if trimmed.is_empty() {
        return failure;
    }
    // Reject anything a decimal literal can't contain so that "Infinity",
    // "inf" and "NaN" (accepted by the Rust parser) fail like any other
    // word.
    if !trimmed
        .chars()
        .all(|c| matches!(c, '0'..='9' | '+' | '-' | '.' | 'e' | 'E'))
    {
        return failure;
    }
    trimmed.parse::<f64>().unwrap_or(failure)
}

/// Format a number the way the reference player prints it: up to 15
/// significant digits, fixed notation while the decimal exponent is
/// within [-6, 16], scientific outside with a bare exponent (no leading
/// zero).
pub fn f64_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-Infinity" } else { "Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let negative = value < 0.0;
    let magnitude = value.abs();

    // Round to 15 significant digits and split into digits + exponent.
    let sci = format!("{:.*e}", 14, magnitude);
    let mut parts = sci.splitn(2, 'e');
    let mantissa = parts.next().unwrap_or("0");
    let exp: i32 = parts.next().and_then(|e| e.parse().ok()).unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if (-6..=16).contains(&exp) {
        if exp >= 0 {
            let int_len = (exp + 1) as usize;
            if digits.len() > int_len {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            } else {
                out.push_str(digits);
                for _ in digits.len()..int_len {
                    out.push('0');
                }
            }
        } else {
            out.push_str("0.");
            for _ in 0..(-exp - 1) {
                out.push('0');
            }
            out.push_str(digits);
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        if exp >= 0 {
            out.push('+');
        }
        out.push_str(&exp.to_string());
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::with_vm;
    use pretty_assertions::assert_eq;

    #[test]
    fn number_formatting() {
        assert_eq!(f64_to_string(f64::NAN), "NaN");
        assert_eq!(f64_to_string(f64::INFINITY), "Infinity");
        assert_eq!(f64_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(f64_to_string(0.0), "0");
        assert_eq!(f64_to_string(-0.0), "0");
        assert_eq!(f64_to_string(1.0), "1");
        assert_eq!(f64_to_string(-3.5), "-3.5");
        assert_eq!(f64_to_string(0.1 + 0.2), "0.3");
        assert_eq!(f64_to_string(1e-5), "0.00001");
        assert_eq!(f64_to_string(1e-6), "0.000001");
        assert_eq!(f64_to_string(1e-7), "1e-7");
        assert_eq!(f64_to_string(1e16), "10000000000000000");
        assert_eq!(f64_to_string(1e17), "1e+17");
        assert_eq!(f64_to_string(1.23456789012345678), "1.23456789012346");
        assert_eq!(f64_to_string(255.0), "255");
    }

    #[test]
    fn string_to_number_tables() {
        // Hex from SWF 5 up; strict decimal otherwise.
        assert_eq!(string_to_number("0x10", 6), 16.0);
        assert_eq!(string_to_number("0x12", 6), 18.0);
        assert!(string_to_number("-0x10", 6).is_nan());
        assert!(string_to_number(" 0x12", 6).is_nan());
        assert!(string_to_number("0xhello", 6).is_nan());
        assert_eq!(string_to_number("0xFFFFFF", 6), 16_777_215.0);
        // Wrapping 64-bit hex collapses into an i32.
        assert_eq!(string_to_number("0x1999999981ffffff", 6), -2_113_929_217.0);

        assert_eq!(string_to_number(" 12", 6), 12.0);
        assert_eq!(string_to_number(" \t\r\n12", 6), 12.0);
        assert!(string_to_number("\u{A0}12", 6).is_nan());
        assert_eq!(string_to_number("123e-1", 6), 12.3);
        assert_eq!(string_to_number("01.2", 6), 1.2);
        assert_eq!(string_to_number("010", 6), 10.0);
        assert!(string_to_number("100a", 6).is_nan());
        assert!(string_to_number("Infinity", 6).is_nan());
        assert!(string_to_number("", 6).is_nan());
        assert!(string_to_number(" ", 6).is_nan());

        // SWF 4 turns failures into zero.
        assert_eq!(string_to_number("abc", 4), 0.0);
        assert_eq!(string_to_number("", 4), 0.0);
    }

    #[test]
    fn truthiness_tables() {
        // v5: infinities truthy.
        assert!(Value::Number(f64::INFINITY).as_bool(5));
        // v6: infinities falsy.
        assert!(!Value::Number(f64::INFINITY).as_bool(6));
        assert!(Value::Number(1.0).as_bool(6));
        assert!(!Value::Number(f64::NAN).as_bool(7));

        // Strings: parsed numerically before v7, emptiness after.
        assert!(Value::from("true").as_bool(6));
        assert!(!Value::from("false").as_bool(6));
        assert!(!Value::from("Hello").as_bool(6));
        assert!(Value::from("1").as_bool(6));
        assert!(Value::from("Hello").as_bool(7));
        assert!(!Value::from("").as_bool(7));
        assert!(!Value::Undefined.as_bool(7));
        assert!(!Value::Null.as_bool(7));
    }

    #[test]
    fn wrapping_int_coercions() {
        assert_eq!(f64_to_wrapping_i32(0.0), 0);
        assert_eq!(f64_to_wrapping_i32(2.7), 2);
        assert_eq!(f64_to_wrapping_i32(-2.7), -2);
        assert_eq!(f64_to_wrapping_i32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(f64_to_wrapping_i32(f64::NAN), 0);
        assert_eq!(f64_to_wrapping_i32(f64::INFINITY), 0);
        assert_eq!(f64_to_wrapping_u32(-1.0), 4_294_967_295);
    }

    #[test]
    fn nullish_equality() {
        with_vm(7, |ctx, env, _root| {
            assert!(Value::Undefined
                .abstract_eq(&Value::Null, ctx, env)
                .unwrap());
            assert!(Value::Null
                .abstract_eq(&Value::Undefined, ctx, env)
                .unwrap());
            assert!(!Value::Null
                .abstract_eq(&Value::Number(0.0), ctx, env)
                .unwrap());
        });
    }

    #[test]
    fn nan_equals_nan() {
        with_vm(7, |ctx, env, _root| {
            let nan = Value::Number(f64::NAN);
            assert!(nan.abstract_eq(&nan, ctx, env).unwrap());
            assert!(nan.strict_equals(&nan, ctx));
            let zero = Value::Number(0.0);
            let neg_zero = Value::Number(-0.0);
            assert!(zero.abstract_eq(&neg_zero, ctx, env).unwrap());
        });
    }

    #[test]
    fn number_string_equality() {
        with_vm(7, |ctx, env, _root| {
            assert!(Value::Number(16.0)
                .abstract_eq(&Value::from("16"), ctx, env)
                .unwrap());
            assert!(!Value::Number(16.0)
                .abstract_eq(&Value::from("noise"), ctx, env)
                .unwrap());
            assert!(Value::Bool(true)
                .abstract_eq(&Value::Number(1.0), ctx, env)
                .unwrap());
        });
    }

    #[test]
    fn functions_compare_as_null_before_swf6() {
        with_vm(5, |ctx, env, _root| {
            let func = crate::avm1::test_utils::dummy_function(ctx);
            assert!(Value::Function(func)
                .abstract_eq(&Value::Null, ctx, env)
                .unwrap());
            assert!(Value::Function(func)
                .abstract_eq(&Value::Undefined, ctx, env)
                .unwrap());
        });
        with_vm(6, |ctx, env, _root| {
            let func = crate::avm1::test_utils::dummy_function(ctx);
            assert!(!Value::Function(func)
                .abstract_eq(&Value::Null, ctx, env)
                .unwrap());
        });
    }

    #[test]
    fn abstract_lt_numbers() {
        with_vm(8, |ctx, env, _root| {
            let a = Value::Number(1.0);
            let b = Value::Number(2.0);
            assert_eq!(a.abstract_lt(&b, ctx, env).unwrap(), Value::Bool(true));
            assert_eq!(b.abstract_lt(&a, ctx, env).unwrap(), Value::Bool(false));
            assert_eq!(
                a.abstract_lt(&Value::Number(f64::NAN), ctx, env).unwrap(),
                Value::Undefined
            );
            assert_eq!(
                a.abstract_lt(&Value::Number(f64::INFINITY), ctx, env)
                    .unwrap(),
                Value::Bool(true)
            );
        });
    }

    #[test]
    fn abstract_lt_strings() {
        with_vm(8, |ctx, env, _root| {
            let a = Value::from("a");
            let b = Value::from("b");
            assert_eq!(a.abstract_lt(&b, ctx, env).unwrap(), Value::Bool(true));
            assert_eq!(b.abstract_lt(&a, ctx, env).unwrap(), Value::Bool(false));
        });
    }

    #[test]
    fn undefined_stringifies_by_version() {
        with_vm(6, |ctx, env, _root| {
            assert_eq!(
                &*Value::Undefined.coerce_to_string(ctx, env).unwrap(),
                ""
            );
        });
        with_vm(7, |ctx, env, _root| {
            assert_eq!(
                &*Value::Undefined.coerce_to_string(ctx, env).unwrap(),
                "undefined"
            );
        });
    }

    #[test]
    fn null_undefined_to_number_by_version() {
        with_vm(6, |ctx, env, _root| {
            assert_eq!(Value::Null.coerce_to_f64(ctx, env).unwrap(), 0.0);
            assert_eq!(Value::Undefined.coerce_to_f64(ctx, env).unwrap(), 0.0);
        });
        with_vm(7, |ctx, env, _root| {
            assert!(Value::Null.coerce_to_f64(ctx, env).unwrap().is_nan());
            assert!(Value::Undefined.coerce_to_f64(ctx, env).unwrap().is_nan());
        });
    }
}
