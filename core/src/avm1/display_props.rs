//! The magic display properties (`_x`, `_alpha`, …).
//!
//! These short-circuit ordinary property lookup on any object bound to a
//! display node, and the first 22 are addressable by number through the
//! `GetProperty`/`SetProperty` opcodes, in the order fixed by the file
//! format. Their names match case-insensitively in every SWF version.

use crate::avm1::environment::Environment;
use crate::avm1::error::Error;
use crate::avm1::Value;
use crate::context::VmContext;
use crate::display_object::DisplayHandle;

pub type DisplayGetter = fn(&mut VmContext, &mut Environment, DisplayHandle) -> Value;
pub type DisplaySetter =
    fn(&mut VmContext, &mut Environment, DisplayHandle, Value) -> Result<(), Error>;

pub struct DisplayProperty {
    pub get: DisplayGetter,
    pub set: Option<DisplaySetter>,
}

/// Indexed order per the file format; named-only entries follow.
static PROPERTIES: [(&str, DisplayProperty); 24] = [
    ("_x", DisplayProperty { get: x, set: Some(set_x) }),
    ("_y", DisplayProperty { get: y, set: Some(set_y) }),
    ("_xscale", DisplayProperty { get: x_scale, set: Some(set_x_scale) }),
    ("_yscale", DisplayProperty { get: y_scale, set: Some(set_y_scale) }),
    ("_currentframe", DisplayProperty { get: current_frame, set: None }),
    ("_totalframes", DisplayProperty { get: total_frames, set: None }),
    ("_alpha", DisplayProperty { get: alpha, set: Some(set_alpha) }),
    ("_visible", DisplayProperty { get: visible, set: Some(set_visible) }),
    ("_width", DisplayProperty { get: width, set: Some(set_width) }),
    ("_height", DisplayProperty { get: height, set: Some(set_height) }),
    ("_rotation", DisplayProperty { get: rotation, set: Some(set_rotation) }),
    ("_target", DisplayProperty { get: target, set: None }),
    ("_framesloaded", DisplayProperty { get: frames_loaded, set: None }),
    ("_name", DisplayProperty { get: name, set: Some(set_name) }),
    ("_droptarget", DisplayProperty { get: drop_target, set: None }),
    ("_url", DisplayProperty { get: url, set: None }),
    ("_highquality", DisplayProperty { get: high_quality, set: Some(set_high_quality) }),
    ("_focusrect", DisplayProperty { get: focus_rect, set: Some(set_focus_rect) }),
    ("_soundbuftime", DisplayProperty { get: sound_buf_time, set: Some(set_sound_buf_time) }),
    ("_quality", DisplayProperty { get: quality, set: Some(set_quality) }),
    ("_xmouse", DisplayProperty { get: x_mouse, set: None }),
    ("_ymouse", DisplayProperty { get: y_mouse, set: None }),
    ("_parent", DisplayProperty { get: parent, set: None }),
    ("_lockroot", DisplayProperty { get: lock_root, set: Some(set_lock_root) }),
];

/// How many entries `GetProperty`/`SetProperty` may address.
const INDEXED_COUNT: usize = 22;

pub fn get_by_name(name: &str) -> Option<&'static DisplayProperty> {
    PROPERTIES
        .iter()
        .find(|(prop_name, _)| prop_name.eq_ignore_ascii_case(name))
        .map(|(_, prop)| prop)
}

pub fn get_by_index(index: usize) -> Option<&'static DisplayProperty> {
    if index < INDEXED_COUNT {
        Some(&PROPERTIES[index].1)
    } else {
        None
    }
}

/// These era-4 properties coerce assignments to number; a NaN result
/// leaves the property untouched.
fn property_coerce_to_number(
    ctx: &mut VmContext,
    env: &mut Environment,
    value: Value,
) -> Result<Option<f64>, Error> {
    if matches!(value, Value::Undefined | Value::Null) {
        return Ok(None);
    }
    let n = value.coerce_to_f64(ctx, env)?;
    if n.is_nan() {
        Ok(None)
    } else {
        Ok(Some(n))
    }
}

fn x(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.x(this).into()
}

fn set_x(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_x(this, n);
    }
    Ok(())
}

fn y(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.y(this).into()
}

fn set_y(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_y(this, n);
    }
    Ok(())
}

fn x_scale(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.x_scale(this).into()
}

fn set_x_scale(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_x_scale(this, n);
    }
    Ok(())
}

fn y_scale(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.y_scale(this).into()
}

fn set_y_scale(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_y_scale(this, n);
    }
    Ok(())
}

fn current_frame(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.current_frame(this).into()
}

fn total_frames(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.total_frames(this).into()
}

fn alpha(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.alpha(this).into()
}

fn set_alpha(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_alpha(this, n);
    }
    Ok(())
}

fn visible(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.visible(this).into()
}

fn set_visible(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    // Coerced to a number: `_visible = "false"` yields NaN and is a no-op.
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_visible(this, n != 0.0);
    }
    Ok(())
}

fn width(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.width(this).into()
}

fn set_width(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_width(this, n);
    }
    Ok(())
}

fn height(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.height(this).into()
}

fn set_height(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_height(this, n);
    }
    Ok(())
}

fn rotation(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.rotation(this).into()
}

fn set_rotation(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_rotation(this, n);
    }
    Ok(())
}

fn target(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    slash_path(&ctx.display.path(this)).into()
}

fn frames_loaded(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.frames_loaded(this).into()
}

fn name(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.name(this).into()
}

fn set_name(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    let name = value.coerce_to_string(ctx, env)?;
    ctx.display.set_name(this, &name);
    Ok(())
}

fn drop_target(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.drop_target(this).into()
}

fn url(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.url(this).into()
}

fn high_quality(ctx: &mut VmContext, _env: &mut Environment, _this: DisplayHandle) -> Value {
    let n = match ctx.display.quality() {
        "BEST" => 2.0,
        "LOW" => 0.0,
        _ => 1.0,
    };
    n.into()
}

fn set_high_quality(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        let quality = match n as i32 {
            0 => "LOW",
            2 => "BEST",
            _ => "HIGH",
        };
        ctx.display.set_quality(quality);
    }
    Ok(())
}

fn focus_rect(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.focus_rect(this).into()
}

fn set_focus_rect(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    let flag = value.as_bool(env.swf_version());
    ctx.display.set_focus_rect(this, flag);
    Ok(())
}

fn sound_buf_time(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.sound_buf_time(this).into()
}

fn set_sound_buf_time(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    if let Some(n) = property_coerce_to_number(ctx, env, value)? {
        ctx.display.set_sound_buf_time(this, n);
    }
    Ok(())
}

fn quality(ctx: &mut VmContext, _env: &mut Environment, _this: DisplayHandle) -> Value {
    ctx.display.quality().into()
}

fn set_quality(
    ctx: &mut VmContext,
    env: &mut Environment,
    _this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    let quality = value.coerce_to_string(ctx, env)?;
    ctx.display.set_quality(&quality);
    Ok(())
}

fn x_mouse(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.mouse_position(this).0.into()
}

fn y_mouse(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.mouse_position(this).1.into()
}

fn parent(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    match ctx.display.parent(this) {
        Some(parent) => ctx.clip_value(parent),
        None => Value::Undefined,
    }
}

fn lock_root(ctx: &mut VmContext, _env: &mut Environment, this: DisplayHandle) -> Value {
    ctx.display.lock_root(this).into()
}

fn set_lock_root(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: DisplayHandle,
    value: Value,
) -> Result<(), Error> {
    let flag = value.as_bool(env.swf_version());
    ctx.display.set_lock_root(this, flag);
    Ok(())
}

/// Convert a dot path (`_level0.a.b`) to the slash notation `_target`
/// reports (`/a/b`).
fn slash_path(dot_path: &str) -> String {
    let rest = dot_path
        .strip_prefix("_level0")
        .unwrap_or(dot_path)
        .trim_start_matches('.');
    if rest.is_empty() {
        "/".to_string()
    } else {
        let mut out = String::with_capacity(rest.len() + 1);
        out.push('/');
        out.push_str(&rest.replace('.', "/"));
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_match_case_insensitively() {
        assert!(get_by_name("_x").is_some());
        assert!(get_by_name("_X").is_some());
        assert!(get_by_name("_TOTALFRAMES").is_some());
        assert!(get_by_name("x").is_none());
    }

    #[test]
    fn index_table_covers_the_classic_range() {
        assert!(get_by_index(0).is_some());
        assert!(get_by_index(21).is_some());
        // Named-only entries are not index-addressable.
        assert!(get_by_index(22).is_none());
    }

    #[test]
    fn slash_paths() {
        assert_eq!(slash_path("_level0"), "/");
        assert_eq!(slash_path("_level0.a.b"), "/a/b");
    }
}
