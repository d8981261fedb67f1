//! Script objects: bags of properties with a prototype link, stored in
//! the context's arena and addressed by index.

use crate::avm1::environment::Environment;
use crate::avm1::error::Error;
use crate::avm1::function::{self, Executable};
use crate::avm1::property::{Attribute, Property, Trigger};
use crate::avm1::property_map::PropertyMap;
use crate::avm1::{display_props, is_case_sensitive, Value};
use crate::context::VmContext;
use crate::display_object::DisplayHandle;
use crate::string_table::{NameId, ObjectUri};
use downcast_rs::{impl_downcast, Downcast};
use fnv::{FnvHashMap, FnvHashSet};
use std::rc::Rc;

pub type ObjectId = generational_arena::Index;

/// Opaque native state attached to an object so host-provided classes
/// (Date, Sound, XML, …) can recover their private data. Invisible to
/// ActionScript.
pub trait Relay: Downcast {
    fn relay_type(&self) -> &'static str;

    /// Report any object ids held inside the relay to the collector.
    fn trace(&self, _visitor: &mut dyn FnMut(ObjectId)) {}
}
impl_downcast!(Relay);

pub struct ObjectData {
    pub properties: PropertyMap,
    pub proto: Option<ObjectId>,
    pub constructor: Option<ObjectId>,
    pub interfaces: Vec<ObjectId>,
    pub relay: Option<Box<dyn Relay>>,
    pub executable: Option<Executable>,
    pub display: Option<DisplayHandle>,
    pub triggers: FnvHashMap<NameId, Trigger>,
    /// The SWF version this object was declared under. Decides whether
    /// its member names fold case, whoever the caller is.
    pub swf_version: u8,
    pub is_super: bool,
}

impl ObjectData {
    pub fn bare(swf_version: u8) -> Self {
        Self {
            properties: PropertyMap::new(),
            proto: None,
            constructor: None,
            interfaces: Vec::new(),
            relay: None,
            executable: None,
            display: None,
            triggers: FnvHashMap::default(),
            swf_version,
            is_super: false,
        }
    }

    pub fn with_proto(proto: Option<ObjectId>, swf_version: u8) -> Self {
        Self {
            proto,
            ..Self::bare(swf_version)
        }
    }

    pub fn folds_names(&self) -> bool {
        !is_case_sensitive(self.swf_version)
    }
}

/// Wrap an id in the right value variant for what the object is.
pub fn object_value(ctx: &VmContext, id: ObjectId) -> Value {
    if ctx.object(id).executable.is_some() {
        Value::Function(id)
    } else {
        Value::Object(id)
    }
}

pub fn has_date_relay(ctx: &VmContext, id: ObjectId) -> bool {
    ctx.object(id)
        .relay
        .as_ref()
        .map(|r| r.relay_type() == "Date")
        .unwrap_or(false)
}

/// Find a name's id under an object's folding rules without interning.
fn find_uri(ctx: &VmContext, obj: ObjectId, name: &str) -> Option<ObjectUri> {
    let fold = ctx.object(obj).folds_names();
    ctx.strings.find(name, fold).map(ObjectUri::new)
}

/// Intern a name under an object's folding rules.
fn intern_uri(ctx: &mut VmContext, obj: ObjectId, name: &str) -> ObjectUri {
    let fold = ctx.object(obj).folds_names();
    ObjectUri::new(ctx.strings.intern(name, fold))
}

/// Walk the prototype chain looking for `name`, keeping a visited set so
/// `__proto__` cycles terminate. Returns the owning object and a copy of
/// the property.
fn search_chain(
    ctx: &VmContext,
    start: ObjectId,
    name: &str,
    caller_version: u8,
    virtual_only: bool,
) -> Option<(ObjectId, Property)> {
    let mut visited = FnvHashSet::default();
    let mut current = Some(start);
    while let Some(id) = current {
        if !visited.insert(id) {
            log_ascoding!("Circular prototype chain detected while resolving {:?}", name);
            return None;
        }
        let data = ctx.object(id);
        if let Some(uri) = find_uri(ctx, id, name) {
            if let Some(prop) = data.properties.get(uri) {
                if prop.attributes().allows_swf_version(caller_version)
                    && (!virtual_only || prop.is_virtual())
                {
                    return Some((id, prop.clone()));
                }
            }
        }
        current = data.proto;
    }
    None
}

/// Read a member. Walks magic display properties, then the prototype
/// chain; getters run with `this` bound to the lookup origin. `None`
/// means the name is nowhere on the object.
pub fn get_member(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: ObjectId,
    name: &str,
) -> Result<Option<Value>, Error> {
    if let Some(node) = ctx.object(this).display {
        if name == "_root" {
            let root = ctx.display.root();
            return Ok(Some(ctx.clip_value(root)));
        }
        if name == "_global" && env.swf_version() >= 6 {
            let globals = ctx.globals;
            return Ok(Some(object_value(ctx, globals)));
        }
        if let Some(prop) = display_props::get_by_name(name) {
            return Ok(Some((prop.get)(ctx, env, node)));
        }
    }

    if name == "__proto__" {
        return Ok(Some(match ctx.object(this).proto {
            Some(proto) => object_value(ctx, proto),
            None => Value::Undefined,
        }));
    }

    if let Some((_owner, prop)) = search_chain(ctx, this, name, env.swf_version(), false) {
        if let Some(getter) = prop.getter() {
            let receiver = object_value(ctx, this);
            let result = function::call_object(ctx, env, getter, receiver, &[])?;
            return Ok(Some(result));
        }
        return Ok(Some(prop.data()));
    }

    // Named children of the bound display node come after real members.
    if let Some(node) = ctx.object(this).display {
        let case_sensitive = is_case_sensitive(env.swf_version());
        if let Some(child) = ctx.display.child_by_name(node, name, case_sensitive) {
            return Ok(Some(ctx.clip_value(child)));
        }
    }

    Ok(None)
}

/// Write a member. The inheritance chain is searched only for a virtual
/// property; otherwise the write lands on `this` itself. Watch triggers
/// transform the value before it is stored.
pub fn set_member(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: ObjectId,
    name: &str,
    value: Value,
) -> Result<(), Error> {
    if let Some(node) = ctx.object(this).display {
        if let Some(prop) = display_props::get_by_name(name) {
            return match prop.set {
                Some(setter) => setter(ctx, env, node, value),
                None => Ok(()),
            };
        }
    }

    if name == "__proto__" {
        let proto = value.coerce_to_object(ctx);
        ctx.object_mut(this).proto = proto;
        return Ok(());
    }

    let uri = intern_uri(ctx, this, name);
    let value = apply_triggers(ctx, env, this, uri.name, name, value)?;

    if let Some((_owner, prop)) = search_chain(ctx, this, name, env.swf_version(), true) {
        if !prop.is_overwritable() {
            log_ascoding!("Attempt to set read-only property {:?}", name);
            return Ok(());
        }
        // A getter with no setter swallows the write.
        if let Some(setter) = prop.setter() {
            let receiver = object_value(ctx, this);
            function::call_object(ctx, env, setter, receiver, &[value])?;
        }
        return Ok(());
    }

    let data = ctx.object_mut(this);
    match data.properties.get_mut(uri) {
        Some(prop) => {
            if !prop.set_data(value) {
                log_ascoding!("Attempt to set read-only property {:?}", name);
            }
        }
        None => {
            data.properties
                .insert(uri, Property::new_stored(value, Attribute::empty()));
        }
    }
    Ok(())
}

/// Delete an own property. Returns `(found, deleted)`.
pub fn delete_member(ctx: &mut VmContext, this: ObjectId, name: &str) -> (bool, bool) {
    let uri = match find_uri(ctx, this, name) {
        Some(uri) => uri,
        None => return (false, false),
    };
    let data = ctx.object_mut(this);
    match data.properties.get(uri) {
        Some(prop) => {
            if prop.can_delete() && !prop.is_protected() {
                data.properties.remove(uri);
                (true, true)
            } else {
                (true, false)
            }
        }
        None => (false, false),
    }
}

/// Built-in registration: store a value directly on the object with the
/// given flags, skipping the inheritance walk and any triggers.
pub fn define_value(
    ctx: &mut VmContext,
    this: ObjectId,
    name: &str,
    value: Value,
    attributes: Attribute,
) {
    let uri = intern_uri(ctx, this, name);
    ctx.object_mut(this)
        .properties
        .insert(uri, Property::new_stored(value, attributes));
}

/// Attach a getter/setter pair under the given name.
pub fn add_property(
    ctx: &mut VmContext,
    this: ObjectId,
    name: &str,
    getter: ObjectId,
    setter: Option<ObjectId>,
    attributes: Attribute,
) {
    let uri = intern_uri(ctx, this, name);
    ctx.object_mut(this)
        .properties
        .insert(uri, Property::new_virtual(getter, setter, attributes));
}

pub fn has_own_property(ctx: &VmContext, this: ObjectId, name: &str) -> bool {
    find_uri(ctx, this, name)
        .map(|uri| ctx.object(this).properties.contains_key(uri))
        .unwrap_or(false)
}

pub fn has_property(
    ctx: &VmContext,
    this: ObjectId,
    name: &str,
    caller_version: u8,
) -> bool {
    if ctx.object(this).display.is_some() && display_props::get_by_name(name).is_some() {
        return true;
    }
    search_chain(ctx, this, name, caller_version, false).is_some()
}

/// Read a stored slot along the chain without invoking getters. Used
/// where script re-entry would be wrong, like `instanceof` reading
/// `prototype`.
pub fn get_stored(ctx: &VmContext, this: ObjectId, name: &str) -> Option<Value> {
    search_chain(ctx, this, name, ctx.player_version, false)
        .map(|(_, prop)| prop.data())
}

/// Enumerable own-and-inherited keys, insertion-ordered per object,
/// shadowed names reported once.
pub fn get_keys(ctx: &VmContext, this: ObjectId) -> Vec<Rc<str>> {
    let mut visited = FnvHashSet::default();
    let mut seen_names = FnvHashSet::default();
    let mut keys = Vec::new();
    let mut current = Some(this);
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let data = ctx.object(id);
        for (uri, prop) in data.properties.iter() {
            if prop.is_enumerable() && seen_names.insert(uri.name) {
                keys.push(ctx.strings.value_rc(uri.name));
            } else if !prop.is_enumerable() {
                seen_names.insert(uri.name);
            }
        }
        current = data.proto;
    }
    keys
}

/// The `instanceof` walk: does `ctor`'s `prototype` appear on `this`'s
/// prototype chain (or among the declared interfaces)?
pub fn instance_of(ctx: &VmContext, this: ObjectId, ctor: ObjectId) -> bool {
    let target_proto = match get_stored(ctx, ctor, "prototype").and_then(|v| v.as_object_id()) {
        Some(id) => id,
        None => return false,
    };
    let mut visited = FnvHashSet::default();
    let mut current = ctx.object(this).proto;
    while let Some(id) = current {
        if !visited.insert(id) {
            log_ascoding!("Circular inheritance chain detected during instanceOf");
            return false;
        }
        if id == target_proto {
            return true;
        }
        if ctx.object(id).interfaces.contains(&target_proto) {
            return true;
        }
        current = ctx.object(id).proto;
    }
    false
}

/// `ASSetPropFlags`: flip attribute bits on a set of properties.
/// `set_false` is applied before `set_true`; only script-settable bits
/// are honored, and protected properties are never touched.
pub fn set_prop_flags(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: ObjectId,
    props: &Value,
    set_true: u16,
    set_false: u16,
) -> Result<(), Error> {
    let mask = Attribute::script_settable();
    let set_true = Attribute::from_bits_truncate(set_true) & mask;
    let set_false = Attribute::from_bits_truncate(set_false) & mask;

    match props {
        Value::Null | Value::Undefined => {
            set_flags_all(ctx, this, set_true, set_false);
            // Applied once to the direct prototype, no deeper.
            if let Some(proto) = ctx.object(this).proto {
                set_flags_all(ctx, proto, set_true, set_false);
            }
        }
        Value::String(list) => {
            let list = Rc::clone(list);
            for name in list.split(',') {
                set_flags_one(ctx, this, name, set_true, set_false);
            }
        }
        _ => {
            if let Some(list) = props.coerce_to_object(ctx) {
                let names: Vec<Value> = {
                    let data = ctx.object(list);
                    data.properties
                        .iter()
                        .filter(|(_, p)| p.is_enumerable())
                        .map(|(_, p)| p.data())
                        .collect()
                };
                for name in names {
                    let name = name.coerce_to_string(ctx, env)?;
                    set_flags_one(ctx, this, &name, set_true, set_false);
                }
            }
        }
    }
    Ok(())
}

fn set_flags_all(ctx: &mut VmContext, this: ObjectId, set_true: Attribute, set_false: Attribute) {
    for (_, prop) in ctx.object_mut(this).properties.iter_mut() {
        if prop.is_protected() {
            continue;
        }
        let flags = (prop.attributes() - set_false) | set_true;
        prop.set_attributes(flags);
    }
}

fn set_flags_one(
    ctx: &mut VmContext,
    this: ObjectId,
    name: &str,
    set_true: Attribute,
    set_false: Attribute,
) -> bool {
    let uri = match find_uri(ctx, this, name) {
        Some(uri) => uri,
        None => return false,
    };
    match ctx.object_mut(this).properties.get_mut(uri) {
        Some(prop) if !prop.is_protected() => {
            let flags = (prop.attributes() - set_false) | set_true;
            prop.set_attributes(flags);
            true
        }
        _ => false,
    }
}

/// Register a watch trigger, replacing any existing one for the name.
pub fn watch(
    ctx: &mut VmContext,
    this: ObjectId,
    name: Rc<str>,
    callback: ObjectId,
    extra: Value,
) {
    let uri = intern_uri(ctx, this, &name);
    ctx.object_mut(this)
        .triggers
        .insert(uri.name, Trigger::new(name, callback, extra));
}

/// Remove a watch trigger. Removal during the trigger's own invocation is
/// deferred until it returns.
pub fn unwatch(ctx: &mut VmContext, this: ObjectId, name: &str) -> bool {
    let uri = match find_uri(ctx, this, name) {
        Some(uri) => uri,
        None => return false,
    };
    let data = ctx.object_mut(this);
    match data.triggers.get_mut(&uri.name) {
        Some(trigger) if trigger.dead => false,
        Some(trigger) if trigger.executing => {
            trigger.dead = true;
            true
        }
        Some(_) => {
            data.triggers.remove(&uri.name);
            true
        }
        None => false,
    }
}

/// Fire the watch trigger for a property, if one is armed. Returns the
/// value to actually store.
fn apply_triggers(
    ctx: &mut VmContext,
    env: &mut Environment,
    this: ObjectId,
    name_id: NameId,
    name: &str,
    new_value: Value,
) -> Result<Value, Error> {
    let (callback, extra) = match ctx.object_mut(this).triggers.get_mut(&name_id) {
        Some(trigger) if !trigger.dead && !trigger.executing => {
            trigger.executing = true;
            (trigger.callback, trigger.extra.clone())
        }
        _ => return Ok(new_value),
    };

    let old_value = find_uri(ctx, this, name)
        .and_then(|uri| ctx.object(this).properties.get(uri).map(|p| p.data()))
        .unwrap_or(Value::Undefined);

    let receiver = object_value(ctx, this);
    let args = [
        Value::String(name.into()),
        old_value,
        new_value.clone(),
        extra,
    ];
    let result = function::call_object(ctx, env, callback, receiver, &args);

    let data = ctx.object_mut(this);
    if let Some(trigger) = data.triggers.get_mut(&name_id) {
        trigger.executing = false;
        if trigger.dead {
            data.triggers.remove(&name_id);
        }
    }

    result
}

/// Report every object id reachable from this record to the collector.
pub fn trace_object(data: &ObjectData, mark: &mut dyn FnMut(ObjectId)) {
    for (_, prop) in data.properties.iter() {
        trace_value(&prop.data(), mark);
        if let Some(getter) = prop.getter() {
            mark(getter);
        }
        if let Some(setter) = prop.setter() {
            mark(setter);
        }
    }
    if let Some(proto) = data.proto {
        mark(proto);
    }
    if let Some(ctor) = data.constructor {
        mark(ctor);
    }
    for iface in &data.interfaces {
        mark(*iface);
    }
    for trigger in data.triggers.values() {
        mark(trigger.callback);
        trace_value(&trigger.extra, mark);
    }
    if let Some(relay) = &data.relay {
        relay.trace(mark);
    }
    if let Some(executable) = &data.executable {
        executable.trace(mark);
    }
}

pub fn trace_value(value: &Value, mark: &mut dyn FnMut(ObjectId)) {
    if let Some(id) = value.as_object_id() {
        mark(id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::with_vm;

    #[test]
    fn own_properties_read_back() {
        with_vm(7, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 7);
            set_member(ctx, env, obj, "a", Value::Number(3.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, obj, "a").unwrap(),
                Some(Value::Number(3.0))
            );
            assert_eq!(get_member(ctx, env, obj, "b").unwrap(), None);
        });
    }

    #[test]
    fn prototype_chain_lookup() {
        with_vm(7, |ctx, env, _root| {
            let proto = ctx.alloc_object(None, 7);
            define_value(ctx, proto, "shared", Value::Number(9.0), Attribute::empty());
            let obj = ctx.alloc_object(Some(proto), 7);
            assert_eq!(
                get_member(ctx, env, obj, "shared").unwrap(),
                Some(Value::Number(9.0))
            );
            // Writes shadow instead of touching the prototype.
            set_member(ctx, env, obj, "shared", Value::Number(1.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, proto, "shared").unwrap(),
                Some(Value::Number(9.0))
            );
            assert_eq!(
                get_member(ctx, env, obj, "shared").unwrap(),
                Some(Value::Number(1.0))
            );
        });
    }

    #[test]
    fn proto_cycles_terminate() {
        with_vm(7, |ctx, env, _root| {
            let a = ctx.alloc_object(None, 7);
            let b = ctx.alloc_object(Some(a), 7);
            ctx.object_mut(a).proto = Some(b);
            assert_eq!(get_member(ctx, env, a, "missing").unwrap(), None);
        });
    }

    #[test]
    fn case_folding_follows_declaring_version() {
        with_vm(6, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 6);
            set_member(ctx, env, obj, "foo", Value::Number(1.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, obj, "FOO").unwrap(),
                Some(Value::Number(1.0))
            );
        });
        with_vm(7, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 7);
            set_member(ctx, env, obj, "foo", Value::Number(1.0)).unwrap();
            assert_eq!(get_member(ctx, env, obj, "FOO").unwrap(), None);
        });
    }

    #[test]
    fn delete_respects_dont_delete() {
        with_vm(7, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 7);
            define_value(ctx, obj, "a", Value::Number(1.0), Attribute::DONT_DELETE);
            set_member(ctx, env, obj, "b", Value::Number(2.0)).unwrap();
            assert_eq!(delete_member(ctx, obj, "a"), (true, false));
            assert_eq!(delete_member(ctx, obj, "b"), (true, true));
            assert_eq!(delete_member(ctx, obj, "missing"), (false, false));
        });
    }

    #[test]
    fn read_only_blocks_owner_but_not_shadow() {
        with_vm(7, |ctx, env, _root| {
            let proto = ctx.alloc_object(None, 7);
            define_value(ctx, proto, "k", Value::Number(1.0), Attribute::READ_ONLY);
            set_member(ctx, env, proto, "k", Value::Number(5.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, proto, "k").unwrap(),
                Some(Value::Number(1.0))
            );
            // A descendant may still shadow it.
            let obj = ctx.alloc_object(Some(proto), 7);
            set_member(ctx, env, obj, "k", Value::Number(5.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, obj, "k").unwrap(),
                Some(Value::Number(5.0))
            );
        });
    }

    #[test]
    fn enumeration_order_and_hiding() {
        with_vm(7, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 7);
            for name in ["a", "b", "c"] {
                set_member(ctx, env, obj, name, Value::Number(1.0)).unwrap();
            }
            set_prop_flags(
                ctx,
                env,
                obj,
                &Value::from("b"),
                Attribute::DONT_ENUM.bits(),
                0,
            )
            .unwrap();
            let keys: Vec<String> = get_keys(ctx, obj).iter().map(|k| k.to_string()).collect();
            assert_eq!(keys, vec!["a", "c"]);
            // Hidden is not gone.
            assert!(has_own_property(ctx, obj, "b"));
        });
    }

    #[test]
    fn prop_flag_monotonicity() {
        with_vm(7, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 7);
            set_member(ctx, env, obj, "p", Value::Number(1.0)).unwrap();
            let read = |ctx: &VmContext| {
                let uri = find_uri(ctx, obj, "p").unwrap();
                ctx.object(obj).properties.get(uri).unwrap().attributes()
            };
            // setFalse = 0 can only add bits.
            set_prop_flags(ctx, env, obj, &Value::from("p"), 0b111, 0).unwrap();
            assert!(read(ctx).contains(Attribute::READ_ONLY | Attribute::DONT_DELETE));
            // setTrue = 0 can only remove them.
            set_prop_flags(ctx, env, obj, &Value::from("p"), 0, 0b010).unwrap();
            let flags = read(ctx);
            assert!(!flags.contains(Attribute::DONT_DELETE));
            assert!(flags.contains(Attribute::READ_ONLY));
        });
    }

    #[test]
    fn watch_transforms_stored_values() {
        with_vm(7, |ctx, env, _root| {
            let obj = ctx.alloc_object(None, 7);
            // Trigger multiplies the incoming value by its extra argument.
            let callback = ctx.alloc_native_function(|ctx, env, _this, args| {
                let new = args.get(2).cloned().unwrap_or(Value::Undefined);
                let extra = args.get(3).cloned().unwrap_or(Value::Undefined);
                Ok(Value::Number(
                    new.coerce_to_f64(ctx, env)? * extra.coerce_to_f64(ctx, env)?,
                ))
            });
            watch(ctx, obj, "n".into(), callback, Value::Number(10.0));

            set_member(ctx, env, obj, "n", Value::Number(5.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, obj, "n").unwrap(),
                Some(Value::Number(50.0))
            );
            set_member(ctx, env, obj, "n", Value::Number(3.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, obj, "n").unwrap(),
                Some(Value::Number(30.0))
            );

            assert!(unwatch(ctx, obj, "n"));
            set_member(ctx, env, obj, "n", Value::Number(7.0)).unwrap();
            assert_eq!(
                get_member(ctx, env, obj, "n").unwrap(),
                Some(Value::Number(7.0))
            );
            assert!(!unwatch(ctx, obj, "n"));
        });
    }

    #[test]
    fn instance_of_walks_prototypes() {
        with_vm(7, |ctx, env, _root| {
            let ctor_a = crate::avm1::test_utils::dummy_function(ctx);
            let proto_a = ctx.alloc_object(None, 7);
            define_value(
                ctx,
                ctor_a,
                "prototype",
                Value::Object(proto_a),
                Attribute::DONT_ENUM,
            );
            let instance = ctx.alloc_object(Some(proto_a), 7);
            assert!(instance_of(ctx, instance, ctor_a));

            let unrelated = crate::avm1::test_utils::dummy_function(ctx);
            let proto_b = ctx.alloc_object(None, 7);
            define_value(
                ctx,
                unrelated,
                "prototype",
                Value::Object(proto_b),
                Attribute::DONT_ENUM,
            );
            assert!(!instance_of(ctx, instance, unrelated));
            let _ = env;
        });
    }
}
