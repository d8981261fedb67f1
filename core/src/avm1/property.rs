//! Object properties and their attributes.

use crate::avm1::{ObjectId, Value};
use bitflags::bitflags;
use std::rc::Rc;

bitflags! {
    /// Attributes of properties in the AVM runtime.
    /// The low three bit values are significant: they are the mask
    /// ActionScript manipulates through `ASSetPropFlags`.
    pub struct Attribute: u16 {
        const DONT_ENUM    = 1 << 0;
        const DONT_DELETE  = 1 << 1;
        const READ_ONLY    = 1 << 2;
        /// ActionScript can neither observe nor change this property's
        /// flags.
        const PROTECTED    = 1 << 3;
        const ONLY_SWF6_UP = 1 << 4;
        const IGNORE_SWF6  = 1 << 5;
        const ONLY_SWF7_UP = 1 << 6;
        const ONLY_SWF8_UP = 1 << 7;
    }
}

impl Attribute {
    /// The bits `ASSetPropFlags` is allowed to touch.
    pub fn script_settable() -> Attribute {
        Attribute::all() - Attribute::PROTECTED
    }

    /// Whether a property carrying these attributes is visible to the
    /// given SWF version.
    pub fn allows_swf_version(self, swf_version: u8) -> bool {
        if self.contains(Attribute::ONLY_SWF6_UP) && swf_version < 6 {
            return false;
        }
        if self.contains(Attribute::IGNORE_SWF6) && swf_version == 6 {
            return false;
        }
        if self.contains(Attribute::ONLY_SWF7_UP) && swf_version < 7 {
            return false;
        }
        if self.contains(Attribute::ONLY_SWF8_UP) && swf_version < 8 {
            return false;
        }
        true
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Attribute::empty()
    }
}

/// One member of an object: either a stored value or a virtual
/// getter/setter pair.
#[derive(Clone, Debug)]
pub struct Property {
    data: Value,
    getter: Option<ObjectId>,
    setter: Option<ObjectId>,
    attributes: Attribute,
}

impl Property {
    pub fn new_stored(data: Value, attributes: Attribute) -> Self {
        Self {
            data,
            getter: None,
            setter: None,
            attributes,
        }
    }

    pub fn new_virtual(
        getter: ObjectId,
        setter: Option<ObjectId>,
        attributes: Attribute,
    ) -> Self {
        Self {
            data: Value::Undefined,
            getter: Some(getter),
            setter,
            attributes,
        }
    }

    pub fn data(&self) -> Value {
        self.data.clone()
    }

    pub fn getter(&self) -> Option<ObjectId> {
        self.getter
    }

    pub fn setter(&self) -> Option<ObjectId> {
        self.setter
    }

    /// Store data directly, ignoring any virtual setter. Read-only
    /// properties are left untouched.
    pub fn set_data(&mut self, data: Value) -> bool {
        if !self.is_overwritable() {
            return false;
        }
        self.data = data;
        true
    }

    /// Make this property virtual by attaching a getter/setter.
    pub fn set_virtual(&mut self, getter: ObjectId, setter: Option<ObjectId>) {
        self.getter = Some(getter);
        self.setter = setter;
    }

    pub fn attributes(&self) -> Attribute {
        self.attributes
    }

    pub fn set_attributes(&mut self, attributes: Attribute) {
        self.attributes = attributes;
    }

    pub fn is_enumerable(&self) -> bool {
        !self.attributes.contains(Attribute::DONT_ENUM)
    }

    pub fn can_delete(&self) -> bool {
        !self.attributes.contains(Attribute::DONT_DELETE)
    }

    pub fn is_overwritable(&self) -> bool {
        !self.attributes.contains(Attribute::READ_ONLY)
    }

    pub fn is_protected(&self) -> bool {
        self.attributes.contains(Attribute::PROTECTED)
    }

    pub fn is_virtual(&self) -> bool {
        self.getter.is_some()
    }
}

/// A `watch` callback registered for one property.
///
/// A trigger that removes itself while running is only marked dead; the
/// actual erase happens after the call returns so the container is never
/// mutated under its own iteration. The `executing` guard short-circuits
/// recursive fires.
#[derive(Clone, Debug)]
pub struct Trigger {
    pub name: Rc<str>,
    pub callback: ObjectId,
    pub extra: Value,
    pub executing: bool,
    pub dead: bool,
}

impl Trigger {
    pub fn new(name: Rc<str>, callback: ObjectId, extra: Value) -> Self {
        Self {
            name,
            callback,
            extra,
            executing: false,
            dead: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_gates() {
        let p = Attribute::ONLY_SWF6_UP;
        assert!(!p.allows_swf_version(5));
        assert!(p.allows_swf_version(6));
        assert!(p.allows_swf_version(8));

        let q = Attribute::IGNORE_SWF6;
        assert!(q.allows_swf_version(5));
        assert!(!q.allows_swf_version(6));
        assert!(q.allows_swf_version(7));
    }

    #[test]
    fn read_only_blocks_set_data() {
        let mut p = Property::new_stored(Value::Number(1.0), Attribute::READ_ONLY);
        assert!(!p.set_data(Value::Number(2.0)));
        assert_eq!(p.data(), Value::Number(1.0));

        let mut q = Property::new_stored(Value::Number(1.0), Attribute::empty());
        assert!(q.set_data(Value::Number(2.0)));
        assert_eq!(q.data(), Value::Number(2.0));
    }

    #[test]
    fn script_settable_mask_excludes_protected() {
        assert!(!Attribute::script_settable().contains(Attribute::PROTECTED));
        assert!(Attribute::script_settable().contains(Attribute::READ_ONLY));
    }
}
