//! Per-execution state: the operand stack, register banks, the call
//! stack, the current target, and variable lookup across all of them.

use crate::avm1::error::Error;
use crate::avm1::{object, ObjectId, Value};
use crate::context::VmContext;
use crate::display_object::DisplayHandle;
use smallvec::SmallVec;

pub const MAX_CALL_STACK_DEPTH: usize = 255;
pub const GLOBAL_REGISTER_COUNT: usize = 4;

/// One function invocation: its locals object (a plain object used as a
/// scope) and, for function2, a private register file.
pub struct CallFrame {
    pub function: Option<ObjectId>,
    pub locals: ObjectId,
    pub registers: Option<Vec<Value>>,
}

pub struct Environment {
    stack: Vec<Value>,
    global_registers: [Value; GLOBAL_REGISTER_COUNT],
    call_stack: Vec<CallFrame>,
    /// The timeline node the executing code acts on. `None` after an
    /// invalid tell-target; timeline opcodes then do nothing.
    target: Option<DisplayHandle>,
    original_target: Option<DisplayHandle>,
    swf_version: u8,
}

impl Environment {
    pub fn new(swf_version: u8, target: DisplayHandle) -> Self {
        Self {
            stack: Vec::new(),
            global_registers: Default::default(),
            call_stack: Vec::new(),
            target: Some(target),
            original_target: Some(target),
            swf_version,
        }
    }

    pub fn swf_version(&self) -> u8 {
        self.swf_version
    }

    pub fn set_swf_version(&mut self, version: u8) {
        self.swf_version = version;
    }

    pub fn target(&self) -> Option<DisplayHandle> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<DisplayHandle>) {
        self.target = target;
    }

    pub fn original_target(&self) -> Option<DisplayHandle> {
        self.original_target
    }

    /// The scripted object of the current target, where unqualified
    /// variables live.
    pub fn target_object(&self, ctx: &VmContext) -> Option<ObjectId> {
        self.target.and_then(|t| ctx.display.scripted_object(t))
    }

    // The operand stack, shared by every nested call in the VM.

    pub fn push(&mut self, value: impl Into<Value>) {
        let value = value.into();
        avm_debug!("stack push {}: {:?}", self.stack.len(), value);
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Value {
        match self.stack.pop() {
            Some(value) => {
                avm_debug!("stack pop {}: {:?}", self.stack.len(), value);
                value
            }
            None => {
                log_ascoding!("Stack underrun; synthesizing undefined");
                Value::Undefined
            }
        }
    }

    /// Peek `depth` entries below the top without popping.
    pub fn top(&self, depth: usize) -> Value {
        self.stack
            .iter()
            .rev()
            .nth(depth)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub fn drop_values(&mut self, count: usize) {
        let new_len = self.stack.len().saturating_sub(count);
        self.stack.truncate(new_len);
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Insert `count` undefined values at `offset`, repairing a smashed
    /// stack.
    pub fn pad_stack(&mut self, offset: usize, count: usize) {
        let offset = offset.min(self.stack.len());
        for _ in 0..count {
            self.stack.insert(offset, Value::Undefined);
        }
    }

    // Registers. A function2 frame brings its own file; everything else
    // shares the four global slots.

    pub fn get_register(&self, register: u8) -> Value {
        let index = usize::from(register);
        if let Some(frame) = self.call_stack.last() {
            if let Some(registers) = &frame.registers {
                return match registers.get(index) {
                    Some(value) => value.clone(),
                    None => {
                        log_ascoding!("Read of out-of-bounds local register {}", register);
                        Value::Undefined
                    }
                };
            }
        }
        self.global_registers
            .get(index)
            .cloned()
            .unwrap_or_else(|| {
                log_ascoding!("Read of out-of-bounds global register {}", register);
                Value::Undefined
            })
    }

    pub fn set_register(&mut self, register: u8, value: Value) {
        let index = usize::from(register);
        if let Some(frame) = self.call_stack.last_mut() {
            if let Some(registers) = &mut frame.registers {
                match registers.get_mut(index) {
                    Some(slot) => *slot = value,
                    None => {
                        log_ascoding!("Write to out-of-bounds local register {}", register)
                    }
                }
                return;
            }
        }
        match self.global_registers.get_mut(index) {
            Some(slot) => *slot = value,
            None => log_ascoding!("Write to out-of-bounds global register {}", register),
        }
    }

    /// Write a register of the current function2 frame specifically.
    pub fn set_local_register(&mut self, register: u8, value: Value) {
        if let Some(frame) = self.call_stack.last_mut() {
            if let Some(registers) = &mut frame.registers {
                match registers.get_mut(usize::from(register)) {
                    Some(slot) => *slot = value,
                    None => {
                        log_ascoding!("Preload into out-of-bounds register {}", register)
                    }
                }
                return;
            }
        }
        log_ascoding!("Local register write outside a function2 frame");
    }

    // The call stack.

    pub fn push_call_frame(&mut self, frame: CallFrame) -> Result<(), Error> {
        if self.call_stack.len() >= MAX_CALL_STACK_DEPTH {
            return Err(Error::CallStackOverflow(MAX_CALL_STACK_DEPTH));
        }
        self.call_stack.push(frame);
        Ok(())
    }

    pub fn pop_call_frame(&mut self) {
        if self.call_stack.pop().is_none() {
            log_aserror!("Call frame popped with an empty call stack");
        }
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn in_function(&self) -> bool {
        !self.call_stack.is_empty()
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }

    pub fn current_function(&self) -> Option<ObjectId> {
        self.call_stack.last().and_then(|f| f.function)
    }

    pub fn frame_locals(&self) -> SmallVec<[ObjectId; 8]> {
        self.call_stack.iter().map(|f| f.locals).collect()
    }

    // Variable access. `scope` is the view the interpreter maintains:
    // the captured scope chain at the bottom, frame locals above it,
    // live `with` objects on top; it is searched topmost-first.

    /// Read a variable, resolving `a.b.c` / `/a/b:c` paths first.
    pub fn get_variable(
        &mut self,
        ctx: &mut VmContext,
        name: &str,
        scope: &[ObjectId],
    ) -> Result<Value, Error> {
        if let Some((path, var, slash_based)) = parse_path(name) {
            let target = if slash_based {
                self.find_object_slashsyntax(ctx, path)?
            } else {
                self.find_object_dotsyntax(ctx, path)?
            };
            return match target {
                Some(target) => Ok(object::get_member(ctx, self, target, var)?
                    .unwrap_or(Value::Undefined)),
                None => {
                    log_ascoding!(
                        "Path {:?} of variable {:?} did not resolve to an object",
                        path,
                        name
                    );
                    Ok(Value::Undefined)
                }
            };
        }
        self.get_variable_raw(ctx, name, scope)
    }

    fn get_variable_raw(
        &mut self,
        ctx: &mut VmContext,
        name: &str,
        scope: &[ObjectId],
    ) -> Result<Value, Error> {
        // Scope view, topmost entry first.
        for obj in scope.iter().rev() {
            if let Some(value) = object::get_member(ctx, self, *obj, name)? {
                return Ok(value);
            }
        }

        // Frame locals, innermost call first. SWF 5 functions never put
        // their locals on the scope chain, so this is not redundant.
        for locals in self.frame_locals().iter().rev() {
            if let Some(value) = object::get_member(ctx, self, *locals, name)? {
                return Ok(value);
            }
        }

        if let Some(target) = self.target_object(ctx) {
            if let Some(value) = object::get_member(ctx, self, target, name)? {
                return Ok(value);
            }
        }

        if name == "this" {
            if let Some(target) = self.target {
                return Ok(ctx.clip_value(target));
            }
        }

        if name == "_root" || name == "_level0" {
            let root = ctx.display.root();
            return Ok(ctx.clip_value(root));
        }

        if name == "_global" && self.swf_version >= 6 {
            let globals = ctx.globals;
            return Ok(object::object_value(ctx, globals));
        }

        if let Some(depth) = parse_level_name(name) {
            if let Some(level) = ctx.display.level(depth) {
                return Ok(ctx.clip_value(level));
            }
        }

        let globals = ctx.globals;
        if let Some(value) = object::get_member(ctx, self, globals, name)? {
            return Ok(value);
        }

        avm_debug!("get_variable({:?}) failed, returning undefined", name);
        Ok(Value::Undefined)
    }

    /// Write a variable, resolving paths first. A write to a name that
    /// exists nowhere creates it on the current target.
    pub fn set_variable(
        &mut self,
        ctx: &mut VmContext,
        name: &str,
        value: Value,
        scope: &[ObjectId],
    ) -> Result<(), Error> {
        if name.is_empty() {
            return Ok(());
        }
        if let Some((path, var, slash_based)) = parse_path(name) {
            let target = if slash_based {
                self.find_object_slashsyntax(ctx, path)?
            } else {
                self.find_object_dotsyntax(ctx, path)?
            };
            return match target {
                Some(target) => object::set_member(ctx, self, target, var, value),
                None => {
                    log_ascoding!(
                        "Path target {:?} not found while setting {:?}",
                        path,
                        name
                    );
                    Ok(())
                }
            };
        }
        self.set_variable_raw(ctx, name, value, scope)
    }

    fn set_variable_raw(
        &mut self,
        ctx: &mut VmContext,
        name: &str,
        value: Value,
        scope: &[ObjectId],
    ) -> Result<(), Error> {
        // An existing local of any live frame wins.
        for locals in self.frame_locals().iter().rev() {
            if object::has_own_property(ctx, *locals, name) {
                return object::set_member(ctx, self, *locals, name, value);
            }
        }

        // Then any scope object that already has the member; this is how
        // an assignment inside `with` lands on the with'd object.
        for obj in scope.iter().rev() {
            if object::has_property(ctx, *obj, name, self.swf_version) {
                return object::set_member(ctx, self, *obj, name, value);
            }
        }

        match self.target_object(ctx) {
            Some(target) => object::set_member(ctx, self, target, name, value),
            None => {
                log_ascoding!(
                    "No current target to receive assignment of {:?}",
                    name
                );
                Ok(())
            }
        }
    }

    /// Delete a plain (non-path) variable from the scope view.
    pub fn delete_variable(
        &mut self,
        ctx: &mut VmContext,
        name: &str,
        scope: &[ObjectId],
    ) -> bool {
        for obj in scope.iter().rev() {
            let (found, deleted) = object::delete_member(ctx, *obj, name);
            if found {
                return deleted;
            }
        }
        for locals in self.frame_locals().iter().rev() {
            let (found, deleted) = object::delete_member(ctx, *locals, name);
            if found {
                return deleted;
            }
        }
        if let Some(target) = self.target_object(ctx) {
            let (found, deleted) = object::delete_member(ctx, target, name);
            if found {
                return deleted;
            }
        }
        let globals = ctx.globals;
        object::delete_member(ctx, globals, name).1
    }

    /// Set or create a local in the innermost frame; outside any frame
    /// this is a plain variable write.
    pub fn set_local(
        &mut self,
        ctx: &mut VmContext,
        name: &str,
        value: Value,
    ) -> Result<(), Error> {
        if name.is_empty() {
            return Ok(());
        }
        match self.call_stack.last() {
            Some(frame) => {
                let locals = frame.locals;
                object::set_member(ctx, self, locals, name, value)
            }
            None => self.set_variable(ctx, name, value, &[]),
        }
    }

    /// Declare a local without overwriting an existing one.
    pub fn declare_local(&mut self, ctx: &mut VmContext, name: &str) -> Result<(), Error> {
        match self.call_stack.last() {
            Some(frame) => {
                let locals = frame.locals;
                if !object::has_own_property(ctx, locals, name) {
                    object::set_member(ctx, self, locals, name, Value::Undefined)?;
                }
                Ok(())
            }
            None => {
                let scope: &[ObjectId] = &[];
                if self
                    .get_variable_raw(ctx, name, scope)
                    .map(|v| matches!(v, Value::Undefined))
                    .unwrap_or(true)
                {
                    self.set_variable_raw(ctx, name, Value::Undefined, scope)?;
                }
                Ok(())
            }
        }
    }

    /// Report every object id this execution state keeps alive.
    pub fn trace(&self, mark: &mut dyn FnMut(ObjectId)) {
        for value in &self.stack {
            object::trace_value(value, mark);
        }
        for register in &self.global_registers {
            object::trace_value(register, mark);
        }
        for frame in &self.call_stack {
            mark(frame.locals);
            if let Some(function) = frame.function {
                mark(function);
            }
            if let Some(registers) = &frame.registers {
                for value in registers {
                    object::trace_value(value, mark);
                }
            }
        }
    }

    /// Resolve a dot-syntax path (`a.b.c`) to an object, starting at the
    /// current target. The global object is consulted once if the first
    /// component misses.
    pub fn find_object_dotsyntax(
        &mut self,
        ctx: &mut VmContext,
        path: &str,
    ) -> Result<Option<ObjectId>, Error> {
        let mut current = match self.target_object(ctx) {
            Some(obj) => obj,
            None => return Ok(None),
        };
        if path.is_empty() {
            return Ok(Some(current));
        }
        for (depth, component) in path.split('.').enumerate() {
            if component.is_empty() {
                log_ascoding!("Invalid path {:?}", path);
                return Ok(None);
            }
            match self.resolve_component(ctx, current, component, depth == 0)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Resolve a slash-syntax path (`/a/b`, `../c`) to an object. A
    /// leading slash re-anchors at the absolute root.
    pub fn find_object_slashsyntax(
        &mut self,
        ctx: &mut VmContext,
        path: &str,
    ) -> Result<Option<ObjectId>, Error> {
        let (mut rest, mut current) = if let Some(stripped) = path.strip_prefix('/') {
            let root = ctx.display.root();
            match ctx.display.scripted_object(root) {
                Some(obj) => (stripped, obj),
                None => return Ok(None),
            }
        } else {
            match self.target_object(ctx) {
                Some(obj) => (path, obj),
                None => return Ok(None),
            }
        };
        if rest.is_empty() {
            return Ok(Some(current));
        }
        let mut depth = 0;
        loop {
            let (component, tail) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i + 1..]),
                None => (rest, ""),
            };
            if component.is_empty() {
                log_ascoding!("Invalid path {:?}", path);
                return Ok(None);
            }
            if component == ".." {
                // Ascends the display tree; at the root the step is an
                // error but the walk goes on from where it stands.
                match ctx
                    .object(current)
                    .display
                    .and_then(|node| ctx.display.parent(node))
                    .and_then(|parent| ctx.display.scripted_object(parent))
                {
                    Some(parent) => current = parent,
                    None => {
                        log_ascoding!(
                            "'..' in path {:?} follows a node with no parent",
                            path
                        );
                    }
                }
            } else {
                match self.resolve_component(ctx, current, component, depth == 0)? {
                    Some(next) => current = next,
                    None => return Ok(None),
                }
            }
            if tail.is_empty() {
                return Ok(Some(current));
            }
            rest = tail;
            depth += 1;
        }
    }

    fn resolve_component(
        &mut self,
        ctx: &mut VmContext,
        current: ObjectId,
        component: &str,
        first: bool,
    ) -> Result<Option<ObjectId>, Error> {
        let mut value = object::get_member(ctx, self, current, component)?;
        if value.is_none() && first {
            let globals = ctx.globals;
            value = object::get_member(ctx, self, globals, component)?;
        }
        match value {
            Some(value) => match value.coerce_to_object(ctx) {
                Some(obj) => Ok(Some(obj)),
                None => {
                    log_ascoding!(
                        "Path component {:?} is not an object-valued member",
                        component
                    );
                    Ok(None)
                }
            },
            None => {
                log_ascoding!("Path component {:?} not found", component);
                Ok(None)
            }
        }
    }

    /// Resolve a tell-target path to a display node. Accepts both slash
    /// and dot syntax, `..`, `_root`, and `_levelN`.
    pub fn find_target(&self, ctx: &VmContext, path: &str) -> Option<DisplayHandle> {
        if path.is_empty() {
            return self.target;
        }
        let (mut rest, mut current) = if let Some(stripped) = path.strip_prefix('/') {
            (stripped, ctx.display.root())
        } else {
            (path, self.target?)
        };
        while !rest.is_empty() {
            let (component, tail) = match next_separator(rest) {
                Some(i) => (&rest[..i], &rest[i + 1..]),
                None => (rest, ""),
            };
            match component {
                "" => {}
                "." => {}
                ".." => current = ctx.display.parent(current)?,
                "_root" | "_level0" => current = ctx.display.root(),
                name => {
                    if let Some(depth) = parse_level_name(name) {
                        current = ctx.display.level(depth)?;
                    } else {
                        current = ctx.display.child_by_name(
                            current,
                            name,
                            crate::avm1::is_case_sensitive(self.swf_version),
                        )?;
                    }
                }
            }
            rest = tail;
        }
        Some(current)
    }
}

/// Split a variable reference into `(path, leaf, slash_based)`.
///
/// The first colon splits path from leaf and marks slash syntax; with no
/// colon, the last dot splits them and marks dot syntax. Anything else is
/// not a path.
pub fn parse_path(input: &str) -> Option<(&str, &str, bool)> {
    if let Some(colon) = input.find(':') {
        return Some((&input[..colon], &input[colon + 1..], true));
    }
    input
        .rfind('.')
        .map(|dot| (&input[..dot], &input[dot + 1..], false))
}

/// Find the next `/` or `.` separator in a target path, stepping over
/// `..` components.
fn next_separator(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'.' if i + 1 < bytes.len() && bytes[i + 1] == b'.' => i += 2,
            b'.' | b'/' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Recognize `_levelN` globals, N in 0..=65535.
fn parse_level_name(name: &str) -> Option<i32> {
    let digits = name.strip_prefix("_level")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let depth: i32 = digits.parse().ok()?;
    if depth <= 65_535 {
        Some(depth)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::with_vm;
    use pretty_assertions::assert_eq;

    #[test]
    fn path_parsing() {
        assert_eq!(parse_path("/a/b:c"), Some(("/a/b", "c", true)));
        assert_eq!(parse_path("a.b.c"), Some(("a.b", "c", false)));
        assert_eq!(parse_path("a:b.c"), Some(("a", "b.c", true)));
        assert_eq!(parse_path("plain"), None);
        assert_eq!(parse_path(""), None);
    }

    #[test]
    fn level_names() {
        assert_eq!(parse_level_name("_level0"), Some(0));
        assert_eq!(parse_level_name("_level65535"), Some(65_535));
        assert_eq!(parse_level_name("_level65536"), None);
        assert_eq!(parse_level_name("_level"), None);
        assert_eq!(parse_level_name("_levelx"), None);
        assert_eq!(parse_level_name("level0"), None);
    }

    #[test]
    fn stack_discipline() {
        with_vm(7, |_ctx, env, _root| {
            env.push(1.0);
            env.push(2.0);
            assert_eq!(env.top(0), Value::Number(2.0));
            assert_eq!(env.top(1), Value::Number(1.0));
            assert_eq!(env.pop(), Value::Number(2.0));
            env.drop_values(5);
            assert_eq!(env.stack_size(), 0);
            // Popping an empty stack repairs with undefined.
            assert_eq!(env.pop(), Value::Undefined);
        });
    }

    #[test]
    fn call_stack_depth_limit() {
        with_vm(7, |ctx, env, _root| {
            for _ in 0..MAX_CALL_STACK_DEPTH {
                let locals = ctx.alloc_object(None, 7);
                env.push_call_frame(CallFrame {
                    function: None,
                    locals,
                    registers: None,
                })
                .unwrap();
            }
            let locals = ctx.alloc_object(None, 7);
            let overflow = env.push_call_frame(CallFrame {
                function: None,
                locals,
                registers: None,
            });
            assert!(matches!(overflow, Err(Error::CallStackOverflow(_))));
        });
    }

    #[test]
    fn variables_live_on_the_target() {
        with_vm(6, |ctx, env, _root| {
            env.set_variable(ctx, "score", Value::Number(10.0), &[])
                .unwrap();
            assert_eq!(
                env.get_variable(ctx, "score", &[]).unwrap(),
                Value::Number(10.0)
            );
            // Unknown names read as undefined.
            assert_eq!(
                env.get_variable(ctx, "nothing", &[]).unwrap(),
                Value::Undefined
            );
        });
    }

    #[test]
    fn dot_paths_resolve_members() {
        with_vm(6, |ctx, env, _root| {
            let o = ctx.alloc_object(None, 6);
            object::set_member(ctx, env, o, "x", Value::Number(4.0)).unwrap();
            env.set_variable(ctx, "o", Value::Object(o), &[]).unwrap();
            assert_eq!(
                env.get_variable(ctx, "o.x", &[]).unwrap(),
                Value::Number(4.0)
            );
            env.set_variable(ctx, "o.x", Value::Number(5.0), &[])
                .unwrap();
            assert_eq!(
                object::get_member(ctx, env, o, "x").unwrap(),
                Some(Value::Number(5.0))
            );
        });
    }

    #[test]
    fn slash_paths_resolve_across_the_display_tree() {
        use crate::avm1::test_utils::{add_scripted_child, with_vm_and_graph};
        with_vm_and_graph(6, |ctx, env, root, graph| {
            let (hero, hero_obj) = add_scripted_child(ctx, graph, root, "hero");
            let (_, arm_obj) = add_scripted_child(ctx, graph, hero, "arm");
            object::set_member(ctx, env, arm_obj, "angle", Value::Number(45.0)).unwrap();

            // Slash-colon syntax reads through the tree.
            assert_eq!(
                env.get_variable(ctx, "/hero/arm:angle", &[]).unwrap(),
                Value::Number(45.0)
            );
            // Dot syntax reaches the same cell.
            assert_eq!(
                env.get_variable(ctx, "hero.arm.angle", &[]).unwrap(),
                Value::Number(45.0)
            );
            // `..` ascends to the parent timeline.
            object::set_member(ctx, env, hero_obj, "hp", Value::Number(3.0)).unwrap();
            env.set_target(Some(hero));
            assert_eq!(
                env.get_variable(ctx, "arm/..:hp", &[]).unwrap(),
                Value::Number(3.0)
            );

            // Writes through a path land on the resolved object.
            env.set_target(Some(root));
            env.set_variable(ctx, "/hero:hp", Value::Number(2.0), &[])
                .unwrap();
            assert_eq!(
                object::get_member(ctx, env, hero_obj, "hp").unwrap(),
                Some(Value::Number(2.0))
            );
        });
    }

    #[test]
    fn find_target_round_trips_paths() {
        use crate::avm1::test_utils::{add_scripted_child, with_vm_and_graph};
        with_vm_and_graph(6, |ctx, env, root, graph| {
            let (hero, _) = add_scripted_child(ctx, graph, root, "hero");
            let (arm, _) = add_scripted_child(ctx, graph, hero, "arm");

            // A path built from the node resolves back to the same node.
            let path = ctx.display.path(arm);
            assert_eq!(path, "_level0.hero.arm");
            assert_eq!(ctx.display.find_by_path(&path), Some(arm));

            assert_eq!(env.find_target(ctx, "/hero/arm"), Some(arm));
            assert_eq!(env.find_target(ctx, "hero.arm"), Some(arm));
            assert_eq!(env.find_target(ctx, "_root"), Some(root));
            assert_eq!(env.find_target(ctx, ""), Some(root));
            assert_eq!(env.find_target(ctx, "/missing"), None);

            env.set_target(Some(arm));
            assert_eq!(env.find_target(ctx, ".."), Some(hero));
        });
    }

    #[test]
    fn removed_nodes_resolve_to_nothing() {
        use crate::avm1::test_utils::{add_scripted_child, with_vm_and_graph};
        with_vm_and_graph(6, |ctx, env, root, graph| {
            let (hero, _) = add_scripted_child(ctx, graph, root, "hero");
            let clip = ctx.clip_value(hero);
            graph.remove(hero);
            match &clip {
                Value::MovieClip(soft) => {
                    assert!(soft.resolve(&*ctx.display).is_none());
                }
                _ => unreachable!(),
            }
            // A dangling reference reports "movieclip" without resolving.
            assert_eq!(clip.type_of(ctx), "movieclip");
            let _ = env;
        });
    }

    #[test]
    fn global_registers_wrap_frames() {
        with_vm(7, |_ctx, env, _root| {
            env.set_register(2, Value::Number(9.0));
            assert_eq!(env.get_register(2), Value::Number(9.0));
            assert_eq!(env.get_register(3), Value::Undefined);
        });
    }
}
