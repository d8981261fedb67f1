//! Shared scaffolding for VM tests: a ready context over an in-memory
//! display tree, plus a small action assembler.

use crate::avm1::buffer::{ActionBuffer, CodeSlice};
use crate::avm1::environment::Environment;
use crate::avm1::interpreter::Interpreter;
use crate::avm1::object::ObjectId;
use crate::avm1::opcode::OpCode;
use crate::avm1::Value;
use crate::backend::navigator::NullNavigatorBackend;
use crate::backend::timers::NullTimerBackend;
use crate::context::VmContext;
use crate::display_object::{DisplayGraph, DisplayHandle};
use std::cell::RefCell;
use std::rc::Rc;

struct TestNode {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    removed: bool,
    scripted: Option<ObjectId>,
}

#[derive(Clone)]
pub struct TestDisplayGraph {
    inner: Rc<RefCell<Vec<TestNode>>>,
}

impl TestDisplayGraph {
    pub fn new() -> Self {
        let graph = Self {
            inner: Rc::new(RefCell::new(Vec::new())),
        };
        graph.inner.borrow_mut().push(TestNode {
            name: "_level0".to_string(),
            parent: None,
            children: Vec::new(),
            removed: false,
            scripted: None,
        });
        graph
    }

    pub fn root_handle(&self) -> DisplayHandle {
        DisplayHandle {
            index: 0,
            generation: 0,
        }
    }

    pub fn add_child(&self, parent: DisplayHandle, name: &str) -> DisplayHandle {
        let mut nodes = self.inner.borrow_mut();
        let index = nodes.len();
        nodes.push(TestNode {
            name: name.to_string(),
            parent: Some(parent.index as usize),
            children: Vec::new(),
            removed: false,
            scripted: None,
        });
        nodes[parent.index as usize].children.push(index);
        DisplayHandle {
            index: index as u32,
            generation: 0,
        }
    }

    pub fn bind(&self, handle: DisplayHandle, object: ObjectId) {
        self.inner.borrow_mut()[handle.index as usize].scripted = Some(object);
    }

    pub fn remove(&self, handle: DisplayHandle) {
        self.inner.borrow_mut()[handle.index as usize].removed = true;
    }
}

impl DisplayGraph for TestDisplayGraph {
    fn root(&self) -> DisplayHandle {
        self.root_handle()
    }

    fn level(&self, depth: i32) -> Option<DisplayHandle> {
        if depth == 0 {
            Some(self.root_handle())
        } else {
            None
        }
    }

    fn find_by_path(&self, path: &str) -> Option<DisplayHandle> {
        let mut current = 0usize;
        let nodes = self.inner.borrow();
        let rest = path.strip_prefix("_level0")?;
        for component in rest.split('.').filter(|c| !c.is_empty()) {
            let node = &nodes[current];
            current = *node
                .children
                .iter()
                .find(|&&child| nodes[child].name == component && !nodes[child].removed)?;
        }
        if nodes[current].removed {
            None
        } else {
            Some(DisplayHandle {
                index: current as u32,
                generation: 0,
            })
        }
    }

    fn child_by_name(
        &self,
        parent: DisplayHandle,
        name: &str,
        case_sensitive: bool,
    ) -> Option<DisplayHandle> {
        let nodes = self.inner.borrow();
        let node = nodes.get(parent.index as usize)?;
        for &child in &node.children {
            let child_node = &nodes[child];
            if child_node.removed {
                continue;
            }
            let matches = if case_sensitive {
                child_node.name == name
            } else {
                child_node.name.eq_ignore_ascii_case(name)
            };
            if matches {
                return Some(DisplayHandle {
                    index: child as u32,
                    generation: 0,
                });
            }
        }
        None
    }

    fn parent(&self, handle: DisplayHandle) -> Option<DisplayHandle> {
        self.inner
            .borrow()
            .get(handle.index as usize)?
            .parent
            .map(|index| DisplayHandle {
                index: index as u32,
                generation: 0,
            })
    }

    fn name(&self, handle: DisplayHandle) -> String {
        self.inner
            .borrow()
            .get(handle.index as usize)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn path(&self, handle: DisplayHandle) -> String {
        let nodes = self.inner.borrow();
        let mut parts = Vec::new();
        let mut current = Some(handle.index as usize);
        while let Some(index) = current {
            let node = &nodes[index];
            parts.push(node.name.clone());
            current = node.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    fn is_removed(&self, handle: DisplayHandle) -> bool {
        self.inner
            .borrow()
            .get(handle.index as usize)
            .map(|n| n.removed)
            .unwrap_or(true)
    }

    fn is_movie_clip(&self, _handle: DisplayHandle) -> bool {
        true
    }

    fn scripted_object(&self, handle: DisplayHandle) -> Option<ObjectId> {
        self.inner.borrow().get(handle.index as usize)?.scripted
    }

    fn visit_scripted_objects(&self, visitor: &mut dyn FnMut(ObjectId)) {
        for node in self.inner.borrow().iter() {
            if let (false, Some(object)) = (node.removed, node.scripted) {
                visitor(object);
            }
        }
    }
}

/// Run a test against a fresh context and environment targeted at the
/// root timeline.
pub fn with_vm<F>(swf_version: u8, test: F)
where
    F: FnOnce(&mut VmContext, &mut Environment, DisplayHandle),
{
    with_vm_and_graph(swf_version, |ctx, env, root, _graph| test(ctx, env, root));
}

/// Like [`with_vm`], but also hands out the display graph so tests can
/// grow the tree.
pub fn with_vm_and_graph<F>(swf_version: u8, test: F)
where
    F: FnOnce(&mut VmContext, &mut Environment, DisplayHandle, &TestDisplayGraph),
{
    let _ = env_logger::builder().is_test(true).try_init();
    let graph = TestDisplayGraph::new();
    let graph_handle = graph.clone();
    let mut ctx = VmContext::new(
        swf_version,
        Box::new(graph),
        Box::new(NullNavigatorBackend::default()),
        Box::new(NullTimerBackend::default()),
    );
    let root = graph_handle.root_handle();
    let root_obj = ctx.alloc_object(Some(ctx.prototypes.object), swf_version);
    ctx.object_mut(root_obj).display = Some(root);
    graph_handle.bind(root, root_obj);

    let mut env = Environment::new(swf_version, root);
    test(&mut ctx, &mut env, root, &graph_handle);
}

/// Add a display child with a bound scripted object.
pub fn add_scripted_child(
    ctx: &mut VmContext,
    graph: &TestDisplayGraph,
    parent: DisplayHandle,
    name: &str,
) -> (DisplayHandle, ObjectId) {
    let node = graph.add_child(parent, name);
    let version = ctx.player_version;
    let proto = ctx.prototypes.object;
    let object = ctx.alloc_object(Some(proto), version);
    ctx.object_mut(object).display = Some(node);
    graph.bind(node, object);
    (node, object)
}

/// A function object that does nothing, for identity-based tests.
pub fn dummy_function(ctx: &mut VmContext) -> ObjectId {
    ctx.alloc_native_function(|_ctx, _env, _this, _args| Ok(Value::Undefined))
}

/// Assemble a freshly-built slice and run it on the root timeline.
pub fn run_code(
    ctx: &mut VmContext,
    env: &mut Environment,
    root: DisplayHandle,
    writer: ActionWriter,
) {
    let code = writer.into_slice();
    let this = ctx.clip_value(root);
    Interpreter::new(ctx, env, code, Vec::new(), this)
        .run()
        .unwrap();
}

/// Emits action bytecode the way a compiler would, for driving the
/// interpreter in tests.
pub struct ActionWriter {
    bytes: Vec<u8>,
    swf_version: u8,
}

impl ActionWriter {
    pub fn new(swf_version: u8) -> Self {
        Self {
            bytes: Vec::new(),
            swf_version,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn op(&mut self, op: OpCode) {
        self.bytes.push(op as u8);
    }

    /// An opcode with a two-byte payload.
    pub fn op_u16(&mut self, op: OpCode, value: u16) {
        self.bytes.push(op as u8);
        self.bytes.extend_from_slice(&2u16.to_le_bytes());
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_number(&mut self, value: f64) {
        self.bytes.push(OpCode::Push as u8);
        self.bytes.extend_from_slice(&9u16.to_le_bytes());
        self.bytes.push(6);
        let le = value.to_le_bytes();
        // High word first, as stored in the file.
        self.bytes.extend_from_slice(&le[4..8]);
        self.bytes.extend_from_slice(&le[0..4]);
    }

    pub fn push_str(&mut self, value: &str) {
        self.bytes.push(OpCode::Push as u8);
        let length = (value.len() + 2) as u16;
        self.bytes.extend_from_slice(&length.to_le_bytes());
        self.bytes.push(0);
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
    }

    pub fn push_const(&mut self, index: u8) {
        self.bytes.push(OpCode::Push as u8);
        self.bytes.extend_from_slice(&2u16.to_le_bytes());
        self.bytes.push(8);
        self.bytes.push(index);
    }

    pub fn push_register(&mut self, register: u8) {
        self.bytes.push(OpCode::Push as u8);
        self.bytes.extend_from_slice(&2u16.to_le_bytes());
        self.bytes.push(4);
        self.bytes.push(register);
    }

    pub fn store_register(&mut self, register: u8) {
        self.bytes.push(OpCode::StoreRegister as u8);
        self.bytes.extend_from_slice(&1u16.to_le_bytes());
        self.bytes.push(register);
    }

    pub fn constant_pool(&mut self, entries: &[&str]) {
        self.bytes.push(OpCode::ConstantPool as u8);
        let payload: usize = 2 + entries.iter().map(|e| e.len() + 1).sum::<usize>();
        self.bytes
            .extend_from_slice(&(payload as u16).to_le_bytes());
        self.bytes
            .extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in entries {
            self.bytes.extend_from_slice(entry.as_bytes());
            self.bytes.push(0);
        }
    }

    /// Emit a branch with a zero offset; returns the position to patch.
    pub fn jump_placeholder(&mut self, op: OpCode) -> usize {
        let position = self.bytes.len();
        self.op_u16(op, 0);
        position
    }

    /// Point an earlier branch at the current position.
    pub fn patch_jump(&mut self, position: usize) {
        let offset = (self.bytes.len() - (position + 5)) as i16;
        self.patch_i16(position + 3, offset);
    }

    pub fn patch_i16(&mut self, at: usize, value: i16) {
        let le = value.to_le_bytes();
        self.bytes[at] = le[0];
        self.bytes[at + 1] = le[1];
    }

    /// Emit a `with` whose block length is patched later.
    pub fn with_placeholder(&mut self) -> usize {
        let position = self.bytes.len();
        self.op_u16(OpCode::With, 0);
        position
    }

    /// Close the `with` block opened at `position`.
    pub fn patch_with(&mut self, position: usize) {
        let block_length = (self.bytes.len() - (position + 5)) as u16;
        let le = block_length.to_le_bytes();
        self.bytes[position + 3] = le[0];
        self.bytes[position + 4] = le[1];
    }

    pub fn define_function(&mut self, name: &str, params: &[&str], body: &ActionWriter) {
        self.bytes.push(OpCode::DefineFunction as u8);
        let payload =
            name.len() + 1 + 2 + params.iter().map(|p| p.len() + 1).sum::<usize>() + 2;
        self.bytes
            .extend_from_slice(&(payload as u16).to_le_bytes());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        self.bytes
            .extend_from_slice(&(params.len() as u16).to_le_bytes());
        for param in params {
            self.bytes.extend_from_slice(param.as_bytes());
            self.bytes.push(0);
        }
        self.bytes
            .extend_from_slice(&(body.bytes.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(&body.bytes);
    }

    pub fn define_function2(
        &mut self,
        name: &str,
        params: &[(u8, &str)],
        register_count: u8,
        flags: u16,
        body: &ActionWriter,
    ) {
        self.bytes.push(OpCode::DefineFunction2 as u8);
        let payload = name.len()
            + 1
            + 2
            + 1
            + 2
            + params.iter().map(|(_, p)| p.len() + 2).sum::<usize>()
            + 2;
        self.bytes
            .extend_from_slice(&(payload as u16).to_le_bytes());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        self.bytes
            .extend_from_slice(&(params.len() as u16).to_le_bytes());
        self.bytes.push(register_count);
        self.bytes.extend_from_slice(&flags.to_le_bytes());
        for (register, param) in params {
            self.bytes.push(*register);
            self.bytes.extend_from_slice(param.as_bytes());
            self.bytes.push(0);
        }
        self.bytes
            .extend_from_slice(&(body.bytes.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(&body.bytes);
    }

    /// A try/catch with a named catch variable and no finally block.
    pub fn try_catch(&mut self, catch_name: &str, try_body: &ActionWriter, catch_body: &ActionWriter) {
        self.bytes.push(OpCode::Try as u8);
        let payload = 1 + 2 + 2 + 2 + catch_name.len() + 1;
        self.bytes
            .extend_from_slice(&(payload as u16).to_le_bytes());
        self.bytes.push(0x01);
        self.bytes
            .extend_from_slice(&(try_body.bytes.len() as u16).to_le_bytes());
        self.bytes
            .extend_from_slice(&(catch_body.bytes.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
        self.bytes.extend_from_slice(catch_name.as_bytes());
        self.bytes.push(0);
        self.bytes.extend_from_slice(&try_body.bytes);
        self.bytes.extend_from_slice(&catch_body.bytes);
    }

    pub fn into_slice(mut self) -> CodeSlice {
        self.bytes.push(OpCode::End as u8);
        ActionBuffer::new(self.bytes, self.swf_version).as_slice()
    }
}
