//! The explicit VM handle threaded through every public API, and the
//! queue of deferred code units drained between frames.

use crate::avm1::buffer::CodeSlice;
use crate::avm1::environment::Environment;
use crate::avm1::error::Error;
use crate::avm1::function::{Executable, NativeFunction};
use crate::avm1::interpreter::Interpreter;
use crate::avm1::object::{self, ObjectData, ObjectId};
use crate::avm1::property::Attribute;
use crate::avm1::{globals, Value};
use crate::backend::navigator::NavigatorBackend;
use crate::backend::timers::TimerBackend;
use crate::display_object::{DisplayGraph, DisplayHandle, DisplayRef};
use crate::string_table::StringTable;
use fnv::FnvHashSet;
use generational_arena::Arena;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// Tunables with the reference player's defaults.
pub struct VmOptions {
    /// Backward branches allowed per interpreter invocation.
    pub loop_limit: u32,
    /// `with` depths that draw a diagnostic, by SWF version band.
    pub with_stack_warn_swf5: usize,
    pub with_stack_warn_swf6: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            loop_limit: 65_536,
            with_stack_warn_swf5: 7,
            with_stack_warn_swf6: 15,
        }
    }
}

/// Built-in prototypes every new object ultimately hangs off.
#[derive(Copy, Clone)]
pub struct SystemPrototypes {
    pub object: ObjectId,
    pub function: ObjectId,
}

pub struct VmContext {
    pub objects: Arena<ObjectData>,
    pub strings: StringTable,
    pub globals: ObjectId,
    pub prototypes: SystemPrototypes,
    pub display: Box<dyn DisplayGraph>,
    pub navigator: Box<dyn NavigatorBackend>,
    pub timers: Box<dyn TimerBackend>,
    pub queue: ActionQueue,
    pub rng: SmallRng,
    pub player_version: u8,
    pub options: VmOptions,
}

impl VmContext {
    pub fn new(
        player_version: u8,
        display: Box<dyn DisplayGraph>,
        navigator: Box<dyn NavigatorBackend>,
        timers: Box<dyn TimerBackend>,
    ) -> Self {
        let mut objects = Arena::new();
        let globals = objects.insert(ObjectData::bare(player_version));
        let object_proto = objects.insert(ObjectData::bare(player_version));
        let mut function_proto = ObjectData::bare(player_version);
        function_proto.proto = Some(object_proto);
        let function_proto = objects.insert(function_proto);

        let mut ctx = Self {
            objects,
            strings: StringTable::new(),
            globals,
            prototypes: SystemPrototypes {
                object: object_proto,
                function: function_proto,
            },
            display,
            navigator,
            timers,
            queue: ActionQueue::new(),
            rng: SmallRng::from_entropy(),
            player_version,
            options: VmOptions::default(),
        };
        globals::create_globals(&mut ctx);
        ctx
    }

    pub fn object(&self, id: ObjectId) -> &ObjectData {
        &self.objects[id]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut ObjectData {
        &mut self.objects[id]
    }

    pub fn alloc_object(&mut self, proto: Option<ObjectId>, swf_version: u8) -> ObjectId {
        self.objects
            .insert(ObjectData::with_proto(proto, swf_version))
    }

    /// Allocate a function object: implicit proto is `Function.prototype`,
    /// and a fresh `prototype` object is wired up with its `constructor`
    /// back-pointer. The `prototype` slot is deletable, as the player
    /// allows.
    pub fn alloc_function(&mut self, executable: Executable, swf_version: u8) -> ObjectId {
        let function_proto = self.prototypes.function;
        let object_proto = self.prototypes.object;

        let mut data = ObjectData::with_proto(Some(function_proto), swf_version);
        data.executable = Some(executable);
        let func = self.objects.insert(data);

        let proto = self.alloc_object(Some(object_proto), swf_version);
        self.object_mut(proto).constructor = Some(func);
        object::define_value(
            self,
            proto,
            "constructor",
            Value::Function(func),
            Attribute::DONT_ENUM,
        );
        object::define_value(
            self,
            func,
            "prototype",
            Value::Object(proto),
            Attribute::DONT_ENUM,
        );
        func
    }

    pub fn alloc_native_function(&mut self, function: NativeFunction) -> ObjectId {
        let version = self.player_version;
        self.alloc_function(Executable::Native(function), version)
    }

    /// A movieclip value for a display node, carrying the node's current
    /// path for soft re-resolution.
    pub fn clip_value(&self, handle: DisplayHandle) -> Value {
        Value::MovieClip(DisplayRef::new(self.display.path(handle).into(), handle))
    }

    /// Execute a code slice against a timeline target right now.
    pub fn run_actions(&mut self, target: DisplayHandle, code: CodeSlice) {
        let mut env = Environment::new(code.swf_version(), target);
        let this = self.clip_value(target);
        let result = Interpreter::new(self, &mut env, code, Vec::new(), this).run();
        if let Err(error) = result {
            root_error_handler(error);
        }
    }

    /// Queue a `DoInitAction` block. These are illegal in an
    /// ActionScript 3 movie; the tag is rejected, fatally for the tag
    /// only.
    pub fn queue_init_actions(
        &mut self,
        target: DisplayHandle,
        code: CodeSlice,
        as3_movie: bool,
    ) -> Result<(), Error> {
        if as3_movie {
            return Err(Error::Parser);
        }
        self.queue.push(
            QueuePriority::Init,
            QueuedAction {
                target,
                action: ActionType::Init { code },
            },
        );
        Ok(())
    }

    /// Drain the action queue: repeatedly pop the lowest-priority
    /// non-empty band until every band is empty. Entries whose receiver
    /// was destroyed are discarded at dispatch time.
    pub fn drain_queue(&mut self) {
        while let Some(entry) = self.queue.pop_next() {
            if self.display.is_removed(entry.target) {
                avm_debug!("Dropping queued actions for a removed node");
                continue;
            }
            match entry.action {
                ActionType::Normal { code } | ActionType::Init { code } => {
                    self.run_actions(entry.target, code);
                }
                ActionType::Method { object, name, args } => {
                    let version = self.player_version;
                    let mut env = Environment::new(version, entry.target);
                    let receiver = object::object_value(self, object);
                    let result = (|| -> Result<(), Error> {
                        let method = object::get_member(self, &mut env, object, &name)?
                            .unwrap_or(Value::Undefined);
                        method.call(self, &mut env, receiver, &args)?;
                        Ok(())
                    })();
                    if let Err(error) = result {
                        root_error_handler(error);
                    }
                }
                ActionType::Callback { callback } => callback(self),
            }
        }
    }

    /// Mark everything reachable from the root set and sweep the rest.
    /// Must only run at a quiescent point; environments still alive on
    /// the host side are passed in as extra roots.
    pub fn collect_garbage(&mut self, envs: &[&Environment]) {
        let mut marked = FnvHashSet::default();
        let mut worklist: Vec<ObjectId> = Vec::new();

        let seed = |id: ObjectId, marked: &mut FnvHashSet<ObjectId>, worklist: &mut Vec<ObjectId>| {
            if marked.insert(id) {
                worklist.push(id);
            }
        };

        seed(self.globals, &mut marked, &mut worklist);
        seed(self.prototypes.object, &mut marked, &mut worklist);
        seed(self.prototypes.function, &mut marked, &mut worklist);
        self.display.visit_scripted_objects(&mut |id| {
            if marked.insert(id) {
                worklist.push(id);
            }
        });
        self.queue.trace(&mut |id| {
            if marked.insert(id) {
                worklist.push(id);
            }
        });
        for env in envs {
            env.trace(&mut |id| {
                if marked.insert(id) {
                    worklist.push(id);
                }
            });
        }

        while let Some(id) = worklist.pop() {
            if let Some(data) = self.objects.get(id) {
                object::trace_object(data, &mut |child| {
                    if marked.insert(child) {
                        worklist.push(child);
                    }
                });
            }
        }

        self.objects.retain(|id, _| marked.contains(&id));
    }
}

fn root_error_handler(error: Error) {
    match error {
        Error::ThrownValue(value) => {
            log_aserror!("Uncaught thrown value: {:?}", value);
        }
        error => log_aserror!("Uncaught error: {}", error),
    }
}

/// The four priority bands, drained lowest number first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueuePriority {
    Init = 0,
    Construct = 1,
    DoAction = 2,
    EnterFrame = 3,
}

/// The work a queue entry performs once dispatched.
pub enum ActionType {
    /// Frame or event actions.
    Normal { code: CodeSlice },
    /// A `DoInitAction` block.
    Init { code: CodeSlice },
    /// An event handler method on a receiver object.
    Method {
        object: ObjectId,
        name: String,
        args: Vec<Value>,
    },
    /// A host callback closed over whatever it needs.
    Callback {
        callback: Box<dyn FnOnce(&mut VmContext)>,
    },
}

pub struct QueuedAction {
    pub target: DisplayHandle,
    pub action: ActionType,
}

/// A priority FIFO of deferred code units. Entries enqueued while a
/// round drains join the same round.
pub struct ActionQueue {
    bands: [VecDeque<QueuedAction>; 4],
}

impl ActionQueue {
    const DEFAULT_CAPACITY: usize = 32;

    pub fn new() -> Self {
        Self {
            bands: [
                VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
                VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
                VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
                VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
            ],
        }
    }

    pub fn push(&mut self, priority: QueuePriority, entry: QueuedAction) {
        self.bands[priority as usize].push_back(entry);
    }

    /// The next entry, ties broken FIFO within the lowest non-empty band.
    pub fn pop_next(&mut self) -> Option<QueuedAction> {
        self.bands.iter_mut().find_map(|band| band.pop_front())
    }

    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(|band| band.is_empty())
    }

    pub fn len(&self) -> usize {
        self.bands.iter().map(|band| band.len()).sum()
    }

    pub fn trace(&self, mark: &mut dyn FnMut(ObjectId)) {
        for band in &self.bands {
            for entry in band {
                if let ActionType::Method { object, args, .. } = &entry.action {
                    mark(*object);
                    for arg in args {
                        object::trace_value(arg, mark);
                    }
                }
            }
        }
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::with_vm;

    #[test]
    fn queue_respects_priority_bands() {
        let mut queue = ActionQueue::new();
        let target = DisplayHandle {
            index: 0,
            generation: 0,
        };
        let entry = |label: &str| QueuedAction {
            target,
            action: ActionType::Method {
                object: generational_arena::Index::from_raw_parts(0, 0),
                name: label.to_string(),
                args: Vec::new(),
            },
        };
        queue.push(QueuePriority::EnterFrame, entry("frame"));
        queue.push(QueuePriority::DoAction, entry("do1"));
        queue.push(QueuePriority::Init, entry("init"));
        queue.push(QueuePriority::DoAction, entry("do2"));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop_next())
            .map(|e| match e.action {
                ActionType::Method { name, .. } => name,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec!["init", "do1", "do2", "frame"]);
    }

    #[test]
    fn garbage_collection_keeps_reachable_objects() {
        with_vm(7, |ctx, env, _root| {
            let kept = ctx.alloc_object(None, 7);
            let globals = ctx.globals;
            object::set_member(ctx, env, globals, "kept", Value::Object(kept)).unwrap();
            let lost = ctx.alloc_object(None, 7);

            ctx.collect_garbage(&[]);
            assert!(ctx.objects.get(kept).is_some());
            assert!(ctx.objects.get(lost).is_none());
        });
    }

    #[test]
    fn garbage_collection_roots_environments() {
        with_vm(7, |ctx, env, _root| {
            let held = ctx.alloc_object(None, 7);
            env.push(Value::Object(held));
            ctx.collect_garbage(&[&*env]);
            assert!(ctx.objects.get(held).is_some());
        });
    }

    #[test]
    fn queued_methods_are_gc_roots() {
        with_vm(7, |ctx, _env, root| {
            let receiver = ctx.alloc_object(None, 7);
            ctx.queue.push(
                QueuePriority::DoAction,
                QueuedAction {
                    target: root,
                    action: ActionType::Method {
                        object: receiver,
                        name: "onEnterFrame".to_string(),
                        args: Vec::new(),
                    },
                },
            );
            ctx.collect_garbage(&[]);
            assert!(ctx.objects.get(receiver).is_some());
        });
    }
}
