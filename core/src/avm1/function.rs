//! Executable functions and their calling conventions.

use crate::avm1::buffer::CodeSlice;
use crate::avm1::environment::{CallFrame, Environment};
use crate::avm1::error::Error;
use crate::avm1::interpreter::Interpreter;
use crate::avm1::property::Attribute;
use crate::avm1::{object, ObjectId, Value};
use crate::context::VmContext;
use crate::display_object::DisplayHandle;
use bitflags::bitflags;
use std::fmt;
use std::rc::Rc;

/// A function implemented by the runtime itself.
///
/// Receives the context, the live environment, the bound `this`, and the
/// call arguments.
pub type NativeFunction =
    fn(&mut VmContext, &mut Environment, Value, &[Value]) -> Result<Value, Error>;

bitflags! {
    /// The `DefineFunction2` preload/suppress word, with its wire values.
    pub struct FunctionFlags: u16 {
        const PRELOAD_THIS       = 1 << 0;
        const SUPPRESS_THIS      = 1 << 1;
        const PRELOAD_ARGUMENTS  = 1 << 2;
        const SUPPRESS_ARGUMENTS = 1 << 3;
        const PRELOAD_SUPER      = 1 << 4;
        const SUPPRESS_SUPER     = 1 << 5;
        const PRELOAD_ROOT       = 1 << 6;
        const PRELOAD_PARENT     = 1 << 7;
        const PRELOAD_GLOBAL     = 1 << 8;
    }
}

/// One declared parameter. `register` is absent when the wire index was
/// zero, meaning "bind as a named local".
#[derive(Clone, Debug)]
pub struct Param {
    pub register: Option<u8>,
    pub name: Rc<str>,
}

/// A function defined by `DefineFunction` or `DefineFunction2`: a slice
/// of its code buffer plus the scope chain captured at declaration time.
#[derive(Clone)]
pub struct Avm1Function {
    swf_version: u8,
    data: CodeSlice,
    name: Option<Rc<str>>,
    is_function2: bool,
    register_count: u8,
    flags: FunctionFlags,
    params: Vec<Param>,
    /// Declaration-time scope snapshot, outermost first. A strong
    /// reference list, not a copy.
    scope: Rc<Vec<ObjectId>>,
    /// The timeline node the declaring code ran on; `_root` and
    /// `_parent` preloads resolve against it.
    base_target: Option<DisplayHandle>,
}

impl Avm1Function {
    pub fn from_df1(
        swf_version: u8,
        data: CodeSlice,
        name: &str,
        params: Vec<Rc<str>>,
        scope: Rc<Vec<ObjectId>>,
        base_target: Option<DisplayHandle>,
    ) -> Self {
        Self {
            swf_version,
            data,
            name: non_empty(name),
            is_function2: false,
            register_count: 0,
            flags: FunctionFlags::empty(),
            params: params
                .into_iter()
                .map(|name| Param {
                    register: None,
                    name,
                })
                .collect(),
            scope,
            base_target,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_df2(
        swf_version: u8,
        data: CodeSlice,
        name: &str,
        register_count: u8,
        flags: FunctionFlags,
        params: Vec<Param>,
        scope: Rc<Vec<ObjectId>>,
        base_target: Option<DisplayHandle>,
    ) -> Self {
        Self {
            swf_version,
            data,
            name: non_empty(name),
            is_function2: true,
            register_count,
            flags,
            params,
            scope,
            base_target,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn data(&self) -> CodeSlice {
        self.data.clone()
    }

    pub fn scope(&self) -> Rc<Vec<ObjectId>> {
        Rc::clone(&self.scope)
    }

    pub fn swf_version(&self) -> u8 {
        self.swf_version
    }
}

impl fmt::Debug for Avm1Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Avm1Function")
            .field("name", &self.name)
            .field("is_function2", &self.is_function2)
            .field("register_count", &self.register_count)
            .field("params", &self.params.len())
            .finish()
    }
}

fn non_empty(name: &str) -> Option<Rc<str>> {
    if name.is_empty() {
        None
    } else {
        Some(name.into())
    }
}

/// What a function object actually runs when called.
#[derive(Clone)]
pub enum Executable {
    Native(NativeFunction),
    Action(Rc<Avm1Function>),
}

impl Executable {
    pub fn trace(&self, mark: &mut dyn FnMut(ObjectId)) {
        if let Executable::Action(af) = self {
            for id in af.scope.iter() {
                mark(*id);
            }
        }
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Executable::Native(nf) => f
                .debug_tuple("Executable::Native")
                .field(&format_args!("{:p}", nf))
                .finish(),
            Executable::Action(af) => f.debug_tuple("Executable::Action").field(af).finish(),
        }
    }
}

pub fn is_callable(ctx: &VmContext, value: &Value) -> bool {
    value
        .as_object_id()
        .map(|id| ctx.object(id).executable.is_some())
        .unwrap_or(false)
}

/// Call the function object `func`. Non-callables yield `undefined` with
/// a diagnostic, matching the reference player.
pub fn call_object(
    ctx: &mut VmContext,
    env: &mut Environment,
    func: ObjectId,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let executable = match &ctx.object(func).executable {
        Some(executable) => executable.clone(),
        None => {
            log_ascoding!("Attempt to call a non-function object");
            return Ok(Value::Undefined);
        }
    };
    exec(ctx, env, &executable, func, this, args)
}

/// Run an executable with a fresh call frame.
pub fn exec(
    ctx: &mut VmContext,
    env: &mut Environment,
    executable: &Executable,
    func: ObjectId,
    this: Value,
    args: &[Value],
) -> Result<Value, Error> {
    let af = match executable {
        Executable::Native(nf) => return nf(ctx, env, this, args),
        Executable::Action(af) => Rc::clone(af),
    };

    let caller_version = env.swf_version();
    let callee_version = if caller_version > 5 {
        af.swf_version
    } else {
        caller_version
    };

    let locals = ctx.alloc_object(None, callee_version);
    let registers = if af.is_function2 {
        Some(vec![Value::Undefined; usize::from(af.register_count)])
    } else {
        None
    };
    env.push_call_frame(CallFrame {
        function: Some(func),
        locals,
        registers,
    })?;
    env.set_swf_version(callee_version);

    let result = run_body(ctx, env, &af, this, args, locals);

    // Every exit path drops the frame and restores the caller's version.
    env.pop_call_frame();
    env.set_swf_version(caller_version);
    result
}

fn run_body(
    ctx: &mut VmContext,
    env: &mut Environment,
    af: &Avm1Function,
    this: Value,
    args: &[Value],
    locals: ObjectId,
) -> Result<Value, Error> {
    let version = env.swf_version();
    let define_local = |ctx: &mut VmContext, name: &str, value: Value| {
        object::define_value(ctx, locals, name, value, Attribute::empty());
    };

    let super_value = if version > 5
        && (!af.flags.contains(FunctionFlags::SUPPRESS_SUPER)
            || af.flags.contains(FunctionFlags::PRELOAD_SUPER))
    {
        make_super(ctx, &this)
    } else {
        None
    };

    if !af.is_function2 {
        for (i, param) in af.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Undefined);
            define_local(ctx, &param.name, value);
        }
        define_local(ctx, "this", this.clone());
        if version > 5 {
            let sup = super_value
                .map(Value::Function)
                .unwrap_or(Value::Undefined);
            define_local(ctx, "super", sup);
        }
        let arguments = make_arguments(ctx, env, args);
        define_local(ctx, "arguments", Value::Object(arguments));
    } else {
        // Implicit preloads occupy registers from r1 up, in this fixed
        // order, before parameters are bound (a parameter register that
        // clashes with a preload wins). Preload beats suppress when a
        // movie sets both.
        let mut current_reg = 1u8;
        if af.flags.contains(FunctionFlags::PRELOAD_THIS) {
            env.set_local_register(current_reg, this.clone());
            current_reg += 1;
        }
        if !af.flags.contains(FunctionFlags::SUPPRESS_THIS) {
            define_local(ctx, "this", this.clone());
        }

        if af.flags.contains(FunctionFlags::PRELOAD_ARGUMENTS)
            || !af.flags.contains(FunctionFlags::SUPPRESS_ARGUMENTS)
        {
            let arguments = make_arguments(ctx, env, args);
            if af.flags.contains(FunctionFlags::PRELOAD_ARGUMENTS) {
                env.set_local_register(current_reg, Value::Object(arguments));
                current_reg += 1;
            }
            if !af.flags.contains(FunctionFlags::SUPPRESS_ARGUMENTS) {
                define_local(ctx, "arguments", Value::Object(arguments));
            }
        }

        if version > 5 {
            let sup = super_value
                .map(Value::Function)
                .unwrap_or(Value::Undefined);
            if af.flags.contains(FunctionFlags::PRELOAD_SUPER) {
                env.set_local_register(current_reg, sup.clone());
                current_reg += 1;
            }
            if !af.flags.contains(FunctionFlags::SUPPRESS_SUPER) {
                define_local(ctx, "super", sup);
            }
        }

        if af.flags.contains(FunctionFlags::PRELOAD_ROOT) {
            let root = ctx.display.root();
            env.set_local_register(current_reg, ctx.clip_value(root));
            current_reg += 1;
        }
        if af.flags.contains(FunctionFlags::PRELOAD_PARENT) {
            // An absent _parent (a root timeline) is not pushed at all;
            // the next preload takes this register.
            let parent = af
                .base_target
                .or_else(|| env.target())
                .and_then(|node| ctx.display.parent(node));
            if let Some(parent) = parent {
                env.set_local_register(current_reg, ctx.clip_value(parent));
                current_reg += 1;
            }
        }
        if af.flags.contains(FunctionFlags::PRELOAD_GLOBAL) {
            let globals = ctx.globals;
            env.set_local_register(current_reg, object::object_value(ctx, globals));
        }

        for (i, param) in af.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Undefined);
            match param.register {
                Some(register) => {
                    if args.get(i).is_some() {
                        env.set_local_register(register, value);
                    }
                }
                None => define_local(ctx, &param.name, value),
            }
        }
    }

    // The callee sees its declaration-time scope, with the fresh locals
    // on top from SWF 6 up.
    let mut scope: Vec<ObjectId> = af.scope().to_vec();
    if version > 5 {
        scope.push(locals);
    }

    Interpreter::new(ctx, env, af.data(), scope, this).run()
}

/// The `arguments` array object with its `callee` back-pointer.
fn make_arguments(ctx: &mut VmContext, env: &Environment, args: &[Value]) -> ObjectId {
    let proto = ctx.prototypes.object;
    let arguments = ctx.alloc_object(Some(proto), env.swf_version());
    for (i, arg) in args.iter().enumerate() {
        object::define_value(
            ctx,
            arguments,
            &i.to_string(),
            arg.clone(),
            Attribute::DONT_DELETE,
        );
    }
    object::define_value(
        ctx,
        arguments,
        "length",
        Value::from(args.len()),
        Attribute::DONT_DELETE | Attribute::DONT_ENUM,
    );
    if let Some(callee) = env.current_function() {
        object::define_value(
            ctx,
            arguments,
            "callee",
            Value::Function(callee),
            Attribute::DONT_DELETE | Attribute::DONT_ENUM,
        );
    }
    arguments
}

/// Build the `super` view of `this`: an object that resolves members
/// starting one step above the receiver's prototype and calls the base
/// constructor when invoked. `typeof` reports it as a plain object.
fn make_super(ctx: &mut VmContext, this: &Value) -> Option<ObjectId> {
    let this_id = this.coerce_to_object(ctx)?;
    let base_proto = ctx.object(this_id).proto?;
    let base_data = ctx.object(base_proto);
    let super_proto = base_data.proto;
    let constructor = base_data.constructor;
    let executable = constructor.and_then(|c| ctx.object(c).executable.clone());

    let swf_version = ctx.object(this_id).swf_version;
    let sup = ctx.alloc_object(super_proto, swf_version);
    let data = ctx.object_mut(sup);
    data.executable = executable;
    data.constructor = constructor;
    data.is_super = true;
    Some(sup)
}

/// The `new` operator: allocate an object wired to the function's
/// `prototype`, run the constructor, and honor an object-valued return.
pub fn construct(
    ctx: &mut VmContext,
    env: &mut Environment,
    ctor: ObjectId,
    args: &[Value],
) -> Result<Value, Error> {
    let proto = object::get_stored(ctx, ctor, "prototype")
        .and_then(|v| v.as_object_id())
        .or(Some(ctx.prototypes.object));
    let this = ctx.alloc_object(proto, env.swf_version());
    ctx.object_mut(this).constructor = Some(ctor);
    object::define_value(
        ctx,
        this,
        "__constructor__",
        object::object_value(ctx, ctor),
        Attribute::DONT_ENUM,
    );

    let result = call_object(ctx, env, ctor, Value::Object(this), args)?;
    match result {
        Value::Object(id) => Ok(Value::Object(id)),
        _ => Ok(Value::Object(this)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::with_vm;

    fn returns_this_plus_first_arg(
        ctx: &mut VmContext,
        env: &mut Environment,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Error> {
        let this_n = match &this {
            Value::Object(id) => {
                object::get_member(ctx, env, *id, "n")?.unwrap_or(Value::Undefined)
            }
            _ => Value::Undefined,
        };
        let a = this_n.coerce_to_f64(ctx, env)?;
        let b = args
            .get(0)
            .cloned()
            .unwrap_or(Value::Undefined)
            .coerce_to_f64(ctx, env)?;
        Ok(Value::Number(a + b))
    }

    #[test]
    fn native_calls_receive_this_and_args() {
        with_vm(7, |ctx, env, _root| {
            let func = ctx.alloc_native_function(returns_this_plus_first_arg);
            let this = ctx.alloc_object(None, 7);
            object::set_member(ctx, env, this, "n", Value::Number(40.0)).unwrap();
            let result = call_object(
                ctx,
                env,
                func,
                Value::Object(this),
                &[Value::Number(2.0)],
            )
            .unwrap();
            assert_eq!(result, Value::Number(42.0));
        });
    }

    #[test]
    fn construct_wires_prototype_and_constructor() {
        with_vm(7, |ctx, env, _root| {
            fn ctor(
                _ctx: &mut VmContext,
                _env: &mut Environment,
                _this: Value,
                _args: &[Value],
            ) -> Result<Value, Error> {
                Ok(Value::Undefined)
            }
            let func = ctx.alloc_function(Executable::Native(ctor), 7);
            let instance = construct(ctx, env, func, &[]).unwrap();
            let id = instance.as_object_id().unwrap();
            let proto = object::get_stored(ctx, func, "prototype")
                .and_then(|v| v.as_object_id())
                .unwrap();
            assert_eq!(ctx.object(id).proto, Some(proto));
            assert!(object::instance_of(ctx, id, func));
        });
    }

    #[test]
    fn constructor_returning_object_replaces_instance() {
        with_vm(7, |ctx, env, _root| {
            fn ctor(
                ctx: &mut VmContext,
                _env: &mut Environment,
                _this: Value,
                _args: &[Value],
            ) -> Result<Value, Error> {
                let replacement = ctx.alloc_object(None, 7);
                Ok(Value::Object(replacement))
            }
            let func = ctx.alloc_function(Executable::Native(ctor), 7);
            let instance = construct(ctx, env, func, &[]).unwrap();
            let id = instance.as_object_id().unwrap();
            // The fresh object was discarded for the returned one.
            assert_eq!(ctx.object(id).constructor, None);
        });
    }

    #[test]
    fn call_depth_is_conserved() {
        with_vm(7, |ctx, env, _root| {
            let func = ctx.alloc_native_function(|_ctx, _env, _this, _args| {
                Ok(Value::Undefined)
            });
            let depth = env.call_depth();
            call_object(ctx, env, func, Value::Undefined, &[]).unwrap();
            assert_eq!(env.call_depth(), depth);
        });
    }
}
