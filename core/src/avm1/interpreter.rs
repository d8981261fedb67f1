//! The bytecode dispatch loop and its opcode handlers.

use crate::avm1::buffer::CodeSlice;
use crate::avm1::display_props;
use crate::avm1::environment::Environment;
use crate::avm1::error::Error;
use crate::avm1::function::{self, Avm1Function, Executable, FunctionFlags, Param};
use crate::avm1::object::{self, ObjectId};
use crate::avm1::opcode::OpCode;
use crate::avm1::property::Attribute;
use crate::avm1::value::{f64_to_wrapping_u32, Value};
use crate::backend::navigator::NavigationMethod;
use crate::context::VmContext;
use crate::display_object::DisplayHandle;
use rand::Rng;
use smallvec::SmallVec;
use std::rc::Rc;

/// One live `with` block: its object and the pc where it expires.
struct WithEntry {
    object: ObjectId,
    end_pc: usize,
}

/// Drives one code slice to completion against an environment.
pub struct Interpreter<'a> {
    ctx: &'a mut VmContext,
    env: &'a mut Environment,
    code: CodeSlice,
    /// The receiver the executing code was invoked with.
    this: Value,
    /// Captured scope chain plus the frame locals, outermost first.
    /// `with` objects live in their own stack and shadow all of it.
    scope: Vec<ObjectId>,
    with_stack: Vec<WithEntry>,
    pc: usize,
    stop_pc: usize,
    next_pc: usize,
    initial_stack_size: usize,
    branch_count: u32,
    returned: Option<Value>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        ctx: &'a mut VmContext,
        env: &'a mut Environment,
        code: CodeSlice,
        scope: Vec<ObjectId>,
        this: Value,
    ) -> Self {
        let pc = code.start;
        let stop_pc = code.end.min(code.buffer.len());
        Self {
            ctx,
            env,
            code,
            this,
            scope,
            with_stack: Vec::new(),
            pc,
            stop_pc,
            next_pc: pc,
            initial_stack_size: 0,
            branch_count: 0,
            returned: None,
        }
    }

    /// Run to the end of the slice or a `Return`. Limit errors abort this
    /// invocation only; thrown values keep propagating toward a `Try`.
    pub fn run(mut self) -> Result<Value, Error> {
        self.initial_stack_size = self.env.stack_size();
        let saved_target = self.env.target();

        let start = self.pc;
        let end = self.stop_pc;
        let result = self.execute_range(start, end);

        self.env.set_target(saved_target);
        self.repair_stack();

        match result {
            Ok(()) => Ok(self.returned.take().unwrap_or(Value::Undefined)),
            Err(error) if error.aborts_invocation() => {
                log_aserror!("Script aborted due to exceeded limit: {}", error);
                Ok(Value::Undefined)
            }
            Err(error) => Err(error),
        }
    }

    /// The dispatch loop over one pc range. `Try` re-enters this for its
    /// sub-blocks, sharing the with-stack, branch counter, and return
    /// channel.
    fn execute_range(&mut self, start: usize, end: usize) -> Result<(), Error> {
        let saved = (self.pc, self.stop_pc, self.next_pc);
        let saved_with_depth = self.with_stack.len();
        self.pc = start;
        self.stop_pc = end.min(self.code.buffer.len());

        let result = self.execute_loop();

        self.with_stack.truncate(saved_with_depth);
        self.pc = saved.0;
        self.stop_pc = saved.1;
        self.next_pc = saved.2;
        result
    }

    fn execute_loop(&mut self) -> Result<(), Error> {
        while self.pc < self.stop_pc && self.returned.is_none() {
            // Expire any `with` blocks the pc has left.
            while matches!(self.with_stack.last(), Some(entry) if self.pc >= entry.end_pc) {
                self.with_stack.pop();
            }

            let action_id = self.code.buffer.get(self.pc);
            if action_id == 0 {
                break;
            }
            let old_pc = self.pc;

            let arg_pc;
            let length;
            if action_id & 0x80 == 0 {
                arg_pc = self.pc + 1;
                length = 0;
                self.next_pc = self.pc + 1;
            } else {
                length = usize::from(self.code.buffer.read_u16(self.pc + 1));
                arg_pc = self.pc + 3;
                self.next_pc = self.pc + 3 + length;
                if self.next_pc > self.stop_pc {
                    log_malformed!(
                        "Length {} of action 0x{:02X} at pc {} overflows the code buffer",
                        length,
                        action_id,
                        self.pc
                    );
                    // Drain the slice without executing anything further.
                    self.pc = self.stop_pc;
                    break;
                }
            }

            match OpCode::from_u8(action_id) {
                Some(op) => self.do_action(op, arg_pc, length)?,
                None => {
                    log_unimpl!("Unknown opcode 0x{:02X}; skipped", action_id);
                }
            }

            self.pc = self.next_pc;
            if self.pc <= old_pc {
                self.branch_count += 1;
                if self.branch_count > self.ctx.options.loop_limit {
                    return Err(Error::ActionLimit(self.ctx.options.loop_limit));
                }
            }
        }
        Ok(())
    }

    /// Put the operand stack back at its entry depth: drop what a
    /// mis-compiled movie over-pushed, synthesize what it under-pushed.
    fn repair_stack(&mut self) {
        let size = self.env.stack_size();
        if size > self.initial_stack_size {
            let extra = size - self.initial_stack_size;
            log_malformed!(
                "{} values left on the stack after block execution; cleaning up",
                extra
            );
            self.env.drop_values(extra);
        } else if size < self.initial_stack_size {
            let missing = self.initial_stack_size - size;
            log_aserror!(
                "Stack smashed: repairing by pushing {} undefined values",
                missing
            );
            self.env.pad_stack(size, missing);
        }
    }

    fn do_action(&mut self, op: OpCode, arg_pc: usize, length: usize) -> Result<(), Error> {
        match op {
            OpCode::End => Ok(()),
            OpCode::NextFrame => self.action_next_frame(),
            OpCode::PreviousFrame => self.action_prev_frame(),
            OpCode::Play => self.action_play(),
            OpCode::Stop => self.action_stop(),
            OpCode::ToggleQuality => self.action_toggle_quality(),
            OpCode::StopSounds => self.action_stop_sounds(),
            OpCode::Add => self.action_add(),
            OpCode::Subtract => self.action_subtract(),
            OpCode::Multiply => self.action_multiply(),
            OpCode::Divide => self.action_divide(),
            OpCode::Equals => self.action_equals(),
            OpCode::Less => self.action_less(),
            OpCode::And => self.action_and(),
            OpCode::Or => self.action_or(),
            OpCode::Not => self.action_not(),
            OpCode::StringEquals => self.action_string_equals(),
            OpCode::StringLength => self.action_string_length(),
            OpCode::StringExtract => self.action_string_extract(),
            OpCode::Pop => self.action_pop(),
            OpCode::ToInteger => self.action_to_integer(),
            OpCode::GetVariable => self.action_get_variable(),
            OpCode::SetVariable => self.action_set_variable(),
            OpCode::SetTarget2 => self.action_set_target2(),
            OpCode::StringAdd => self.action_string_add(),
            OpCode::GetProperty => self.action_get_property(),
            OpCode::SetProperty => self.action_set_property(),
            OpCode::CloneSprite => self.action_clone_sprite(),
            OpCode::RemoveSprite => self.action_remove_sprite(),
            OpCode::Trace => self.action_trace(),
            OpCode::StartDrag => self.action_start_drag(),
            OpCode::EndDrag => self.action_end_drag(),
            OpCode::StringLess => self.action_string_less(),
            OpCode::Throw => self.action_throw(),
            OpCode::CastOp => self.action_cast_op(),
            OpCode::ImplementsOp => self.action_implements_op(),
            OpCode::RandomNumber => self.action_random_number(),
            OpCode::MbStringLength => self.action_mb_string_length(),
            OpCode::CharToAscii => self.action_char_to_ascii(),
            OpCode::AsciiToChar => self.action_ascii_to_char(),
            OpCode::GetTime => self.action_get_time(),
            OpCode::MbStringExtract => self.action_mb_string_extract(),
            OpCode::MbCharToAscii => self.action_char_to_ascii(),
            OpCode::MbAsciiToChar => self.action_ascii_to_char(),
            OpCode::Delete => self.action_delete(),
            OpCode::Delete2 => self.action_delete2(),
            OpCode::DefineLocal => self.action_define_local(),
            OpCode::CallFunction => self.action_call_function(),
            OpCode::Return => self.action_return(),
            OpCode::Modulo => self.action_modulo(),
            OpCode::NewObject => self.action_new_object(),
            OpCode::DefineLocal2 => self.action_define_local2(),
            OpCode::InitArray => self.action_init_array(),
            OpCode::InitObject => self.action_init_object(),
            OpCode::TypeOf => self.action_type_of(),
            OpCode::TargetPath => self.action_target_path(),
            OpCode::Enumerate => self.action_enumerate(),
            OpCode::Add2 => self.action_add2(),
            OpCode::Less2 => self.action_less2(),
            OpCode::Equals2 => self.action_equals2(),
            OpCode::ToNumber => self.action_to_number(),
            OpCode::ToString => self.action_to_string(),
            OpCode::PushDuplicate => self.action_push_duplicate(),
            OpCode::StackSwap => self.action_stack_swap(),
            OpCode::GetMember => self.action_get_member(),
            OpCode::SetMember => self.action_set_member(),
            OpCode::Increment => self.action_increment(),
            OpCode::Decrement => self.action_decrement(),
            OpCode::CallMethod => self.action_call_method(),
            OpCode::NewMethod => self.action_new_method(),
            OpCode::InstanceOf => self.action_instance_of(),
            OpCode::Enumerate2 => self.action_enumerate2(),
            OpCode::BitAnd => self.action_bit_and(),
            OpCode::BitOr => self.action_bit_or(),
            OpCode::BitXor => self.action_bit_xor(),
            OpCode::BitLShift => self.action_bit_lshift(),
            OpCode::BitRShift => self.action_bit_rshift(),
            OpCode::BitUrShift => self.action_bit_urshift(),
            OpCode::StrictEquals => self.action_strict_equals(),
            OpCode::Greater => self.action_greater(),
            OpCode::StringGreater => self.action_string_greater(),
            OpCode::Extends => self.action_extends(),
            OpCode::GotoFrame => self.action_goto_frame(arg_pc),
            OpCode::GetUrl => self.action_get_url(arg_pc),
            OpCode::StoreRegister => self.action_store_register(arg_pc),
            OpCode::ConstantPool => self.action_constant_pool(arg_pc),
            OpCode::WaitForFrame => self.action_wait_for_frame(arg_pc),
            OpCode::SetTarget => self.action_set_target(arg_pc),
            OpCode::GotoLabel => self.action_goto_label(arg_pc),
            OpCode::WaitForFrame2 => self.action_wait_for_frame2(arg_pc),
            OpCode::DefineFunction2 => self.action_define_function2(arg_pc),
            OpCode::Try => self.action_try(arg_pc, length),
            OpCode::With => self.action_with(arg_pc),
            OpCode::Push => self.action_push(arg_pc, length),
            OpCode::Jump => self.action_jump(arg_pc),
            OpCode::GetUrl2 => self.action_get_url2(arg_pc),
            OpCode::DefineFunction => self.action_define_function(arg_pc),
            OpCode::If => self.action_if(arg_pc),
            OpCode::Call => self.action_call(),
            OpCode::GotoFrame2 => self.action_goto_frame2(arg_pc),
        }
    }

    // Small shared helpers.

    fn version(&self) -> u8 {
        self.env.swf_version()
    }

    fn push(&mut self, value: impl Into<Value>) {
        self.env.push(value);
    }

    /// Pop with the underrun repair: an opcode never reaches below this
    /// invocation's entry depth.
    fn pop(&mut self) -> Value {
        if self.env.stack_size() <= self.initial_stack_size {
            log_ascoding!("Stack underrun repaired with undefined");
            return Value::Undefined;
        }
        self.env.pop()
    }

    fn to_f64(&mut self, value: &Value) -> Result<f64, Error> {
        value.coerce_to_f64(self.ctx, self.env)
    }

    fn to_i32(&mut self, value: &Value) -> Result<i32, Error> {
        value.coerce_to_i32(self.ctx, self.env)
    }

    fn to_string(&mut self, value: &Value) -> Result<Rc<str>, Error> {
        value.coerce_to_string(self.ctx, self.env)
    }

    /// The scope the name-resolution walks see: captured chain, locals,
    /// live `with` objects on top.
    fn scope_view(&self) -> SmallVec<[ObjectId; 8]> {
        let mut view: SmallVec<[ObjectId; 8]> =
            self.scope.iter().copied().collect();
        view.extend(self.with_stack.iter().map(|entry| entry.object));
        view
    }

    /// The value bound as `this` for unqualified calls: the scripted
    /// object of the current target, or the invocation's own receiver
    /// when the target has none.
    fn target_this(&self) -> Value {
        match self.env.target_object(self.ctx) {
            Some(obj) => object::object_value(self.ctx, obj),
            None => self.this.clone(),
        }
    }

    fn pop_args(&mut self) -> Result<Vec<Value>, Error> {
        let count = self.pop();
        let count = self.to_f64(&count)?;
        let count = if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        };
        let available = self
            .env
            .stack_size()
            .saturating_sub(self.initial_stack_size);
        if count > available {
            log_ascoding!(
                "Call with {} arguments but only {} on the stack",
                count,
                available
            );
        }
        let count = count.min(available);
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop());
        }
        Ok(args)
    }

    fn resolve_target_value(&mut self, value: &Value) -> Result<Option<DisplayHandle>, Error> {
        match value {
            Value::MovieClip(clip) => Ok(clip.resolve(&*self.ctx.display)),
            _ => {
                let path = self.to_string(value)?;
                Ok(self.env.find_target(self.ctx, &path))
            }
        }
    }

    // Arithmetic.

    fn action_add(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? + self.to_f64(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_subtract(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? - self.to_f64(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_multiply(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? * self.to_f64(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_divide(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        // IEEE semantics: x/0 is an infinity, 0/0 is NaN.
        let result = self.to_f64(&a)? / self.to_f64(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_modulo(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? % self.to_f64(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_add2(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let a_prim = match a.to_primitive(self.ctx, self.env, None) {
            Ok(v) => v,
            Err(Error::Coercion) => a.clone(),
            Err(e) => return Err(e),
        };
        let b_prim = match b.to_primitive(self.ctx, self.env, None) {
            Ok(v) => v,
            Err(Error::Coercion) => b.clone(),
            Err(e) => return Err(e),
        };
        if matches!(a_prim, Value::String(_)) || matches!(b_prim, Value::String(_)) {
            let mut out = self.to_string(&a_prim)?.to_string();
            out.push_str(&self.to_string(&b_prim)?);
            self.push(out);
        } else {
            let version = self.version();
            let result =
                a_prim.primitive_to_number(version) + b_prim.primitive_to_number(version);
            self.push(result);
        }
        Ok(())
    }

    fn action_increment(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_f64(&a)? + 1.0;
        self.push(result);
        Ok(())
    }

    fn action_decrement(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_f64(&a)? - 1.0;
        self.push(result);
        Ok(())
    }

    fn action_to_integer(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_f64(&a)?.trunc();
        self.push(result);
        Ok(())
    }

    fn action_to_number(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_f64(&a)?;
        self.push(result);
        Ok(())
    }

    fn action_to_string(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_string(&a)?;
        self.push(result);
        Ok(())
    }

    // Logical and bitwise.

    fn action_and(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? != 0.0 && self.to_f64(&b)? != 0.0;
        let version = self.version();
        self.push(Value::from_bool(result, version));
        Ok(())
    }

    fn action_or(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? != 0.0 || self.to_f64(&b)? != 0.0;
        let version = self.version();
        self.push(Value::from_bool(result, version));
        Ok(())
    }

    fn action_not(&mut self) -> Result<(), Error> {
        let version = self.version();
        let a = self.pop();
        if version >= 5 {
            let result = !a.as_bool(version);
            self.push(result);
        } else {
            let result = self.to_f64(&a)? == 0.0;
            self.push(Value::from_bool(result, version));
        }
        Ok(())
    }

    fn action_bit_and(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_i32(&a)? & self.to_i32(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_bit_or(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_i32(&a)? | self.to_i32(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_bit_xor(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_i32(&a)? ^ self.to_i32(&b)?;
        self.push(result);
        Ok(())
    }

    fn action_bit_lshift(&mut self) -> Result<(), Error> {
        let count = self.pop();
        let value = self.pop();
        let count = self.to_i32(&count)? & 0x1F;
        let result = self.to_i32(&value)?.wrapping_shl(count as u32);
        self.push(result);
        Ok(())
    }

    fn action_bit_rshift(&mut self) -> Result<(), Error> {
        let count = self.pop();
        let value = self.pop();
        let count = self.to_i32(&count)? & 0x1F;
        let result = self.to_i32(&value)? >> count;
        self.push(result);
        Ok(())
    }

    fn action_bit_urshift(&mut self) -> Result<(), Error> {
        let count = self.pop();
        let value = self.pop();
        let count = self.to_i32(&count)? & 0x1F;
        let value = self.to_f64(&value)?;
        let result = f64_to_wrapping_u32(value) >> count;
        self.push(result);
        Ok(())
    }

    // Comparisons.

    fn action_equals(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? == self.to_f64(&b)?;
        let version = self.version();
        self.push(Value::from_bool(result, version));
        Ok(())
    }

    fn action_less(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_f64(&a)? < self.to_f64(&b)?;
        let version = self.version();
        self.push(Value::from_bool(result, version));
        Ok(())
    }

    fn action_less2(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = a.abstract_lt(&b, self.ctx, self.env)?;
        self.push(result);
        Ok(())
    }

    fn action_greater(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = b.abstract_lt(&a, self.ctx, self.env)?;
        self.push(result);
        Ok(())
    }

    fn action_equals2(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = a.abstract_eq(&b, self.ctx, self.env)?;
        self.push(result);
        Ok(())
    }

    fn action_strict_equals(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = a.strict_equals(&b, self.ctx);
        self.push(result);
        Ok(())
    }

    // String operations.

    fn action_string_equals(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_string(&a)? == self.to_string(&b)?;
        let version = self.version();
        self.push(Value::from_bool(result, version));
        Ok(())
    }

    fn action_string_less(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_string(&a)?.as_bytes() < self.to_string(&b)?.as_bytes();
        let version = self.version();
        self.push(Value::from_bool(result, version));
        Ok(())
    }

    fn action_string_greater(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let result = self.to_string(&a)?.as_bytes() > self.to_string(&b)?.as_bytes();
        self.push(result);
        Ok(())
    }

    fn action_string_add(&mut self) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let mut result = self.to_string(&a)?.to_string();
        result.push_str(&self.to_string(&b)?);
        self.push(result);
        Ok(())
    }

    fn action_string_length(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_string(&a)?.len();
        self.push(result);
        Ok(())
    }

    fn action_mb_string_length(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let result = self.to_string(&a)?.chars().count();
        self.push(result);
        Ok(())
    }

    fn action_string_extract(&mut self) -> Result<(), Error> {
        let count = self.pop();
        let index = self.pop();
        let s = self.pop();
        let s = self.to_string(&s)?;
        let count = self.to_f64(&count)?;
        let index = self.to_f64(&index)?;
        // Index is 1-based; anything out of range yields the empty string.
        let start = if index.is_finite() && index >= 1.0 {
            index as usize - 1
        } else {
            0
        };
        let count = if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        };
        let result: String = s.chars().skip(start).take(count).collect();
        self.push(result);
        Ok(())
    }

    fn action_mb_string_extract(&mut self) -> Result<(), Error> {
        self.action_string_extract()
    }

    fn action_char_to_ascii(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let s = self.to_string(&a)?;
        let code = s.chars().next().map(|c| c as u32).unwrap_or(0);
        self.push(code);
        Ok(())
    }

    fn action_ascii_to_char(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let code = self.to_f64(&a)?;
        let code = f64_to_wrapping_u32(code) as u16;
        let result: String = std::char::from_u32(u32::from(code))
            .map(|c| c.to_string())
            .unwrap_or_default();
        self.push(result);
        Ok(())
    }

    // Stack manipulation.

    fn action_push(&mut self, arg_pc: usize, length: usize) -> Result<(), Error> {
        let buffer = Rc::clone(&self.code.buffer);
        let end = arg_pc + length;
        let mut cursor = arg_pc;
        while cursor < end {
            let tag = buffer.read_u8(cursor);
            cursor += 1;
            match tag {
                0 => {
                    let (s, next) = buffer.read_string(cursor);
                    cursor = next;
                    self.push(s);
                }
                1 => {
                    let value = buffer.read_f32(cursor);
                    cursor += 4;
                    self.push(value);
                }
                2 => self.push(Value::Null),
                3 => self.push(Value::Undefined),
                4 => {
                    let register = buffer.read_u8(cursor);
                    cursor += 1;
                    let value = self.env.get_register(register);
                    self.push(value);
                }
                5 => {
                    let value = buffer.read_u8(cursor) != 0;
                    cursor += 1;
                    self.push(value);
                }
                6 => {
                    let value = buffer.read_f64_swapped(cursor);
                    cursor += 8;
                    self.push(value);
                }
                7 => {
                    let value = buffer.read_i32(cursor);
                    cursor += 4;
                    self.push(value);
                }
                8 | 9 => {
                    let index = if tag == 8 {
                        let i = usize::from(buffer.read_u8(cursor));
                        cursor += 1;
                        i
                    } else {
                        let i = usize::from(buffer.read_u16(cursor));
                        cursor += 2;
                        i
                    };
                    match buffer.dictionary_get(index) {
                        Some(s) => self.push(s),
                        None => {
                            log_ascoding!(
                                "Constant pool index {} out of range; pushing undefined",
                                index
                            );
                            self.push(Value::Undefined);
                        }
                    }
                }
                _ => {
                    log_malformed!("Unknown push tag {}; rest of payload skipped", tag);
                    break;
                }
            }
        }
        Ok(())
    }

    fn action_pop(&mut self) -> Result<(), Error> {
        self.pop();
        Ok(())
    }

    fn action_push_duplicate(&mut self) -> Result<(), Error> {
        let top = self.env.top(0);
        self.push(top);
        Ok(())
    }

    fn action_stack_swap(&mut self) -> Result<(), Error> {
        let a = self.pop();
        let b = self.pop();
        self.push(a);
        self.push(b);
        Ok(())
    }

    fn action_store_register(&mut self, arg_pc: usize) -> Result<(), Error> {
        let register = self.code.buffer.read_u8(arg_pc);
        // Keeps the value on the stack.
        let value = self.env.top(0);
        self.env.set_register(register, value);
        Ok(())
    }

    // Variables and members.

    fn action_get_variable(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let scope = self.scope_view();
        let value = self.env.get_variable(self.ctx, &name, &scope)?;
        self.push(value);
        Ok(())
    }

    fn action_set_variable(&mut self) -> Result<(), Error> {
        let value = self.pop();
        let name = self.pop();
        let name = self.to_string(&name)?;
        let scope = self.scope_view();
        self.env.set_variable(self.ctx, &name, value, &scope)
    }

    fn action_define_local(&mut self) -> Result<(), Error> {
        let value = self.pop();
        let name = self.pop();
        let name = self.to_string(&name)?;
        if self.env.in_function() {
            self.env.set_local(self.ctx, &name, value)
        } else {
            let scope = self.scope_view();
            self.env.set_variable(self.ctx, &name, value, &scope)
        }
    }

    fn action_define_local2(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        self.env.declare_local(self.ctx, &name)
    }

    fn action_delete(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let target = self.pop();
        let deleted = match target.coerce_to_object(self.ctx) {
            Some(obj) => object::delete_member(self.ctx, obj, &name).1,
            None => {
                log_ascoding!("Delete applied to a non-object");
                false
            }
        };
        self.push(deleted);
        Ok(())
    }

    fn action_delete2(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let scope = self.scope_view();
        let deleted = self.env.delete_variable(self.ctx, &name, &scope);
        self.push(deleted);
        Ok(())
    }

    fn action_get_member(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let target = self.pop();
        match target.coerce_to_object(self.ctx) {
            Some(obj) => {
                let value = object::get_member(self.ctx, self.env, obj, &name)?
                    .unwrap_or(Value::Undefined);
                self.push(value);
            }
            None => {
                log_ascoding!("GetMember {:?} on a non-object", name);
                self.push(Value::Undefined);
            }
        }
        Ok(())
    }

    fn action_set_member(&mut self) -> Result<(), Error> {
        let value = self.pop();
        let name = self.pop();
        let name = self.to_string(&name)?;
        let target = self.pop();
        match target.coerce_to_object(self.ctx) {
            Some(obj) => object::set_member(self.ctx, self.env, obj, &name, value),
            None => {
                log_ascoding!("SetMember {:?} on a non-object", name);
                Ok(())
            }
        }
    }

    fn action_enumerate(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        self.push(Value::Undefined);
        let scope = self.scope_view();
        let value = self.env.get_variable(self.ctx, &name, &scope)?;
        self.enumerate_object(&value)
    }

    fn action_enumerate2(&mut self) -> Result<(), Error> {
        let value = self.pop();
        self.push(Value::Undefined);
        self.enumerate_object(&value)
    }

    fn enumerate_object(&mut self, value: &Value) -> Result<(), Error> {
        match value.coerce_to_object(self.ctx) {
            Some(obj) => {
                for key in object::get_keys(self.ctx, obj) {
                    self.push(key);
                }
            }
            None => log_ascoding!("Enumerate on a non-object"),
        }
        Ok(())
    }

    // Magic properties by index.

    fn action_get_property(&mut self) -> Result<(), Error> {
        let index = self.pop();
        let index = self.to_f64(&index)? as usize;
        let path = self.pop();
        let target = self.resolve_target_value(&path)?;
        let value = match (target, display_props::get_by_index(index)) {
            (Some(node), Some(prop)) => (prop.get)(self.ctx, self.env, node),
            (_, None) => {
                log_ascoding!("GetProperty with unknown index {}", index);
                Value::Undefined
            }
            (None, _) => {
                log_ascoding!("GetProperty target not found");
                Value::Undefined
            }
        };
        self.push(value);
        Ok(())
    }

    fn action_set_property(&mut self) -> Result<(), Error> {
        let value = self.pop();
        let index = self.pop();
        let index = self.to_f64(&index)? as usize;
        let path = self.pop();
        let target = self.resolve_target_value(&path)?;
        match (target, display_props::get_by_index(index)) {
            (Some(node), Some(prop)) => {
                if let Some(setter) = prop.set {
                    setter(self.ctx, self.env, node, value)?;
                }
            }
            (_, None) => log_ascoding!("SetProperty with unknown index {}", index),
            (None, _) => log_ascoding!("SetProperty target not found"),
        }
        Ok(())
    }

    // Invocation.

    fn action_call_function(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let args = self.pop_args()?;
        let scope = self.scope_view();
        let function = self.env.get_variable(self.ctx, &name, &scope)?;
        if !function::is_callable(self.ctx, &function) {
            log_ascoding!("CallFunction: {:?} is not a function", name);
        }
        let this = self.target_this();
        let result = function.call(self.ctx, self.env, this, &args)?;
        self.push(result);
        Ok(())
    }

    fn action_call_method(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let object_val = self.pop();
        let args = self.pop_args()?;
        let name = self.to_string(&name)?;

        let result = if name.is_empty() {
            // An empty method name invokes the object itself.
            object_val.call(self.ctx, self.env, object_val.clone(), &args)?
        } else {
            match object_val.coerce_to_object(self.ctx) {
                Some(obj) => {
                    let method = object::get_member(self.ctx, self.env, obj, &name)?
                        .unwrap_or(Value::Undefined);
                    method.call(self.ctx, self.env, object_val.clone(), &args)?
                }
                None => {
                    log_ascoding!("CallMethod {:?} on a non-object", name);
                    Value::Undefined
                }
            }
        };
        self.push(result);
        Ok(())
    }

    fn action_new_object(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let args = self.pop_args()?;
        let scope = self.scope_view();
        let constructor = self.env.get_variable(self.ctx, &name, &scope)?;
        let result = match constructor.as_object_id() {
            Some(ctor) if function::is_callable(self.ctx, &constructor) => {
                function::construct(self.ctx, self.env, ctor, &args)?
            }
            _ => {
                log_ascoding!("NewObject: {:?} is not a constructor", name);
                Value::Undefined
            }
        };
        self.push(result);
        Ok(())
    }

    fn action_new_method(&mut self) -> Result<(), Error> {
        let name = self.pop();
        let name = self.to_string(&name)?;
        let object_val = self.pop();
        let args = self.pop_args()?;

        let constructor = if name.is_empty() {
            // The object itself is the constructor.
            object_val.clone()
        } else {
            match object_val.coerce_to_object(self.ctx) {
                Some(obj) => object::get_member(self.ctx, self.env, obj, &name)?
                    .unwrap_or(Value::Undefined),
                None => Value::Undefined,
            }
        };
        let result = match constructor.as_object_id() {
            Some(ctor) if function::is_callable(self.ctx, &constructor) => {
                function::construct(self.ctx, self.env, ctor, &args)?
            }
            _ => {
                log_ascoding!("NewMethod: {:?} is not a constructor", name);
                Value::Undefined
            }
        };
        self.push(result);
        Ok(())
    }

    fn action_init_object(&mut self) -> Result<(), Error> {
        let count = self.pop();
        let count = self.to_f64(&count)?;
        let count = if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        };
        let version = self.version();
        let proto = self.ctx.prototypes.object;
        let obj = self.ctx.alloc_object(Some(proto), version);
        for _ in 0..count {
            let value = self.pop();
            let name = self.pop();
            let name = self.to_string(&name)?;
            object::set_member(self.ctx, self.env, obj, &name, value)?;
        }
        self.push(Value::Object(obj));
        Ok(())
    }

    fn action_init_array(&mut self) -> Result<(), Error> {
        let count = self.pop();
        let count = self.to_f64(&count)?;
        let count = if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        };
        let version = self.version();
        let proto = self.ctx.prototypes.object;
        let array = self.ctx.alloc_object(Some(proto), version);
        for i in 0..count {
            let element = self.pop();
            object::define_value(
                self.ctx,
                array,
                &i.to_string(),
                element,
                Attribute::empty(),
            );
        }
        object::define_value(
            self.ctx,
            array,
            "length",
            Value::from(count),
            Attribute::DONT_ENUM | Attribute::DONT_DELETE,
        );
        self.push(Value::Object(array));
        Ok(())
    }

    fn action_return(&mut self) -> Result<(), Error> {
        let value = self.pop();
        self.returned = Some(value);
        Ok(())
    }

    // Types and inheritance.

    fn action_type_of(&mut self) -> Result<(), Error> {
        let value = self.pop();
        let result = value.type_of(self.ctx);
        self.push(result);
        Ok(())
    }

    fn action_instance_of(&mut self) -> Result<(), Error> {
        let constructor = self.pop();
        let value = self.pop();
        let result = match (value.coerce_to_object(self.ctx), constructor.as_object_id()) {
            (Some(obj), Some(ctor)) => object::instance_of(self.ctx, obj, ctor),
            _ => false,
        };
        self.push(result);
        Ok(())
    }

    fn action_cast_op(&mut self) -> Result<(), Error> {
        let constructor = self.pop();
        let value = self.pop();
        let is_instance = match (value.coerce_to_object(self.ctx), constructor.as_object_id())
        {
            (Some(obj), Some(ctor)) => object::instance_of(self.ctx, obj, ctor),
            _ => false,
        };
        if is_instance {
            self.push(value);
        } else {
            self.push(Value::Null);
        }
        Ok(())
    }

    fn action_implements_op(&mut self) -> Result<(), Error> {
        let constructor = self.pop();
        let count = self.pop();
        let count = self.to_f64(&count)?;
        let count = if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        };
        let mut interfaces = Vec::with_capacity(count);
        for _ in 0..count {
            let iface = self.pop();
            if let Some(iface) = iface.as_object_id() {
                if let Some(proto) =
                    object::get_stored(self.ctx, iface, "prototype").and_then(|v| v.as_object_id())
                {
                    interfaces.push(proto);
                }
            }
        }
        match constructor
            .as_object_id()
            .and_then(|ctor| object::get_stored(self.ctx, ctor, "prototype"))
            .and_then(|v| v.as_object_id())
        {
            Some(proto) => self.ctx.object_mut(proto).interfaces = interfaces,
            None => log_ascoding!("ImplementsOp on a constructor without a prototype"),
        }
        Ok(())
    }

    fn action_extends(&mut self) -> Result<(), Error> {
        let superclass = self.pop();
        let subclass = self.pop();
        let (sup, sub) = match (superclass.as_object_id(), subclass.as_object_id()) {
            (Some(sup), Some(sub)) => (sup, sub),
            _ => {
                log_ascoding!("Extends applied to non-functions");
                return Ok(());
            }
        };
        let super_proto = object::get_stored(self.ctx, sup, "prototype")
            .and_then(|v| v.as_object_id());
        let version = self.version();
        let proto = self.ctx.alloc_object(super_proto, version);
        self.ctx.object_mut(proto).constructor = Some(sup);
        object::define_value(
            self.ctx,
            proto,
            "constructor",
            object::object_value(self.ctx, sup),
            Attribute::DONT_ENUM,
        );
        object::define_value(
            self.ctx,
            proto,
            "__constructor__",
            object::object_value(self.ctx, sup),
            Attribute::DONT_ENUM,
        );
        object::define_value(
            self.ctx,
            sub,
            "prototype",
            Value::Object(proto),
            Attribute::DONT_ENUM,
        );
        Ok(())
    }

    // Control flow.

    fn action_jump(&mut self, arg_pc: usize) -> Result<(), Error> {
        let offset = i64::from(self.code.buffer.read_i16(arg_pc));
        self.branch(offset);
        Ok(())
    }

    fn action_if(&mut self, arg_pc: usize) -> Result<(), Error> {
        let offset = i64::from(self.code.buffer.read_i16(arg_pc));
        let condition = self.pop();
        if condition.as_bool(self.version()) {
            self.branch(offset);
        }
        Ok(())
    }

    fn branch(&mut self, offset: i64) {
        let destination = self.next_pc as i64 + offset;
        if destination < 0 || destination as usize > self.code.buffer.len() {
            log_malformed!("Branch to {} outside the code buffer", destination);
            self.next_pc = self.stop_pc;
        } else {
            self.next_pc = destination as usize;
        }
    }

    fn action_wait_for_frame(&mut self, arg_pc: usize) -> Result<(), Error> {
        let frame = self.code.buffer.read_u16(arg_pc);
        let skip_count = self.code.buffer.read_u8(arg_pc + 2);
        let loaded = match self.env.target() {
            Some(target) => self.ctx.display.frame_loaded(target, frame.saturating_add(1)),
            None => true,
        };
        if !loaded {
            self.skip_actions(skip_count);
        }
        Ok(())
    }

    fn action_wait_for_frame2(&mut self, arg_pc: usize) -> Result<(), Error> {
        let skip_count = self.code.buffer.read_u8(arg_pc);
        let frame = self.pop();
        let frame = frame.coerce_to_u16(self.ctx, self.env)?;
        let loaded = match self.env.target() {
            Some(target) => self.ctx.display.frame_loaded(target, frame.saturating_add(1)),
            None => true,
        };
        if !loaded {
            self.skip_actions(skip_count);
        }
        Ok(())
    }

    /// Skip whole action tags, not bytes; tags are variable length so
    /// they are walked one at a time.
    fn skip_actions(&mut self, count: u8) {
        for _ in 0..count {
            if self.next_pc >= self.stop_pc {
                log_malformed!("End of action block hit while skipping tags");
                self.next_pc = self.stop_pc;
                return;
            }
            let action_id = self.code.buffer.get(self.next_pc);
            if action_id & 0x80 == 0 {
                self.next_pc += 1;
            } else {
                let length = usize::from(self.code.buffer.read_u16(self.next_pc + 1));
                self.next_pc += 3 + length;
            }
        }
    }

    // Exceptions.

    fn action_throw(&mut self) -> Result<(), Error> {
        let value = self.pop();
        Err(Error::ThrownValue(value))
    }

    fn action_try(&mut self, arg_pc: usize, length: usize) -> Result<(), Error> {
        let buffer = Rc::clone(&self.code.buffer);
        let flags = buffer.read_u8(arg_pc);
        let has_catch = flags & 0x01 != 0;
        let has_finally = flags & 0x02 != 0;
        let catch_in_register = flags & 0x04 != 0;
        let try_size = usize::from(buffer.read_u16(arg_pc + 1));
        let catch_size = usize::from(buffer.read_u16(arg_pc + 3));
        let finally_size = usize::from(buffer.read_u16(arg_pc + 5));
        let (catch_name, catch_register) = if catch_in_register {
            (None, Some(buffer.read_u8(arg_pc + 7)))
        } else {
            let (name, _) = buffer.read_string(arg_pc + 7);
            (Some(name), None)
        };
        let _ = length;

        let try_start = self.next_pc;
        let catch_start = try_start + try_size;
        let finally_start = catch_start + if has_catch { catch_size } else { 0 };
        let block_end = finally_start + if has_finally { finally_size } else { 0 };
        self.next_pc = block_end;

        let mut result = self.execute_range(try_start, catch_start);

        if has_catch {
            let thrown = match &result {
                Err(Error::ThrownValue(value)) => Some(value.clone()),
                // A failed coercion becomes a catchable TypeError here.
                Err(Error::Coercion) => Some(Value::from("TypeError")),
                _ => None,
            };
            if let Some(value) = thrown {
                match (catch_register, &catch_name) {
                    (Some(register), _) => self.env.set_register(register, value),
                    (None, Some(name)) => {
                        let name = Rc::clone(name);
                        self.env.set_local(self.ctx, &name, value)?;
                    }
                    (None, None) => {}
                }
                result = self.execute_range(catch_start, finally_start);
            }
        }

        if has_finally {
            let finally_result = self.execute_range(finally_start, block_end);
            if finally_result.is_err() {
                return finally_result;
            }
        }
        result
    }

    // Scope.

    fn action_with(&mut self, arg_pc: usize) -> Result<(), Error> {
        let block_length = usize::from(self.code.buffer.read_u16(arg_pc));
        let target = self.pop();
        match target.coerce_to_object(self.ctx) {
            Some(object) => {
                // The depth limit is a diagnostic, never enforced.
                let warn_depth = if self.version() <= 5 {
                    self.ctx.options.with_stack_warn_swf5
                } else {
                    self.ctx.options.with_stack_warn_swf6
                };
                if self.with_stack.len() >= warn_depth {
                    log_ascoding!(
                        "'with' stack depth {} exceeds the advisory limit {} for SWF {}",
                        self.with_stack.len() + 1,
                        warn_depth,
                        self.version()
                    );
                }
                self.with_stack.push(WithEntry {
                    object,
                    end_pc: self.next_pc + block_length,
                });
            }
            None => {
                log_ascoding!("'with' applied to a non-object; block skipped");
                self.next_pc += block_length;
            }
        }
        Ok(())
    }

    fn action_define_function(&mut self, arg_pc: usize) -> Result<(), Error> {
        let buffer = Rc::clone(&self.code.buffer);
        let (name, mut cursor) = buffer.read_string(arg_pc);
        let param_count = usize::from(buffer.read_u16(cursor));
        cursor += 2;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            let (param, next) = buffer.read_string(cursor);
            cursor = next;
            params.push(param);
        }
        let body_length = usize::from(buffer.read_u16(cursor));

        let body = self.code.subslice(self.next_pc, self.next_pc + body_length);
        self.next_pc += body_length;

        let function = Avm1Function::from_df1(
            self.version(),
            body,
            &name,
            params,
            Rc::new(self.scope.clone()),
            self.env.target(),
        );
        self.finish_function_definition(&name, function)
    }

    fn action_define_function2(&mut self, arg_pc: usize) -> Result<(), Error> {
        let buffer = Rc::clone(&self.code.buffer);
        let (name, mut cursor) = buffer.read_string(arg_pc);
        let param_count = usize::from(buffer.read_u16(cursor));
        cursor += 2;
        let register_count = buffer.read_u8(cursor);
        cursor += 1;
        let flags = FunctionFlags::from_bits_truncate(buffer.read_u16(cursor));
        cursor += 2;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            let register = buffer.read_u8(cursor);
            cursor += 1;
            let (param_name, next) = buffer.read_string(cursor);
            cursor = next;
            params.push(Param {
                register: if register == 0 { None } else { Some(register) },
                name: param_name,
            });
        }
        let body_length = usize::from(buffer.read_u16(cursor));

        let body = self.code.subslice(self.next_pc, self.next_pc + body_length);
        self.next_pc += body_length;

        let function = Avm1Function::from_df2(
            self.version(),
            body,
            &name,
            register_count,
            flags,
            params,
            Rc::new(self.scope.clone()),
            self.env.target(),
        );
        self.finish_function_definition(&name, function)
    }

    /// Anonymous functions go on the stack; named ones are defined in
    /// the current scope.
    fn finish_function_definition(
        &mut self,
        name: &str,
        function: Avm1Function,
    ) -> Result<(), Error> {
        let version = self.version();
        let func = self
            .ctx
            .alloc_function(Executable::Action(Rc::new(function)), version);
        if name.is_empty() {
            self.push(Value::Function(func));
            Ok(())
        } else {
            self.env.set_local(self.ctx, name, Value::Function(func))
        }
    }

    // Timeline and target.

    fn action_set_target(&mut self, arg_pc: usize) -> Result<(), Error> {
        let (path, _) = self.code.buffer.read_string(arg_pc);
        self.retarget(&path);
        Ok(())
    }

    fn action_set_target2(&mut self) -> Result<(), Error> {
        let target = self.pop();
        match &target {
            Value::MovieClip(clip) => {
                let resolved = clip.resolve(&*self.ctx.display);
                if resolved.is_none() {
                    log_ascoding!("SetTarget2 to a removed movieclip");
                }
                self.env.set_target(resolved);
            }
            _ => {
                let path = self.to_string(&target)?;
                self.retarget(&path);
            }
        }
        Ok(())
    }

    fn retarget(&mut self, path: &str) {
        if path.is_empty() {
            let original = self.env.original_target();
            self.env.set_target(original);
            return;
        }
        match self.env.find_target(self.ctx, path) {
            Some(target) => self.env.set_target(Some(target)),
            None => {
                log_ascoding!("SetTarget: no such target {:?}", path);
                self.env.set_target(None);
            }
        }
    }

    fn action_goto_frame(&mut self, arg_pc: usize) -> Result<(), Error> {
        let frame = self.code.buffer.read_u16(arg_pc);
        if let Some(target) = self.env.target() {
            self.ctx.display.goto_frame(target, frame, true);
        }
        Ok(())
    }

    fn action_goto_frame2(&mut self, arg_pc: usize) -> Result<(), Error> {
        let flags = self.code.buffer.read_u8(arg_pc);
        let play = flags & 0x01 != 0;
        let scene_bias = if flags & 0x02 != 0 {
            self.code.buffer.read_u16(arg_pc + 1)
        } else {
            0
        };
        let frame = self.pop();
        let target = match self.env.target() {
            Some(target) => target,
            None => return Ok(()),
        };
        match &frame {
            Value::String(label) => {
                if !self.ctx.display.goto_label(target, label, !play) {
                    // Numeric strings fall back to frame numbers.
                    let n = frame.primitive_to_number(self.version());
                    if n.is_finite() && n >= 1.0 {
                        let frame = (n as u16).saturating_sub(1) + scene_bias;
                        self.ctx.display.goto_frame(target, frame, !play);
                    } else {
                        log_ascoding!("GotoFrame2: label {:?} not found", label);
                    }
                }
            }
            _ => {
                let n = self.to_f64(&frame)?;
                if n.is_finite() && n >= 1.0 {
                    let frame = (n as u16).saturating_sub(1) + scene_bias;
                    self.ctx.display.goto_frame(target, frame, !play);
                }
            }
        }
        Ok(())
    }

    fn action_goto_label(&mut self, arg_pc: usize) -> Result<(), Error> {
        let (label, _) = self.code.buffer.read_string(arg_pc);
        if let Some(target) = self.env.target() {
            if !self.ctx.display.goto_label(target, &label, true) {
                log_ascoding!("GotoLabel: label {:?} not found", label);
            }
        }
        Ok(())
    }

    fn action_next_frame(&mut self) -> Result<(), Error> {
        if let Some(target) = self.env.target() {
            self.ctx.display.next_frame(target);
        }
        Ok(())
    }

    fn action_prev_frame(&mut self) -> Result<(), Error> {
        if let Some(target) = self.env.target() {
            self.ctx.display.prev_frame(target);
        }
        Ok(())
    }

    fn action_play(&mut self) -> Result<(), Error> {
        if let Some(target) = self.env.target() {
            self.ctx.display.play(target);
        }
        Ok(())
    }

    fn action_stop(&mut self) -> Result<(), Error> {
        if let Some(target) = self.env.target() {
            self.ctx.display.stop(target);
        }
        Ok(())
    }

    fn action_toggle_quality(&mut self) -> Result<(), Error> {
        self.ctx.display.toggle_quality();
        Ok(())
    }

    fn action_stop_sounds(&mut self) -> Result<(), Error> {
        self.ctx.display.stop_sounds();
        Ok(())
    }

    fn action_clone_sprite(&mut self) -> Result<(), Error> {
        let depth = self.pop();
        let depth = self.to_i32(&depth)?;
        let new_name = self.pop();
        let new_name = self.to_string(&new_name)?;
        let source = self.pop();
        match self.resolve_target_value(&source)? {
            Some(source) => self.ctx.display.clone_sprite(source, &new_name, depth),
            None => log_ascoding!("CloneSprite source not found"),
        }
        Ok(())
    }

    fn action_remove_sprite(&mut self) -> Result<(), Error> {
        let target = self.pop();
        match self.resolve_target_value(&target)? {
            Some(target) => self.ctx.display.remove_sprite(target),
            None => log_ascoding!("RemoveSprite target not found"),
        }
        Ok(())
    }

    fn action_start_drag(&mut self) -> Result<(), Error> {
        let target = self.pop();
        let target = self.resolve_target_value(&target)?;
        let lock_center = self.pop();
        let lock_center = self.to_f64(&lock_center)? != 0.0;
        let constrain = self.pop();
        let constraint = if self.to_f64(&constrain)? != 0.0 {
            let y2 = self.pop();
            let x2 = self.pop();
            let y1 = self.pop();
            let x1 = self.pop();
            Some((
                self.to_f64(&x1)?,
                self.to_f64(&y1)?,
                self.to_f64(&x2)?,
                self.to_f64(&y2)?,
            ))
        } else {
            None
        };
        match target {
            Some(target) => self.ctx.display.start_drag(target, lock_center, constraint),
            None => log_ascoding!("StartDrag target not found"),
        }
        Ok(())
    }

    fn action_end_drag(&mut self) -> Result<(), Error> {
        self.ctx.display.end_drag();
        Ok(())
    }

    fn action_target_path(&mut self) -> Result<(), Error> {
        let value = self.pop();
        match &value {
            Value::MovieClip(clip) => match clip.resolve(&*self.ctx.display) {
                Some(node) => {
                    let path = self.ctx.display.path(node);
                    self.push(path);
                }
                None => self.push(Value::Undefined),
            },
            _ => {
                log_ascoding!("TargetPath of a non-movieclip");
                self.push(Value::Undefined);
            }
        }
        Ok(())
    }

    fn action_call(&mut self) -> Result<(), Error> {
        let _frame = self.pop();
        log_unimpl!("Call (frame actions) is not supported");
        Ok(())
    }

    // Host delegations.

    fn action_get_url(&mut self, arg_pc: usize) -> Result<(), Error> {
        let (url, next) = self.code.buffer.read_string(arg_pc);
        let (target, _) = self.code.buffer.read_string(next);
        if target.starts_with("_level") {
            self.ctx
                .navigator
                .load_movie(&url, &target, NavigationMethod::None);
        } else {
            self.ctx
                .navigator
                .navigate_to_url(&url, &target, NavigationMethod::None);
        }
        Ok(())
    }

    fn action_get_url2(&mut self, arg_pc: usize) -> Result<(), Error> {
        let flags = self.code.buffer.read_u8(arg_pc);
        let method = NavigationMethod::from_send_vars_method(flags & 0b11);
        let load_target = flags & 0x40 != 0;
        let load_variables = flags & 0x80 != 0;

        let target = self.pop();
        let url = self.pop();
        let url = self.to_string(&url)?;
        let target_str = match &target {
            Value::MovieClip(clip) => clip.target_path(&*self.ctx.display),
            other => self.to_string(other)?,
        };

        if load_variables {
            self.ctx
                .navigator
                .load_variables(&url, &target_str, method);
        } else if load_target || target_str.starts_with("_level") {
            self.ctx.navigator.load_movie(&url, &target_str, method);
        } else {
            self.ctx
                .navigator
                .navigate_to_url(&url, &target_str, method);
        }
        Ok(())
    }

    // Misc.

    fn action_trace(&mut self) -> Result<(), Error> {
        let value = self.pop();
        let text = self.to_string(&value)?;
        avm_trace!("{}", text);
        Ok(())
    }

    fn action_get_time(&mut self) -> Result<(), Error> {
        let millis = self.ctx.timers.elapsed_millis();
        self.push(millis as f64);
        Ok(())
    }

    fn action_random_number(&mut self) -> Result<(), Error> {
        let max = self.pop();
        let max = self.to_f64(&max)?;
        let result = if max.is_finite() && max >= 1.0 {
            self.ctx.rng.gen_range(0..max as i32)
        } else {
            0
        };
        self.push(result);
        Ok(())
    }

    fn action_constant_pool(&mut self, arg_pc: usize) -> Result<(), Error> {
        let buffer = Rc::clone(&self.code.buffer);
        let count = usize::from(buffer.read_u16(arg_pc));
        let mut cursor = arg_pc + 2;
        let mut pool = Vec::with_capacity(count);
        for _ in 0..count {
            let (entry, next) = buffer.read_string(cursor);
            cursor = next;
            pool.push(entry);
        }
        buffer.set_constant_pool(pool);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::avm1::test_utils::{run_code, with_vm, ActionWriter};
    use pretty_assertions::assert_eq;

    #[test]
    fn push_and_arithmetic() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            w.push_number(3.0);
            w.push_number(4.0);
            w.op(OpCode::Add);
            w.push_str("result");
            w.op(OpCode::StackSwap);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);
            assert_eq!(
                env.get_variable(ctx, "result", &[]).unwrap(),
                Value::Number(7.0)
            );
        });
    }

    #[test]
    fn constant_pool_push() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            w.constant_pool(&["greeting", "hello"]);
            w.push_const(0);
            w.push_const(1);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);
            assert_eq!(
                env.get_variable(ctx, "greeting", &[]).unwrap(),
                Value::from("hello")
            );
        });
    }

    #[test]
    fn branching_skips_dead_code() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            w.push_str("x");
            w.push_number(1.0);
            w.op(OpCode::SetVariable);
            // Jump over an assignment that would clobber x.
            let jump = w.jump_placeholder(OpCode::Jump);
            w.push_str("x");
            w.push_number(2.0);
            w.op(OpCode::SetVariable);
            w.patch_jump(jump);
            run_code(ctx, env, root, w);
            assert_eq!(
                env.get_variable(ctx, "x", &[]).unwrap(),
                Value::Number(1.0)
            );
        });
    }

    #[test]
    fn backward_loops_hit_the_action_limit() {
        with_vm(6, |ctx, env, root| {
            ctx.options.loop_limit = 100;
            let mut w = ActionWriter::new(6);
            // jump -5: back onto itself forever.
            let pos = w.len();
            w.op_u16(OpCode::Jump, 0);
            w.patch_i16(pos + 3, -5);
            // Aborts cleanly instead of hanging.
            run_code(ctx, env, root, w);
        });
    }

    #[test]
    fn with_scoping_assigns_to_the_withd_object() {
        with_vm(6, |ctx, env, root| {
            // var o = {x: 1}; var x = 0; with (o) { x = 2; }
            let o = ctx.alloc_object(None, 6);
            object::set_member(ctx, env, o, "x", Value::Number(1.0)).unwrap();
            env.set_variable(ctx, "o", Value::Object(o), &[]).unwrap();
            env.set_variable(ctx, "x", Value::Number(0.0), &[]).unwrap();

            let mut w = ActionWriter::new(6);
            w.push_str("o");
            w.op(OpCode::GetVariable);
            let with_patch = w.with_placeholder();
            w.push_str("x");
            w.push_number(2.0);
            w.op(OpCode::SetVariable);
            w.patch_with(with_patch);
            run_code(ctx, env, root, w);

            assert_eq!(
                object::get_member(ctx, env, o, "x").unwrap(),
                Some(Value::Number(2.0))
            );
            assert_eq!(
                env.get_variable(ctx, "x", &[]).unwrap(),
                Value::Number(0.0)
            );
        });
    }

    #[test]
    fn with_reads_fall_through_to_outer_scope() {
        with_vm(6, |ctx, env, root| {
            let o = ctx.alloc_object(None, 6);
            env.set_variable(ctx, "o", Value::Object(o), &[]).unwrap();
            env.set_variable(ctx, "y", Value::Number(9.0), &[]).unwrap();

            let mut w = ActionWriter::new(6);
            w.push_str("o");
            w.op(OpCode::GetVariable);
            let with_patch = w.with_placeholder();
            w.push_str("copy");
            w.push_str("y");
            w.op(OpCode::GetVariable);
            w.op(OpCode::SetVariable);
            w.patch_with(with_patch);
            run_code(ctx, env, root, w);

            assert_eq!(
                env.get_variable(ctx, "copy", &[]).unwrap(),
                Value::Number(9.0)
            );
        });
    }

    #[test]
    fn define_function_and_call() {
        with_vm(6, |ctx, env, root| {
            // function double(n) { return n + n; }  x = double(21);
            let mut w = ActionWriter::new(6);
            let mut body = ActionWriter::new(6);
            body.push_str("n");
            body.op(OpCode::GetVariable);
            body.push_str("n");
            body.op(OpCode::GetVariable);
            body.op(OpCode::Add2);
            body.op(OpCode::Return);
            w.define_function("double", &["n"], &body);

            w.push_str("x");
            w.push_number(21.0);
            w.push_number(1.0);
            w.push_str("double");
            w.op(OpCode::CallFunction);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);

            assert_eq!(
                env.get_variable(ctx, "x", &[]).unwrap(),
                Value::Number(42.0)
            );
        });
    }

    #[test]
    fn function_locals_do_not_leak() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            let mut body = ActionWriter::new(6);
            body.push_str("secret");
            body.push_number(5.0);
            body.op(OpCode::DefineLocal);
            w.define_function("f", &[], &body);

            w.push_number(0.0);
            w.push_str("f");
            w.op(OpCode::CallFunction);
            w.op(OpCode::Pop);
            run_code(ctx, env, root, w);

            assert_eq!(
                env.get_variable(ctx, "secret", &[]).unwrap(),
                Value::Undefined
            );
        });
    }

    #[test]
    fn throw_reaches_catch() {
        with_vm(7, |ctx, env, root| {
            // try { throw "boom"; } catch (e) { caught = e; }
            let mut w = ActionWriter::new(7);
            let mut try_body = ActionWriter::new(7);
            try_body.push_str("boom");
            try_body.op(OpCode::Throw);
            let mut catch_body = ActionWriter::new(7);
            catch_body.push_str("caught");
            catch_body.push_str("e");
            catch_body.op(OpCode::GetVariable);
            catch_body.op(OpCode::SetVariable);
            w.try_catch("e", &try_body, &catch_body);
            run_code(ctx, env, root, w);

            assert_eq!(
                env.get_variable(ctx, "caught", &[]).unwrap(),
                Value::from("boom")
            );
        });
    }

    #[test]
    fn stack_overrun_is_repaired() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            w.push_number(1.0);
            w.push_number(2.0);
            w.push_number(3.0);
            run_code(ctx, env, root, w);
            // Everything over-pushed was dropped back to the entry depth.
            assert_eq!(env.stack_size(), 0);
        });
    }

    #[test]
    fn stack_underrun_synthesizes_undefined() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            w.push_str("out");
            w.op(OpCode::StackSwap);
            w.op(OpCode::Pop);
            w.op(OpCode::Pop);
            run_code(ctx, env, root, w);
            assert_eq!(env.stack_size(), 0);
        });
    }

    #[test]
    fn store_register_keeps_value_on_stack() {
        with_vm(6, |ctx, env, root| {
            let mut w = ActionWriter::new(6);
            w.push_str("a");
            w.push_number(8.0);
            w.store_register(2);
            w.op(OpCode::SetVariable);
            w.push_str("b");
            w.push_register(2);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);
            assert_eq!(
                env.get_variable(ctx, "a", &[]).unwrap(),
                Value::Number(8.0)
            );
            assert_eq!(
                env.get_variable(ctx, "b", &[]).unwrap(),
                Value::Number(8.0)
            );
        });
    }

    #[test]
    fn typeof_distinguishes_values() {
        with_vm(7, |ctx, env, root| {
            let mut w = ActionWriter::new(7);
            w.push_str("t");
            w.push_number(1.5);
            w.op(OpCode::TypeOf);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);
            assert_eq!(
                env.get_variable(ctx, "t", &[]).unwrap(),
                Value::from("number")
            );
        });
    }

    #[test]
    fn new_object_and_instance_of() {
        with_vm(7, |ctx, env, root| {
            // function A(){}; function B(){}; B.prototype = new A();
            // b = new B();
            let mut w = ActionWriter::new(7);
            let empty = ActionWriter::new(7);
            w.define_function("A", &[], &empty);
            w.define_function("B", &[], &empty);

            w.push_str("B");
            w.op(OpCode::GetVariable);
            w.push_str("prototype");
            w.push_number(0.0);
            w.push_str("A");
            w.op(OpCode::NewObject);
            w.op(OpCode::SetMember);

            w.push_str("b");
            w.push_number(0.0);
            w.push_str("B");
            w.op(OpCode::NewObject);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);

            let b = env
                .get_variable(ctx, "b", &[])
                .unwrap()
                .as_object_id()
                .unwrap();
            let a_ctor = env
                .get_variable(ctx, "A", &[])
                .unwrap()
                .as_object_id()
                .unwrap();
            let b_ctor = env
                .get_variable(ctx, "B", &[])
                .unwrap()
                .as_object_id()
                .unwrap();
            let object_ctor = env
                .get_variable(ctx, "Object", &[])
                .unwrap()
                .as_object_id()
                .unwrap();
            assert!(object::instance_of(ctx, b, b_ctor));
            assert!(object::instance_of(ctx, b, a_ctor));
            assert!(object::instance_of(ctx, b, object_ctor));

            // After delete B.prototype, b is no longer a B but is still
            // an A.
            let (_, deleted) = object::delete_member(ctx, b_ctor, "prototype");
            assert!(deleted);
            assert!(!object::instance_of(ctx, b, b_ctor));
            assert!(object::instance_of(ctx, b, a_ctor));
        });
    }

    #[test]
    fn function2_preloads_registers() {
        with_vm(7, |ctx, env, root| {
            // function2 f(r1 = n): r1 + r1, with _global preloaded too.
            let mut body = ActionWriter::new(7);
            body.push_register(1);
            body.push_register(1);
            body.op(OpCode::Add2);
            body.op(OpCode::Return);
            let mut w = ActionWriter::new(7);
            w.define_function2(
                "dbl",
                &[(1, "n")],
                3,
                FunctionFlags::PRELOAD_GLOBAL.bits(),
                &body,
            );

            w.push_str("x");
            w.push_number(5.0);
            w.push_number(1.0);
            w.push_str("dbl");
            w.op(OpCode::CallFunction);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);

            assert_eq!(
                env.get_variable(ctx, "x", &[]).unwrap(),
                Value::Number(10.0)
            );
        });
    }

    #[test]
    fn enumerate2_visits_enumerable_keys() {
        with_vm(7, |ctx, env, root| {
            let o = ctx.alloc_object(None, 7);
            object::set_member(ctx, env, o, "a", Value::Number(1.0)).unwrap();
            object::set_member(ctx, env, o, "b", Value::Number(2.0)).unwrap();
            env.set_variable(ctx, "o", Value::Object(o), &[]).unwrap();

            // The enumeration is consumed within the slice, like a
            // compiled for..in would.
            let mut w = ActionWriter::new(7);
            w.push_str("o");
            w.op(OpCode::GetVariable);
            w.op(OpCode::Enumerate2);
            w.push_str("k1");
            w.op(OpCode::StackSwap);
            w.op(OpCode::SetVariable);
            w.push_str("k2");
            w.op(OpCode::StackSwap);
            w.op(OpCode::SetVariable);
            run_code(ctx, env, root, w);

            let mut keys = vec![
                env.get_variable(ctx, "k1", &[]).unwrap(),
                env.get_variable(ctx, "k2", &[]).unwrap(),
            ];
            keys.sort_by_key(|k| match k {
                Value::String(s) => s.to_string(),
                _ => String::new(),
            });
            assert_eq!(keys, vec![Value::from("a"), Value::from("b")]);
        });
    }
}
