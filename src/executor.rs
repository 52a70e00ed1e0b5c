//! The dispatch loop and method-call protocol.
//!
//! Grounded on `wasmi::engine::executor::Executor::execute`: a `loop {
//! match *instruction { ... } }` over a flat instruction enum, one
//! `visit_*`-shaped handler per opcode. Unlike `wasmi`, each step here
//! borrows the whole [`ExecutionContext`] rather than a raw stack
//! pointer, since this interpreter has no performance budget remotely
//! close to a real Wasm engine's.

use crate::{
  call_data::CallData,
  context::ExecutionContext,
  error::{VmError, VmResult},
  frame::Frame,
  host::HostRuntime,
  instruction::Instruction,
  iseq::IseqRef,
  value::{Symbol, Value, ValueMap},
};

/// What a single `step` told the dispatch loop to do next.
enum StepOutcome {
  /// Keep fetching; `program_counter` has already been updated
  /// (either by the pre-increment or, for branches, by the step
  /// itself).
  Continue,
  /// `leave` executed; the frame's return value is on top of the
  /// stack.
  Leave,
}

/// Ties an [`ExecutionContext`] to a [`HostRuntime`] for the duration of
/// one evaluation. Recursion through user-defined method calls is
/// ordinary Rust recursion through [`Executor::with_frame`].
pub struct Executor<'a> {
  ctx: &'a mut ExecutionContext,
  host: &'a mut dyn HostRuntime,
}

impl<'a> Executor<'a> {
  /// Creates a new executor over `ctx` and `host`.
  pub fn new(ctx: &'a mut ExecutionContext, host: &'a mut dyn HostRuntime) -> Self {
    Self { ctx, host }
  }

  /// Runs `iseq` as a top-level program: pushes its frame with no
  /// bound arguments, dispatches until `leave`, and returns the
  /// frame's return value.
  pub fn run(&mut self, iseq: IseqRef) -> VmResult<Value> {
    self.with_frame(iseq, |_frame| {})
  }

  /// The scoped frame acquisition: saves `program_counter` and the
  /// stack length, pushes a frame,
  /// runs `bind_args` to seed locals, dispatches until `leave`, and —
  /// on *any* exit, success or error — pops the frame, restores the
  /// program counter, and truncates the value stack back down,
  /// preserving exactly one return value.
  fn with_frame(
    &mut self,
    iseq: IseqRef,
    bind_args: impl FnOnce(&mut Frame),
  ) -> VmResult<Value> {
    let saved_pc = self.ctx.program_counter;
    let saved_len = self.ctx.stack_len();

    self.ctx.push_frame(iseq)?;
    self.ctx.program_counter = 0;
    bind_args(self.ctx.current_frame_mut());

    tracing::debug!(depth = self.ctx.frame_depth(), "entering frame");
    let outcome = self.dispatch_loop();
    tracing::debug!(depth = self.ctx.frame_depth(), "leaving frame");

    self.ctx.pop_frame();
    self.ctx.program_counter = saved_pc;

    let result = outcome.and_then(|()| {
      let produced = self.ctx.stack_len() - saved_len;
      if produced == 1 {
        self.ctx.pop()
      } else {
        Err(VmError::InternalError(format!(
          "frame left {produced} values on the stack at `leave`, expected exactly 1"
        )))
      }
    });
    self.ctx.truncate_stack(saved_len);
    result
  }

  /// Fetch–advance–execute until `leave`.
  fn dispatch_loop(&mut self) -> VmResult<()> {
    loop {
      let pc = self.ctx.program_counter;
      let insns_len = self.ctx.current_frame().iseq().insns.len();
      if pc >= insns_len {
        return Err(VmError::InternalError(
          "program counter ran off the end of the instruction sequence without `leave`"
            .to_string(),
        ));
      }
      let instr = self.ctx.current_frame().iseq().insns[pc].clone();
      self.ctx.program_counter = pc + 1;

      if self.ctx.config().trace_instructions {
        tracing::trace!(pc, mnemonic = instr.mnemonic(), "dispatch");
      }

      match self.step(instr)? {
        StepOutcome::Continue => {}
        StepOutcome::Leave => return Ok(()),
      }
    }
  }

  fn step(&mut self, instr: Instruction) -> VmResult<StepOutcome> {
    use Instruction as I;
    match instr {
      I::PutNil => self.ctx.push(Value::Nil),
      I::PutObject(v) => self.ctx.push(v),
      I::PutObjectInt2Fix0 => self.ctx.push(Value::Integer(0)),
      I::PutObjectInt2Fix1 => self.ctx.push(Value::Integer(1)),
      I::PutSelf => {
        let self_value = self.ctx.current_frame().iseq().self_value.clone();
        self.ctx.push(self_value);
      }
      I::PutString(s) => self.ctx.push(Value::string(s.as_ref())),
      I::Pop => {
        self.ctx.pop()?;
      }
      I::Dup => {
        let top = self.ctx.peek()?.clone();
        self.ctx.push(top);
      }
      I::Swap => {
        let mut top2 = self.ctx.pop_n(2)?;
        let a = top2.remove(0);
        let b = top2.remove(0);
        self.ctx.push(b);
        self.ctx.push(a);
      }
      I::NewArray(n) => {
        let items = self.ctx.pop_n(n)?;
        self.ctx.push(Value::array(items));
      }
      I::DupArray(template) => {
        self.ctx.push(Value::array(template.as_ref().clone()));
      }
      I::NewHash(n) => {
        let items = self.ctx.pop_n(n)?;
        let mut map = ValueMap::new();
        for pair in items.chunks_exact(2) {
          map.insert(pair[0].clone(), pair[1].clone());
        }
        self.ctx.push(Value::hash(map));
      }
      I::DupHash(template) => {
        self.ctx.push(Value::hash(template.as_ref().clone()));
      }
      I::ConcatArray => {
        let mut two = self.ctx.pop_n(2)?;
        let b = two.pop().unwrap();
        let a = two.pop().unwrap();
        let (Value::Array(a), Value::Array(b)) = (a, b) else {
          return Err(VmError::InternalError(
            "concatarray expected two arrays".to_string(),
          ));
        };
        let mut combined = a.borrow().clone();
        combined.extend(b.borrow().iter().cloned());
        self.ctx.push(Value::array(combined));
      }
      I::GetGlobal(name) => {
        let value = self.read_global(&name);
        self.ctx.push(value);
      }
      I::SetGlobal(name) => {
        let value = self.ctx.pop()?;
        self.ctx.set_global(name, value);
      }
      I::GetLocalWC0(idx) => {
        let value = self
          .ctx
          .current_frame()
          .get_local(idx)
          .cloned()
          .ok_or_else(|| VmError::UndefinedLocal {
            name: self.ctx.current_frame().local_name(idx),
            owner: self.ctx.current_frame().iseq().self_value.type_tag(),
          })?;
        self.ctx.push(value);
      }
      I::SetLocalWC0(idx) => {
        let value = self.ctx.pop()?;
        self.ctx.current_frame_mut().set_local(idx, value);
      }
      I::GetConstant(name) => {
        let value = self.host.constant(&name).ok_or_else(|| {
          VmError::HostError(format!("uninitialized constant {name}"))
        })?;
        self.ctx.push(value);
      }
      I::OptGetInlineCache(..) | I::OptSetInlineCache(_) => {
        // Inline caches always miss in this interpreter; fall
        // through without touching the stack.
      }
      I::Jump(target) => self.ctx.program_counter = target,
      I::BranchNil(target) => {
        let value = self.ctx.pop()?;
        if matches!(value, Value::Nil) {
          self.ctx.program_counter = target;
        }
      }
      I::BranchUnless(target) => {
        let value = self.ctx.pop()?;
        if !value.is_truthy() {
          self.ctx.program_counter = target;
        }
      }
      I::OptPlus(cd)
      | I::OptMinus(cd)
      | I::OptDiv(cd)
      | I::OptMod(cd)
      | I::OptAnd(cd)
      | I::OptOr(cd)
      | I::OptEq(cd)
      | I::OptGe(cd)
      | I::OptGt(cd)
      | I::OptLe(cd)
      | I::OptLt(cd)
      | I::OptAref(cd)
      | I::OptNot(cd)
      | I::OptEmptyP(cd)
      | I::OptNilP(cd)
      | I::OptLength(cd)
      | I::OptSucc(cd)
      | I::OptSendWithoutBlock(cd) => self.dispatch_from_stack(&cd)?,
      I::OptArefWith(key, cd) => {
        let receiver = self.ctx.pop()?;
        let result = self.call_method(&cd, receiver, vec![key])?;
        self.ctx.push(result);
      }
      I::OptStrFreeze(s) => self.ctx.push(Value::string(s.as_ref())),
      I::OptStrUminus(s, cd) => {
        let receiver = Value::string(s.as_ref());
        let result = self.call_method(&cd, receiver, vec![])?;
        self.ctx.push(result);
      }
      I::DefineMethod(name, body) => {
        let owner = self.ctx.current_frame().iseq().self_value.type_tag();
        self.ctx.define_method(owner, name, body);
        self.ctx.push(Value::Nil);
      }
      I::Leave => return Ok(StepOutcome::Leave),
    }
    Ok(StepOutcome::Continue)
  }

  /// Shared body for every `opt_*` instruction whose full argument list
  /// (receiver + arguments) already sits on the value stack: pop
  /// `argc + 1` values, dispatch, push the result.
  fn dispatch_from_stack(&mut self, call_data: &CallData) -> VmResult<()> {
    let mut args = self.ctx.pop_n(call_data.argc() + 1)?;
    let receiver = args.remove(0);
    let result = self.call_method(call_data, receiver, args)?;
    self.ctx.push(result);
    Ok(())
  }

  /// Looks up a user-defined method first, falling back to the host
  /// runtime's dynamic send.
  fn call_method(
    &mut self,
    call_data: &CallData,
    receiver: Value,
    args: Vec<Value>,
  ) -> VmResult<Value> {
    let method_id = call_data.method_id();
    match self.ctx.lookup_method(receiver.type_tag(), method_id) {
      Some(handle) => {
        if !handle.iseq.args.accepts(args.len()) {
          tracing::debug!(method = %method_id, given = args.len(), "arity mismatch");
          return Err(VmError::ArgArityError {
            method: method_id.to_string(),
            given: args.len(),
          });
        }
        tracing::debug!(method = %method_id, "user method hit");
        let iseq = handle.iseq.clone();
        self.with_frame(iseq, move |frame| {
          for (i, arg) in args.into_iter().enumerate() {
            frame.set_local_slot(i, arg);
          }
        })
      }
      None => {
        tracing::debug!(method = %method_id, "delegating to host");
        self.host.send(&receiver, method_id, &args).map_err(VmError::HostError)
      }
    }
  }

  fn read_global(&mut self, name: &Symbol) -> Value {
    if let Some(value) = self.ctx.get_global(name) {
      return value.clone();
    }
    match self.host.import_global(name) {
      Some(value) => {
        self.ctx.set_global(name.clone(), value.clone());
        value
      }
      None => {
        tracing::warn!(global = %name, "read of unset global, defaulting to nil");
        Value::Nil
      }
    }
  }
}
