//! The execution context: the single mutable aggregate the dispatch loop
//! operates on.
//!
//! Grounded on `wasmi::engine::stack::Stack`, which likewise combines a
//! value stack and a call (frame) stack into one struct owned by the
//! executing engine, plus the [`crate::config::VmConfig`] limits that
//! mirror `wasmi`'s `StackLimits`.

use crate::{
  config::VmConfig,
  error::{VmError, VmResult},
  frame::Frame,
  iseq::IseqRef,
  value::{MethodHandle, Symbol, SymbolMap, TypeTag, Value},
};

use std::rc::Rc;

/// Holds the value stack, frame stack, globals, user-method table, and
/// program counter for one evaluation. There is exactly one of these per
/// top-level `eval` call; it is never shared across threads.
#[derive(Debug)]
pub struct ExecutionContext {
  stack: Vec<Value>,
  frames: Vec<Frame>,
  /// Index into the current (topmost) frame's ISeq `insns`.
  pub program_counter: usize,
  globals: SymbolMap<Value>,
  methods: SymbolMap<Rc<MethodHandle>>,
  config: VmConfig,
}

/// Key into the method table: `(owner_type, method_id)`. Encoded as a
/// single symbol so a plain `HashMap<Symbol, _>` (no tuple-keyed map
/// machinery) suffices — see [`method_key`].
fn method_key(owner: TypeTag, method_id: &Symbol) -> Symbol {
  Symbol::new(format!("{owner:?}#{method_id}"))
}

impl ExecutionContext {
  /// Creates a fresh, empty execution context.
  pub fn new(config: VmConfig) -> Self {
    Self {
      stack: Vec::new(),
      frames: Vec::new(),
      program_counter: 0,
      globals: SymbolMap::new(),
      methods: SymbolMap::new(),
      config,
    }
  }

  /// The configuration this context was built with.
  pub fn config(&self) -> &VmConfig {
    &self.config
  }

  // -- value stack -----------------------------------------------------

  /// Pushes a value onto the value stack.
  pub fn push(&mut self, value: Value) {
    self.stack.push(value);
  }

  /// Pops the top value off the stack.
  ///
  /// # Errors
  /// `InternalError` if the stack is empty — a well-formedness
  /// violation the decoder or instruction set should never allow.
  pub fn pop(&mut self) -> VmResult<Value> {
    self.stack
      .pop()
      .ok_or_else(|| VmError::InternalError("stack underflow".to_string()))
  }

  /// Pops `n` values, returning them in their original (bottom-to-top)
  /// order.
  pub fn pop_n(&mut self, n: usize) -> VmResult<Vec<Value>> {
    if self.stack.len() < n {
      return Err(VmError::InternalError("stack underflow".to_string()));
    }
    Ok(self.stack.split_off(self.stack.len() - n))
  }

  /// Peeks the top value without removing it.
  pub fn peek(&self) -> VmResult<&Value> {
    self.stack
      .last()
      .ok_or_else(|| VmError::InternalError("stack underflow".to_string()))
  }

  /// Current stack depth.
  pub fn stack_len(&self) -> usize {
    self.stack.len()
  }

  /// Truncates the stack to `len`, used by frame-exit cleanup.
  pub fn truncate_stack(&mut self, len: usize) {
    self.stack.truncate(len);
  }

  // -- frame stack -------------------------------------------------------

  /// Pushes a new frame, failing with `StackOverflow` if this would
  /// exceed the configured recursion limit.
  pub fn push_frame(&mut self, iseq: IseqRef) -> VmResult<()> {
    if self.frames.len() >= self.config.max_recursion_depth {
      return Err(VmError::StackOverflow { limit: self.config.max_recursion_depth });
    }
    self.frames.push(Frame::new(iseq));
    Ok(())
  }

  /// Pops the current frame. Panics if there is none — callers only
  /// invoke this from `with_frame`'s cleanup, which only runs after a
  /// successful `push_frame`.
  pub fn pop_frame(&mut self) -> Frame {
    self.frames.pop().expect("pop_frame called with no active frame")
  }

  /// The currently executing frame.
  pub fn current_frame(&self) -> &Frame {
    self.frames.last().expect("no active frame")
  }

  /// The currently executing frame, mutably.
  pub fn current_frame_mut(&mut self) -> &mut Frame {
    self.frames.last_mut().expect("no active frame")
  }

  /// Number of live frames.
  pub fn frame_depth(&self) -> usize {
    self.frames.len()
  }

  // -- globals -------------------------------------------------------

  /// Reads a global, without falling back to host import (callers
  /// perform the lazy-import fallback themselves so they can log it).
  pub fn get_global(&self, name: &Symbol) -> Option<&Value> {
    self.globals.get(name)
  }

  /// Writes a global.
  pub fn set_global(&mut self, name: Symbol, value: Value) {
    self.globals.insert(name, value);
  }

  // -- method table -------------------------------------------------------

  /// Defines a user method, keyed by the owner's type tag at the time
  /// of definition — the *host class* of the receiver observed when
  /// `definemethod` ran, not at call time.
  pub fn define_method(&mut self, owner: TypeTag, method_id: Symbol, iseq: IseqRef) {
    let key = method_key(owner, &method_id);
    self.methods.insert(key, Rc::new(MethodHandle { owner, iseq }));
  }

  /// Looks up a user-defined method by receiver type and method id.
  pub fn lookup_method(&self, owner: TypeTag, method_id: &Symbol) -> Option<Rc<MethodHandle>> {
    self.methods.get(&method_key(owner, method_id)).cloned()
  }
}
