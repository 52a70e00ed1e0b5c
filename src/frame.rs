//! Per-activation call frames.

use crate::{iseq::IseqRef, value::Value};

/// A single activation of an [`crate::iseq::InstructionSequence`]: its
/// local variable slots, each starting as [`Value::Undefined`].
///
/// Grounded on the `vhp` bytecode VM's `CallFrame` (a locals vector sized
/// from the compiled function, plus an instruction pointer) and on
/// `wasmi`'s `FuncFrame`; the owning `InstructionSequence` is reference
/// counted so a frame can outlive nothing beyond its own scope while the
/// code it runs is shared with the method table and any sibling frames
/// executing the same method recursively.
#[derive(Debug)]
pub struct Frame {
  iseq: IseqRef,
  locals: Vec<Value>,
}

impl Frame {
  /// Creates a fresh frame over `iseq`, with every local slot set to
  /// [`Value::Undefined`].
  pub fn new(iseq: IseqRef) -> Self {
    let locals = vec![Value::Undefined; iseq.local_count()];
    Self { iseq, locals }
  }

  /// The instruction sequence this frame is executing.
  pub fn iseq(&self) -> &IseqRef {
    &self.iseq
  }

  /// Reads a local by raw (compiler-biased) operand index.
  ///
  /// # Errors
  /// Returns `None` if the slot still holds [`Value::Undefined`]; the
  /// caller is responsible for turning that into a named
  /// `VmError::UndefinedLocal`.
  pub fn get_local(&self, raw_index: usize) -> Option<&Value> {
    let slot = self.iseq.translate_local(raw_index);
    match self.locals.get(slot) {
      Some(Value::Undefined) | None => None,
      Some(v) => Some(v),
    }
  }

  /// Writes a local by raw (compiler-biased) operand index.
  pub fn set_local(&mut self, raw_index: usize, value: Value) {
    let slot = self.iseq.translate_local(raw_index);
    self.locals[slot] = value;
  }

  /// Writes a local by already-translated slot index. Used to bind
  /// positional arguments into slots `0..argc` when entering a method
  /// call.
  pub fn set_local_slot(&mut self, slot: usize, value: Value) {
    self.locals[slot] = value;
  }

  /// The name declared for a given slot, for error messages.
  pub fn local_name(&self, raw_index: usize) -> String {
    let slot = self.iseq.translate_local(raw_index);
    self.iseq.local_name(slot).to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::iseq::{ArgsDesc, InstructionSequence};
  use std::collections::HashMap;
  use std::rc::Rc;

  fn iseq_with_locals(names: &[&str]) -> IseqRef {
    Rc::new(InstructionSequence {
      self_value: Value::Main,
      insns: vec![],
      labels: HashMap::new(),
      locals: names.iter().map(|s| s.to_string()).collect(),
      args: ArgsDesc::Empty,
    })
  }

  #[test]
  fn fresh_locals_are_undefined() {
    let frame = Frame::new(iseq_with_locals(&["a", "b"]));
    assert!(frame.get_local(4).is_none()); // translate(4) -> slot 0 ("a")
    assert!(frame.get_local(3).is_none()); // translate(3) -> slot 1 ("b")
  }

  #[test]
  fn set_then_get_round_trips() {
    let mut frame = Frame::new(iseq_with_locals(&["a", "b"]));
    frame.set_local(3, Value::Integer(42));
    match frame.get_local(3) {
      Some(Value::Integer(42)) => {}
      other => panic!("expected Integer(42), got {other:?}"),
    }
  }

  #[test]
  fn translate_local_boundary() {
    let iseq = iseq_with_locals(&["a", "b", "c"]);
    let k = iseq.local_count();
    assert_eq!(iseq.translate_local(3), k - 1);
    assert_eq!(iseq.translate_local(3 + (k - 1)), 0);
  }
}
