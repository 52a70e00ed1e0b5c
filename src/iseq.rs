//! Instruction sequences: the immutable, decoded unit of code.

use std::rc::Rc;

use crate::{instruction::Instruction, value::Value, value::SymbolMap};

/// The argument shape a method body accepts. This VM supports exactly the
/// subset a real host's argument descriptor can express that matters
/// here: no arguments, or a fixed leading count of positional arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArgsDesc {
  /// Takes no arguments.
  #[default]
  Empty,
  /// Takes exactly `lead_num` positional arguments.
  LeadNum(usize),
}

impl ArgsDesc {
  /// Whether `argc` arguments at a call site satisfy this descriptor.
  pub fn accepts(&self, argc: usize) -> bool {
    match self {
      ArgsDesc::Empty => argc == 0,
      ArgsDesc::LeadNum(k) => argc == *k,
    }
  }
}

/// An immutable, decoded instruction sequence: the result of running the
/// decoder (see [`crate::decode`]) over one compiler tuple tree.
///
/// ISeqs are constructed once and never mutated; nested ISeqs (method
/// bodies introduced by `definemethod`) are owned by the `Instruction`
/// that references them, forming a tree rooted at the top-level ISeq
/// handed to [`crate::eval`].
#[derive(Debug)]
pub struct InstructionSequence {
  /// The receiver `putself` pushes inside this sequence.
  pub self_value: Value,
  /// Decoded instructions, in execution order.
  pub insns: Vec<Instruction>,
  /// Label name -> index into `insns`.
  pub labels: SymbolMap<usize>,
  /// Local variable names, in slot-adjacent order (see
  /// [`Self::translate_local`] for how a raw operand index maps to a
  /// slot).
  pub locals: Vec<String>,
  /// The accepted argument shape.
  pub args: ArgsDesc,
}

impl InstructionSequence {
  /// Number of local slots a frame over this ISeq needs.
  pub fn local_count(&self) -> usize {
    self.locals.len()
  }

  /// Translates a compiler-biased local operand index into a frame slot
  /// index.
  ///
  /// The compiler encodes local indices with a fixed bias of 3 counted
  /// from the deepest slot: `slot = (locals.len() - (raw - 3)) - 1`.
  /// This is the convention `getlocal_WC_0`/`setlocal_WC_0` operands
  /// use; with `k` locals, `translate(3) == k - 1` (the first declared
  /// local sits deepest) and `translate(3 + (k - 1)) == 0`.
  ///
  /// The decoder only ever admits `raw` values in `3..=3 + (k - 1)` for
  /// this ISeq's own local count, so this arithmetic never underflows
  /// for a decoded instruction stream.
  pub fn translate_local(&self, raw: usize) -> usize {
    let k = self.locals.len();
    (k - (raw - 3)) - 1
  }

  /// Looks up a local's declared name by slot, for error messages.
  pub fn local_name(&self, slot: usize) -> &str {
    self.locals.get(slot).map(String::as_str).unwrap_or("?")
  }
}

/// Shared ownership of an ISeq: the context's method table, nested
/// `definemethod` instructions, and the top-level program all hold one of
/// these rather than a deep copy.
pub type IseqRef = Rc<InstructionSequence>;
