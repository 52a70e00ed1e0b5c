//! The interpreter's instruction set.
//!
//! Mirrors `wasmi::engine::bytecode::Instruction`: a single flat enum,
//! one variant per opcode, so that dispatch is a single `match` and
//! disassembly is a single `Display` impl. Branch and inline-cache
//! operands are resolved to `insns` indices once, by the decoder, rather
//! than re-resolved through the label map on every branch taken.

use std::rc::Rc;

use crate::{
  call_data::CallData,
  iseq::IseqRef,
  value::{Symbol, Value, ValueMap},
};

/// A resolved jump target: an index into the enclosing ISeq's `insns`.
pub type Target = usize;

/// One decoded bytecode instruction, each with a fixed stack effect and
/// side-effect, per the instruction set's `step(ctx)` contract.
#[derive(Clone, Debug)]
pub enum Instruction {
  PutNil,
  PutObject(Value),
  PutObjectInt2Fix0,
  PutObjectInt2Fix1,
  PutSelf,
  PutString(Rc<str>),
  Pop,
  Dup,
  Swap,
  NewArray(usize),
  DupArray(Rc<Vec<Value>>),
  NewHash(usize),
  DupHash(Rc<ValueMap>),
  ConcatArray,
  GetGlobal(Symbol),
  SetGlobal(Symbol),
  /// Operand is the raw, compiler-biased index; translated against the
  /// current frame's ISeq at execution time (see
  /// [`crate::iseq::InstructionSequence::translate_local`]).
  GetLocalWC0(usize),
  SetLocalWC0(usize),
  GetConstant(Symbol),
  /// `cache` is retained only for round-trip disassembly; the VM never
  /// consults it (inline caches always miss in this interpreter).
  OptGetInlineCache(Target, u32),
  OptSetInlineCache(u32),
  Jump(Target),
  BranchNil(Target),
  BranchUnless(Target),
  OptPlus(CallData),
  OptMinus(CallData),
  OptDiv(CallData),
  OptMod(CallData),
  OptAnd(CallData),
  OptOr(CallData),
  OptEq(CallData),
  OptGe(CallData),
  OptGt(CallData),
  OptLe(CallData),
  OptLt(CallData),
  OptAref(CallData),
  OptArefWith(Value, CallData),
  OptNot(CallData),
  OptEmptyP(CallData),
  OptNilP(CallData),
  OptLength(CallData),
  OptSucc(CallData),
  OptStrFreeze(Rc<str>),
  OptStrUminus(Rc<str>, CallData),
  OptSendWithoutBlock(CallData),
  DefineMethod(Symbol, IseqRef),
  Leave,
}

impl Instruction {
  /// The opcode mnemonic, used by the decoder's round-trip tests and by
  /// [`crate::disasm`]. Must match the source tuple's opcode symbol
  /// exactly.
  pub fn mnemonic(&self) -> &'static str {
    match self {
      Instruction::PutNil => "putnil",
      Instruction::PutObject(_) => "putobject",
      Instruction::PutObjectInt2Fix0 => "putobject_INT2FIX_0_",
      Instruction::PutObjectInt2Fix1 => "putobject_INT2FIX_1_",
      Instruction::PutSelf => "putself",
      Instruction::PutString(_) => "putstring",
      Instruction::Pop => "pop",
      Instruction::Dup => "dup",
      Instruction::Swap => "swap",
      Instruction::NewArray(_) => "newarray",
      Instruction::DupArray(_) => "duparray",
      Instruction::NewHash(_) => "newhash",
      Instruction::DupHash(_) => "duphash",
      Instruction::ConcatArray => "concatarray",
      Instruction::GetGlobal(_) => "getglobal",
      Instruction::SetGlobal(_) => "setglobal",
      Instruction::GetLocalWC0(_) => "getlocal_WC_0",
      Instruction::SetLocalWC0(_) => "setlocal_WC_0",
      Instruction::GetConstant(_) => "getconstant",
      Instruction::OptGetInlineCache(..) => "opt_getinlinecache",
      Instruction::OptSetInlineCache(_) => "opt_setinlinecache",
      Instruction::Jump(_) => "jump",
      Instruction::BranchNil(_) => "branchnil",
      Instruction::BranchUnless(_) => "branchunless",
      Instruction::OptPlus(_) => "opt_plus",
      Instruction::OptMinus(_) => "opt_minus",
      Instruction::OptDiv(_) => "opt_div",
      Instruction::OptMod(_) => "opt_mod",
      Instruction::OptAnd(_) => "opt_and",
      Instruction::OptOr(_) => "opt_or",
      Instruction::OptEq(_) => "opt_eq",
      Instruction::OptGe(_) => "opt_ge",
      Instruction::OptGt(_) => "opt_gt",
      Instruction::OptLe(_) => "opt_le",
      Instruction::OptLt(_) => "opt_lt",
      Instruction::OptAref(_) => "opt_aref",
      Instruction::OptArefWith(..) => "opt_aref_with",
      Instruction::OptNot(_) => "opt_not",
      Instruction::OptEmptyP(_) => "opt_empty_p",
      Instruction::OptNilP(_) => "opt_nil_p",
      Instruction::OptLength(_) => "opt_length",
      Instruction::OptSucc(_) => "opt_succ",
      Instruction::OptStrFreeze(_) => "opt_str_freeze",
      Instruction::OptStrUminus(..) => "opt_str_uminus",
      Instruction::OptSendWithoutBlock(_) => "opt_send_without_block",
      Instruction::DefineMethod(..) => "definemethod",
      Instruction::Leave => "leave",
    }
  }

  /// Whether this instruction unconditionally or conditionally moves
  /// `program_counter` to somewhere other than `pc + 1`.
  pub fn is_branch(&self) -> bool {
    matches!(
      self,
      Instruction::Jump(_) | Instruction::BranchNil(_) | Instruction::BranchUnless(_)
    )
  }
}
