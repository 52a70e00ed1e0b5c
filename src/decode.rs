//! Translates the compiler's tuple-tree input into a tree of
//! [`InstructionSequence`]s.
//!
//! The decoder's job is exhaustive structural matching on a heterogeneous
//! array-of-tuples stream: dispatch on the operand array's head string,
//! validate shape and arity, and fail with [`VmError::DecodeError`] on
//! anything else — never silently skip an unrecognized entry.

use std::rc::Rc;

use serde_json::Value as Json;

use crate::{
  call_data::CallData,
  error::{VmError, VmResult},
  instruction::Instruction,
  iseq::{ArgsDesc, InstructionSequence, IseqRef},
  value::{Symbol, SymbolMap, Value, ValueMap},
};

/// Decodes a top-level compiler tuple tree into its instruction
/// sequence. The top-level `self_value` is always [`Value::Main`].
pub fn decode_program(json: &Json) -> VmResult<IseqRef> {
  decode_iseq(json, Value::Main)
}

fn decode_iseq(json: &Json, self_value: Value) -> VmResult<IseqRef> {
  let wrapper = json
    .as_array()
    .ok_or_else(|| VmError::DecodeError("expected an ISeq array".to_string()))?;

  let locals = wrapper
    .get(10)
    .and_then(Json::as_array)
    .ok_or_else(|| VmError::DecodeError("ISeq missing locals array at index 10".to_string()))?
    .iter()
    .map(|v| {
      v.as_str()
        .map(str::to_string)
        .ok_or_else(|| VmError::DecodeError("local name must be a string".to_string()))
    })
    .collect::<VmResult<Vec<String>>>()?;

  let args = decode_args_desc(wrapper.get(11).ok_or_else(|| {
    VmError::DecodeError("ISeq missing args descriptor at index 11".to_string())
  })?)?;

  let body = wrapper
    .last()
    .and_then(Json::as_array)
    .ok_or_else(|| VmError::DecodeError("ISeq missing instruction body".to_string()))?;

  let labels = resolve_labels(body)?;
  let insns = decode_body(body, &labels, &self_value, locals.len())?;

  Ok(Rc::new(InstructionSequence { self_value, insns, labels, locals, args }))
}

fn decode_args_desc(json: &Json) -> VmResult<ArgsDesc> {
  let obj = json
    .as_object()
    .ok_or_else(|| VmError::DecodeError("args descriptor must be an object".to_string()))?;
  if obj.is_empty() {
    return Ok(ArgsDesc::Empty);
  }
  match obj.get("lead_num").and_then(Json::as_u64) {
    Some(k) => Ok(ArgsDesc::LeadNum(k as usize)),
    None => Err(VmError::DecodeError(format!(
      "unsupported args descriptor shape: {obj:?}"
    ))),
  }
}

/// First pass: walks the body once to find each label's target index,
/// counting only instruction tuples toward `insns` positions (line
/// numbers and bare labels never occupy a slot).
fn resolve_labels(body: &[Json]) -> VmResult<SymbolMap<usize>> {
  let mut labels = SymbolMap::new();
  let mut insn_index = 0usize;
  for entry in body {
    match entry {
      Json::Number(_) => {}
      Json::String(s) if s == "RUBY_EVENT_LINE" => {}
      Json::String(s) => {
        labels.insert(Symbol::new(s.as_str()), insn_index);
      }
      Json::Array(tuple) => {
        expect_opcode(tuple)?;
        insn_index += 1;
      }
      other => {
        return Err(VmError::DecodeError(format!(
          "unrecognized body entry: {other}"
        )))
      }
    }
  }
  Ok(labels)
}

fn expect_opcode(tuple: &[Json]) -> VmResult<&str> {
  tuple
    .first()
    .and_then(Json::as_str)
    .ok_or_else(|| VmError::DecodeError("instruction tuple missing opcode".to_string()))
}

/// Second pass: decodes every instruction tuple, resolving branch and
/// inline-cache label operands against the already-complete `labels`
/// map built by [`resolve_labels`].
fn decode_body(
  body: &[Json],
  labels: &SymbolMap<usize>,
  self_value: &Value,
  local_count: usize,
) -> VmResult<Vec<Instruction>> {
  let mut insns = Vec::new();
  for entry in body {
    let Json::Array(tuple) = entry else { continue };
    let opcode = expect_opcode(tuple)?;
    let operands = &tuple[1..];
    insns.push(decode_instruction(opcode, operands, labels, self_value, local_count)?);
  }
  Ok(insns)
}

fn decode_instruction(
  opcode: &str,
  operands: &[Json],
  labels: &SymbolMap<usize>,
  self_value: &Value,
  local_count: usize,
) -> VmResult<Instruction> {
  let target = |label: &Json| -> VmResult<usize> {
    let name = label
      .as_str()
      .ok_or_else(|| VmError::DecodeError(format!("{opcode}: label operand must be a string")))?;
    labels
      .get(&Symbol::new(name))
      .copied()
      .ok_or_else(|| VmError::DecodeError(format!("undefined label `{name}`")))
  };

  Ok(match opcode {
    "putnil" => Instruction::PutNil,
    "putobject" => Instruction::PutObject(decode_literal(operand(operands, 0, opcode)?)?),
    "putobject_INT2FIX_0_" => Instruction::PutObjectInt2Fix0,
    "putobject_INT2FIX_1_" => Instruction::PutObjectInt2Fix1,
    "putself" => Instruction::PutSelf,
    "putstring" => Instruction::PutString(decode_str(operand(operands, 0, opcode)?)?),
    "pop" => Instruction::Pop,
    "dup" => Instruction::Dup,
    "swap" => Instruction::Swap,
    "newarray" => Instruction::NewArray(decode_usize(operand(operands, 0, opcode)?)?),
    "duparray" => {
      let items = operand(operands, 0, opcode)?
        .as_array()
        .ok_or_else(|| VmError::DecodeError("duparray operand must be an array".to_string()))?
        .iter()
        .map(decode_literal)
        .collect::<VmResult<Vec<Value>>>()?;
      Instruction::DupArray(Rc::new(items))
    }
    "newhash" => {
      let n = decode_usize(operand(operands, 0, opcode)?)?;
      if n % 2 != 0 {
        return Err(VmError::DecodeError(format!("newhash: odd count {n}")));
      }
      Instruction::NewHash(n)
    }
    "duphash" => {
      let pairs = operand(operands, 0, opcode)?
        .as_array()
        .ok_or_else(|| VmError::DecodeError("duphash operand must be an array of pairs".to_string()))?;
      let mut map = ValueMap::new();
      for pair in pairs {
        let pair = pair
          .as_array()
          .ok_or_else(|| VmError::DecodeError("duphash pair must be a 2-element array".to_string()))?;
        let (k, v) = (
          operand(pair, 0, "duphash")?,
          operand(pair, 1, "duphash")?,
        );
        map.insert(decode_literal(k)?, decode_literal(v)?);
      }
      Instruction::DupHash(Rc::new(map))
    }
    "concatarray" => Instruction::ConcatArray,
    "getglobal" => Instruction::GetGlobal(decode_symbol(operand(operands, 0, opcode)?)?),
    "setglobal" => Instruction::SetGlobal(decode_symbol(operand(operands, 0, opcode)?)?),
    "getlocal_WC_0" => {
      Instruction::GetLocalWC0(decode_raw_local(operand(operands, 0, opcode)?, local_count)?)
    }
    "setlocal_WC_0" => {
      Instruction::SetLocalWC0(decode_raw_local(operand(operands, 0, opcode)?, local_count)?)
    }
    "getconstant" => Instruction::GetConstant(decode_symbol(operand(operands, 0, opcode)?)?),
    "opt_getinlinecache" => {
      let target = target(operand(operands, 0, opcode)?)?;
      let cache = decode_usize(operand(operands, 1, opcode)?)? as u32;
      Instruction::OptGetInlineCache(target, cache)
    }
    "opt_setinlinecache" => {
      Instruction::OptSetInlineCache(decode_usize(operand(operands, 0, opcode)?)? as u32)
    }
    "jump" => Instruction::Jump(target(operand(operands, 0, opcode)?)?),
    "branchnil" => Instruction::BranchNil(target(operand(operands, 0, opcode)?)?),
    "branchunless" => Instruction::BranchUnless(target(operand(operands, 0, opcode)?)?),
    "opt_plus" => Instruction::OptPlus(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_minus" => Instruction::OptMinus(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_div" => Instruction::OptDiv(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_mod" => Instruction::OptMod(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_and" => Instruction::OptAnd(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_or" => Instruction::OptOr(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_eq" => Instruction::OptEq(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_ge" => Instruction::OptGe(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_gt" => Instruction::OptGt(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_le" => Instruction::OptLe(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_lt" => Instruction::OptLt(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_aref" => Instruction::OptAref(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_aref_with" => {
      let key = decode_literal(operand(operands, 0, opcode)?)?;
      let cd = decode_call_data(operand(operands, 1, opcode)?)?;
      Instruction::OptArefWith(key, cd)
    }
    "opt_not" => Instruction::OptNot(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_empty_p" => Instruction::OptEmptyP(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_nil_p" => Instruction::OptNilP(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_length" => Instruction::OptLength(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_succ" => Instruction::OptSucc(decode_call_data(operand(operands, 0, opcode)?)?),
    "opt_str_freeze" => Instruction::OptStrFreeze(decode_str(operand(operands, 0, opcode)?)?),
    "opt_str_uminus" => {
      let s = decode_str(operand(operands, 0, opcode)?)?;
      let cd = decode_call_data(operand(operands, 1, opcode)?)?;
      Instruction::OptStrUminus(s, cd)
    }
    "opt_send_without_block" => {
      Instruction::OptSendWithoutBlock(decode_call_data(operand(operands, 0, opcode)?)?)
    }
    "definemethod" => {
      let name = decode_symbol(operand(operands, 0, opcode)?)?;
      let nested = decode_iseq(operand(operands, 1, opcode)?, self_value.clone())?;
      Instruction::DefineMethod(name, nested)
    }
    "leave" => Instruction::Leave,
    other => return Err(VmError::DecodeError(format!("unknown opcode `{other}`"))),
  })
}

fn operand<'a>(operands: &'a [Json], index: usize, opcode: &str) -> VmResult<&'a Json> {
  operands
    .get(index)
    .ok_or_else(|| VmError::DecodeError(format!("{opcode}: missing operand {index}")))
}

fn decode_call_data(json: &Json) -> VmResult<CallData> {
  let pair = json
    .as_array()
    .ok_or_else(|| VmError::DecodeError("CallData must be a 2-element array".to_string()))?;
  let method_id = decode_symbol(operand(pair, 0, "CallData")?)?;
  let argc = decode_usize(operand(pair, 1, "CallData")?)?;
  Ok(CallData::new(method_id, argc))
}

fn decode_symbol(json: &Json) -> VmResult<Symbol> {
  json.as_str()
    .map(Symbol::new)
    .ok_or_else(|| VmError::DecodeError(format!("expected a symbol, got {json}")))
}

fn decode_str(json: &Json) -> VmResult<Rc<str>> {
  json.as_str()
    .map(Rc::from)
    .ok_or_else(|| VmError::DecodeError(format!("expected a string literal, got {json}")))
}

fn decode_usize(json: &Json) -> VmResult<usize> {
  json.as_u64()
    .map(|n| n as usize)
    .ok_or_else(|| VmError::DecodeError(format!("expected a non-negative integer, got {json}")))
}

/// Raw `getlocal_WC_0`/`setlocal_WC_0` operand indices are biased by a
/// fixed offset of 3 counted from the deepest slot
/// (`InstructionSequence::translate_local`); valid raw indices for an
/// ISeq with `local_count` locals are exactly `3..=3 + (local_count - 1)`.
/// Anything outside that range would underflow the translation
/// arithmetic at run time, so it is rejected here instead.
fn decode_raw_local(json: &Json, local_count: usize) -> VmResult<usize> {
  let raw = decode_usize(json)?;
  let valid = local_count > 0 && raw >= 3 && raw <= 3 + (local_count - 1);
  if !valid {
    return Err(VmError::DecodeError(format!(
      "local operand {raw} is out of range for an ISeq with {local_count} local(s)"
    )));
  }
  Ok(raw)
}

fn decode_literal(json: &Json) -> VmResult<Value> {
  match json {
    Json::Null => Ok(Value::Nil),
    Json::Bool(true) => Ok(Value::True),
    Json::Bool(false) => Ok(Value::False),
    Json::Number(n) => n
      .as_i64()
      .map(Value::Integer)
      .ok_or_else(|| VmError::DecodeError(format!("integer literal out of range: {n}"))),
    Json::String(s) => Ok(Value::SymbolValue(Symbol::new(s.as_str()))),
    other => Err(VmError::DecodeError(format!("unsupported literal shape: {other}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn wrap(body: Json) -> Json {
    wrap_with_locals(&[], body)
  }

  fn wrap_with_locals(locals: &[&str], body: Json) -> Json {
    let mut wrapper: Vec<Json> = (0..10).map(|_| Json::Null).collect();
    wrapper.push(json!(locals)); // index 10: locals
    wrapper.push(json!({})); // index 11: args
    wrapper.push(body); // last: instruction body
    Json::Array(wrapper)
  }

  #[test]
  fn decodes_putstring_then_leave() {
    let program = wrap(json!([["putstring", "foo"], ["leave"]]));
    let iseq = decode_program(&program).unwrap();
    assert_eq!(iseq.insns.len(), 2);
    assert!(matches!(iseq.insns[0], Instruction::PutString(_)));
    assert!(matches!(iseq.insns[1], Instruction::Leave));
  }

  #[test]
  fn skips_line_numbers_and_ruby_event_line() {
    let program = wrap(json!([1, "RUBY_EVENT_LINE", ["putnil"], 2, ["leave"]]));
    let iseq = decode_program(&program).unwrap();
    assert_eq!(iseq.insns.len(), 2);
  }

  #[test]
  fn resolves_forward_jump_labels() {
    let program = wrap(json!([
      ["putnil"],
      ["branchunless", "label_0"],
      ["putobject", 1],
      "label_0",
      ["leave"]
    ]));
    let iseq = decode_program(&program).unwrap();
    match &iseq.insns[1] {
      Instruction::BranchUnless(target) => assert_eq!(*target, 3),
      other => panic!("expected BranchUnless, got {other:?}"),
    }
  }

  #[test]
  fn newhash_with_odd_count_is_decode_error() {
    let program = wrap(json!([["newhash", 1], ["leave"]]));
    let err = decode_program(&program).unwrap_err();
    assert!(matches!(err, VmError::DecodeError(_)));
  }

  #[test]
  fn getlocal_index_beyond_local_count_is_decode_error() {
    // One local gives a valid raw range of exactly {3}; 4 is one past it.
    let program = wrap_with_locals(&["x"], json!([["getlocal_WC_0", 4], ["leave"]]));
    let err = decode_program(&program).unwrap_err();
    assert!(matches!(err, VmError::DecodeError(_)));
  }

  #[test]
  fn getlocal_index_with_no_locals_is_decode_error() {
    let program = wrap(json!([["getlocal_WC_0", 3], ["leave"]]));
    let err = decode_program(&program).unwrap_err();
    assert!(matches!(err, VmError::DecodeError(_)));
  }

  #[test]
  fn unknown_opcode_is_decode_error() {
    let program = wrap(json!([["frobnicate"], ["leave"]]));
    let err = decode_program(&program).unwrap_err();
    assert!(matches!(err, VmError::DecodeError(_)));
  }

  #[test]
  fn call_data_decodes_method_and_argc() {
    let program = wrap(json!([
      ["putobject", 2],
      ["putobject", 3],
      ["opt_plus", ["+", 1]],
      ["leave"]
    ]));
    let iseq = decode_program(&program).unwrap();
    match &iseq.insns[2] {
      Instruction::OptPlus(cd) => {
        assert_eq!(cd.method_id().as_str(), "+");
        assert_eq!(cd.argc(), 1);
      }
      other => panic!("expected OptPlus, got {other:?}"),
    }
  }

  #[test]
  fn nested_definemethod_inherits_self_value() {
    let nested_body = wrap(json!([["putself"], ["leave"]]));
    let program = wrap(json!([["definemethod", "f", nested_body], ["leave"]]));
    let iseq = decode_program(&program).unwrap();
    match &iseq.insns[0] {
      Instruction::DefineMethod(name, nested) => {
        assert_eq!(name.as_str(), "f");
        assert!(matches!(nested.self_value, Value::Main));
      }
      other => panic!("expected DefineMethod, got {other:?}"),
    }
  }
}
