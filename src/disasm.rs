//! Pretty-printing for `--dump=insns`, and for the round-trip property
//! that decoding then disassembling an ISeq reproduces the source
//! opcode mnemonics.

use std::fmt::Write as _;

use crate::{instruction::Instruction, iseq::IseqRef};

/// Renders `iseq` and every nested ISeq reachable through its
/// `definemethod` instructions, breadth-first, each separated by a
/// `== disasm` banner — the output of the `<driver> --dump=insns`
/// CLI surface.
pub fn disassemble(iseq: &IseqRef) -> String {
  let mut out = String::new();
  let mut queue = std::collections::VecDeque::new();
  queue.push_back(iseq.clone());

  while let Some(current) = queue.pop_front() {
    writeln!(out, "== disasm: #<ISeq:{} locals={}>", "<compiled>", current.locals.len())
      .unwrap();
    for (pc, instr) in current.insns.iter().enumerate() {
      writeln!(out, "{pc:04} {}", render_instruction(instr)).unwrap();
      if let Instruction::DefineMethod(_, nested) = instr {
        queue.push_back(nested.clone());
      }
    }
    out.push('\n');
  }
  out
}

fn render_instruction(instr: &Instruction) -> String {
  let mnemonic = instr.mnemonic();
  match instr {
    Instruction::PutObject(v) => format!("{mnemonic} {}", v.inspect()),
    Instruction::PutString(s) => format!("{mnemonic} {s:?}"),
    Instruction::NewArray(n) | Instruction::NewHash(n) => format!("{mnemonic} {n}"),
    Instruction::GetGlobal(name)
    | Instruction::SetGlobal(name)
    | Instruction::GetConstant(name) => format!("{mnemonic} {name}"),
    Instruction::GetLocalWC0(idx) | Instruction::SetLocalWC0(idx) => {
      format!("{mnemonic} {idx}")
    }
    Instruction::Jump(target)
    | Instruction::BranchNil(target)
    | Instruction::BranchUnless(target) => format!("{mnemonic} {target:04}"),
    Instruction::OptGetInlineCache(target, cache) => {
      format!("{mnemonic} {target:04}, {cache}")
    }
    Instruction::OptSetInlineCache(cache) => format!("{mnemonic} {cache}"),
    Instruction::OptPlus(cd)
    | Instruction::OptMinus(cd)
    | Instruction::OptDiv(cd)
    | Instruction::OptMod(cd)
    | Instruction::OptAnd(cd)
    | Instruction::OptOr(cd)
    | Instruction::OptEq(cd)
    | Instruction::OptGe(cd)
    | Instruction::OptGt(cd)
    | Instruction::OptLe(cd)
    | Instruction::OptLt(cd)
    | Instruction::OptAref(cd)
    | Instruction::OptNot(cd)
    | Instruction::OptEmptyP(cd)
    | Instruction::OptNilP(cd)
    | Instruction::OptLength(cd)
    | Instruction::OptSucc(cd)
    | Instruction::OptSendWithoutBlock(cd) => {
      format!("{mnemonic} <callinfo!mid:{}, argc:{}>", cd.method_id(), cd.argc())
    }
    Instruction::OptArefWith(key, cd) => {
      format!(
        "{mnemonic} {}, <callinfo!mid:{}, argc:{}>",
        key.inspect(),
        cd.method_id(),
        cd.argc()
      )
    }
    Instruction::OptStrFreeze(s) => format!("{mnemonic} {s:?}"),
    Instruction::OptStrUminus(s, cd) => {
      format!("{mnemonic} {s:?}, <callinfo!mid:{}>", cd.method_id())
    }
    Instruction::DefineMethod(name, _) => format!("{mnemonic} {name}"),
    Instruction::PutNil
    | Instruction::PutObjectInt2Fix0
    | Instruction::PutObjectInt2Fix1
    | Instruction::PutSelf
    | Instruction::Pop
    | Instruction::Dup
    | Instruction::Swap
    | Instruction::DupArray(_)
    | Instruction::DupHash(_)
    | Instruction::ConcatArray
    | Instruction::Leave => mnemonic.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::decode_program;
  use serde_json::json;

  fn wrap(body: serde_json::Value) -> serde_json::Value {
    let mut wrapper: Vec<serde_json::Value> = (0..10).map(|_| serde_json::Value::Null).collect();
    wrapper.push(json!([]));
    wrapper.push(json!({}));
    wrapper.push(body);
    serde_json::Value::Array(wrapper)
  }

  #[test]
  fn round_trip_preserves_opcode_mnemonics() {
    let program = wrap(json!([
      ["putobject", 2],
      ["putobject", 3],
      ["opt_plus", ["+", 1]],
      ["leave"]
    ]));
    let iseq = decode_program(&program).unwrap();
    let rendered = disassemble(&iseq);
    assert!(rendered.contains("putobject 2"));
    assert!(rendered.contains("putobject 3"));
    assert!(rendered.contains("opt_plus"));
    assert!(rendered.contains("leave"));
  }

  #[test]
  fn nested_method_bodies_get_their_own_banner() {
    let nested_body = wrap(json!([["putself"], ["leave"]]));
    let program = wrap(json!([["definemethod", "f", nested_body], ["leave"]]));
    let iseq = decode_program(&program).unwrap();
    let rendered = disassemble(&iseq);
    assert_eq!(rendered.matches("== disasm").count(), 2);
    assert!(rendered.contains("putself"));
  }
}
