//! Whole-pipeline scenario tests: JSON tuple tree in, observable `puts`/
//! `p` output out. Kept separate from the inline unit tests colocated
//! with each module.

use assert_matches::assert_matches;
use serde_json::json;

use stackvm::{
  config::VmConfig,
  context::ExecutionContext,
  error::VmError,
  eval, eval_in_context,
  host::{buffered_host, BasicHost},
};

fn wrap(locals: Vec<&str>, args: serde_json::Value, body: serde_json::Value) -> serde_json::Value {
  let mut wrapper: Vec<serde_json::Value> = (0..10).map(|_| serde_json::Value::Null).collect();
  wrapper.push(json!(locals));
  wrapper.push(args);
  wrapper.push(body);
  serde_json::Value::Array(wrapper)
}

fn program(body: serde_json::Value) -> serde_json::Value {
  wrap(vec![], json!({}), body)
}

fn run(prog: &serde_json::Value) -> (String, stackvm::value::Value) {
  let mut host: BasicHost<Vec<u8>> = buffered_host();
  let result = eval(prog, &mut host, VmConfig::default()).expect("evaluation should succeed");
  (String::from_utf8(host.output().clone()).unwrap(), result)
}

#[test]
fn puts_foo_prints_foo() {
  let prog = program(json!([
    ["putself"],
    ["putstring", "foo"],
    ["opt_send_without_block", ["puts", 1]],
    ["leave"]
  ]));
  let (output, _) = run(&prog);
  assert_eq!(output, "foo\n");
}

#[test]
fn p_two_plus_three_prints_five() {
  let prog = program(json!([
    ["putself"],
    ["putobject", 2],
    ["putobject", 3],
    ["opt_plus", ["+", 1]],
    ["opt_send_without_block", ["p", 1]],
    ["leave"]
  ]));
  let (output, result) = run(&prog);
  assert_eq!(output, "5\n");
  assert_matches!(result, stackvm::value::Value::Integer(5));
}

#[test]
fn p_two_div_three_prints_zero() {
  let prog = program(json!([
    ["putself"],
    ["putobject", 2],
    ["putobject", 3],
    ["opt_div", ["/", 1]],
    ["opt_send_without_block", ["p", 1]],
    ["leave"]
  ]));
  let (output, _) = run(&prog);
  assert_eq!(output, "0\n");
}

#[test]
fn p_two_or_three_prints_three() {
  let prog = program(json!([
    ["putself"],
    ["putobject", 2],
    ["putobject", 3],
    ["opt_or", ["|", 1]],
    ["opt_send_without_block", ["p", 1]],
    ["leave"]
  ]));
  let (output, _) = run(&prog);
  assert_eq!(output, "3\n");
}

#[test]
fn p_negated_string_prints_quoted_form() {
  let prog = program(json!([
    ["putself"],
    ["opt_str_uminus", "string", ["-@", 0]],
    ["opt_send_without_block", ["p", 1]],
    ["leave"]
  ]));
  let (output, _) = run(&prog);
  assert_eq!(output, "\"string\"\n");
}

#[test]
fn global_assignment_round_trips_through_p() {
  let prog = program(json!([
    ["putobject", 5],
    ["setglobal", "$g"],
    ["putself"],
    ["getglobal", "$g"],
    ["opt_send_without_block", ["p", 1]],
    ["leave"]
  ]));
  let mut host: BasicHost<Vec<u8>> = buffered_host();
  let mut ctx = ExecutionContext::new(VmConfig::default());
  eval_in_context(&prog, &mut host, &mut ctx).unwrap();
  assert_eq!(String::from_utf8(host.output().clone()).unwrap(), "5\n");
  assert_matches!(
    ctx.get_global(&stackvm::value::Symbol::new("$g")),
    Some(stackvm::value::Value::Integer(5))
  );
}

#[test]
fn user_defined_method_call_prints_forty_two() {
  let method_body = wrap(
    vec!["x"],
    json!({"lead_num": 1}),
    json!([
      ["getlocal_WC_0", 3],
      ["putobject", 1],
      ["opt_plus", ["+", 1]],
      ["leave"]
    ]),
  );
  let prog = program(json!([
    ["definemethod", "f", method_body],
    ["pop"],
    ["putself"],
    ["putself"],
    ["putobject", 41],
    ["opt_send_without_block", ["f", 1]],
    ["opt_send_without_block", ["p", 1]],
    ["leave"]
  ]));
  let (output, _) = run(&prog);
  assert_eq!(output, "42\n");
}

#[test]
fn branchunless_treats_only_nil_and_false_as_falsy() {
  // `0 ? 1 : 2` takes the truthy path, because unlike some languages,
  // integer zero is not falsy here.
  let prog = program(json!([
    ["putobject", 0],
    ["branchunless", "on_false"],
    ["putobject", 1],
    ["jump", "end"],
    "on_false",
    ["putobject", 2],
    "end",
    ["leave"]
  ]));
  let (_, result) = run(&prog);
  assert_matches!(result, stackvm::value::Value::Integer(1));
}

#[test]
fn newhash_with_odd_count_is_a_decode_error() {
  let mut host: BasicHost<Vec<u8>> = buffered_host();
  let prog = program(json!([["newhash", 3], ["leave"]]));
  let err = eval(&prog, &mut host, VmConfig::default()).unwrap_err();
  assert_matches!(err, VmError::DecodeError(_));
}

#[test]
fn reading_an_unset_local_names_it_in_the_error() {
  let prog = wrap(vec!["x"], json!({}), json!([["getlocal_WC_0", 3], ["leave"]]));
  let mut host: BasicHost<Vec<u8>> = buffered_host();
  let err = eval(&prog, &mut host, VmConfig::default()).unwrap_err();
  match err {
    VmError::UndefinedLocal { name, .. } => assert_eq!(name, "x"),
    other => panic!("expected UndefinedLocal, got {other:?}"),
  }
}

#[test]
fn calling_a_method_with_the_wrong_arity_is_an_error() {
  let method_body = wrap(vec!["x"], json!({"lead_num": 1}), json!([["leave"]]));
  let prog = program(json!([
    ["definemethod", "f", method_body],
    ["putself"],
    ["opt_send_without_block", ["f", 0]],
    ["leave"]
  ]));
  let mut host: BasicHost<Vec<u8>> = buffered_host();
  let err = eval(&prog, &mut host, VmConfig::default()).unwrap_err();
  assert_matches!(err, VmError::ArgArityError { .. });
}
