//! The host runtime boundary.
//!
//! The execution core never special-cases integers vs. strings vs. any
//! other primitive type; every operation that is not a user-defined
//! method is delegated through this trait, mirroring how `wasmi` never
//! implements a host function itself but calls through a `Func`/
//! trampoline boundary into embedder code (`wasmi::Store`,
//! `HostFuncEntity`).

use std::io::Write;

use crate::value::{Symbol, Value};

/// The set of primitive behaviors the execution core delegates to. An
/// embedder implementing a real host language plugs in their own
/// `HostRuntime`; [`BasicHost`] is the minimal default used by the CLI
/// driver and the end-to-end tests.
pub trait HostRuntime {
  /// Dynamically invokes `method` on `receiver` with `args`, for any
  /// `(type_tag, method)` pair not found in the context's user-defined
  /// method table.
  fn send(&mut self, receiver: &Value, method: &Symbol, args: &[Value]) -> Result<Value, String>;

  /// Looks up a currently-defined host global by name, for lazy import
  /// on a `getglobal`/`setglobal` miss.
  fn import_global(&self, name: &Symbol) -> Option<Value>;

  /// Looks up a host constant by name.
  fn constant(&self, name: &Symbol) -> Option<Value>;
}

/// The minimal default [`HostRuntime`]. Implements just enough primitive
/// behavior to run the end-to-end scenarios: integer arithmetic and
/// comparison, string/array/hash introspection, `[]`, and `puts`/`p`
/// printing to an injected sink instead of real stdout (so tests can
/// capture output without process-wide side effects).
pub struct BasicHost<W: Write> {
  out: W,
  globals: std::collections::HashMap<Symbol, Value>,
  constants: std::collections::HashMap<Symbol, Value>,
}

impl<W: Write> BasicHost<W> {
  /// Creates a basic host that writes `puts`/`p` output to `out`.
  pub fn new(out: W) -> Self {
    Self { out, globals: Default::default(), constants: Default::default() }
  }

  /// Pre-seeds a host global, as if it had been set outside the VM
  /// before evaluation began.
  pub fn seed_global(&mut self, name: impl Into<Symbol>, value: Value) {
    self.globals.insert(name.into(), value);
  }

  /// Pre-seeds a host constant.
  pub fn seed_constant(&mut self, name: impl Into<Symbol>, value: Value) {
    self.constants.insert(name.into(), value);
  }

  /// The sink `puts`/`p` output has been written to so far, for tests
  /// that capture output instead of writing to real stdout.
  pub fn output(&self) -> &W {
    &self.out
  }

  fn int_binop(
    &mut self,
    receiver: &Value,
    method: &str,
    args: &[Value],
  ) -> Option<Result<Value, String>> {
    let Value::Integer(a) = receiver else { return None };
    let Some(Value::Integer(b)) = args.first() else { return None };
    let (a, b) = (*a, *b);
    let result = match method {
      "+" => Value::Integer(a.wrapping_add(b)),
      "-" => Value::Integer(a.wrapping_sub(b)),
      "*" => Value::Integer(a.wrapping_mul(b)),
      "/" => {
        if b == 0 {
          return Some(Err("divided by 0".to_string()));
        }
        Value::Integer(a.div_euclid(b))
      }
      "%" => {
        if b == 0 {
          return Some(Err("divided by 0".to_string()));
        }
        Value::Integer(a.rem_euclid(b))
      }
      "&" => Value::Integer(a & b),
      "|" => Value::Integer(a | b),
      "==" => bool_value(a == b),
      ">=" => bool_value(a >= b),
      ">" => bool_value(a > b),
      "<=" => bool_value(a <= b),
      "<" => bool_value(a < b),
      _ => return None,
    };
    Some(Ok(result))
  }

  fn print_line(&mut self, text: &str) {
    let _ = writeln!(self.out, "{text}");
  }
}

fn bool_value(b: bool) -> Value {
  if b { Value::True } else { Value::False }
}

impl<W: Write> HostRuntime for BasicHost<W> {
  fn send(&mut self, receiver: &Value, method: &Symbol, args: &[Value]) -> Result<Value, String> {
    let mid = method.as_str();

    if let Some(result) = self.int_binop(receiver, mid, args) {
      return result;
    }

    match (receiver, mid) {
      (_, "puts") => {
        for arg in args {
          self.print_line(&arg.to_display_string());
        }
        if args.is_empty() {
          self.print_line("");
        }
        Ok(Value::Nil)
      }
      (_, "p") => {
        for arg in args {
          self.print_line(&arg.inspect());
        }
        Ok(args.last().cloned().unwrap_or(Value::Nil))
      }
      (Value::StringRef(s), "-@") => Ok(Value::StringRef(s.clone())),
      (Value::StringRef(s), "length") => Ok(Value::Integer(s.borrow().len() as i64)),
      (Value::StringRef(s), "empty?") => Ok(bool_value(s.borrow().is_empty())),
      (Value::Array(a), "length") => Ok(Value::Integer(a.borrow().len() as i64)),
      (Value::Array(a), "empty?") => Ok(bool_value(a.borrow().is_empty())),
      (Value::Array(a), "[]") => {
        let Some(Value::Integer(idx)) = args.first() else {
          return Err("no implicit conversion to Integer".to_string());
        };
        let arr = a.borrow();
        let value = usize::try_from(*idx)
          .ok()
          .and_then(|i| arr.get(i))
          .cloned()
          .unwrap_or(Value::Nil);
        Ok(value)
      }
      (Value::Hash(h), "length") => Ok(Value::Integer(h.borrow().len() as i64)),
      (Value::Hash(h), "empty?") => Ok(bool_value(h.borrow().is_empty())),
      (Value::Hash(h), "[]") => {
        let key = args.first().cloned().unwrap_or(Value::Nil);
        Ok(h.borrow().get(&key).cloned().unwrap_or(Value::Nil))
      }
      (_, "nil?") => Ok(bool_value(matches!(receiver, Value::Nil))),
      (_, "!") => Ok(bool_value(!receiver.is_truthy())),
      (Value::Integer(i), "succ") => Ok(Value::Integer(i + 1)),
      (_, "==") => Ok(bool_value(receiver.host_eq(args.first().unwrap_or(&Value::Nil)))),
      _ => Err(format!(
        "undefined method `{mid}' for {}",
        receiver.type_tag()
      )),
    }
  }

  fn import_global(&self, name: &Symbol) -> Option<Value> {
    self.globals.get(name).cloned()
  }

  fn constant(&self, name: &Symbol) -> Option<Value> {
    self.constants.get(name).cloned()
  }
}

/// Convenience constructor for tests: a [`BasicHost`] writing into an
/// in-memory buffer instead of stdout.
pub fn buffered_host() -> BasicHost<Vec<u8>> {
  BasicHost::new(Vec::new())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integer_arithmetic() {
    let mut host = buffered_host();
    let result = host
      .send(&Value::Integer(2), &Symbol::new("+"), &[Value::Integer(3)])
      .unwrap();
    assert!(matches!(result, Value::Integer(5)));
  }

  #[test]
  fn integer_division_is_floor() {
    let mut host = buffered_host();
    let result = host
      .send(&Value::Integer(2), &Symbol::new("/"), &[Value::Integer(3)])
      .unwrap();
    assert!(matches!(result, Value::Integer(0)));
  }

  #[test]
  fn puts_writes_display_form() {
    let mut host = buffered_host();
    host.send(&Value::Main, &Symbol::new("puts"), &[Value::string("foo")]).unwrap();
    assert_eq!(host.out, b"foo\n");
  }

  #[test]
  fn unknown_method_is_host_error() {
    let mut host = buffered_host();
    let err = host.send(&Value::Nil, &Symbol::new("frobnicate"), &[]).unwrap_err();
    assert!(err.contains("frobnicate"));
  }
}
