//! The uniform value representation shared by the value stack, locals,
//! globals, and the host boundary.

use std::{cell::RefCell, cmp::Ordering, collections::HashMap, fmt, rc::Rc};

use crate::iseq::InstructionSequence;

/// An interned-by-clone identifier (method names, global names, label
/// names, constant names). Cloning a `Symbol` is a reference-count bump,
/// not a string copy.
#[derive(Clone, Eq)]
pub struct Symbol(Rc<str>);

impl Symbol {
  /// Creates a new symbol from any string-like value.
  pub fn new(name: impl Into<Rc<str>>) -> Self {
    Self(name.into())
  }

  /// The symbol's textual name.
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl PartialEq for Symbol {
  fn eq(&self, other: &Self) -> bool {
    self.0 == other.0
  }
}

impl std::hash::Hash for Symbol {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.0.hash(state);
  }
}

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, ":{}", self.0)
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for Symbol {
  fn from(s: &str) -> Self {
    Self::new(s)
  }
}

impl From<String> for Symbol {
  fn from(s: String) -> Self {
    Self::new(s)
  }
}

/// A method handle: the instruction sequence implementing a user-defined
/// method, paired with the type it was defined on.
#[derive(Clone)]
pub struct MethodHandle {
  /// The owning type at the time the method was defined.
  pub owner: TypeTag,
  /// The compiled body.
  pub iseq: Rc<InstructionSequence>,
}

impl fmt::Debug for MethodHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MethodHandle").field("owner", &self.owner).finish()
  }
}

/// A host value. Integers, strings, arrays, and hashes use the same
/// representation whether they came from a literal, an arithmetic result,
/// or a method argument — the interpreter never special-cases their
/// origin, only their tag.
#[derive(Clone, Debug)]
pub enum Value {
  /// `nil`.
  Nil,
  /// `true`.
  True,
  /// `false`.
  False,
  /// A host integer.
  Integer(i64),
  /// A mutable string, shared by reference like every other heap value
  /// here (the basic host does not model copy-on-write or freezing).
  StringRef(Rc<RefCell<String>>),
  /// A symbol literal used as a value (as opposed to an instruction
  /// operand, which uses `Symbol` directly).
  SymbolValue(Symbol),
  /// A mutable array of values.
  Array(Rc<RefCell<Vec<Value>>>),
  /// A mutable mapping from value to value. Keyed by `Value`'s `Eq`
  /// impl, which is host equality, not pointer identity.
  Hash(Rc<RefCell<ValueMap>>),
  /// The sentinel top-level `self` object a program executes against
  /// before any user object has been constructed.
  Main,
  /// A bound or unbound user-defined method.
  Method(Rc<MethodHandle>),
  /// Sentinel written into every fresh frame's locals; distinct from
  /// every value a host program can construct. Reading one is always
  /// an error.
  Undefined,
}

/// A `Value`-keyed mapping. Hash/Eq-by-value with `Value` are
/// host-equality; see [`Value::host_eq`].
#[derive(Clone, Debug, Default)]
pub struct ValueMap {
  entries: Vec<(Value, Value)>,
}

impl ValueMap {
  /// An empty mapping.
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts or overwrites `key -> value`, using host equality to find
  /// an existing entry.
  pub fn insert(&mut self, key: Value, value: Value) {
    if let Some(slot) = self.entries.iter_mut().find(|(k, _)| k.host_eq(&key)) {
      slot.1 = value;
    } else {
      self.entries.push((key, value));
    }
  }

  /// Looks up `key` using host equality.
  pub fn get(&self, key: &Value) -> Option<&Value> {
    self.entries.iter().find(|(k, _)| k.host_eq(key)).map(|(_, v)| v)
  }

  /// Number of entries.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether the mapping has no entries.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Iterates `(key, value)` pairs in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
    self.entries.iter()
  }
}

/// The type tag used to key the method table. Distinct from `Value`
/// itself because two `Value`s of the same tag (e.g. two integers) share
/// a method table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
  /// `NilClass`.
  Nil,
  /// `TrueClass`.
  True,
  /// `FalseClass`.
  False,
  /// `Integer`.
  Integer,
  /// `String`.
  StringType,
  /// `Symbol`.
  SymbolType,
  /// `Array`.
  Array,
  /// `Hash`.
  Hash,
  /// The singleton class of the top-level `main` object.
  Main,
  /// `Method`/`UnboundMethod`.
  Method,
}

impl fmt::Display for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      TypeTag::Nil => "NilClass",
      TypeTag::True => "TrueClass",
      TypeTag::False => "FalseClass",
      TypeTag::Integer => "Integer",
      TypeTag::StringType => "String",
      TypeTag::SymbolType => "Symbol",
      TypeTag::Array => "Array",
      TypeTag::Hash => "Hash",
      TypeTag::Main => "Object",
      TypeTag::Method => "Method",
    };
    f.write_str(name)
  }
}

impl Value {
  /// Every value but `nil` and `false` is truthy. This is the one
  /// classification the VM itself is allowed to make; everything else
  /// about a value's behavior is delegated to the host.
  pub fn is_truthy(&self) -> bool {
    !matches!(self, Value::Nil | Value::False)
  }

  /// The type tag used for method table lookups.
  pub fn type_tag(&self) -> TypeTag {
    match self {
      Value::Nil => TypeTag::Nil,
      Value::True => TypeTag::True,
      Value::False => TypeTag::False,
      Value::Integer(_) => TypeTag::Integer,
      Value::StringRef(_) => TypeTag::StringType,
      Value::SymbolValue(_) => TypeTag::SymbolType,
      Value::Array(_) => TypeTag::Array,
      Value::Hash(_) => TypeTag::Hash,
      Value::Main => TypeTag::Main,
      Value::Method(_) => TypeTag::Method,
      Value::Undefined => unreachable!("Undefined is never observed as a live value"),
    }
  }

  /// Constructs a fresh, independently owned string value.
  pub fn string(s: impl Into<String>) -> Self {
    Value::StringRef(Rc::new(RefCell::new(s.into())))
  }

  /// Constructs an array value from an owned vector.
  pub fn array(items: Vec<Value>) -> Self {
    Value::Array(Rc::new(RefCell::new(items)))
  }

  /// Constructs a hash value from an owned mapping.
  pub fn hash(map: ValueMap) -> Self {
    Value::Hash(Rc::new(RefCell::new(map)))
  }

  /// Host equality: used by `opt_eq`, hash-key lookups, and `==`-style
  /// host delegation. Two heap values with equal contents are equal
  /// even if they are not the same allocation — this is Ruby `==`
  /// semantics for the value types modeled here, not identity.
  pub fn host_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Nil, Value::Nil) => true,
      (Value::True, Value::True) => true,
      (Value::False, Value::False) => true,
      (Value::Main, Value::Main) => true,
      (Value::Integer(a), Value::Integer(b)) => a == b,
      (Value::StringRef(a), Value::StringRef(b)) => *a.borrow() == *b.borrow(),
      (Value::SymbolValue(a), Value::SymbolValue(b)) => a == b,
      (Value::Array(a), Value::Array(b)) => {
        let (a, b) = (a.borrow(), b.borrow());
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.host_eq(y))
      }
      (Value::Hash(a), Value::Hash(b)) => {
        let (a, b) = (a.borrow(), b.borrow());
        a.len() == b.len()
          && a.iter().all(|(k, v)| b.get(k).is_some_and(|v2| v.host_eq(v2)))
      }
      _ => false,
    }
  }

  /// Host ordering, used by `opt_lt`/`opt_gt`/etc. Only defined between
  /// two integers in the basic host; see [`crate::host::BasicHost`].
  pub fn partial_cmp_host(&self, other: &Value) -> Option<Ordering> {
    match (self, other) {
      (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
      _ => None,
    }
  }

  /// A human-readable rendering for `p`-style inspection output.
  pub fn inspect(&self) -> String {
    match self {
      Value::Nil => "nil".to_string(),
      Value::True => "true".to_string(),
      Value::False => "false".to_string(),
      Value::Integer(i) => i.to_string(),
      Value::StringRef(s) => format!("{:?}", s.borrow()),
      Value::SymbolValue(s) => format!(":{s}"),
      Value::Array(items) => {
        let items = items.borrow();
        let rendered: Vec<String> = items.iter().map(Value::inspect).collect();
        format!("[{}]", rendered.join(", "))
      }
      Value::Hash(map) => {
        let map = map.borrow();
        let rendered: Vec<String> = map
          .iter()
          .map(|(k, v)| format!("{}=>{}", k.inspect(), v.inspect()))
          .collect();
        format!("{{{}}}", rendered.join(", "))
      }
      Value::Main => "main".to_string(),
      Value::Method(handle) => format!("#<Method: {}>", handle.owner),
      Value::Undefined => "undefined".to_string(),
    }
  }

  /// A `puts`-style rendering: like `inspect` but strings print bare.
  pub fn to_display_string(&self) -> String {
    match self {
      Value::StringRef(s) => s.borrow().clone(),
      other => other.inspect(),
    }
  }
}

/// `HashMap` used for the context's globals table and method table; kept
/// as a thin alias so call sites read as intent rather than plumbing.
pub type SymbolMap<V> = HashMap<Symbol, V>;
