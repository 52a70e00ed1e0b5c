//! This module defines errors returned by the execution core.

use crate::value::TypeTag;
use thiserror::Error;

/// Errors that can occur while decoding or executing a bytecode program.
#[derive(Debug, Error)]
pub enum VmError {
  /// The compiler's tuple tree was malformed in a way the decoder could
  /// not recognize. Fatal to construction; never raised at run time.
  #[error("decode error: {0}")]
  DecodeError(String),

  /// A local slot was read before it was ever written.
  #[error("undefined local `{name}` in method on {owner:?}")]
  UndefinedLocal {
    /// Name of the local variable, when known.
    name: String,
    /// The `self_value` type of the enclosing instruction sequence.
    owner: TypeTag,
  },

  /// A user-defined method was called with an argument count outside the
  /// single supported shape (`{lead_num: k}` or no arguments).
  #[error("wrong number of arguments for `{method}` (given {given})")]
  ArgArityError {
    /// The method that was called.
    method: String,
    /// The number of arguments the call site provided.
    given: usize,
  },

  /// The host runtime raised an error while servicing a delegated send,
  /// a constant lookup, or a lazy global import.
  #[error("host error: {0}")]
  HostError(String),

  /// Stack underflow, a missing label, or an unreachable instruction —
  /// indicates a bug in the decoder or instruction set.
  #[error("internal vm error: {0}")]
  InternalError(String),

  /// The frame stack grew past the configured recursion limit.
  #[error("stack overflow: exceeded max recursion depth of {limit}")]
  StackOverflow {
    /// The configured limit that was exceeded.
    limit: usize,
  },
}

/// Convenience alias used throughout the crate.
pub type VmResult<T> = Result<T, VmError>;
