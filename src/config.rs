//! Execution context configuration.
//!
//! Grounded on `wasmi`'s `engine::stack::StackLimits`: an explicit,
//! passed-in limits struct rather than a compiled-in constant, so the
//! same binary can run both a REPL-friendly deep recursion limit and a
//! tight one for embedding in a constrained host.

/// Default maximum number of live frames, matching `wasmi`'s
/// `DEFAULT_MAX_RECURSION_DEPTH`.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1024;

/// Configuration for an [`crate::context::ExecutionContext`].
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
  /// Maximum number of live frames. Exceeding this raises
  /// [`crate::error::VmError::StackOverflow`].
  pub max_recursion_depth: usize,
  /// Whether to emit a `tracing::trace!` event per dispatched
  /// instruction. Off by default; this is comparatively expensive.
  pub trace_instructions: bool,
}

impl Default for VmConfig {
  fn default() -> Self {
    Self {
      max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
      trace_instructions: false,
    }
  }
}
