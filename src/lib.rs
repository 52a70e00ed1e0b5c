//! A stack-based bytecode interpreter for a small, Ruby-flavored
//! dynamically-typed host language.
//!
//! The execution core — value model, instruction set, execution context,
//! frame/call protocol, and dispatch loop — is this crate's subject. The
//! compiler front end and the real host runtime are out of scope; see
//! [`host`] for the minimal default runtime that makes the crate
//! runnable end to end, and [`decode`] for the concrete JSON transport
//! that stands in for a real compiler's output.
#![warn(missing_docs)]

pub mod call_data;
pub mod config;
pub mod context;
pub mod decode;
pub mod disasm;
pub mod error;
pub mod executor;
pub mod frame;
pub mod host;
pub mod instruction;
pub mod iseq;
pub mod value;

use config::VmConfig;
use error::VmResult;
use executor::Executor;
use host::HostRuntime;
use value::Value;

/// Decodes `program` and runs it to completion against `host`, returning
/// the top-level instruction sequence's return value.
///
/// This is the single entry point a CLI driver or embedder needs: it
/// owns the [`context::ExecutionContext`] for the duration of the run,
/// so callers never construct one directly unless they want to inspect
/// post-run state (globals, method table) themselves — see
/// [`eval_in_context`].
pub fn eval(program: &serde_json::Value, host: &mut dyn HostRuntime, config: VmConfig) -> VmResult<Value> {
  let mut ctx = context::ExecutionContext::new(config);
  eval_in_context(program, host, &mut ctx)
}

/// Like [`eval`], but runs against a caller-owned [`context::ExecutionContext`]
/// so its globals and method table remain inspectable (or reusable
/// across multiple top-level programs) after the call returns.
pub fn eval_in_context(
  program: &serde_json::Value,
  host: &mut dyn HostRuntime,
  ctx: &mut context::ExecutionContext,
) -> VmResult<Value> {
  let iseq = decode::decode_program(program).map_err(|e| {
    tracing::error!(error = %e, "decode failed");
    e
  })?;
  let mut executor = Executor::new(ctx, host);
  executor.run(iseq).map_err(|e| {
    tracing::error!(error = %e, "evaluation failed");
    e
  })
}
