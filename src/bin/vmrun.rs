//! Thin CLI driver: `vmrun <file>` runs a compiled program; `vmrun
//! --dump=insns <file>` disassembles it instead.

use std::{fs, path::PathBuf};

use stackvm::{config::VmConfig, decode::decode_program, disasm::disassemble, eval, host};

fn init_logger() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .try_init();
}

fn main() -> anyhow::Result<()> {
  init_logger();

  let mut args = std::env::args().skip(1);
  let first = args.next();

  let (dump_insns, path) = match first.as_deref() {
    Some("--dump=insns") => (true, args.next()),
    Some(other) => (false, Some(other.to_string())),
    None => (false, None),
  };

  let Some(path) = path else {
    anyhow::bail!("usage: vmrun [--dump=insns] <file>");
  };

  let source = fs::read_to_string(PathBuf::from(&path))?;
  let program: serde_json::Value = serde_json::from_str(&source)?;

  if dump_insns {
    let iseq = decode_program(&program)?;
    print!("{}", disassemble(&iseq));
    return Ok(());
  }

  let mut runtime = host::BasicHost::new(std::io::stdout());
  eval(&program, &mut runtime, VmConfig::default())?;
  Ok(())
}
