//! Packet-filter virtual machine: a BPF-classic assembler and
//! interpreter attached to the capture path.

pub mod asm;
pub mod inst;
pub mod vm;

pub use asm::{assemble, dump_c, dump_flat, AsmError};
pub use inst::Instruction;
pub use vm::run;

/// Assemble `source` and report every diagnostic through `tracing`,
/// matching the CLI's "one error per line, nonzero exit" policy (§7).
pub fn assemble_or_log(source: &str, file: &str) -> Result<Vec<Instruction>, Vec<AsmError>> {
    match assemble(source, file) {
        Ok(program) => Ok(program),
        Err(errors) => {
            for e in &errors {
                tracing::error!("{e}");
            }
            Err(errors)
        }
    }
}
