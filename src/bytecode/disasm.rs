use std::collections::BTreeSet;
use std::fmt::Write;

use crate::bytecode::ir::{Chunk, Instruction};
use crate::bytecode::op::Op;
use crate::bytecode::syscall::Syscall;
use crate::lang::value::Value;

/// Print disassembly of a chunk
pub fn print_chunk(chunk: &Chunk) {
    print!("{}", format_chunk(chunk));
}

/// Render a chunk: constant pool, then one line per instruction.
///
/// Jump targets get a `►` marker and a separator line above them. A chunk
/// that stops decoding partway (only possible for hand-built chunks) ends
/// with an `<error>` line.
pub fn format_chunk(chunk: &Chunk) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(
        out,
        " cartridge: {} code words, {} constants",
        chunk.len(),
        chunk.constants.len()
    );
    let _ = writeln!(out, "════════════════════════════════════════");

    for (i, value) in chunk.constants.iter().enumerate() {
        let _ = writeln!(out, "  k{:<3} {}", i, format_value(value));
    }
    if !chunk.constants.is_empty() {
        let _ = writeln!(out);
    }

    let (insts, error) = decode_all(chunk);
    let targets = collect_jump_targets(&insts);

    for inst in &insts {
        for f in chunk.functions.iter().filter(|f| f.addr as usize == inst.addr) {
            let _ = writeln!(out, "     {}():", f.name);
        }
        if targets.contains(&inst.addr) {
            let _ = writeln!(out, "      ┌──────────────────────────────────");
        }
        let marker = if targets.contains(&inst.addr) { "► " } else { "  " };
        let _ = writeln!(
            out,
            "{:04} {}{}",
            inst.addr,
            marker,
            format_instruction(chunk, inst)
        );
    }

    if let Some(error) = error {
        let _ = writeln!(out, "<error> {}", error);
    }

    out
}

fn decode_all(chunk: &Chunk) -> (Vec<Instruction>, Option<String>) {
    let mut insts = Vec::new();
    let mut addr = 0;
    while addr < chunk.len() {
        match chunk.decode_at(addr) {
            Ok(inst) => {
                addr = inst.next_addr();
                insts.push(inst);
            }
            Err(e) => return (insts, Some(e.to_string())),
        }
    }
    (insts, None)
}

fn collect_jump_targets(insts: &[Instruction]) -> BTreeSet<usize> {
    insts
        .iter()
        .filter(|i| i.op.is_jump())
        .map(|i| i.a as usize)
        .collect()
}

/// One instruction as `MNEMONIC  operands  ; comment`.
pub fn format_instruction(chunk: &Chunk, inst: &Instruction) -> String {
    let constant = |k: u32| {
        chunk
            .constants
            .get(k as usize)
            .map_or_else(|| "<bad constant>".to_string(), format_value)
    };

    match inst.op {
        Op::LoadConst => format!("{:<12} {:<4} ; {}", inst.op, inst.a, constant(inst.a)),
        Op::LoadGlobal | Op::StoreGlobal => {
            format!("{:<12} {:<4} ; {}", inst.op, inst.a, constant(inst.a))
        }
        Op::Jmp | Op::JmpIfFalse => format!("{:<12} -> {:04}", inst.op, inst.a),
        Op::Call => format!("{:<12} {}", inst.op, inst.a),
        Op::Sys => {
            let name = Syscall::by_id(inst.a).map_or("<unknown>", |spec| spec.name);
            format!("{:<12} {:<4} {:<4} ; {}/{}", inst.op, inst.a, inst.b, name, inst.b)
        }
        _ => inst.op.to_string(),
    }
}

/// Format a value for display in disassembly (strings quoted)
fn format_value(v: &Value) -> String {
    match v {
        Value::Str(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::frontend::parse_source;

    fn disasm(source: &str) -> String {
        let program = parse_source(source).unwrap();
        format_chunk(&compile(&program).unwrap())
    }

    #[test]
    fn test_lists_constants_and_mnemonics() {
        let out = disasm("x = \"hi\"");
        assert!(out.contains("k0   \"hi\""));
        assert!(out.contains("k1   \"x\""));
        assert!(out.contains("0000   LOAD_CONST   0    ; \"hi\""));
        assert!(out.contains("0002   STORE_GLOBAL 1    ; \"x\""));
        assert!(out.contains("0004   HALT"));
    }

    #[test]
    fn test_marks_jump_targets() {
        let out = disasm("while 0 do end");
        assert!(out.contains("0000 ► LOAD_CONST"));
        assert!(out.contains("JMP          -> 0000"));
        assert!(out.contains("JMP_IF_FALSE -> 0006"));
        assert!(out.contains("0006 ► HALT"));
    }

    #[test]
    fn test_syscall_names() {
        let out = disasm("pset(1, 2, 3)");
        assert!(out.contains("; pset/3"));
    }

    #[test]
    fn test_labels_function_entries() {
        let out = disasm("function f()\nend");
        assert!(out.contains("     f():\n0002   LOAD_CONST"), "{}", out);
    }

    #[test]
    fn test_bad_chunk_reports_error() {
        let chunk = Chunk {
            code: vec![Op::Pop.code(), 77],
            constants: vec![],
            functions: vec![],
        };
        let out = format_chunk(&chunk);
        assert!(out.contains("0000   POP"));
        assert!(out.contains("<error> unknown opcode 77 at 0001"));
    }
}
