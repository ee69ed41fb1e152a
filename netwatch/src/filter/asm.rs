//! Two-pass BPF-classic assembler.
//!
//! Grounded directly on `bpf/parse.c`: pass 1 walks the source once just
//! to record every label's instruction index; pass 2 walks it again and
//! actually emits instructions, resolving each jump against the table
//! pass 1 built. The grounding parser only rejects *backward* conditional
//! jumps (`if (jt->value < parser.line || jf->value < parser.line)`); we
//! apply the same "forward only" rule uniformly, including to the
//! unconditional jump, since nothing in this system ever needs to loop.

use super::inst::*;

pub const MAX_INSN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for AsmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: error: {}", self.file, self.line, self.message)
    }
}

struct Parser<'a> {
    file: &'a str,
    errors: Vec<AsmError>,
}

impl<'a> Parser<'a> {
    fn err(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(AsmError { file: self.file.to_string(), line, message: message.into() });
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// A label line is a single identifier ending in `:`, nothing else.
fn label_name(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.ends_with(':') && !line[..line.len() - 1].contains(char::is_whitespace) && line.len() > 1 {
        Some(&line[..line.len() - 1])
    } else {
        None
    }
}

fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(|t| t.trim_end_matches(',').to_string()).collect()
}

fn parse_imm(tok: &str) -> Option<i64> {
    let tok = tok.strip_prefix('#')?;
    let (neg, digits) = if let Some(rest) = tok.strip_prefix('-') { (true, rest) } else { (false, tok) };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

/// `[12]` -> `(BPF_ABS, 12)`, `[x+16]` -> `(BPF_IND, 16)`.
fn parse_bracket_addr(tok: &str) -> Option<(u16, u32)> {
    let inner = tok.strip_prefix('[')?.strip_suffix(']')?;
    if let Some(rest) = inner.strip_prefix("x+") {
        Some((BPF_IND, rest.parse().ok()?))
    } else {
        Some((BPF_ABS, inner.parse().ok()?))
    }
}

/// `M[3]` -> `3`.
fn parse_mem_addr(tok: &str) -> Option<u32> {
    let inner = tok.strip_prefix("M[")?.strip_suffix(']')?;
    inner.parse().ok()
}

/// `4*([14]&0xf)` -> `14`, the IP-header-length idiom.
fn parse_msh(tok: &str) -> Option<u32> {
    let inner = tok.strip_prefix("4*(")?.strip_suffix(')')?;
    let inner = inner.strip_suffix("&0xf")?;
    let k_str = inner.strip_prefix('[')?.strip_suffix(']')?;
    k_str.parse().ok()
}

const ALU_MNEMONICS: &[(&str, u16)] =
    &[("add", BPF_ADD), ("sub", BPF_SUB), ("mul", BPF_MUL), ("div", BPF_DIV), ("and", BPF_AND), ("or", BPF_OR), ("xor", BPF_XOR), ("lsh", BPF_LSH), ("rsh", BPF_RSH)];

const COND_JMP_MNEMONICS: &[(&str, u16)] = &[("jeq", BPF_JEQ), ("jgt", BPF_JGT), ("jge", BPF_JGE), ("jset", BPF_JSET)];

struct PendingJump {
    insn_index: usize,
    true_label: String,
    false_label: Option<String>,
    line: usize,
}

/// Assemble `source` into a program. On any error, every diagnostic is
/// returned and the caller gets no instructions (per §7: "a non-empty
/// error list yields an empty program").
pub fn assemble(source: &str, file: &str) -> Result<Vec<Instruction>, Vec<AsmError>> {
    let mut p = Parser { file, errors: Vec::new() };
    let mut labels = std::collections::HashMap::new();
    let mut insn_count = 0usize;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = label_name(line) {
            if labels.insert(name.to_string(), insn_count).is_some() {
                p.err(line_no, format!("label '{name}' defined more than once"));
            }
            continue;
        }
        insn_count += 1;
    }
    if insn_count > MAX_INSN {
        p.err(0, format!("program exceeds max number of instructions: {MAX_INSN}"));
    }
    if !p.errors.is_empty() {
        return Err(p.errors);
    }

    let mut program = Vec::with_capacity(insn_count);
    let mut pending_jumps = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() || label_name(line).is_some() {
            continue;
        }
        let tokens = tokenize(line);
        let mnemonic = tokens[0].as_str();
        let insn_index = program.len();

        let built = match mnemonic {
            "ld" | "ldh" | "ldb" => parse_ld(&tokens, mnemonic, &mut p, line_no),
            "ldx" | "ldxb" => parse_ldx(&tokens, &mut p, line_no),
            "st" | "stx" => parse_st(&tokens, mnemonic, &mut p, line_no),
            "tax" => Some(Instruction::new(BPF_MISC | BPF_TAX, 0, 0, 0)),
            "txa" => Some(Instruction::new(BPF_MISC | BPF_TXA, 0, 0, 0)),
            "ret" => parse_ret(&tokens, &mut p, line_no),
            "jmp" => parse_jmp(&tokens, &labels, insn_index, &mut p, line_no),
            m if ALU_MNEMONICS.iter().any(|(n, _)| *n == m) => parse_alu(&tokens, m, &mut p, line_no),
            m if COND_JMP_MNEMONICS.iter().any(|(n, _)| *n == m) => {
                parse_cond_jmp(&tokens, m, insn_index, &mut pending_jumps, &mut p, line_no)
            }
            other => {
                p.err(line_no, format!("unknown mnemonic '{other}'"));
                None
            }
        };

        match built {
            Some(insn) => program.push(insn),
            None => {
                // Still push a placeholder so later line numbers/instruction
                // indices stay aligned for any further diagnostics.
                program.push(Instruction::default());
            }
        }
    }

    for pj in &pending_jumps {
        let jt = resolve_forward_offset(&labels, &pj.true_label, pj.insn_index, pj.line, &mut p);
        let jf = match &pj.false_label {
            Some(label) => resolve_forward_offset(&labels, label, pj.insn_index, pj.line, &mut p),
            None => Some(0),
        };
        if let (Some(jt), Some(jf)) = (jt, jf) {
            program[pj.insn_index].jt = jt;
            program[pj.insn_index].jf = jf;
        }
    }

    if p.errors.is_empty() {
        Ok(program)
    } else {
        Err(p.errors)
    }
}

fn resolve_forward_offset(
    labels: &std::collections::HashMap<String, usize>,
    label: &str,
    insn_index: usize,
    line: usize,
    p: &mut Parser,
) -> Option<u8> {
    let target = match labels.get(label) {
        Some(&t) => t,
        None => {
            p.err(line, format!("undefined label '{label}'"));
            return None;
        }
    };
    let next = insn_index + 1;
    if target < next {
        p.err(line, format!("backward jump to '{label}' is not supported"));
        return None;
    }
    let offset = target - next;
    if offset > u8::MAX as usize {
        p.err(line, format!("jump to '{label}' is too far to encode"));
        return None;
    }
    Some(offset as u8)
}

fn parse_ld(tokens: &[String], mnemonic: &str, p: &mut Parser, line: usize) -> Option<Instruction> {
    let size = match mnemonic {
        "ld" => BPF_W,
        "ldh" => BPF_H,
        "ldb" => BPF_B,
        _ => unreachable!(),
    };
    let operand = tokens.get(1)?;
    if let Some(k) = parse_imm(operand) {
        return Some(Instruction::new(BPF_LD | size | BPF_IMM, 0, 0, k as u32));
    }
    if let Some(k) = parse_mem_addr(operand) {
        return Some(Instruction::new(BPF_LD | size | BPF_MEM, 0, 0, k));
    }
    if operand == "len" {
        return Some(Instruction::new(BPF_LD | size | BPF_LEN, 0, 0, 0));
    }
    if let Some((mode, k)) = parse_bracket_addr(operand) {
        return Some(Instruction::new(BPF_LD | size | mode, 0, 0, k));
    }
    p.err(line, format!("invalid load operand '{operand}'"));
    None
}

fn parse_ldx(tokens: &[String], p: &mut Parser, line: usize) -> Option<Instruction> {
    let operand = tokens.get(1)?;
    if let Some(k) = parse_imm(operand) {
        return Some(Instruction::new(BPF_LDX | BPF_W | BPF_IMM, 0, 0, k as u32));
    }
    if let Some(k) = parse_mem_addr(operand) {
        return Some(Instruction::new(BPF_LDX | BPF_W | BPF_MEM, 0, 0, k));
    }
    if let Some(k) = parse_msh(operand) {
        return Some(Instruction::new(BPF_LDX | BPF_B | BPF_MSH, 0, 0, k));
    }
    p.err(line, format!("invalid ldx operand '{operand}'"));
    None
}

fn parse_st(tokens: &[String], mnemonic: &str, p: &mut Parser, line: usize) -> Option<Instruction> {
    let class = if mnemonic == "st" { BPF_ST } else { BPF_STX };
    let operand = tokens.get(1)?;
    match parse_mem_addr(operand) {
        Some(k) => Some(Instruction::new(class, 0, 0, k)),
        None => {
            p.err(line, format!("invalid store target '{operand}'"));
            None
        }
    }
}

fn parse_ret(tokens: &[String], p: &mut Parser, line: usize) -> Option<Instruction> {
    let operand = tokens.get(1)?;
    if operand == "a" || operand == "A" {
        return Some(Instruction::new(BPF_RET | BPF_RET_A, 0, 0, 0));
    }
    match parse_imm(operand) {
        Some(k) => Some(Instruction::new(BPF_RET | BPF_K, 0, 0, k as u32)),
        None => {
            p.err(line, format!("invalid ret operand '{operand}'"));
            None
        }
    }
}

fn parse_alu(tokens: &[String], mnemonic: &str, p: &mut Parser, line: usize) -> Option<Instruction> {
    let op = ALU_MNEMONICS.iter().find(|(n, _)| *n == mnemonic).map(|(_, op)| *op)?;
    let operand = tokens.get(1)?;
    if operand == "x" {
        return Some(Instruction::new(BPF_ALU | op | BPF_X, 0, 0, 0));
    }
    match parse_imm(operand) {
        Some(k) => Some(Instruction::new(BPF_ALU | op | BPF_K, 0, 0, k as u32)),
        None => {
            p.err(line, format!("invalid ALU operand '{operand}'"));
            None
        }
    }
}

fn parse_jmp(
    tokens: &[String],
    labels: &std::collections::HashMap<String, usize>,
    insn_index: usize,
    p: &mut Parser,
    line: usize,
) -> Option<Instruction> {
    let label = tokens.get(1)?;
    let offset = resolve_forward_offset(labels, label, insn_index, line, p)?;
    Some(Instruction::new(BPF_JMP | BPF_JA, 0, 0, offset as u32))
}

fn parse_cond_jmp(
    tokens: &[String],
    mnemonic: &str,
    insn_index: usize,
    pending: &mut Vec<PendingJump>,
    p: &mut Parser,
    line: usize,
) -> Option<Instruction> {
    let op = COND_JMP_MNEMONICS.iter().find(|(n, _)| *n == mnemonic).map(|(_, op)| *op)?;
    let k_tok = tokens.get(1)?;
    let k = parse_imm(k_tok)?;
    let true_label = tokens.get(2)?.clone();
    let false_label = tokens.get(3).cloned();
    pending.push(PendingJump { insn_index, true_label, false_label, line });
    Some(Instruction::new(BPF_JMP | op | BPF_K, 0, 0, k as u32))
}

/// C-style brace initializer of `{ code, jt, jf, k }` tuples, matching the
/// `-d` flag.
pub fn dump_c(program: &[Instruction]) -> String {
    let mut out = String::new();
    for insn in program {
        out.push_str(&format!("{{ 0x{:04x}, {}, {}, 0x{:08x} }},\n", insn.code, insn.jt, insn.jf, insn.k));
    }
    out
}

/// Flat integer list: `len` followed by one line per instruction's four
/// fields, matching the `--dd` flag.
pub fn dump_flat(program: &[Instruction]) -> String {
    let mut out = format!("{}\n", program.len());
    for insn in program {
        out.push_str(&format!("{} {} {} {}\n", insn.code, insn.jt, insn.jf, insn.k));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const S5_SOURCE: &str = "\
ldh [12]
jeq #0x0800, l1, drop
l1:
ldb [23]
jeq #6, l2, drop
l2:
ldh [20]
jset #0x1fff, drop, l3
l3:
ldxb 4*([14]&0xf)
ldh [x+16]
jeq #80, keep, drop
keep:
ret #65535
drop:
ret #0
";

    #[test]
    fn s5_assembles_to_expected_instruction_count() {
        let program = assemble(S5_SOURCE, "filter.bpf").unwrap();
        assert_eq!(program.len(), 11);
    }

    #[test]
    fn assembly_is_deterministic() {
        let a = assemble(S5_SOURCE, "filter.bpf").unwrap();
        let b = assemble(S5_SOURCE, "filter.bpf").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn undefined_label_is_reported_with_file_and_line() {
        let result = assemble("jmp nowhere\n", "bad.bpf");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("bad.bpf:1: error:"));
    }

    #[test]
    fn backward_jump_is_rejected() {
        let source = "l1:\nret #0\njmp l1\n";
        let errors = assemble(source, "bad.bpf").unwrap_err();
        assert!(errors[0].message.contains("backward"));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let source = "l1:\nl1:\nret #0\n";
        let errors = assemble(source, "bad.bpf").unwrap_err();
        assert!(errors[0].message.contains("more than once"));
    }
}
