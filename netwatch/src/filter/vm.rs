//! BPF-classic interpreter. No backward jumps exist in any program this
//! assembler can produce, so termination is structural; the step counter
//! below is a defensive backstop for invariant 7 ("terminates within 4096
//! instruction steps"), not the thing actually preventing a loop.

use super::asm::MAX_INSN;
use super::inst::*;

const NUM_MEM_WORDS: usize = 16;

fn read_be(frame: &[u8], offset: usize, size: usize) -> Option<u32> {
    let bytes = frame.get(offset..offset + size)?;
    let mut value = 0u32;
    for &b in bytes {
        value = (value << 8) | b as u32;
    }
    Some(value)
}

/// Run `program` against `frame`. Returns the final accumulator: `0` means
/// drop, nonzero means accept (and, by BPF convention, the snap length --
/// the raw `k` of `ret #k`, uncapped -- the caller should keep).
pub fn run(program: &[Instruction], frame: &[u8]) -> u32 {
    let mut a: u32 = 0;
    let mut x: u32 = 0;
    let mut mem = [0u32; NUM_MEM_WORDS];
    let mut pc: usize = 0;
    let mut steps = 0usize;

    loop {
        if steps >= MAX_INSN {
            return 0;
        }
        steps += 1;
        let Some(insn) = program.get(pc) else { return 0 };
        let class = insn.code & BPF_CLASS_MASK;

        match class {
            BPF_LD | BPF_LDX => {
                let size = match insn.code & BPF_SIZE_MASK {
                    BPF_W => 4,
                    BPF_H => 2,
                    BPF_B => 1,
                    _ => return 0,
                };
                let mode = insn.code & BPF_MODE_MASK;
                let value = match mode {
                    BPF_IMM => insn.k,
                    BPF_ABS => match read_be(frame, insn.k as usize, size) {
                        Some(v) => v,
                        None => return 0,
                    },
                    BPF_IND => match read_be(frame, x as usize + insn.k as usize, size) {
                        Some(v) => v,
                        None => return 0,
                    },
                    BPF_MEM => {
                        if insn.k as usize >= NUM_MEM_WORDS {
                            return 0;
                        }
                        mem[insn.k as usize]
                    }
                    BPF_LEN => frame.len() as u32,
                    BPF_MSH => match frame.get(insn.k as usize) {
                        Some(&b) => 4 * (b as u32 & 0x0f),
                        None => return 0,
                    },
                    _ => return 0,
                };
                if class == BPF_LD {
                    a = value;
                } else {
                    x = value;
                }
                pc += 1;
            }
            BPF_ST => {
                if insn.k as usize >= NUM_MEM_WORDS {
                    return 0;
                }
                mem[insn.k as usize] = a;
                pc += 1;
            }
            BPF_STX => {
                if insn.k as usize >= NUM_MEM_WORDS {
                    return 0;
                }
                mem[insn.k as usize] = x;
                pc += 1;
            }
            BPF_ALU => {
                let operand = if insn.code & BPF_SRC_MASK == BPF_X { x } else { insn.k };
                a = match insn.code & BPF_OP_MASK {
                    BPF_ADD => a.wrapping_add(operand),
                    BPF_SUB => a.wrapping_sub(operand),
                    BPF_MUL => a.wrapping_mul(operand),
                    BPF_DIV => {
                        if operand == 0 {
                            return 0;
                        }
                        a / operand
                    }
                    BPF_OR => a | operand,
                    BPF_AND => a & operand,
                    BPF_XOR => a ^ operand,
                    BPF_LSH => a.wrapping_shl(operand),
                    BPF_RSH => a.wrapping_shr(operand),
                    _ => return 0,
                };
                pc += 1;
            }
            BPF_JMP => {
                let op = insn.code & BPF_OP_MASK;
                if op == BPF_JA {
                    pc = pc + 1 + insn.k as usize;
                    continue;
                }
                let operand = if insn.code & BPF_SRC_MASK == BPF_X { x } else { insn.k };
                let taken = match op {
                    BPF_JEQ => a == operand,
                    BPF_JGT => a > operand,
                    BPF_JGE => a >= operand,
                    BPF_JSET => a & operand != 0,
                    _ => return 0,
                };
                pc = if taken { pc + 1 + insn.jt as usize } else { pc + 1 + insn.jf as usize };
            }
            BPF_RET => {
                return if insn.code & BPF_RET_A != 0 { a } else { insn.k };
            }
            BPF_MISC => {
                match insn.code & 0xf8 {
                    BPF_TAX => x = a,
                    BPF_TXA => a = x,
                    _ => return 0,
                }
                pc += 1;
            }
            _ => return 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::asm::assemble;
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

    fn eth_ipv4_tcp(dst_port: u16) -> Vec<u8> {
        let mut f = vec![0u8; 12];
        f.extend_from_slice(&0x0800u16.to_be_bytes());
        f.push(0x45); // version/ihl
        f.push(0);
        f.extend_from_slice(&40u16.to_be_bytes());
        f.extend_from_slice(&[0, 0, 0, 0]);
        f.push(64);
        f.push(6); // tcp
        f.extend_from_slice(&[0, 0]);
        f.extend_from_slice(&[10, 0, 0, 1]);
        f.extend_from_slice(&[10, 0, 0, 2]);
        f.extend_from_slice(&0u16.to_be_bytes()); // src port
        f.extend_from_slice(&dst_port.to_be_bytes());
        f
    }

    #[test]
    fn s5_tcp_port_80_is_kept_others_dropped() {
        let program = assemble(S5_SOURCE, "filter.bpf").unwrap();
        assert_eq!(run(&program, &eth_ipv4_tcp(80)), 65535);
        assert_eq!(run(&program, &eth_ipv4_tcp(22)), 0);
    }

    #[test]
    fn non_ip_frame_is_dropped() {
        let program = assemble(S5_SOURCE, "filter.bpf").unwrap();
        let mut f = vec![0u8; 12];
        f.extend_from_slice(&0x0806u16.to_be_bytes()); // ARP, not IPv4
        assert_eq!(run(&program, &f), 0);
    }
}
