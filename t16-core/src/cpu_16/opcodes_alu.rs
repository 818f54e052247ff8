use crate::alu;
use crate::cpu_16::Cpu16;

/// Add register to register
/// Function: R[rd] := R[rd] + R[rs]
/// Flags: Z N C V
pub fn add(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::add(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Subtract register from register
/// Function: R[rd] := R[rd] - R[rs]
/// Flags: Z N C V
pub fn sub(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::sub(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Bitwise and
/// Function: R[rd] := R[rd] & R[rs]
/// Flags: Z N (C and V cleared)
pub fn and(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::and(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Bitwise or
/// Function: R[rd] := R[rd] | R[rs]
/// Flags: Z N (C and V cleared)
pub fn or(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::or(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Bitwise exclusive or
/// Function: R[rd] := R[rd] ^ R[rs]
/// Flags: Z N (C and V cleared)
pub fn xor(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::xor(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Bitwise complement
/// Function: R[rd] := !R[rd]
/// Flags: Z N (C and V cleared)
pub fn not(cpu: &mut Cpu16, rd: usize) {
    let result = alu::not(cpu.r[rd], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Shift left
/// Function: R[rd] := R[rd] << (R[rs] & 0xF)
/// Flags: Z N C (a zero amount preserves C)
pub fn shl(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::shl(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Logical shift right
/// Function: R[rd] := R[rd] >> (R[rs] & 0xF)
/// Flags: Z N C (a zero amount preserves C)
pub fn shr(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::shr(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Compare
/// Function: flags for R[rd] - R[rs]; both registers unchanged
/// Flags: Z N C V
pub fn cmp(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::sub(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.flags.set_zn(result);
}

/// Truncating multiply
/// Function: R[rd] := (R[rd] * R[rs]) & 0xFFFF
/// Flags: Z N C (C set when the 32-bit product exceeds 16 bits)
pub fn mul(cpu: &mut Cpu16, rd: usize, rs: usize) {
    let result = alu::mul(cpu.r[rd], cpu.r[rs], &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Add immediate
/// Function: R[rd] := R[rd] + imm16
/// Flags: Z N C V
pub fn addi(cpu: &mut Cpu16, rd: usize) {
    let value = cpu.next_word();
    let result = alu::add(cpu.r[rd], value, &mut cpu.flags);
    cpu.write_reg(rd, result);
}

/// Subtract immediate
/// Function: R[rd] := R[rd] - imm16
/// Flags: Z N C V
pub fn subi(cpu: &mut Cpu16, rd: usize) {
    let value = cpu.next_word();
    let result = alu::sub(cpu.r[rd], value, &mut cpu.flags);
    cpu.write_reg(rd, result);
}
