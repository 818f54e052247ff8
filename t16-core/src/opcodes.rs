//! The instruction-set catalog shared by the assembler and the emulator:
//! canonical opcode values, the instruction-word layout, and the mnemonic
//! table.

/// Every opcode the machine understands, with its canonical 5-bit value.
///
/// The first word of every instruction has the same shape:
///
/// ```text
///  15       11 10     8 7      5 4      0
/// +-----------+--------+--------+--------+
/// |  opcode   |   rd   |   rs   |   0    |
/// +-----------+--------+--------+--------+
/// ```
///
/// Instructions for which [`OpCode::has_payload`] is true carry an
/// immediate or absolute address in the following word.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum OpCode {
    NOP    = 0x00,
    MOV    = 0x01,
    ADD    = 0x02,
    SUB    = 0x03,
    AND    = 0x04,
    OR     = 0x05,
    XOR    = 0x06,
    NOT    = 0x07,
    SHL    = 0x08,
    SHR    = 0x09,
    CMP    = 0x0A,
    PUSH   = 0x0B,
    POP    = 0x0C,
    LD_ABS = 0x0D,
    ST_ABS = 0x0E,
    LDI    = 0x0F,
    JMP    = 0x10,
    JZ     = 0x11,
    JNZ    = 0x12,
    JC     = 0x13,
    JN     = 0x14,
    CALL   = 0x15,
    RET    = 0x16,
    HALT   = 0x17,
    LD_IND = 0x18,
    ST_IND = 0x19,
    LEA    = 0x1A,
    ADDI   = 0x1B,
    SUBI   = 0x1C,
    MUL    = 0x1D,
}

impl OpCode {
    /// Recover the opcode from the 5-bit field of an instruction word.
    /// Values outside the table are undecodable and halt the machine.
    pub fn from_bits(bits: u8) -> Option<OpCode> {
        let opcode = match bits {
            0x00 => OpCode::NOP,
            0x01 => OpCode::MOV,
            0x02 => OpCode::ADD,
            0x03 => OpCode::SUB,
            0x04 => OpCode::AND,
            0x05 => OpCode::OR,
            0x06 => OpCode::XOR,
            0x07 => OpCode::NOT,
            0x08 => OpCode::SHL,
            0x09 => OpCode::SHR,
            0x0A => OpCode::CMP,
            0x0B => OpCode::PUSH,
            0x0C => OpCode::POP,
            0x0D => OpCode::LD_ABS,
            0x0E => OpCode::ST_ABS,
            0x0F => OpCode::LDI,
            0x10 => OpCode::JMP,
            0x11 => OpCode::JZ,
            0x12 => OpCode::JNZ,
            0x13 => OpCode::JC,
            0x14 => OpCode::JN,
            0x15 => OpCode::CALL,
            0x16 => OpCode::RET,
            0x17 => OpCode::HALT,
            0x18 => OpCode::LD_IND,
            0x19 => OpCode::ST_IND,
            0x1A => OpCode::LEA,
            0x1B => OpCode::ADDI,
            0x1C => OpCode::SUBI,
            0x1D => OpCode::MUL,
            _ => return None,
        };
        Some(opcode)
    }

    /// True when the instruction carries an immediate or address in the
    /// word following the opcode word.
    pub fn has_payload(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            LD_ABS | ST_ABS | LDI | JMP | JZ | JNZ | JC | JN | CALL | LEA | ADDI | SUBI
        )
    }
}

/// Pack an instruction word from its fields. The low five bits are
/// reserved and always zero.
pub fn encode(opcode: OpCode, rd: u8, rs: u8) -> u16 {
    debug_assert!(rd < 8 && rs < 8, "register fields are three bits wide");
    ((opcode as u16) << 11) | ((rd as u16) << 8) | ((rs as u16) << 5)
}

/// Split an instruction word into its (opcode bits, rd, rs) fields.
pub fn decode(word: u16) -> (u8, u8, u8) {
    let bits = (word >> 11) as u8;
    let rd = ((word >> 8) & 0b111) as u8;
    let rs = ((word >> 5) & 0b111) as u8;
    (bits, rd, rs)
}

/// The source-level instruction names. `LD` and `ST` each cover two
/// opcodes; which one is emitted depends on the memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    NOP,
    MOV,
    ADD,
    SUB,
    AND,
    OR,
    XOR,
    NOT,
    SHL,
    SHR,
    CMP,
    PUSH,
    POP,
    LD,
    ST,
    LDI,
    LEA,
    ADDI,
    SUBI,
    MUL,
    JMP,
    JZ,
    JNZ,
    JC,
    JN,
    CALL,
    RET,
    HALT,
}

pub fn match_mnemonic(string: &str) -> Option<Mnemonic> {
    let mnemonic = match string.to_lowercase().as_ref() {
        "nop" => Mnemonic::NOP,
        "mov" => Mnemonic::MOV,
        "add" => Mnemonic::ADD,
        "sub" => Mnemonic::SUB,
        "and" => Mnemonic::AND,
        "or" => Mnemonic::OR,
        "xor" => Mnemonic::XOR,
        "not" => Mnemonic::NOT,
        "shl" => Mnemonic::SHL,
        "shr" => Mnemonic::SHR,
        "cmp" => Mnemonic::CMP,
        "push" => Mnemonic::PUSH,
        "pop" => Mnemonic::POP,
        "ld" => Mnemonic::LD,
        "st" => Mnemonic::ST,
        "ldi" => Mnemonic::LDI,
        "lea" => Mnemonic::LEA,
        "addi" => Mnemonic::ADDI,
        "subi" => Mnemonic::SUBI,
        "mul" => Mnemonic::MUL,
        "jmp" => Mnemonic::JMP,
        "jz" => Mnemonic::JZ,
        "jnz" => Mnemonic::JNZ,
        "jc" => Mnemonic::JC,
        "jn" => Mnemonic::JN,
        "call" => Mnemonic::CALL,
        "ret" => Mnemonic::RET,
        "halt" => Mnemonic::HALT,
        _ => return None,
    };
    Some(mnemonic)
}

/// Render one instruction for trace output. `payload` is the word that
/// follows the instruction word; it is ignored for one-word forms.
pub fn disassemble(word: u16, payload: u16) -> String {
    let (bits, rd, rs) = decode(word);
    let opcode = match OpCode::from_bits(bits) {
        Some(opcode) => opcode,
        None => return format!(".word {:#06x}", word),
    };
    use OpCode::*;
    match opcode {
        NOP => "NOP".to_string(),
        RET => "RET".to_string(),
        HALT => "HALT".to_string(),
        MOV => format!("MOV r{}, r{}", rd, rs),
        ADD => format!("ADD r{}, r{}", rd, rs),
        SUB => format!("SUB r{}, r{}", rd, rs),
        AND => format!("AND r{}, r{}", rd, rs),
        OR => format!("OR r{}, r{}", rd, rs),
        XOR => format!("XOR r{}, r{}", rd, rs),
        SHL => format!("SHL r{}, r{}", rd, rs),
        SHR => format!("SHR r{}, r{}", rd, rs),
        CMP => format!("CMP r{}, r{}", rd, rs),
        MUL => format!("MUL r{}, r{}", rd, rs),
        NOT => format!("NOT r{}", rd),
        PUSH => format!("PUSH r{}", rs),
        POP => format!("POP r{}", rd),
        LD_ABS => format!("LD r{}, [{:#06x}]", rd, payload),
        ST_ABS => format!("ST r{}, [{:#06x}]", rs, payload),
        LD_IND => format!("LD r{}, [r{}]", rd, rs),
        ST_IND => format!("ST r{}, [r{}]", rs, rd),
        LDI => format!("LDI r{}, {:#06x}", rd, payload),
        LEA => format!("LEA r{}, {:#06x}", rd, payload),
        ADDI => format!("ADDI r{}, {:#06x}", rd, payload),
        SUBI => format!("SUBI r{}, {:#06x}", rd, payload),
        JMP => format!("JMP {:#06x}", payload),
        JZ => format!("JZ {:#06x}", payload),
        JNZ => format!("JNZ {:#06x}", payload),
        JC => format!("JC {:#06x}", payload),
        JN => format!("JN {:#06x}", payload),
        CALL => format!("CALL {:#06x}", payload),
    }
}
