//! The two-pass symbolic assembler.
//!
//! The source is lexed exactly once into a vector of tagged line items.
//! Pass 1 walks that vector assigning a word address to every label, and
//! pass 2 walks it again emitting the encoded words into the image. Both
//! passes size an instruction with the same function, so the layout they
//! compute cannot disagree.

use std::fmt;

use colored::*;

use crate::image::Image;
use crate::opcodes::{self, match_mnemonic, Mnemonic, OpCode};

pub type SymIndex = usize;

/// Interned label names plus the address each one resolved to. Interning
/// happens while lexing, so operands and label definitions refer to a
/// label with a plain index instead of duplicating the string. Addresses
/// are filled in by pass 1 and read-only afterwards.
pub struct SymbolTable {
    names: Vec<String>,
    addresses: Vec<Option<u16>>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            names: Vec::new(),
            addresses: Vec::new(),
        }
    }

    pub fn intern(&mut self, name: &str) -> SymIndex {
        match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_string());
                self.addresses.push(None);
                self.names.len() - 1
            }
        }
    }

    pub fn name(&self, index: SymIndex) -> &str {
        &self.names[index]
    }

    /// Record a label's address. Defining the same label twice is fatal.
    pub fn define(&mut self, index: SymIndex, address: u16) -> Result<(), String> {
        if self.addresses[index].is_some() {
            return Err(format!("duplicate label \"{}\"", self.names[index]));
        }
        self.addresses[index] = Some(address);
        Ok(())
    }

    pub fn address(&self, index: SymIndex) -> Result<u16, String> {
        self.addresses[index]
            .ok_or_else(|| format!("undefined label \"{}\"", self.names[index]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// `r0`..`r7`, or `sp` as an alias for `r7`.
    Reg(u8),
    /// A numeric or character literal.
    Imm(u16),
    /// A bare identifier, resolved through the symbol table in pass 2.
    Label(SymIndex),
    /// `[rN]` — the register-indirect memory form.
    MemReg(u8),
    /// `[literal]` — the absolute memory form.
    MemImm(u16),
    /// `[label]` — the absolute memory form, resolved in pass 2.
    MemLabel(SymIndex),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineItem {
    Label(SymIndex),
    Org(u16),
    Words(Vec<u16>),
    Asciiz(String),
    /// The mnemonic stays a string so an unknown one survives pass 1
    /// (sized as one word) and gets its canonical error in pass 2.
    Instr {
        mnemonic: String,
        operands: Vec<Operand>,
    },
}

struct Line {
    row: usize,
    item: LineItem,
}

#[derive(Debug)]
pub struct AsmError {
    pub message: String,
    /// 1-based source line.
    pub row: usize,
    nice_message: String,
}

impl AsmError {
    fn new(message: String, row: usize, text: &str) -> AsmError {
        let error_row_index = row - 1;
        let range = 3;
        let min = error_row_index.saturating_sub(range);
        let max = error_row_index + range;

        let mut nice_message = String::from("\n\n");
        for (row_index, row_text) in text.lines().enumerate() {
            if row_index > max {
                break;
            }
            if row_index < min {
                continue;
            }

            let col_string = format!("{:>4}: ", row_index + 1);
            nice_message.push_str(&format!("{}", col_string.cyan()));
            nice_message.push_str(&format!("{}", row_text.bright_white()));
            nice_message.push('\n');

            if row_index == error_row_index {
                let indent = " ".repeat(6);
                let error_message = format!("^ error on line {}", row);
                nice_message.push_str(&indent);
                nice_message.push_str(&format!("{}", error_message.bright_red()));
                nice_message.push('\n');
                nice_message.push_str(&indent);
                nice_message.push_str(&format!("{}", message.bright_red()));
                nice_message.push('\n');
            }
        }
        nice_message.push('\n');

        AsmError {
            message,
            row,
            nice_message,
        }
    }

    /// The error rendered with a few rows of source context, for humans.
    pub fn nice_message(&self) -> &str {
        &self.nice_message
    }

    pub fn panic_nicely(&self) -> ! {
        panic!("{}", self.nice_message);
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.row, self.message)
    }
}

/// Assemble a complete source file into its word image.
pub fn assemble(text: &str) -> Result<Image, AsmError> {
    let mut assembler = Assembler::new(text);
    assembler.parse()?;
    assembler.into_image()
}

pub struct Assembler<'a> {
    text: &'a str,
    lines: Vec<Line>,
    symbols: SymbolTable,
}

impl<'a> Assembler<'a> {
    pub fn new(text: &'a str) -> Assembler<'a> {
        Assembler {
            text,
            lines: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// Lex every source line into a tagged line item. Both passes walk the
    /// resulting vector; neither re-reads the raw text.
    pub fn parse(&mut self) -> Result<(), AsmError> {
        let text = self.text;
        for (index, raw) in text.lines().enumerate() {
            let row = index + 1;
            match self.parse_line(raw) {
                Ok(Some(item)) => self.lines.push(Line { row, item }),
                Ok(None) => {}
                Err(message) => return Err(AsmError::new(message, row, text)),
            }
        }
        Ok(())
    }

    /// Run both passes and hand back the image.
    pub fn into_image(mut self) -> Result<Image, AsmError> {
        run_pass1(&self.lines, &mut self.symbols, self.text)?;
        run_pass2(&self.lines, &self.symbols, self.text)
    }

    fn parse_line(&mut self, raw: &str) -> Result<Option<LineItem>, String> {
        // The .asciiz payload is lexed before the comment is stripped, so
        // a string may contain ";" or "#".
        let trimmed = raw.trim_start();
        if let Some(prefix) = trimmed.get(..7) {
            let rest = &trimmed[7..];
            if prefix.eq_ignore_ascii_case(".asciiz")
                && (rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '"'))
            {
                return parse_asciiz(rest).map(Some);
            }
        }

        let stripped = match raw.find(|c| c == ';' || c == '#') {
            Some(index) => &raw[..index],
            None => raw,
        };
        let line = stripped.trim();
        if line.is_empty() {
            return Ok(None);
        }

        if let Some(label) = line.strip_suffix(':') {
            let label = label.trim_end();
            if !is_identifier(label) {
                return Err(format!("\"{}\" is not a valid label name", label));
            }
            return Ok(Some(LineItem::Label(self.symbols.intern(label))));
        }

        if line.starts_with('.') {
            return self.parse_directive(line).map(Some);
        }

        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(index) => (&line[..index], line[index..].trim()),
            None => (line, ""),
        };
        let operands = if rest.is_empty() {
            Vec::new()
        } else {
            split_operands(rest)
                .into_iter()
                .map(|token| self.parse_operand(token.trim()))
                .collect::<Result<Vec<Operand>, String>>()?
        };
        Ok(Some(LineItem::Instr {
            mnemonic: mnemonic.to_string(),
            operands,
        }))
    }

    fn parse_directive(&mut self, line: &str) -> Result<LineItem, String> {
        let (keyword, rest) = match line.find(char::is_whitespace) {
            Some(index) => (&line[..index], line[index..].trim()),
            None => (line, ""),
        };
        match keyword.to_lowercase().as_ref() {
            ".org" => {
                if rest.is_empty() {
                    return Err("the .org directive requires an address".to_string());
                }
                Ok(LineItem::Org(parse_literal(rest)?))
            }
            ".word" => {
                if rest.is_empty() {
                    return Err("the .word directive requires at least one value".to_string());
                }
                let values = split_operands(rest)
                    .into_iter()
                    .map(|token| parse_literal(token.trim()))
                    .collect::<Result<Vec<u16>, String>>()?;
                Ok(LineItem::Words(values))
            }
            directive => Err(format!("unknown directive \"{}\"", directive)),
        }
    }

    fn parse_operand(&mut self, token: &str) -> Result<Operand, String> {
        if token.is_empty() {
            return Err("expected an operand, found nothing".to_string());
        }
        if let Some(inner) = token.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| format!("missing \"]\" in memory operand \"{}\"", token))?
                .trim();
            if let Some(register) = parse_register(inner) {
                return Ok(Operand::MemReg(register));
            }
            if is_identifier(inner) {
                return Ok(Operand::MemLabel(self.symbols.intern(inner)));
            }
            return Ok(Operand::MemImm(parse_literal(inner)?));
        }
        if let Some(register) = parse_register(token) {
            return Ok(Operand::Reg(register));
        }
        if is_identifier(token) {
            return Ok(Operand::Label(self.symbols.intern(token)));
        }
        Ok(Operand::Imm(parse_literal(token)?))
    }
}

/// Pass 1: assign an address to every label by tracking the word cursor.
fn run_pass1(lines: &[Line], symbols: &mut SymbolTable, text: &str) -> Result<(), AsmError> {
    let mut cursor: u32 = 0;
    for line in lines {
        match &line.item {
            LineItem::Label(index) => {
                if cursor > 0xFFFF {
                    return Err(AsmError::new(
                        format!(
                            "label \"{}\" lies beyond the 16-bit address space",
                            symbols.name(*index)
                        ),
                        line.row,
                        text,
                    ));
                }
                symbols
                    .define(*index, cursor as u16)
                    .map_err(|message| AsmError::new(message, line.row, text))?;
            }
            LineItem::Org(address) => cursor = *address as u32,
            item => {
                cursor += item_words(item);
                if cursor > 0x10000 {
                    return Err(AsmError::new(
                        "the image does not fit in the 16-bit address space".to_string(),
                        line.row,
                        text,
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Pass 2: re-walk the line items with a fresh cursor and emit the encoded
/// words. The image zero-fills any gap a forward `.org` leaves behind.
fn run_pass2(lines: &[Line], symbols: &SymbolTable, text: &str) -> Result<Image, AsmError> {
    let mut image = Image::new();
    let mut cursor: u32 = 0;
    for line in lines {
        match &line.item {
            LineItem::Label(index) => {
                debug_assert_eq!(
                    symbols.address(*index).ok(),
                    Some(cursor as u16),
                    "pass 1 and pass 2 disagree on the address of a label"
                );
            }
            LineItem::Org(address) => cursor = *address as u32,
            LineItem::Words(values) => {
                for value in values {
                    image.write(cursor as u16, *value);
                    cursor += 1;
                }
            }
            LineItem::Asciiz(string) => {
                for character in string.chars() {
                    image.write(cursor as u16, ((character as u32) & 0xFF) as u16);
                    cursor += 1;
                }
                image.write(cursor as u16, 0);
                cursor += 1;
            }
            LineItem::Instr { mnemonic, operands } => {
                let emitted =
                    emit_instr(symbols, &mut image, cursor as u16, mnemonic, operands)
                        .map_err(|message| AsmError::new(message, line.row, text))?;
                cursor += emitted;
            }
        }
    }
    Ok(image)
}

/// Word count of one line item. Both passes use this, which is what keeps
/// their layouts identical.
fn item_words(item: &LineItem) -> u32 {
    match item {
        LineItem::Label(_) | LineItem::Org(_) => 0,
        LineItem::Words(values) => values.len() as u32,
        LineItem::Asciiz(string) => string.chars().count() as u32 + 1,
        LineItem::Instr { mnemonic, operands } => match match_mnemonic(mnemonic) {
            // Unknown mnemonics are sized as one word so pass 2 can report
            // them with the canonical message.
            None => 1,
            Some(mnemonic) => {
                if instr_has_payload(mnemonic, operands) {
                    2
                } else {
                    1
                }
            }
        },
    }
}

/// Whether the assembled instruction carries a payload word. For LD and
/// ST this depends on the memory operand: `[rN]` selects the one-word
/// indirect opcode, anything else the two-word absolute one.
fn instr_has_payload(mnemonic: Mnemonic, operands: &[Operand]) -> bool {
    use Mnemonic::*;
    match mnemonic {
        LDI | LEA | ADDI | SUBI | JMP | JZ | JNZ | JC | JN | CALL => true,
        LD | ST => !matches!(operands.last(), Some(Operand::MemReg(_))),
        _ => false,
    }
}

fn emit_instr(
    symbols: &SymbolTable,
    image: &mut Image,
    cursor: u16,
    name: &str,
    operands: &[Operand],
) -> Result<u32, String> {
    let mnemonic = match_mnemonic(name)
        .ok_or_else(|| format!("unknown mnemonic \"{}\"", name))?;

    fn one(image: &mut Image, cursor: u16, word: u16) -> u32 {
        image.write(cursor, word);
        1
    }
    fn two(image: &mut Image, cursor: u16, word: u16, payload: u16) -> u32 {
        image.write(cursor, word);
        image.write(cursor + 1, payload);
        2
    }

    use Mnemonic::*;
    Ok(match mnemonic {
        NOP => {
            expect_operands(name, operands, 0)?;
            one(image, cursor, opcodes::encode(OpCode::NOP, 0, 0))
        }
        RET => {
            expect_operands(name, operands, 0)?;
            one(image, cursor, opcodes::encode(OpCode::RET, 0, 0))
        }
        HALT => {
            expect_operands(name, operands, 0)?;
            one(image, cursor, opcodes::encode(OpCode::HALT, 0, 0))
        }
        PUSH => {
            expect_operands(name, operands, 1)?;
            let rs = expect_register(name, &operands[0])?;
            one(image, cursor, opcodes::encode(OpCode::PUSH, 0, rs))
        }
        POP => {
            expect_operands(name, operands, 1)?;
            let rd = expect_register(name, &operands[0])?;
            one(image, cursor, opcodes::encode(OpCode::POP, rd, 0))
        }
        NOT => {
            expect_operands(name, operands, 1)?;
            let rd = expect_register(name, &operands[0])?;
            one(image, cursor, opcodes::encode(OpCode::NOT, rd, 0))
        }
        MOV | ADD | SUB | AND | OR | XOR | SHL | SHR | CMP | MUL => {
            expect_operands(name, operands, 2)?;
            let rd = expect_register(name, &operands[0])?;
            let rs = expect_register(name, &operands[1])?;
            let opcode = match mnemonic {
                MOV => OpCode::MOV,
                ADD => OpCode::ADD,
                SUB => OpCode::SUB,
                AND => OpCode::AND,
                OR => OpCode::OR,
                XOR => OpCode::XOR,
                SHL => OpCode::SHL,
                SHR => OpCode::SHR,
                CMP => OpCode::CMP,
                _ => OpCode::MUL,
            };
            one(image, cursor, opcodes::encode(opcode, rd, rs))
        }
        LDI | LEA | ADDI | SUBI => {
            expect_operands(name, operands, 2)?;
            let rd = expect_register(name, &operands[0])?;
            let payload = expect_value(symbols, name, &operands[1])?;
            let opcode = match mnemonic {
                LDI => OpCode::LDI,
                LEA => OpCode::LEA,
                ADDI => OpCode::ADDI,
                _ => OpCode::SUBI,
            };
            two(image, cursor, opcodes::encode(opcode, rd, 0), payload)
        }
        JMP | JZ | JNZ | JC | JN | CALL => {
            expect_operands(name, operands, 1)?;
            let payload = expect_value(symbols, name, &operands[0])?;
            let opcode = match mnemonic {
                JMP => OpCode::JMP,
                JZ => OpCode::JZ,
                JNZ => OpCode::JNZ,
                JC => OpCode::JC,
                JN => OpCode::JN,
                _ => OpCode::CALL,
            };
            two(image, cursor, opcodes::encode(opcode, 0, 0), payload)
        }
        LD => {
            expect_operands(name, operands, 2)?;
            let rd = expect_register(name, &operands[0])?;
            match &operands[1] {
                Operand::MemReg(rs) => one(image, cursor, opcodes::encode(OpCode::LD_IND, rd, *rs)),
                Operand::MemImm(address) => {
                    two(image, cursor, opcodes::encode(OpCode::LD_ABS, rd, 0), *address)
                }
                Operand::MemLabel(index) => {
                    two(image, cursor, opcodes::encode(OpCode::LD_ABS, rd, 0), symbols.address(*index)?)
                }
                operand => {
                    return Err(format!(
                        "{} expects a memory operand like [r1] or [label], found {:?}",
                        name, operand
                    ))
                }
            }
        }
        ST => {
            expect_operands(name, operands, 2)?;
            let rs = expect_register(name, &operands[0])?;
            match &operands[1] {
                // Indirect: the address register rides in rd.
                Operand::MemReg(rd) => one(image, cursor, opcodes::encode(OpCode::ST_IND, *rd, rs)),
                // Absolute: the source register rides in rs, rd is clear.
                Operand::MemImm(address) => {
                    two(image, cursor, opcodes::encode(OpCode::ST_ABS, 0, rs), *address)
                }
                Operand::MemLabel(index) => {
                    two(image, cursor, opcodes::encode(OpCode::ST_ABS, 0, rs), symbols.address(*index)?)
                }
                operand => {
                    return Err(format!(
                        "{} expects a memory operand like [r1] or [label], found {:?}",
                        name, operand
                    ))
                }
            }
        }
    })
}

fn expect_operands(name: &str, operands: &[Operand], count: usize) -> Result<(), String> {
    if operands.len() == count {
        Ok(())
    } else {
        Err(format!(
            "{} expects {} operand(s), found {}",
            name,
            count,
            operands.len()
        ))
    }
}

fn expect_register(name: &str, operand: &Operand) -> Result<u8, String> {
    match operand {
        Operand::Reg(register) => Ok(*register),
        operand => Err(format!(
            "{} expects a register operand, found {:?}",
            name, operand
        )),
    }
}

fn expect_value(symbols: &SymbolTable, name: &str, operand: &Operand) -> Result<u16, String> {
    match operand {
        Operand::Imm(value) => Ok(*value),
        Operand::Label(index) => symbols.address(*index),
        operand => Err(format!(
            "{} expects an immediate or label operand, found {:?}",
            name, operand
        )),
    }
}

/// Split an operand field on commas, except commas sitting inside a
/// character literal like `','`.
fn split_operands(rest: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_char = false;
    for (index, character) in rest.char_indices() {
        match character {
            '\'' => in_char = !in_char,
            ',' if !in_char => {
                fields.push(&rest[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    fields.push(&rest[start..]);
    fields
}

fn is_identifier(string: &str) -> bool {
    let mut chars = string.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `r0`..`r7` in either case, plus `sp` for `r7`. Anything else is not a
/// register and falls through to the label/literal rules.
fn parse_register(token: &str) -> Option<u8> {
    if token.eq_ignore_ascii_case("sp") {
        return Some(7);
    }
    let digits = token
        .strip_prefix('r')
        .or_else(|| token.strip_prefix('R'))?;
    if digits.len() != 1 {
        return None;
    }
    match digits.parse::<u8>() {
        Ok(register) if register < 8 => Some(register),
        _ => None,
    }
}

/// Decimal (`123`), hex (`0x2A`), or character (`'c'`) literal. Values
/// wrap silently to 16 bits.
fn parse_literal(token: &str) -> Result<u16, String> {
    if token.starts_with('\'') {
        return parse_char_literal(token);
    }
    let (digits, radix) = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(digits) => (digits, 16),
        None => (token, 10),
    };
    match u64::from_str_radix(digits, radix) {
        Ok(value) => Ok(value as u16),
        Err(_) => Err(format!("malformed numeric literal \"{}\"", token)),
    }
}

fn parse_char_literal(token: &str) -> Result<u16, String> {
    let inner = token
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| format!("malformed character literal {}", token))?;
    let mut chars = inner.chars();
    let value = match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('\'') => '\'',
            _ => return Err(format!("unknown escape in character literal {}", token)),
        },
        Some(character) => character,
        None => return Err("empty character literal".to_string()),
    };
    if chars.next().is_some() {
        return Err(format!(
            "character literal {} holds more than one character",
            token
        ));
    }
    Ok(((value as u32) & 0xFF) as u16)
}

fn parse_asciiz(rest: &str) -> Result<LineItem, String> {
    let rest = rest.trim_start();
    let body = rest
        .strip_prefix('"')
        .ok_or_else(|| "the .asciiz directive requires a quoted string".to_string())?;
    let mut string = String::new();
    let mut chars = body.chars();
    loop {
        match chars.next() {
            None => return Err("unterminated string in .asciiz".to_string()),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => string.push('\n'),
                Some('t') => string.push('\t'),
                Some('0') => string.push('\0'),
                Some('\\') => string.push('\\'),
                Some('"') => string.push('"'),
                Some(other) => return Err(format!("unknown escape \\{} in string", other)),
                None => return Err("unterminated string in .asciiz".to_string()),
            },
            Some(character) => string.push(character),
        }
    }
    // Only whitespace or a comment may follow the closing quote.
    let tail = chars.as_str().trim();
    if !(tail.is_empty() || tail.starts_with(';') || tail.starts_with('#')) {
        return Err(format!("unexpected characters after string: \"{}\"", tail));
    }
    Ok(LineItem::Asciiz(string))
}
