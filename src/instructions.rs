//! Instruction catalog: descriptors built from 16-character bit patterns.
//!
//! A descriptor line reads
//!
//! ```text
//! 1110KKKKddddKKKK 16 2 ldi Rd,K hb
//! ```
//!
//! i.e. pattern, word length in bits, operand count, mnemonic, comma separated
//! operand names and one type tag per operand. Lines with no operands stop
//! after the mnemonic. Entries are matched in table order and the first match
//! wins, so specific encodings must precede the general ones they overlap.

use serde::{Deserialize, Serialize};

use crate::decoder::Width;

pub const PATTERN_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    /// r0..r31
    Register,
    /// ldi-style r16..r31
    HighRegister,
    /// r16..r23, 3-bit field
    UpperRegister,
    /// movw even register pair
    RegisterPair,
    /// adiw/sbiw pair r24..r30
    WordRegister,
    Pointer,
    Displacement,
    ImmediateByte,
    ImmediateWord,
    Address,
    ShortBranch,
    LongRelative,
    Bit,
    SmallImmediate,
    IoPort,
}

impl OperandKind {
    pub fn from_tag(tag: char) -> Option<Self> {
        Some(match tag {
            'r' => OperandKind::Register,
            'h' => OperandKind::HighRegister,
            'u' => OperandKind::UpperRegister,
            'p' => OperandKind::RegisterPair,
            'w' => OperandKind::WordRegister,
            'x' => OperandKind::Pointer,
            'q' => OperandKind::Displacement,
            'b' => OperandKind::ImmediateByte,
            'k' => OperandKind::ImmediateWord,
            'a' => OperandKind::Address,
            's' => OperandKind::ShortBranch,
            'j' => OperandKind::LongRelative,
            'i' => OperandKind::Bit,
            'n' => OperandKind::SmallImmediate,
            'o' => OperandKind::IoPort,
            _ => return None,
        })
    }

    pub fn tag(self) -> char {
        match self {
            OperandKind::Register => 'r',
            OperandKind::HighRegister => 'h',
            OperandKind::UpperRegister => 'u',
            OperandKind::RegisterPair => 'p',
            OperandKind::WordRegister => 'w',
            OperandKind::Pointer => 'x',
            OperandKind::Displacement => 'q',
            OperandKind::ImmediateByte => 'b',
            OperandKind::ImmediateWord => 'k',
            OperandKind::Address => 'a',
            OperandKind::ShortBranch => 's',
            OperandKind::LongRelative => 'j',
            OperandKind::Bit => 'i',
            OperandKind::SmallImmediate => 'n',
            OperandKind::IoPort => 'o',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperandDesc {
    /// Name token from the descriptor, e.g. `Rd`, `K`, `Y+q`, `-X`.
    pub name: String,
    pub kind: OperandKind,
    /// Bits carrying the raw value. For 32-bit encodings the first word sits
    /// in bits 16..31 and the second word in bits 0..15.
    pub field_mask: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrDesc {
    pub mnemonic: String,
    pub pattern: String,
    pub width: Width,
    pub fixed_mask: u16,
    pub fixed_bits: u16,
    pub operands: Vec<OperandDesc>,
}

impl InstrDesc {
    pub fn matches(&self, word: u16) -> bool {
        word & self.fixed_mask == self.fixed_bits
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("line {line}: expected 4 or 6 fields, found {found}")]
    TokenCount { line: usize, found: usize },
    #[error("line {line}: bad bit pattern `{pattern}`")]
    BadPattern { line: usize, pattern: String },
    #[error("line {line}: bad word length or operand count `{value}`")]
    BadLength { line: usize, value: String },
    #[error("line {line}: operand count {declared} disagrees with {found} {what}")]
    OperandCount { line: usize, declared: usize, found: usize, what: &'static str },
    #[error("line {line}: unknown operand type tag `{tag}`")]
    UnknownType { line: usize, tag: char },
    #[error("line {line}: operand `{name}` has no bits in `{pattern}`")]
    EmptyField { line: usize, name: String, pattern: String },
    #[error("catalog has no descriptors")]
    Empty,
}

const POINTER_REGS: &[&str] = &["X", "Y", "Z", "-X", "-Y", "-Z", "X+", "Y+", "Z+"];

fn is_pointer(name: &str) -> bool {
    POINTER_REGS.contains(&name)
}

fn is_displacement(name: &str) -> bool {
    matches!(name, "X+q" | "Y+q" | "Z+q")
}

fn is_gpr(name: &str) -> bool {
    matches!(name, "Rd" | "Rr")
}

/// Pattern letter an operand name refers to, or `None` for pointer names.
fn field_letter(name: &str) -> Option<char> {
    if is_pointer(name) {
        None
    } else if is_displacement(name) || is_gpr(name) {
        name.chars().last()
    } else {
        name.chars().next()
    }
}

/// Fixed mask and fixed bits of a pattern; bit 15 is the leftmost character.
pub fn fixed_bits(pattern: &str) -> (u16, u16) {
    let mut mask = 0u16;
    let mut bits = 0u16;
    for (i, c) in pattern.chars().take(PATTERN_LEN).enumerate() {
        let bit = 1 << (PATTERN_LEN - 1 - i);
        match c {
            '0' => mask |= bit,
            '1' => {
                mask |= bit;
                bits |= bit;
            }
            _ => {}
        }
    }
    (mask, bits)
}

fn letter_mask(pattern: &str, hit: impl Fn(char) -> bool) -> u16 {
    pattern
        .chars()
        .take(PATTERN_LEN)
        .enumerate()
        .filter(|&(_, c)| hit(c))
        .fold(0, |m, (i, _)| m | 1 << (PATTERN_LEN - 1 - i))
}

/// Field masks for each operand name.
///
/// A lone `Rd`/`Rr` (an instruction without two register operands) collects
/// both the `d` and `r` letters, so single register forms encoded with either
/// letter land on the same field.
pub fn operand_masks(pattern: &str, names: &[&str], width: Width) -> Vec<u32> {
    let two_regs = names.len() == 2 && names.iter().all(|n| is_gpr(n));
    names
        .iter()
        .map(|&name| {
            let Some(letter) = field_letter(name) else { return 0 };
            let collapse = is_gpr(name) && !two_regs;
            let first = letter_mask(pattern, |c| c == letter || (collapse && (c == 'd' || c == 'r')));
            match width {
                Width::W16 => first as u32,
                Width::W32 if letter == 'k' => (first as u32) << 16 | 0xffff,
                Width::W32 => (first as u32) << 16,
            }
        })
        .collect()
}

/// Parse one descriptor line. `line` is the 1-based position for errors.
pub fn parse_descriptor(text: &str, line: usize) -> Result<InstrDesc, CatalogError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 4 && fields.len() != 6 {
        return Err(CatalogError::TokenCount { line, found: fields.len() });
    }

    let pattern = fields[0];
    if pattern.chars().count() != PATTERN_LEN || !pattern.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CatalogError::BadPattern { line, pattern: pattern.to_string() });
    }
    let width = fields[1]
        .parse::<u32>()
        .ok()
        .and_then(Width::from_bits)
        .ok_or_else(|| CatalogError::BadLength { line, value: fields[1].to_string() })?;
    let argc = fields[2]
        .parse::<usize>()
        .ok()
        .filter(|&n| n <= 2)
        .ok_or_else(|| CatalogError::BadLength { line, value: fields[2].to_string() })?;
    let mnemonic = fields[3].to_string();

    let (names, tags): (Vec<&str>, Vec<char>) = match fields.get(4..6) {
        Some(&[names, tags]) => (names.split(',').collect(), tags.chars().collect()),
        _ => (Vec::new(), Vec::new()),
    };
    if names.len() != argc {
        return Err(CatalogError::OperandCount { line, declared: argc, found: names.len(), what: "operand names" });
    }
    if tags.len() != argc {
        return Err(CatalogError::OperandCount { line, declared: argc, found: tags.len(), what: "type tags" });
    }

    let (fixed_mask, fixed_bits) = fixed_bits(pattern);
    let masks = operand_masks(pattern, &names, width);
    let mut operands = Vec::with_capacity(argc);
    for ((name, tag), field_mask) in names.iter().zip(&tags).zip(masks) {
        let kind = OperandKind::from_tag(*tag).ok_or(CatalogError::UnknownType { line, tag: *tag })?;
        if field_mask == 0 && kind != OperandKind::Pointer {
            return Err(CatalogError::EmptyField { line, name: name.to_string(), pattern: pattern.to_string() });
        }
        operands.push(OperandDesc { name: name.to_string(), kind, field_mask });
    }

    Ok(InstrDesc { mnemonic, pattern: pattern.to_string(), width, fixed_mask, fixed_bits, operands })
}

/// Where a catalog comes from.
#[derive(Debug, Clone, Copy)]
pub enum CatalogSource<'a> {
    Builtin,
    Text(&'a str),
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    entries: Vec<InstrDesc>,
}

impl Catalog {
    /// Compile descriptor text. Any malformed line fails the whole catalog.
    pub fn from_text(text: &str) -> Result<Self, CatalogError> {
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let body = raw.split('#').next().unwrap_or("").trim();
            if body.is_empty() {
                continue;
            }
            entries.push(parse_descriptor(body, idx + 1)?);
        }
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        tracing::debug!(entries = entries.len(), "catalog compiled");
        Ok(Self { entries })
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_text(crate::isa::avr::DESCRIPTORS)
    }

    /// First descriptor, in table order, whose fixed bits match `word`.
    pub fn lookup(&self, word: u16) -> Option<&InstrDesc> {
        self.entries.iter().find(|d| d.matches(word))
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrDesc> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn build_catalog(source: CatalogSource<'_>) -> Result<Catalog, CatalogError> {
    match source {
        CatalogSource::Builtin => Catalog::builtin(),
        CatalogSource::Text(text) => Catalog::from_text(text),
    }
}
