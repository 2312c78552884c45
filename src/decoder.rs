use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::instructions::{InstrDesc, OperandDesc, OperandKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    W16 = 2,
    W32 = 4,
}

impl Width {
    pub fn bytes(self) -> u32 {
        self as u32
    }

    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(Width::W16),
            32 => Some(Width::W32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operand {
    pub kind: OperandKind,
    pub value: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    /// Byte offset from the start of the program. Filled in by the stream.
    pub addr: u32,
    pub width: Width,
    /// First word in the high half for 32-bit encodings.
    pub raw: u32,
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

impl Decoded {
    /// Raw bytes, most-significant byte of each word first.
    pub fn display_bytes(&self) -> Vec<u8> {
        match self.width {
            Width::W16 => (self.raw as u16).to_be_bytes().to_vec(),
            Width::W32 => self.raw.to_be_bytes().to_vec(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown instruction word {word:#06x}")]
    NoMatch { word: u16 },
    #[error("{mnemonic} needs {needed} bytes, second word not yet available")]
    Incomplete { mnemonic: String, needed: u32 },
}

pub trait Decoder {
    /// Decode the instruction starting with `first`. `second` is the word that
    /// follows it, when the input has one.
    fn decode(&self, first: u16, second: Option<u16>) -> Result<Decoded, DecodeError>;
}

/// Compact the opcode bits selected by `mask` into a dense low-order value,
/// preserving their relative order. Only the low `width` bits are scanned.
pub fn gather_bits(opcode: u32, mask: u32, width: Width) -> u32 {
    let bits = opcode.view_bits::<Lsb0>();
    let mut out = 0u32;
    let mut shift = 0;
    for idx in mask.view_bits::<Lsb0>().iter_ones() {
        if idx as u32 >= width.bits() {
            break;
        }
        if bits[idx] {
            out |= 1 << shift;
        }
        shift += 1;
    }
    out
}

fn sign_ext(v: u32, bits: u32) -> i32 {
    let s = 32 - bits;
    ((v << s) as i32) >> s
}

/// Per-kind numeric transform applied after the field has been gathered.
pub fn transform(kind: OperandKind, raw: u32) -> i32 {
    match kind {
        OperandKind::Address => (raw << 1) as i32,
        OperandKind::HighRegister | OperandKind::UpperRegister => raw as i32 + 16,
        OperandKind::RegisterPair => raw as i32 * 2,
        OperandKind::WordRegister => 24 + raw as i32 * 2,
        OperandKind::ShortBranch => sign_ext(raw & 0x7f, 7) << 1,
        OperandKind::LongRelative => sign_ext(raw & 0xfff, 12) << 1,
        _ => raw as i32,
    }
}

fn extract(op: &OperandDesc, opcode: u32, width: Width) -> i32 {
    let raw = match op.kind {
        // The data word of lds/sts occupies the whole second word.
        OperandKind::ImmediateWord => opcode & 0xffff,
        _ => gather_bits(opcode, op.field_mask, width),
    };
    transform(op.kind, raw)
}

/// Decode a fully assembled opcode against an already selected descriptor.
pub fn decode_with(desc: &InstrDesc, opcode: u32) -> Decoded {
    let operands = desc
        .operands
        .iter()
        .map(|op| {
            let value = extract(op, opcode, desc.width);
            Operand { kind: op.kind, value, text: crate::disasm::fmt_operand(op, value) }
        })
        .collect();
    Decoded {
        addr: 0,
        width: desc.width,
        raw: opcode,
        mnemonic: desc.mnemonic.clone(),
        operands,
    }
}
