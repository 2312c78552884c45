use crate::decoder::Decoded;
use crate::instructions::{OperandDesc, OperandKind};
use crate::stream::Emitted;

/// Text for one operand. Pointer and displacement operands take their
/// register name from the descriptor; everything else depends only on the
/// kind and the already transformed value.
pub fn fmt_operand(op: &OperandDesc, value: i32) -> String {
    match op.kind {
        OperandKind::Register
        | OperandKind::HighRegister
        | OperandKind::UpperRegister
        | OperandKind::RegisterPair
        | OperandKind::WordRegister => format!("r{value}"),
        OperandKind::Pointer => op.name.clone(),
        OperandKind::Displacement => disp(&op.name, value),
        OperandKind::ShortBranch | OperandKind::LongRelative => format!(".{value:+}"),
        OperandKind::ImmediateByte | OperandKind::IoPort => format!("0x{value:02X}"),
        OperandKind::ImmediateWord | OperandKind::Address => format!("0x{value:04X}"),
        OperandKind::Bit | OperandKind::SmallImmediate => format!("{value}"),
    }
}

fn disp(name: &str, q: i32) -> String {
    match name.strip_suffix('q') {
        Some(base) => format!("{base}{q}"),
        None => format!("{name}{q:+}"),
    }
}

pub fn fmt_decoded(d: &Decoded) -> String {
    let ops: Vec<&str> = d.operands.iter().map(|o| o.text.as_str()).collect();
    if ops.is_empty() {
        d.mnemonic.clone()
    } else {
        format!("{} {}", d.mnemonic, ops.join(" "))
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}

/// One listing line: offset, raw bytes, then the instruction text.
pub fn render_line(e: &Emitted) -> String {
    match e {
        Emitted::Instruction(d) => {
            format!("{:>4x}:\t{:<11}\t{}", d.addr, hex_bytes(&d.display_bytes()), fmt_decoded(d))
        }
        Emitted::Data { addr, byte } => format!("{addr:>4x}:\t{byte:02x}         \t.byte 0x{byte:02X}"),
    }
}
