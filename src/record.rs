//! Intel HEX and Motorola S-record framing.
//!
//! One line holds one record. Parsing validates framing and checksum and
//! returns the payload bytes in file order, so each little-endian program
//! word is `payload[i]` (low) followed by `payload[i + 1]` (high).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Ihex,
    Srec,
}

impl Format {
    pub fn start_char(self) -> char {
        match self {
            Format::Ihex => ':',
            Format::Srec => 'S',
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "hex" | "ihx" | "ihex" => Some(Format::Ihex),
            "srec" | "s19" | "s28" | "s37" | "mot" => Some(Format::Srec),
            _ => None,
        }
    }
}

impl FromStr for Format {
    type Err = String;

    /// Accepts any selector starting with `ihex` or `srec`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("ihex") {
            Ok(Format::Ihex)
        } else if s.starts_with("srec") {
            Ok(Format::Srec)
        } else {
            Err(format!("unknown file format {s}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Data,
    Header,
    EndOfFile,
    ExtendedSegmentAddress,
    StartSegmentAddress,
    ExtendedLinearAddress,
    StartLinearAddress,
    Count,
    /// S-record data with a 24 or 32 bit address; never decoded.
    WideData,
    Other(u8),
}

impl RecordKind {
    pub fn is_data(self) -> bool {
        self == RecordKind::Data
    }

    fn ihex(code: u8) -> Self {
        match code {
            0x00 => RecordKind::Data,
            0x01 => RecordKind::EndOfFile,
            0x02 => RecordKind::ExtendedSegmentAddress,
            0x03 => RecordKind::StartSegmentAddress,
            0x04 => RecordKind::ExtendedLinearAddress,
            0x05 => RecordKind::StartLinearAddress,
            other => RecordKind::Other(other),
        }
    }

    fn srec(digit: u8) -> Self {
        match digit {
            0 => RecordKind::Header,
            1 => RecordKind::Data,
            2 | 3 => RecordKind::WideData,
            5 | 6 => RecordKind::Count,
            7..=9 => RecordKind::EndOfFile,
            other => RecordKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub kind: RecordKind,
    /// Declared payload length in bytes.
    pub byte_length: u8,
    pub load_address: u32,
    pub payload: Vec<u8>,
    pub checksum: u8,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected record to start with `{expected}`, found {found:?}")]
    BadStart { expected: char, found: Option<char> },
    #[error("bad S-record kind {0:?}")]
    BadKind(char),
    #[error("bad hex digit at column {column}")]
    BadHex { column: usize },
    #[error("record truncated: expected {expected} hex digits, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("record has {extra} unexpected trailing characters")]
    TrailingData { extra: usize },
    #[error("byte count {count} too small for a {kind:?} record")]
    BadLength { count: u8, kind: RecordKind },
    #[error("checksum mismatch: computed {computed:#04x}, record has {found:#04x}")]
    ChecksumMismatch { computed: u8, found: u8 },
}

fn hex_digit(c: u8, column: usize) -> Result<u8, RecordError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(RecordError::BadHex { column }),
    }
}

/// Hex body after the framing prefix, decoded pairwise.
struct Body<'a> {
    digits: &'a [u8],
    /// Column of `digits[0]` in the original line, for error reporting.
    base: usize,
}

impl<'a> Body<'a> {
    fn byte(&self, idx: usize) -> Result<u8, RecordError> {
        let at = idx * 2;
        let hi = hex_digit(self.digits[at], self.base + at)?;
        let lo = hex_digit(self.digits[at + 1], self.base + at + 1)?;
        Ok(hi << 4 | lo)
    }

    fn bytes(&self, count: usize) -> Result<Vec<u8>, RecordError> {
        (0..count).map(|i| self.byte(i)).collect()
    }

    fn expect_len(&self, bytes: usize) -> Result<(), RecordError> {
        let expected = bytes * 2;
        match self.digits.len() {
            n if n < expected => Err(RecordError::Truncated { expected, found: n }),
            n if n > expected => Err(RecordError::TrailingData { extra: n - expected }),
            _ => Ok(()),
        }
    }
}

/// Intel HEX: two's complement of the byte sum.
pub fn ihex_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)).wrapping_neg()
}

/// S-record: one's complement of the byte sum.
pub fn srec_checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn verify(computed: u8, found: u8) -> Result<(), RecordError> {
    if computed == found {
        Ok(())
    } else {
        Err(RecordError::ChecksumMismatch { computed, found })
    }
}

/// Parse one record. Trailing whitespace (including CR) is ignored.
pub fn parse_record(line: &str, format: Format) -> Result<Record, RecordError> {
    let line = line.trim_end().as_bytes();
    let expected = format.start_char();
    match line.first() {
        Some(&c) if c as char == expected => {}
        other => return Err(RecordError::BadStart { expected, found: other.map(|&c| c as char) }),
    }
    match format {
        Format::Ihex => parse_ihex(Body { digits: &line[1..], base: 1 }),
        Format::Srec => {
            let kind = *line.get(1).ok_or(RecordError::Truncated { expected: 1, found: 0 })?;
            if !kind.is_ascii_digit() {
                return Err(RecordError::BadKind(kind as char));
            }
            parse_srec(kind - b'0', Body { digits: &line[2..], base: 2 })
        }
    }
}

fn parse_ihex(body: Body<'_>) -> Result<Record, RecordError> {
    // count, address hi/lo, type
    const HEADER: usize = 4;
    if body.digits.len() < (HEADER + 1) * 2 {
        return Err(RecordError::Truncated { expected: (HEADER + 1) * 2, found: body.digits.len() });
    }
    let byte_length = body.byte(0)?;
    let total = HEADER + byte_length as usize + 1;
    body.expect_len(total)?;

    let raw = body.bytes(total)?;
    let (fields, checksum) = raw.split_at(total - 1);
    let checksum = checksum[0];
    verify(ihex_checksum(fields), checksum)?;

    Ok(Record {
        kind: RecordKind::ihex(fields[3]),
        byte_length,
        load_address: u16::from_be_bytes([fields[1], fields[2]]) as u32,
        payload: fields[HEADER..].to_vec(),
        checksum,
    })
}

fn srec_address_len(kind: u8) -> usize {
    match kind {
        2 | 6 | 8 => 3,
        3 | 7 => 4,
        _ => 2,
    }
}

fn parse_srec(digit: u8, body: Body<'_>) -> Result<Record, RecordError> {
    let kind = RecordKind::srec(digit);
    if body.digits.len() < 2 {
        return Err(RecordError::Truncated { expected: 2, found: body.digits.len() });
    }
    let count = body.byte(0)?;
    let addr_len = srec_address_len(digit);
    if (count as usize) < addr_len + 1 {
        return Err(RecordError::BadLength { count, kind });
    }
    let total = 1 + count as usize;
    body.expect_len(total)?;

    let raw = body.bytes(total)?;
    let (fields, checksum) = raw.split_at(total - 1);
    let checksum = checksum[0];
    verify(srec_checksum(fields), checksum)?;

    let load_address = fields[1..=addr_len].iter().fold(0u32, |acc, &b| acc << 8 | b as u32);
    let payload = fields[1 + addr_len..].to_vec();
    Ok(Record { kind, byte_length: payload.len() as u8, load_address, payload, checksum })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selector_prefix() {
        assert_eq!("ihex".parse::<Format>(), Ok(Format::Ihex));
        assert_eq!("srecord".parse::<Format>(), Ok(Format::Srec));
        assert!("elf".parse::<Format>().is_err());
        assert_eq!(Format::from_path(std::path::Path::new("fw.HEX")), Some(Format::Ihex));
        assert_eq!(Format::from_path(std::path::Path::new("fw.s19")), Some(Format::Srec));
        assert_eq!(Format::from_path(std::path::Path::new("fw")), None);
    }

    #[test]
    fn checksums() {
        assert_eq!(ihex_checksum(&[0x00, 0x00, 0x00, 0x01]), 0xFF);
        assert_eq!(srec_checksum(&[0x03, 0x00, 0x00]), 0xFC);
    }

    #[test]
    fn bad_hex_reports_column() {
        assert_eq!(parse_record(":0000000ZFF", Format::Ihex), Err(RecordError::BadHex { column: 8 }));
    }

    #[test]
    fn srec_bad_kind() {
        assert_eq!(parse_record("SX030000FC", Format::Srec), Err(RecordError::BadKind('X')));
    }
}
