#![allow(dead_code)]

use avr_rs::record::{ihex_checksum, srec_checksum};

/// Intel HEX record line with a correct checksum.
pub fn ihex(addr: u16, ty: u8, data: &[u8]) -> String {
    let mut bytes = vec![data.len() as u8, (addr >> 8) as u8, addr as u8, ty];
    bytes.extend_from_slice(data);
    let sum = ihex_checksum(&bytes);
    let body: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!(":{body}{sum:02X}")
}

/// S1 (or other two-byte-address) record line with a correct checksum.
pub fn srec(kind: u8, addr: u16, data: &[u8]) -> String {
    let mut bytes = vec![(data.len() + 3) as u8, (addr >> 8) as u8, addr as u8];
    bytes.extend_from_slice(data);
    let sum = srec_checksum(&bytes);
    let body: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("S{kind}{body}{sum:02X}")
}

/// Program words as they sit in flash: low byte first.
pub fn le(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
