//! Record stream to instruction stream.
//!
//! Records are parsed in file order and their data payloads concatenated
//! into one byte stream. An instruction that straddles two records is held
//! in a carry buffer (at most three bytes) until the next data record
//! arrives. Output offsets advance by decoded length, not by the addresses
//! the records declare; see [`AddressPolicy`] for the alternatives. Offsets
//! wrap at the top of the 32-bit address space.

use std::collections::VecDeque;
use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AddressPolicy;
use crate::decoder::{Decoded, DecodeError, Decoder};
use crate::record::{parse_record, Format, Record, RecordError, RecordKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Emitted {
    Instruction(Decoded),
    /// Trailing byte(s) that never completed an instruction.
    Data { addr: u32, byte: u8 },
}

impl Emitted {
    pub fn addr(&self) -> u32 {
        match self {
            Emitted::Instruction(d) => d.addr,
            Emitted::Data { addr, .. } => *addr,
        }
    }

    pub fn byte_len(&self) -> u32 {
        match self {
            Emitted::Instruction(d) => d.width.bytes(),
            Emitted::Data { .. } => 1,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("reading input: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Record { line: usize, #[source] source: RecordError },
    #[error("line {line}, offset {addr:#x}: {source}")]
    Decode { line: usize, addr: u32, #[source] source: DecodeError },
}

/// Carry buffer and output offset for one input stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub carry: Vec<u8>,
    pub offset: u32,
}

/// Lazily disassembles a line-oriented record stream.
///
/// Yields instructions in address order and stops after the first error.
pub struct Disassembler<R, D> {
    lines: std::io::Lines<R>,
    format: Format,
    decoder: D,
    policy: AddressPolicy,
    state: StreamState,
    /// Upper address bits from Intel HEX extended address records.
    base: u32,
    line: usize,
    queue: VecDeque<Emitted>,
    pending: Option<StreamError>,
    done: bool,
}

impl<R: BufRead, D: Decoder> Disassembler<R, D> {
    pub fn new(input: R, format: Format, decoder: D) -> Self {
        Self {
            lines: input.lines(),
            format,
            decoder,
            policy: AddressPolicy::default(),
            state: StreamState::default(),
            base: 0,
            line: 0,
            queue: VecDeque::new(),
            pending: None,
            done: false,
        }
    }

    pub fn with_policy(mut self, policy: AddressPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Read records until something is queued, the input ends, or an error.
    fn pump(&mut self) -> Result<(), StreamError> {
        while self.queue.is_empty() {
            let Some(text) = self.lines.next().transpose()? else {
                self.finish();
                return Ok(());
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let rec = parse_record(&text, self.format)
                .map_err(|source| StreamError::Record { line: self.line, source })?;
            self.absorb(rec)?;
        }
        Ok(())
    }

    fn absorb(&mut self, rec: Record) -> Result<(), StreamError> {
        debug!(line = self.line, kind = ?rec.kind, addr = rec.load_address, len = rec.byte_length, "record");
        match rec.kind {
            RecordKind::ExtendedSegmentAddress if rec.payload.len() >= 2 => {
                self.base = (u16::from_be_bytes([rec.payload[0], rec.payload[1]]) as u32) << 4;
            }
            RecordKind::ExtendedLinearAddress if rec.payload.len() >= 2 => {
                self.base = (u16::from_be_bytes([rec.payload[0], rec.payload[1]]) as u32) << 16;
            }
            _ => {}
        }
        if !rec.kind.is_data() {
            return Ok(());
        }
        self.check_address(&rec);

        let mut bytes = std::mem::take(&mut self.state.carry);
        bytes.extend_from_slice(&rec.payload);
        let mut pos = 0;
        while bytes.len() - pos >= 2 {
            let rest = &bytes[pos..];
            let first = u16::from_le_bytes([rest[0], rest[1]]);
            let second = (rest.len() >= 4).then(|| u16::from_le_bytes([rest[2], rest[3]]));
            match self.decoder.decode(first, second) {
                Ok(mut d) => {
                    d.addr = self.state.offset;
                    self.state.offset = self.state.offset.wrapping_add(d.width.bytes());
                    pos += d.width.bytes() as usize;
                    self.queue.push_back(Emitted::Instruction(d));
                }
                Err(DecodeError::Incomplete { .. }) => break,
                Err(source) => {
                    return Err(StreamError::Decode { line: self.line, addr: self.state.offset, source })
                }
            }
        }
        self.state.carry = bytes.split_off(pos);
        Ok(())
    }

    fn check_address(&mut self, rec: &Record) {
        let declared = self.base.wrapping_add(rec.load_address);
        let expected = self.state.offset.wrapping_add(self.state.carry.len() as u32);
        if declared == expected {
            return;
        }
        match self.policy {
            AddressPolicy::Ignore => {}
            AddressPolicy::Warn => {
                warn!(line = self.line, declared, expected, "record address does not follow previous data")
            }
            AddressPolicy::Resync => {
                debug!(line = self.line, declared, expected, "resynchronising output offset");
                self.flush_carry();
                self.state.offset = declared;
            }
        }
    }

    /// Emit carried bytes as raw data; they can no longer form an instruction.
    fn flush_carry(&mut self) {
        for byte in std::mem::take(&mut self.state.carry) {
            self.queue.push_back(Emitted::Data { addr: self.state.offset, byte });
            self.state.offset = self.state.offset.wrapping_add(1);
        }
    }

    fn finish(&mut self) {
        if !self.state.carry.is_empty() {
            debug!(bytes = self.state.carry.len(), "orphan bytes at end of input");
        }
        self.flush_carry();
        self.done = true;
    }
}

impl<R: BufRead, D: Decoder> Iterator for Disassembler<R, D> {
    type Item = Result<Emitted, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.queue.pop_front() {
                return Some(Ok(e));
            }
            if let Some(err) = self.pending.take() {
                self.done = true;
                return Some(Err(err));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.pump() {
                self.pending = Some(err);
            }
        }
    }
}

/// Disassemble a whole input, stopping at the first fatal error.
pub fn process<R: BufRead, D: Decoder>(input: R, format: Format, decoder: D) -> Result<Vec<Emitted>, StreamError> {
    Disassembler::new(input, format, decoder).collect()
}
