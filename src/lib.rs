pub mod config;
pub mod decoder;
pub mod disasm;
pub mod instructions;
pub mod record;
pub mod stream;

pub mod isa {
    pub mod avr; // classic AVR core instruction set
}

pub use config::{AddressPolicy, DisasmConfig};
pub use decoder::{Decoded, DecodeError, Decoder, Width};
pub use instructions::{build_catalog, Catalog, CatalogError, CatalogSource};
pub use isa::avr::AvrDecoder;
pub use record::{parse_record, Format, Record, RecordError, RecordKind};
pub use stream::{process, Disassembler, Emitted, StreamError, StreamState};
