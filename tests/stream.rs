mod common;

use pretty_assertions::assert_eq;

use avr_rs::disasm::fmt_decoded;
use avr_rs::{
    process, AddressPolicy, AvrDecoder, Catalog, DecodeError, Disassembler, Emitted, Format, RecordError,
    StreamError,
};
use common::{ihex, le, srec};

// ldi r16 0x0F; jmp 0x0068; eor r1 r1
const PROGRAM: [u16; 4] = [0xE00F, 0x940C, 0x0034, 0x2411];

fn listing(items: &[Emitted]) -> Vec<(u32, String)> {
    items
        .iter()
        .map(|e| match e {
            Emitted::Instruction(d) => (d.addr, fmt_decoded(d)),
            Emitted::Data { addr, byte } => (*addr, format!(".byte {byte:#04x}")),
        })
        .collect()
}

fn run(text: &str, format: Format) -> Result<Vec<Emitted>, StreamError> {
    let cat = Catalog::builtin().unwrap();
    process(text.as_bytes(), format, AvrDecoder::new(&cat))
}

#[test]
fn single_record_program() {
    let text = format!("{}\n{}\n", ihex(0, 0, &le(&PROGRAM)), ihex(0, 1, &[]));
    let items = run(&text, Format::Ihex).unwrap();
    assert_eq!(
        listing(&items),
        vec![(0, "ldi r16 0x0F".to_string()), (2, "jmp 0x0068".to_string()), (6, "eor r1 r1".to_string())]
    );
}

#[test]
fn split_anywhere_decodes_identically() {
    let bytes = le(&PROGRAM);
    let whole = run(&format!("{}\n", ihex(0, 0, &bytes)), Format::Ihex).unwrap();
    for cut in 1..bytes.len() {
        let text = format!("{}\n{}\n", ihex(0, 0, &bytes[..cut]), ihex(cut as u16, 0, &bytes[cut..]));
        let split = run(&text, Format::Ihex).unwrap();
        assert_eq!(split, whole, "split after {cut} bytes");
    }
}

#[test]
fn split_across_three_records() {
    let bytes = le(&PROGRAM);
    let text = format!(
        "{}\n{}\n{}\n",
        ihex(0, 0, &bytes[..3]),
        ihex(3, 0, &bytes[3..4]),
        ihex(4, 0, &bytes[4..])
    );
    let items = run(&text, Format::Ihex).unwrap();
    assert_eq!(listing(&items)[1], (2, "jmp 0x0068".to_string()));
    assert_eq!(items.len(), 3);
}

#[test]
fn addresses_step_by_instruction_length() {
    let words = [0x0000, 0x940E, 0x0100, 0x9508, 0x9180, 0x0060, 0xCFFF];
    let text = format!("{}\n{}\n", ihex(0, 0, &le(&words[..3])), ihex(6, 0, &le(&words[3..])));
    let items = run(&text, Format::Ihex).unwrap();
    for pair in items.windows(2) {
        assert_eq!(pair[1].addr(), pair[0].addr() + pair[0].byte_len());
    }
    assert_eq!(items.iter().map(|e| e.addr()).collect::<Vec<_>>(), vec![0, 2, 6, 8, 12]);
}

#[test]
fn orphan_trailing_byte_is_raw_data() {
    let text = format!("{}\n", ihex(0, 0, &[0x0F, 0xE0, 0xAB]));
    let items = run(&text, Format::Ihex).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1], Emitted::Data { addr: 2, byte: 0xAB });
}

#[test]
fn truncated_long_instruction_at_end_is_raw_data() {
    let text = format!("{}\n", ihex(0, 0, &le(&[0x2411, 0x940C])));
    let items = run(&text, Format::Ihex).unwrap();
    assert_eq!(
        listing(&items),
        vec![(0, "eor r1 r1".to_string()), (2, ".byte 0x0c".to_string()), (3, ".byte 0x94".to_string())]
    );
}

#[test]
fn unknown_opcode_aborts_run() {
    let cat = Catalog::builtin().unwrap();
    let text = format!(
        "{}\n{}\n{}\n",
        ihex(0, 0, &le(&[0x0000])),
        ihex(2, 0, &le(&[0xFFFF, 0x0000])),
        ihex(6, 0, &le(&[0x0000]))
    );
    let mut dis = Disassembler::new(text.as_bytes(), Format::Ihex, AvrDecoder::new(&cat));
    assert_eq!(dis.next().unwrap().unwrap().addr(), 0);
    match dis.next() {
        Some(Err(StreamError::Decode { line, addr, source })) => {
            assert_eq!(line, 2);
            assert_eq!(addr, 2);
            assert_eq!(source, DecodeError::NoMatch { word: 0xFFFF });
        }
        other => panic!("expected decode error, got {other:?}"),
    }
    assert!(dis.next().is_none());
}

#[test]
fn checksum_failure_aborts_run() {
    let text = format!("{}\n:00000001FE\n{}\n", ihex(0, 0, &le(&[0x0000])), ihex(2, 0, &le(&[0x0000])));
    let cat = Catalog::builtin().unwrap();
    let items: Vec<_> = Disassembler::new(text.as_bytes(), Format::Ihex, AvrDecoder::new(&cat)).collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(
        items[1],
        Err(StreamError::Record { line: 2, source: RecordError::ChecksumMismatch { .. } })
    ));
    assert!(run(&text, Format::Ihex).is_err());
}

#[test]
fn non_data_records_do_not_break_carry() {
    let bytes = le(&PROGRAM);
    let text = format!(
        "{}\n\n{}\n{}\n{}\n",
        ihex(0, 0, &bytes[..3]),
        ihex(0, 4, &[0x00, 0x00]),
        ihex(3, 0, &bytes[3..]),
        ihex(0, 1, &[])
    );
    let items = run(&text, Format::Ihex).unwrap();
    assert_eq!(listing(&items)[1], (2, "jmp 0x0068".to_string()));
}

#[test]
fn srec_stream() {
    let bytes = le(&PROGRAM);
    let text = format!(
        "{}\n{}\n{}\n{}\n",
        srec(0, 0, b"fw"),
        srec(1, 0, &bytes[..4]),
        srec(1, 4, &bytes[4..]),
        srec(9, 0, &[])
    );
    let items = run(&text, Format::Srec).unwrap();
    assert_eq!(listing(&items).len(), 3);
    assert_eq!(listing(&items)[2], (6, "eor r1 r1".to_string()));
}

#[test]
fn declared_addresses_ignored_by_default() {
    let text = format!("{}\n{}\n", ihex(0, 0, &le(&[0x0000])), ihex(0x0100, 0, &le(&[0x0000])));
    let items = run(&text, Format::Ihex).unwrap();
    assert_eq!(items[1].addr(), 2);
}

#[test]
fn resync_policy_follows_declared_addresses() {
    let cat = Catalog::builtin().unwrap();
    let text = format!(
        "{}\n{}\n{}\n",
        ihex(0, 0, &[0x00, 0x00, 0x0C]),
        ihex(0, 4, &[0x00, 0x01]),
        ihex(0x0000, 0, &le(&[0x0000]))
    );
    let items: Vec<Emitted> = Disassembler::new(text.as_bytes(), Format::Ihex, AvrDecoder::new(&cat))
        .with_policy(AddressPolicy::Resync)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        listing(&items),
        vec![(0, "nop".to_string()), (2, ".byte 0x0c".to_string()), (0x1_0000, "nop".to_string())]
    );
}

#[test]
fn resync_near_top_of_address_space_wraps() {
    let cat = Catalog::builtin().unwrap();
    let text = format!(
        "{}\n{}\n{}\n",
        ihex(0, 4, &[0xFF, 0xFF]),
        ihex(0xFFFE, 0, &le(&[0x0000, 0x0000])),
        ihex(0, 1, &[])
    );
    let items: Vec<Emitted> = Disassembler::new(text.as_bytes(), Format::Ihex, AvrDecoder::new(&cat))
        .with_policy(AddressPolicy::Resync)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(listing(&items), vec![(0xFFFF_FFFE, "nop".to_string()), (0, "nop".to_string())]);
}

#[test]
fn warn_policy_keeps_default_output() {
    let cat = Catalog::builtin().unwrap();
    let text = format!("{}\n{}\n", ihex(0, 0, &le(&[0x0000])), ihex(0x0100, 0, &le(&[0x0000])));
    let warned: Vec<Emitted> = Disassembler::new(text.as_bytes(), Format::Ihex, AvrDecoder::new(&cat))
        .with_policy(AddressPolicy::Warn)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(warned, run(&text, Format::Ihex).unwrap());
}
