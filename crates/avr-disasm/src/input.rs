use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use avr_rs::{parse_record, Catalog, Format, RecordKind};

pub fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Built-in catalog, or the one compiled from a descriptor file.
pub fn load_catalog(descriptors: Option<&Path>) -> Result<Catalog> {
    let Some(path) = descriptors else {
        return Ok(Catalog::builtin()?);
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Catalog::from_text(&text).with_context(|| format!("compiling {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordRow {
    pub line: usize,
    pub kind: RecordKind,
    pub address: u32,
    pub length: u8,
    pub checksum: u8,
}

/// Parse every record without decoding; stops at the first bad record.
pub fn read_records<R: BufRead>(input: R, format: Format) -> Result<Vec<RecordRow>> {
    let mut rows = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec = parse_record(&line, format).with_context(|| format!("line {}", idx + 1))?;
        rows.push(RecordRow {
            line: idx + 1,
            kind: rec.kind,
            address: rec.load_address,
            length: rec.byte_length,
            checksum: rec.checksum,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_listed_in_file_order() {
        let text = ":020000040000FA\n\n:0200000000000000FE\n:00000001FF\n";
        let rows = read_records(text.as_bytes(), Format::Ihex).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].kind, RecordKind::ExtendedLinearAddress);
        assert_eq!(rows[1].line, 3);
        assert_eq!(rows[1].length, 2);
        assert_eq!(rows[2].kind, RecordKind::EndOfFile);
    }

    #[test]
    fn descriptor_file_replaces_builtin() {
        let path = std::env::temp_dir().join("_avr_disasm_descriptors.txt");
        std::fs::write(&path, "0000000000000000 16 0 nop\n").unwrap();
        let cat = load_catalog(Some(&path)).unwrap();
        assert_eq!(cat.len(), 1);
        let _ = std::fs::remove_file(&path);
        assert!(load_catalog(None).unwrap().len() > 1);
    }
}
