use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use avr_rs::disasm::fmt_decoded;
use avr_rs::{AvrDecoder, Catalog, Decoder};

#[derive(Parser, Debug)]
#[command(author, version, about = "Decode raw AVR opcode words against the instruction catalog")]
struct Opts {
    /// Descriptor file to use instead of the built-in catalog
    #[arg(short, long, value_name = "FILE")]
    descriptors: Option<PathBuf>,
    /// Opcode words in hex, as read from program memory (e.g. e00f 940c 0034)
    #[arg(value_name = "WORD", required = true)]
    words: Vec<String>,
}

fn parse_word(s: &str) -> Result<u16> {
    let s = s.trim();
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u16::from_str_radix(hex, 16).with_context(|| format!("bad opcode word `{s}`"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let catalog = match &opts.descriptors {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Catalog::from_text(&text)?
        }
        None => Catalog::builtin()?,
    };
    let dec = AvrDecoder::new(&catalog);

    let words = opts.words.iter().map(|w| parse_word(w)).collect::<Result<Vec<_>>>()?;
    let mut i = 0;
    let mut pc = 0u32;
    while i < words.len() {
        let d = dec.decode(words[i], words.get(i + 1).copied())?;
        println!("{pc:>4x}:\t{}", fmt_decoded(&d));
        let n = d.width.bytes();
        pc += n;
        i += n as usize / 2;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_flag_is_a_path() {
        let opts = Opts::parse_from(["avr-decode", "-d", "avr.desc", "0000"]);
        assert_eq!(opts.descriptors, Some(PathBuf::from("avr.desc")));
        assert_eq!(opts.words, vec!["0000".to_string()]);
    }

    #[test]
    fn parse_word_hex_forms() {
        assert_eq!(parse_word("e00f").unwrap(), 0xE00F);
        assert_eq!(parse_word("0x940C").unwrap(), 0x940C);
        assert!(parse_word("zz").is_err());
        assert!(parse_word("12345").is_err());
    }
}
