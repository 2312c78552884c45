use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use avr_rs::disasm::render_line;
use avr_rs::{AddressPolicy, AvrDecoder, DisasmConfig, Disassembler, Emitted, Format};
use avr_disasm::{load_catalog, open_input, read_records};

#[derive(Parser, Debug)]
#[command(author, version, about = "AVR disassembler for Intel HEX and S-record files", long_about = None)]
struct Cli {
    /// Input format, `ihex` or `srec` (default: from config, then file extension)
    #[arg(short, long, value_parser = parse_format)]
    format: Option<Format>,
    /// Instruction descriptor file replacing the built-in catalog
    #[arg(long, value_name = "FILE")]
    descriptors: Option<PathBuf>,
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// How to treat record addresses that skip or overlap
    #[arg(long, value_enum)]
    address_policy: Option<AddressPolicy>,
    /// Input file path
    #[arg(value_name = "FILE")]
    input: PathBuf,
    /// Subcommand (default: dump)
    #[command(subcommand)]
    cmd: Option<Command>,
}

/// Any selector starting with `ihex` or `srec`.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Disassemble every data record
    Dump {
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List records with kind, address, length and checksum
    Records {
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Print the compiled instruction catalog
    Catalog,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Config file values, overridden by whatever was given on the command line.
fn effective_config(cli: &Cli) -> Result<DisasmConfig> {
    let mut cfg = match &cli.config {
        Some(path) => DisasmConfig::load(path)?,
        None => DisasmConfig::default(),
    };
    if cli.format.is_some() {
        cfg.format = cli.format;
    }
    if let Some(policy) = cli.address_policy {
        cfg.address_policy = policy;
    }
    if cli.descriptors.is_some() {
        cfg.descriptors = cli.descriptors.clone();
    }
    Ok(cfg)
}

fn require_format(cfg: &DisasmConfig, input: &Path) -> Result<Format> {
    cfg.resolve_format(input)
        .ok_or_else(|| anyhow!("cannot tell the format of {}; pass --format ihex|srec", input.display()))
}

fn dump(cfg: &DisasmConfig, input: &Path, output: OutputFormat, out: Option<PathBuf>) -> Result<()> {
    let format = require_format(cfg, input)?;
    let catalog = load_catalog(cfg.descriptors.as_deref())?;
    let dis = Disassembler::new(open_input(input)?, format, AvrDecoder::new(&catalog))
        .with_policy(cfg.address_policy);

    let mut sink: Box<dyn std::io::Write> = match &out {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };
    match output {
        OutputFormat::Text => {
            // Lines already written stay valid output even if a later record fails.
            for item in dis {
                writeln!(sink, "{}", render_line(&item?))?;
            }
        }
        OutputFormat::Json => {
            let items = dis.collect::<Result<Vec<Emitted>, _>>()?;
            serde_json::to_writer_pretty(&mut sink, &items)?;
            writeln!(sink)?;
        }
    }
    sink.flush()?;
    Ok(())
}

fn records(cfg: &DisasmConfig, input: &Path, output: OutputFormat, sink: &mut dyn std::io::Write) -> Result<()> {
    let format = require_format(cfg, input)?;
    let rows = read_records(open_input(input)?, format)?;
    match output {
        OutputFormat::Text => {
            writeln!(sink, "{:<6} {:<26} {:<10} {:<6} {:<8}", "line", "kind", "address", "length", "checksum")?;
            for r in rows {
                writeln!(
                    sink,
                    "{:<6} {:<26} {:#010x} {:<6} {:#04x}",
                    r.line,
                    format!("{:?}", r.kind),
                    r.address,
                    r.length,
                    r.checksum
                )?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *sink, &rows)?;
            writeln!(sink)?;
        }
    }
    Ok(())
}

fn catalog(cfg: &DisasmConfig) -> Result<()> {
    let catalog = load_catalog(cfg.descriptors.as_deref())?;
    for d in catalog.iter() {
        let masks: Vec<String> = d.operands.iter().map(|o| format!("{}={:#x}", o.name, o.field_mask)).collect();
        println!(
            "{} {:<7} {:>2} mask={:#06x} bits={:#06x} {}",
            d.pattern,
            d.mnemonic,
            d.width.bits(),
            d.fixed_mask,
            d.fixed_bits,
            masks.join(" ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = effective_config(&cli)?;
    match cli.cmd {
        None => dump(&cfg, &cli.input, OutputFormat::Text, None),
        Some(Command::Dump { output, out }) => dump(&cfg, &cli.input, output, out),
        Some(Command::Records { output }) => records(&cfg, &cli.input, output, &mut std::io::stdout().lock()),
        Some(Command::Catalog) => catalog(&cfg),
    }
}
