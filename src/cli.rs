use clap::Parser;

use crate::crx::{ParseOptions, ZipCheck};
use crate::io::DEFAULT_MAX_RETRY;

/// Default cap on the package size read into memory (256 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "crxparse")]
#[command(version)]
#[command(about = "Inspect Chrome extension (CRX2/CRX3) packages and extract their ZIP payload", long_about = None)]
#[command(after_help = "Examples:\n  \
  crxparse ext.crx                   show version, offsets and signers\n  \
  crxparse -v ext.crx                also dump keys and signatures (base64)\n  \
  crxparse -d ext.zip ext.crx        write the embedded ZIP to ext.zip\n  \
  crxparse -p https://example.com/ext.crx | unzip -l /dev/stdin")]
pub struct Cli {
    /// CRX file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Show header information (default when not extracting)
    #[arg(short = 'l')]
    pub list: bool,

    /// Also print public keys and signatures
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write the ZIP payload to stdout, no messages
    #[arg(short = 'p', conflicts_with = "output")]
    pub pipe: bool,

    /// Write the ZIP payload to this file
    #[arg(short = 'd', value_name = "ZIP")]
    pub output: Option<String>,

    /// Overwrite the output file WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Accept a payload that does not start with a ZIP signature
    #[arg(long)]
    pub lenient: bool,

    /// Accept CRX2 files with an empty public key or signature
    #[arg(long)]
    pub allow_empty_proof: bool,

    /// Refuse packages larger than this many bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_SIZE)]
    pub max_size: u64,

    /// Retries for a timed-out or refused HTTP range request
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RETRY)]
    pub retries: u32,

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    /// Header details are shown unless the payload is the only output
    pub fn shows_info(&self) -> bool {
        !self.is_quiet() && (self.list || self.verbose || self.output.is_none())
    }

    pub fn parse_options(&self) -> ParseOptions {
        let zip_check = if self.lenient {
            ZipCheck::Lenient
        } else {
            ZipCheck::Strict
        };

        ParseOptions::default()
            .require_crx2_proof(!self.allow_empty_proof)
            .zip_check(zip_check)
    }
}
