//! Main entry point for the crxparse CLI application.
//!
//! This binary reads a CRX package from the local filesystem or an HTTP URL,
//! reports what its container header says and optionally writes out the
//! embedded ZIP archive.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Parser;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use crxparse::{Cli, ContainerHeader, Crx, HttpRangeReader, LocalFileReader, read_all};

/// Application entry point.
///
/// Reads the whole package, parses it and dispatches to reporting and
/// extraction based on the CLI options.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data = if cli.is_http_url() {
        let reader = HttpRangeReader::new(cli.file.clone())
            .await?
            .with_max_retry(cli.retries);
        let data = read_all(&reader, cli.max_size).await?;

        if !cli.is_quiet() {
            eprintln!("Total bytes transferred: {}", format_size(reader.transferred_bytes()));
        }
        data
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))?;
        read_all(&reader, cli.max_size).await?
    };

    let crx = crxparse::open(&data, &cli.parse_options())
        .with_context(|| format!("{} is not a usable CRX package", cli.file))?;

    if cli.shows_info() {
        print_info(&crx, data.len(), cli.verbose);
    }

    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(crx.payload.as_bytes()).await?;
        stdout.flush().await?;
    } else if let Some(ref output) = cli.output {
        write_payload(&crx, Path::new(output), &cli).await?;
    }

    Ok(())
}

/// Print a summary of the container header.
///
/// In verbose mode the public keys and signatures are dumped as base64, the
/// same encoding a manifest's `key` field uses.
fn print_info(crx: &Crx<'_>, total_size: usize, verbose: bool) {
    let header = &crx.header;

    println!("Format:       {}", header.format_version());
    println!("Package size: {}", format_size(total_size as u64));
    if let ContainerHeader::Crx3 { header_length, .. } = header {
        println!("Header size:  {}", format_size(u64::from(*header_length)));
    }
    println!("ZIP offset:   {}", header.zip_offset());
    println!(
        "ZIP size:     {}{}",
        format_size(crx.payload.len() as u64),
        if crx.payload.looks_like_zip {
            ""
        } else {
            " (no PK signature)"
        }
    );
    match header.extension_id() {
        Some(id) => println!("Extension id: {}", id),
        None => println!("Extension id: (unsigned)"),
    }

    let proofs = header.proofs();
    println!("Signers:      {}", proofs.len());
    for (index, proof) in proofs.iter().enumerate() {
        let algorithm = proof
            .algorithm
            .map(|a| a.to_string())
            .unwrap_or_else(|| "crx2".to_string());
        println!(
            "  #{}  {:<17}  key {:>5} bytes  signature {:>5} bytes",
            index,
            algorithm,
            proof.public_key.len(),
            proof.signature.len()
        );

        if verbose {
            println!("      key: {}", BASE64.encode(proof.public_key));
            println!("      sig: {}", BASE64.encode(proof.signature));
        }
    }

    if verbose {
        if let Some(signed) = header.signed_header_data() {
            println!("Signed header data: {}", BASE64.encode(signed));
        }
    }
}

/// Write the ZIP payload to `output_path`.
///
/// An existing file is only replaced with `-o`.
async fn write_payload(crx: &Crx<'_>, output_path: &Path, cli: &Cli) -> Result<()> {
    if output_path.exists() && !cli.overwrite {
        if !cli.is_quiet() {
            eprintln!("Skipping: {} (use -o to overwrite)", output_path.display());
        }
        return Ok(());
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(output_path)
        .await
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    file.write_all(crx.payload.as_bytes()).await?;
    file.flush().await?;

    if !cli.is_quiet() {
        println!(
            "  extracting: {} ({})",
            output_path.display(),
            format_size(crx.payload.len() as u64)
        );
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
