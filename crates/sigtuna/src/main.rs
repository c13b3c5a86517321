#![forbid(unsafe_code)]

//! Sigtuna CLI — sign, timestamp, inspect, and unsign VSIX packages.

use clap::{Parser, Subcommand};
use sigtuna_core::Error;
use sigtuna_crypto::HashAlgorithm;
use sigtuna_dsig::{sign_package, signatures, TimestampOutcome};
use sigtuna_keys::SigningIdentity;
use sigtuna_opc::{FileMode, Package};
use sigtuna_tsp::ReqwestTransport;
use std::path::PathBuf;
use std::process;

/// Exit code for bad input: arguments, package state, malformed packages.
const EXIT_VALIDATION: i32 = 1;
/// Exit code for cryptographic, I/O, and timestamp failures.
const EXIT_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "sigtuna",
    about = "Sigtuna — sign, timestamp, and unsign VSIX/OPC packages",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a package, replacing any existing signature
    Sign {
        /// The VSIX package to sign
        vsix: PathBuf,

        /// PKCS#12 (.pfx) file, or a PEM certificate chain when --key is given
        #[arg(short = 'c', long)]
        certificate: PathBuf,

        /// Password for the PKCS#12 file
        #[arg(short = 'p', long, default_value = "")]
        password: String,

        /// PEM private key (switches --certificate to PEM mode)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Digest for package parts and SignedInfo (sha1|sha256|sha384|sha512)
        #[arg(long = "file-digest", default_value = "sha256")]
        file_digest: String,

        /// RFC 3161 TSA URL; the signature is countersigned when given
        #[arg(short = 't', long)]
        timestamp: Option<String>,

        /// Digest for the timestamp request
        #[arg(long = "timestamp-digest", default_value = "sha256")]
        timestamp_digest: String,

        /// Replace an existing signature instead of failing
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Remove all signatures from a package
    Unsign {
        /// The VSIX package to strip
        vsix: PathBuf,
    },

    /// Show the signatures a package carries
    List {
        /// The VSIX package to inspect
        vsix: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sign {
            vsix,
            certificate,
            password,
            key,
            file_digest,
            timestamp,
            timestamp_digest,
            force,
        } => cmd_sign(
            vsix,
            certificate,
            password,
            key,
            file_digest,
            timestamp,
            timestamp_digest,
            force,
        ),
        Commands::Unsign { vsix } => cmd_unsign(vsix),
        Commands::List { vsix } => cmd_list(vsix),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(exit_code(&e));
    }
}

fn exit_code(error: &Error) -> i32 {
    match error {
        Error::ReadOnly
        | Error::MalformedPackage(_)
        | Error::UnknownContentType(_)
        | Error::InvalidOperation(_)
        | Error::UnsupportedAlgorithm(_)
        | Error::XmlParse(_)
        | Error::MissingElement(_)
        | Error::MissingAttribute(_)
        | Error::Base64(_) => EXIT_VALIDATION,
        _ => EXIT_FAILURE,
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_sign(
    vsix: PathBuf,
    certificate: PathBuf,
    password: String,
    key: Option<PathBuf>,
    file_digest: String,
    timestamp: Option<String>,
    timestamp_digest: String,
    force: bool,
) -> Result<(), Error> {
    let hash = HashAlgorithm::from_name(&file_digest)?;
    let ts_hash = HashAlgorithm::from_name(&timestamp_digest)?;

    let cert_data = std::fs::read(&certificate)
        .map_err(|e| Error::Key(format!("{}: {e}", certificate.display())))?;
    let identity = match key {
        Some(key_path) => {
            let key_data = std::fs::read(&key_path)
                .map_err(|e| Error::Key(format!("{}: {e}", key_path.display())))?;
            SigningIdentity::from_pem(&cert_data, &key_data)?
        }
        None => SigningIdentity::from_pfx(&cert_data, &password)?,
    };

    let mut package = Package::open(&vsix, FileMode::ReadWrite)?;
    if !force && !signatures(&package)?.is_empty() {
        return Err(Error::InvalidOperation(
            "package is already signed (pass --force to replace the signature)".into(),
        ));
    }

    let mut signature = sign_package(&mut package, &identity, hash)?;

    if let Some(url) = timestamp {
        let transport = ReqwestTransport::new()?;
        match signature.timestamp(&mut package, &transport, &url, ts_hash)? {
            TimestampOutcome::Success => {
                log::info!("countersigned by {url}");
            }
            TimestampOutcome::Failed(reason) => {
                return Err(Error::Timestamp(format!(
                    "{reason} (package left unchanged)"
                )));
            }
        }
    }

    package.flush()?;
    println!(
        "Signed {} ({})",
        vsix.display(),
        signature.signature_method()?
    );
    Ok(())
}

fn cmd_unsign(vsix: PathBuf) -> Result<(), Error> {
    let mut package = Package::open(&vsix, FileMode::ReadWrite)?;
    let mut sigs = signatures(&package)?;
    if sigs.is_empty() {
        println!("{} carries no signatures", vsix.display());
        return Ok(());
    }
    let count = sigs.len();
    for signature in &mut sigs {
        signature.remove(&mut package)?;
    }
    package.flush()?;
    println!("Removed {count} signature(s) from {}", vsix.display());
    Ok(())
}

fn cmd_list(vsix: PathBuf) -> Result<(), Error> {
    let package = Package::open(&vsix, FileMode::ReadOnly)?;
    let sigs = signatures(&package)?;
    if sigs.is_empty() {
        println!("{} carries no signatures", vsix.display());
        return Ok(());
    }

    for signature in &sigs {
        println!(
            "{}",
            signature.part_uri().unwrap_or("<removed>")
        );
        println!("  signature method: {}", signature.signature_method()?);
        println!("  digest method:    {}", signature.digest_method()?);
        if let Some(time) = signature.signing_time()? {
            println!("  signing time:     {time}");
        }
        match signature.encapsulated_timestamp()? {
            Some(token) => {
                let tst = sigtuna_tsp::response::parse_token(&token)?;
                println!(
                    "  timestamp:        {}",
                    tst.gen_time.as_deref().unwrap_or("present")
                );
            }
            None => println!("  timestamp:        none"),
        }
    }
    Ok(())
}
