//! Sign PDFs from a JSON payload
//!
//! Usage:
//!   pdfseal -S <payload.json> [output_dir]
//!   pdfseal -I <payload.json>
//!   pdfseal -H
//!   pdfseal -V
//!
//! Responses are JSON: success on stdout, failure on stderr with exit status 1.
//! Set RUST_LOG=debug for a trace of the signing steps.

use pdf_seal::api::{inspect_credential, SigningJob};
use pdf_seal::config::SigningContext;
use pdf_seal::payload::{CredentialPayload, Response, SignaturePayload};
use pdf_seal::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

enum Command {
    Sign { payload: PathBuf, output_dir: Option<PathBuf> },
    Inspect { payload: PathBuf },
    Help,
    Version,
}

impl Command {
    fn from_args() -> Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let Some(action) = args.first() else {
            return Ok(Command::Help);
        };

        match action.to_ascii_uppercase().as_str() {
            "-H" | "-HELP" | "--HELP" => Ok(Command::Help),
            "-V" | "-VERSION" | "--VERSION" => Ok(Command::Version),
            "-S" | "-SIGNATURE" => {
                if args.len() < 2 || args.len() > 3 {
                    return Err(Error::InvalidRequest(
                        "usage: pdfseal -S <payload.json> [output_dir]".to_string(),
                    ));
                }
                Ok(Command::Sign {
                    payload: PathBuf::from(&args[1]),
                    output_dir: args.get(2).filter(|dir| !dir.is_empty()).map(PathBuf::from),
                })
            },
            "-I" | "-INSPECT" => {
                if args.len() != 2 {
                    return Err(Error::InvalidRequest(
                        "usage: pdfseal -I <payload.json>".to_string(),
                    ));
                }
                Ok(Command::Inspect {
                    payload: PathBuf::from(&args[1]),
                })
            },
            other => Err(Error::InvalidRequest(format!("invalid action type: {}", other))),
        }
    }
}

fn print_help() {
    println!("pdfseal {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: pdfseal <ACTION> <JSON_PAYLOAD_FILE> [OUTPUT_DIR]");
    println!("ACTION:");
    println!("  -S, -SIGNATURE   Sign the PDF described by the payload");
    println!("  -I, -INSPECT     Show the certificate a signature would use");
    println!("  -H, -HELP        Show this help");
    println!("  -V, -VERSION     Show the version");
    println!("OUTPUT_DIR:");
    println!("  Where the signed file is written; defaults to the payload's directory.");
    println!("EXAMPLES:");
    println!("  pdfseal -S /path/to/sign-payload.json");
    println!("  pdfseal -S /path/to/sign-payload.json /path/to/signed");
    println!("  pdfseal -I /path/to/sign-payload.json");
}

fn payload_dir(payload: &Path) -> PathBuf {
    match payload.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sign(ctx: &SigningContext, payload: &Path, output_dir: Option<PathBuf>) -> Result<String> {
    let base_dir = payload_dir(payload);
    let request = SignaturePayload::load(payload)?.into_request(&base_dir)?;
    let output = SigningJob::new(request).run(ctx, &output_dir.unwrap_or(base_dir))?;
    Response::success(output).to_json()
}

fn inspect(ctx: &SigningContext, payload: &Path) -> Result<String> {
    let cert_info = CredentialPayload::load(payload)?.cert_info;
    let bundle = cert_info.read_bundle(&payload_dir(payload))?;
    let summary = inspect_credential(ctx, &bundle, &cert_info.password)?;
    Response::success(summary).to_json()
}

fn run() -> Result<()> {
    let ctx = SigningContext::default();
    match Command::from_args()? {
        Command::Help => print_help(),
        Command::Version => println!("pdfseal {}", env!("CARGO_PKG_VERSION")),
        Command::Sign { payload, output_dir } => println!("{}", sign(&ctx, &payload, output_dir)?),
        Command::Inspect { payload } => println!("{}", inspect(&ctx, &payload)?),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Failed: {:?}", e);
            match Response::failure(&e).to_json() {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", e),
            }
            ExitCode::FAILURE
        },
    }
}
