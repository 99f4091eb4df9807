use aegis_audit::{get_entries, privacy_score, verify_log, AuditAppender};
use aegis_config::validate as validate_config;
use aegis_gate::{gate_outbound, GateConfig, GateError, OutboundRequest};
use aegis_guard::{is_url_safe, sanitize_media_path, MediaPathOptions, PathGuardError, SsrfGuardError};
use aegis_modelaudit::audit_model;
use aegis_vault::{CredentialVault, VaultError};
use clap::{Parser, Subcommand};
use dotenvy::from_path as dotenv_from_path;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gate error: {0}")]
    Gate(#[from] GateError),
    #[error("audit error: {0}")]
    Audit(#[from] aegis_audit::AuditError),
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("config error: {0}")]
    Config(#[from] aegis_config::ConfigError),
    #[error("path guard error: {0}")]
    PathGuard(#[from] PathGuardError),
    #[error("ssrf guard error: {0}")]
    SsrfGuard(#[from] SsrfGuardError),
}

#[derive(Parser)]
#[command(name = "aegis-cli", version, about = "privacy and safety middleware control-plane utilities")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gate an outbound model request (JSON on disk): detect + redact PII,
    /// append an audit entry unless the provider is local.
    Gate {
        #[arg(long)]
        request_json: PathBuf,

        #[arg(long)]
        audit_log: Option<PathBuf>,
    },

    /// Verify a hash-chained audit log and print the final hash.
    VerifyAudit {
        #[arg(long)]
        audit_log: PathBuf,
    },

    /// Compute the privacy score (redaction coverage) for an audit log.
    PrivacyScore {
        #[arg(long)]
        audit_log: PathBuf,
    },

    /// Validate an assistant configuration document.
    ValidateConfig {
        #[arg(long)]
        config_json: PathBuf,

        /// Home directory used to resolve relative paths referenced inside
        /// the config. Defaults to the current directory.
        #[arg(long)]
        home: Option<PathBuf>,
    },

    /// Run the static advisory audit over a `provider/model` identifier.
    AuditModel {
        identifier: String,
    },

    /// Check whether a path stays within a base directory.
    CheckPath {
        #[arg(long)]
        base: PathBuf,

        raw_path: String,

        #[arg(long)]
        allow_blocked_extensions: bool,
    },

    /// Check whether a URL is safe to fetch (not a private/loopback target).
    CheckUrl {
        url: String,
    },

    /// Store a secret in the encrypted credential vault.
    VaultStore {
        #[arg(long)]
        vault_dir: PathBuf,
        key: String,
        value: String,
    },

    /// Retrieve a secret from the vault.
    VaultGet {
        #[arg(long)]
        vault_dir: PathBuf,
        key: String,
    },

    /// Delete a secret from the vault.
    VaultDelete {
        #[arg(long)]
        vault_dir: PathBuf,
        key: String,
    },

    /// List secret names stored in the vault.
    VaultList {
        #[arg(long)]
        vault_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn load_dotenv() {
    if Path::new(".env").exists() {
        let _ = dotenv_from_path(".env");
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

async fn run() -> Result<(), CliError> {
    load_dotenv();
    let args = Args::parse();

    match args.cmd {
        Command::Gate { request_json, audit_log } => {
            let bytes = fs::read(&request_json)?;
            let request: OutboundRequest = serde_json::from_slice(&bytes)?;

            let mut appender = match &audit_log {
                Some(p) => Some(AuditAppender::open(p)?),
                None => None,
            };

            let outcome = gate_outbound(
                request,
                appender.as_mut(),
                &GateConfig::default(),
                now_ms(),
                Duration::from_millis(0),
            )?;

            println!("{}", serde_json::to_string(&serde_json::json!({
                "sanitized": outcome.sanitized,
                "was_redacted": outcome.was_redacted,
                "detections": outcome.detections.len(),
                "audit_id": outcome.audit_id,
            }))?);
            Ok(())
        }

        Command::VerifyAudit { audit_log } => {
            let last = verify_log(&audit_log)?;
            println!("{last}");
            Ok(())
        }

        Command::PrivacyScore { audit_log } => {
            let entries = get_entries(&audit_log)?;
            let score = privacy_score(&entries);
            println!("{}", serde_json::to_string(&score)?);
            Ok(())
        }

        Command::ValidateConfig { config_json, home } => {
            let bytes = fs::read(&config_json)?;
            let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
            let home = home.unwrap_or_else(|| PathBuf::from("."));
            let result = validate_config(&raw, &home)?;
            println!("{}", serde_json::to_string(&serde_json::json!({
                "valid": result.valid,
                "errors": result.errors,
                "warnings": result.warnings,
            }))?);
            if !result.valid {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::AuditModel { identifier } => {
            let report = audit_model(&identifier);
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }

        Command::CheckPath { base, raw_path, allow_blocked_extensions } => {
            let opts = MediaPathOptions { allow_blocked_extensions, require_exists: false };
            let resolved = sanitize_media_path(&raw_path, &base, opts)?;
            println!("{}", resolved.display());
            Ok(())
        }

        Command::CheckUrl { url } => {
            let safe = is_url_safe(&url).await?;
            println!("{}", serde_json::json!({ "url": url, "safe": safe }));
            Ok(())
        }

        Command::VaultStore { vault_dir, key, value } => {
            CredentialVault::new(vault_dir).store(&key, &value)?;
            println!("stored");
            Ok(())
        }

        Command::VaultGet { vault_dir, key } => {
            match CredentialVault::new(vault_dir).retrieve(&key)? {
                Some(v) => println!("{v}"),
                None => {
                    eprintln!("ERROR: no such key: {key}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }

        Command::VaultDelete { vault_dir, key } => {
            CredentialVault::new(vault_dir).delete(&key)?;
            println!("deleted");
            Ok(())
        }

        Command::VaultList { vault_dir } => {
            let keys = CredentialVault::new(vault_dir).list()?;
            println!("{}", serde_json::to_string(&keys)?);
            Ok(())
        }
    }
}
