//! Filesystem path containment and media-path sanitization.
//!
//! Every check below runs in order, first failure wins; none of them
//! `panic!`s on attacker-controlled input — malformed paths are data, not
//! bugs.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathGuardError {
    #[error("path is empty")]
    Empty,
    #[error("path contains a suspicious sequence")]
    SuspiciousSequence,
    #[error("path escapes its base directory")]
    Escapes,
    #[error("path extension is blocked: {0}")]
    BlockedExtension(String),
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const SUSPICIOUS: &[&str] = &["\0", "%00", "%2e%2e", "%2f", "%5c", "\r", "\n"];

const BLOCKED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "msi", "scr", "pif", "sh", "bash", "zsh", "fish", "ps1", "psm1",
    "psd1", "vbs", "vbe", "js", "jse", "wsf", "wsh", "reg", "inf", "lnk",
];

fn has_suspicious_sequence(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    SUSPICIOUS.iter().any(|s| lower.contains(s))
}

fn has_dotdot_segment(raw: &str) -> bool {
    raw.split(['/', '\\']).any(|seg| seg == "..")
}

/// Strip known traversal/encoding tricks and normalize separators. This does
/// NOT guarantee containment by itself — callers still need
/// `is_within_base`/`validate_path` against a concrete base directory.
pub fn sanitize_path(raw: &str) -> String {
    let mut s = raw.to_string();
    for bad in SUSPICIOUS {
        s = s.replace(bad, "");
    }
    let cleaned: Vec<&str> =
        s.split(['/', '\\']).filter(|seg| !seg.is_empty() && *seg != "..").collect();
    cleaned.join("/")
}

/// True iff `path`, once lexically resolved against `base`, is still a
/// descendant of `base`. Both paths are compared in their canonical form
/// when they exist on disk, falling back to lexical resolution otherwise so
/// non-existent destination paths (about to be created) can still be
/// checked.
pub fn is_within_base(path: &Path, base: &Path) -> bool {
    let resolved_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let candidate = if path.is_absolute() { path.to_path_buf() } else { base.join(path) };
    let resolved_candidate = candidate.canonicalize().unwrap_or_else(|_| lexical_normalize(&candidate));
    resolved_candidate.starts_with(&resolved_base)
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn extension_blocked(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).and_then(|ext| {
        let lower = ext.to_lowercase();
        if BLOCKED_EXTENSIONS.contains(&lower.as_str()) {
            Some(lower)
        } else {
            None
        }
    })
}

/// Options for `sanitize_media_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaPathOptions {
    pub allow_blocked_extensions: bool,
    pub require_exists: bool,
}

/// Cheap boolean check used by callers that only need a yes/no answer.
pub fn validate_path(raw: &str, base: &Path) -> bool {
    sanitize_media_path(raw, base, MediaPathOptions::default()).is_ok()
}

/// Resolve `raw` against `base`, enforcing every rule in order, and return
/// the resulting absolute path on success.
pub fn sanitize_media_path(
    raw: &str,
    base: &Path,
    opts: MediaPathOptions,
) -> Result<PathBuf, PathGuardError> {
    if raw.trim().is_empty() {
        return Err(PathGuardError::Empty);
    }
    if has_suspicious_sequence(raw) {
        tracing::warn!(raw, "path guard: rejected suspicious sequence");
        return Err(PathGuardError::SuspiciousSequence);
    }
    if has_dotdot_segment(raw) {
        tracing::warn!(raw, "path guard: rejected dotdot segment");
        return Err(PathGuardError::Escapes);
    }

    let candidate = base.join(raw);
    if !is_within_base(&candidate, base) {
        tracing::warn!(raw, base = %base.display(), "path guard: candidate escapes base directory");
        return Err(PathGuardError::Escapes);
    }

    if !opts.allow_blocked_extensions {
        if let Some(ext) = extension_blocked(&candidate) {
            tracing::warn!(raw, ext, "path guard: rejected blocked extension");
            return Err(PathGuardError::BlockedExtension(ext));
        }
    }

    if opts.require_exists && !candidate.exists() {
        return Err(PathGuardError::NotFound(candidate));
    }

    let resolved_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    tracing::debug!(raw, base = %base.display(), "path guard: allowed");
    Ok(resolved_base.join(sanitize_path(raw)))
}
