//! aegis_vault
//!
//! Encrypted-at-rest credential store. Two files live side by side:
//! - `key.age`: 32 random bytes, mode 0600, generated on first use.
//! - `vault.enc`: 12-byte IV || AES-256-GCM ciphertext (16-byte tag appended
//!   by the AEAD) of a JSON object mapping secret name to value. The IV is
//!   12 bytes because `Aes256Gcm`'s nonce size is fixed to 12 bytes by the
//!   crate; a 16-byte IV would panic on `Nonce::from_slice`.
//!
//! Every mutation is a full read-decrypt-modify-encrypt-write cycle; the
//! write lands via a temp file + rename so a crash mid-write can never
//! leave `vault.enc` half-written.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroizing;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("vault is corrupted and cannot be decrypted")]
    Corrupted,
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("not a vault reference: {0}")]
    NotAReference(String),
}

/// A reference string of the form `$vault:<name>`.
pub fn is_vault_ref(s: &str) -> bool {
    s.starts_with("$vault:") && s.len() > "$vault:".len()
}

fn vault_ref_name(s: &str) -> Option<&str> {
    s.strip_prefix("$vault:").filter(|rest| !rest.is_empty())
}

pub struct CredentialVault {
    dir: PathBuf,
}

impl CredentialVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join("key.age")
    }

    fn vault_path(&self) -> PathBuf {
        self.dir.join("vault.enc")
    }

    fn load_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path();

        if let Ok(bytes) = fs::read(&path) {
            if bytes.len() == KEY_LEN {
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                return Ok(Zeroizing::new(key));
            }
            tracing::warn!("vault key file has wrong length, regenerating");
        }

        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        write_atomic(&path, &key)?;
        set_owner_only(&path)?;
        Ok(Zeroizing::new(key))
    }

    fn load_records(&self) -> Result<BTreeMap<String, String>, VaultError> {
        let path = self.vault_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let key = self.load_or_create_key()?;
        let blob = fs::read(&path)?;
        if blob.len() < IV_LEN + TAG_LEN {
            return Err(VaultError::Corrupted);
        }
        let (iv, rest) = blob.split_at(IV_LEN);
        let ciphertext = rest; // aes-gcm expects tag appended to ciphertext

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
        let nonce = Nonce::from_slice(iv);
        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| VaultError::Corrupted)?;
        serde_json::from_slice(&plaintext).map_err(|_| VaultError::Corrupted)
    }

    fn save_records(&self, records: &BTreeMap<String, String>) -> Result<(), VaultError> {
        let key = self.load_or_create_key()?;
        let plaintext = serde_json::to_vec(records)?;

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
        let nonce = Nonce::from_slice(&iv);
        let ciphertext = cipher.encrypt(nonce, plaintext.as_slice()).map_err(|_| VaultError::Corrupted)?;

        let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);

        let path = self.vault_path();
        write_atomic(&path, &blob)?;
        set_owner_only(&path)?;
        Ok(())
    }

    pub fn store(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let cleaned: String = value.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        let mut records = self.load_records()?;
        records.insert(key.to_string(), cleaned);
        self.save_records(&records)
    }

    pub fn retrieve(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.load_records()?.get(key).cloned())
    }

    pub fn delete(&self, key: &str) -> Result<(), VaultError> {
        let mut records = self.load_records()?;
        records.remove(key);
        self.save_records(&records)
    }

    pub fn list(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.load_records()?.keys().cloned().collect())
    }

    /// Resolve a `$vault:<name>` reference to its stored value.
    pub fn resolve_vault_ref(&self, reference: &str) -> Result<String, VaultError> {
        let name = vault_ref_name(reference).ok_or_else(|| VaultError::NotAReference(reference.to_string()))?;
        self.retrieve(name)?.ok_or_else(|| VaultError::NotFound(name.to_string()))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VaultError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{}.tmp", path.file_name().and_then(|f| f.to_str()).unwrap_or("vault")));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), VaultError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), VaultError> {
    Ok(())
}
