// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Role-scoped key storage and key resolution.
//!
//! [`FileKeyVault`] keeps a JSON map `role -> secret` encrypted at rest:
//!
//! ```text
//! [16 bytes] Argon2 salt
//! [12 bytes] nonce
//! [N bytes ] AES-256-GCM-SIV ciphertext of the JSON map (tag appended)
//! ```
//!
//! The AES key is derived from a master secret with Argon2id, the master
//! secret coming from the caller or `KEY_VAULT_MASTER`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use aes_gcm_siv::aead::Aead;
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use argon2::Argon2;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::config::WatermarkConfig;
use super::error::{Result, WatermarkError};
use crate::codec::crypto::{CipherKey, NONCE_LEN};

/// Environment variable holding the vault master secret.
pub const MASTER_ENV: &str = "KEY_VAULT_MASTER";
/// Environment variable consulted when neither vault nor config has a key.
pub const KEY_ENV: &str = "ENCRYPTION_KEY";
/// Argon2 salt length in bytes.
pub const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Embedder,
    Detector,
}

impl KeyRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Embedder => "embedder",
            Self::Detector => "detector",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyRole {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "embedder" => Ok(Self::Embedder),
            "detector" => Ok(Self::Detector),
            other => Err(WatermarkError::Config(format!("unknown key role: {other}"))),
        }
    }
}

/// Anything that can hand out a role secret.
pub trait KeySource {
    /// The stored secret for `role`, `None` when absent or empty.
    fn get_key(&self, role: KeyRole) -> Option<&str>;
}

/// Encrypted-at-rest key store backed by a single file.
pub struct FileKeyVault {
    path: PathBuf,
    master: Zeroizing<String>,
    keys: BTreeMap<String, Zeroizing<String>>,
}

impl FileKeyVault {
    /// Open the vault using the master secret from `KEY_VAULT_MASTER`.
    pub fn open(path: &Path) -> Result<Self> {
        match std::env::var(MASTER_ENV) {
            Ok(master) if !master.is_empty() => Self::open_with_master(path, &master),
            _ => Err(WatermarkError::VaultUnavailable(format!("{MASTER_ENV} is not set"))),
        }
    }

    /// Open the vault with an explicit master secret. A missing file is an
    /// empty vault.
    pub fn open_with_master(path: &Path, master: &str) -> Result<Self> {
        if master.is_empty() {
            return Err(WatermarkError::VaultUnavailable("empty master secret".into()));
        }
        let master = Zeroizing::new(master.to_string());
        let keys = if path.exists() {
            let data = std::fs::read(path)?;
            load(&data, &master)?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), entries = keys.len(), "key vault opened");
        Ok(Self { path: path.to_path_buf(), master, keys })
    }

    /// Store a secret for `role` and rewrite the vault file.
    ///
    /// Entries written by other handles since this one was opened are
    /// re-read first, and the new file replaces the old one by rename.
    pub fn set_key(&mut self, role: KeyRole, secret: &str) -> Result<()> {
        let mut keys = if self.path.exists() {
            load(&std::fs::read(&self.path)?, &self.master)?
        } else {
            self.keys.clone()
        };
        keys.insert(role.as_str().to_string(), Zeroizing::new(secret.to_string()));
        let data = seal(&keys, &self.master)?;
        write_atomic(&self.path, &data)?;
        tracing::debug!(path = %self.path.display(), %role, entries = keys.len(), "key vault written");
        self.keys = keys;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeySource for FileKeyVault {
    fn get_key(&self, role: KeyRole) -> Option<&str> {
        self.keys
            .get(role.as_str())
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for FileKeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKeyVault")
            .field("path", &self.path)
            .field("roles", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp = path.with_file_name(format!(".{name}.{}.tmp", std::process::id()));

    let written = std::fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn derive_vault_key(master: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(master.as_bytes(), salt, &mut *key)
        .expect("Argon2 vault key derivation should not fail");
    key
}

fn seal(keys: &BTreeMap<String, Zeroizing<String>>, master: &str) -> Result<Vec<u8>> {
    use rand::RngCore;
    let plain: BTreeMap<&str, &str> = keys.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let json = Zeroizing::new(serde_json::to_vec(&plain)?);

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let key = derive_vault_key(master, &salt);
    let cipher = Aes256GcmSiv::new_from_slice(&*key).expect("valid key length");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), json.as_slice())
        .expect("AES-GCM-SIV encrypt should not fail");

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn load(data: &[u8], master: &str) -> Result<BTreeMap<String, Zeroizing<String>>> {
    if data.len() < SALT_LEN + NONCE_LEN {
        return Err(WatermarkError::VaultCorrupted(format!("file too short ({} bytes)", data.len())));
    }
    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_vault_key(master, salt);
    let cipher = Aes256GcmSiv::new_from_slice(&*key).expect("valid key length");
    let json = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WatermarkError::VaultCorrupted("decryption failed".into()))?;

    let map: BTreeMap<String, String> = serde_json::from_slice(&json)
        .map_err(|e| WatermarkError::VaultCorrupted(e.to_string()))?;
    Ok(map.into_iter().map(|(k, v)| (k, Zeroizing::new(v))).collect())
}

/// Resolve the cipher key for `role`.
///
/// Order: vault entry, config value, `ENCRYPTION_KEY`. `None` means the
/// payload stays unencrypted.
pub fn resolve_key(
    role: KeyRole,
    config: &WatermarkConfig,
    vault: Option<&dyn KeySource>,
) -> Option<CipherKey> {
    let env = std::env::var(KEY_ENV).ok().map(Zeroizing::new);
    resolve_key_from(role, config, vault, env.as_deref().map(String::as_str))
}

fn resolve_key_from(
    role: KeyRole,
    config: &WatermarkConfig,
    vault: Option<&dyn KeySource>,
    env: Option<&str>,
) -> Option<CipherKey> {
    let (source, secret) = vault
        .and_then(|v| v.get_key(role))
        .map(|s| ("vault", s))
        .or_else(|| config.inline_key(role).map(|s| ("config", s)))
        .or_else(|| env.filter(|s| !s.is_empty()).map(|s| ("env", s)))?;
    tracing::debug!(role = %role, source, "cipher key resolved");
    Some(CipherKey::from_secret(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crypto;

    struct Fixed(&'static str);

    impl KeySource for Fixed {
        fn get_key(&self, _role: KeyRole) -> Option<&str> {
            Some(self.0)
        }
    }

    fn same_key(a: &CipherKey, b: &CipherKey) -> bool {
        let sealed = crypto::encrypt(&[1, 0, 1, 1], a);
        crypto::decrypt(&sealed, b).is_ok()
    }

    #[test]
    fn role_parsing() {
        assert_eq!("embedder".parse::<KeyRole>().unwrap(), KeyRole::Embedder);
        assert_eq!(KeyRole::Detector.to_string(), "detector");
        assert!("admin".parse::<KeyRole>().is_err());
    }

    #[test]
    fn set_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.bin");

        let mut vault = FileKeyVault::open_with_master(&path, "master").unwrap();
        assert_eq!(vault.get_key(KeyRole::Embedder), None);
        vault.set_key(KeyRole::Embedder, "s3cret").unwrap();

        let reopened = FileKeyVault::open_with_master(&path, "master").unwrap();
        assert_eq!(reopened.get_key(KeyRole::Embedder), Some("s3cret"));
        assert_eq!(reopened.get_key(KeyRole::Detector), None);

        let raw = std::fs::read(&path).unwrap();
        assert!(!raw.windows(6).any(|w| w == b"s3cret"));
    }

    #[test]
    fn handles_do_not_drop_each_others_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.bin");

        let mut first = FileKeyVault::open_with_master(&path, "master").unwrap();
        let mut second = FileKeyVault::open_with_master(&path, "master").unwrap();
        first.set_key(KeyRole::Embedder, "embed-secret").unwrap();
        second.set_key(KeyRole::Detector, "detect-secret").unwrap();

        let reopened = FileKeyVault::open_with_master(&path, "master").unwrap();
        assert_eq!(reopened.get_key(KeyRole::Embedder), Some("embed-secret"));
        assert_eq!(reopened.get_key(KeyRole::Detector), Some("detect-secret"));
        assert_eq!(second.get_key(KeyRole::Embedder), Some("embed-secret"));
    }

    #[test]
    fn rewrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.bin");
        let mut vault = FileKeyVault::open_with_master(&path, "master").unwrap();
        vault.set_key(KeyRole::Embedder, "one").unwrap();
        vault.set_key(KeyRole::Embedder, "two").unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["vault.bin".to_string()]);
        let reopened = FileKeyVault::open_with_master(&path, "master").unwrap();
        assert_eq!(reopened.get_key(KeyRole::Embedder), Some("two"));
    }

    #[test]
    fn wrong_master_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.bin");
        FileKeyVault::open_with_master(&path, "master")
            .unwrap()
            .set_key(KeyRole::Detector, "x")
            .unwrap();
        let result = FileKeyVault::open_with_master(&path, "other");
        assert!(matches!(result, Err(WatermarkError::VaultCorrupted(_))));
    }

    #[test]
    fn truncated_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.bin");
        std::fs::write(&path, b"short").unwrap();
        let result = FileKeyVault::open_with_master(&path, "master");
        assert!(matches!(result, Err(WatermarkError::VaultCorrupted(_))));
    }

    #[test]
    fn empty_master_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileKeyVault::open_with_master(&dir.path().join("v"), "");
        assert!(matches!(result, Err(WatermarkError::VaultUnavailable(_))));
    }

    #[test]
    fn resolution_order() {
        let config = WatermarkConfig::new("P", 2024, "u").with_shared_key("from-config");
        let bare = WatermarkConfig::new("P", 2024, "u");
        let vault = Fixed("from-vault");

        let k = resolve_key_from(KeyRole::Embedder, &config, Some(&vault as &dyn KeySource), Some("from-env")).unwrap();
        assert!(same_key(&k, &CipherKey::from_secret("from-vault")));

        let k = resolve_key_from(KeyRole::Embedder, &config, None, Some("from-env")).unwrap();
        assert!(same_key(&k, &CipherKey::from_secret("from-config")));

        let k = resolve_key_from(KeyRole::Detector, &bare, None, Some("from-env")).unwrap();
        assert!(same_key(&k, &CipherKey::from_secret("from-env")));

        assert!(resolve_key_from(KeyRole::Detector, &bare, None, None).is_none());
        assert!(resolve_key_from(KeyRole::Detector, &bare, None, Some("")).is_none());
    }
}
