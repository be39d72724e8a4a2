//! Authentication material offered to the bastion.
//!
//! Keys are read from identity files and decoded without a passphrase first;
//! the passphrase is only consulted when the key turns out to be encrypted.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use russh::keys::{HashAlg, PrivateKey};
use tracing::debug;

use crate::engine::files;
use crate::error::SshError;

/// Load and decode one private key.
///
/// # Errors
///
/// Returns `SshError::IdentityUnreadable` when the file cannot be read,
/// `SshError::IdentityPassphraseRequired` when the key is encrypted and no
/// passphrase is available, and `SshError::IdentityParse` for any other
/// decode failure, including a wrong passphrase.
pub fn load_signer(path: &Utf8Path, passphrase: Option<&str>) -> Result<PrivateKey, SshError> {
    let encoded = files::read_to_string(path).map_err(|e| SshError::IdentityUnreadable {
        path: path.as_std_path().to_path_buf(),
        message: e.to_string(),
    })?;
    let parse_error = |e: russh::keys::Error| SshError::IdentityParse {
        path: path.as_std_path().to_path_buf(),
        message: e.to_string(),
    };

    match russh::keys::decode_secret_key(&encoded, None) {
        Ok(key) => Ok(key),
        Err(russh::keys::Error::KeyIsEncrypted) => {
            let phrase = passphrase.ok_or_else(|| SshError::IdentityPassphraseRequired {
                path: path.as_std_path().to_path_buf(),
            })?;
            debug!(path = %path, "decrypting identity with supplied passphrase");
            russh::keys::decode_secret_key(&encoded, Some(phrase)).map_err(parse_error)
        }
        Err(e) => Err(parse_error(e)),
    }
}

/// The ordered set of methods offered during authentication.
///
/// Keys come first, deduplicated by SHA-256 fingerprint with the first
/// occurrence kept; a password, when present, is tried last.
#[derive(Clone, Default)]
pub struct AuthMethods {
    keys: Vec<Arc<PrivateKey>>,
    password: Option<String>,
}

impl std::fmt::Debug for AuthMethods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fingerprints: Vec<String> = self.fingerprints().collect();
        f.debug_struct("AuthMethods")
            .field("keys", &fingerprints)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthMethods {
    /// Load every identity and assemble the method set.
    ///
    /// An empty `password` is treated as absent. The result may be empty, in
    /// which case only the `none` method is attempted.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`load_signer`].
    pub fn resolve(
        identities: &[Utf8PathBuf],
        passphrase: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, SshError> {
        let mut methods = Self::default();
        for identity in identities {
            let key = load_signer(identity, passphrase)?;
            if !methods.push_key(key) {
                debug!(path = %identity, "skipping duplicate identity");
            }
        }
        methods.password = password.filter(|p| !p.is_empty()).map(str::to_owned);
        Ok(methods)
    }

    /// Append a key unless one with the same fingerprint is already present.
    ///
    /// Returns whether the key was added.
    pub fn push_key(&mut self, key: PrivateKey) -> bool {
        let fingerprint = key.public_key().fingerprint(HashAlg::Sha256).to_string();
        if self.fingerprints().any(|seen| seen == fingerprint) {
            return false;
        }
        self.keys.push(Arc::new(key));
        true
    }

    fn fingerprints(&self) -> impl Iterator<Item = String> + '_ {
        self.keys
            .iter()
            .map(|key| key.public_key().fingerprint(HashAlg::Sha256).to_string())
    }

    /// Returns the keys in offer order.
    #[must_use]
    pub fn keys(&self) -> &[Arc<PrivateKey>] {
        &self.keys
    }

    /// Returns the password, if one will be offered.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns true if neither keys nor a password will be offered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.password.is_none()
    }
}
