//! Local wallet session: keystore discovery, unlock, and signing.
//!
//! Key custody stays with the keystore file and the signing crate; the rest
//! of the client only sees the [`Wallet`] trait — an account address and a
//! sign-and-execute entry point.

use crate::ledger::{Address, Ledger, TransactionPlan, TransactionReceipt, Wallet};
use color_eyre::eyre::{Result, WrapErr, eyre};
use ed25519_dalek::{Signer, SigningKey};
use rpassword::prompt_password;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".raffle").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// Prompt for the keystore password and decrypt the signing key.
pub fn unlock_signing_key(descriptor: &WalletDescriptor) -> Result<SigningKey> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;

    let secret = eth_keystore::decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    let bytes: [u8; 32] = secret.as_slice().try_into().map_err(|_| {
        eyre!(
            "Wallet '{}' contained unsupported key material",
            descriptor.name
        )
    })?;
    Ok(SigningKey::from_bytes(&bytes))
}

/// A connected session: an unlocked key bound to one ledger endpoint.
pub struct KeystoreWallet<L> {
    ledger: L,
    key: SigningKey,
    address: Address,
}

impl<L> KeystoreWallet<L> {
    pub fn new(ledger: L, key: SigningKey) -> Self {
        let address = Address::from(key.verifying_key().to_bytes());
        Self {
            ledger,
            key,
            address,
        }
    }
}

impl<L: Ledger + Sync> Wallet for KeystoreWallet<L> {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_and_execute(&self, plan: &TransactionPlan) -> Result<TransactionReceipt> {
        let payload =
            serde_json::to_vec(plan).wrap_err("failed to encode transaction plan for signing")?;
        let signature = self.key.sign(&payload);
        let signature_hex = hex::encode(signature.to_bytes());
        self.ledger
            .execute_transaction(plan, &self.address, &signature_hex)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystore_wallet__derives_a_stable_address_from_the_key() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let expected = Address::from(key.verifying_key().to_bytes());
        let wallet = KeystoreWallet::new((), key);
        assert_eq!(wallet.address, expected);
        assert!(!wallet.address.is_zero());
    }

    #[test]
    fn list_wallets__missing_directory_is_empty_not_an_error() {
        let listed = list_wallets(Path::new("/nonexistent/raffle/wallets")).unwrap();
        assert!(listed.is_empty());
    }
}
