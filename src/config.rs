//! Network targets, contract constants, and runtime configuration.

use crate::ledger::ObjectId;
use color_eyre::eyre::{Result, WrapErr, eyre};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEVNET_RPC_URL: &str = "https://fullnode.devnet.sui.io:443";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:9000";

/// Published package ids per network, used when no override is supplied.
pub const DEVNET_PACKAGE_ID: &str =
    "0x5c5d81f0c1b5a307df9358299e61f9b88f12711280c5f4864ef6d124f8c13d72";
pub const TESTNET_PACKAGE_ID: &str =
    "0xac7aec8a42876bdde5fe440bc624a5458f322db3a66eb394ee67745ebc20c804";

pub const PACKAGE_ID_ENV: &str = "RAFFLE_PACKAGE_ID";
pub const RPC_URL_ENV: &str = "RAFFLE_RPC_URL";

pub const CONTRACT_MODULE: &str = "simple_raffle";

/// Entry fee in the ledger's smallest denomination: exactly 1 base unit.
pub const ENTRY_FEE: u64 = 1_000_000_000;
pub const MIN_PARTICIPANTS: u64 = 2;
/// The well-known object supplying verifiable randomness to `pick_winner`.
pub const RANDOM_OBJECT_ID: &str = "0x8";

pub const JOIN_GAS_BUDGET: u64 = 10_000_000;
pub const EVENT_QUERY_LIMIT: usize = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

pub fn random_object() -> ObjectId {
    RANDOM_OBJECT_ID
        .parse()
        .expect("well-known randomness object id parses")
}

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Devnet { url: String },
    Testnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Devnet { url }
            | NetworkTarget::Testnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NetworkTarget::Devnet { .. } => "devnet",
            NetworkTarget::Testnet { .. } => "testnet",
            NetworkTarget::LocalNode { .. } => "local",
        }
    }

    fn default_package_id(&self) -> Option<&'static str> {
        match self {
            NetworkTarget::Devnet { .. } => Some(DEVNET_PACKAGE_ID),
            NetworkTarget::Testnet { .. } => Some(TESTNET_PACKAGE_ID),
            NetworkTarget::LocalNode { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    Keystore { owner: String, dir: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub wallets: WalletConfig,
    pub package_override: Option<ObjectId>,
    pub poll_interval: Duration,
}

impl AppConfig {
    /// Contract package id: CLI override, then environment, then the
    /// network's hardcoded default.
    pub fn resolve_package_id(&self) -> Result<ObjectId> {
        if let Some(id) = self.package_override {
            return Ok(id);
        }
        if let Ok(raw) = std::env::var(PACKAGE_ID_ENV)
            && !raw.is_empty()
        {
            return raw
                .parse()
                .wrap_err_with(|| format!("{PACKAGE_ID_ENV} contains an invalid package id"));
        }
        match self.network.default_package_id() {
            Some(raw) => raw
                .parse()
                .wrap_err("built-in package id is invalid"),
            None => Err(eyre!(
                "no contract package configured for {}; pass --package or set {PACKAGE_ID_ENV}",
                self.network.name()
            )),
        }
    }

    /// RPC endpoint: environment override, then the network default.
    pub fn resolve_rpc_url(&self) -> String {
        match std::env::var(RPC_URL_ENV) {
            Ok(url) if !url.is_empty() => url,
            _ => self.network.url().to_string(),
        }
    }
}
