//! Network settings read from the environment (`.env` is loaded beforehand).

use std::env;
use std::fmt;

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result, anyhow, bail};
use url::Url;

pub const RPC_URL_ENV: &str = "QUICKNODE_HTTP_URL";
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

const PRIVATE_KEY_HEX_LEN: usize = 64;

/// RPC endpoint plus the deployer's key.
#[derive(Clone)]
pub struct NetworkConfig {
    pub rpc_url: Url,
    private_key: String,
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl NetworkConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rpc_url = required(&lookup, RPC_URL_ENV)?;
        let rpc_url = Url::parse(rpc_url.trim())
            .with_context(|| format!("{RPC_URL_ENV} is not a valid URL"))?;

        let private_key = normalize_private_key(&required(&lookup, PRIVATE_KEY_ENV)?)
            .with_context(|| format!("{PRIVATE_KEY_ENV} is not a usable key"))?;

        Ok(Self {
            rpc_url,
            private_key,
        })
    }

    /// The deployer account.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        self.private_key
            .parse::<PrivateKeySigner>()
            .map_err(|e| anyhow!("{PRIVATE_KEY_ENV} is not a valid secp256k1 key: {e}"))
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{key} must be set"))
}

/// Accepts the key with or without a `0x` prefix and returns it prefixed.
pub fn normalize_private_key(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.len() != PRIVATE_KEY_HEX_LEN {
        bail!(
            "expected {PRIVATE_KEY_HEX_LEN} hex characters, got {}",
            hex.len()
        );
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("key contains non-hex characters");
    }

    Ok(format!("0x{hex}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    // Well-known development key (Hardhat/Anvil account #0).
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn key_prefix_is_optional() {
        let bare = normalize_private_key(DEV_KEY).expect("bare key");
        let prefixed = normalize_private_key(&format!("0x{DEV_KEY}")).expect("prefixed key");
        assert_eq!(bare, prefixed);
        assert!(bare.starts_with("0x"));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(normalize_private_key("0x1234").is_err());
        let bad = format!("{}zz", &DEV_KEY[..62]);
        assert!(normalize_private_key(&bad).is_err());
    }

    #[test]
    fn missing_variables_are_reported() {
        let err = NetworkConfig::from_lookup(lookup(&[(PRIVATE_KEY_ENV, DEV_KEY)]))
            .expect_err("missing url");
        assert_eq!(err.to_string(), "QUICKNODE_HTTP_URL must be set");

        let err = NetworkConfig::from_lookup(lookup(&[(RPC_URL_ENV, "http://localhost:8545")]))
            .expect_err("missing key");
        assert_eq!(err.to_string(), "PRIVATE_KEY must be set");
    }

    #[test]
    fn resolves_signer_address() {
        let config = NetworkConfig::from_lookup(lookup(&[
            (RPC_URL_ENV, "https://example.quiknode.pro/token/"),
            (PRIVATE_KEY_ENV, DEV_KEY),
        ]))
        .expect("config");

        assert_eq!(config.rpc_url.host_str(), Some("example.quiknode.pro"));
        let signer = config.signer().expect("signer");
        assert_eq!(signer.address().to_checksum(None), DEV_ADDRESS);
    }
}
