/// Destination-chain asset registry and treasury access.
///
/// All balance reads and transfers address a single treasury account on
/// Base; tokens are identified by a closed set of symbols with their
/// contract addresses and decimals.
pub mod treasury;

pub use treasury::{BaseTreasury, TreasuryConfig, TreasuryGateway};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChainError;

/// Supported settlement assets on the destination chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Usdc,
    Usdt,
    Dai,
    Eth,
}

impl Asset {
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
            Asset::Dai => "DAI",
            Asset::Eth => "ETH",
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Asset::Usdc | Asset::Usdt => 6,
            Asset::Dai | Asset::Eth => 18,
        }
    }

    /// Token contract on Base mainnet; `None` for the native asset
    pub fn token_address(&self) -> Option<&'static str> {
        match self {
            Asset::Usdc => Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            Asset::Usdt => Some("0xfde4C96c8593536E31F209EA5dF9988046bB85e0"),
            Asset::Dai => Some("0x50c5725949A6F0c72E6C4a641F24049A917eF0Cb"),
            Asset::Eth => None,
        }
    }
}

impl FromStr for Asset {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USDC" => Ok(Asset::Usdc),
            "USDT" => Ok(Asset::Usdt),
            "DAI" => Ok(Asset::Dai),
            "ETH" => Ok(Asset::Eth),
            other => Err(ChainError::UnsupportedAsset(other.to_string())),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported_assets() {
        assert_eq!("USDC".parse::<Asset>().unwrap(), Asset::Usdc);
        assert_eq!("usdt".parse::<Asset>().unwrap(), Asset::Usdt);
        assert_eq!("Dai".parse::<Asset>().unwrap(), Asset::Dai);
        assert_eq!("ETH".parse::<Asset>().unwrap(), Asset::Eth);
    }

    #[test]
    fn test_parse_rejects_unknown_symbol() {
        let err = "DOGE".parse::<Asset>().unwrap_err();
        assert!(matches!(err, ChainError::UnsupportedAsset(s) if s == "DOGE"));
    }

    #[test]
    fn test_native_asset_has_no_contract() {
        assert!(Asset::Eth.token_address().is_none());
        for asset in [Asset::Usdc, Asset::Usdt, Asset::Dai] {
            assert!(asset.token_address().is_some());
        }
    }

    #[test]
    fn test_stablecoin_decimals() {
        assert_eq!(Asset::Usdc.decimals(), 6);
        assert_eq!(Asset::Usdt.decimals(), 6);
        assert_eq!(Asset::Dai.decimals(), 18);
        assert_eq!(Asset::Eth.decimals(), 18);
    }
}
