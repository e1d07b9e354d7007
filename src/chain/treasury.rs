use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{
        utils::{format_units, parse_units},
        Address, U256,
    },
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::chain::Asset;
use crate::error::{AppError, AppResult, ChainError};

sol! {
    #[sol(rpc)]
    contract Erc20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 value) external returns (bool);
    }
}

#[derive(Debug, Clone)]
pub struct TreasuryConfig {
    pub rpc_url: String,
}

/// Treasury access seam: balance reads and transfer submission against the
/// single treasury account. Implemented by [`BaseTreasury`] in production
/// and by mocks in orchestrator tests.
#[async_trait]
pub trait TreasuryGateway: Send + Sync {
    /// Current treasury balance of `asset`, normalized to human units
    async fn balance_of(&self, asset: Asset) -> Result<Decimal, ChainError>;

    /// Submit a transfer from the treasury account. Returns the transaction
    /// hash once the submission is accepted by the network layer; finality
    /// is not awaited.
    async fn transfer(
        &self,
        asset: Asset,
        amount: Decimal,
        recipient: &str,
    ) -> Result<String, ChainError>;

    /// The treasury address, used as the payout order's return address
    fn address(&self) -> String;
}

/// Treasury client for Base, signing with a server-held key
pub struct BaseTreasury {
    provider: DynProvider,
    address: Address,
}

impl BaseTreasury {
    pub fn new(config: &TreasuryConfig, signer: PrivateKeySigner) -> AppResult<Self> {
        let address = signer.address();
        let url = config
            .rpc_url
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid BASE_RPC_URL: {}", e)))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!("🏦 Treasury client ready for account {}", address);
        Ok(Self { provider, address })
    }

    fn token_contract(asset: Asset) -> Result<Address, ChainError> {
        let raw = asset
            .token_address()
            .ok_or_else(|| ChainError::UnsupportedAsset(asset.symbol().to_string()))?;
        raw.parse()
            .map_err(|e| ChainError::ReadFailed(format!("bad token address for {}: {}", asset, e)))
    }

    fn to_base_units(asset: Asset, amount: Decimal) -> Result<U256, ChainError> {
        parse_units(&amount.to_string(), asset.decimals())
            .map(|units| units.get_absolute())
            .map_err(|e| {
                ChainError::SubmissionFailed(format!("cannot scale {} {}: {}", amount, asset, e))
            })
    }

    fn from_base_units(asset: Asset, raw: U256) -> Result<Decimal, ChainError> {
        let human = format_units(raw, asset.decimals())
            .map_err(|e| ChainError::ReadFailed(format!("cannot format balance: {}", e)))?;
        Decimal::from_str(&human)
            .map_err(|e| ChainError::ReadFailed(format!("balance out of decimal range: {}", e)))
    }
}

#[async_trait]
impl TreasuryGateway for BaseTreasury {
    async fn balance_of(&self, asset: Asset) -> Result<Decimal, ChainError> {
        let raw = match asset.token_address() {
            None => self
                .provider
                .get_balance(self.address)
                .await
                .map_err(|e| ChainError::ReadFailed(e.to_string()))?,
            Some(_) => {
                let token = Erc20::new(Self::token_contract(asset)?, self.provider.clone());
                token
                    .balanceOf(self.address)
                    .call()
                    .await
                    .map_err(|e| ChainError::ReadFailed(e.to_string()))?
            }
        };

        Self::from_base_units(asset, raw)
    }

    #[instrument(skip(self), fields(treasury = %self.address))]
    async fn transfer(
        &self,
        asset: Asset,
        amount: Decimal,
        recipient: &str,
    ) -> Result<String, ChainError> {
        let to: Address = recipient.parse().map_err(|_| {
            ChainError::SubmissionFailed(format!("invalid recipient address: {}", recipient))
        })?;
        let value = Self::to_base_units(asset, amount)?;

        let tx_hash = match asset.token_address() {
            None => {
                let tx = TransactionRequest::default().with_to(to).with_value(value);
                let pending = self
                    .provider
                    .send_transaction(tx)
                    .await
                    .map_err(|e| ChainError::SubmissionFailed(e.to_string()))?;
                *pending.tx_hash()
            }
            Some(_) => {
                let token = Erc20::new(Self::token_contract(asset)?, self.provider.clone());
                let pending = token
                    .transfer(to, value)
                    .send()
                    .await
                    .map_err(|e| ChainError::SubmissionFailed(e.to_string()))?;
                *pending.tx_hash()
            }
        };

        info!("💸 Submitted {} {} transfer to {}: {}", amount, asset, to, tx_hash);
        Ok(tx_hash.to_string())
    }

    fn address(&self) -> String {
        self.address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scaling_to_base_units() {
        let raw = BaseTreasury::to_base_units(Asset::Usdc, dec!(100.50)).unwrap();
        assert_eq!(raw, U256::from(100_500_000u64));

        let raw = BaseTreasury::to_base_units(Asset::Eth, dec!(1.5)).unwrap();
        assert_eq!(raw, U256::from(1_500_000_000_000_000_000u64));
    }

    #[test]
    fn test_scaling_from_base_units() {
        let human = BaseTreasury::from_base_units(Asset::Usdc, U256::from(99_990_000u64)).unwrap();
        assert_eq!(human, dec!(99.99));

        let human =
            BaseTreasury::from_base_units(Asset::Dai, U256::from(2_000_000_000_000_000_000u64))
                .unwrap();
        assert_eq!(human, dec!(2));
    }

    #[test]
    fn test_round_trip_preserves_amount() {
        let amount = dec!(123.456789);
        let raw = BaseTreasury::to_base_units(Asset::Usdt, amount).unwrap();
        assert_eq!(BaseTreasury::from_base_units(Asset::Usdt, raw).unwrap(), amount);
    }
}
