//! Ledger RPC boundary.
//!
//! `LedgerRpc` is the seam between the orchestration layers and the
//! network: the live adapter wraps the nonblocking RPC client, and tests
//! drive the same trait against an in-process simulation.

use crate::error::{CoreError, Result};
use crate::types::{Durability, SignatureStatus, SimulationOutcome};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn balance(&self, account: &Pubkey) -> Result<u64>;

    async fn account_exists(&self, account: &Pubkey) -> Result<bool>;

    async fn minimum_rent_exempt_balance(&self, data_len: usize) -> Result<u64>;

    async fn latest_blockhash(&self) -> Result<Hash>;

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationOutcome>;

    /// Broadcast a signed transaction. Transient transport failures surface
    /// as `CoreError::Broadcast`; the caller may resend the same bytes
    /// within the blockhash validity window.
    async fn broadcast(&self, tx: &Transaction) -> Result<Signature>;

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>>;

    async fn transaction_logs(&self, signature: &Signature) -> Result<Vec<String>>;
}

/// Live cluster adapter.
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed()),
        }
    }
}

#[async_trait]
impl LedgerRpc for RpcLedger {
    async fn balance(&self, account: &Pubkey) -> Result<u64> {
        self.client
            .get_balance(account)
            .await
            .map_err(|e| CoreError::rpc(format!("failed to read balance of {}: {}", account, e)))
    }

    async fn account_exists(&self, account: &Pubkey) -> Result<bool> {
        let response = self
            .client
            .get_account_with_commitment(account, CommitmentConfig::confirmed())
            .await
            .map_err(|e| CoreError::rpc(format!("failed to fetch account {}: {}", account, e)))?;
        Ok(response.value.is_some())
    }

    async fn minimum_rent_exempt_balance(&self, data_len: usize) -> Result<u64> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| CoreError::rpc(format!("failed to read rent minimum: {}", e)))
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| CoreError::rpc(format!("failed to fetch blockhash: {}", e)))
    }

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationOutcome> {
        let response = self
            .client
            .simulate_transaction(tx)
            .await
            .map_err(|e| CoreError::rpc(format!("simulation request failed: {}", e)))?;

        let value = response.value;
        Ok(SimulationOutcome {
            err: value.err.map(|e| e.to_string()),
            logs: value.logs.unwrap_or_default(),
            units_consumed: value.units_consumed,
        })
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<Signature> {
        // Preflight and resend policy are owned by the submitter.
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| CoreError::broadcast(e.to_string()))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| CoreError::rpc(format!("status query failed: {}", e)))?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(None),
        };

        let durability = match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => Durability::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => Durability::Confirmed,
            _ => Durability::Processed,
        };

        Ok(Some(SignatureStatus {
            durability,
            err: status.err.map(|e| e.to_string()),
        }))
    }

    async fn transaction_logs(&self, signature: &Signature) -> Result<Vec<String>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .client
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|e| CoreError::rpc(format!("failed to fetch transaction {}: {}", signature, e)))?;

        let logs = confirmed
            .transaction
            .meta
            .map(|meta| match meta.log_messages {
                OptionSerializer::Some(lines) => lines,
                _ => Vec::new(),
            })
            .unwrap_or_default();

        Ok(logs)
    }
}
