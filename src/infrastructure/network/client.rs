// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::data::abi::TransactionManager;
use crate::domain::request::{RemoteRequest, short_id};
use crate::network::chain::{ChainClient, ExecuteCall, SubmittedEvent};
use crate::network::gas::GasOracle;
use crate::network::nonce::NonceManager;
use crate::network::provider::{ConnectionFactory, HttpProvider};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::{ReceiptResponse, TxSignerSync};
use alloy::primitives::{Address, B256, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{SolCall, SolEvent};
use std::time::Duration;

const READ_ATTEMPTS: usize = 3;
const READ_BACKOFF: Duration = Duration::from_millis(200);

/// Production `ChainClient` over a plain HTTP JSON-RPC endpoint.
pub struct AlloyChainClient {
    provider: HttpProvider,
    contract: Address,
    signer: PrivateKeySigner,
    chain_id: u64,
    gas: GasOracle,
    nonces: NonceManager,
}

impl AlloyChainClient {
    /// Connects, detects the chain id and checks the contract is deployed.
    /// Any failure here is fatal to startup.
    pub async fn connect(
        rpc_url: &str,
        contract: Address,
        signer: PrivateKeySigner,
        expected_chain_id: Option<u64>,
    ) -> Result<Self, AppError> {
        let provider = ConnectionFactory::http(rpc_url)?;
        let chain_id = ConnectionFactory::detect_chain_id(&provider).await?;
        if let Some(expected) = expected_chain_id
            && expected != chain_id
        {
            return Err(AppError::Config(format!(
                "chain_id mismatch: configured {expected}, RPC reports {chain_id}"
            )));
        }
        ConnectionFactory::ensure_contract(&provider, contract).await?;

        tracing::info!(
            target: "keeper",
            chain_id,
            contract = %format!("{:#x}", contract),
            executor = %format!("{:#x}", signer.address()),
            "Connected to RPC"
        );

        Ok(Self::from_provider(provider, contract, signer, chain_id))
    }

    fn from_provider(
        provider: HttpProvider,
        contract: Address,
        signer: PrivateKeySigner,
        chain_id: u64,
    ) -> Self {
        let gas = GasOracle::new(provider.clone());
        let nonces = NonceManager::new(provider.clone(), signer.address());
        Self {
            provider,
            contract,
            signer,
            chain_id,
            gas,
            nonces,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn executor(&self) -> Address {
        self.signer.address()
    }

    fn execute_calldata(id: B256) -> Vec<u8> {
        TransactionManager::executeTransactionCall { txId: id }.abi_encode()
    }

    fn sign_execute(&self, call: &ExecuteCall) -> Result<(Vec<u8>, B256), AppError> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: call.nonce,
            max_priority_fee_per_gas: call.max_priority_fee_per_gas,
            max_fee_per_gas: call.max_fee_per_gas,
            gas_limit: call.gas_limit,
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            access_list: AccessList::default(),
            input: Self::execute_calldata(call.id).into(),
        };

        let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx).map_err(|e| {
            AppError::Transaction {
                hash: short_id(&call.id),
                reason: format!("Sign tx failed: {}", e),
            }
        })?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        let hash = *signed.tx_hash();
        Ok((signed.encoded_2718(), hash))
    }
}

impl ChainClient for AlloyChainClient {
    async fn head_block(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        retry_async(
            "eth_blockNumber",
            move |_| {
                let provider = provider.clone();
                async move { provider.get_block_number().await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await
        .map_err(|e| AppError::Connection(format!("Block number failed: {}", e)))
    }

    async fn submitted_events(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<SubmittedEvent>, AppError> {
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(TransactionManager::TransactionSubmitted::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| AppError::Connection(format!("eth_getLogs {from}..={to} failed: {e}")))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let block_number = log.block_number.unwrap_or(to);
            match log.log_decode::<TransactionManager::TransactionSubmitted>() {
                Ok(decoded) => {
                    let ev = decoded.inner.data;
                    events.push(SubmittedEvent {
                        id: ev.txId,
                        submitter: ev.submitter,
                        target: ev.target,
                        block_number,
                    });
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", block = block_number, error = %e, "Undecodable TransactionSubmitted log");
                }
            }
        }
        Ok(events)
    }

    async fn request_state(&self, id: B256) -> Result<RemoteRequest, AppError> {
        let provider = self.provider.clone();
        let contract = self.contract;
        let ret = retry_async(
            "transactionRequests",
            move |_| {
                let manager = TransactionManager::new(contract, provider.clone());
                async move { manager.transactionRequests(id).call().await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await
        .map_err(|e| {
            AppError::Connection(format!("transactionRequests({}) failed: {}", short_id(&id), e))
        })?;

        Ok(RemoteRequest {
            submitter: ret.submitter,
            target: ret.target,
            data: ret.data,
            max_cost: ret.maxGasPrice,
            deadline: ret.deadline,
            executed: ret.executed,
        })
    }

    async fn base_fee_per_gas(&self) -> Result<u128, AppError> {
        self.gas.latest_base_fee().await
    }

    async fn estimate_execute_gas(&self, id: B256) -> Result<u64, AppError> {
        let request = TransactionRequest {
            from: Some(self.signer.address()),
            to: Some(TxKind::Call(self.contract)),
            input: TransactionInput::new(Self::execute_calldata(id).into()),
            ..Default::default()
        };
        self.provider
            .estimate_gas(request)
            .await
            .map_err(|e| AppError::Transaction {
                hash: short_id(&id),
                reason: format!("estimateGas failed: {}", e),
            })
    }

    async fn next_nonce(&self) -> Result<u64, AppError> {
        self.nonces.next_nonce().await
    }

    async fn broadcast_execute(&self, call: &ExecuteCall) -> Result<B256, AppError> {
        let (raw, local_hash) = self.sign_execute(call)?;
        match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => {
                self.nonces.mark_used(call.nonce);
                let hash = *pending.tx_hash();
                if hash != local_hash {
                    tracing::debug!(target: "dispatch", local = %local_hash, remote = %hash, "RPC returned a different tx hash");
                }
                Ok(hash)
            }
            Err(e) => {
                self.nonces.invalidate();
                Err(AppError::Connection(format!(
                    "send_raw_transaction failed: {}",
                    e
                )))
            }
        }
    }

    async fn receipt_status(&self, hash: B256) -> Result<Option<bool>, AppError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| AppError::Connection(format!("Receipt fetch failed: {}", e)))?;
        Ok(receipt.map(|r| ReceiptResponse::status(&r)))
    }

    fn reset_nonce(&self) {
        self.nonces.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> AlloyChainClient {
        let provider = ConnectionFactory::http("http://127.0.0.1:1").unwrap();
        AlloyChainClient::from_provider(
            provider,
            Address::from([0x44; 20]),
            PrivateKeySigner::from_bytes(&B256::from([0x11; 32])).unwrap(),
            11_155_111,
        )
    }

    #[tokio::test]
    async fn failed_base_fee_read_surfaces_every_time() {
        let client = offline_client();
        for _ in 0..2 {
            assert!(matches!(
                client.base_fee_per_gas().await,
                Err(AppError::Connection(_))
            ));
        }
    }

    #[test]
    fn execute_calldata_targets_execute_selector() {
        let id = B256::from([9u8; 32]);
        let data = AlloyChainClient::execute_calldata(id);
        assert_eq!(
            &data[..4],
            TransactionManager::executeTransactionCall::SELECTOR.as_slice()
        );
        assert_eq!(&data[4..], id.as_slice());
    }
}
