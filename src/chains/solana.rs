//! Solana transactor
//!
//! Builds, signs, and submits legacy transactions directly against JSON-RPC:
//! native lamport transfers for funding exchange orders, and the venue's
//! Anchor vault-deposit instruction for crediting custodial balances.

use super::{ChainTransactor, VaultTransactor};
use crate::config::{SolanaConfig, VaultAccounts};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::venue::signer::decode_signing_key;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::Signer;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use tracing::debug;

const SYSTEM: &str = "solana";

/// The system program id is the all-zero key
const SYSTEM_PROGRAM: [u8; 32] = [0u8; 32];

/// SystemProgram::Transfer instruction tag
const TRANSFER_TAG: u32 = 2;

#[derive(Debug, Clone, Copy)]
struct AccountMeta {
    pubkey: [u8; 32],
    is_signer: bool,
    is_writable: bool,
}

struct Instruction {
    program_id: [u8; 32],
    accounts: Vec<AccountMeta>,
    data: Vec<u8>,
}

/// Solana adapter speaking JSON-RPC
pub struct SolanaTransactor {
    http: reqwest::Client,
    rpc_url: String,
    commitment: String,
    vault: VaultAccounts,
}

impl SolanaTransactor {
    pub fn new(config: &SolanaConfig, vault: &VaultAccounts) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            commitment: config.commitment.clone(),
            vault: vault.clone(),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> OrchestratorResult<Value> {
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        if let Some(err) = body.get("error") {
            return Err(OrchestratorError::adapter(
                SYSTEM,
                err.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("RPC error")
                    .to_string(),
            ));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| OrchestratorError::adapter(SYSTEM, "RPC response missing result"))
    }

    async fn latest_blockhash(&self) -> OrchestratorResult<[u8; 32]> {
        let result = self
            .rpc_call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment }]),
            )
            .await?;

        let blockhash = result
            .pointer("/value/blockhash")
            .and_then(Value::as_str)
            .ok_or_else(|| OrchestratorError::adapter(SYSTEM, "Malformed blockhash response"))?;

        decode_pubkey(blockhash)
    }

    /// Sign a single-instruction legacy transaction and submit it
    async fn sign_and_send(
        &self,
        secret: &str,
        instruction: Instruction,
    ) -> OrchestratorResult<String> {
        let signing_key = decode_signing_key(secret)?;
        let payer = signing_key.verifying_key().to_bytes();

        let blockhash = self.latest_blockhash().await?;
        let message = build_message(payer, &instruction, blockhash);
        let signature = signing_key.sign(&message);

        let mut tx = Vec::with_capacity(1 + 64 + message.len());
        append_compact_u16(&mut tx, 1);
        tx.extend_from_slice(&signature.to_bytes());
        tx.extend_from_slice(&message);

        let result = self
            .rpc_call(
                "sendTransaction",
                json!([
                    BASE64.encode(&tx),
                    { "encoding": "base64", "preflightCommitment": self.commitment }
                ]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OrchestratorError::adapter(SYSTEM, "Malformed send response"))
    }
}

#[async_trait]
impl ChainTransactor for SolanaTransactor {
    async fn send_payment(
        &self,
        secret: &str,
        address: &str,
        amount: u64,
    ) -> OrchestratorResult<String> {
        debug!("Submitting SOL transfer of {} lamports to {}", amount, address);

        let signing_key = decode_signing_key(secret)?;
        let payer = signing_key.verifying_key().to_bytes();
        let to = decode_pubkey(address)?;

        let instruction = Instruction {
            program_id: SYSTEM_PROGRAM,
            accounts: vec![
                AccountMeta { pubkey: payer, is_signer: true, is_writable: true },
                AccountMeta { pubkey: to, is_signer: false, is_writable: true },
            ],
            data: transfer_data(amount),
        };

        self.sign_and_send(secret, instruction).await
    }
}

#[async_trait]
impl VaultTransactor for SolanaTransactor {
    async fn submit_vault_deposit(
        &self,
        secret: &str,
        account_id: &str,
        broker_id: &str,
        token: &str,
        amount: u64,
    ) -> OrchestratorResult<String> {
        debug!("Submitting vault deposit of {} lamports", amount);

        let signing_key = decode_signing_key(secret)?;
        let user = signing_key.verifying_key().to_bytes();

        let account_id_bytes: [u8; 32] = hex::decode(account_id.trim_start_matches("0x"))
            .map_err(|e| OrchestratorError::adapter(SYSTEM, format!("Bad account id: {}", e)))?
            .try_into()
            .map_err(|_| OrchestratorError::adapter(SYSTEM, "Account id must be 32 bytes"))?;

        let mut data = anchor_discriminator("deposit_sol").to_vec();
        data.extend_from_slice(&account_id_bytes);
        data.extend_from_slice(&keccak256(broker_id.as_bytes()));
        data.extend_from_slice(&keccak256(token.as_bytes()));
        data.extend_from_slice(&user);
        data.extend_from_slice(&amount.to_le_bytes());
        // Messaging fees (native, token), both zero for direct deposits
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());

        let instruction = Instruction {
            program_id: decode_pubkey(&self.vault.program_id)?,
            accounts: vec![
                AccountMeta { pubkey: user, is_signer: true, is_writable: true },
                AccountMeta {
                    pubkey: decode_pubkey(&self.vault.vault_authority)?,
                    is_signer: false,
                    is_writable: false,
                },
                AccountMeta {
                    pubkey: decode_pubkey(&self.vault.sol_vault)?,
                    is_signer: false,
                    is_writable: true,
                },
                AccountMeta {
                    pubkey: decode_pubkey(&self.vault.peer)?,
                    is_signer: false,
                    is_writable: false,
                },
                AccountMeta {
                    pubkey: decode_pubkey(&self.vault.enforced_options)?,
                    is_signer: false,
                    is_writable: false,
                },
                AccountMeta {
                    pubkey: decode_pubkey(&self.vault.oapp_config)?,
                    is_signer: false,
                    is_writable: false,
                },
                AccountMeta { pubkey: SYSTEM_PROGRAM, is_signer: false, is_writable: false },
            ],
            data,
        };

        self.sign_and_send(secret, instruction).await
    }
}

fn decode_pubkey(s: &str) -> OrchestratorResult<[u8; 32]> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| OrchestratorError::adapter(SYSTEM, format!("Bad base58 key: {}", e)))?
        .try_into()
        .map_err(|_| OrchestratorError::adapter(SYSTEM, "Key must be 32 bytes"))
}

fn transfer_data(lamports: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data
}

/// First 8 bytes of sha256("global:{name}"), the Anchor method selector
fn anchor_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{}", name).as_bytes());
    digest[..8].try_into().unwrap()
}

fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Shortvec length prefix used throughout the wire format
fn append_compact_u16(out: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Serialize a single-instruction legacy message.
///
/// Account ordering follows the runtime's requirements: writable signers,
/// readonly signers, writable non-signers, readonly non-signers, with the
/// fee payer first.
fn build_message(payer: [u8; 32], instruction: &Instruction, recent_blockhash: [u8; 32]) -> Vec<u8> {
    // Merge duplicate keys, or-ing their privileges; the payer always signs
    let mut metas: Vec<AccountMeta> = vec![AccountMeta {
        pubkey: payer,
        is_signer: true,
        is_writable: true,
    }];

    for meta in instruction
        .accounts
        .iter()
        .copied()
        .chain(std::iter::once(AccountMeta {
            pubkey: instruction.program_id,
            is_signer: false,
            is_writable: false,
        }))
    {
        match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
            Some(existing) => {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            }
            None => metas.push(meta),
        }
    }

    metas.sort_by_key(|m| match (m.is_signer, m.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });
    // Stable sort keeps the payer at index 0 within writable signers

    let num_signers = metas.iter().filter(|m| m.is_signer).count() as u8;
    let num_readonly_signed = metas.iter().filter(|m| m.is_signer && !m.is_writable).count() as u8;
    let num_readonly_unsigned =
        metas.iter().filter(|m| !m.is_signer && !m.is_writable).count() as u8;

    let index_of = |key: &[u8; 32]| -> u8 {
        metas.iter().position(|m| &m.pubkey == key).unwrap() as u8
    };

    let mut message = Vec::new();
    message.push(num_signers);
    message.push(num_readonly_signed);
    message.push(num_readonly_unsigned);

    append_compact_u16(&mut message, metas.len() as u16);
    for meta in &metas {
        message.extend_from_slice(&meta.pubkey);
    }

    message.extend_from_slice(&recent_blockhash);

    append_compact_u16(&mut message, 1);
    message.push(index_of(&instruction.program_id));
    append_compact_u16(&mut message, instruction.accounts.len() as u16);
    for meta in &instruction.accounts {
        message.push(index_of(&meta.pubkey));
    }
    append_compact_u16(&mut message, instruction.data.len() as u16);
    message.extend_from_slice(&instruction.data);

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_u16_matches_shortvec_encoding() {
        let mut out = Vec::new();
        append_compact_u16(&mut out, 0);
        assert_eq!(out, [0x00]);

        out.clear();
        append_compact_u16(&mut out, 127);
        assert_eq!(out, [0x7f]);

        out.clear();
        append_compact_u16(&mut out, 128);
        assert_eq!(out, [0x80, 0x01]);

        out.clear();
        append_compact_u16(&mut out, 300);
        assert_eq!(out, [0xac, 0x02]);
    }

    #[test]
    fn transfer_data_layout() {
        let data = transfer_data(49_500_000_000);
        assert_eq!(data.len(), 12);
        assert_eq!(&data[..4], &[2, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(data[4..].try_into().unwrap()), 49_500_000_000);
    }

    #[test]
    fn anchor_discriminator_is_stable() {
        let a = anchor_discriminator("deposit_sol");
        let b = anchor_discriminator("deposit_sol");
        assert_eq!(a, b);
        assert_ne!(a, anchor_discriminator("withdraw_sol"));
    }

    #[test]
    fn keccak256_known_vector() {
        // keccak256 of the empty string
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn transfer_message_layout() {
        let payer = [1u8; 32];
        let to = [2u8; 32];
        let blockhash = [9u8; 32];

        let instruction = Instruction {
            program_id: SYSTEM_PROGRAM,
            accounts: vec![
                AccountMeta { pubkey: payer, is_signer: true, is_writable: true },
                AccountMeta { pubkey: to, is_signer: false, is_writable: true },
            ],
            data: transfer_data(500_000_000),
        };

        let message = build_message(payer, &instruction, blockhash);

        // Header: one signer, no readonly signers, one readonly unsigned
        // (the system program)
        assert_eq!(&message[..3], &[1, 0, 1]);
        // Three distinct accounts, payer first
        assert_eq!(message[3], 3);
        assert_eq!(&message[4..36], &payer);
        assert_eq!(&message[36..68], &to);
        assert_eq!(&message[68..100], &SYSTEM_PROGRAM);
        assert_eq!(&message[100..132], &blockhash);
        // One instruction against account index 2 (the program)
        assert_eq!(message[132], 1);
        assert_eq!(message[133], 2);
        // Two account indices: payer, recipient
        assert_eq!(&message[134..137], &[2, 0, 1]);
    }

    #[test]
    fn duplicate_accounts_are_merged_with_strongest_privileges() {
        let payer = [1u8; 32];
        let instruction = Instruction {
            program_id: SYSTEM_PROGRAM,
            accounts: vec![
                AccountMeta { pubkey: payer, is_signer: true, is_writable: true },
                // Self-transfer repeats the payer as a plain writable account
                AccountMeta { pubkey: payer, is_signer: false, is_writable: true },
            ],
            data: transfer_data(1),
        };

        let message = build_message(payer, &instruction, [0u8; 32]);
        // Payer deduped: two accounts total (payer + program)
        assert_eq!(message[3], 2);
        assert_eq!(&message[..3], &[1, 0, 1]);
    }
}
