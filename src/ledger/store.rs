//! PostgreSQL ledger store

use super::{EncryptedSecret, Ledger, SwapStats, SwapTransaction, UserWallet};
use crate::config::DatabaseConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::swap::{Direction, SwapStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// Ledger backed by PostgreSQL
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Create a new ledger store
    pub async fn new(config: &DatabaseConfig) -> OrchestratorResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await
            .map_err(OrchestratorError::Database)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> OrchestratorResult<()> {
        // In production, use sqlx::migrate!
        // For now, create tables inline

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id UUID PRIMARY KEY,
                direction VARCHAR(10) NOT NULL,
                status VARCHAR(30) NOT NULL,
                exchange_id VARCHAR(64),
                from_currency VARCHAR(16) NOT NULL,
                to_currency VARCHAR(16) NOT NULL,
                from_network VARCHAR(16) NOT NULL,
                to_network VARCHAR(16) NOT NULL,
                from_amount NUMERIC NOT NULL,
                to_amount NUMERIC,
                payin_address TEXT NOT NULL,
                payout_address TEXT NOT NULL,
                user_address TEXT NOT NULL,
                refund_hash TEXT,
                venue_tx_id TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_status
            ON transactions (status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_user
            ON transactions (user_address)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Owned by the user-management subsystem; created here only so a
        // fresh development database is usable
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_wallets (
                wallet_address TEXT PRIMARY KEY,
                cardano_address TEXT NOT NULL,
                solana_address TEXT NOT NULL,
                cardano_key_iv TEXT NOT NULL,
                cardano_key_ciphertext TEXT NOT NULL,
                cardano_key_tag TEXT NOT NULL,
                solana_key_iv TEXT NOT NULL,
                solana_key_ciphertext TEXT NOT NULL,
                solana_key_tag TEXT NOT NULL,
                venue_key_iv TEXT NOT NULL,
                venue_key_ciphertext TEXT NOT NULL,
                venue_key_tag TEXT NOT NULL,
                venue_account_id TEXT,
                auth_nonce TEXT,
                refresh_token_version INT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> OrchestratorResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(OrchestratorError::Database)?;
        Ok(())
    }

    fn map_transaction(row: &PgRow) -> OrchestratorResult<SwapTransaction> {
        let direction = Direction::parse(&row.get::<String, _>("direction"))?;
        let status = SwapStatus::parse(&row.get::<String, _>("status"))?;

        Ok(SwapTransaction {
            id: row.get::<Uuid, _>("id"),
            direction,
            status,
            exchange_id: row.get::<Option<String>, _>("exchange_id"),
            from_currency: row.get("from_currency"),
            to_currency: row.get("to_currency"),
            from_network: row.get("from_network"),
            to_network: row.get("to_network"),
            from_amount: row.get::<Decimal, _>("from_amount"),
            to_amount: row.get::<Option<Decimal>, _>("to_amount"),
            payin_address: row.get("payin_address"),
            payout_address: row.get("payout_address"),
            user_address: row.get("user_address"),
            refund_hash: row.get::<Option<String>, _>("refund_hash"),
            venue_tx_id: row.get::<Option<String>, _>("venue_tx_id"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        })
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn create(&self, tx: &SwapTransaction) -> OrchestratorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, direction, status, exchange_id, from_currency, to_currency,
                 from_network, to_network, from_amount, to_amount,
                 payin_address, payout_address, user_address,
                 refund_hash, venue_tx_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW())
            "#,
        )
        .bind(tx.id)
        .bind(tx.direction.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.exchange_id)
        .bind(&tx.from_currency)
        .bind(&tx.to_currency)
        .bind(&tx.from_network)
        .bind(&tx.to_network)
        .bind(tx.from_amount)
        .bind(tx.to_amount)
        .bind(&tx.payin_address)
        .bind(&tx.payout_address)
        .bind(&tx.user_address)
        .bind(&tx.refund_hash)
        .bind(&tx.venue_tx_id)
        .execute(&self.pool)
        .await?;

        debug!("Created swap row {} ({})", tx.id, tx.direction);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> OrchestratorResult<SwapTransaction> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::TransactionNotFound { tx_id: id.to_string() })?;

        Self::map_transaction(&row)
    }

    async fn get_by_wallet(
        &self,
        wallet_address: &str,
    ) -> OrchestratorResult<Vec<SwapTransaction>> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE user_address = $1 ORDER BY created_at DESC",
        )
        .bind(wallet_address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_transaction).collect()
    }

    async fn pending_with_status(
        &self,
        statuses: &[SwapStatus],
    ) -> OrchestratorResult<Vec<SwapTransaction>> {
        let status_strs: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE status = ANY($1) ORDER BY created_at ASC",
        )
        .bind(&status_strs)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_transaction).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        direction: Direction,
        from: SwapStatus,
        to: SwapStatus,
    ) -> OrchestratorResult<()> {
        if !from.can_transition(direction, to) {
            return Err(OrchestratorError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        // Compare-and-set on the expected prior status; a concurrent sweep
        // that already advanced the row makes this a stale no-op
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::StaleStatus {
                tx_id: id.to_string(),
                expected: from.to_string(),
            });
        }

        debug!("Swap {} transitioned {} -> {}", id, from, to);
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, direction: Direction) -> OrchestratorResult<()> {
        let terminal_success = match direction {
            Direction::Deposit => SwapStatus::VenueDepositConfirmed,
            Direction::Withdraw => SwapStatus::Completed,
        };

        sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status NOT IN ($1, $3)
            "#,
        )
        .bind(SwapStatus::Failed.as_str())
        .bind(id)
        .bind(terminal_success.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_exchange_order(
        &self,
        id: Uuid,
        exchange_id: &str,
        payin_address: &str,
    ) -> OrchestratorResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET exchange_id = $1, payin_address = $2, updated_at = NOW()
            WHERE id = $3 AND exchange_id IS NULL
            "#,
        )
        .bind(exchange_id)
        .bind(payin_address)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::Internal(format!(
                "Exchange order id already set on transaction {}",
                id
            )));
        }
        Ok(())
    }

    async fn set_to_amount(&self, id: Uuid, amount: Decimal) -> OrchestratorResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET to_amount = $1, updated_at = NOW()
            WHERE id = $2 AND to_amount IS NULL
            "#,
        )
        .bind(amount)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::Internal(format!(
                "to_amount already set on transaction {}",
                id
            )));
        }
        Ok(())
    }

    async fn set_funding_hash(&self, id: Uuid, tx_hash: &str) -> OrchestratorResult<()> {
        sqlx::query(
            "UPDATE transactions SET refund_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(tx_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_venue_tx_id(&self, id: Uuid, venue_tx_id: &str) -> OrchestratorResult<()> {
        sqlx::query(
            "UPDATE transactions SET venue_tx_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(venue_tx_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_wallet(&self, wallet_address: &str) -> OrchestratorResult<UserWallet> {
        let row = sqlx::query("SELECT * FROM user_wallets WHERE wallet_address = $1")
            .bind(wallet_address)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::WalletNotFound {
                wallet_address: wallet_address.to_string(),
            })?;

        Ok(UserWallet {
            wallet_address: row.get("wallet_address"),
            cardano_address: row.get("cardano_address"),
            solana_address: row.get("solana_address"),
            cardano_key: EncryptedSecret {
                iv: row.get("cardano_key_iv"),
                ciphertext: row.get("cardano_key_ciphertext"),
                auth_tag: row.get("cardano_key_tag"),
            },
            solana_key: EncryptedSecret {
                iv: row.get("solana_key_iv"),
                ciphertext: row.get("solana_key_ciphertext"),
                auth_tag: row.get("solana_key_tag"),
            },
            venue_key: EncryptedSecret {
                iv: row.get("venue_key_iv"),
                ciphertext: row.get("venue_key_ciphertext"),
                auth_tag: row.get("venue_key_tag"),
            },
            venue_account_id: row.get::<Option<String>, _>("venue_account_id"),
            auth_nonce: row.get::<Option<String>, _>("auth_nonce"),
            refresh_token_version: row.get::<i32, _>("refresh_token_version"),
        })
    }

    async fn stats(&self) -> OrchestratorResult<SwapStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status NOT IN
                    ('VENUE_DEPOSIT_CONFIRMED', 'COMPLETED', 'FAILED')) as in_flight,
                COUNT(*) FILTER (WHERE status IN
                    ('VENUE_DEPOSIT_CONFIRMED', 'COMPLETED')) as completed,
                COUNT(*) FILTER (WHERE status = 'FAILED') as failed
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SwapStats {
            in_flight: row.get::<i64, _>("in_flight") as u64,
            completed: row.get::<i64, _>("completed") as u64,
            failed: row.get::<i64, _>("failed") as u64,
        })
    }
}
