use std::{future::Future, pin::Pin, time::Duration};

use sea_orm::{
    DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait, Select,
    TransactionTrait,
};

use crate::{LedgerError, MoneyCents, PageMetadata, PageRequest, ResultLedger, SharePolicy};

mod access;
mod balances;
mod expenses;
mod memberships;
mod settlements;
mod shares;

pub use expenses::{ExpenseFilter, ExpenseSort, NewExpense, UpdateExpense};
pub use settlements::{NewSettlement, SettlementSort};
pub use shares::{ShareSort, UpdateShare};

/// Upper bound for a single ledger operation, transaction included.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

const MAX_DESCRIPTION_BYTES: usize = 500;

type TxFuture<'a, T> = Pin<Box<dyn Future<Output = ResultLedger<T>> + Send + 'a>>;

#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    op_timeout: Duration,
    share_policy: SharePolicy,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub fn share_policy(&self) -> SharePolicy {
        self.share_policy
    }

    /// Runs `f` inside one DB transaction bounded by the operation timeout.
    ///
    /// Commits on `Ok`. On error or timeout the transaction is dropped, which
    /// rolls it back.
    async fn with_tx<T, F>(&self, f: F) -> ResultLedger<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a Ledger, &'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
    {
        let work = async {
            let db_tx = self
                .database
                .begin()
                .await
                .map_err(|err| LedgerError::from_store(err, "transaction"))?;
            let value = f(self, &db_tx).await?;
            db_tx
                .commit()
                .await
                .map_err(|err| LedgerError::from_store(err, "transaction"))?;
            Ok(value)
        };

        match tokio::time::timeout(self.op_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "ledger operation timed out"
                );
                Err(LedgerError::Transient(format!(
                    "operation exceeded {} ms",
                    self.op_timeout.as_millis()
                )))
            }
        }
    }
}

fn normalize_required_name(value: &str, field: &str) -> ResultLedger<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::invalid_input(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(value: &str) -> ResultLedger<String> {
    let description = normalize_required_name(value, "description")?;
    if description.len() > MAX_DESCRIPTION_BYTES {
        return Err(LedgerError::invalid_input(
            "description",
            format!("must not be more than {MAX_DESCRIPTION_BYTES} bytes long"),
        ));
    }
    Ok(description)
}

fn require_positive(amount: MoneyCents, what: &str) -> ResultLedger<()> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(format!(
            "{what} must be positive"
        )));
    }
    Ok(())
}

/// Fetches one page of `query` together with its metadata.
async fn paginate<E>(
    db: &DatabaseTransaction,
    query: Select<E>,
    page: &PageRequest,
) -> ResultLedger<(Vec<E::Model>, PageMetadata)>
where
    E: EntityTrait,
    E::Model: Sync + 'static,
{
    page.validate()?;
    let paginator = query.paginate(db, page.page_size);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page.index()).await?;
    Ok((rows, PageMetadata::new(total, page.page, page.page_size)))
}

/// The builder for `Ledger`
pub struct LedgerBuilder {
    database: DatabaseConnection,
    op_timeout: Duration,
    share_policy: SharePolicy,
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            op_timeout: DEFAULT_OP_TIMEOUT,
            share_policy: SharePolicy::default(),
        }
    }
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> LedgerBuilder {
        self.op_timeout = timeout;
        self
    }

    pub fn share_policy(mut self, policy: SharePolicy) -> LedgerBuilder {
        self.share_policy = policy;
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> ResultLedger<Ledger> {
        if self.op_timeout.is_zero() {
            return Err(LedgerError::invalid_input(
                "op_timeout",
                "must be greater than zero",
            ));
        }
        Ok(Ledger {
            database: self.database,
            op_timeout: self.op_timeout,
            share_policy: self.share_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_trimmed_and_bounded() {
        assert_eq!(normalize_description("  lunch ").unwrap(), "lunch");
        assert!(normalize_description("   ").is_err());
        let long = "x".repeat(MAX_DESCRIPTION_BYTES + 1);
        assert!(matches!(
            normalize_description(&long),
            Err(LedgerError::InvalidInput { ref field, .. }) if field == "description"
        ));
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let result = Ledger::builder().op_timeout(Duration::ZERO).build().await;
        assert!(result.is_err());
    }
}
