//! Financial operation storage.
//!
//! Every query is scoped to the owning user; there is no cross-user
//! access path at this layer. Amounts are stored in minor units (an
//! integer number of cents) to keep arithmetic exact.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// Kind of financial operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Income,
    Expense,
    Transfer,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Income => "income",
            OperationKind::Expense => "expense",
            OperationKind::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "income" => OperationKind::Income,
            "transfer" => OperationKind::Transfer,
            _ => OperationKind::Expense,
        }
    }
}

/// How the operation was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "cash" => PaymentMethod::Cash,
            "transfer" => PaymentMethod::Transfer,
            "other" => PaymentMethod::Other,
            _ => PaymentMethod::Card,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub id: i64,
    pub uuid: String,
    pub owner_id: i64,
    pub kind: OperationKind,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub description: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: i64,
    uuid: String,
    owner_id: i64,
    kind: String,
    amount_minor: i64,
    currency: String,
    payment_method: String,
    description: String,
    notes: String,
    occurred_at: DateTime<Utc>,
    created_at: String,
}

impl From<OperationRow> for Operation {
    fn from(row: OperationRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            owner_id: row.owner_id,
            kind: OperationKind::from_str(&row.kind),
            amount_minor: row.amount_minor,
            currency: row.currency,
            payment_method: PaymentMethod::from_str(&row.payment_method),
            description: row.description,
            notes: row.notes,
            occurred_at: row.occurred_at,
            created_at: row.created_at,
        }
    }
}

/// Filter for listing a user's operations.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub kind: Option<OperationKind>,
    pub currency: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: i64,
    pub page_size: i64,
}

const OPERATION_COLUMNS: &str = "id, uuid, owner_id, kind, amount_minor, currency, \
                                 payment_method, description, notes, occurred_at, created_at";

#[derive(Clone)]
pub struct OperationStore {
    pool: SqlitePool,
}

impl OperationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new operation for a user. Returns the row ID.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        uuid: &str,
        owner_id: i64,
        kind: OperationKind,
        amount_minor: i64,
        currency: &str,
        payment_method: PaymentMethod,
        description: &str,
        notes: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO operations
                (uuid, owner_id, kind, amount_minor, currency, payment_method,
                 description, notes, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(owner_id)
        .bind(kind.as_str())
        .bind(amount_minor)
        .bind(currency)
        .bind(payment_method.as_str())
        .bind(description)
        .bind(notes)
        .bind(occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get one of the owner's operations by UUID. Soft-deleted rows are
    /// invisible here.
    pub async fn get(
        &self,
        uuid: &str,
        owner_id: i64,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let row: Option<OperationRow> = sqlx::query_as(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations
             WHERE uuid = ? AND owner_id = ? AND deleted_at IS NULL"
        ))
        .bind(uuid)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Operation::from))
    }

    /// List the owner's operations, newest first.
    pub async fn list(
        &self,
        owner_id: i64,
        filter: &OperationFilter,
    ) -> Result<Vec<Operation>, sqlx::Error> {
        let page_size = if filter.page_size > 0 { filter.page_size } else { 50 };
        let offset = (filter.page.max(1) - 1) * page_size;

        let rows: Vec<OperationRow> = sqlx::query_as(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations
             WHERE owner_id = ? AND deleted_at IS NULL
               AND (? IS NULL OR kind = ?)
               AND (? IS NULL OR currency = ?)
               AND (? IS NULL OR occurred_at >= ?)
               AND (? IS NULL OR occurred_at <= ?)
             ORDER BY occurred_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.currency.as_deref())
        .bind(filter.currency.as_deref())
        .bind(filter.from)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.to)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Operation::from).collect())
    }

    /// Update an operation's mutable fields. `None` leaves a field
    /// unchanged. Returns false when the row is absent, deleted, or
    /// owned by someone else.
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        uuid: &str,
        owner_id: i64,
        amount_minor: Option<i64>,
        currency: Option<&str>,
        payment_method: Option<PaymentMethod>,
        description: Option<&str>,
        notes: Option<&str>,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations SET
                amount_minor = COALESCE(?, amount_minor),
                currency = COALESCE(?, currency),
                payment_method = COALESCE(?, payment_method),
                description = COALESCE(?, description),
                notes = COALESCE(?, notes),
                occurred_at = COALESCE(?, occurred_at),
                updated_at = datetime('now')
             WHERE uuid = ? AND owner_id = ? AND deleted_at IS NULL",
        )
        .bind(amount_minor)
        .bind(currency)
        .bind(payment_method.map(|m| m.as_str()))
        .bind(description)
        .bind(notes)
        .bind(occurred_at)
        .bind(uuid)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete an operation. Returns false if already deleted or absent.
    pub async fn soft_delete(&self, uuid: &str, owner_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations SET deleted_at = ?, updated_at = datetime('now')
             WHERE uuid = ? AND owner_id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(uuid)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted operation.
    pub async fn restore(&self, uuid: &str, owner_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations SET deleted_at = NULL, updated_at = datetime('now')
             WHERE uuid = ? AND owner_id = ? AND deleted_at IS NOT NULL",
        )
        .bind(uuid)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
