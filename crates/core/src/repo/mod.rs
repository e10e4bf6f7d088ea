//! Bank data access. Tools talk to this trait, never to SQL directly.

pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub account_id: i64,
    pub customer_id: i64,
    pub account_type: String,
    pub balance: f64,
    pub currency: String,
    pub iban: String,
    pub status: String,
    pub created_at: String,
}

impl Account {
    /// Last four digits of the IBAN, for masked display.
    pub fn iban_tail(&self) -> &str {
        let n = self.iban.len();
        if n >= 4 { &self.iban[n - 4..] } else { &self.iban }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Card {
    pub card_id: i64,
    pub customer_id: i64,
    pub card_type: String,
    pub credit_limit: f64,
    pub current_debt: f64,
    /// Day of month the statement cuts.
    pub statement_day: i64,
    /// Day of month the payment is due.
    pub due_day: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Txn {
    pub txn_id: i64,
    pub account_id: i64,
    pub amount: f64,
    pub txn_type: String,
    pub txn_date: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FxRate {
    pub code: String,
    pub buy: f64,
    pub sell: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InterestRate {
    pub product: String,
    pub rate_apy: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Fee {
    pub service_code: String,
    pub description: String,
    /// JSON-encoded pricing detail, stored as text.
    pub pricing_json: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BranchAtm {
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub city: String,
    pub district: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait BankRepo: Send + Sync {
    async fn get_account(&self, account_id: i64) -> Result<Option<Account>, sqlx::Error>;

    async fn accounts_by_customer(&self, customer_id: i64) -> Result<Vec<Account>, sqlx::Error>;

    /// Card details scoped to the owning customer. A card owned by
    /// someone else reads as absent.
    async fn card_details(
        &self,
        card_id: i64,
        customer_id: i64,
    ) -> Result<Option<Card>, sqlx::Error>;

    async fn cards_for_customer(&self, customer_id: i64) -> Result<Vec<Card>, sqlx::Error>;

    async fn list_transactions(
        &self,
        account_id: i64,
        from_date: Option<&str>,
        to_date: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Txn>, sqlx::Error>;

    /// Append-only audit record of a transaction listing.
    async fn save_transaction_snapshot(
        &self,
        account_id: i64,
        from_date: Option<&str>,
        to_date: Option<&str>,
        limit: i64,
        count: usize,
    ) -> Result<i64, sqlx::Error>;

    async fn fx_rates(&self) -> Result<Vec<FxRate>, sqlx::Error>;

    async fn interest_rates(&self) -> Result<Vec<InterestRate>, sqlx::Error>;

    async fn get_fee(&self, service_code: &str) -> Result<Option<Fee>, sqlx::Error>;

    async fn list_fees(&self) -> Result<Vec<Fee>, sqlx::Error>;

    async fn find_branch_atm(
        &self,
        city: &str,
        district: Option<&str>,
        kind: Option<&str>,
        limit: i64,
    ) -> Result<Vec<BranchAtm>, sqlx::Error>;
}
