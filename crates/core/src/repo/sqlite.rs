//! SQLite-backed repository with inline schema bootstrap and a demo
//! data seed for local runs and tests.

use super::{Account, BankRepo, BranchAtm, Card, Fee, FxRate, InterestRate, Txn};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    account_id   INTEGER PRIMARY KEY,
    customer_id  INTEGER NOT NULL,
    account_type TEXT NOT NULL DEFAULT 'vadesiz',
    balance      REAL NOT NULL DEFAULT 0,
    currency     TEXT NOT NULL DEFAULT 'TRY',
    iban         TEXT NOT NULL DEFAULT '',
    status       TEXT NOT NULL DEFAULT 'active',
    created_at   TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_accounts_customer ON accounts(customer_id);

CREATE TABLE IF NOT EXISTS cards (
    card_id       INTEGER PRIMARY KEY,
    customer_id   INTEGER NOT NULL,
    card_type     TEXT NOT NULL DEFAULT 'credit',
    credit_limit  REAL NOT NULL DEFAULT 0,
    current_debt  REAL NOT NULL DEFAULT 0,
    statement_day INTEGER NOT NULL DEFAULT 1,
    due_day       INTEGER NOT NULL DEFAULT 10,
    status        TEXT NOT NULL DEFAULT 'active'
);
CREATE INDEX IF NOT EXISTS idx_cards_customer ON cards(customer_id);

CREATE TABLE IF NOT EXISTS txns (
    txn_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id  INTEGER NOT NULL,
    amount      REAL NOT NULL,
    txn_type    TEXT NOT NULL,
    txn_date    TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_txns_account_date ON txns(account_id, txn_date);

CREATE TABLE IF NOT EXISTS txn_snapshots (
    snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id  INTEGER NOT NULL,
    from_date   TEXT,
    to_date     TEXT,
    query_limit INTEGER NOT NULL,
    txn_count   INTEGER NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS fx_rates (
    code       TEXT PRIMARY KEY,
    buy        REAL NOT NULL,
    sell       REAL NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS interest_rates (
    product    TEXT PRIMARY KEY,
    rate_apy   REAL NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS fees (
    service_code TEXT PRIMARY KEY,
    description  TEXT NOT NULL,
    pricing_json TEXT NOT NULL DEFAULT '{}',
    updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS branch_atm (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    kind      TEXT NOT NULL,
    name      TEXT NOT NULL,
    city      TEXT NOT NULL,
    district  TEXT,
    address   TEXT NOT NULL DEFAULT '',
    latitude  REAL,
    longitude REAL
);
"#;

const DEMO_SEED: &str = r#"
INSERT OR IGNORE INTO accounts (account_id, customer_id, account_type, balance, currency, iban) VALUES
    (1, 1, 'vadesiz', 15423.50, 'TRY', 'TR330006100519786457841326'),
    (2, 1, 'vadesiz',  2150.00, 'USD', 'TR560006200000000012345678'),
    (3, 1, 'vadeli',  80000.00, 'TRY', 'TR980006200000000087654321'),
    (4, 2, 'vadesiz',   999.99, 'TRY', 'TR120006200000000011112222');

INSERT OR IGNORE INTO cards (card_id, customer_id, card_type, credit_limit, current_debt, statement_day, due_day) VALUES
    (1, 1, 'credit', 30000.0, 4521.75, 1, 11),
    (2, 2, 'credit', 10000.0,  230.00, 15, 25);

INSERT OR IGNORE INTO txns (account_id, amount, txn_type, txn_date, description) VALUES
    (1, -249.90, 'pos',      date('now', '-1 day'),  'Market alışverişi'),
    (1, -120.00, 'eft',      date('now', '-3 day'),  'EFT gönderimi'),
    (1, 8500.00, 'transfer', date('now', '-12 day'), 'Maaş ödemesi'),
    (2,  -75.50, 'pos',      date('now', '-2 day'),  'Abonelik'),
    (3, 1200.00, 'interest', date('now', '-30 day'), 'Vade faiz tahakkuku');

INSERT OR IGNORE INTO fx_rates (code, buy, sell) VALUES
    ('USD', 41.05, 41.32),
    ('EUR', 47.80, 48.15),
    ('GBP', 55.40, 55.92);

INSERT OR IGNORE INTO interest_rates (product, rate_apy) VALUES
    ('vadeli_mevduat', 44.0),
    ('ihtiyac_kredisi', 59.9),
    ('konut_kredisi', 33.6);

INSERT OR IGNORE INTO fees (service_code, description, pricing_json) VALUES
    ('eft',    'EFT işlem ücreti',          '{"per_txn": 7.5, "currency": "TRY"}'),
    ('havale', 'Havale işlem ücreti',       '{"per_txn": 4.0, "currency": "TRY"}'),
    ('fast',   'FAST anlık transfer ücreti','{"per_txn": 2.5, "currency": "TRY"}'),
    ('swift',  'SWIFT yurt dışı transferi', '{"per_txn": 35.0, "currency": "USD"}'),
    ('kredi_karti_yillik', 'Kredi kartı yıllık ücreti', '{"annual": 960.0, "currency": "TRY"}');

INSERT OR IGNORE INTO branch_atm (id, kind, name, city, district, address) VALUES
    (1, 'branch', 'Kadıköy Şubesi',  'İstanbul', 'Kadıköy',  'Bahariye Cad. 12'),
    (2, 'atm',    'Kadıköy İskele ATM', 'İstanbul', 'Kadıköy', 'Rıhtım Cad. 3'),
    (3, 'branch', 'Levent Şubesi',   'İstanbul', 'Beşiktaş', 'Büyükdere Cad. 101'),
    (4, 'atm',    'Kızılay ATM',     'Ankara',   'Çankaya',  'Atatürk Blv. 55'),
    (5, 'branch', 'Alsancak Şubesi', 'İzmir',    'Konak',    'Kıbrıs Şehitleri Cad. 8');
"#;

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Open (or create) a database file and apply the schema.
    pub async fn connect(path: &Path) -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database. Single connection so every query sees the
    /// same memory store.
    pub async fn connect_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Load the demo dataset. Idempotent.
    pub async fn seed_demo(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(DEMO_SEED).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl BankRepo for SqliteRepo {
    async fn get_account(&self, account_id: i64) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn accounts_by_customer(&self, customer_id: i64) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE customer_id = ? ORDER BY account_id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn card_details(
        &self,
        card_id: i64,
        customer_id: i64,
    ) -> Result<Option<Card>, sqlx::Error> {
        sqlx::query_as::<_, Card>(
            "SELECT * FROM cards WHERE card_id = ? AND customer_id = ?",
        )
        .bind(card_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn cards_for_customer(&self, customer_id: i64) -> Result<Vec<Card>, sqlx::Error> {
        sqlx::query_as::<_, Card>(
            "SELECT * FROM cards WHERE customer_id = ? ORDER BY card_id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_transactions(
        &self,
        account_id: i64,
        from_date: Option<&str>,
        to_date: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Txn>, sqlx::Error> {
        let mut sql = String::from("SELECT * FROM txns WHERE account_id = ?");
        if from_date.is_some() {
            sql.push_str(" AND txn_date >= ?");
        }
        if to_date.is_some() {
            sql.push_str(" AND txn_date <= ?");
        }
        sql.push_str(" ORDER BY txn_date DESC, txn_id DESC LIMIT ?");

        let mut q = sqlx::query_as::<_, Txn>(&sql).bind(account_id);
        if let Some(from) = from_date {
            q = q.bind(from);
        }
        if let Some(to) = to_date {
            q = q.bind(to);
        }
        q.bind(limit).fetch_all(&self.pool).await
    }

    async fn save_transaction_snapshot(
        &self,
        account_id: i64,
        from_date: Option<&str>,
        to_date: Option<&str>,
        limit: i64,
        count: usize,
    ) -> Result<i64, sqlx::Error> {
        let res = sqlx::query(
            "INSERT INTO txn_snapshots (account_id, from_date, to_date, query_limit, txn_count) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(account_id)
        .bind(from_date)
        .bind(to_date)
        .bind(limit)
        .bind(count as i64)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn fx_rates(&self) -> Result<Vec<FxRate>, sqlx::Error> {
        sqlx::query_as::<_, FxRate>("SELECT * FROM fx_rates ORDER BY code")
            .fetch_all(&self.pool)
            .await
    }

    async fn interest_rates(&self) -> Result<Vec<InterestRate>, sqlx::Error> {
        sqlx::query_as::<_, InterestRate>("SELECT * FROM interest_rates ORDER BY product")
            .fetch_all(&self.pool)
            .await
    }

    async fn get_fee(&self, service_code: &str) -> Result<Option<Fee>, sqlx::Error> {
        sqlx::query_as::<_, Fee>(
            "SELECT * FROM fees WHERE service_code = ? COLLATE NOCASE",
        )
        .bind(service_code)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_fees(&self) -> Result<Vec<Fee>, sqlx::Error> {
        sqlx::query_as::<_, Fee>("SELECT * FROM fees ORDER BY service_code")
            .fetch_all(&self.pool)
            .await
    }

    async fn find_branch_atm(
        &self,
        city: &str,
        district: Option<&str>,
        kind: Option<&str>,
        limit: i64,
    ) -> Result<Vec<BranchAtm>, sqlx::Error> {
        // Turkish dotted/dotless I breaks SQL LOWER(), so matching
        // happens in Rust over a bounded scan.
        let rows = sqlx::query_as::<_, BranchAtm>(
            "SELECT * FROM branch_atm ORDER BY city, district, name LIMIT 500",
        )
        .fetch_all(&self.pool)
        .await?;

        let city_needle = fold(city);
        let district_needle = district.map(fold);
        let mut hits: Vec<BranchAtm> = rows
            .into_iter()
            .filter(|r| fold(&r.city).contains(&city_needle))
            .filter(|r| match &district_needle {
                Some(d) => r
                    .district
                    .as_deref()
                    .map(|rd| fold(rd).contains(d))
                    .unwrap_or(false),
                None => true,
            })
            .filter(|r| match kind {
                Some(k) => r.kind.eq_ignore_ascii_case(k),
                None => true,
            })
            .collect();
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}

/// Case folding that also collapses Turkish dotted/dotless I.
fn fold(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'İ' => 'i',
            'I' => 'ı',
            _ => c,
        })
        .collect::<String>()
        .to_lowercase()
}
