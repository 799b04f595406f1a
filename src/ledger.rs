use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{AppError, Result};
use crate::models::{PaymentMethod, Transaction, TransactionType};
use crate::schedule::YearMonth;
use crate::validation;

const COLUMNS: &str = "id, user_id, type, amount, description, date, payment_method, category";

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        txn_type: row.get(2)?,
        amount: row.get(3)?,
        description: row.get(4)?,
        date: row.get(5)?,
        payment_method: row.get(6)?,
        category: row.get(7)?,
    })
}

#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub txn_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub category: String,
}

pub fn normalize_category(category: &str) -> String {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        "General".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn add(conn: &Connection, user_id: i64, input: &TransactionInput) -> Result<Transaction> {
    insert(conn, user_id, input, None)
}

pub(crate) fn insert(
    conn: &Connection,
    user_id: i64,
    input: &TransactionInput,
    import_id: Option<i64>,
) -> Result<Transaction> {
    validation::require_text("Description", &input.description)?;
    validation::positive_amount("Amount", input.amount)?;
    let category = normalize_category(&input.category);

    conn.execute(
        "INSERT INTO transactions (user_id, type, amount, description, date, payment_method, category, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            user_id,
            input.txn_type,
            input.amount,
            input.description.trim(),
            input.date,
            input.payment_method,
            category,
            import_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::debug!("ledger {id}: {} {} on {}", input.txn_type, input.amount, input.date);
    get(conn, user_id, id)
}

pub fn get(conn: &Connection, user_id: i64, id: i64) -> Result<Transaction> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM transactions WHERE id = ?1 AND user_id = ?2"),
        [id, user_id],
        row_to_transaction,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Transaction", id))
}

#[derive(Debug, Default, Clone)]
pub struct LedgerFilter {
    pub txn_type: Option<TransactionType>,
    pub month: Option<YearMonth>,
    pub category: Option<String>,
}

pub fn list(conn: &Connection, user_id: i64, filter: &LedgerFilter) -> Result<Vec<Transaction>> {
    let (from, to) = match filter.month {
        Some(m) => (Some(m.first_date()), Some(m.last_date())),
        None => (None, None),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transactions \
         WHERE user_id = ?1 \
         AND (?2 IS NULL OR type = ?2) \
         AND (?3 IS NULL OR date BETWEEN ?3 AND ?4) \
         AND (?5 IS NULL OR category = ?5 COLLATE NOCASE) \
         ORDER BY date DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![user_id, filter.txn_type, from, to, filter.category],
            row_to_transaction,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, user_id: i64, id: i64) -> Result<Transaction> {
    let txn = get(conn, user_id, id)?;
    conn.execute("DELETE FROM transactions WHERE id = ?1 AND user_id = ?2", [id, user_id])?;
    log::info!("deleted ledger transaction {id}");
    Ok(txn)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

/// Income and expense totals for `[from, to]` inclusive.
pub fn totals_between(conn: &Connection, user_id: i64, from: NaiveDate, to: NaiveDate) -> Result<Totals> {
    let (income, expense): (f64, f64) = conn.query_row(
        "SELECT \
         COALESCE(SUM(CASE WHEN type = 'income' THEN amount ELSE 0 END), 0), \
         COALESCE(SUM(CASE WHEN type = 'expense' THEN amount ELSE 0 END), 0) \
         FROM transactions WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3",
        rusqlite::params![user_id, from, to],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(Totals {
        income,
        expense,
        net: income - expense,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::users;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn input(txn_type: TransactionType, amount: f64, date: NaiveDate, category: &str) -> TransactionInput {
        TransactionInput {
            txn_type,
            amount,
            description: "Entry".to_string(),
            date,
            payment_method: PaymentMethod::Upi,
            category: category.to_string(),
        }
    }

    fn setup() -> (tempfile::TempDir, Connection, i64) {
        let (dir, conn) = test_db();
        let user = users::register(&conn, "Asha", "asha@example.com", 0.0, "INR").unwrap();
        (dir, conn, user.id)
    }

    #[test]
    fn test_add_defaults_blank_category() {
        let (_dir, conn, uid) = setup();
        let t = add(&conn, uid, &input(TransactionType::Expense, 250.0, d(2025, 1, 2), "  ")).unwrap();
        assert_eq!(t.category, "General");
        assert_eq!(t.payment_method, PaymentMethod::Upi);
    }

    #[test]
    fn test_add_rejects_non_positive_amount() {
        let (_dir, conn, uid) = setup();
        assert!(add(&conn, uid, &input(TransactionType::Income, 0.0, d(2025, 1, 2), "Salary")).is_err());
    }

    #[test]
    fn test_list_filters() {
        let (_dir, conn, uid) = setup();
        add(&conn, uid, &input(TransactionType::Income, 90000.0, d(2025, 1, 1), "Salary")).unwrap();
        add(&conn, uid, &input(TransactionType::Expense, 1200.0, d(2025, 1, 15), "Groceries")).unwrap();
        add(&conn, uid, &input(TransactionType::Expense, 800.0, d(2025, 2, 3), "groceries")).unwrap();

        assert_eq!(list(&conn, uid, &LedgerFilter::default()).unwrap().len(), 3);

        let jan = LedgerFilter {
            month: Some(YearMonth { year: 2025, month: 1 }),
            ..Default::default()
        };
        assert_eq!(list(&conn, uid, &jan).unwrap().len(), 2);

        let expenses = LedgerFilter {
            txn_type: Some(TransactionType::Expense),
            category: Some("GROCERIES".to_string()),
            ..Default::default()
        };
        let rows = list(&conn, uid, &expenses).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].date, d(2025, 2, 3));
    }

    #[test]
    fn test_totals_between() {
        let (_dir, conn, uid) = setup();
        add(&conn, uid, &input(TransactionType::Income, 1000.0, d(2025, 3, 1), "Salary")).unwrap();
        add(&conn, uid, &input(TransactionType::Expense, 300.0, d(2025, 3, 31), "Rent")).unwrap();
        add(&conn, uid, &input(TransactionType::Expense, 50.0, d(2025, 4, 1), "Food")).unwrap();
        let t = totals_between(&conn, uid, d(2025, 3, 1), d(2025, 3, 31)).unwrap();
        assert_eq!(t, Totals { income: 1000.0, expense: 300.0, net: 700.0 });
        let empty = totals_between(&conn, uid, d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert_eq!(empty.net, 0.0);
    }

    #[test]
    fn test_delete() {
        let (_dir, conn, uid) = setup();
        let t = add(&conn, uid, &input(TransactionType::Expense, 10.0, d(2025, 1, 1), "Misc")).unwrap();
        delete(&conn, uid, t.id).unwrap();
        assert!(matches!(get(&conn, uid, t.id).unwrap_err(), AppError::NotFound { .. }));
    }
}
