use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{
    Payment, PaymentCategory, PaymentKind, PaymentStatus, PaymentTransaction, TxnStatus,
};
use crate::schedule::{self, Remaining};
use crate::validation;

const COLUMNS: &str = "id, user_id, name, emi_type, category, amount, emi_day, start_date, \
                       end_date, paid_count, status, notes";

const TXN_COLUMNS: &str = "id, payment_id, payment_date, amount, status";

fn row_to_payment(row: &Row) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        emi_type: row.get(3)?,
        category: row.get(4)?,
        amount: row.get(5)?,
        emi_day: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        paid_count: row.get(9)?,
        status: row.get(10)?,
        notes: row.get(11)?,
    })
}

fn row_to_txn(row: &Row) -> rusqlite::Result<PaymentTransaction> {
    Ok(PaymentTransaction {
        id: row.get(0)?,
        payment_id: row.get(1)?,
        payment_date: row.get(2)?,
        amount: row.get(3)?,
        status: row.get(4)?,
    })
}

#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub name: String,
    pub emi_type: PaymentKind,
    pub category: PaymentCategory,
    pub amount: f64,
    pub emi_day: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub paid_count: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct PaymentUpdate {
    pub name: Option<String>,
    /// Switching to `recurring` drops the end date.
    pub emi_type: Option<PaymentKind>,
    pub category: Option<PaymentCategory>,
    pub amount: Option<f64>,
    pub emi_day: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub paid_count: Option<u32>,
    pub status: Option<PaymentStatus>,
    pub notes: Option<String>,
}

fn validate(p: &Payment) -> Result<()> {
    validation::require_text("Name", &p.name)?;
    validation::positive_amount("Amount", p.amount)?;
    validation::emi_day(p.emi_day)?;
    validation::payment_schedule(p.emi_type, p.start_date, p.end_date)?;
    Ok(())
}

/// Total scheduled occurrences, `None` for recurring payments.
pub fn total_occurrences(p: &Payment) -> Option<u32> {
    match (p.emi_type, p.end_date) {
        (PaymentKind::Ending, Some(end)) => {
            Some(schedule::count_occurrences(p.start_date, end, p.emi_day))
        }
        _ => None,
    }
}

fn refresh_status(p: &mut Payment) {
    let finished = total_occurrences(p).is_some_and(|total| p.paid_count >= total);
    if finished {
        p.status = PaymentStatus::Completed;
    } else if p.status == PaymentStatus::Completed {
        p.status = PaymentStatus::Active;
    }
}

pub fn pending_count(p: &Payment, today: NaiveDate) -> u32 {
    schedule::pending_count(p.start_date, p.end_date, p.emi_day, p.paid_count, today)
}

pub fn remaining(p: &Payment) -> Remaining {
    schedule::remaining_installments(p.emi_type, p.start_date, p.end_date, p.emi_day, p.paid_count)
}

pub fn next_due(p: &Payment) -> Option<NaiveDate> {
    if p.status == PaymentStatus::Completed {
        return None;
    }
    schedule::next_due(p.start_date, p.end_date, p.emi_day, p.paid_count)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    #[serde(flatten)]
    pub payment: Payment,
    pub pending: u32,
    pub remaining: Remaining,
    pub next_due: Option<NaiveDate>,
}

pub fn summarize(p: Payment, today: NaiveDate) -> PaymentSummary {
    PaymentSummary {
        pending: pending_count(&p, today),
        remaining: remaining(&p),
        next_due: next_due(&p),
        payment: p,
    }
}

pub fn create(conn: &Connection, user_id: i64, input: &PaymentInput) -> Result<Payment> {
    let mut p = Payment {
        id: 0,
        user_id,
        name: input.name.trim().to_string(),
        emi_type: input.emi_type,
        category: input.category,
        amount: input.amount,
        emi_day: input.emi_day,
        start_date: input.start_date,
        end_date: input.end_date,
        paid_count: input.paid_count,
        status: PaymentStatus::Active,
        notes: input.notes.clone(),
    };
    validate(&p)?;
    refresh_status(&mut p);

    conn.execute(
        "INSERT INTO payments (user_id, name, emi_type, category, amount, emi_day, start_date, \
         end_date, paid_count, status, notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            p.user_id,
            p.name,
            p.emi_type,
            p.category,
            p.amount,
            p.emi_day,
            p.start_date,
            p.end_date,
            p.paid_count,
            p.status,
            p.notes,
        ],
    )?;
    p.id = conn.last_insert_rowid();
    log::info!("created {} payment {} '{}' for user {user_id}", p.emi_type, p.id, p.name);
    Ok(p)
}

fn save(conn: &Connection, p: &Payment) -> Result<()> {
    conn.execute(
        "UPDATE payments SET name = ?1, emi_type = ?2, category = ?3, amount = ?4, emi_day = ?5, \
         start_date = ?6, end_date = ?7, paid_count = ?8, status = ?9, notes = ?10 \
         WHERE id = ?11 AND user_id = ?12",
        rusqlite::params![
            p.name,
            p.emi_type,
            p.category,
            p.amount,
            p.emi_day,
            p.start_date,
            p.end_date,
            p.paid_count,
            p.status,
            p.notes,
            p.id,
            p.user_id,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, user_id: i64, id: i64) -> Result<Payment> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM payments WHERE id = ?1 AND user_id = ?2"),
        [id, user_id],
        row_to_payment,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Payment", id))
}

pub fn list(conn: &Connection, user_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payments WHERE user_id = ?1 ORDER BY status, emi_day, name"
    ))?;
    let rows = stmt
        .query_map([user_id], row_to_payment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update(conn: &Connection, user_id: i64, id: i64, update: &PaymentUpdate) -> Result<Payment> {
    let mut p = get(conn, user_id, id)?;
    if let Some(name) = &update.name {
        p.name = name.trim().to_string();
    }
    if let Some(kind) = update.emi_type {
        p.emi_type = kind;
        if kind == PaymentKind::Recurring {
            p.end_date = None;
        }
    }
    if let Some(category) = update.category {
        p.category = category;
    }
    if let Some(amount) = update.amount {
        p.amount = amount;
    }
    if let Some(day) = update.emi_day {
        p.emi_day = day;
    }
    if let Some(start) = update.start_date {
        p.start_date = start;
    }
    if let Some(end) = update.end_date {
        p.end_date = Some(end);
    }
    if let Some(paid) = update.paid_count {
        p.paid_count = paid;
    }
    if let Some(status) = update.status {
        p.status = status;
    }
    if let Some(notes) = &update.notes {
        p.notes = if notes.trim().is_empty() { None } else { Some(notes.clone()) };
    }
    validate(&p)?;
    refresh_status(&mut p);
    save(conn, &p)?;
    log::info!("updated payment {id}");
    Ok(p)
}

pub fn delete(conn: &Connection, user_id: i64, id: i64) -> Result<Payment> {
    let p = get(conn, user_id, id)?;
    conn.execute("DELETE FROM payments WHERE id = ?1 AND user_id = ?2", [id, user_id])?;
    log::info!("deleted payment {id} '{}'", p.name);
    Ok(p)
}

pub fn history(conn: &Connection, user_id: i64, payment_id: i64) -> Result<Vec<PaymentTransaction>> {
    get(conn, user_id, payment_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {TXN_COLUMNS} FROM payment_transactions WHERE payment_id = ?1 \
         ORDER BY payment_date DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map([payment_id], row_to_txn)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn get_txn(conn: &Connection, id: i64) -> Result<PaymentTransaction> {
    conn.query_row(
        &format!("SELECT {TXN_COLUMNS} FROM payment_transactions WHERE id = ?1"),
        [id],
        row_to_txn,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Payment transaction", id))
}

fn earliest_pending(conn: &Connection, payment_id: i64) -> Result<Option<PaymentTransaction>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {TXN_COLUMNS} FROM payment_transactions \
                 WHERE payment_id = ?1 AND status = 'pending' ORDER BY payment_date, id LIMIT 1"
            ),
            [payment_id],
            row_to_txn,
        )
        .optional()?)
}

/// Records one payment. The oldest pending transaction is settled when one
/// exists, otherwise a new paid transaction is written. `amount` defaults
/// to the scheduled amount.
pub fn record_payment(
    conn: &Connection,
    user_id: i64,
    id: i64,
    paid_on: NaiveDate,
    amount: Option<f64>,
) -> Result<(Payment, PaymentTransaction)> {
    let mut p = get(conn, user_id, id)?;
    if p.status == PaymentStatus::Completed {
        return Err(AppError::Validation(format!("Payment '{}' is already completed", p.name)));
    }
    let amount = amount.unwrap_or(p.amount);
    validation::positive_amount("Amount", amount)?;

    let tx = conn.unchecked_transaction()?;
    let txn_id = match earliest_pending(&tx, p.id)? {
        Some(pending) => {
            tx.execute(
                "UPDATE payment_transactions SET status = 'paid', amount = ?1 WHERE id = ?2",
                rusqlite::params![amount, pending.id],
            )?;
            pending.id
        }
        None => {
            tx.execute(
                "INSERT INTO payment_transactions (payment_id, payment_date, amount, status) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![p.id, paid_on, amount, TxnStatus::Paid],
            )?;
            tx.last_insert_rowid()
        }
    };
    p.paid_count += 1;
    refresh_status(&mut p);
    save(&tx, &p)?;
    tx.commit()?;

    log::info!("recorded payment {} for '{}' ({} paid)", txn_id, p.name, p.paid_count);
    let txn = get_txn(conn, txn_id)?;
    Ok((p, txn))
}

/// Writes a pending transaction for every occurrence due by `today` that is
/// neither covered by `paid_count` nor already on file. Safe to repeat.
pub fn sync_pending(
    conn: &Connection,
    user_id: i64,
    id: i64,
    today: NaiveDate,
) -> Result<Vec<PaymentTransaction>> {
    let p = get(conn, user_id, id)?;
    if p.status != PaymentStatus::Active {
        log::debug!("skipping sync of {} payment {id}", p.status);
        return Ok(Vec::new());
    }
    let until = p.end_date.map_or(today, |e| e.min(today));
    let due = schedule::occurrences(p.start_date, until, p.emi_day);

    let tx = conn.unchecked_transaction()?;
    let mut created = Vec::new();
    {
        let mut exists = tx.prepare_cached(
            "SELECT 1 FROM payment_transactions WHERE payment_id = ?1 AND payment_date = ?2",
        )?;
        for date in due.into_iter().skip(p.paid_count as usize) {
            if exists.exists(rusqlite::params![p.id, date])? {
                continue;
            }
            tx.execute(
                "INSERT INTO payment_transactions (payment_id, payment_date, amount, status) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![p.id, date, p.amount, TxnStatus::Pending],
            )?;
            created.push(tx.last_insert_rowid());
        }
    }
    tx.commit()?;

    if !created.is_empty() {
        log::info!("queued {} pending transactions for payment {id}", created.len());
    }
    created.into_iter().map(|txn_id| get_txn(conn, txn_id)).collect()
}

/// Settles a pending transaction and counts it towards the payment.
pub fn mark_transaction_paid(conn: &Connection, user_id: i64, txn_id: i64) -> Result<Payment> {
    let txn = get_txn(conn, txn_id)?;
    let mut p = get(conn, user_id, txn.payment_id)
        .map_err(|_| AppError::not_found("Payment transaction", txn_id))?;
    if txn.status == TxnStatus::Paid {
        return Err(AppError::Validation(format!("Transaction {txn_id} is already paid")));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE payment_transactions SET status = 'paid' WHERE id = ?1",
        [txn_id],
    )?;
    p.paid_count += 1;
    refresh_status(&mut p);
    save(&tx, &p)?;
    tx.commit()?;

    log::info!("marked transaction {txn_id} of payment {} paid", p.id);
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::users;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn gym() -> PaymentInput {
        PaymentInput {
            name: "Gym membership".to_string(),
            emi_type: PaymentKind::Ending,
            category: PaymentCategory::Expense,
            amount: 2000.0,
            emi_day: 31,
            start_date: d(2025, 1, 31),
            end_date: Some(d(2025, 4, 30)),
            paid_count: 0,
            notes: None,
        }
    }

    fn rent() -> PaymentInput {
        PaymentInput {
            name: "Rent".to_string(),
            emi_type: PaymentKind::Recurring,
            end_date: None,
            emi_day: 5,
            amount: 25000.0,
            start_date: d(2025, 1, 1),
            ..gym()
        }
    }

    fn setup() -> (tempfile::TempDir, Connection, i64) {
        let (dir, conn) = test_db();
        let user = users::register(&conn, "Asha", "asha@example.com", 0.0, "INR").unwrap();
        (dir, conn, user.id)
    }

    #[test]
    fn test_create_requires_end_date_for_ending() {
        let (_dir, conn, uid) = setup();
        let input = PaymentInput { end_date: None, ..gym() };
        let err = create(&conn, uid, &input).unwrap_err();
        assert!(err.to_string().contains("End date is required"));
    }

    #[test]
    fn test_create_rejects_bad_day() {
        let (_dir, conn, uid) = setup();
        assert!(create(&conn, uid, &PaymentInput { emi_day: 0, ..gym() }).is_err());
        assert!(create(&conn, uid, &PaymentInput { emi_day: 32, ..gym() }).is_err());
    }

    #[test]
    fn test_summary_for_ending_payment() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &PaymentInput { paid_count: 1, ..gym() }).unwrap();
        let s = summarize(p, d(2025, 3, 1));
        // Jan 31 and Feb 28 are due, one is paid
        assert_eq!(s.pending, 1);
        assert_eq!(s.remaining, Remaining::Count(3));
        assert_eq!(s.next_due, Some(d(2025, 2, 28)));
    }

    #[test]
    fn test_summary_for_recurring_payment() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &rent()).unwrap();
        let s = summarize(p, d(2025, 3, 10));
        assert_eq!(s.pending, 3);
        assert_eq!(s.remaining, Remaining::Ongoing);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["remaining"], "Ongoing");
        assert_eq!(json["name"], "Rent");
        assert_eq!(json["nextDue"], "2025-01-05");
    }

    #[test]
    fn test_record_payment_completes_ending_payment() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &PaymentInput { paid_count: 3, ..gym() }).unwrap();
        let (p, txn) = record_payment(&conn, uid, p.id, d(2025, 4, 30), None).unwrap();
        assert_eq!(p.status, PaymentStatus::Completed);
        assert_eq!(txn.status, TxnStatus::Paid);
        assert_eq!(txn.amount, 2000.0);
        assert!(next_due(&p).is_none());
        assert!(record_payment(&conn, uid, p.id, d(2025, 5, 1), None).is_err());
    }

    #[test]
    fn test_sync_pending_is_idempotent() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &PaymentInput { paid_count: 1, ..rent() }).unwrap();
        let created = sync_pending(&conn, uid, p.id, d(2025, 4, 6)).unwrap();
        // Feb, Mar, Apr 5th; January is already paid
        let dates: Vec<NaiveDate> = created.iter().map(|t| t.payment_date).collect();
        assert_eq!(dates, vec![d(2025, 2, 5), d(2025, 3, 5), d(2025, 4, 5)]);
        assert!(created.iter().all(|t| t.status == TxnStatus::Pending));
        assert!(sync_pending(&conn, uid, p.id, d(2025, 4, 6)).unwrap().is_empty());
    }

    #[test]
    fn test_record_payment_settles_oldest_pending() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &rent()).unwrap();
        sync_pending(&conn, uid, p.id, d(2025, 2, 10)).unwrap();
        let (p, txn) = record_payment(&conn, uid, p.id, d(2025, 2, 11), Some(24000.0)).unwrap();
        assert_eq!(txn.payment_date, d(2025, 1, 5));
        assert_eq!(txn.amount, 24000.0);
        assert_eq!(p.paid_count, 1);
        let h = history(&conn, uid, p.id).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].status, TxnStatus::Pending);
        assert_eq!(h[1].status, TxnStatus::Paid);
    }

    #[test]
    fn test_mark_transaction_paid() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &rent()).unwrap();
        let created = sync_pending(&conn, uid, p.id, d(2025, 1, 5)).unwrap();
        assert_eq!(created.len(), 1);
        let p = mark_transaction_paid(&conn, uid, created[0].id).unwrap();
        assert_eq!(p.paid_count, 1);
        assert!(mark_transaction_paid(&conn, uid, created[0].id).is_err());
    }

    #[test]
    fn test_mark_transaction_paid_checks_owner() {
        let (_dir, conn, uid) = setup();
        let other = users::register(&conn, "Ravi", "ravi@example.com", 0.0, "INR").unwrap();
        let p = create(&conn, uid, &rent()).unwrap();
        let created = sync_pending(&conn, uid, p.id, d(2025, 1, 5)).unwrap();
        assert!(mark_transaction_paid(&conn, other.id, created[0].id).is_err());
    }

    #[test]
    fn test_update_to_recurring_clears_end_date() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &PaymentInput { paid_count: 4, ..gym() }).unwrap();
        assert_eq!(p.status, PaymentStatus::Completed);
        let changes = PaymentUpdate {
            emi_type: Some(PaymentKind::Recurring),
            ..Default::default()
        };
        let p = update(&conn, uid, p.id, &changes).unwrap();
        assert!(p.end_date.is_none());
        assert_eq!(p.status, PaymentStatus::Active);
    }

    #[test]
    fn test_delete_removes_history() {
        let (_dir, conn, uid) = setup();
        let p = create(&conn, uid, &rent()).unwrap();
        record_payment(&conn, uid, p.id, d(2025, 1, 5), None).unwrap();
        delete(&conn, uid, p.id).unwrap();
        let left: i64 = conn
            .query_row("SELECT count(*) FROM payment_transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert!(list(&conn, uid).unwrap().is_empty());
    }
}
