use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{AppError, Result};
use crate::ledger::{self, TransactionInput};
use crate::models::{Emi, EmiStatus, EmiType, PaymentMethod, PaymentType, TransactionType};
use crate::schedule::installment_due;
use crate::validation;

const COLUMNS: &str = "id, user_id, name, emi_type, payment_type, emi_amount, total_installments, \
                       paid_installments, start_date, next_due_date, status, remaining_amount, notes";

fn row_to_emi(row: &Row) -> rusqlite::Result<Emi> {
    Ok(Emi {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        emi_type: row.get(3)?,
        payment_type: row.get(4)?,
        emi_amount: row.get(5)?,
        total_installments: row.get(6)?,
        paid_installments: row.get(7)?,
        start_date: row.get(8)?,
        next_due_date: row.get(9)?,
        status: row.get(10)?,
        remaining_amount: row.get(11)?,
        notes: row.get(12)?,
    })
}

#[derive(Debug, Clone)]
pub struct EmiInput {
    pub name: String,
    pub emi_type: EmiType,
    pub payment_type: PaymentType,
    pub emi_amount: f64,
    pub total_installments: u32,
    pub paid_installments: u32,
    pub start_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct EmiUpdate {
    pub name: Option<String>,
    pub emi_type: Option<EmiType>,
    pub payment_type: Option<PaymentType>,
    pub emi_amount: Option<f64>,
    pub total_installments: Option<u32>,
    pub paid_installments: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub status: Option<EmiStatus>,
    pub notes: Option<String>,
}

fn validate(emi: &mut Emi) -> Result<()> {
    validation::require_text("Name", &emi.name)?;
    validation::positive_amount("EMI amount", emi.emi_amount)?;
    emi.total_installments =
        validation::installments(emi.payment_type, emi.total_installments, emi.paid_installments)?;
    Ok(())
}

/// Recomputes next due date, remaining amount and completion from the
/// installment counters. A `defaulted` EMI stays defaulted until it is paid
/// off or its status is changed by hand.
pub fn refresh_derived(emi: &mut Emi) {
    let open_ended = emi.total_installments == 0;
    if !open_ended && emi.paid_installments >= emi.total_installments {
        emi.status = EmiStatus::Completed;
        emi.next_due_date = None;
        emi.remaining_amount = 0.0;
        return;
    }
    if emi.status == EmiStatus::Completed {
        emi.status = EmiStatus::Active;
    }
    emi.next_due_date = Some(installment_due(emi.start_date, emi.paid_installments));
    emi.remaining_amount = if open_ended {
        0.0
    } else {
        let left = emi.total_installments - emi.paid_installments;
        (emi.emi_amount * left as f64 * 100.0).round() / 100.0
    };
}

pub fn progress_pct(emi: &Emi) -> f64 {
    if emi.total_installments == 0 {
        return 0.0;
    }
    (emi.paid_installments as f64 / emi.total_installments as f64 * 100.0).min(100.0)
}

pub fn is_overdue(emi: &Emi, today: NaiveDate) -> bool {
    emi.status == EmiStatus::Active && emi.next_due_date.is_some_and(|due| due < today)
}

/// Monthly cash the EMI still demands. Only active installment plans count;
/// completed and defaulted EMIs and one-off purchases contribute nothing.
pub fn monthly_outflow(emi: &Emi) -> f64 {
    if emi.status == EmiStatus::Active && emi.payment_type != PaymentType::FullPayment {
        emi.emi_amount
    } else {
        0.0
    }
}

pub fn create(conn: &Connection, user_id: i64, input: &EmiInput) -> Result<Emi> {
    let mut emi = Emi {
        id: 0,
        user_id,
        name: input.name.trim().to_string(),
        emi_type: input.emi_type,
        payment_type: input.payment_type,
        emi_amount: input.emi_amount,
        total_installments: input.total_installments,
        paid_installments: input.paid_installments,
        start_date: input.start_date,
        next_due_date: None,
        status: EmiStatus::Active,
        remaining_amount: 0.0,
        notes: input.notes.clone(),
    };
    validate(&mut emi)?;
    refresh_derived(&mut emi);

    conn.execute(
        "INSERT INTO emis (user_id, name, emi_type, payment_type, emi_amount, total_installments, \
         paid_installments, start_date, next_due_date, status, remaining_amount, notes) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            emi.user_id,
            emi.name,
            emi.emi_type,
            emi.payment_type,
            emi.emi_amount,
            emi.total_installments,
            emi.paid_installments,
            emi.start_date,
            emi.next_due_date,
            emi.status,
            emi.remaining_amount,
            emi.notes,
        ],
    )?;
    emi.id = conn.last_insert_rowid();
    log::info!("created EMI {} '{}' for user {user_id}", emi.id, emi.name);
    Ok(emi)
}

fn save(conn: &Connection, emi: &Emi) -> Result<()> {
    conn.execute(
        "UPDATE emis SET name = ?1, emi_type = ?2, payment_type = ?3, emi_amount = ?4, \
         total_installments = ?5, paid_installments = ?6, start_date = ?7, next_due_date = ?8, \
         status = ?9, remaining_amount = ?10, notes = ?11 WHERE id = ?12 AND user_id = ?13",
        rusqlite::params![
            emi.name,
            emi.emi_type,
            emi.payment_type,
            emi.emi_amount,
            emi.total_installments,
            emi.paid_installments,
            emi.start_date,
            emi.next_due_date,
            emi.status,
            emi.remaining_amount,
            emi.notes,
            emi.id,
            emi.user_id,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, user_id: i64, id: i64) -> Result<Emi> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM emis WHERE id = ?1 AND user_id = ?2"),
        [id, user_id],
        row_to_emi,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("EMI", id))
}

pub fn list(conn: &Connection, user_id: i64, status: Option<EmiStatus>) -> Result<Vec<Emi>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM emis WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2) \
         ORDER BY status, next_due_date, name"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, status], row_to_emi)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update(conn: &Connection, user_id: i64, id: i64, update: &EmiUpdate) -> Result<Emi> {
    let mut emi = get(conn, user_id, id)?;
    if let Some(name) = &update.name {
        emi.name = name.trim().to_string();
    }
    if let Some(t) = update.emi_type {
        emi.emi_type = t;
    }
    if let Some(t) = update.payment_type {
        emi.payment_type = t;
    }
    if let Some(amount) = update.emi_amount {
        emi.emi_amount = amount;
    }
    if let Some(total) = update.total_installments {
        emi.total_installments = total;
    }
    if let Some(paid) = update.paid_installments {
        emi.paid_installments = paid;
    }
    if let Some(start) = update.start_date {
        emi.start_date = start;
    }
    if let Some(status) = update.status {
        emi.status = status;
    }
    if let Some(notes) = &update.notes {
        emi.notes = if notes.trim().is_empty() { None } else { Some(notes.clone()) };
    }
    validate(&mut emi)?;
    let paid_off = emi.total_installments > 0 && emi.paid_installments >= emi.total_installments;
    if update.status == Some(EmiStatus::Completed) && !paid_off {
        return Err(AppError::Validation(format!(
            "EMI '{}' cannot be completed with {} of {} installments paid",
            emi.name,
            emi.paid_installments,
            if emi.total_installments == 0 { "ongoing".to_string() } else { emi.total_installments.to_string() }
        )));
    }
    refresh_derived(&mut emi);
    save(conn, &emi)?;
    log::info!("updated EMI {id}");
    Ok(emi)
}

pub fn delete(conn: &Connection, user_id: i64, id: i64) -> Result<Emi> {
    let emi = get(conn, user_id, id)?;
    conn.execute("DELETE FROM emis WHERE id = ?1 AND user_id = ?2", [id, user_id])?;
    log::info!("deleted EMI {id} '{}'", emi.name);
    Ok(emi)
}

/// Marks the next installment as paid and books it in the ledger as an
/// expense dated `paid_on`.
pub fn record_installment(
    conn: &Connection,
    user_id: i64,
    id: i64,
    paid_on: NaiveDate,
    method: PaymentMethod,
) -> Result<Emi> {
    let mut emi = get(conn, user_id, id)?;
    if emi.status == EmiStatus::Completed {
        return Err(AppError::Validation(format!("EMI '{}' is already completed", emi.name)));
    }

    let tx = conn.unchecked_transaction()?;
    emi.paid_installments += 1;
    refresh_derived(&mut emi);
    save(&tx, &emi)?;
    ledger::add(
        &tx,
        user_id,
        &TransactionInput {
            txn_type: TransactionType::Expense,
            amount: emi.emi_amount,
            description: format!("EMI: {}", emi.name),
            date: paid_on,
            payment_method: method,
            category: "EMI".to_string(),
        },
    )?;
    tx.commit()?;

    log::info!(
        "recorded installment {}/{} for EMI {id}",
        emi.paid_installments,
        emi.total_installments
    );
    Ok(emi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::users;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn car_loan() -> EmiInput {
        EmiInput {
            name: "Car loan".to_string(),
            emi_type: EmiType::CarLoan,
            payment_type: PaymentType::Emi,
            emi_amount: 15000.0,
            total_installments: 36,
            paid_installments: 10,
            start_date: d(2024, 1, 31),
            notes: None,
        }
    }

    fn setup() -> (tempfile::TempDir, Connection, i64) {
        let (dir, conn) = test_db();
        let user = users::register(&conn, "Asha", "asha@example.com", 100000.0, "INR").unwrap();
        (dir, conn, user.id)
    }

    #[test]
    fn test_create_derives_fields() {
        let (_dir, conn, uid) = setup();
        let emi = create(&conn, uid, &car_loan()).unwrap();
        assert_eq!(emi.status, EmiStatus::Active);
        assert_eq!(emi.remaining_amount, 26.0 * 15000.0);
        // Installment index 10 from 2024-01-31 lands in November 2024
        assert_eq!(emi.next_due_date, Some(d(2024, 11, 30)));
        let stored = get(&conn, uid, emi.id).unwrap();
        assert_eq!(stored.next_due_date, emi.next_due_date);
        assert_eq!(stored.emi_type, EmiType::CarLoan);
    }

    #[test]
    fn test_full_payment_forces_single_installment() {
        let (_dir, conn, uid) = setup();
        let input = EmiInput {
            payment_type: PaymentType::FullPayment,
            total_installments: 12,
            paid_installments: 0,
            ..car_loan()
        };
        let emi = create(&conn, uid, &input).unwrap();
        assert_eq!(emi.total_installments, 1);
        assert_eq!(emi.remaining_amount, 15000.0);
        assert_eq!(monthly_outflow(&emi), 0.0);
    }

    #[test]
    fn test_open_ended_subscription() {
        let (_dir, conn, uid) = setup();
        let input = EmiInput {
            name: "Streaming".to_string(),
            payment_type: PaymentType::Subscription,
            emi_amount: 649.0,
            total_installments: 0,
            paid_installments: 0,
            start_date: d(2025, 3, 1),
            ..car_loan()
        };
        let mut emi = create(&conn, uid, &input).unwrap();
        assert_eq!(emi.remaining_amount, 0.0);
        assert_eq!(progress_pct(&emi), 0.0);
        for _ in 0..5 {
            emi = record_installment(&conn, uid, emi.id, d(2025, 7, 1), PaymentMethod::Card).unwrap();
        }
        assert_eq!(emi.status, EmiStatus::Active);
        assert_eq!(emi.next_due_date, Some(d(2025, 8, 1)));
    }

    #[test]
    fn test_record_installment_completes_and_books_ledger() {
        let (_dir, conn, uid) = setup();
        let input = EmiInput {
            total_installments: 2,
            paid_installments: 0,
            ..car_loan()
        };
        let emi = create(&conn, uid, &input).unwrap();
        let emi = record_installment(&conn, uid, emi.id, d(2024, 1, 31), PaymentMethod::BankTransfer).unwrap();
        assert_eq!(progress_pct(&emi), 50.0);
        let emi = record_installment(&conn, uid, emi.id, d(2024, 2, 29), PaymentMethod::BankTransfer).unwrap();
        assert_eq!(emi.status, EmiStatus::Completed);
        assert_eq!(emi.next_due_date, None);
        assert_eq!(emi.remaining_amount, 0.0);

        let err = record_installment(&conn, uid, emi.id, d(2024, 3, 31), PaymentMethod::Cash).unwrap_err();
        assert!(err.to_string().contains("already completed"));

        let booked: i64 = conn
            .query_row("SELECT count(*) FROM transactions WHERE category = 'EMI'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(booked, 2);
    }

    #[test]
    fn test_update_reopens_when_total_raised() {
        let (_dir, conn, uid) = setup();
        let input = EmiInput {
            total_installments: 1,
            paid_installments: 1,
            ..car_loan()
        };
        let emi = create(&conn, uid, &input).unwrap();
        assert_eq!(emi.status, EmiStatus::Completed);
        let changes = EmiUpdate {
            total_installments: Some(3),
            ..Default::default()
        };
        let emi = update(&conn, uid, emi.id, &changes).unwrap();
        assert_eq!(emi.status, EmiStatus::Active);
        assert_eq!(emi.remaining_amount, 30000.0);
    }

    #[test]
    fn test_update_keeps_defaulted_status() {
        let (_dir, conn, uid) = setup();
        let emi = create(&conn, uid, &car_loan()).unwrap();
        let emi = update(
            &conn,
            uid,
            emi.id,
            &EmiUpdate {
                status: Some(EmiStatus::Defaulted),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(emi.status, EmiStatus::Defaulted);
        assert!(!is_overdue(&emi, d(2030, 1, 1)));
        assert_eq!(monthly_outflow(&emi), 0.0);
    }

    #[test]
    fn test_update_rejects_completing_unpaid_emi() {
        let (_dir, conn, uid) = setup();
        let emi = create(&conn, uid, &car_loan()).unwrap();
        let completed = EmiUpdate {
            status: Some(EmiStatus::Completed),
            ..Default::default()
        };
        let err = update(&conn, uid, emi.id, &completed).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("10 of 36"));
        assert_eq!(get(&conn, uid, emi.id).unwrap().status, EmiStatus::Active);

        let paid_off = EmiUpdate {
            paid_installments: Some(36),
            status: Some(EmiStatus::Completed),
            ..Default::default()
        };
        let emi = update(&conn, uid, emi.id, &paid_off).unwrap();
        assert_eq!(emi.status, EmiStatus::Completed);
    }

    #[test]
    fn test_update_rejects_paid_above_total() {
        let (_dir, conn, uid) = setup();
        let emi = create(&conn, uid, &car_loan()).unwrap();
        let result = update(
            &conn,
            uid,
            emi.id,
            &EmiUpdate {
                paid_installments: Some(40),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_overdue() {
        let (_dir, conn, uid) = setup();
        let emi = create(&conn, uid, &car_loan()).unwrap();
        assert!(is_overdue(&emi, d(2024, 12, 1)));
        assert!(!is_overdue(&emi, d(2024, 11, 30)));
    }

    #[test]
    fn test_scoped_to_owner() {
        let (_dir, conn, uid) = setup();
        let other = users::register(&conn, "Ravi", "ravi@example.com", 0.0, "INR").unwrap();
        let emi = create(&conn, uid, &car_loan()).unwrap();
        assert!(matches!(get(&conn, other.id, emi.id).unwrap_err(), AppError::NotFound { .. }));
        assert!(delete(&conn, other.id, emi.id).is_err());
        assert!(list(&conn, other.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_by_status() {
        let (_dir, conn, uid) = setup();
        create(&conn, uid, &car_loan()).unwrap();
        create(
            &conn,
            uid,
            &EmiInput {
                name: "Phone".to_string(),
                total_installments: 6,
                paid_installments: 6,
                ..car_loan()
            },
        )
        .unwrap();
        assert_eq!(list(&conn, uid, None).unwrap().len(), 2);
        let done = list(&conn, uid, Some(EmiStatus::Completed)).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].name, "Phone");
        delete(&conn, uid, done[0].id).unwrap();
        assert_eq!(list(&conn, uid, None).unwrap().len(), 1);
    }
}
