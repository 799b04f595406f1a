use std::fmt;

use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::emis;
use crate::error::Result;
use crate::ledger::{self, Totals};
use crate::models::{EmiStatus, PaymentCategory, PaymentStatus, User};
use crate::payments;
use crate::savings;
use crate::schedule::YearMonth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DueKind {
    Emi,
    Payment,
}

impl fmt::Display for DueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueKind::Emi => f.write_str("EMI"),
            DueKind::Payment => f.write_str("Payment"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Due {
    pub kind: DueKind,
    pub id: i64,
    pub name: String,
    pub due_date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub currency: String,
    pub monthly_income: f64,
    pub active_emis: usize,
    pub monthly_emi_outflow: f64,
    pub monthly_expense_payments: f64,
    pub monthly_savings_payments: f64,
    pub disposable_income: f64,
    pub total_emi_outstanding: f64,
    pub pending_payments: u32,
    pub house_savings_total: f64,
    pub this_month: Totals,
    pub upcoming: Vec<Due>,
    pub overdue: Vec<Due>,
}

/// Aggregates everything the landing screen shows for `user` as of `today`.
/// Dues falling within `window_days` after today count as upcoming.
pub fn build(conn: &Connection, user: &User, today: NaiveDate, window_days: u32) -> Result<Dashboard> {
    let horizon = today
        .checked_add_days(Days::new(window_days as u64))
        .unwrap_or(NaiveDate::MAX);
    let mut upcoming = Vec::new();
    let mut overdue = Vec::new();

    let all_emis = emis::list(conn, user.id, None)?;
    let mut active_emis = 0;
    let mut monthly_emi_outflow = 0.0;
    let mut total_emi_outstanding = 0.0;
    for emi in &all_emis {
        monthly_emi_outflow += emis::monthly_outflow(emi);
        total_emi_outstanding += emi.remaining_amount;
        if emi.status != EmiStatus::Active {
            continue;
        }
        active_emis += 1;
        if let Some(due_date) = emi.next_due_date {
            let due = Due {
                kind: DueKind::Emi,
                id: emi.id,
                name: emi.name.clone(),
                due_date,
                amount: emi.emi_amount,
            };
            if due_date < today {
                overdue.push(due);
            } else if due_date <= horizon {
                upcoming.push(due);
            }
        }
    }

    let mut monthly_expense_payments = 0.0;
    let mut monthly_savings_payments = 0.0;
    let mut pending_payments = 0;
    for p in payments::list(conn, user.id)? {
        if p.status != PaymentStatus::Active {
            continue;
        }
        match p.category {
            PaymentCategory::Expense => monthly_expense_payments += p.amount,
            PaymentCategory::Savings => monthly_savings_payments += p.amount,
        }
        pending_payments += payments::pending_count(&p, today);
        if let Some(due_date) = payments::next_due(&p) {
            let due = Due {
                kind: DueKind::Payment,
                id: p.id,
                name: p.name.clone(),
                due_date,
                amount: p.amount,
            };
            if due_date < today {
                overdue.push(due);
            } else if due_date <= horizon {
                upcoming.push(due);
            }
        }
    }

    upcoming.sort_by_key(|d| d.due_date);
    overdue.sort_by_key(|d| d.due_date);

    let month = YearMonth::of(today);
    let this_month = ledger::totals_between(conn, user.id, month.first_date(), month.last_date())?;
    let disposable_income =
        user.monthly_income - monthly_emi_outflow - monthly_expense_payments - monthly_savings_payments;

    log::debug!(
        "dashboard for user {}: {} upcoming, {} overdue",
        user.id,
        upcoming.len(),
        overdue.len()
    );

    Ok(Dashboard {
        currency: user.currency.clone(),
        monthly_income: user.monthly_income,
        active_emis,
        monthly_emi_outflow,
        monthly_expense_payments,
        monthly_savings_payments,
        disposable_income,
        total_emi_outstanding,
        pending_payments,
        house_savings_total: savings::total(conn, user.id)?,
        this_month,
        upcoming,
        overdue,
    })
}
