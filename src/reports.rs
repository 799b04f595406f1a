use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::emis;
use crate::error::{AppError, Result};
use crate::ledger::Totals;
use crate::models::{EmiStatus, EmiType, PaymentCategory, PaymentStatus, PaymentType, Permission, Role, User};
use crate::payments::{self, PaymentSummary};
use crate::roles;

// ---------------------------------------------------------------------------
// Date filter helper
// ---------------------------------------------------------------------------

/// `LIKE` prefix for a year or a single month of it.
fn period_prefix(year: i32, month: Option<u32>) -> Result<String> {
    match month {
        Some(m) if !(1..=12).contains(&m) => {
            Err(AppError::Validation(format!("Month must be between 1 and 12, got {m}")))
        }
        Some(m) => Ok(format!("{year:04}-{m:02}%")),
        None => Ok(format!("{year:04}%")),
    }
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRow {
    pub month: String,
    pub income: f64,
    pub expense: f64,
    pub net: f64,
    pub running_net: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub year: i32,
    pub months: Vec<MonthlyRow>,
    pub totals: Totals,
}

pub fn monthly(conn: &Connection, user_id: i64, year: i32) -> Result<MonthlyReport> {
    let prefix = period_prefix(year, None)?;
    let mut stmt = conn.prepare(
        "SELECT substr(date, 1, 7) AS month, \
         SUM(CASE WHEN type = 'income' THEN amount ELSE 0 END), \
         SUM(CASE WHEN type = 'expense' THEN amount ELSE 0 END) \
         FROM transactions WHERE user_id = ?1 AND date LIKE ?2 \
         GROUP BY month ORDER BY month",
    )?;
    let raw: Vec<(String, f64, f64)> = stmt
        .query_map(rusqlite::params![user_id, prefix], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut months = Vec::with_capacity(raw.len());
    let mut totals = Totals::default();
    for (month, income, expense) in raw {
        totals.income += income;
        totals.expense += expense;
        totals.net = totals.income - totals.expense;
        months.push(MonthlyRow {
            month,
            income,
            expense,
            net: income - expense,
            running_net: totals.net,
        });
    }

    Ok(MonthlyReport { year, months, totals })
}

// ---------------------------------------------------------------------------
// Expense categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    pub name: String,
    pub total: f64,
    pub count: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    pub period: String,
    pub categories: Vec<CategoryItem>,
    pub total: f64,
}

pub fn categories(conn: &Connection, user_id: i64, year: i32, month: Option<u32>) -> Result<CategoryReport> {
    let prefix = period_prefix(year, month)?;
    let mut stmt = conn.prepare(
        "SELECT category, SUM(amount) AS total, COUNT(*) \
         FROM transactions WHERE user_id = ?1 AND type = 'expense' AND date LIKE ?2 \
         GROUP BY category ORDER BY total DESC, category",
    )?;
    let raw: Vec<(String, f64, i64)> = stmt
        .query_map(rusqlite::params![user_id, prefix], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total: f64 = raw.iter().map(|(_, t, _)| t).sum();
    let categories = raw
        .into_iter()
        .map(|(name, t, count)| CategoryItem {
            name,
            total: t,
            count,
            pct: if total != 0.0 { t / total * 100.0 } else { 0.0 },
        })
        .collect();

    Ok(CategoryReport {
        period: prefix.trim_end_matches('%').to_string(),
        categories,
        total,
    })
}

// ---------------------------------------------------------------------------
// EMIs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiReportRow {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub emi_type: EmiType,
    pub payment_type: PaymentType,
    pub status: EmiStatus,
    pub emi_amount: f64,
    pub paid: u32,
    pub total: u32,
    pub progress: f64,
    pub remaining_amount: f64,
    pub next_due: Option<NaiveDate>,
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiReport {
    pub rows: Vec<EmiReportRow>,
    pub monthly_outflow: f64,
    pub total_outstanding: f64,
    pub overdue: usize,
}

pub fn emi_report(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<EmiReport> {
    let all = emis::list(conn, user_id, None)?;
    let rows: Vec<EmiReportRow> = all
        .iter()
        .map(|e| EmiReportRow {
            id: e.id,
            name: e.name.clone(),
            emi_type: e.emi_type,
            payment_type: e.payment_type,
            status: e.status,
            emi_amount: e.emi_amount,
            paid: e.paid_installments,
            total: e.total_installments,
            progress: emis::progress_pct(e),
            remaining_amount: e.remaining_amount,
            next_due: e.next_due_date,
            overdue: emis::is_overdue(e, today),
        })
        .collect();

    Ok(EmiReport {
        monthly_outflow: all.iter().map(emis::monthly_outflow).sum(),
        total_outstanding: rows.iter().map(|r| r.remaining_amount).sum(),
        overdue: rows.iter().filter(|r| r.overdue).count(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReport {
    pub rows: Vec<PaymentSummary>,
    pub pending: u32,
    pub monthly_expense: f64,
    pub monthly_savings: f64,
}

pub fn payment_report(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<PaymentReport> {
    let rows: Vec<PaymentSummary> = payments::list(conn, user_id)?
        .into_iter()
        .map(|p| payments::summarize(p, today))
        .collect();

    let mut report = PaymentReport {
        pending: rows.iter().map(|r| r.pending).sum(),
        monthly_expense: 0.0,
        monthly_savings: 0.0,
        rows: Vec::new(),
    };
    for r in rows.iter().filter(|r| r.payment.status == PaymentStatus::Active) {
        match r.payment.category {
            PaymentCategory::Expense => report.monthly_expense += r.payment.amount,
            PaymentCategory::Savings => report.monthly_savings += r.payment.amount,
        }
    }
    report.rows = rows;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Users overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub currency: String,
    pub monthly_income: f64,
    pub emis: i64,
    pub active_emis: i64,
    pub payments: i64,
    pub emi_outstanding: f64,
}

/// Per-user counts for administrators.
pub fn users_overview(conn: &Connection, actor: &User) -> Result<Vec<UserOverview>> {
    roles::require(conn, actor, Permission::ViewUsers)?;
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email, u.role, u.currency, u.monthly_income, \
         (SELECT COUNT(*) FROM emis e WHERE e.user_id = u.id), \
         (SELECT COUNT(*) FROM emis e WHERE e.user_id = u.id AND e.status = 'active'), \
         (SELECT COUNT(*) FROM payments p WHERE p.user_id = u.id), \
         (SELECT COALESCE(SUM(e.remaining_amount), 0) FROM emis e WHERE e.user_id = u.id) \
         FROM users u ORDER BY u.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(UserOverview {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                currency: row.get(4)?,
                monthly_income: row.get(5)?,
                emis: row.get(6)?,
                active_emis: row.get(7)?,
                payments: row.get(8)?,
                emi_outstanding: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
