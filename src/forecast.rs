use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::dashboard::DueKind;
use crate::emis;
use crate::error::{AppError, Result};
use crate::models::{Emi, EmiStatus, Payment, PaymentCategory, PaymentStatus, User};
use crate::payments;
use crate::schedule::{self, YearMonth};

pub const MAX_MONTHS: u32 = 120;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastItem {
    pub kind: DueKind,
    pub name: String,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastMonth {
    pub month: String,
    pub emi_outflow: f64,
    pub expense_payments: f64,
    pub savings_payments: f64,
    pub total: f64,
    /// Monthly income left after everything due this month.
    pub surplus: f64,
    pub items: Vec<ForecastItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub currency: String,
    pub monthly_income: f64,
    pub total_outflow: f64,
    pub months: Vec<ForecastMonth>,
}

/// EMI installment landing in `month`, if any. Installment `k` falls `k`
/// months after the start month and only unpaid ones are projected.
fn emi_due_in(emi: &Emi, month: YearMonth) -> Option<NaiveDate> {
    let k = YearMonth::of(emi.start_date).months_until(month);
    if k < 0 {
        return None;
    }
    let k = u32::try_from(k).ok()?;
    let open_ended = emi.total_installments == 0;
    let unpaid = k >= emi.paid_installments && (open_ended || k < emi.total_installments);
    unpaid.then(|| schedule::installment_due(emi.start_date, k))
}

/// Buckets active EMIs and payments into `count` months starting at `from`.
pub fn project(
    emis: &[Emi],
    payments: &[Payment],
    monthly_income: f64,
    from: YearMonth,
    count: u32,
) -> Vec<ForecastMonth> {
    let emis: Vec<&Emi> = emis.iter().filter(|e| e.status == EmiStatus::Active).collect();
    let payments: Vec<&Payment> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Active)
        .collect();

    (0..count)
        .map(|offset| {
            let month = from.plus(offset);
            let mut bucket = ForecastMonth {
                month: month.to_string(),
                emi_outflow: 0.0,
                expense_payments: 0.0,
                savings_payments: 0.0,
                total: 0.0,
                surplus: 0.0,
                items: Vec::new(),
            };

            for emi in &emis {
                if let Some(date) = emi_due_in(emi, month) {
                    bucket.emi_outflow += emi.emi_amount;
                    bucket.items.push(ForecastItem {
                        kind: DueKind::Emi,
                        name: emi.name.clone(),
                        date,
                        amount: emi.emi_amount,
                    });
                }
            }
            for p in &payments {
                if let Some(date) = schedule::occurrence_in(p.start_date, p.end_date, p.emi_day, month) {
                    match p.category {
                        PaymentCategory::Expense => bucket.expense_payments += p.amount,
                        PaymentCategory::Savings => bucket.savings_payments += p.amount,
                    }
                    bucket.items.push(ForecastItem {
                        kind: DueKind::Payment,
                        name: p.name.clone(),
                        date,
                        amount: p.amount,
                    });
                }
            }

            bucket.items.sort_by_key(|i| i.date);
            bucket.total = bucket.emi_outflow + bucket.expense_payments + bucket.savings_payments;
            bucket.surplus = monthly_income - bucket.total;
            bucket
        })
        .collect()
}

pub fn build(conn: &Connection, user: &User, today: NaiveDate, months: u32) -> Result<Forecast> {
    if months == 0 || months > MAX_MONTHS {
        return Err(AppError::Validation(format!(
            "Forecast length must be between 1 and {MAX_MONTHS} months"
        )));
    }
    let emis = emis::list(conn, user.id, Some(EmiStatus::Active))?;
    let payments = payments::list(conn, user.id)?;
    let buckets = project(&emis, &payments, user.monthly_income, YearMonth::of(today), months);
    log::debug!("forecast for user {} over {months} months", user.id);

    Ok(Forecast {
        currency: user.currency.clone(),
        monthly_income: user.monthly_income,
        total_outflow: buckets.iter().map(|m| m.total).sum(),
        months: buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmiType, PaymentKind, PaymentType};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn emi(total: u32, paid: u32, start: NaiveDate) -> Emi {
        Emi {
            id: 1,
            user_id: 1,
            name: "Bike loan".to_string(),
            emi_type: EmiType::PersonalLoan,
            payment_type: PaymentType::Emi,
            emi_amount: 3000.0,
            total_installments: total,
            paid_installments: paid,
            start_date: start,
            next_due_date: None,
            status: EmiStatus::Active,
            remaining_amount: 0.0,
            notes: None,
        }
    }

    fn payment(kind: PaymentKind, category: PaymentCategory, end: Option<NaiveDate>) -> Payment {
        Payment {
            id: 1,
            user_id: 1,
            name: "Chit fund".to_string(),
            emi_type: kind,
            category,
            amount: 5000.0,
            emi_day: 31,
            start_date: d(2025, 1, 10),
            end_date: end,
            paid_count: 0,
            status: PaymentStatus::Active,
            notes: None,
        }
    }

    #[test]
    fn test_emi_lands_only_on_unpaid_installments() {
        // Installments 0..4 run Jan..Apr; two are paid
        let e = emi(4, 2, d(2025, 1, 31));
        let months = project(&[e], &[], 10000.0, YearMonth { year: 2025, month: 1 }, 6);
        let outflow: Vec<f64> = months.iter().map(|m| m.emi_outflow).collect();
        assert_eq!(outflow, vec![0.0, 0.0, 3000.0, 3000.0, 0.0, 0.0]);
        assert_eq!(months[3].items[0].date, d(2025, 4, 30));
        assert_eq!(months[2].surplus, 7000.0);
    }

    #[test]
    fn test_open_ended_emi_never_stops() {
        let e = emi(0, 0, d(2024, 6, 15));
        let months = project(&[e], &[], 0.0, YearMonth { year: 2025, month: 1 }, 3);
        assert!(months.iter().all(|m| m.emi_outflow == 3000.0));
    }

    #[test]
    fn test_payment_respects_end_date_and_clamps() {
        let p = payment(PaymentKind::Ending, PaymentCategory::Savings, Some(d(2025, 3, 15)));
        let months = project(&[], &[p], 0.0, YearMonth { year: 2025, month: 1 }, 4);
        let savings: Vec<f64> = months.iter().map(|m| m.savings_payments).collect();
        // March 31 is past the end date
        assert_eq!(savings, vec![5000.0, 5000.0, 0.0, 0.0]);
        assert_eq!(months[1].items[0].date, d(2025, 2, 28));
    }

    #[test]
    fn test_inactive_items_skipped() {
        let mut e = emi(10, 0, d(2025, 1, 1));
        e.status = EmiStatus::Defaulted;
        let mut p = payment(PaymentKind::Recurring, PaymentCategory::Expense, None);
        p.status = PaymentStatus::Paused;
        let months = project(&[e], &[p], 500.0, YearMonth { year: 2025, month: 2 }, 2);
        assert!(months.iter().all(|m| m.total == 0.0 && m.surplus == 500.0));
    }

    #[test]
    fn test_totals_and_month_labels() {
        let e = emi(12, 0, d(2025, 11, 5));
        let p = payment(PaymentKind::Recurring, PaymentCategory::Expense, None);
        let months = project(&[e], &[p], 20000.0, YearMonth { year: 2025, month: 11 }, 3);
        let labels: Vec<&str> = months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, vec!["2025-11", "2025-12", "2026-01"]);
        assert_eq!(months[2].total, 8000.0);
        assert_eq!(months[2].surplus, 12000.0);
        assert_eq!(months[2].items.len(), 2);
    }

    #[test]
    fn test_build_rejects_zero_months() {
        let (_dir, conn) = crate::db::test_db();
        let user = crate::users::register(&conn, "Asha", "asha@example.com", 0.0, "INR").unwrap();
        assert!(build(&conn, &user, d(2025, 1, 1), 0).is_err());
        let f = build(&conn, &user, d(2025, 1, 1), 3).unwrap();
        assert_eq!(f.months.len(), 3);
        assert_eq!(f.total_outflow, 0.0);
    }
}
