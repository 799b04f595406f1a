use chrono::{Months, NaiveDate};
use rusqlite::Connection;

use crate::cli::{open_db, today};
use crate::emis::{self, EmiInput};
use crate::error::Result;
use crate::ledger::{self, TransactionInput};
use crate::models::{
    EmiType, PaymentCategory, PaymentKind, PaymentMethod, PaymentType, TransactionType, User,
};
use crate::payments::{self, PaymentInput};
use crate::savings;
use crate::schedule::YearMonth;
use crate::settings::save_settings;
use crate::users;

const DEMO_NAME: &str = "Demo User";
const DEMO_EMAIL: &str = "demo@emitrack.local";
const DEMO_INCOME: f64 = 150000.0;
const HISTORY_MONTHS: u32 = 6;

struct DemoEmi {
    name: &'static str,
    emi_type: EmiType,
    payment_type: PaymentType,
    amount: f64,
    total: u32,
    /// Months since the first installment.
    age: u32,
}

const EMIS: &[DemoEmi] = &[
    DemoEmi { name: "Home loan", emi_type: EmiType::HomeLoan, payment_type: PaymentType::Emi, amount: 42500.0, total: 240, age: 14 },
    DemoEmi { name: "Car loan", emi_type: EmiType::CarLoan, payment_type: PaymentType::Emi, amount: 12800.0, total: 60, age: 20 },
    DemoEmi { name: "Phone", emi_type: EmiType::ConsumerDurable, payment_type: PaymentType::Emi, amount: 3499.0, total: 12, age: 11 },
    DemoEmi { name: "Music streaming", emi_type: EmiType::Other, payment_type: PaymentType::Subscription, amount: 119.0, total: 0, age: 8 },
];

struct DemoPayment {
    name: &'static str,
    kind: PaymentKind,
    category: PaymentCategory,
    amount: f64,
    day: u32,
    /// Months of the schedule still to run, for ending payments.
    months_left: Option<u32>,
}

const PAYMENTS: &[DemoPayment] = &[
    DemoPayment { name: "Rent", kind: PaymentKind::Recurring, category: PaymentCategory::Expense, amount: 18000.0, day: 5, months_left: None },
    DemoPayment { name: "Mutual fund SIP", kind: PaymentKind::Recurring, category: PaymentCategory::Savings, amount: 10000.0, day: 10, months_left: None },
    DemoPayment { name: "Health insurance", kind: PaymentKind::Ending, category: PaymentCategory::Expense, amount: 2100.0, day: 31, months_left: Some(9) },
];

/// (day, description, category, method, amount) spent every month.
const MONTHLY_SPEND: &[(u32, &str, &str, PaymentMethod, f64)] = &[
    (2, "Groceries", "Food", PaymentMethod::Upi, 6200.0),
    (9, "Electricity bill", "Utilities", PaymentMethod::Upi, 1850.0),
    (14, "Fuel", "Transport", PaymentMethod::Card, 3000.0),
    (19, "Dinner out", "Food", PaymentMethod::Card, 2400.0),
    (26, "Internet", "Utilities", PaymentMethod::BankTransfer, 999.0),
];

fn months_ago(today: NaiveDate, n: u32) -> YearMonth {
    YearMonth::of(today.checked_sub_months(Months::new(n)).unwrap_or(today))
}

fn insert_demo_data(conn: &Connection, user: &User, today: NaiveDate) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut records = 0;

    for e in EMIS {
        let start = months_ago(today, e.age).day(7);
        let paid = if e.total == 0 { e.age } else { e.age.min(e.total) };
        emis::create(
            &tx,
            user.id,
            &EmiInput {
                name: e.name.to_string(),
                emi_type: e.emi_type,
                payment_type: e.payment_type,
                emi_amount: e.amount,
                total_installments: e.total,
                paid_installments: paid,
                start_date: start,
                notes: None,
            },
        )?;
        records += 1;
    }

    let first = months_ago(today, HISTORY_MONTHS);
    for p in PAYMENTS {
        let end = p.months_left.map(|n| YearMonth::of(today).plus(n).day(p.day));
        payments::create(
            &tx,
            user.id,
            &PaymentInput {
                name: p.name.to_string(),
                emi_type: p.kind,
                category: p.category,
                amount: p.amount,
                emi_day: p.day,
                start_date: first.first_date(),
                end_date: end,
                paid_count: HISTORY_MONTHS,
                notes: None,
            },
        )?;
        records += 1;
    }

    for i in 0..HISTORY_MONTHS {
        let month = first.plus(i);
        ledger::add(
            &tx,
            user.id,
            &TransactionInput {
                txn_type: TransactionType::Income,
                amount: DEMO_INCOME,
                description: "Salary".to_string(),
                date: month.first_date(),
                payment_method: PaymentMethod::BankTransfer,
                category: "Salary".to_string(),
            },
        )?;
        for &(day, description, category, method, amount) in MONTHLY_SPEND {
            // Small deterministic variation per month
            let vary = 1.0 + ((i % 4) as f64 - 1.5) * 0.04;
            ledger::add(
                &tx,
                user.id,
                &TransactionInput {
                    txn_type: TransactionType::Expense,
                    amount: (amount * vary).round(),
                    description: description.to_string(),
                    date: month.day(day),
                    payment_method: method,
                    category: category.to_string(),
                },
            )?;
        }
        savings::add(&tx, user.id, month.day(28), 15000.0 + 2500.0 * (i % 3) as f64, None)?;
        records += MONTHLY_SPEND.len() + 2;
    }

    tx.commit()?;
    Ok(records)
}

pub fn run() -> Result<()> {
    let (mut settings, conn) = open_db()?;

    // Idempotency guard
    if let Some(existing) = users::find_by_email(&conn, DEMO_EMAIL)? {
        settings.active_user_id = Some(existing.id);
        save_settings(&settings)?;
        println!("Demo data already loaded. Logged in as {DEMO_EMAIL}.");
        return Ok(());
    }

    let user = users::register(&conn, DEMO_NAME, DEMO_EMAIL, DEMO_INCOME, &settings.default_currency)?;
    let records = insert_demo_data(&conn, &user, today())?;
    settings.active_user_id = Some(user.id);
    save_settings(&settings)?;
    log::info!("loaded {records} demo records for user {}", user.id);

    println!("Loaded demo data: {} EMIs, {} payments, {HISTORY_MONTHS} months of ledger and savings.", EMIS.len(), PAYMENTS.len());
    println!("Logged in as {DEMO_EMAIL}. Try `emitrack dashboard` or `emitrack forecast`.");
    Ok(())
}
