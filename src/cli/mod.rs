pub mod backup;
pub mod dashboard;
pub mod demo;
pub mod emis;
pub mod forecast;
pub mod init;
pub mod ledger;
pub mod load;
pub mod payments;
pub mod report;
pub mod roles;
pub mod savings;
pub mod status;
pub mod users;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{get_connection, init_db};
use crate::error::{AppError, Result};
use crate::models::{
    EmiStatus, EmiType, PaymentCategory, PaymentKind, PaymentMethod, PaymentStatus, PaymentType,
    Permission, Role, TransactionType,
};
use crate::schedule::YearMonth;
use crate::session::Session;
use crate::settings::{load_settings, Settings};
use crate::validation;

fn date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    validation::parse_date("Date", value).map_err(|e| e.to_string())
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Opens the configured database, creating any missing tables.
pub(crate) fn open_db() -> Result<(Settings, Connection)> {
    let settings = load_settings();
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(AppError::Settings(format!(
            "No database found at {}\nRun `emitrack init` to set up.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok((settings, conn))
}

/// Everything a command acting for the logged-in user needs.
pub(crate) struct Workspace {
    pub settings: Settings,
    pub conn: Connection,
    pub session: Session,
}

impl Workspace {
    pub fn open(permission: Permission) -> Result<Workspace> {
        let (settings, conn) = open_db()?;
        let session = Session::load(&conn, &settings)?;
        session.require(&conn, permission)?;
        Ok(Workspace {
            settings,
            conn,
            session,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.session.user_id()
    }

    pub fn money(&self, val: f64) -> String {
        crate::fmt::money(val, self.session.currency())
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "emitrack",
    version,
    about = "Track EMIs, recurring payments, house savings and your monthly cash flow."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up emitrack: choose a data directory and initialize the database.
    Init {
        /// Path for emitrack data (default: ~/Documents/emitrack)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Switch to an existing emitrack data directory.
    Load {
        /// Path to data directory containing emitrack.db
        path: String,
    },
    /// Show current database, session and summary statistics.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/emitrack-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Load a demo user with sample EMIs, payments and ledger entries.
    Demo,
    /// Print shell completions.
    Completions {
        shell: Shell,
    },
    /// Create a user account. The first account becomes super admin.
    Register {
        /// Display name
        name: String,
        #[arg(long)]
        email: String,
        /// Monthly income used for disposable-income and forecast figures
        #[arg(long, default_value_t = 0.0)]
        income: f64,
        /// ISO currency code (default: from settings)
        #[arg(long)]
        currency: Option<String>,
    },
    /// Log in as an existing user.
    Login {
        email: String,
    },
    /// Forget the logged-in user.
    Logout,
    /// Show the logged-in user and their permissions.
    Whoami {
        #[arg(long)]
        json: bool,
    },
    /// Update your name, monthly income or currency.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        income: Option<f64>,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Manage user accounts (admin).
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Manage role permissions (super admin).
    Roles {
        #[command(subcommand)]
        command: RolesCommands,
    },
    /// Manage EMIs, subscriptions and one-off purchases.
    Emis {
        #[command(subcommand)]
        command: EmisCommands,
    },
    /// Manage recurring and fixed-term payments.
    Payments {
        #[command(subcommand)]
        command: PaymentsCommands,
    },
    /// Track house savings.
    Savings {
        #[command(subcommand)]
        command: SavingsCommands,
    },
    /// Income and expense ledger.
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
    /// Monthly overview: commitments, disposable income and upcoming dues.
    Dashboard {
        #[arg(long)]
        json: bool,
    },
    /// Project EMI and payment outflow for the coming months.
    Forecast {
        /// Number of months (default: from settings)
        #[arg(long)]
        months: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// List all users.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Change a user's role: user, admin, super_admin
    Role {
        id: i64,
        role: Role,
    },
    /// Delete a user and all of their data.
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum RolesCommands {
    /// Show the permissions of every role.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Grant a permission to a role.
    Grant {
        role: Role,
        permission: Permission,
    },
    /// Revoke a permission from a role.
    Revoke {
        role: Role,
        permission: Permission,
    },
}

#[derive(Subcommand)]
pub enum EmisCommands {
    /// Add an EMI.
    Add {
        name: String,
        /// Monthly installment amount
        #[arg(long)]
        amount: f64,
        /// home_loan, car_loan, personal_loan, education_loan, credit_card, consumer_durable, insurance, other
        #[arg(long = "type", default_value = "other")]
        emi_type: EmiType,
        /// emi, subscription, full_payment
        #[arg(long = "payment-type", default_value = "emi")]
        payment_type: PaymentType,
        /// Total installments; required for EMIs (subscriptions default to open-ended)
        #[arg(long)]
        installments: Option<u32>,
        /// Installments already paid
        #[arg(long, default_value_t = 0)]
        paid: u32,
        /// First installment date: YYYY-MM-DD
        #[arg(long, value_parser = date_arg)]
        start: NaiveDate,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List EMIs.
    List {
        /// Filter by status: active, completed, defaulted
        #[arg(long)]
        status: Option<EmiStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Show one EMI.
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Update an EMI.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long = "type")]
        emi_type: Option<EmiType>,
        #[arg(long = "payment-type")]
        payment_type: Option<PaymentType>,
        #[arg(long)]
        installments: Option<u32>,
        #[arg(long)]
        paid: Option<u32>,
        #[arg(long, value_parser = date_arg)]
        start: Option<NaiveDate>,
        /// active, completed, defaulted
        #[arg(long)]
        status: Option<EmiStatus>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete an EMI.
    Delete {
        id: i64,
    },
    /// Record the next installment as paid and book it in the ledger.
    Pay {
        id: i64,
        /// Payment date (default: today)
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        /// cash, card, upi, bank_transfer, cheque, other
        #[arg(long, default_value = "bank_transfer")]
        method: PaymentMethod,
    },
}

#[derive(Subcommand)]
pub enum PaymentsCommands {
    /// Add a payment.
    Add {
        name: String,
        #[arg(long)]
        amount: f64,
        /// Day of month the payment falls due (1-31)
        #[arg(long)]
        day: u32,
        /// First date the payment applies from: YYYY-MM-DD
        #[arg(long, value_parser = date_arg)]
        start: NaiveDate,
        /// Last date, required for ending payments: YYYY-MM-DD
        #[arg(long, value_parser = date_arg)]
        end: Option<NaiveDate>,
        /// ending, recurring
        #[arg(long, default_value = "recurring")]
        schedule: PaymentKind,
        /// expense, savings
        #[arg(long, default_value = "expense")]
        category: PaymentCategory,
        /// Occurrences already paid
        #[arg(long, default_value_t = 0)]
        paid: u32,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List payments with pending and remaining counts.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one payment.
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Update a payment.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        day: Option<u32>,
        #[arg(long, value_parser = date_arg)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = date_arg)]
        end: Option<NaiveDate>,
        #[arg(long)]
        schedule: Option<PaymentKind>,
        #[arg(long)]
        category: Option<PaymentCategory>,
        #[arg(long)]
        paid: Option<u32>,
        /// active, paused, completed
        #[arg(long)]
        status: Option<PaymentStatus>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a payment and its history.
    Delete {
        id: i64,
    },
    /// Record one payment.
    Pay {
        id: i64,
        /// Payment date (default: today)
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        /// Amount actually paid (default: the scheduled amount)
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Queue pending transactions for occurrences due by today.
    Sync {
        /// Payment ID (default: all active payments)
        id: Option<i64>,
    },
    /// Settle a pending transaction.
    MarkPaid {
        /// Transaction ID (shown in `emitrack payments history`)
        txn_id: i64,
    },
    /// Show a payment's transaction history.
    History {
        id: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SavingsCommands {
    /// Add a house savings entry.
    Add {
        amount: f64,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List house savings entries.
    List {
        #[arg(long = "from", value_parser = date_arg)]
        from_date: Option<NaiveDate>,
        #[arg(long = "to", value_parser = date_arg)]
        to_date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a house savings entry.
    Delete {
        id: i64,
    },
    /// Monthly totals with a running balance.
    Summary {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Record income or an expense.
    Add {
        amount: f64,
        /// income, expense
        #[arg(long = "type", default_value = "expense")]
        txn_type: TransactionType,
        #[arg(long)]
        description: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        /// cash, card, upi, bank_transfer, cheque, other
        #[arg(long, default_value = "cash")]
        method: PaymentMethod,
        #[arg(long, default_value = "General")]
        category: String,
    },
    /// List ledger entries, newest first.
    List {
        #[arg(long = "type")]
        txn_type: Option<TransactionType>,
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<YearMonth>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a ledger entry.
    Delete {
        id: i64,
    },
    /// Import a CSV with date,type,amount,description[,category,payment_method] columns.
    Import {
        file: String,
    },
    /// Export ledger entries as CSV.
    Export {
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<YearMonth>,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income, expense and running net per month.
    Monthly {
        /// Year filter: YYYY (default: current year)
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        json: bool,
    },
    /// Expenses by category.
    Categories {
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<YearMonth>,
        /// Year filter: YYYY (default: current year)
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        json: bool,
    },
    /// EMI progress and outstanding balances.
    Emis {
        #[arg(long)]
        json: bool,
    },
    /// Payment status with pending and remaining counts.
    Payments {
        #[arg(long)]
        json: bool,
    },
    /// House savings by month.
    Savings {
        #[arg(long)]
        json: bool,
    },
    /// Overview of every user's commitments (admin).
    Users {
        #[arg(long)]
        json: bool,
    },
}
