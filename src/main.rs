mod cli;
mod dashboard;
mod db;
mod emis;
mod error;
mod fmt;
mod forecast;
mod importer;
mod ledger;
mod models;
mod payments;
mod reports;
mod roles;
mod savings;
mod schedule;
mod session;
mod settings;
mod users;
mod validation;

use clap::{CommandFactory, Parser};

use cli::{
    Cli, Commands, EmisCommands, LedgerCommands, PaymentsCommands, ReportCommands, RolesCommands,
    SavingsCommands, UsersCommands,
};
use emis::EmiUpdate;
use ledger::LedgerFilter;
use payments::PaymentUpdate;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => cli::status::run(),
        Some(command) => run(command),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> error::Result<()> {
    match command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Load { path } => cli::load::run(&path),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Demo => cli::demo::run(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "emitrack", &mut std::io::stdout());
            Ok(())
        }
        Commands::Register {
            name,
            email,
            income,
            currency,
        } => cli::users::register(&name, &email, income, currency.as_deref()),
        Commands::Login { email } => cli::users::login(&email),
        Commands::Logout => cli::users::logout(),
        Commands::Whoami { json } => cli::users::whoami(json),
        Commands::Profile {
            name,
            income,
            currency,
        } => cli::users::profile(name, income, currency),
        Commands::Users { command } => match command {
            UsersCommands::List { json } => cli::users::list(json),
            UsersCommands::Role { id, role } => cli::users::set_role(id, role),
            UsersCommands::Delete { id } => cli::users::delete(id),
        },
        Commands::Roles { command } => match command {
            RolesCommands::List { json } => cli::roles::list(json),
            RolesCommands::Grant { role, permission } => cli::roles::grant(role, permission),
            RolesCommands::Revoke { role, permission } => cli::roles::revoke(role, permission),
        },
        Commands::Emis { command } => match command {
            EmisCommands::Add {
                name,
                amount,
                emi_type,
                payment_type,
                installments,
                paid,
                start,
                notes,
            } => cli::emis::add(name, amount, emi_type, payment_type, installments, paid, start, notes),
            EmisCommands::List { status, json } => cli::emis::list(status, json),
            EmisCommands::Show { id, json } => cli::emis::show(id, json),
            EmisCommands::Update {
                id,
                name,
                amount,
                emi_type,
                payment_type,
                installments,
                paid,
                start,
                status,
                notes,
            } => cli::emis::update(
                id,
                EmiUpdate {
                    name,
                    emi_type,
                    payment_type,
                    emi_amount: amount,
                    total_installments: installments,
                    paid_installments: paid,
                    start_date: start,
                    status,
                    notes,
                },
            ),
            EmisCommands::Delete { id } => cli::emis::delete(id),
            EmisCommands::Pay { id, date, method } => cli::emis::pay(id, date, method),
        },
        Commands::Payments { command } => match command {
            PaymentsCommands::Add {
                name,
                amount,
                day,
                start,
                end,
                schedule,
                category,
                paid,
                notes,
            } => cli::payments::add(name, amount, day, start, end, schedule, category, paid, notes),
            PaymentsCommands::List { json } => cli::payments::list(json),
            PaymentsCommands::Show { id, json } => cli::payments::show(id, json),
            PaymentsCommands::Update {
                id,
                name,
                amount,
                day,
                start,
                end,
                schedule,
                category,
                paid,
                status,
                notes,
            } => cli::payments::update(
                id,
                PaymentUpdate {
                    name,
                    emi_type: schedule,
                    category,
                    amount,
                    emi_day: day,
                    start_date: start,
                    end_date: end,
                    paid_count: paid,
                    status,
                    notes,
                },
            ),
            PaymentsCommands::Delete { id } => cli::payments::delete(id),
            PaymentsCommands::Pay { id, date, amount } => cli::payments::pay(id, date, amount),
            PaymentsCommands::Sync { id } => cli::payments::sync(id),
            PaymentsCommands::MarkPaid { txn_id } => cli::payments::mark_paid(txn_id),
            PaymentsCommands::History { id, json } => cli::payments::history(id, json),
        },
        Commands::Savings { command } => match command {
            SavingsCommands::Add { amount, date, notes } => cli::savings::add(amount, date, notes),
            SavingsCommands::List {
                from_date,
                to_date,
                json,
            } => cli::savings::list(from_date, to_date, json),
            SavingsCommands::Delete { id } => cli::savings::delete(id),
            SavingsCommands::Summary { json } => cli::savings::summary(json),
        },
        Commands::Ledger { command } => match command {
            LedgerCommands::Add {
                amount,
                txn_type,
                description,
                date,
                method,
                category,
            } => cli::ledger::add(amount, txn_type, description, date, method, category),
            LedgerCommands::List {
                txn_type,
                month,
                category,
                json,
            } => cli::ledger::list(
                LedgerFilter {
                    txn_type,
                    month,
                    category,
                },
                json,
            ),
            LedgerCommands::Delete { id } => cli::ledger::delete(id),
            LedgerCommands::Import { file } => cli::ledger::import(&file),
            LedgerCommands::Export { month, output } => cli::ledger::export(month, output),
        },
        Commands::Dashboard { json } => cli::dashboard::run(json),
        Commands::Forecast { months, json } => cli::forecast::run(months, json),
        Commands::Report { command } => match command {
            ReportCommands::Monthly { year, json } => cli::report::monthly(year, json),
            ReportCommands::Categories { month, year, json } => {
                cli::report::categories(month, year, json)
            }
            ReportCommands::Emis { json } => cli::report::emis(json),
            ReportCommands::Payments { json } => cli::report::payments(json),
            ReportCommands::Savings { json } => cli::report::savings(json),
            ReportCommands::Users { json } => cli::report::users(json),
        },
    }
}
