use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A fresh HOME with an initialized database and a registered super admin.
struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        let env = Env { home };
        let data_dir = env.home.path().join("data");
        env.cmd()
            .args(["init", "--data-dir", data_dir.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized emitrack"));
        env.cmd()
            .args(["register", "Asha", "--email", "asha@example.com", "--income", "90000"])
            .assert()
            .success()
            .stdout(predicate::str::contains("super admin"));
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("emitrack").unwrap();
        cmd.env("HOME", self.home.path()).env_remove("RUST_LOG");
        cmd
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let out = self.cmd().args(args).output().unwrap();
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        serde_json::from_slice(&out.stdout).unwrap()
    }
}

#[test]
fn test_commands_require_init() {
    let home = TempDir::new().unwrap();
    Command::cargo_bin("emitrack")
        .unwrap()
        .env("HOME", home.path())
        .arg("dashboard")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("emitrack init"));
}

#[test]
fn test_whoami_reports_first_user_as_super_admin() {
    let env = Env::new();
    let me = env.json(&["whoami", "--json"]);
    assert_eq!(me["user"]["email"], "asha@example.com");
    assert_eq!(me["user"]["role"], "super_admin");
    let perms = me["permissions"].as_array().unwrap();
    assert!(perms.iter().any(|p| p == "manage_roles"));
}

#[test]
fn test_logout_then_commands_fail() {
    let env = Env::new();
    env.cmd().arg("logout").assert().success().stdout("Logged out.\n");
    env.cmd()
        .args(["emis", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
    env.cmd().args(["login", "asha@example.com"]).assert().success();
    env.cmd().args(["emis", "list"]).assert().success();
}

#[test]
fn test_add_and_list_emis() {
    let env = Env::new();
    env.cmd()
        .args([
            "emis", "add", "Car loan", "--amount", "12000", "--type", "car_loan",
            "--installments", "24", "--paid", "4", "--start", "2025-01-15",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added EMI 1: Car loan"));

    let rows = env.json(&["emis", "list", "--json"]);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "car_loan");
    assert_eq!(rows[0]["paidInstallments"], 4);
    assert_eq!(rows[0]["remainingAmount"], 240000.0);
    assert_eq!(rows[0]["nextDueDate"], "2025-05-15");
}

#[test]
fn test_emi_add_without_installments() {
    let env = Env::new();
    env.cmd()
        .args(["emis", "add", "Bike loan", "--amount", "4000", "--start", "2025-02-01"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--installments is required"));
    env.cmd()
        .args([
            "emis", "add", "Streaming", "--amount", "649", "--payment-type", "subscription",
            "--start", "2025-02-01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added EMI 1: Streaming"));

    let rows = env.json(&["emis", "list", "--json"]);
    assert_eq!(rows[0]["totalInstallments"], 0);
    assert_eq!(rows[0]["status"], "active");
}

#[test]
fn test_rejects_invalid_input() {
    let env = Env::new();
    env.cmd()
        .args(["emis", "add", "Bad", "--amount=-5", "--installments", "3", "--start", "2025-01-01"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
    env.cmd()
        .args(["emis", "add", "Bad", "--amount", "100", "--start", "2025-13-01"])
        .assert()
        .failure();
    env.cmd()
        .args(["forecast", "--months", "0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("between 1 and 120"));
}

#[test]
fn test_payment_sync_queues_pending_once() {
    let env = Env::new();
    env.cmd()
        .args(["payments", "add", "Rent", "--amount", "18000", "--day", "5", "--start", "2024-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added recurring payment 1: Rent"));

    env.cmd()
        .args(["payments", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued"));
    env.cmd()
        .args(["payments", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to queue"));

    let history = env.json(&["payments", "history", "1", "--json"]);
    let history = history.as_array().unwrap();
    assert!(!history.is_empty());
    assert!(history.iter().all(|t| t["status"] == "pending"));
}

#[test]
fn test_ledger_export_filters_by_month() {
    let env = Env::new();
    env.cmd()
        .args(["ledger", "add", "250", "--description", "Coffee beans", "--date", "2025-03-10", "--category", "Food"])
        .assert()
        .success();
    env.cmd()
        .args(["ledger", "add", "90000", "--type", "income", "--description", "Salary", "--date", "2025-04-01"])
        .assert()
        .success();

    env.cmd()
        .args(["ledger", "export", "--month", "2025-03"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("date,type,amount,description,category,payment_method"))
        .stdout(predicate::str::contains("2025-03-10,expense,250"))
        .stdout(predicate::str::contains("Salary").not());
}

#[test]
fn test_dashboard_and_forecast_json() {
    let env = Env::new();
    env.cmd()
        .args(["emis", "add", "Phone", "--amount", "3000", "--installments", "12", "--start", "2024-01-10"])
        .assert()
        .success();
    env.cmd()
        .args(["payments", "add", "SIP", "--amount", "5000", "--day", "10", "--start", "2024-01-01", "--category", "savings"])
        .assert()
        .success();

    let dash = env.json(&["dashboard", "--json"]);
    assert_eq!(dash["monthlyIncome"], 90000.0);
    assert_eq!(dash["activeEmis"], 1);
    assert_eq!(dash["monthlyEmiOutflow"], 3000.0);
    assert_eq!(dash["monthlySavingsPayments"], 5000.0);
    assert_eq!(dash["disposableIncome"], 82000.0);

    let forecast = env.json(&["forecast", "--months", "3", "--json"]);
    let months = forecast["months"].as_array().unwrap();
    assert_eq!(months.len(), 3);
    assert!(months.iter().all(|m| m["savingsPayments"] == 5000.0));
}

#[test]
fn test_regular_user_cannot_list_users() {
    let env = Env::new();
    env.cmd()
        .args(["register", "Ravi", "--email", "ravi@example.com"])
        .assert()
        .success();
    env.cmd()
        .args(["users", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));

    env.cmd().args(["login", "asha@example.com"]).assert().success();
    let users = env.json(&["users", "list", "--json"]);
    assert_eq!(users.as_array().unwrap().len(), 2);
}
