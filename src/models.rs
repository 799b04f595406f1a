use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
    expected: &'static [&'static str],
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} '{}' (expected one of: {})",
            self.kind,
            self.value,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for ParseEnumError {}

impl From<ParseEnumError> for AppError {
    fn from(e: ParseEnumError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Declares a fieldless enum stored as snake_case text in SQLite and JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                        expected: Self::NAMES,
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(Role, "role" {
    User => "user",
    Admin => "admin",
    SuperAdmin => "super_admin",
});

text_enum!(Permission, "permission" {
    ManageOwnData => "manage_own_data",
    ViewUsers => "view_users",
    ManageUsers => "manage_users",
    ManageRoles => "manage_roles",
    ViewReports => "view_reports",
});

text_enum!(
    /// Loan or obligation category shown on the EMI list.
    EmiType, "EMI type" {
        HomeLoan => "home_loan",
        CarLoan => "car_loan",
        PersonalLoan => "personal_loan",
        EducationLoan => "education_loan",
        CreditCard => "credit_card",
        ConsumerDurable => "consumer_durable",
        Insurance => "insurance",
        Other => "other",
    }
);

text_enum!(PaymentType, "payment type" {
    Emi => "emi",
    Subscription => "subscription",
    FullPayment => "full_payment",
});

text_enum!(EmiStatus, "EMI status" {
    Active => "active",
    Completed => "completed",
    Defaulted => "defaulted",
});

text_enum!(
    /// `Ending` payments stop at their end date; `Recurring` ones never do.
    PaymentKind, "payment schedule" {
        Ending => "ending",
        Recurring => "recurring",
    }
);

text_enum!(PaymentCategory, "payment category" {
    Expense => "expense",
    Savings => "savings",
});

text_enum!(PaymentStatus, "payment status" {
    Active => "active",
    Paused => "paused",
    Completed => "completed",
});

text_enum!(TxnStatus, "transaction status" {
    Pending => "pending",
    Paid => "paid",
});

text_enum!(TransactionType, "transaction type" {
    Income => "income",
    Expense => "expense",
});

text_enum!(PaymentMethod, "payment method" {
    Cash => "cash",
    Card => "card",
    Upi => "upi",
    BankTransfer => "bank_transfer",
    Cheque => "cheque",
    Other => "other",
});

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub monthly_income: f64,
    pub currency: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Emi {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub emi_type: EmiType,
    pub payment_type: PaymentType,
    pub emi_amount: f64,
    /// Zero means an open-ended subscription.
    pub total_installments: u32,
    pub paid_installments: u32,
    pub start_date: NaiveDate,
    pub next_due_date: Option<NaiveDate>,
    pub status: EmiStatus,
    pub remaining_amount: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub emi_type: PaymentKind,
    pub category: PaymentCategory,
    pub amount: f64,
    pub emi_day: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub paid_count: u32,
    pub status: PaymentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: i64,
    pub payment_id: i64,
    pub payment_date: NaiveDate,
    pub amount: f64,
    pub status: TxnStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseSavingsEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_dashes_and_case() {
        assert_eq!("Super-Admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("FULL_PAYMENT".parse::<PaymentType>().unwrap(), PaymentType::FullPayment);
        assert_eq!(" upi ".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
    }

    #[test]
    fn test_parse_error_lists_choices() {
        let err = "weekly".parse::<PaymentKind>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ending, recurring"), "got: {msg}");
    }

    #[test]
    fn test_serializes_rest_shape() {
        let p = Payment {
            id: 1,
            user_id: 2,
            name: "Rent".to_string(),
            emi_type: PaymentKind::Recurring,
            category: PaymentCategory::Expense,
            amount: 25000.0,
            emi_day: 5,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            end_date: None,
            paid_count: 3,
            status: PaymentStatus::Active,
            notes: None,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["emiType"], "recurring");
        assert_eq!(json["emiDay"], 5);
        assert_eq!(json["startDate"], "2025-01-05");
        assert!(json["endDate"].is_null());
    }

    #[test]
    fn test_round_trips_through_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT)").unwrap();
        conn.execute("INSERT INTO t (v) VALUES (?1)", [EmiType::ConsumerDurable]).unwrap();
        let back: EmiType = conn.query_row("SELECT v FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(back, EmiType::ConsumerDurable);

        conn.execute("UPDATE t SET v = 'bogus'", []).unwrap();
        let bad: rusqlite::Result<EmiType> = conn.query_row("SELECT v FROM t", [], |r| r.get(0));
        assert!(bad.is_err());
    }
}
