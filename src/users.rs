use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{AppError, Result};
use crate::models::{Permission, Role, User};
use crate::roles;
use crate::validation;

const COLUMNS: &str = "id, name, email, role, monthly_income, currency, created_at";

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        monthly_income: row.get(4)?,
        currency: row.get(5)?,
        created_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

/// Creates a user. The very first account becomes the super admin.
pub fn register(
    conn: &Connection,
    name: &str,
    email: &str,
    monthly_income: f64,
    currency: &str,
) -> Result<User> {
    validation::require_text("Name", name)?;
    validation::email(email)?;
    validation::non_negative_amount("Monthly income", monthly_income)?;
    let currency = validation::currency(currency)?;

    if find_by_email(conn, email)?.is_some() {
        return Err(AppError::Validation(format!("{email} is already registered")));
    }

    let existing: i64 = conn.query_row("SELECT count(*) FROM users", [], |r| r.get(0))?;
    let role = if existing == 0 { Role::SuperAdmin } else { Role::User };

    conn.execute(
        "INSERT INTO users (name, email, role, monthly_income, currency) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![name.trim(), email.trim(), role, monthly_income, currency],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("registered user {id} <{}> as {role}", email.trim());
    get(conn, id)
}

pub fn get(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        [id],
        row_to_user,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("User", id))
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
            [email.trim()],
            row_to_user,
        )
        .optional()?)
}

pub fn list(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))?;
    let rows = stmt
        .query_map([], row_to_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub monthly_income: Option<f64>,
    pub currency: Option<String>,
}

pub fn update_profile(conn: &Connection, id: i64, update: &ProfileUpdate) -> Result<User> {
    let mut user = get(conn, id)?;
    if let Some(name) = &update.name {
        validation::require_text("Name", name)?;
        user.name = name.trim().to_string();
    }
    if let Some(income) = update.monthly_income {
        validation::non_negative_amount("Monthly income", income)?;
        user.monthly_income = income;
    }
    if let Some(currency) = &update.currency {
        user.currency = validation::currency(currency)?;
    }
    conn.execute(
        "UPDATE users SET name = ?1, monthly_income = ?2, currency = ?3 WHERE id = ?4",
        rusqlite::params![user.name, user.monthly_income, user.currency, id],
    )?;
    log::info!("updated profile of user {id}");
    Ok(user)
}

fn count_role(conn: &Connection, role: Role) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM users WHERE role = ?1", [role], |r| r.get(0))?)
}

/// Changes another user's role. Only a super admin may hand out or take
/// away `super_admin`, and the last super admin cannot be demoted.
pub fn set_role(conn: &Connection, actor: &User, target_id: i64, role: Role) -> Result<User> {
    roles::require(conn, actor, Permission::ManageUsers)?;
    let target = get(conn, target_id)?;

    let touches_super = role == Role::SuperAdmin || target.role == Role::SuperAdmin;
    if touches_super && actor.role != Role::SuperAdmin {
        return Err(AppError::Forbidden(
            "only a super admin can assign or remove super_admin".to_string(),
        ));
    }
    if target.role == Role::SuperAdmin && role != Role::SuperAdmin && count_role(conn, Role::SuperAdmin)? <= 1 {
        return Err(AppError::Validation(
            "cannot demote the last super admin".to_string(),
        ));
    }

    conn.execute("UPDATE users SET role = ?1 WHERE id = ?2", rusqlite::params![role, target_id])?;
    log::info!("{} changed role of user {target_id} from {} to {role}", actor.email, target.role);
    get(conn, target_id)
}

/// Deletes a user and, through foreign-key cascades, everything they own.
pub fn delete(conn: &Connection, actor: &User, target_id: i64) -> Result<User> {
    roles::require(conn, actor, Permission::ManageUsers)?;
    if actor.id == target_id {
        return Err(AppError::Validation("you cannot delete your own account".to_string()));
    }
    let target = get(conn, target_id)?;
    if target.role == Role::SuperAdmin {
        if actor.role != Role::SuperAdmin {
            return Err(AppError::Forbidden(
                "only a super admin can delete a super admin".to_string(),
            ));
        }
        if count_role(conn, Role::SuperAdmin)? <= 1 {
            return Err(AppError::Validation(
                "cannot delete the last super admin".to_string(),
            ));
        }
    }
    conn.execute("DELETE FROM users WHERE id = ?1", [target_id])?;
    log::info!("{} deleted user {target_id} <{}>", actor.email, target.email);
    Ok(target)
}
