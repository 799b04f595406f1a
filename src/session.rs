use rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Permission, User};
use crate::roles;
use crate::settings::Settings;
use crate::users;

/// The logged-in user, resolved once per command and handed to every
/// operation that reads or writes personal data.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn load(conn: &Connection, settings: &Settings) -> Result<Session> {
        let id = settings.active_user_id.ok_or(AppError::NotLoggedIn)?;
        match users::get(conn, id) {
            Ok(user) => Ok(Session { user }),
            Err(AppError::NotFound { .. }) => {
                log::warn!("active user {id} no longer exists");
                Err(AppError::NotLoggedIn)
            }
            Err(e) => Err(e),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn currency(&self) -> &str {
        &self.user.currency
    }

    pub fn require(&self, conn: &Connection, permission: Permission) -> Result<()> {
        roles::require(conn, &self.user, permission)
    }
}

/// Looks the user up by email and remembers them in `settings`. The caller
/// persists the settings.
pub fn login(conn: &Connection, settings: &mut Settings, email: &str) -> Result<User> {
    let user = users::find_by_email(conn, email)?
        .ok_or_else(|| AppError::not_found("User", email))?;
    settings.active_user_id = Some(user.id);
    log::info!("logged in as {} ({})", user.email, user.id);
    Ok(user)
}

/// Returns `false` when nobody was logged in.
pub fn logout(settings: &mut Settings) -> bool {
    settings.active_user_id.take().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn test_load_requires_login() {
        let (_dir, conn) = test_db();
        let settings = Settings::default();
        assert!(matches!(Session::load(&conn, &settings).unwrap_err(), AppError::NotLoggedIn));
    }

    #[test]
    fn test_login_then_load() {
        let (_dir, conn) = test_db();
        users::register(&conn, "Asha", "asha@example.com", 1000.0, "INR").unwrap();
        let mut settings = Settings::default();
        let user = login(&conn, &mut settings, "ASHA@example.com").unwrap();
        let session = Session::load(&conn, &settings).unwrap();
        assert_eq!(session.user_id(), user.id);
        assert_eq!(session.currency(), "INR");
        assert!(session.require(&conn, Permission::ManageOwnData).is_ok());
    }

    #[test]
    fn test_login_unknown_email() {
        let (_dir, conn) = test_db();
        let mut settings = Settings::default();
        assert!(login(&conn, &mut settings, "ghost@example.com").is_err());
        assert!(settings.active_user_id.is_none());
    }

    #[test]
    fn test_stale_session_is_logged_out() {
        let (_dir, conn) = test_db();
        let settings = Settings {
            active_user_id: Some(99),
            ..Settings::default()
        };
        assert!(matches!(Session::load(&conn, &settings).unwrap_err(), AppError::NotLoggedIn));
    }

    #[test]
    fn test_logout() {
        let mut settings = Settings {
            active_user_id: Some(1),
            ..Settings::default()
        };
        assert!(logout(&mut settings));
        assert!(!logout(&mut settings));
    }
}
