use rusqlite::Connection;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Permission, Role, User};

#[derive(Debug, Clone, Serialize)]
pub struct RolePermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

pub fn permissions_for(conn: &Connection, role: Role) -> Result<Vec<Permission>> {
    let mut stmt = conn.prepare(
        "SELECT permission FROM role_permissions WHERE role = ?1 ORDER BY permission",
    )?;
    let rows = stmt
        .query_map([role], |row| row.get(0))?
        .collect::<std::result::Result<Vec<Permission>, _>>()?;
    Ok(rows)
}

pub fn list(conn: &Connection) -> Result<Vec<RolePermissions>> {
    Role::ALL
        .iter()
        .map(|&role| {
            Ok(RolePermissions {
                role,
                permissions: permissions_for(conn, role)?,
            })
        })
        .collect()
}

pub fn has_permission(conn: &Connection, role: Role, permission: Permission) -> Result<bool> {
    let mut stmt =
        conn.prepare_cached("SELECT 1 FROM role_permissions WHERE role = ?1 AND permission = ?2")?;
    Ok(stmt.exists(rusqlite::params![role, permission])?)
}

pub fn require(conn: &Connection, user: &User, permission: Permission) -> Result<()> {
    if has_permission(conn, user.role, permission)? {
        Ok(())
    } else {
        log::warn!("{} ({}) lacks {permission}", user.email, user.role);
        Err(AppError::Forbidden(format!(
            "role '{}' does not have '{permission}'",
            user.role
        )))
    }
}

/// Returns `false` when the role already had the permission.
pub fn grant(conn: &Connection, actor: &User, role: Role, permission: Permission) -> Result<bool> {
    require(conn, actor, Permission::ManageRoles)?;
    let added = conn.execute(
        "INSERT OR IGNORE INTO role_permissions (role, permission) VALUES (?1, ?2)",
        rusqlite::params![role, permission],
    )?;
    if added > 0 {
        log::info!("{} granted {permission} to {role}", actor.email);
    }
    Ok(added > 0)
}

/// Returns `false` when the role did not have the permission.
pub fn revoke(conn: &Connection, actor: &User, role: Role, permission: Permission) -> Result<bool> {
    require(conn, actor, Permission::ManageRoles)?;
    if role == Role::SuperAdmin && permission == Permission::ManageRoles {
        return Err(AppError::Validation(
            "super_admin always keeps manage_roles".to_string(),
        ));
    }
    let removed = conn.execute(
        "DELETE FROM role_permissions WHERE role = ?1 AND permission = ?2",
        rusqlite::params![role, permission],
    )?;
    if removed > 0 {
        log::info!("{} revoked {permission} from {role}", actor.email);
    }
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::users;

    #[test]
    fn test_default_permissions() {
        let (_dir, conn) = test_db();
        assert!(has_permission(&conn, Role::User, Permission::ManageOwnData).unwrap());
        assert!(!has_permission(&conn, Role::User, Permission::ViewUsers).unwrap());
        assert!(has_permission(&conn, Role::Admin, Permission::ManageUsers).unwrap());
        assert!(!has_permission(&conn, Role::Admin, Permission::ManageRoles).unwrap());
        assert!(has_permission(&conn, Role::SuperAdmin, Permission::ManageRoles).unwrap());
    }

    #[test]
    fn test_list_covers_every_role() {
        let (_dir, conn) = test_db();
        let all = list(&conn).unwrap();
        assert_eq!(all.len(), 3);
        let user = all.iter().find(|r| r.role == Role::User).unwrap();
        assert_eq!(user.permissions, vec![Permission::ManageOwnData, Permission::ViewReports]);
    }

    #[test]
    fn test_grant_and_revoke() {
        let (_dir, conn) = test_db();
        let root = users::register(&conn, "Root", "root@example.com", 0.0, "INR").unwrap();
        assert!(grant(&conn, &root, Role::User, Permission::ViewUsers).unwrap());
        assert!(!grant(&conn, &root, Role::User, Permission::ViewUsers).unwrap());
        assert!(has_permission(&conn, Role::User, Permission::ViewUsers).unwrap());
        assert!(revoke(&conn, &root, Role::User, Permission::ViewUsers).unwrap());
        assert!(!revoke(&conn, &root, Role::User, Permission::ViewUsers).unwrap());
    }

    #[test]
    fn test_only_role_managers_can_grant() {
        let (_dir, conn) = test_db();
        users::register(&conn, "Root", "root@example.com", 0.0, "INR").unwrap();
        let plain = users::register(&conn, "Plain", "plain@example.com", 0.0, "INR").unwrap();
        let err = grant(&conn, &plain, Role::User, Permission::ManageRoles).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_super_admin_keeps_manage_roles() {
        let (_dir, conn) = test_db();
        let root = users::register(&conn, "Root", "root@example.com", 0.0, "INR").unwrap();
        assert!(revoke(&conn, &root, Role::SuperAdmin, Permission::ManageRoles).is_err());
        assert!(has_permission(&conn, Role::SuperAdmin, Permission::ManageRoles).unwrap());
    }
}
