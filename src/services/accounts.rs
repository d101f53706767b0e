use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::db::queries::{self, NewUser};
use crate::errors::AppError;
use crate::models::{Role, User};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStaffRequest {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStaffRequest {
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
}

/// A freshly created account and the bearer token it authenticates with.
/// The token is only ever returned here.
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub user: User,
    pub api_token: String,
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::InvalidRequest(format!("{raw:?} is not an email address"))),
    }
}

fn required_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name is required".into()));
    }
    Ok(name)
}

fn open_account(
    db: &mut Connection,
    name: &str,
    email: &str,
    phone: &str,
    role: Role,
) -> Result<Credentials, AppError> {
    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;
    if queries::email_exists(&tx, email)? {
        return Err(AppError::EmailExists(email.to_string()));
    }

    let api_token = Uuid::new_v4().simple().to_string();
    let id = queries::create_user(
        &tx,
        &NewUser {
            name,
            email,
            phone: phone.trim(),
            role,
            api_token: &api_token,
        },
    )
    .map_err(|e| {
        error!(error = %e, role = role.as_str(), "failed to create user");
        AppError::Storage(e)
    })?;
    let user = queries::get_user_by_token(&tx, &api_token)?
        .ok_or_else(|| AppError::Storage(anyhow::anyhow!("user {id} vanished after insert")))?;
    tx.commit().map_err(|e| {
        error!(user_id = id, error = %e, "failed to commit new account");
        AppError::CommitFailed
    })?;

    info!(user_id = id, role = role.as_str(), "account created");
    Ok(Credentials { user, api_token })
}

/// Self-service customer sign-up.
pub fn register(db: &mut Connection, req: &RegisterRequest) -> Result<Credentials, AppError> {
    let email = normalize_email(&req.email)?;
    let name = format!("{} {}", req.first_name.trim(), req.last_name.trim());
    let name = required_name(&name)?;
    open_account(db, name, &email, &req.phone, Role::Customer)
}

pub fn create_staff(db: &mut Connection, req: &CreateStaffRequest) -> Result<Credentials, AppError> {
    let email = normalize_email(&req.email)?;
    let name = required_name(&req.full_name)?;
    open_account(db, name, &email, &req.phone, Role::Staff)
}

pub fn list_staff(conn: &Connection) -> Result<Vec<User>, AppError> {
    Ok(queries::list_users_by_role(conn, Role::Staff)?)
}

pub fn list_customers(conn: &Connection) -> Result<Vec<User>, AppError> {
    Ok(queries::list_users_by_role(conn, Role::Customer)?)
}

pub fn get_staff(conn: &Connection, id: i64) -> Result<User, AppError> {
    queries::get_active_user_with_role(conn, id, Role::Staff)?.ok_or(AppError::StaffNotFound(id))
}

pub fn update_staff(
    conn: &Connection,
    id: i64,
    req: &UpdateStaffRequest,
) -> Result<User, AppError> {
    let name = required_name(&req.full_name)?;
    if !queries::update_user_profile(conn, id, Role::Staff, name, req.phone.trim())? {
        return Err(AppError::StaffNotFound(id));
    }
    info!(staff_id = id, "staff updated");
    get_staff(conn, id)
}

/// Revokes a staff account. Bookings and history that reference it stay.
pub fn delete_staff(conn: &Connection, id: i64) -> Result<(), AppError> {
    if !queries::deactivate_user(conn, id, Role::Staff)? {
        return Err(AppError::StaffNotFound(id));
    }
    info!(staff_id = id, "staff deactivated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            first_name: " Lan ".into(),
            last_name: "Nguyen".into(),
            phone: "0901234567".into(),
        }
    }

    fn staff_request(email: &str) -> CreateStaffRequest {
        CreateStaffRequest {
            full_name: "Minh Tran".into(),
            email: email.into(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_register_issues_a_working_token() {
        let mut conn = testing::conn();
        let creds = register(&mut conn, &registration("  Lan@Example.COM ")).unwrap();

        assert_eq!(creds.user.email, "lan@example.com");
        assert_eq!(creds.user.name, "Lan Nguyen");
        assert_eq!(creds.user.phone, "0901234567");
        assert_eq!(creds.user.role, Role::Customer);

        let holder = queries::get_user_by_token(&conn, &creds.api_token).unwrap().unwrap();
        assert_eq!(holder.id, creds.user.id);
    }

    #[test]
    fn test_register_rejects_taken_or_malformed_email() {
        let mut conn = testing::conn();
        register(&mut conn, &registration("lan@example.com")).unwrap();

        let err = register(&mut conn, &registration("LAN@example.com")).unwrap_err();
        assert!(matches!(err, AppError::EmailExists(_)));
        let err = register(&mut conn, &registration("not-an-email")).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let blank = RegisterRequest {
            first_name: " ".into(),
            last_name: String::new(),
            ..registration("other@example.com")
        };
        assert!(matches!(register(&mut conn, &blank), Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn test_staff_lifecycle() {
        let mut conn = testing::conn();
        let creds = create_staff(&mut conn, &staff_request("minh@example.com")).unwrap();
        let id = creds.user.id;
        assert_eq!(creds.user.role, Role::Staff);
        assert_eq!(list_staff(&conn).unwrap().len(), 1);

        let updated = update_staff(
            &conn,
            id,
            &UpdateStaffRequest {
                full_name: "Minh Q. Tran".into(),
                phone: "0911".into(),
            },
        )
        .unwrap();
        assert_eq!(updated.name, "Minh Q. Tran");
        assert_eq!(updated.phone, "0911");
        assert_eq!(updated.email, "minh@example.com");

        delete_staff(&conn, id).unwrap();
        assert!(list_staff(&conn).unwrap().is_empty());
        assert!(matches!(get_staff(&conn, id), Err(AppError::StaffNotFound(_))));
        assert!(matches!(delete_staff(&conn, id), Err(AppError::StaffNotFound(_))));

        let revoked = queries::get_user_by_token(&conn, &creds.api_token).unwrap().unwrap();
        assert!(!revoked.is_active);
    }

    #[test]
    fn test_staff_operations_ignore_customers() {
        let conn = testing::conn();
        let customer = testing::customer(&conn, "guest@example.com");

        assert!(matches!(get_staff(&conn, customer), Err(AppError::StaffNotFound(_))));
        assert!(matches!(delete_staff(&conn, customer), Err(AppError::StaffNotFound(_))));
        assert_eq!(list_customers(&conn).unwrap().len(), 1);
        assert!(list_staff(&conn).unwrap().is_empty());
    }
}
