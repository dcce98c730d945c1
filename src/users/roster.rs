use axum::{
    debug_handler,
    extract::{Multipart, State},
    Json,
};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    auth::{self, roles::ADMINS, AuthUser},
    uploads, AppError, AppResult, AppState,
};

use super::{validate_email, validate_username, NewUser, Role};

/// One line of a roster CSV. The header row names the columns; only
/// `username` and `email` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterRow {
    pub username: String,
    pub email: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub year: Option<i64>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Created {
    username: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Skipped {
    line: u64,
    username: Option<String>,
    reason: String,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct RosterReport {
    created: Vec<Created>,
    skipped: Vec<Skipped>,
}

/// Parses roster rows, pairing each with its 1-based line number.
pub fn parse_roster(bytes: &[u8]) -> Vec<(u64, Result<RosterRow, String>)> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes)
        .deserialize::<RosterRow>()
        .enumerate()
        .map(|(index, row)| (index as u64 + 2, row.map_err(|err| err.to_string())))
        .collect()
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

fn validate_row(row: &RosterRow) -> AppResult<Role> {
    validate_username(&row.username)?;
    validate_email(&row.email)?;
    if let Some(password) = &row.password {
        auth::validate_password(password)?;
    }
    match row.role.as_deref() {
        Some(role) => role.parse(),
        None => Ok(Role::Student),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn upload(
    State(db_pool): State<SqlitePool>,
    admin: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<RosterReport>> {
    admin.require(ADMINS)?;

    let file = uploads::Form::read(multipart).await?.take_file("file")?;
    let rows = parse_roster(&file.bytes);
    if rows.is_empty() {
        return Err(AppError::bad_request("roster has no rows"));
    }

    let mut report = RosterReport::default();
    let mut tx = db_pool.begin().await?;

    for (line, row) in rows {
        let row = match row {
            Ok(row) => row,
            Err(reason) => {
                report.skipped.push(Skipped { line, username: None, reason });
                continue;
            }
        };

        let role = match validate_row(&row) {
            Ok(role) => role,
            Err(err) => {
                report.skipped.push(Skipped { line, username: Some(row.username), reason: err.to_string() });
                continue;
            }
        };

        if super::find_by_username(&mut *tx, &row.username).await?.is_some() {
            report.skipped.push(Skipped {
                line,
                username: Some(row.username),
                reason: "username already taken".to_owned(),
            });
            continue;
        }

        let generated_password = row.password.is_none().then(generate_password);
        let password = row.password.as_deref().or(generated_password.as_deref()).unwrap_or_default();

        let user = super::insert(
            &mut *tx,
            &NewUser {
                username: row.username,
                password_hash: auth::hash_password(password)?,
                email: row.email,
                role,
                department: row.department.filter(|department| !department.is_empty()),
                year: row.year,
            },
        )
        .await?;

        report.created.push(Created { username: user.username, role: user.role, generated_password });
    }

    tx.commit().await?;

    info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        by = %admin.username,
        "roster imported"
    );
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_optional_columns() {
        let csv = "username,email,role,department,year,password\n\
                   ada,ada@club.org,chair,CS,3,\n\
                   bob,bob@club.org,,,,hunter2hunter2\n";
        let rows = parse_roster(csv.as_bytes());
        assert_eq!(rows.len(), 2);

        let (line, ada) = &rows[0];
        let ada = ada.as_ref().unwrap();
        assert_eq!(*line, 2);
        assert_eq!(ada.role.as_deref(), Some("chair"));
        assert_eq!(ada.year, Some(3));
        assert_eq!(ada.password, None);

        let bob = rows[1].1.as_ref().unwrap();
        assert_eq!(bob.role, None);
        assert_eq!(bob.year, None);
        assert_eq!(bob.password.as_deref(), Some("hunter2hunter2"));
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let csv = "username,email,year\nada,ada@club.org,third\ncy,cy@club.org,1\n";
        let rows = parse_roster(csv.as_bytes());
        assert!(rows[0].1.is_err());
        assert!(rows[1].1.is_ok());
    }

    #[test]
    fn rows_default_to_student() {
        let row = RosterRow {
            username: "dee".into(),
            email: "dee@club.org".into(),
            role: None,
            department: None,
            year: None,
            password: None,
        };
        assert_eq!(validate_row(&row).unwrap(), Role::Student);

        let row = RosterRow { role: Some("wizard".into()), ..row };
        assert!(validate_row(&row).is_err());
    }

    #[test]
    fn generated_passwords_are_long_enough() {
        let password = generate_password();
        assert_eq!(password.len(), 12);
        assert!(auth::validate_password(&password).is_ok());
    }
}
