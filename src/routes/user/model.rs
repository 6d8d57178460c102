use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Fixed role catalog. Roles are seeded at startup and never created over
/// the API.
pub mod role_names {
    pub const ADMIN: &str = "Admin";
    pub const MANAGER: &str = "Manager";
    pub const SUPERVISOR: &str = "Supervisor";
    pub const STAFF: &str = "Staff";
    pub const MEMBER: &str = "Member";
    pub const USER: &str = "User";
    pub const GUEST: &str = "Guest";

    pub const ALL: [&str; 7] = [ADMIN, MANAGER, SUPERVISOR, STAFF, MEMBER, USER, GUEST];
}

const USER_COLUMNS: &str = "id, email, password_hash, password_salt, first_name, last_name, \
     phone, is_active, email_confirmed, last_login_at, created_at, updated_at";

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub email_confirmed: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub email_confirmed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQueryParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    #[serde(default = "default_order_descending")]
    pub order_descending: bool,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

fn default_order_by() -> String {
    "createdAt".into()
}

fn default_order_descending() -> bool {
    true
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(executor: impl PgExecutor<'_>, new: NewUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users \
                 (id, email, password_hash, password_salt, first_name, last_name, \
                  phone, is_active, email_confirmed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.password_salt)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.phone)
            .bind(new.is_active)
            .bind(new.email_confirmed)
            .fetch_one(executor)
            .await
    }

    pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = now(), updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET password_hash = $1, password_salt = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(password_hash)
        .bind(password_salt)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Partial profile update; absent fields keep their current value.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        phone: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET \
                 email = COALESCE($1, email), \
                 first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 phone = COALESCE($4, phone), \
                 is_active = COALESCE($5, is_active), \
                 updated_at = now() \
             WHERE id = $6 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(first_name)
            .bind(last_name)
            .bind(phone)
            .bind(is_active)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Refresh tokens and role links go with the user via cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list(
        pool: &PgPool,
        params: &UserQueryParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        // Only known column names reach the ORDER BY clause.
        let order_column = match params.order_by.as_str() {
            "email" => "email",
            "firstName" => "first_name",
            "lastName" => "last_name",
            _ => "created_at",
        };
        let direction = if params.order_descending { "DESC" } else { "ASC" };

        let page = params.page.max(1);
        let page_size = params.page_size.clamp(1, 100);

        let filter = "($1::text IS NULL \
                OR first_name ILIKE '%' || $1 || '%' \
                OR last_name ILIKE '%' || $1 || '%' \
                OR email ILIKE '%' || $1 || '%') \
           AND ($2::boolean IS NULL OR is_active = $2)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
                .bind(&params.search)
                .bind(params.is_active)
                .fetch_one(pool)
                .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} \
             ORDER BY {order_column} {direction} LIMIT $3 OFFSET $4"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(&params.search)
            .bind(params.is_active)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(pool)
            .await?;

        Ok((users, total))
    }

    pub async fn roles(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT r.name FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 \
             ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Links the user to a named role. Returns false when no such role
    /// exists; assigning an already-held role surfaces a unique violation.
    pub async fn add_role(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) \
             SELECT $1, id FROM roles WHERE name = $2",
        )
        .bind(user_id)
        .bind(role_name)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_role(
        pool: &PgPool,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM user_roles ur USING roles r \
             WHERE ur.role_id = r.id AND ur.user_id = $1 AND r.name = $2",
        )
        .bind(user_id)
        .bind(role_name)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn clear_roles(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub role_names: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub role_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedUsersResponse {
    pub users: Vec<crate::routes::auth::model::UserDto>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub async fn ensure(
        pool: &PgPool,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO roles (id, name, description) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(found.is_some())
    }
}
