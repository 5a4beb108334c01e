// src/db/user_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{AccountStatus, User, UserRole},
};

// Dados de um usuário a ser inserido
pub struct NewUser<'a> {
    pub organization_id: Option<Uuid>,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub role: UserRole,
}

// Alterações administrativas; `None` mantém o valor atual
#[derive(Default)]
pub struct UserChanges<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub role: Option<UserRole>,
    pub status: Option<AccountStatus>,
    pub password_hash: Option<&'a str>,
}

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

// Converte violação de chave única no erro de negócio correspondente
fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            if let Some(constraint) = db_err.constraint() {
                return match constraint {
                    "users_email_key" => AppError::EmailAlreadyExists,
                    "users_username_key" => AppError::UsernameAlreadyExists,
                    _ => AppError::UniqueConstraintViolation(constraint.to_string()),
                };
            }
        }
    }
    e.into()
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // Login aceita tanto o nome de usuário quanto o e-mail; o nome exato tem precedência
    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE username = $1 OR LOWER(email) = LOWER($1)
            ORDER BY (username = $1) DESC, created_at
            LIMIT 1
            "#,
        )
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// `None` lista todos os usuários (visão do system_admin).
    pub async fn list_users(&self, organization_id: Option<Uuid>) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::uuid IS NULL OR organization_id = $1)
            ORDER BY name
            "#,
        )
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn create_user<'e, E>(&self, executor: E, new_user: NewUser<'_>) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, organization_id, username, email, password_hash, name, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
            .bind(Uuid::new_v4())
            .bind(new_user.organization_id)
            .bind(new_user.username)
            .bind(new_user.email)
            .bind(new_user.password_hash)
            .bind(new_user.name)
            .bind(new_user.role.as_str())
            .fetch_one(executor)
            .await
            .map_err(map_unique_violation)
    }

    pub async fn update_user(&self, id: Uuid, changes: UserChanges<'_>) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                status = COALESCE($5, status),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.role.map(|r| r.as_str()))
            .bind(changes.status.map(|s| s.as_str()))
            .bind(changes.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---
    // Controle de tentativas de login
    // ---

    pub async fn record_failed_login(
        &self,
        id: Uuid,
        attempts: i32,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = $2, last_failed_login_at = $3 WHERE id = $1",
        )
            .bind(id)
            .bind(attempts)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_failed_logins(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET failed_login_attempts = 0, last_failed_login_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_successful_login(&self, id: Uuid, ip: Option<&str>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users SET
                failed_login_attempts = 0,
                last_failed_login_at = NULL,
                last_login_at = NOW(),
                last_login_ip = $2
            WHERE id = $1
            "#,
        )
            .bind(id)
            .bind(ip)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---
    // Segundo fator
    // ---

    pub async fn set_two_factor(
        &self,
        id: Uuid,
        encrypted_secret: Option<&str>,
        enabled: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users SET two_factor_secret = $2, two_factor_enabled = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(id)
            .bind(encrypted_secret)
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Fixture;

    #[sqlx::test]
    #[ignore = "requer Postgres em DATABASE_URL"]
    async fn emails_are_unique_regardless_of_case(pool: PgPool) {
        let fx = Fixture::new(pool).await;
        fx.user("ana", UserRole::User).await;

        let duplicate = fx
            .users
            .create_user(
                &fx.pool,
                NewUser {
                    organization_id: Some(fx.organization.id),
                    username: "ana.souza",
                    email: "ANA@acme.com.br",
                    password_hash: "x",
                    name: "Ana Souza",
                    role: UserRole::User,
                },
            )
            .await;
        assert!(matches!(duplicate, Err(AppError::EmailAlreadyExists)));
    }

    #[sqlx::test]
    #[ignore = "requer Postgres em DATABASE_URL"]
    async fn login_lookup_prefers_the_exact_username(pool: PgPool) {
        let fx = Fixture::new(pool).await;
        let vera = fx.user("vera", UserRole::User).await;

        // Linha anterior à validação que proíbe '@' no nome de usuário
        let impostor = fx
            .users
            .create_user(
                &fx.pool,
                NewUser {
                    organization_id: Some(fx.organization.id),
                    username: "vera@acme.com.br",
                    email: "outra@exemplo.com",
                    password_hash: "x",
                    name: "Outra",
                    role: UserRole::User,
                },
            )
            .await
            .unwrap();

        for _ in 0..5 {
            let found = fx.users.find_by_login("vera@acme.com.br").await.unwrap().unwrap();
            assert_eq!(found.id, impostor.id);
        }

        let found = fx.users.find_by_login("VERA@ACME.COM.BR").await.unwrap().unwrap();
        assert_eq!(found.id, vera.id);
        let found = fx.users.find_by_login("vera").await.unwrap().unwrap();
        assert_eq!(found.id, vera.id);
    }
}
