//! PostgreSQL repositories

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Account, Machine, User};
use crate::transaction::Executor;

use super::{AccountRepository, MachineRepository, RepositoryError, UserRepository};

const ACCOUNT_COLUMNS: &str = "id, user_id, balance, created_at";
const USER_COLUMNS: &str = "id, surname, name, patronymic, email, verified";

#[derive(Debug, Clone, Copy, Default)]
pub struct PgAccountRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct PgUserRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct PgMachineRepository;

#[async_trait]
impl AccountRepository<PgPool> for PgAccountRepository {
    async fn create(
        &self,
        exec: &Executor<PgPool>,
        user_id: Uuid,
    ) -> Result<Account, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (id, user_id, balance, created_at) \
             VALUES ($1, $2, 0, $3) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(account)
    }

    async fn get(&self, exec: &Executor<PgPool>, id: Uuid) -> Result<Account, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let row = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.ok_or(RepositoryError::AccountNotFound(id))
    }

    async fn get_for_update(
        &self,
        exec: &Executor<PgPool>,
        id: Uuid,
    ) -> Result<Account, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let row = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.ok_or(RepositoryError::AccountNotFound(id))
    }

    async fn list_by_user(
        &self,
        exec: &Executor<PgPool>,
        user_id: Uuid,
    ) -> Result<Vec<Account>, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(accounts)
    }

    async fn count_by_user(
        &self,
        exec: &Executor<PgPool>,
        user_id: Uuid,
    ) -> Result<i64, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }

    async fn update_balance(
        &self,
        exec: &Executor<PgPool>,
        id: Uuid,
        balance: i64,
    ) -> Result<Account, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let row = sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(balance)
        .fetch_optional(&mut *conn)
        .await?;

        row.ok_or(RepositoryError::AccountNotFound(id))
    }

    async fn delete(&self, exec: &Executor<PgPool>, id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = exec.resolve().await?;

        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::AccountNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository<PgPool> for PgUserRepository {
    async fn get(&self, exec: &Executor<PgPool>, id: Uuid) -> Result<User, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let row = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.ok_or(RepositoryError::UserNotFound(id))
    }

    async fn get_for_update(
        &self,
        exec: &Executor<PgPool>,
        id: Uuid,
    ) -> Result<User, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.ok_or(RepositoryError::UserNotFound(id))
    }
}

#[async_trait]
impl MachineRepository<PgPool> for PgMachineRepository {
    async fn get(&self, exec: &Executor<PgPool>, id: Uuid) -> Result<Machine, RepositoryError> {
        let mut conn = exec.resolve().await?;

        let row = sqlx::query_as::<_, Machine>("SELECT id, place FROM machines WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.ok_or(RepositoryError::MachineNotFound(id))
    }
}
