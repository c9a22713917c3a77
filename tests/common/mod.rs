//! Common test utilities

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use atm_bank::api::{build_router, AppState};
use atm_bank::broker::MemoryBroker;
use atm_bank::repository::MemoryDb;
use atm_bank::Services;

/// Memory-backed application with one verified user, one machine and
/// two accounts (100 and 50)
pub struct TestApp {
    pub router: Router,
    pub db: MemoryDb,
    pub broker: MemoryBroker,
    pub user_id: Uuid,
    pub machine_id: Uuid,
    pub account_a: Uuid,
    pub account_b: Uuid,
}

pub async fn memory_app() -> TestApp {
    let db = MemoryDb::new();
    let broker = MemoryBroker::new();

    let user = db.seed_user("ivan@example.com", true).await;
    let machine = db.seed_machine("Moscow, Tverskaya 1").await;
    let a = db.seed_account(user.id, 100).await;
    let b = db.seed_account(user.id, 50).await;

    let state = AppState::new(Services::memory(db.clone(), broker.clone()));

    TestApp {
        router: build_router(state, Duration::from_secs(5)),
        db,
        broker,
        user_id: user.id,
        machine_id: machine.id,
        account_a: a.id,
        account_b: b.id,
    }
}

const SCHEMA_LOCK: i64 = 7_301_001;

/// Setup test database - apply schema
///
/// Tests share the database and run in parallel, so each one seeds its own
/// rows under fresh ids instead of truncating.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Parallel tests would otherwise race on CREATE TABLE
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK)
        .execute(&mut *conn)
        .await
        .expect("Failed to take schema lock");

    // Plain strings run over the simple protocol, which allows multiple statements
    (&mut *conn).execute(include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("Failed to apply schema");

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK)
        .execute(&mut *conn)
        .await
        .expect("Failed to release schema lock");
    drop(conn);

    pool
}

pub async fn seed_pg_user(pool: &PgPool, verified: bool) -> Uuid {
    let id = Uuid::new_v4();
    let email = format!("{}@example.com", id);
    sqlx::query(
        r#"
        INSERT INTO users (id, surname, name, patronymic, email, verified)
        VALUES ($1, 'Ivanov', 'Ivan', 'Ivanovich', $2, $3)
        "#,
    )
    .bind(id)
    .bind(&email)
    .bind(verified)
    .execute(pool)
    .await
    .expect("Failed to seed user");
    id
}

pub async fn seed_pg_machine(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO machines (id, place) VALUES ($1, 'Test place')")
        .bind(id)
        .execute(pool)
        .await
        .expect("Failed to seed machine");
    id
}

pub async fn seed_pg_account(pool: &PgPool, user_id: Uuid, balance: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO accounts (id, user_id, balance) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(user_id)
        .bind(balance)
        .execute(pool)
        .await
        .expect("Failed to seed account");
    id
}

pub async fn pg_balance(pool: &PgPool, account_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}
