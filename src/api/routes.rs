//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, OperationContext};
use crate::error::{AppError, AppResult};
use crate::service::{MachineCommand, TransferCommand, TransferResult};
use crate::transaction::Backend;

use super::middleware::{MACHINE_HEADER, REQUEST_USER_HEADER};
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountsListResponse {
    pub accounts: Vec<AccountResponse>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to: Uuid,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: i64,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route(
            "/accounts",
            post(create_account::<B>).get(list_accounts::<B>),
        )
        .route(
            "/accounts/:account_id",
            get(get_account::<B>).delete(delete_account::<B>),
        )
        .route("/accounts/:account_id/transfer", post(transfer::<B>))
        .route("/accounts/:account_id/cashout", post(cash_out::<B>))
        .route("/accounts/:account_id/deposit", post(deposit::<B>))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

fn request_user(context: &OperationContext) -> AppResult<Uuid> {
    context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader(REQUEST_USER_HEADER.to_string()))
}

fn request_machine(context: &OperationContext) -> AppResult<Uuid> {
    context
        .machine_id
        .ok_or_else(|| AppError::MissingHeader(MACHINE_HEADER.to_string()))
}

// =========================================================================
// Accounts
// =========================================================================

/// Open a new account for the requesting user
async fn create_account<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    let user_id = request_user(&context)?;
    let exec = state.services.executor();

    let account = state.services.accounts.create(&exec, user_id).await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn list_accounts<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<AccountsListResponse>> {
    let user_id = request_user(&context)?;
    let exec = state.services.executor();

    let accounts = state.services.accounts.list(&exec, user_id).await?;

    Ok(Json(AccountsListResponse {
        accounts: accounts.into_iter().map(AccountResponse::from).collect(),
    }))
}

async fn get_account<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<AccountResponse>> {
    let user_id = request_user(&context)?;
    let exec = state.services.executor();

    let account = state.services.accounts.get(&exec, user_id, account_id).await?;

    Ok(Json(account.into()))
}

async fn delete_account<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user_id = request_user(&context)?;
    let exec = state.services.executor();

    state
        .services
        .accounts
        .delete(&exec, user_id, account_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Balance mutations
// =========================================================================

async fn transfer<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<TransferResult>> {
    let user_id = request_user(&context)?;
    let exec = state.services.executor();

    let command = TransferCommand::new(user_id, account_id, request.to, request.amount);
    let result = state.services.accounts.transfer(&exec, command).await?;

    Ok(Json(result))
}

async fn cash_out<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> AppResult<Json<AccountResponse>> {
    let user_id = request_user(&context)?;
    let machine_id = request_machine(&context)?;
    let exec = state.services.executor();

    let command = MachineCommand::new(machine_id, user_id, account_id, request.amount);
    let account = state.services.machines.cash_out(&exec, command).await?;

    Ok(Json(account.into()))
}

async fn deposit<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> AppResult<Json<AccountResponse>> {
    let user_id = request_user(&context)?;
    let machine_id = request_machine(&context)?;
    let exec = state.services.executor();

    let command = MachineCommand::new(machine_id, user_id, account_id, request.amount);
    let account = state.services.machines.deposit(&exec, command).await?;

    Ok(Json(account.into()))
}
