//! Account routes: creation, listing, statements and top-ups.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use banka_core::{Account, LedgerTransaction, TransactionKind};
use banka_shared::{AccountId, Money, PageRequest, PageResponse, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::ApiError,
    extractors::{ApiJson, ApiQuery},
    middleware::AuthUser,
};

/// Creates the account routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/topup", post(top_up))
        .route("/accounts/{account_id}", get(get_account))
        .route("/accounts/{account_id}/transactions", get(list_transactions))
}

/// Response for an account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// Current balance as a decimal string.
    pub balance: Money,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            balance: account.balance,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Response for one ledger entry.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: TransactionId,
    /// `top_up` or `transfer`.
    pub kind: TransactionKind,
    /// Debited account, absent for top-ups.
    pub from_account_id: Option<AccountId>,
    /// Credited account.
    pub to_account_id: AccountId,
    /// Amount as a decimal string.
    pub amount: Money,
    /// RFC 3339 commit time.
    pub created_at: String,
}

impl From<LedgerTransaction> for TransactionResponse {
    fn from(tx: LedgerTransaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind(),
            from_account_id: tx.from_account_id,
            to_account_id: tx.to_account_id,
            amount: tx.amount,
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// Request body for a top-up.
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    /// Account to credit; must belong to the caller.
    pub account_id: AccountId,
    /// Decimal amount, string or number.
    pub amount: Money,
}

/// POST `/accounts` - Open a new zero-balance account for the caller.
async fn create_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = state.engine.create_account(auth.user_id()).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET `/accounts` - The caller's accounts, lowest id first.
async fn list_accounts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let accounts = state.engine.accounts(auth.user_id()).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// GET `/accounts/{account_id}` - One of the caller's accounts.
async fn get_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<AccountId>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.engine.account(auth.user_id(), account_id).await?;
    Ok(Json(account.into()))
}

/// GET `/accounts/{account_id}/transactions` - Newest-first statement.
async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<AccountId>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<Json<PageResponse<TransactionResponse>>, ApiError> {
    let statement = state
        .engine
        .statement(auth.user_id(), account_id, page)
        .await?;
    Ok(Json(statement.map(Into::into)))
}

/// POST `/accounts/topup` - Credit one of the caller's accounts.
async fn top_up(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<TopUpRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let tx = state
        .engine
        .top_up(auth.user_id(), payload.account_id, payload.amount)
        .await?;
    Ok(Json(tx.into()))
}
