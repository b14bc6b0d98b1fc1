//! Transfer routes.

use axum::{Json, Router, extract::State, routing::post};
use banka_core::Caller;
use banka_shared::{AccountId, Money};
use serde::Deserialize;

use super::accounts::TransactionResponse;
use crate::{AppState, error::ApiError, extractors::ApiJson, middleware::AuthUser};

/// Creates the transfer routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transfer", post(transfer))
        .route("/transfer/to-username", post(transfer_to_username))
        .route("/transfer/by-usernames", post(transfer_by_usernames))
}

/// Request body for an account-to-account transfer.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Source account; must belong to the caller.
    pub from_account_id: AccountId,
    /// Any existing destination account.
    pub to_account_id: AccountId,
    /// Decimal amount.
    pub amount: Money,
}

/// Request body for paying a user's default account.
#[derive(Debug, Deserialize)]
pub struct ToUsernameRequest {
    /// Source account; must belong to the caller.
    pub from_account_id: AccountId,
    /// Recipient handle.
    pub to_username: String,
    /// Decimal amount.
    pub amount: Money,
}

/// Request body for a handle-to-handle transfer.
#[derive(Debug, Deserialize)]
pub struct ByUsernamesRequest {
    /// Source handle; must be the caller.
    pub from_username: String,
    /// Recipient handle.
    pub to_username: String,
    /// Decimal amount.
    pub amount: Money,
}

/// POST `/transfer`
async fn transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<TransferRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let tx = state
        .engine
        .transfer_by_accounts(
            auth.user_id(),
            payload.from_account_id,
            payload.to_account_id,
            payload.amount,
        )
        .await?;
    Ok(Json(tx.into()))
}

/// POST `/transfer/to-username`
async fn transfer_to_username(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ToUsernameRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let tx = state
        .engine
        .transfer_to_handle(
            auth.user_id(),
            payload.from_account_id,
            &payload.to_username,
            payload.amount,
        )
        .await?;
    Ok(Json(tx.into()))
}

/// POST `/transfer/by-usernames` - The caller must be `from_username`.
async fn transfer_by_usernames(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ByUsernamesRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let tx = state
        .engine
        .transfer_by_handles(
            Caller::User(auth.user_id()),
            &payload.from_username,
            &payload.to_username,
            payload.amount,
        )
        .await?;
    Ok(Json(tx.into()))
}
