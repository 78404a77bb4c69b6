/// Payment confirmation
///
/// `POST /v1/payments/:id/confirm` marks a rent record as paid. The first
/// confirmed payment of a team advances activation to stage 4.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::team::CurrentTeam,
};
use axum::{
    extract::{Path, State},
    Json,
};
use rentdesk_shared::{
    activation::{record_milestone, Milestone},
    auth::{authorization::Requirement, permissions::TeamPermission},
    models::{
        audit_log::{NewAuditEntry, TeamAuditLog},
        rental_transaction::RentalTransaction,
    },
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub transaction: RentalTransaction,
    /// True when this payment was the team's first
    pub first_payment: bool,
}

/// Confirms a rent payment
///
/// Requires `payments.confirm`.
///
/// # Errors
///
/// - `404 Not Found`: record does not belong to the active team
/// - `409 Conflict`: record is already paid or cancelled
pub async fn confirm_payment(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<Json<ConfirmPaymentResponse>> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::PaymentsConfirm))
        .await?;

    let existing = RentalTransaction::find_in_team(&state.db, ctx.team_id, transaction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;

    let transaction = RentalTransaction::mark_paid(&state.db, transaction_id)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict("Transaction is already paid or cancelled".to_string())
        })?;

    let first_payment =
        record_milestone(&state.db, ctx.team_id, Milestone::FirstPayment, Some(transaction.id))
            .await?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "payment.confirmed")
            .resource("rental_transaction", transaction.id)
            .change(
                Some(json!({ "status": existing.status })),
                Some(json!({ "status": transaction.status, "paid_at": transaction.paid_at })),
            ),
    )
    .await?;

    tracing::info!(
        team_id = %ctx.team_id,
        transaction_id = %transaction.id,
        amount_due = transaction.amount_due,
        first_payment,
        "Payment confirmed"
    );

    Ok(Json(ConfirmPaymentResponse {
        success: true,
        transaction,
        first_payment,
    }))
}
