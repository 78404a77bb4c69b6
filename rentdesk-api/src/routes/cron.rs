/// Scheduled job endpoints
///
/// Called by the platform scheduler with `Authorization: Bearer <CRON_SECRET>`.
///
/// # Endpoints
///
/// ```text
/// GET  /api/cron                                   # dispatch late-payment reminders
/// GET  /api/cron/generate-monthly-rentals?date=... # create this month's rent records
/// POST /api/reset-reminders                        # clear reminder flags of a period
/// ```

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, Utc};
use rentdesk_shared::auth::cron::verify_cron_secret;
use rentdesk_shared::models::rental_transaction::RentalTransaction;
use rentdesk_worker::reminders::{DispatchReport, PgReminderStore, ReminderDispatcher};
use rentdesk_worker::rentals::{self, GenerationReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

fn check_cron_auth(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    verify_cron_secret(
        headers,
        state.config.secrets.cron_secret.as_deref(),
        state.config.api.production,
    )?;
    Ok(())
}

/// Reminder dispatch response
#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: DispatchReport,
}

/// Runs the reminder dispatcher
///
/// # Errors
///
/// - `401 Unauthorized`: missing or wrong cron secret
/// - `503 Service Unavailable`: no notification channel configured
pub async fn run_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CronResponse>> {
    check_cron_auth(&state, &headers)?;

    let notifier = state.notifier.clone().ok_or_else(|| {
        ApiError::ServiceUnavailable("No notification channel is configured".to_string())
    })?;

    let store = Arc::new(PgReminderStore::new(state.db.clone()));
    let dispatcher = ReminderDispatcher::new(store, notifier)
        .with_grace_days(state.config.notifier.grace_days);

    let report = dispatcher.run(Utc::now().date_naive()).await?;

    Ok(Json(CronResponse {
        success: true,
        report,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    /// Simulated target date, `YYYY-MM-DD`
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: GenerationReport,
}

/// Parses the optional `date` parameter, defaulting to today
pub fn parse_target_date(date: Option<&str>, today: NaiveDate) -> ApiResult<NaiveDate> {
    match date {
        None => Ok(today),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            ApiError::BadRequest(
                "Format de date invalide. Utilisez YYYY-MM-DD (ex: 2026-01-15)".to_string(),
            )
        }),
    }
}

/// Creates the month's rent record for every active lease
pub async fn generate_monthly_rentals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GenerateQuery>,
) -> ApiResult<Json<GenerateResponse>> {
    check_cron_auth(&state, &headers)?;

    let target = parse_target_date(query.date.as_deref(), Utc::now().date_naive())?;
    if query.date.is_some() {
        tracing::info!(%target, "Generating rent records for a simulated date");
    }

    let report = rentals::generate_monthly_rentals(&state.db, target).await?;

    Ok(Json(GenerateResponse {
        success: true,
        report,
    }))
}

/// Period whose reminder flags are cleared
#[derive(Debug, Deserialize, Validate)]
pub struct ResetRemindersRequest {
    #[validate(range(min = 1, max = 12, message = "period_month must be between 1 and 12"))]
    pub period_month: i16,

    #[validate(range(min = 2000, max = 2100, message = "period_year must be between 2000 and 2100"))]
    pub period_year: i32,
}

#[derive(Debug, Serialize)]
pub struct ResetRemindersResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub transactions: Vec<RentalTransaction>,
}

/// Clears `reminder_sent` on the period's unpaid records
///
/// Authentication is checked before the body is looked at.
///
/// # Errors
///
/// - `401 Unauthorized`: missing or wrong cron secret
/// - `400 Bad Request`: body is not valid JSON
/// - `422 Unprocessable Entity`: month or year out of range
pub async fn reset_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ResetRemindersRequest>, JsonRejection>,
) -> ApiResult<Json<ResetRemindersResponse>> {
    check_cron_auth(&state, &headers)?;

    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    req.validate()?;

    let transactions =
        RentalTransaction::reset_reminders(&state.db, req.period_month, req.period_year).await?;

    tracing::info!(
        period_month = req.period_month,
        period_year = req.period_year,
        count = transactions.len(),
        "Reminder flags reset"
    );

    Ok(Json(ResetRemindersResponse {
        success: true,
        message: format!(
            "{} rappel(s) réinitialisé(s) pour {}/{}",
            transactions.len(),
            req.period_month,
            req.period_year
        ),
        count: transactions.len(),
        transactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_date() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 17).unwrap();

        assert_eq!(parse_target_date(None, today).unwrap(), today);
        assert_eq!(
            parse_target_date(Some("2026-01-15"), today).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
        assert!(matches!(
            parse_target_date(Some("15/01/2026"), today),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_reset_request_validation() {
        let ok = ResetRemindersRequest {
            period_month: 12,
            period_year: 2025,
        };
        assert!(ok.validate().is_ok());

        let bad_month = ResetRemindersRequest {
            period_month: 13,
            period_year: 2025,
        };
        assert!(bad_month.validate().is_err());

        let bad_year = ResetRemindersRequest {
            period_month: 1,
            period_year: 1999,
        };
        assert!(bad_year.validate().is_err());
    }
}
