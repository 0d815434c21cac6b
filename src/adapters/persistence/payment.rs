use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::payments::{CreatePaymentInput, PaymentRepo},
    domain::entities::payment::{PaymentRecord, PaymentStatus},
};

fn row_to_record(row: sqlx::postgres::PgRow) -> PaymentRecord {
    PaymentRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        website_id: row.get("website_id"),
        kind: row.get("kind"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        description: row.get("description"),
        status: row.get("status"),
        stripe_payment_intent_id: row.get("stripe_payment_intent_id"),
        stripe_subscription_id: row.get("stripe_subscription_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, website_id, kind, amount_cents, currency, description,
    status, stripe_payment_intent_id, stripe_subscription_id,
    created_at, updated_at
"#;

#[async_trait]
impl PaymentRepo for PostgresPersistence {
    async fn create(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        let id = Uuid::new_v4();
        // Find-or-create on the subscription reference: the partial unique
        // index on stripe_subscription_id turns a concurrent duplicate insert
        // into a no-op update that returns the winning row.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, user_id, website_id, kind, amount_cents, currency,
                description, status, stripe_payment_intent_id, stripe_subscription_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (stripe_subscription_id) WHERE stripe_subscription_id IS NOT NULL
            DO UPDATE SET updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.user_id)
        .bind(&input.website_id)
        .bind(input.kind)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .bind(&input.description)
        .bind(input.status)
        .bind(&input.stripe_payment_intent_id)
        .bind(&input.stripe_subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_record(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn find_by_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE stripe_subscription_id = $1",
            SELECT_COLS
        ))
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn find_by_payment_intent_id(
        &self,
        stripe_payment_intent_id: &str,
    ) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE stripe_payment_intent_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLS
        ))
        .bind(stripe_payment_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()> {
        // Transition guard mirrors PaymentStatus::can_transition_to:
        // - same-status writes are allowed (idempotent replays)
        // - 'pending' can move anywhere
        // - 'failed' can still move to 'succeeded' or 'canceled'
        // - 'succeeded' and 'canceled' are terminal
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
              AND (
                status = $2
                OR status = 'pending'
                OR (status = 'failed' AND $2 IN ('succeeded', 'canceled'))
              )
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            // Distinguish "not found" from "blocked by terminal state"
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM payments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::from)?;

            if exists.is_some() {
                tracing::debug!(
                    payment_id = %id,
                    new_status = %status,
                    "Payment status update skipped - transition not allowed from current status"
                );
            } else {
                tracing::warn!(payment_id = %id, "Payment status update failed - record not found");
            }
        }

        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<PaymentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }
}
