//! Background worker consuming accrual jobs.
//!
//! Consumes [`AccrualJob`]s from the mpsc channel and writes the points
//! ledger. Exits when the channel closes.

use sqlx::PgPool;

use crate::db::customer::{self, PointsKind, points_for_total};
use crate::error::ApiResult;

use super::AccrualJob;

pub struct LoyaltyWorker {
    pool: PgPool,
}

impl LoyaltyWorker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the worker (blocks until the channel closes).
    pub async fn run(self, mut rx: tokio::sync::mpsc::Receiver<AccrualJob>) {
        tracing::info!("loyalty accrual worker started");

        while let Some(job) = rx.recv().await {
            let order_id = job.order_id.clone();
            match self.accrue(job).await {
                Ok(points) => {
                    tracing::debug!(%order_id, points, "points accrued");
                }
                Err(e) => {
                    tracing::error!(%order_id, "failed to accrue points: {e}");
                }
            }
        }

        tracing::info!("loyalty channel closed, worker stopping");
    }

    /// Find or create the customer, bump lifetime stats and award points.
    async fn accrue(&self, job: AccrualJob) -> ApiResult<i32> {
        let cust = customer::lookup_or_create(
            &self.pool,
            &job.customer_phone,
            job.customer_name.as_deref(),
            job.customer_email.as_deref(),
            job.customer_address.as_deref(),
        )
        .await?;

        customer::record_order_stats(&self.pool, cust.id, job.total).await?;

        let points = points_for_total(job.total);
        if points > 0 {
            customer::apply_points(
                &self.pool,
                cust.id,
                points,
                PointsKind::Earned,
                Some(&job.order_id),
                Some(job.total),
                Some("Points earned from order"),
                "system",
            )
            .await?;
        }

        Ok(points)
    }
}
