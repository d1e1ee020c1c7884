//! Loyalty points accrual.
//!
//! Orders commit without waiting for points. After the order transaction
//! commits, the handler hands an [`AccrualJob`] to a background worker over an
//! mpsc channel; the worker owns its own transaction boundary, and its
//! failures are logged, never surfaced to the order flow.

pub mod worker;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use worker::LoyaltyWorker;

/// One committed order to accrue points for.
#[derive(Debug, Clone)]
pub struct AccrualJob {
    pub order_id: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub total: f64,
}

/// Handle for submitting accrual jobs. Cheap to clone, held in app state.
#[derive(Debug, Clone)]
pub struct LoyaltyService {
    tx: mpsc::Sender<AccrualJob>,
}

impl LoyaltyService {
    pub fn new(buffer_size: usize) -> (Arc<Self>, mpsc::Receiver<AccrualJob>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Arc::new(Self { tx }), rx)
    }

    /// Queue an accrual job. A closed channel only loses points accrual, so
    /// it is logged and swallowed.
    pub async fn enqueue(&self, job: AccrualJob) {
        let order_id = job.order_id.clone();
        if self.tx.send(job).await.is_err() {
            tracing::error!(%order_id, "loyalty channel closed, accrual job dropped");
        }
    }
}
