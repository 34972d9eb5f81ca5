use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tripstay_core::{EntryId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("payment rejected: {0}")]
    Rejected(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("payment gateway timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub entry_id: EntryId,
    /// Minor currency units.
    pub amount: u64,
    pub customer: UserId,
}

/// Where to send the holder, and the reference the callback will carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRedirect {
    pub redirect_url: String,
    pub payment_ref: String,
}

/// Payment gateway client. The callback enters through `confirm_via_payment`.
pub trait PaymentGateway: Send + Sync {
    fn initiate(&self, request: &PaymentRequest) -> Result<PaymentRedirect, GatewayError>;
}

impl<G> PaymentGateway for Arc<G>
where
    G: PaymentGateway + ?Sized,
{
    fn initiate(&self, request: &PaymentRequest) -> Result<PaymentRedirect, GatewayError> {
        (**self).initiate(request)
    }
}

/// Call the gateway on a helper thread and give up after `timeout`.
///
/// The helper thread is detached on timeout; its late answer is dropped.
pub fn initiate_with_timeout(
    gateway: Arc<dyn PaymentGateway>,
    request: PaymentRequest,
    timeout: Duration,
) -> Result<PaymentRedirect, GatewayError> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("payment-initiate".to_string())
        .spawn(move || {
            let _ = tx.send(gateway.initiate(&request));
        })
        .map_err(|e| GatewayError::Unavailable(format!("failed to spawn gateway call: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(GatewayError::Timeout(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(GatewayError::Unavailable("gateway call aborted".to_string()))
        }
    }
}

/// Gateway stand-in that approves every request and returns a hosted
/// checkout URL under `base_url`.
#[derive(Debug, Clone)]
pub struct SandboxPaymentGateway {
    base_url: String,
}

impl SandboxPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for SandboxPaymentGateway {
    fn default() -> Self {
        Self::new("https://sandbox.payments.invalid/checkout")
    }
}

impl PaymentGateway for SandboxPaymentGateway {
    fn initiate(&self, request: &PaymentRequest) -> Result<PaymentRedirect, GatewayError> {
        if request.amount == 0 {
            return Err(GatewayError::Rejected("amount must be positive".to_string()));
        }
        let payment_ref = format!("pay_{}", Uuid::now_v7().simple());
        Ok(PaymentRedirect {
            redirect_url: format!("{}/{payment_ref}", self.base_url.trim_end_matches('/')),
            payment_ref,
        })
    }
}
