use async_trait::async_trait;

/// Outbound mail capability. Delivery mechanics live behind this seam; the
/// services only need `send(to, subject, body)`.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default mailer: writes the message to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, "outbound mail: {}", body);
        Ok(())
    }
}

/// Fire a notification without letting its failure reach the caller.
/// The primary operation must never depend on mail delivery.
pub async fn send_best_effort(mailer: &dyn Mailer, to: &str, subject: &str, body: &str) {
    if let Err(err) = mailer.send(to, subject, body).await {
        tracing::warn!(to, subject, "failed to send notification: {:#}", err);
    }
}
