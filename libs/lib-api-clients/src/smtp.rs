use anyhow::Context;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Plain SMTP relay on the internal network, used for status notifications.
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    server: String,
    port: u16,
}

impl SmtpRelay {
    pub fn new(server: String, port: u16) -> Self {
        Self { server, port }
    }

    pub async fn send(
        &self,
        recipient: &str,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let email = Message::builder()
            .to(format!("<{recipient}>")
                .parse()
                .with_context(|| format!("Invalid recipient address: {recipient}"))?)
            .from(format!("<{sender}>")
                .parse()
                .with_context(|| format!("Invalid sender address: {sender}"))?)
            .subject(subject)
            .body(body.to_string())?;

        // The relay is an internal host without TLS.
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.server)
            .port(self.port)
            .build();

        mailer
            .send(email)
            .await
            .with_context(|| format!("Could not send mail to {recipient} via {}", self.server))?;

        tracing::info!("Sent status mail to {}: {}", recipient, subject);
        Ok(())
    }
}
