//! SMTP notification channel, HTML body colored by severity.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use crate::domain::Alert;

use super::{severity_color, NotificationChannel};

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: Vec<String>,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        port: u16,
        use_tls: bool,
        credentials: Option<(String, String)>,
        from: impl Into<String>,
        to: Vec<String>,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let mut builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(port);
        if let Some((user, pass)) = credentials {
            builder = builder.credentials(Credentials::new(user, pass));
        }
        Ok(Self {
            transport: builder.build(),
            from: from.into(),
            to,
        })
    }

    fn render_html(alert: &Alert) -> String {
        format!(
            "<html><body><h2 style=\"color:{color}\">{title}</h2><p>{description}</p>\
             <p><b>Severity:</b> {severity}</p><p><b>Source:</b> {source}</p></body></html>",
            color = severity_color(alert.severity),
            title = alert.title,
            description = alert.description,
            severity = alert.severity.as_str(),
            source = alert.source,
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> bool {
        for recipient in &self.to {
            let message = match Message::builder()
                .from(match self.from.parse() {
                    Ok(addr) => addr,
                    Err(e) => {
                        warn!(error = %e, "email channel: invalid from address");
                        return false;
                    }
                })
                .to(match recipient.parse() {
                    Ok(addr) => addr,
                    Err(e) => {
                        warn!(error = %e, recipient, "email channel: invalid recipient address");
                        continue;
                    }
                })
                .subject(format!("[{}] {}", alert.severity.as_str(), alert.title))
                .header(ContentType::TEXT_HTML)
                .body(Self::render_html(alert))
            {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "email channel: failed to build message");
                    return false;
                }
            };

            if let Err(e) = self.transport.send(message).await {
                warn!(error = %e, recipient, "email channel: send failed");
                return false;
            }
        }
        true
    }
}
