use crate::error::{AuthError, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum EmailProvider {
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from_email: String,
        from_name: String,
    },
    MailHog {
        host: String,
        port: u16,
        from_email: String,
        from_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

impl EmailMessage {
    /// Build from a `(text, html)` template pair
    pub fn from_template(to: &str, to_name: Option<String>, subject: &str, body: (String, String)) -> Self {
        Self {
            to: to.to_string(),
            to_name,
            subject: subject.to_string(),
            text_body: body.0,
            html_body: Some(body.1),
        }
    }
}

/// Something that can deliver an email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: EmailMessage) -> Result<()>;
}

#[derive(Clone)]
pub struct EmailService {
    provider: EmailProvider,
}

impl EmailService {
    pub fn new(provider: EmailProvider) -> Self {
        Self { provider }
    }

    pub fn from_env() -> Result<Self> {
        let email_provider = std::env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "mailhog".to_string());
        let from_name = std::env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "HireHub".to_string());

        let provider = match email_provider.as_str() {
            "mailhog" => EmailProvider::MailHog {
                host: std::env::var("MAILHOG_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("MAILHOG_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(1025),
                from_email: std::env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@hirehub.local".to_string()),
                from_name,
            },
            "smtp" => EmailProvider::Smtp {
                host: std::env::var("SMTP_HOST")
                    .map_err(|_| AuthError::Configuration("SMTP_HOST not configured".to_string()))?,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME").ok(),
                password: std::env::var("SMTP_PASSWORD").ok(),
                from_email: std::env::var("EMAIL_FROM")
                    .map_err(|_| AuthError::Configuration("EMAIL_FROM not configured".to_string()))?,
                from_name,
            },
            _ => {
                return Err(AuthError::Configuration(format!(
                    "Unknown email provider: {}",
                    email_provider
                )))
            }
        };

        Ok(Self { provider })
    }

    fn build_message(from_email: &str, from_name: &str, email: &EmailMessage) -> Result<Message> {
        let from = format!("{} <{}>", from_name, from_email)
            .parse::<Mailbox>()
            .map_err(|e| AuthError::Email(format!("Invalid from address: {}", e)))?;

        let to = match &email.to_name {
            Some(name) => format!("{} <{}>", name, email.to),
            None => email.to.clone(),
        }
        .parse::<Mailbox>()
        .map_err(|e| AuthError::Email(format!("Invalid to address: {}", e)))?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let message = match &email.html_body {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            None => builder.body(email.text_body.clone()),
        }
        .map_err(|e| AuthError::Email(format!("Failed to build email: {}", e)))?;

        Ok(message)
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mailer = match &self.provider {
            // MailHog: no TLS, no authentication
            EmailProvider::MailHog { host, port, .. } => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .port(*port)
                    .build()
            }
            EmailProvider::Smtp {
                host,
                port,
                username,
                password,
                ..
            } => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                    .map_err(|e| AuthError::Email(format!("Failed to create SMTP transport: {}", e)))?
                    .port(*port);

                if let (Some(user), Some(pass)) = (username, password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }

                builder.build()
            }
        };

        Ok(mailer)
    }

    fn sender(&self) -> (&str, &str) {
        match &self.provider {
            EmailProvider::Smtp {
                from_email,
                from_name,
                ..
            }
            | EmailProvider::MailHog {
                from_email,
                from_name,
                ..
            } => (from_email.as_str(), from_name.as_str()),
        }
    }

    /// Test connection to the SMTP server
    pub async fn test_connection(&self) -> Result<()> {
        self.transport()?
            .test_connection()
            .await
            .map_err(|e| AuthError::Email(format!("SMTP connection test failed: {}", e)))?;

        tracing::info!("Email service connection test successful");
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send(&self, email: EmailMessage) -> Result<()> {
        let (from_email, from_name) = self.sender();
        let message = Self::build_message(from_email, from_name, &email)?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| AuthError::Email(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_multipart_message() {
        let email = EmailMessage::from_template(
            "jane@acme.io",
            Some("Jane Doe".to_string()),
            "Hello",
            ("plain".to_string(), "<p>html</p>".to_string()),
        );

        let message = EmailService::build_message("noreply@hirehub.local", "HireHub", &email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let email = EmailMessage {
            to: "not-an-address".to_string(),
            to_name: None,
            subject: "Hello".to_string(),
            text_body: "plain".to_string(),
            html_body: None,
        };

        assert!(matches!(
            EmailService::build_message("noreply@hirehub.local", "HireHub", &email),
            Err(AuthError::Email(_))
        ));
    }
}
