//! Order notification mailer.
//!
//! Sends the purchaser confirmation and the admin alert over SMTP via lettre,
//! with Askama HTML templates and plain-text alternatives. When SMTP is not
//! configured the mailer runs in simulated mode and only logs, so checkout
//! works in development without a relay.
//!
//! Delivery is retried up to three times with doubling backoff. Callers fire
//! these sends after the order has committed and never propagate failures to
//! the checkout response.

use std::time::Duration;

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::MultiPart,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use velour_core::Order;

use crate::config::SmtpConfig;

const SEND_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(300);

/// HTML template for the purchaser confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a Order,
}

/// Plain text template for the purchaser confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a Order,
}

/// HTML template for the admin new-order alert.
#[derive(Template)]
#[template(path = "email/order_alert.html")]
struct OrderAlertHtml<'a> {
    order: &'a Order,
}

/// Plain text template for the admin new-order alert.
#[derive(Template)]
#[template(path = "email/order_alert.txt")]
struct OrderAlertText<'a> {
    order: &'a Order,
}

/// Errors that can occur when sending email.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Mailer for order notifications.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
}

impl Mailer {
    /// Create a mailer from optional SMTP configuration. `None` yields a
    /// simulated mailer that logs instead of sending.
    ///
    /// # Errors
    ///
    /// Returns [`MailerError::Smtp`] if the relay address is unusable.
    pub fn new(config: Option<&SmtpConfig>) -> Result<Self, MailerError> {
        let Some(config) = config else {
            tracing::info!("SMTP not configured, mailer running in simulated mode");
            return Ok(Self::disabled());
        };

        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_owned(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport: Some(transport),
            from_address: config.from.clone(),
        })
    }

    /// A mailer that only logs. Used when SMTP is unconfigured and in tests.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from_address: "no-reply@example.com".to_owned(),
        }
    }

    /// Send the purchaser confirmation for a placed order.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or delivery fails after all retries.
    pub async fn send_order_confirmation(&self, order: &Order) -> Result<(), MailerError> {
        let html = OrderConfirmationHtml { order }.render()?;
        let text = OrderConfirmationText { order }.render()?;
        self.send_with_retries(
            order.shipping.email.as_str(),
            format!("Order Confirmation - {}", order.id),
            text,
            html,
        )
        .await
    }

    /// Send the admin new-order alert.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or delivery fails after all retries.
    pub async fn send_admin_alert(&self, to: &str, order: &Order) -> Result<(), MailerError> {
        let html = OrderAlertHtml { order }.render()?;
        let text = OrderAlertText { order }.render()?;
        self.send_with_retries(to, format!("New Order - {}", order.id), text, html)
            .await
    }

    async fn send_with_retries(
        &self,
        to: &str,
        subject: String,
        text: String,
        html: String,
    ) -> Result<(), MailerError> {
        let Some(transport) = &self.transport else {
            tracing::info!(simulated = true, to, subject, "email (simulated)");
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailerError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailerError::InvalidAddress(to.to_owned()))?)
            .subject(&subject)
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        let mut backoff = BACKOFF_BASE;
        let mut last_err = None;
        for attempt in 1..=SEND_ATTEMPTS {
            match transport.send(message.clone()).await {
                Ok(_) => {
                    tracing::info!(to, subject, "email sent");
                    return Ok(());
                }
                Err(err) => {
                    tracing::error!(error = %err, attempt, to, "failed to send email, will retry");
                    last_err = Some(err);
                    if attempt < SEND_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }
        // Loop always records an error before falling through.
        Err(last_err.map_or_else(
            || MailerError::InvalidAddress(to.to_owned()),
            MailerError::Smtp,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use velour_core::{Email, LineItem, NewOrder, OrderId, ShippingDetails};

    fn sample_order() -> Order {
        let new = NewOrder {
            user: None,
            items: vec![LineItem {
                product_id: None,
                name: "Dominus".to_owned(),
                price: Decimal::new(100, 0),
                qty: 2,
                size: Some("50ml".to_owned()),
            }],
            shipping: ShippingDetails {
                first_name: "Ayesha".to_owned(),
                last_name: "Khan".to_owned(),
                email: Email::parse("buyer@example.com").unwrap(),
                address: "street".to_owned(),
                city: "Lahore".to_owned(),
                postal: "54000".to_owned(),
                phone: "1234".to_owned(),
                country: "PK".to_owned(),
            },
            subtotal: Decimal::new(200, 0),
            shipping_cost: Decimal::new(200, 0),
            total: Decimal::new(400, 0),
            delivery_option: "standard".to_owned(),
            payment_method: "cod".to_owned(),
            newsletter: false,
        };
        Order::from_new(
            OrderId::parse("64b1f0a2c3d4e5f60718293a").unwrap(),
            new,
            Utc::now(),
        )
    }

    #[test]
    fn test_confirmation_templates_render() {
        let order = sample_order();
        let html = OrderConfirmationHtml { order: &order }.render().unwrap();
        assert!(html.contains("64b1f0a2c3d4e5f60718293a"));
        assert!(html.contains("Dominus"));
        assert!(html.contains("400"));

        let text = OrderConfirmationText { order: &order }.render().unwrap();
        assert!(text.contains("Ayesha"));
        assert!(text.contains("400"));
    }

    #[test]
    fn test_alert_templates_render() {
        let order = sample_order();
        let html = OrderAlertHtml { order: &order }.render().unwrap();
        assert!(html.contains("buyer@example.com"));

        let text = OrderAlertText { order: &order }.render().unwrap();
        assert!(text.contains("64b1f0a2c3d4e5f60718293a"));
    }

    #[tokio::test]
    async fn test_simulated_mailer_always_succeeds() {
        let mailer = Mailer::disabled();
        let order = sample_order();
        mailer.send_order_confirmation(&order).await.unwrap();
        mailer
            .send_admin_alert("admin@example.com", &order)
            .await
            .unwrap();
    }
}
