//! Outbound passcode delivery.
//!
//! The challenge logic has zero dependency on any delivery mechanism: it
//! talks to the [`NotificationSender`] capability only. Production wires
//! in SMTP via lettre; tests record deliveries in memory.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use daily_dish_core::Email;

use crate::config::SmtpConfig;
use crate::models::ChallengePurpose;

/// What gets delivered: a code and what it unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPayload {
    /// The one-time code.
    pub code: String,
    /// What the code unlocks; selects subject and wording.
    pub purpose: ChallengePurpose,
}

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build the message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Sender or recipient address rejected by the transport.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Capability for delivering a one-time code to an address.
#[allow(async_fn_in_trait)] // static dispatch only; services are generic over the sender
pub trait NotificationSender: Send + Sync {
    /// Deliver the payload. `Ok` means handed to the transport, not read.
    async fn send(&self, to: &Email, payload: &DeliveryPayload) -> Result<(), NotifyError>;
}

impl<T: NotificationSender + ?Sized> NotificationSender for std::sync::Arc<T> {
    async fn send(&self, to: &Email, payload: &DeliveryPayload) -> Result<(), NotifyError> {
        (**self).send(to, payload).await
    }
}

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct SmtpNotificationSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotificationSender {
    /// Create a sender from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay transport cannot be constructed.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    const fn subject(purpose: ChallengePurpose) -> &'static str {
        match purpose {
            ChallengePurpose::Registration => "Your Daily Dish verification code",
            ChallengePurpose::PasswordReset => "Your Daily Dish password reset code",
        }
    }

    fn body(payload: &DeliveryPayload) -> String {
        let action = match payload.purpose {
            ChallengePurpose::Registration => "finish creating your account",
            ChallengePurpose::PasswordReset => "reset your password",
        };
        format!(
            "Your Daily Dish code is {code}.\n\n\
             Enter it within 10 minutes to {action}. If you didn't request \
             this, you can ignore this email.\n",
            code = payload.code
        )
    }
}

impl NotificationSender for SmtpNotificationSender {
    async fn send(&self, to: &Email, payload: &DeliveryPayload) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(Self::subject(payload.purpose))
            .header(ContentType::TEXT_PLAIN)
            .body(Self::body(payload))?;

        self.mailer.send(message).await?;

        tracing::info!(to = %to, purpose = %payload.purpose, "verification code sent");
        Ok(())
    }
}
