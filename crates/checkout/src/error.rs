//! Checkout error taxonomy with Sentry integration.
//!
//! Every collaborator port and every orchestrator operation returns
//! [`CheckoutError`]. Callers branch on [`CheckoutError::kind`], never on the
//! message text; [`CheckoutError::user_message`] gives the pt-BR text shown to
//! the shopper.

use marketplace_core::OrderId;
use thiserror::Error;

use crate::address::FieldErrors;

/// Stable discriminant for [`CheckoutError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input was rejected, either locally or by the order service.
    Validation,
    /// The seller-group in the cart no longer matches what was checked out.
    Conflict,
    /// The payment gateway refused to create a payment preference.
    Provider,
    /// Transient transport failure.
    Network,
    /// Malformed or unexpected response from a collaborator.
    Unexpected,
}

/// Checkout-level error type.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// Local address validation failed. Never reaches the network.
    #[error("Invalid fields: {0}")]
    InvalidFields(FieldErrors),

    /// The order service rejected the payload.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The seller-group is gone from the live cart.
    #[error("Cart conflict: {0}")]
    Conflict(String),

    /// Preference creation failed after the order was created.
    #[error("Payment provider error for order {order_id}: {message}")]
    Provider {
        /// The order that already exists in a pending state.
        order_id: OrderId,
        /// Provider-supplied reason.
        message: String,
    },

    /// Transport failure (connection refused, timeout, DNS).
    #[error("Network error: {0}")]
    Network(String),

    /// Response could not be understood.
    #[error("Unexpected response: {0}")]
    Unexpected(String),

    /// The operation is not valid in the current checkout state.
    #[error("Cannot {action} while checkout is {state}")]
    InvalidState {
        /// Operation attempted.
        action: &'static str,
        /// Name of the current state.
        state: &'static str,
    },
}

impl CheckoutError {
    /// The stable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFields(_) | Self::Validation(_) | Self::InvalidState { .. } => {
                ErrorKind::Validation
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Network(_) => ErrorKind::Network,
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFields(_) => {
                "Corrija os campos destacados antes de finalizar o pedido.".to_string()
            }
            Self::Validation(message) => message.clone(),
            Self::Conflict(_) => "Os itens desta loja não estão mais no seu carrinho. \
                                  Atualize o carrinho e tente novamente."
                .to_string(),
            Self::Provider { order_id, .. } => format!(
                "Seu pedido #{order_id} foi criado, mas não foi possível iniciar o pagamento. \
                 Tente pagar novamente pelos detalhes do pedido."
            ),
            Self::Network(_) => {
                "Não foi possível conectar. Verifique sua conexão e tente novamente.".to_string()
            }
            Self::Unexpected(_) => "Ocorreu um erro inesperado. Tente novamente.".to_string(),
            Self::InvalidState { .. } => "A finalização do pedido ainda não está pronta.".to_string(),
        }
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Log target of errors [`report`] already sent to Sentry.
pub const CAPTURED_TARGET: &str = "marketplace_checkout::captured";

/// Log an error and capture unexpected ones to Sentry.
///
/// Validation and conflict errors are part of normal shopper flow and only
/// logged at debug/warn level.
pub fn report(err: &CheckoutError) {
    match err.kind() {
        ErrorKind::Unexpected => {
            let event_id = sentry::capture_error(err);
            tracing::error!(
                target: CAPTURED_TARGET,
                error = %err,
                sentry_event_id = %event_id,
                "Checkout error"
            );
        }
        ErrorKind::Provider | ErrorKind::Network => {
            tracing::warn!(error = %err, "Checkout error");
        }
        ErrorKind::Validation | ErrorKind::Conflict => {
            tracing::debug!(error = %err, "Checkout rejected");
        }
    }
}

/// Record a checkout step on the current Sentry scope.
///
/// A later [`report`] of an `Unexpected` error carries these steps, so the
/// event shows which states the dialog passed through and which order or
/// store it was working on. `fields` become the breadcrumb's data.
pub fn add_breadcrumb(category: &str, message: &str, fields: &[(&str, String)]) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data: fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), serde_json::Value::from(value.as_str())))
            .collect(),
        ..Default::default()
    });
}
