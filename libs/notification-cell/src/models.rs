use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub destination: String,
    pub provider_message_id: Option<String>,
}

// ==============================================================================
// WHATSAPP CLOUD API PAYLOADS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WhatsAppTextRequest {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: WhatsAppText,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhatsAppText {
    pub preview_url: bool,
    pub body: String,
}

impl WhatsAppTextRequest {
    pub fn new(to: String, body: &str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: WhatsAppText {
                preview_url: false,
                body: body.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppSendResponse {
    #[serde(default)]
    pub messages: Vec<WhatsAppMessageId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppMessageId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppErrorEnvelope {
    pub error: WhatsAppErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppErrorBody {
    pub message: String,
    pub code: Option<i64>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

/// Failure of an outbound collaborator. Callers log it; it never fails a booking.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DependencyError {
    #[error("Messaging provider is not configured")]
    NotConfigured,

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Provider rejected message (code {code:?}): {message}")]
    Provider { code: Option<i64>, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl DependencyError {
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            DependencyError::Provider { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DependencyError {
    fn from(err: reqwest::Error) -> Self {
        DependencyError::Transport(err.to_string())
    }
}
