use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Delivery event posted by the email provider.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailEventPayload {
    /// Provider event type, e.g. `email.delivered`.
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EmailEventData,
}

/// Message the event refers to.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailEventData {
    /// Provider message id returned at send time.
    pub email_id: String,
    #[serde(default)]
    pub to: Vec<String>,
}

/// Number of invitations whose status moved forward.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_payload_deserializes() {
        let payload: EmailEventPayload = serde_json::from_str(
            r#"{
                "type": "email.opened",
                "created_at": "2025-06-03T17:30:00Z",
                "data": { "email_id": "re_123", "to": ["ada@example.com"], "subject": "hi" }
            }"#,
        )
        .unwrap();
        assert_eq!(payload.event_type, "email.opened");
        assert_eq!(payload.data.to, vec!["ada@example.com".to_string()]);
    }
}
