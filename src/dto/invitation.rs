use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{EmailStatus, InvitationEntity},
    dto::{format_system_time, validation::validate_email_list},
};

/// Upper bound of recipients in one batch.
pub const MAX_INVITATIONS_PER_BATCH: usize = 20;

/// Addresses the host wants to invite.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendInvitationsRequest {
    pub emails: Vec<String>,
}

impl Validate for SendInvitationsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_email_list(&self.emails, MAX_INVITATIONS_PER_BATCH) {
            errors.add("emails", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Number of invitations dispatched.
#[derive(Debug, Serialize, ToSchema)]
pub struct SendInvitationsResponse {
    pub sent: usize,
}

/// Invitation as shown to the host.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvitationView {
    pub email: String,
    pub email_status: EmailStatus,
    pub game_join_status: bool,
    pub sent_at: String,
}

impl From<&InvitationEntity> for InvitationView {
    fn from(invitation: &InvitationEntity) -> Self {
        Self {
            email: invitation.email.clone(),
            email_status: invitation.email_status,
            game_join_status: invitation.game_join_status,
            sent_at: format_system_time(invitation.sent_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batches_are_rejected() {
        let request = SendInvitationsRequest { emails: Vec::new() };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("emails"));
    }
}
