//! Authenticated caller as forwarded by the upstream auth proxy.

use crate::{dao::datastore::Tables, dao::models::PlayerEntity, error::ServiceError};

/// Identity attached to a request by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable subject of the identity provider.
    pub subject: String,
    /// Verified email address, when the provider shares one.
    pub email: Option<String>,
}

/// Resolve the player profile owned by `identity`.
pub(crate) fn player_of<'a>(
    tables: &'a Tables,
    identity: &Identity,
) -> Result<&'a PlayerEntity, ServiceError> {
    tables
        .player_by_user(&identity.subject)
        .ok_or_else(|| ServiceError::NotFound("player not found".into()))
}
