//! Caller-supplied actor context.

use serde::{Deserialize, Serialize};

use tally_core::{ActorId, LedgerError, LedgerResult};

/// Identity and authorization as resolved by the caller.
///
/// The engine does not re-derive authorization; it trusts `role_authorized`
/// and rejects the call before touching any state when it is false.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: ActorId,
    pub role_authorized: bool,
}

impl ActorContext {
    pub fn new(actor_id: ActorId, role_authorized: bool) -> Self {
        Self {
            actor_id,
            role_authorized,
        }
    }

    pub fn authorized(actor_id: ActorId) -> Self {
        Self::new(actor_id, true)
    }

    pub fn require_authorized(&self) -> LedgerResult<ActorId> {
        if self.role_authorized {
            Ok(self.actor_id)
        } else {
            Err(LedgerError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_context_is_rejected() {
        let ctx = ActorContext::new(ActorId::new(), false);
        assert_eq!(ctx.require_authorized(), Err(LedgerError::Unauthorized));

        let ctx = ActorContext::authorized(ActorId::new());
        assert_eq!(ctx.require_authorized(), Ok(ctx.actor_id));
    }
}
