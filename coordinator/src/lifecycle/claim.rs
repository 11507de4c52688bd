//! In-process exclusion of concurrent operations on one application.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

#[derive(Debug, Default)]
pub(crate) struct Claims(Mutex<HashSet<i64>>);

/// Held for the duration of an operation; releases the claim on drop.
#[derive(Debug)]
pub(crate) struct ClaimGuard<'a> {
    claims: &'a Claims,
    application_id: i64,
}

impl Claims {
    /// Returns `None` if another operation on `application_id` is in flight.
    pub(crate) fn try_claim(&self, application_id: i64) -> Option<ClaimGuard<'_>> {
        let mut claimed = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        // Constructing a guard for a failed claim would release the holder's claim on drop.
        claimed.insert(application_id).then(|| ClaimGuard {
            claims: self,
            application_id,
        })
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.claims
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.application_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_first_is_released() {
        let claims = Claims::default();
        let first = claims.try_claim(1).expect("first claim should succeed");
        assert!(claims.try_claim(1).is_none(), "claim is exclusive");
        assert!(claims.try_claim(2).is_some(), "other applications are independent");
        drop(first);
        assert!(claims.try_claim(1).is_some(), "released claim can be taken again");
    }
}
