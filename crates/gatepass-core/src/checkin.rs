//! # Check-in State Machine
//!
//! Per-token states and the pure classification step used by every
//! validator.
//!
//! ## State Diagram
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │              ┌──────────┐  token ∈ valid   ┌──────────────┐            │
//! │   scan ─────►│  Unseen  │─────────────────►│ ValidPending │            │
//! │              └────┬─────┘                  └──────┬───────┘            │
//! │                   │                               │ try_redeem          │
//! │                   │ token ∉ valid                 ▼                     │
//! │                   ▼                        ┌──────────────┐            │
//! │              ┌──────────┐                  │   Redeemed   │ (terminal) │
//! │              │ Unknown  │ (terminal)       └──────────────┘            │
//! │              └──────────┘                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two entry points:
//! - [`classify`] runs the whole machine against locally owned sets. The
//!   `&mut` borrow makes the check-then-insert atomic within one process.
//! - [`precheck`] is the read-only half used by the distributed validator,
//!   which then performs exactly one registry `try_redeem`.

use chrono::{DateTime, Utc};

use crate::types::{RedeemedTokenSet, ScanOutcome, Token, ValidTokenSet};

/// Lifecycle state of a single token at the check-in desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unseen,
    ValidPending,
    Redeemed,
    Unknown,
}

impl TokenState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TokenState::Redeemed | TokenState::Unknown)
    }

    /// The outcome reported to the operator on reaching this state, if any.
    pub fn outcome(self) -> Option<ScanOutcome> {
        match self {
            TokenState::Unseen | TokenState::ValidPending => None,
            TokenState::Redeemed => Some(ScanOutcome::Valid),
            TokenState::Unknown => Some(ScanOutcome::Unknown),
        }
    }
}

/// Read-only verdict before any write happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    /// Locally known as redeemed. Report without touching the registry.
    AlreadyRedeemed,
    /// Known valid and not yet seen redeemed: must go through `try_redeem`.
    Candidate,
    /// Not in the local valid set.
    NotInValidSet,
}

/// Read-only classification against a (possibly stale) local view.
///
/// Staleness is harmless: the redeemed set only grows, so a hit is final,
/// and a miss is caught by the registry's conditional write.
pub fn precheck(token: &Token, valid: &ValidTokenSet, redeemed: &RedeemedTokenSet) -> Precheck {
    if redeemed.contains(token) {
        Precheck::AlreadyRedeemed
    } else if valid.contains(token) {
        Precheck::Candidate
    } else {
        Precheck::NotInValidSet
    }
}

/// Classifies a presented token and records a first redemption.
///
/// 1. `token ∈ redeemed` → `AlreadyRedeemed`, no write
/// 2. `token ∈ valid` → insert `(token, now)`, `Valid`
/// 3. otherwise → `Unknown`, no write
pub fn classify(
    token: &Token,
    valid: &ValidTokenSet,
    redeemed: &mut RedeemedTokenSet,
    now: DateTime<Utc>,
) -> ScanOutcome {
    match precheck(token, valid, redeemed) {
        Precheck::AlreadyRedeemed => ScanOutcome::AlreadyRedeemed,
        Precheck::NotInValidSet => ScanOutcome::Unknown,
        Precheck::Candidate => {
            if redeemed.try_insert(token.clone(), now) {
                ScanOutcome::Valid
            } else {
                ScanOutcome::AlreadyRedeemed
            }
        }
    }
}

/// Current state of `token` given the two sets.
pub fn state_of(token: &Token, valid: &ValidTokenSet, redeemed: &RedeemedTokenSet) -> TokenState {
    match precheck(token, valid, redeemed) {
        Precheck::AlreadyRedeemed => TokenState::Redeemed,
        Precheck::Candidate => TokenState::ValidPending,
        Precheck::NotInValidSet => TokenState::Unseen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> Token {
        Token::parse(s).unwrap()
    }

    #[test]
    fn test_valid_then_already_redeemed() {
        let t = token("alice");
        let valid: ValidTokenSet = [t.clone()].into_iter().collect();
        let mut redeemed = RedeemedTokenSet::new();

        assert_eq!(classify(&t, &valid, &mut redeemed, Utc::now()), ScanOutcome::Valid);
        assert!(redeemed.contains(&t));

        assert_eq!(
            classify(&t, &valid, &mut redeemed, Utc::now()),
            ScanOutcome::AlreadyRedeemed
        );
        assert_eq!(redeemed.len(), 1);
    }

    #[test]
    fn test_unknown_never_writes() {
        let valid: ValidTokenSet = [token("alice")].into_iter().collect();
        let mut redeemed = RedeemedTokenSet::new();
        let before = redeemed.clone();

        assert_eq!(
            classify(&token("garbage"), &valid, &mut redeemed, Utc::now()),
            ScanOutcome::Unknown
        );
        assert_eq!(redeemed, before);
    }

    #[test]
    fn test_redeemed_checked_before_validity() {
        // A redeemed token reports AlreadyRedeemed even if the local valid
        // view has not caught up with its batch yet.
        let t = token("late-batch");
        let valid = ValidTokenSet::new();
        let mut redeemed: RedeemedTokenSet = [(t.clone(), Utc::now())].into_iter().collect();

        assert_eq!(
            classify(&t, &valid, &mut redeemed, Utc::now()),
            ScanOutcome::AlreadyRedeemed
        );
    }

    #[test]
    fn test_state_transitions() {
        let t = token("bob");
        let mut valid = ValidTokenSet::new();
        let mut redeemed = RedeemedTokenSet::new();

        assert_eq!(state_of(&t, &valid, &redeemed), TokenState::Unseen);

        valid.union([t.clone()]);
        assert_eq!(state_of(&t, &valid, &redeemed), TokenState::ValidPending);
        assert!(!TokenState::ValidPending.is_terminal());

        classify(&t, &valid, &mut redeemed, Utc::now());
        let state = state_of(&t, &valid, &redeemed);
        assert_eq!(state, TokenState::Redeemed);
        assert!(state.is_terminal());
        assert_eq!(state.outcome(), Some(ScanOutcome::Valid));
    }
}
