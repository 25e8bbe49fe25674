//! Admission tokens.
//!
//! Tokens are minted when a reservation is confirmed and presented as a QR
//! payload at the gate. The registry only keeps SHA-256 digests, mapping each
//! digest ever issued to its reservation. Entries are never removed, which
//! both keeps tokens from being reused and lets a cancelled reservation's
//! token be reported as cancelled rather than unknown.
//!
//! Validity is never stored: [`AdmissionRegistry::verify`] reads the
//! reservation status from the ledger at verification time.

use crate::aggregates::ledger::Ledger;
use crate::types::{AdmissionToken, Reservation, ReservationId, ReservationStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Attempts to draw a token whose digest was never issued before giving up
pub const MAX_TOKEN_ATTEMPTS: usize = 8;

/// Source of admission tokens, injected through the environment
pub trait TokenGenerator: Send + Sync {
    /// Draw a fresh token
    fn generate(&self) -> AdmissionToken;
}

/// Production generator: 256 random bits, base64url without padding (43 characters)
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> AdmissionToken {
        use base64::Engine;
        use rand::RngCore;

        let mut rng = rand::thread_rng();
        let mut random_bytes = [0u8; TOKEN_BYTES];
        rng.fill_bytes(&mut random_bytes);
        AdmissionToken::new(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes))
    }
}

/// Deterministic generator producing `token-1`, `token-2`, ...
///
/// For tests and demos only; these tokens are trivially guessable.
#[derive(Debug, Default)]
pub struct SequentialTokenGenerator {
    next: AtomicU64,
}

impl SequentialTokenGenerator {
    /// Starts at `token-1`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }
}

impl TokenGenerator for SequentialTokenGenerator {
    fn generate(&self) -> AdmissionToken {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        AdmissionToken::new(format!("token-{n}"))
    }
}

/// SHA-256 hex digest of a token
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenDigest(String);

impl TokenDigest {
    /// Digest of the token as presented
    #[must_use]
    pub fn of(token: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(token.trim().as_bytes())))
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a presented token does not grant admission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// The token was never issued
    TokenNotFound,
    /// The token belongs to a cancelled reservation
    ReservationCancelled,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenNotFound => write!(f, "TOKEN_NOT_FOUND"),
            Self::ReservationCancelled => write!(f, "RESERVATION_CANCELLED"),
        }
    }
}

/// Digest → reservation mapping of every token ever issued
#[derive(Clone, Debug, Default)]
pub struct AdmissionRegistry {
    issued: HashMap<TokenDigest, ReservationId>,
}

impl AdmissionRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens ever issued
    #[must_use]
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    /// Whether no token was issued yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }

    /// Whether a digest was already issued
    #[must_use]
    pub fn contains(&self, digest: &TokenDigest) -> bool {
        self.issued.contains_key(digest)
    }

    /// Draws a token whose digest has never been issued
    ///
    /// Returns `None` when every attempt collided, which with a random
    /// generator means the generator is broken.
    #[must_use]
    pub fn draw(&self, generator: &dyn TokenGenerator) -> Option<(AdmissionToken, TokenDigest)> {
        (0..MAX_TOKEN_ATTEMPTS).find_map(|_| {
            let token = generator.generate();
            let digest = TokenDigest::of(token.as_str());
            (!self.contains(&digest)).then_some((token, digest))
        })
    }

    /// Resolves a presented token against the ledger
    ///
    /// Read-only; scanning the same token repeatedly yields the same answer
    /// until the reservation changes.
    ///
    /// # Errors
    ///
    /// Returns the [`DenialReason`] when the token does not grant admission.
    pub fn verify<'a>(
        &self,
        token: &str,
        ledger: &'a Ledger,
    ) -> Result<&'a Reservation, DenialReason> {
        let reservation = self
            .issued
            .get(&TokenDigest::of(token))
            .and_then(|id| ledger.get(id))
            .ok_or(DenialReason::TokenNotFound)?;

        match reservation.status {
            ReservationStatus::Confirmed => Ok(reservation),
            ReservationStatus::Cancelled => Err(DenialReason::ReservationCancelled),
            // Tokens are only issued on confirmation, so a pending holder means
            // the registry and ledger disagree; refuse entry.
            ReservationStatus::Pending => Err(DenialReason::TokenNotFound),
        }
    }

    pub(crate) fn record(&mut self, digest: TokenDigest, reservation_id: ReservationId) {
        self.issued.insert(digest, reservation_id);
    }
}
