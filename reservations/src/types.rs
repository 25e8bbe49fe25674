//! Domain types for the book fair reservation engine.
//!
//! Value objects, entities and identifiers shared by the aggregates, the
//! projections and the HTTP layer. Aggregate state containers live next to
//! their reducers in [`crate::aggregates`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a stall
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StallId(Uuid);

impl StallId {
    /// Creates a new random `StallId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `StallId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a vendor (an exhibiting publisher or bookseller)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VendorId(Uuid);

impl VendorId {
    /// Creates a new random `VendorId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `VendorId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VendorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a fair employee or administrator
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StaffId(Uuid);

impl StaffId {
    /// Creates a new random `StaffId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `StaffId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for StaffId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Money in the smallest currency unit (cents)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Sums amounts, saturating at `u64::MAX` cents
    #[must_use]
    pub fn total<I>(amounts: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .fold(Self::ZERO, |acc, amount| Self(acc.0.saturating_add(amount.0)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Stalls
// ============================================================================

/// Size class of a stall, which drives its default price
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StallSize {
    /// Single table frontage
    Small,
    /// Double frontage
    Medium,
    /// Corner or island stall
    Large,
}

impl StallSize {
    /// All sizes, smallest first
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];
}

impl fmt::Display for StallSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small => write!(f, "SMALL"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Large => write!(f, "LARGE"),
        }
    }
}

/// A physical exhibition stall
///
/// The stall never records whether it is reserved. That is derived from the
/// reservation ledger, see [`StallStatus`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stall {
    /// Stall ID
    pub id: StallId,
    /// Human-readable unique code, e.g. `A-07`
    pub code: String,
    /// Hall the stall is located in
    pub hall: String,
    /// Size class
    pub size: StallSize,
    /// Current price; reservations freeze the price at booking time
    pub price: Money,
    /// Administratively taken out of service
    pub disabled: bool,
}

/// Derived status of a stall
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StallStatus {
    /// Not held by an active reservation and not disabled
    Available,
    /// Held by a PENDING or CONFIRMED reservation
    Reserved,
    /// Disabled and not held by an active reservation
    Disabled,
}

impl StallStatus {
    /// Derive the status from the disabled flag and whether an active reservation holds the stall
    ///
    /// A stall that is both disabled and held reports `Reserved`; disabling a
    /// held stall is rejected, so this only arises when a stall was disabled
    /// through event replay.
    #[must_use]
    pub const fn derive(disabled: bool, held: bool) -> Self {
        match (held, disabled) {
            (true, _) => Self::Reserved,
            (false, true) => Self::Disabled,
            (false, false) => Self::Available,
        }
    }
}

// ============================================================================
// Reservations
// ============================================================================

/// Lifecycle status of a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Created, awaiting confirmation
    Pending,
    /// Confirmed; an admission token has been issued
    Confirmed,
    /// Cancelled; holds released and token invalid
    Cancelled,
}

impl ReservationStatus {
    /// Whether the reservation holds its stalls and counts towards the quota
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One stall of a reservation with its price frozen at booking time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stall ID
    pub stall_id: StallId,
    /// Stall code at booking time
    pub stall_code: String,
    /// Hall at booking time
    pub hall: String,
    /// Size at booking time
    pub size: StallSize,
    /// Price at booking time
    pub price: Money,
}

/// How the stall fee is paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Paid in cash at the venue on the fair's opening day
    PayAtVenue,
}

/// Collection status of the stall fee
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Not collected yet
    Due,
    /// Collected by staff at the venue
    Collected,
}

/// Payment record of a reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment method
    pub method: PaymentMethod,
    /// Collection status
    pub status: PaymentStatus,
    /// When staff recorded the collection
    pub collected_at: Option<DateTime<Utc>>,
    /// Who recorded the collection
    pub collected_by: Option<StaffId>,
}

impl Payment {
    /// A pay-at-venue payment that is still due
    #[must_use]
    pub const fn due_at_venue() -> Self {
        Self {
            method: PaymentMethod::PayAtVenue,
            status: PaymentStatus::Due,
            collected_at: None,
            collected_by: None,
        }
    }
}

/// Opaque admission credential (the QR payload)
///
/// 256 bits of randomness, base64url encoded. Only its SHA-256 digest is
/// indexed for verification. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdmissionToken(String);

impl AdmissionToken {
    /// Wrap a token string
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as presented at the gate
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdmissionToken(<redacted>)")
    }
}

/// A vendor's claim over one or more stalls
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Human-facing code, `RES-` followed by upper-case hex
    pub code: String,
    /// Owning vendor
    pub vendor_id: VendorId,
    /// Reserved stalls in request order, without duplicates
    pub line_items: Vec<LineItem>,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Confirmation time
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Cancellation time
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Who cancelled the reservation
    pub cancelled_by: Option<Actor>,
    /// Pay-at-venue payment record
    pub payment: Payment,
    /// Admission token, present once confirmed
    pub admission_token: Option<AdmissionToken>,
}

impl Reservation {
    /// Sum of the frozen line item prices
    #[must_use]
    pub fn total_amount(&self) -> Money {
        Money::total(self.line_items.iter().map(|item| item.price))
    }

    /// IDs of the reserved stalls
    pub fn stall_ids(&self) -> impl Iterator<Item = StallId> + '_ {
        self.line_items.iter().map(|item| item.stall_id)
    }

    /// Whether the reservation references the stall
    #[must_use]
    pub fn holds(&self, stall_id: StallId) -> bool {
        self.line_items.iter().any(|item| item.stall_id == stall_id)
    }

    /// Whether the given actor may see and manage this reservation
    ///
    /// Staff see everything; vendors see only their own reservations.
    #[must_use]
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Vendor(vendor_id) => *vendor_id == self.vendor_id,
            Actor::Employee(_) | Actor::Admin(_) => true,
        }
    }
}

// ============================================================================
// Vendors and actors
// ============================================================================

/// Contact details of a vendor, shown to staff
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Vendor ID
    pub id: VendorId,
    /// Contact person
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone number
    pub contact_number: String,
    /// Publisher or bookshop name
    pub business_name: String,
}

/// The caller of an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    /// A vendor acting on their own reservations
    Vendor(VendorId),
    /// Fair employee (gate scanning, payment collection)
    Employee(StaffId),
    /// Fair administrator
    Admin(StaffId),
}

impl Actor {
    /// Employees and admins
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::Employee(_) | Self::Admin(_))
    }

    /// Admins only
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }

    /// The vendor ID when the actor is a vendor
    #[must_use]
    pub const fn vendor_id(&self) -> Option<VendorId> {
        match self {
            Self::Vendor(vendor_id) => Some(*vendor_id),
            Self::Employee(_) | Self::Admin(_) => None,
        }
    }

    /// The staff ID when the actor is an employee or admin
    #[must_use]
    pub const fn staff_id(&self) -> Option<StaffId> {
        match self {
            Self::Employee(staff_id) | Self::Admin(staff_id) => Some(*staff_id),
            Self::Vendor(_) => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vendor(id) => write!(f, "vendor:{id}"),
            Self::Employee(id) => write!(f, "employee:{id}"),
            Self::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_and_total() {
        let total = Money::total([Money::from_cents(150_000), Money::from_cents(2_550)]);
        assert_eq!(total, Money::from_cents(152_550));
        assert_eq!(total.to_string(), "1525.50");
        assert!(Money::ZERO.is_zero());
    }

    #[test]
    fn stall_status_is_derived() {
        assert_eq!(StallStatus::derive(false, false), StallStatus::Available);
        assert_eq!(StallStatus::derive(true, false), StallStatus::Disabled);
        assert_eq!(StallStatus::derive(false, true), StallStatus::Reserved);
    }

    #[test]
    fn admission_token_debug_is_redacted() {
        let token = AdmissionToken::new("secret-value");
        assert!(!format!("{token:?}").contains("secret"));
        assert_eq!(token.as_str(), "secret-value");
    }

    #[test]
    fn actor_serializes_with_role_tag() {
        let vendor = VendorId::new();
        let json = serde_json::to_value(Actor::Vendor(vendor)).unwrap_or_default();
        assert_eq!(json["role"], "VENDOR");
        assert_eq!(json["id"], vendor.to_string());
    }

    #[test]
    fn only_active_statuses_hold_stalls() {
        assert!(ReservationStatus::Pending.is_active());
        assert!(ReservationStatus::Confirmed.is_active());
        assert!(!ReservationStatus::Cancelled.is_active());
    }
}
