//! Stall inventory.
//!
//! Owns the stall records. Whether a stall is reserved is not stored here;
//! the ledger's hold index is the single source of truth for that, and
//! [`crate::types::StallStatus`] is derived from both.

use crate::error::{BookingError, Resource};
use crate::types::{Money, Stall, StallId, StallSize};
use std::collections::{BTreeMap, HashMap};

/// Normalize a stall code for storage and lookup (`a-07 ` → `A-07`)
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// All stalls of the fair, indexed by ID and by code
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    stalls: HashMap<StallId, Stall>,
    codes: BTreeMap<String, StallId>,
}

impl Inventory {
    /// Creates an empty inventory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a stall by ID
    #[must_use]
    pub fn get(&self, id: &StallId) -> Option<&Stall> {
        self.stalls.get(id)
    }

    /// Gets a stall by code, ignoring case and surrounding whitespace
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<&Stall> {
        self.codes
            .get(&normalize_code(code))
            .and_then(|id| self.stalls.get(id))
    }

    /// Looks up a stall or reports it as not found
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown ID.
    pub fn require(&self, id: &StallId) -> Result<&Stall, BookingError> {
        self.get(id)
            .ok_or_else(|| BookingError::not_found(Resource::Stall, id))
    }

    /// Number of stalls
    #[must_use]
    pub fn len(&self) -> usize {
        self.stalls.len()
    }

    /// Whether the inventory has no stalls
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stalls.is_empty()
    }

    /// All stalls ordered by code
    pub fn iter(&self) -> impl Iterator<Item = &Stall> + '_ {
        self.codes.values().filter_map(|id| self.stalls.get(id))
    }

    /// Distinct hall names, sorted
    #[must_use]
    pub fn halls(&self) -> Vec<String> {
        let mut halls: Vec<String> = self.stalls.values().map(|s| s.hall.clone()).collect();
        halls.sort();
        halls.dedup();
        halls
    }

    /// Validates a new stall and returns its normalized code
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRequest`] for an empty code or hall, a
    /// code already in use, or a zero price.
    pub fn validate_new_stall(
        &self,
        code: &str,
        hall: &str,
        price: Money,
    ) -> Result<String, BookingError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(BookingError::invalid("Stall code must not be empty"));
        }
        if hall.trim().is_empty() {
            return Err(BookingError::invalid("Hall must not be empty"));
        }
        if self.codes.contains_key(&code) {
            return Err(BookingError::invalid(format!(
                "Stall code {code} is already in use"
            )));
        }
        if price.is_zero() {
            return Err(BookingError::invalid("Stall price must be greater than zero"));
        }
        Ok(code)
    }

    pub(crate) fn insert(&mut self, stall: Stall) {
        self.codes.insert(stall.code.clone(), stall.id);
        self.stalls.insert(stall.id, stall);
    }

    pub(crate) fn set_disabled(&mut self, id: &StallId, disabled: bool) {
        if let Some(stall) = self.stalls.get_mut(id) {
            stall.disabled = disabled;
        }
    }

    pub(crate) fn set_price(&mut self, id: &StallId, price: Money) {
        if let Some(stall) = self.stalls.get_mut(id) {
            stall.price = price;
        }
    }
}

/// Builds the stall record for a seeded or admin-added stall
#[must_use]
pub fn new_stall(id: StallId, code: String, hall: &str, size: StallSize, price: Money) -> Stall {
    Stall {
        id,
        code,
        hall: hall.trim().to_string(),
        size,
        price,
        disabled: false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inventory_with(codes: &[&str]) -> Inventory {
        let mut inventory = Inventory::new();
        for code in codes {
            inventory.insert(new_stall(
                StallId::new(),
                normalize_code(code),
                "Hall A",
                StallSize::Small,
                Money::from_cents(10_000),
            ));
        }
        inventory
    }

    #[test]
    fn iterates_in_code_order() {
        let inventory = inventory_with(&["A-03", "A-01", "A-02"]);
        let codes: Vec<&str> = inventory.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["A-01", "A-02", "A-03"]);
    }

    #[test]
    fn lookup_by_code_is_case_insensitive() {
        let inventory = inventory_with(&["B-03"]);
        assert_eq!(inventory.by_code(" b-03").unwrap().code, "B-03");
        assert!(inventory.by_code("B-04").is_none());
    }

    #[test]
    fn rejects_duplicate_code() {
        let inventory = inventory_with(&["A-01"]);
        let error = inventory
            .validate_new_stall("a-01", "Hall A", Money::from_cents(1))
            .unwrap_err();
        assert_eq!(error.code(), "INVALID_REQUEST");
    }

    #[test]
    fn rejects_zero_price_and_blank_fields() {
        let inventory = Inventory::new();
        assert!(inventory.validate_new_stall("A-01", "Hall A", Money::ZERO).is_err());
        assert!(inventory.validate_new_stall("  ", "Hall A", Money::from_cents(1)).is_err());
        assert!(inventory.validate_new_stall("A-01", " ", Money::from_cents(1)).is_err());
        assert_eq!(
            inventory
                .validate_new_stall(" a-01 ", "Hall A", Money::from_cents(1))
                .unwrap(),
            "A-01"
        );
    }

    #[test]
    fn unknown_stall_is_not_found() {
        let inventory = Inventory::new();
        let error = inventory.require(&StallId::new()).unwrap_err();
        assert_eq!(error.code(), "NOT_FOUND");
    }

    #[test]
    fn halls_are_distinct_and_sorted() {
        let mut inventory = inventory_with(&["A-01", "A-02"]);
        inventory.insert(new_stall(
            StallId::new(),
            "C-01".to_string(),
            "Hall C",
            StallSize::Large,
            Money::from_cents(1),
        ));
        assert_eq!(inventory.halls(), vec!["Hall A", "Hall C"]);
    }
}
