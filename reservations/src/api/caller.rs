//! Caller identification.
//!
//! Authentication happens upstream; by the time a request reaches this
//! service the gateway has resolved the caller and forwards it in the
//! `x-bookfair-actor` header as `vendor:<uuid>`, `employee:<uuid>` or
//! `admin:<uuid>`.

use super::error::AppError;
use crate::types::{Actor, StaffId, VendorId};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the resolved caller
pub const ACTOR_HEADER: &str = "x-bookfair-actor";

/// Parses `role:uuid`
///
/// # Errors
///
/// Returns a description of what is malformed.
pub fn parse_actor(raw: &str) -> Result<Actor, String> {
    let (role, id) = raw
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("Expected '<role>:<uuid>', got '{raw}'"))?;
    let uuid = Uuid::parse_str(id.trim()).map_err(|e| format!("Invalid caller id: {e}"))?;

    match role.trim().to_ascii_lowercase().as_str() {
        "vendor" => Ok(Actor::Vendor(VendorId::from_uuid(uuid))),
        "employee" => Ok(Actor::Employee(StaffId::from_uuid(uuid))),
        "admin" => Ok(Actor::Admin(StaffId::from_uuid(uuid))),
        other => Err(format!("Unknown role '{other}'")),
    }
}

fn actor_from_parts(parts: &Parts) -> Result<Option<Actor>, AppError> {
    let Some(value) = parts.headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AppError::unauthorized("Caller header is not valid UTF-8"))?;
    parse_actor(raw).map(Some).map_err(AppError::unauthorized)
}

/// The identified caller; rejects requests without one
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

impl Caller {
    /// The vendor ID, or 403 for staff
    ///
    /// # Errors
    ///
    /// [`AppError::forbidden`] when the caller is not a vendor.
    pub fn vendor(&self) -> Result<VendorId, AppError> {
        self.0
            .vendor_id()
            .ok_or_else(|| AppError::forbidden("Only vendors can do this"))
    }

    /// The staff ID of an employee or admin, or 403
    ///
    /// # Errors
    ///
    /// [`AppError::forbidden`] when the caller is a vendor.
    pub fn staff(&self) -> Result<StaffId, AppError> {
        self.0
            .staff_id()
            .ok_or_else(|| AppError::forbidden("Only fair staff can do this"))
    }

    /// The staff ID of an admin, or 403
    ///
    /// # Errors
    ///
    /// [`AppError::forbidden`] unless the caller is an admin.
    pub fn admin(&self) -> Result<StaffId, AppError> {
        match self.0 {
            Actor::Admin(staff_id) => Ok(staff_id),
            Actor::Vendor(_) | Actor::Employee(_) => {
                Err(AppError::forbidden("Only administrators can do this"))
            },
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_parts(parts)?
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Missing x-bookfair-actor header"))
    }
}

/// The caller when one is given; public endpoints accept anonymous requests
#[derive(Debug, Clone, Copy)]
pub struct MaybeCaller(pub Option<Actor>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_parts(parts).map(Self)
    }
}
