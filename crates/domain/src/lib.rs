//! Domain layer for the order system.
//!
//! This crate provides:
//! - [`OrderEngine`], placing orders against live inventory and moving them
//!   between statuses with compensating stock writes
//! - [`OrderService`], translating client request shapes into engine calls
//! - [`CatalogService`], admin product management with field validation
//! - [`DomainError`] and the transport-neutral [`ServiceError`]

pub mod actor;
pub mod catalog;
pub mod error;
pub mod order;

pub use actor::Actor;
pub use catalog::{CatalogError, CatalogService, FieldErrors, ProductInput, ProductPatch};
pub use error::{DomainError, ErrorCategory, ServiceError};
pub use order::{
    ItemRejection, OrderEngine, OrderError, OrderItemRequest, OrderLine, OrderService,
    PlaceOrderRequest, PlacedOrder, UpdateStatusRequest,
};
