//! Transactional persistence for the order backend.
//!
//! Provides the repository traits, the unit-of-work executor and two
//! stores: [`PostgresStore`] for production and [`InMemoryStore`] for tests
//! and local runs.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;
pub mod uow;

pub use error::{Result, StoreError, TxError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use model::{NewOrder, NewProduct, Order, OrderLineItem, Product, ProductChanges};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{CatalogRepository, InventoryRepository, OrderRepository, Store, Transaction};
pub use uow::run_in_transaction;
