//! # Repository Module
//!
//! Repositories over the [`crate::Database`] handle.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Order form                                                            │
//! │       │                                                                 │
//! │       │  db.orders().place_order("K-1001", &lines)                     │
//! │       ▼                                                                 │
//! │  OrderRepository ──uses──► InventoryLedger ──uses──► SequenceGenerator │
//! │       │                          │                                      │
//! │       │   canonical SQL ($1, ILIKE, ON CONFLICT)                       │
//! │       ▼                          ▼                                      │
//! │  Database ── Driver::translate ──► SQLite or PostgreSQL                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customer upsert and print area
//! - [`InventoryLedger`](ledger::InventoryLedger) - Lots, stock levels, conditional decrement
//! - [`OrderRepository`](order::OrderRepository) - Transactional order placement and history

pub mod customer;
pub mod ledger;
pub mod order;
