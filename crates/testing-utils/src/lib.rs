//! # Broadcaster Testing Utils
//!
//! Shared testing utilities for the broadcast dispatch engine.
//! This crate provides in-memory mock implementations of the repository
//! and delivery traits plus test data builders, so that dispatcher and
//! API tests run without a database or a live messaging provider.
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! broadcaster-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::{BroadcastBuilder, RecipientBuilder};
pub use mocks::{
    FakeDeliveryApi, MockBroadcastRepository, MockConversationRepository, MockRecipientRepository,
    SendOutcome,
};
