//! In-memory mutable document tree for the glance overlay.
//!
//! The overlay core operates on a live, externally mutated tree of elements.
//! This crate provides that tree as a concrete collaborator:
//!
//! - arena-backed nodes with stable identity ([`NodeId`])
//! - tag, attribute, class and text accessors
//! - structural mutation: append, insert-before, detach, remove
//! - pre-order traversal ([`Document::subtree`]) and ancestor walks
//! - a broadcast channel of insertion batches ([`MutationBatch`]) so
//!   observers can react to subtree additions
//! - a fullscreen capability on arbitrary nodes, with a deny switch for
//!   embedders that do not grant it
//!
//! Node identity is a plain copyable key: holding a [`NodeId`] never keeps
//! the underlying node alive. Once [`Document::remove`] drops a subtree,
//! stale ids simply stop resolving.

mod document;
mod error;

pub use document::{Document, MutationBatch, NodeId};
pub use error::DomError;
