//! Core IMAP types.
//!
//! Requests and responses share one recursive attribute tree; the connection
//! core only needs verbs, tags and a few well-known attribute shapes.

#![allow(clippy::missing_const_for_fn)]

mod attribute;
mod capability;
mod request;
mod response;

pub use attribute::{Attribute, Partial};
pub use capability::Capabilities;
pub use request::Request;
pub use response::{CodeValue, Response};
