//! `brand-invoice` - build branded invoices from the terminal.
//!
//! A draft is edited through [`draft::DraftController`], saved clients and
//! invoice history live in a flat key-value [`store`], PDFs come out of a
//! tera/Typst [`export`] pipeline, and [`mail`] posts them to a mail relay.

pub mod config;
pub mod draft;
pub mod error;
pub mod export;
pub mod form;
pub mod logo;
pub mod mail;
pub mod model;
pub mod preview;
pub mod render;
pub mod store;

pub use error::{Error, Result};
