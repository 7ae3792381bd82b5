//! Core types and codecs for the txlens transaction decoder.
//!
//! This crate is I/O-free: it defines the raw object model fetched from a
//! node, the semantics model served by the repository, the decoded model
//! returned to callers, and the ABI v2 codec connecting them.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod abi;
pub mod decoded;
pub mod semantics;
pub mod types;
pub mod utils;
