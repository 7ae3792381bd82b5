//! The semantics layer of txlens: what is known about addresses, contracts
//! and signatures, how it is cached, persisted and amended.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod amendments;
pub use amendments::{amend_contract_semantics, SemanticsOverlay, ANONYMOUS_EVENTS};

pub mod database;
pub use database::{AddressRecord, MemoryDatabase, SemanticsDatabase};

pub mod precompiles;
pub use precompiles::{precompiled, PRECOMPILES};

pub mod repository;
pub use repository::{SemanticsRepository, TokenData, EMPTY_CODE_HASH};

pub mod standards;
