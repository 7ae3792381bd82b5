//! Static token-standard tables and proxy-standard probes.

pub mod eip1967;
pub mod erc1155;
pub mod erc20;
pub mod erc721;
