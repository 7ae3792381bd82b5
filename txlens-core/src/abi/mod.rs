//! Contract ABI handling: raw JSON parsing, canonical signatures and the
//! ABI v2 wire codec.

pub mod codec;
pub use codec::{
    decode_event_parameters, decode_function_parameters, decode_graffiti_parameters,
    decode_static_argument, decode_struct, ERROR_SELECTOR,
};

mod encode;
pub use encode::{encode_call, encode_struct};

mod error;
pub use error::AbiError;

mod parse;
pub use parse::{parse_abi, ParsedAbi};

mod raw;
pub use raw::{Component, Item, RawAbi};
