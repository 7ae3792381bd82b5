use tiny_keccak::{Hasher, Keccak};

/// Compute the Keccak-256 hash of input bytes.
pub fn keccak256<S>(bytes: S) -> [u8; 32]
where
    S: AsRef<[u8]>,
{
    let mut output = [0u8; 32];
    let mut hasher = Keccak::v256();
    hasher.update(bytes.as_ref());
    hasher.finalize(&mut output);
    output
}

/// Calculate the function selector as per the contract ABI specification:
/// the first 4 bytes of the Keccak-256 hash of the canonical signature.
pub fn id<S: AsRef<str>>(signature: S) -> [u8; 4] {
    let mut output = [0u8; 4];
    output.copy_from_slice(&keccak256(signature.as_ref())[..4]);
    output
}

/// The 4-byte selector of a canonical signature as a `0x`-prefixed hex string.
pub fn selector_hex<S: AsRef<str>>(signature: S) -> String {
    format!("0x{}", hex::encode(id(signature)))
}

/// The 32-byte topic of a canonical event signature as a `0x`-prefixed hex string.
pub fn event_topic<S: AsRef<str>>(signature: S) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_ref())))
}
