use txlens::{prelude::DecodeError, Txlens, TxlensConfig};

#[tokio::test]
async fn rejects_invalid_hashes_before_any_io() {
    let txlens = Txlens::new(TxlensConfig::default());
    let result = txlens.decode_transaction(None, "notahash").await;
    assert!(matches!(result, Err(DecodeError::InvalidTransactionHash(_))));
}

#[tokio::test]
async fn unknown_chains_are_fatal() {
    let txlens = Txlens::new(TxlensConfig::default());
    let result = txlens.decode_transaction(Some("moonbase"), &"ab".repeat(32)).await;
    assert!(matches!(result, Err(DecodeError::Node(_))));
}
