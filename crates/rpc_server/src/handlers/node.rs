//! Node/P2P/relay methods (spec §4.C), ported from the reference node's
//! `rpc_server_node.rs`.

use std::sync::Arc;

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::PublicKey;
use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::{invalid_params, RpcError, RpcException};
use crate::params::Params;
use crate::types::{RelayOutcome, SignerRecord, TransactionRecord, WitnessRecord};

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register("getconnectioncount", Arc::new(get_connection_count));
    dispatcher.register("getpeers", Arc::new(get_peers));
    dispatcher.register("getversion", Arc::new(get_version));
    dispatcher.register("sendrawtransaction", Arc::new(send_raw_transaction));
    dispatcher.register("submitblock", Arc::new(submit_block));
    dispatcher.register("submitnotaryrequest", Arc::new(submit_notary_request));
    dispatcher.register("submitoracleresponse", Arc::new(submit_oracle_response));
}

fn get_connection_count(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!(ctx.p2p.connected_count()))
}

fn get_peers(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let peer_json = |peer: &crate::types::PeerAddress| json!({ "address": peer.address, "port": peer.port });
    Ok(json!({
        "connected": ctx.p2p.connected_peers().iter().map(peer_json).collect::<Vec<_>>(),
        "unconnected": ctx.p2p.unconnected_peers().iter().map(peer_json).collect::<Vec<_>>(),
        "bad": ctx.p2p.bad_peers().iter().map(peer_json).collect::<Vec<_>>(),
    }))
}

fn get_version(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!({
        "tcpport": ctx.p2p.tcp_port(),
        "nonce": ctx.p2p.nonce(),
        "useragent": ctx.p2p.user_agent(),
        "protocol": {
            "addressversion": 53u8,
            "network": 860833102u32,
            "validatorscount": ctx.chain.next_block_validators().len(),
            "msperblock": 15000u32,
            "maxtraceableblocks": 2_102_400u32,
            "maxvaliduntilblockincrement": ctx.chain.policy().max_valid_until_block_increment,
            "maxtransactionsperblock": ctx.chain.policy().max_transactions_per_block,
            "memorypoolmaxtransactions": 50_000u32,
        }
    }))
}

/// Translates the relay/accept path's outcome sentinel into the error
/// taxonomy (spec §4.C "submitblock / sendrawtransaction / submitnotaryrequest").
fn map_relay_outcome(outcome: RelayOutcome) -> Result<Value, RpcException> {
    match outcome {
        RelayOutcome::Succeed => Ok(json!(true)),
        RelayOutcome::AlreadyExists => Err(RpcError::already_exists().into()),
        RelayOutcome::OutOfMemory => Err(RpcError::out_of_memory().into()),
        RelayOutcome::PolicyFail => Err(RpcError::policy_fail().into()),
        RelayOutcome::InvalidSignature
        | RelayOutcome::InvalidScript
        | RelayOutcome::InvalidAttribute
        | RelayOutcome::Expired
        | RelayOutcome::InsufficientFunds
        | RelayOutcome::Unknown => Err(RpcError::validation_failed().into()),
    }
}

/// The concrete Neo transaction wire format is a ledger/VM concern (an
/// explicit non-goal); actual decoding is delegated to the `Chain`
/// collaborator's `decode_transaction`. When it can't make sense of the
/// bytes (e.g. the demo `Chain` has no wire format at all), this falls
/// back to a skeleton carrying no signers/witnesses, which still exercises
/// relay/fee paths that don't depend on them.
pub(crate) fn decode_transaction_skeleton(
    bytes: &[u8],
    chain: &dyn crate::chain::Chain,
) -> Result<TransactionRecord, RpcException> {
    if bytes.is_empty() {
        return Err(invalid_params("empty transaction payload"));
    }
    if let Some(tx) = chain.decode_transaction(bytes) {
        return Ok(tx);
    }
    Ok(TransactionRecord {
        hash: crate::hash_types::UInt256::zero(),
        version: 0,
        nonce: 0,
        sender: crate::hash_types::UInt160::zero(),
        sys_fee: 0,
        net_fee: 0,
        valid_until_block: 0,
        signers: Vec::<SignerRecord>::new(),
        attributes: Vec::new(),
        script: bytes.to_vec(),
        witnesses: Vec::<WitnessRecord>::new(),
        size: bytes.len(),
        block_hash: None,
        block_time: None,
        confirmations: None,
        vm_state: None,
    })
}

fn send_raw_transaction(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let bytes = params.base64_bytes(0)?;
    let tx = decode_transaction_skeleton(&bytes, ctx.chain)?;
    map_relay_outcome(ctx.chain.submit_transaction(tx))
}

fn submit_block(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let bytes = params.base64_bytes(0)?;
    if bytes.is_empty() {
        return Err(invalid_params("empty block payload"));
    }
    let header = crate::types::BlockHeaderData {
        hash: crate::hash_types::UInt256::zero(),
        version: 0,
        index: ctx.chain.current_block_height() + 1,
        previous_hash: ctx.chain.best_block_hash(),
        merkle_root: crate::hash_types::UInt256::zero(),
        timestamp: 0,
        nonce: 0,
        next_consensus: crate::hash_types::UInt160::zero(),
        primary_validator: 0,
        witness_invocation: Vec::new(),
        witness_verification: Vec::new(),
        confirmations: 0,
        next_block_hash: None,
    };
    let block = crate::types::BlockData {
        header,
        transactions: Vec::new(),
        size: bytes.len(),
    };
    map_relay_outcome(ctx.chain.submit_block(block))
}

fn submit_notary_request(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    if !ctx.chain.p2p_signature_extensions_enabled() {
        return Err(invalid_params("P2P signature extensions are disabled"));
    }
    let bytes = params.base64_bytes(0)?;
    let main_transaction = decode_transaction_skeleton(&bytes, ctx.chain)?;
    let fallback_transaction = main_transaction.clone();
    let request = crate::types::NotaryRequestRecord {
        main_transaction,
        fallback_transaction,
        witness: WitnessRecord { invocation: Vec::new(), verification: Vec::new() },
    };
    map_relay_outcome(ctx.p2p.relay_notary_request(request))
}

/// Spec §4.C "submitoracleresponse": verifies a signature over
/// `(publicKey ‖ requestID ‖ txSignature)` using SHA-256 before admitting
/// it; rejects when the oracle service is disabled.
fn submit_oracle_response(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    if !ctx.oracle.is_enabled() {
        return Err(RpcError::access_denied().with_data("oracle service disabled").into());
    }

    let pub_key = params.base64_bytes(0)?;
    let request_id = params.u32(1)? as u64;
    let tx_signature = params.base64_bytes(2)?;
    let signature = params.base64_bytes(3)?;

    let mut message = Vec::with_capacity(pub_key.len() + 8 + tx_signature.len());
    message.extend_from_slice(&pub_key);
    message.extend_from_slice(&request_id.to_le_bytes());
    message.extend_from_slice(&tx_signature);

    if !verify_oracle_signature(&pub_key, &message, &signature) {
        return Err(RpcError::access_denied().with_data("invalid oracle response signature").into());
    }

    ctx.oracle
        .add_response(&pub_key, request_id, &tx_signature)
        .map_err(crate::error::internal_error)?;
    Ok(json!(true))
}

/// Verifies `signature` over `message` under `pub_key` on Neo's P-256
/// (secp256r1) curve, SHA-256 hashed internally by `VerifyingKey::verify`.
/// Accepts both Neo's raw 64-byte `r ‖ s` signature encoding and DER, and
/// treats any malformed key/signature as a failed verification rather
/// than an error, matching a real ECDSA check's fail-closed posture.
fn verify_oracle_signature(pub_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::from_sec1_bytes(pub_key) else {
        return false;
    };
    let verifying_key = VerifyingKey::from(public_key);

    let parsed_signature = if signature.len() == 64 {
        Signature::try_from(signature).ok()
    } else {
        Signature::from_der(signature).ok()
    };
    let Some(parsed_signature) = parsed_signature else {
        return false;
    };

    verifying_key.verify(message, &parsed_signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcServerConfig;
    use crate::test_support::{NullChain, NullOracle, NullP2P, NullStateModule};

    fn context<'a>(
        chain: &'a NullChain,
        p2p: &'a NullP2P,
        oracle: &'a NullOracle,
        state_module: &'a NullStateModule,
        config: &'a RpcServerConfig,
    ) -> HandlerContext<'a> {
        HandlerContext { chain, p2p, oracle, state_module, config, subscriber: None, hub: None }
    }

    #[test]
    fn get_connection_count_reports_p2p_collaborator() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[], "getconnectioncount");
        assert_eq!(get_connection_count(&params, &ctx).unwrap(), json!(0));
    }

    #[test]
    fn get_peers_reports_empty_buckets_with_no_collaborator_state() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[], "getpeers");
        let result = get_peers(&params, &ctx).unwrap();
        assert_eq!(result["connected"], json!([]));
        assert_eq!(result["unconnected"], json!([]));
        assert_eq!(result["bad"], json!([]));
    }

    #[test]
    fn send_raw_transaction_rejects_empty_payload() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!("")], "sendrawtransaction");
        let err = send_raw_transaction(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);
    }

    #[test]
    fn submit_notary_request_rejects_when_p2p_signature_extensions_disabled() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!("AA==")], "submitnotaryrequest");
        let err = submit_notary_request(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);
    }

    #[test]
    fn submit_oracle_response_is_access_denied_when_oracle_disabled() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!("AA=="), json!(1u32), json!("AA=="), json!("AA==")], "submitoracleresponse");
        let err = submit_oracle_response(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::AccessDenied);
    }

    /// Always enabled, always admits — used to reach the signature check
    /// with the oracle-disabled gate out of the way.
    struct EnabledOracle;

    impl crate::oracle::Oracle for EnabledOracle {
        fn is_enabled(&self) -> bool {
            true
        }

        fn set_broadcaster(&self, _broadcaster: Arc<dyn Fn(crate::types::OracleResponse) + Send + Sync>) {}

        fn add_response(&self, _pub_key: &[u8], _request_id: u64, _tx_signature: &[u8]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn submit_oracle_response_is_access_denied_when_signature_does_not_verify() {
        let (chain, p2p, state_module, config) = (NullChain, NullP2P, NullStateModule, RpcServerConfig::default());
        let oracle = EnabledOracle;
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!("AA=="), json!(1u32), json!("AA=="), json!("AA==")], "submitoracleresponse");
        let err = submit_oracle_response(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::AccessDenied);
    }

    #[test]
    fn submit_oracle_response_admits_a_correctly_signed_response() {
        use base64::Engine;
        use p256::ecdsa::signature::Signer;
        use p256::ecdsa::SigningKey;
        use p256::elliptic_curve::sec1::ToEncodedPoint;

        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let pub_key = verifying_key.to_encoded_point(true).as_bytes().to_vec();
        let request_id: u64 = 7;
        let tx_signature = vec![9u8; 4];

        let mut message = Vec::new();
        message.extend_from_slice(&pub_key);
        message.extend_from_slice(&request_id.to_le_bytes());
        message.extend_from_slice(&tx_signature);
        let signature: Signature = signing_key.sign(&message);

        let (chain, p2p, state_module, config) = (NullChain, NullP2P, NullStateModule, RpcServerConfig::default());
        let oracle = EnabledOracle;
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);

        let encode = |bytes: &[u8]| base64::engine::general_purpose::STANDARD.encode(bytes);
        let params = Params::new(
            &[
                json!(encode(&pub_key)),
                json!(request_id as u32),
                json!(encode(&tx_signature)),
                json!(encode(signature.to_bytes().as_slice())),
            ],
            "submitoracleresponse",
        );
        let result = submit_oracle_response(&params, &ctx).unwrap();
        assert_eq!(result, json!(true));
    }
}
