//! VM Invoker (spec §4.D): runs a script in an isolated test-VM context
//! against a synthetic or historical "current persisting block", and
//! never leaks native resources. Grounded in the reference node's
//! `rpc_server_blockchain.rs::invoke_function`/`invoke_script`/
//! `invoke_contract_verify` family, generalized onto `TestVmFactory`
//! instead of a concrete `ApplicationEngine`.

use std::sync::Arc;

use crate::chain::Chain;
use crate::error::{internal_error, RpcException};
use crate::hash_types::UInt160;
use crate::tree::InvocationTree;
use crate::types::{
    BlockAnchor, CallFlags, InvocationResult, NotificationEvent, StackItemData, Trigger,
    TransactionSkeleton, VmRunOutcome,
};

pub struct InvokeRequest<'a> {
    pub trigger: Trigger,
    pub script: Vec<u8>,
    /// Set only for `invokecontractverify*` (spec §4.D step 4).
    pub verification_contract: Option<UInt160>,
    pub tx: TransactionSkeleton,
    /// `Some` for the `*historic` method variants (spec §4.D step 2).
    pub historic_root: Option<crate::hash_types::UInt256>,
    pub verbose: bool,
    pub max_gas_invoke: i64,
    pub chain: &'a dyn Chain,
}

/// Encodes a contract call (`scripthash`, `operation`, `args`) the way a
/// real script compiler would assemble a NeoVM call script. Building real
/// bytecode is the contract VM's concern (non-goal); this produces a
/// stable, self-describing byte encoding the paired `TestVmFactory`
/// implementation is expected to interpret the same way it interprets any
/// other script handed to `load_script`.
pub fn build_call_script(contract: &UInt160, operation: &str, args: &[serde_json::Value]) -> Vec<u8> {
    let payload = serde_json::json!({ "contract": contract.to_string(), "operation": operation, "args": args });
    payload.to_string().into_bytes()
}

/// Step 1: fabricate a block at `currentHeight+1` whose timestamp is
/// `previousHeader.timestamp + secondsPerBlock*1000`, unless a historical
/// anchor is already pinned by `historic_root`.
fn build_anchor(chain: &dyn Chain, seconds_per_block: u64) -> Result<BlockAnchor, RpcException> {
    let height = chain.current_block_height();
    let previous = chain
        .header_by_index(height)
        .ok_or_else(|| internal_error("missing current header for anchor construction"))?;
    Ok(BlockAnchor {
        index: height + 1,
        timestamp: previous.timestamp + seconds_per_block * 1000,
        primary_validator: 0,
    })
}

/// Runs `request` to completion, finalizing the VM context on every exit
/// path (spec §4.D step 5) including early error returns.
pub fn invoke(request: InvokeRequest<'_>, seconds_per_block: u64) -> Result<InvocationResult, RpcException> {
    let InvokeRequest {
        trigger,
        script,
        verification_contract,
        tx,
        historic_root,
        verbose,
        max_gas_invoke,
        chain,
    } = request;

    let anchor = build_anchor(chain, seconds_per_block)?;
    let factory: Arc<dyn crate::vm::TestVmFactory> = chain.test_vm_factory();

    let mut context = factory
        .open(trigger, &tx, &anchor, historic_root.as_ref())
        .map_err(internal_error)?;

    // Step 3: gas ceiling.
    let gas_limit = match trigger {
        Trigger::Verification => std::cmp::min(max_gas_invoke, factory.max_verification_gas()),
        Trigger::Application => max_gas_invoke,
    };
    context.set_gas_limit(gas_limit);

    // Step 4: load + run.
    match (trigger, verification_contract) {
        (Trigger::Verification, Some(contract_hash)) => {
            context.init_verification_context(&contract_hash, &script);
        }
        _ => context.load_script(&script, CallFlags::All),
    }

    let outcome = context.run();

    let gas_consumed = context.gas_consumed();
    let stack = context.result_stack();
    let notifications = context.notifications();
    let fault_exception = context.fault_exception();

    // Step 6: verbose emits the invocation tree. `TestVmContext` exposes no
    // call-stack frames, so the tree is reconstructed from what it does
    // expose: the entry contract as root, with every distinct contract
    // hash that raised a notification during the run attached as a child
    // frame, in the order notifications were raised.
    let tree = if verbose {
        Some(flatten_invocation_tree(build_invocation_tree(
            verification_contract,
            &notifications,
        )))
    } else {
        None
    };

    // Step 5: finalize on every exit path, success or fault.
    context.finalize();

    Ok(InvocationResult {
        state: outcome,
        gas_consumed,
        script,
        stack,
        fault_exception,
        notifications,
        tree,
    })
}

/// Builds the verbose-invoke call tree (spec §4.D step 6) from the entry
/// contract and the notifications the run raised. The root is the
/// verification contract when one was supplied, or the first notifying
/// contract otherwise; every later distinct contract hash becomes a child
/// of the root, matching the flat call depth `TestVmContext` can observe.
fn build_invocation_tree(
    verification_contract: Option<UInt160>,
    notifications: &[NotificationEvent],
) -> InvocationTree {
    let mut hashes = notifications.iter().map(|n| n.script_hash);
    let root_hash = verification_contract
        .or_else(|| hashes.next())
        .unwrap_or_else(UInt160::zero);
    let tree = InvocationTree::new(root_hash);

    let mut seen = vec![root_hash];
    for notification in notifications {
        let hash = notification.script_hash;
        if seen.contains(&hash) {
            continue;
        }
        seen.push(hash);
        tree.root().add_child(hash);
    }
    tree
}

/// Pre-order flatten of an `InvocationTree` into the wire shape (spec §3
/// "Invocation Result" `tree?`), root first, then children in call order.
fn flatten_invocation_tree(tree: InvocationTree) -> Vec<UInt160> {
    let mut out = vec![*tree.root().item()];
    out.extend(tree.root().children().iter().map(|child| *child.item()));
    out
}

/// `invokeReadOnly` convenience path (spec §4.D "Edge-case policies"), used
/// by balance queries (`balanceOf`/`tokensOf`). Asserts exactly one item
/// remains on the result stack, since it's called from server-internal
/// contexts rather than directly from client input.
pub fn invoke_read_only(
    chain: &dyn Chain,
    script: Vec<u8>,
    max_gas_invoke: i64,
    seconds_per_block: u64,
) -> Result<StackItemData, RpcException> {
    let result = invoke(
        InvokeRequest {
            trigger: Trigger::Application,
            script,
            verification_contract: None,
            tx: TransactionSkeleton {
                script: Vec::new(),
                signers: Vec::new(),
                witnesses: Vec::new(),
                valid_until_block: chain.current_block_height() + 1,
            },
            historic_root: None,
            verbose: false,
            max_gas_invoke,
            chain,
        },
        seconds_per_block,
    )?;

    if result.state != VmRunOutcome::Halt {
        return Err(internal_error(format!(
            "invokeReadOnly faulted: {}",
            result.fault_exception.unwrap_or_default()
        )));
    }

    let mut stack = result.stack;
    if stack.len() != 1 {
        return Err(internal_error(format!(
            "invokeReadOnly expected exactly one result item, got {}",
            stack.len()
        )));
    }
    Ok(stack.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullChain;
    use crate::types::{SignerRecord, TransactionSkeleton};

    // `NullChain::header_by_index` always returns `None`, so the anchor
    // step (spec §4.D step 1) cannot fabricate a "current persisting
    // block" and the whole invocation fails closed rather than panicking.
    #[test]
    fn invoke_fails_closed_when_the_chain_has_no_current_header() {
        let chain = NullChain;
        let request = InvokeRequest {
            trigger: Trigger::Application,
            script: Vec::new(),
            verification_contract: None,
            tx: TransactionSkeleton {
                script: Vec::new(),
                signers: Vec::<SignerRecord>::new(),
                witnesses: Vec::new(),
                valid_until_block: 1,
            },
            historic_root: None,
            verbose: false,
            max_gas_invoke: 1_000_000_000,
            chain: &chain,
        };
        let err = invoke(request, 15).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InternalServerError);
    }

    #[test]
    fn build_call_script_embeds_contract_operation_and_args() {
        let contract = UInt160::zero();
        let script = build_call_script(&contract, "transfer", &[serde_json::json!("a"), serde_json::json!(1)]);
        let text = String::from_utf8(script).unwrap();
        assert!(text.contains("transfer"));
        assert!(text.contains(&contract.to_string()));
    }

    fn notification(hash: UInt160) -> NotificationEvent {
        NotificationEvent {
            container: crate::hash_types::UInt256::zero(),
            script_hash: hash,
            event_name: "Transfer".into(),
            state: Vec::new(),
        }
    }

    // The verification contract is always the root frame, even when a
    // notifying contract never recurs back to it.
    #[test]
    fn invocation_tree_roots_at_the_verification_contract() {
        let verification = UInt160::from_bytes(&[1u8; 20]).unwrap();
        let notifier = UInt160::from_bytes(&[2u8; 20]).unwrap();
        let tree = build_invocation_tree(Some(verification), &[notification(notifier)]);
        assert_eq!(*tree.root().item(), verification);
        assert_eq!(tree.root().children().len(), 1);
        assert_eq!(*tree.root().children()[0].item(), notifier);
    }

    // Without a verification contract (application trigger), the first
    // notifying contract becomes the root and is not duplicated as a child.
    #[test]
    fn invocation_tree_dedupes_repeat_notifiers_without_a_verification_contract() {
        let a = UInt160::from_bytes(&[3u8; 20]).unwrap();
        let b = UInt160::from_bytes(&[4u8; 20]).unwrap();
        let tree = build_invocation_tree(None, &[notification(a), notification(b), notification(a)]);
        assert_eq!(*tree.root().item(), a);
        let children: Vec<UInt160> = tree.root().children().iter().map(|c| *c.item()).collect();
        assert_eq!(children, vec![b]);
    }

    #[test]
    fn flatten_invocation_tree_is_root_first_preorder() {
        let root = UInt160::from_bytes(&[5u8; 20]).unwrap();
        let child = UInt160::from_bytes(&[6u8; 20]).unwrap();
        let tree = InvocationTree::new(root);
        tree.root().add_child(child);
        assert_eq!(flatten_invocation_tree(tree), vec![root, child]);
    }
}
