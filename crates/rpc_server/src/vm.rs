//! The `TestVmFactory`/`TestVmContext` capability (spec §4.D "VM Invoker"),
//! the core's abstract entry point into the (non-goal) contract VM. Plays
//! the role `neo_core::smart_contract::ApplicationEngine` plays in the
//! teacher's concrete node — same call shape, collapsed to a trait object.

use crate::hash_types::UInt160;
use crate::types::{BlockAnchor, CallFlags, NotificationEvent, StackItemData, Trigger, TransactionSkeleton, VmRunOutcome};
use crate::hash_types::UInt256;

pub trait TestVmFactory: Send + Sync {
    /// Opens an execution context bound to `trigger`/`tx`/`anchor`. When
    /// `historic_root` is `Some`, the context is reconstructed from that
    /// state root instead of the live tip (spec §4.D step 2); returns
    /// `Err` when the node cannot reconstruct it.
    fn open(
        &self,
        trigger: Trigger,
        tx: &TransactionSkeleton,
        anchor: &BlockAnchor,
        historic_root: Option<&UInt256>,
    ) -> anyhow::Result<Box<dyn TestVmContext>>;

    /// Ceiling used for the verification trigger (spec §4.D step 3):
    /// `min(config.maxGasInvoke, chain.maxVerificationGas)`.
    fn max_verification_gas(&self) -> i64;
}

pub trait TestVmContext: Send {
    fn load_script(&mut self, script: &[u8], call_flags: CallFlags);

    /// Verification-trigger entry point (spec §4.D step 4): loads an empty
    /// verification-script witness carrying `invocation_script` as its
    /// invocation part, bound to `contract_hash`.
    fn init_verification_context(&mut self, contract_hash: &UInt160, invocation_script: &[u8]);

    fn set_gas_limit(&mut self, gas: i64);
    fn run(&mut self) -> VmRunOutcome;

    fn gas_consumed(&self) -> i64;
    fn result_stack(&self) -> Vec<StackItemData>;
    fn notifications(&self) -> Vec<NotificationEvent>;
    fn fault_exception(&self) -> Option<String>;

    /// Must be called on every exit path, including error paths (spec §4.D
    /// step 5), to release interop resources.
    fn finalize(&mut self);
}
