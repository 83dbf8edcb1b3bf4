//! `Tree<T>`: a root-holding companion to `tree_node::TreeNode<T>`. The
//! teacher's `diagnostic.rs` builds a bare `TreeNode` root directly; this
//! adds the thin owning wrapper the VM Invoker's verbose path needs to
//! hand a finished tree out of `IDiagnostic::context_loaded`/
//! `context_unloaded` scope.

use std::sync::Arc;

use crate::hash_types::UInt160;
use crate::tree_node::TreeNode;

pub struct Tree<T> {
    root: Arc<TreeNode<T>>,
}

impl<T> Tree<T> {
    pub fn new(root_item: T) -> Self {
        Self {
            root: TreeNode::new(root_item),
        }
    }

    pub fn root(&self) -> &Arc<TreeNode<T>> {
        &self.root
    }
}

/// Invocation tree node: the contract hash entered at each call frame
/// (spec §4.D step 6 "the invocation tree is emitted").
pub type InvocationTree = Tree<UInt160>;
