//! `TreeNode<T>`, ported from the reference node's `diagnostic.rs`/`tree_node.rs`
//! invocation-tree type. Used by the VM Invoker's `verbose` path (spec
//! §4.D step 6) to report the call tree alongside the stack/notifications.

use std::sync::{Arc, Mutex, Weak};

pub struct TreeNode<T> {
    item: T,
    parent: Mutex<Option<Weak<TreeNode<T>>>>,
    children: Mutex<Vec<Arc<TreeNode<T>>>>,
}

impl<T> TreeNode<T> {
    pub fn new(item: T) -> Arc<Self> {
        Arc::new(Self {
            item,
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn parent(&self) -> Option<Arc<TreeNode<T>>> {
        self.parent.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub fn children(&self) -> Vec<Arc<TreeNode<T>>> {
        self.children.lock().unwrap().clone()
    }

    pub fn add_child(self: &Arc<Self>, item: T) -> Arc<TreeNode<T>> {
        let child = TreeNode::new(item);
        *child.parent.lock().unwrap() = Some(Arc::downgrade(self));
        self.children.lock().unwrap().push(child.clone());
        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_links_back_to_parent() {
        let root = TreeNode::new(crate::hash_types::UInt160::zero());
        let child = root.add_child(crate::hash_types::UInt160::zero());
        assert_eq!(root.children().len(), 1);
        assert!(child.parent().is_some());
        assert!(root.parent().is_none());
    }
}
