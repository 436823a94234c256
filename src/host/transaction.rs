//! Compositor transactions
//!
//! A [`Transaction`] collects layer operations that the compositor applies
//! atomically: either every op lands or none does.

use super::types::SurfaceControl;

/// Single layer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp {
    /// Make the layer visible
    Show(SurfaceControl),
    /// Move `child` under `parent`
    Reparent {
        /// Layer being moved
        child: SurfaceControl,
        /// New parent layer
        parent: SurfaceControl,
    },
    /// Detach and release the layer
    Remove(SurfaceControl),
}

impl TransactionOp {
    /// Layers the op refers to
    pub fn layers(&self) -> Vec<SurfaceControl> {
        match *self {
            TransactionOp::Show(sc) | TransactionOp::Remove(sc) => vec![sc],
            TransactionOp::Reparent { child, parent } => vec![child, parent],
        }
    }
}

/// Ordered batch of layer operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "a transaction does nothing until it is applied"]
pub struct Transaction {
    ops: Vec<TransactionOp>,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a show
    pub fn show(mut self, sc: SurfaceControl) -> Self {
        self.ops.push(TransactionOp::Show(sc));
        self
    }

    /// Queue a reparent
    pub fn reparent(mut self, child: SurfaceControl, parent: SurfaceControl) -> Self {
        self.ops.push(TransactionOp::Reparent { child, parent });
        self
    }

    /// Queue a removal
    pub fn remove(mut self, sc: SurfaceControl) -> Self {
        self.ops.push(TransactionOp::Remove(sc));
        self
    }

    /// Queued operations, in order
    pub fn ops(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume into the op list
    pub fn into_ops(self) -> Vec<TransactionOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_keep_insertion_order() {
        let mirror = SurfaceControl(7);
        let parent = SurfaceControl(3);
        let old = SurfaceControl(5);

        let tx = Transaction::new()
            .remove(old)
            .show(mirror)
            .reparent(mirror, parent);

        assert_eq!(
            tx.ops(),
            &[
                TransactionOp::Remove(old),
                TransactionOp::Show(mirror),
                TransactionOp::Reparent {
                    child: mirror,
                    parent
                },
            ]
        );
    }

    #[test]
    fn test_reparent_touches_both_layers() {
        let op = TransactionOp::Reparent {
            child: SurfaceControl(1),
            parent: SurfaceControl(2),
        };
        assert_eq!(op.layers(), vec![SurfaceControl(1), SurfaceControl(2)]);
    }

    #[test]
    fn test_empty_transaction() {
        assert!(Transaction::new().is_empty());
        assert!(!Transaction::new().show(SurfaceControl(1)).is_empty());
    }
}
