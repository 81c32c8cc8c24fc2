use super::cut_points::CutPoint;
use crate::error::Result;
use crate::tree::{NodeId, Tree};

/// A reversible branch swap at a cut point.
///
/// The replaced child is kept detached in the arena until the graft is
/// either committed (child discarded) or undone (child reinserted).
#[derive(Debug)]
#[must_use = "a graft must be committed or undone"]
pub struct Graft {
    parent: NodeId,
    index: usize,
    removed: Option<NodeId>,
    inserted: Option<NodeId>,
}

impl Graft {
    /// Copies `branch` out of `donor` (if any) and puts it in place of the cut point's child.
    pub fn apply(tree: &mut Tree, cut: &CutPoint, donor: &Tree, branch: Option<NodeId>) -> Result<Self> {
        let inserted = branch
            .map(|id| tree.copy_subtree_from(donor, id))
            .transpose()?;
        let removed = match cut.child {
            Some(_) => Some(tree.remove_subtree(cut.parent, cut.child_index)?),
            None => None,
        };
        if let Some(new) = inserted {
            if let Err(e) = tree.insert_subtree(cut.parent, cut.child_index, new) {
                if let Some(old) = removed {
                    tree.insert_subtree(cut.parent, cut.child_index, old)?;
                }
                tree.discard(new)?;
                return Err(e);
            }
        }
        Ok(Self {
            parent: cut.parent,
            index: cut.child_index,
            removed,
            inserted,
        })
    }

    /// Root of the inserted copy, if something was inserted.
    pub fn inserted(&self) -> Option<NodeId> {
        self.inserted
    }

    /// Restores the original child and frees the inserted copy.
    pub fn undo(self, tree: &mut Tree) -> Result<()> {
        if let Some(new) = self.inserted {
            let detached = tree.remove_subtree(self.parent, self.index)?;
            tree.discard(detached)?;
            debug_assert_eq!(detached, new);
        }
        if let Some(old) = self.removed {
            tree.insert_subtree(self.parent, self.index, old)?;
        }
        Ok(())
    }

    /// Keeps the swap and frees the replaced child.
    pub fn commit(self, tree: &mut Tree) -> Result<()> {
        if let Some(old) = self.removed {
            tree.discard(old)?;
        }
        Ok(())
    }
}
