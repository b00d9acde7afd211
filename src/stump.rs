use std::collections::BTreeMap;
use std::fmt;

use merkle::{Hash, Hasher, MerkleItem};
use tracing::trace;

use crate::errors::UtreexoError;
use crate::position::{
    deletion_moves, moved_position, num_roots, parent_at, root_index, root_position, tree_rows,
    Position, MAX_LEAVES,
};
use crate::proof::{match_roots, Proof};

/// Compact state of the accumulator: one root per perfect tree and the number of leaves.
///
/// Every modification produces a new stump; the old one stays valid.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Stump {
    pub(crate) roots: Vec<Hash>,
    pub(crate) num_leaves: u64,
}

/// Record of the nodes changed or moved by `Stump::modify`, used to update cached proofs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateData {
    pub(crate) prev_num_leaves: u64,
    pub(crate) prev_roots: Vec<Hash>,
    pub(crate) num_leaves: u64,
    /// Deleted positions, sorted.
    pub(crate) del_targets: Vec<Position>,
    /// Subtrees moved up by deletions, addressed in the forest before the modification.
    pub(crate) del_moves: Vec<(Position, Position)>,
    /// New hashes of the nodes changed by deletions, addressed before the modification.
    /// Empty hashes mark deleted nodes.
    pub(crate) new_del: Vec<(Position, Hash)>,
    /// Subtrees moved up when an empty root was absorbed, addressed after the modification.
    pub(crate) add_moves: Vec<(Position, Position)>,
    /// Nodes created or absorbed by insertions, addressed after the modification.
    pub(crate) new_add: Vec<(Position, Hash)>,
    /// Position of every added leaf after the modification.
    pub(crate) add_positions: Vec<Position>,
}

impl Stump {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Stump {
            roots: Vec::new(),
            num_leaves: 0,
        }
    }

    /// Creates a stump from the roots of an existing accumulator.
    pub fn new_with(num_leaves: u64, roots: Vec<Hash>) -> Result<Self, UtreexoError> {
        if num_leaves > MAX_LEAVES {
            return Err(UtreexoError::TooManyLeaves);
        }
        if roots.len() != num_roots(num_leaves) {
            return Err(UtreexoError::InvalidSlice {
                expected: num_roots(num_leaves),
                actual: roots.len(),
            });
        }
        Ok(Stump { roots, num_leaves })
    }

    /// Roots of the perfect trees, tallest first.
    pub fn roots(&self) -> &[Hash] {
        &self.roots
    }

    /// Number of leaves ever added, including deleted ones.
    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// Verifies that the leaves with the given hashes are in the accumulator.
    pub fn verify<M: MerkleItem>(
        &self,
        proof: &Proof,
        leaf_hashes: &[Hash],
        hasher: &Hasher<M>,
    ) -> Result<(), UtreexoError> {
        proof.verify(leaf_hashes, self, hasher)
    }

    /// Deletes the targets of `proof` (whose hashes are `del_hashes`) and then adds new items.
    pub fn modify<M: MerkleItem>(
        &self,
        additions: &[M],
        del_hashes: &[Hash],
        proof: &Proof,
        hasher: &Hasher<M>,
    ) -> Result<(Stump, UpdateData), UtreexoError> {
        let add_hashes: Vec<Hash> = additions.iter().map(|item| hasher.leaf(item)).collect();
        self.modify_hashes(&add_hashes, del_hashes, proof, hasher)
    }

    /// Same as `modify`, for leaves that are already hashed.
    pub fn modify_hashes<M: MerkleItem>(
        &self,
        add_hashes: &[Hash],
        del_hashes: &[Hash],
        proof: &Proof,
        hasher: &Hasher<M>,
    ) -> Result<(Stump, UpdateData), UtreexoError> {
        if add_hashes.len() as u64 > MAX_LEAVES - self.num_leaves {
            return Err(UtreexoError::TooManyLeaves);
        }

        let (nodes, computed_roots) =
            proof.calculate_hashes_delete(del_hashes, self.num_leaves, hasher)?;
        match_roots(
            computed_roots.iter().map(|(p, (old, _))| (*p, old)),
            &self.roots,
            self.num_leaves,
        )?;

        let mut roots = self.roots.clone();
        for (position, (_, new)) in computed_roots.iter() {
            roots[root_index(*position, self.num_leaves)?] = *new;
        }
        let new_del: Vec<(Position, Hash)> = nodes
            .iter()
            .chain(computed_roots.iter())
            .filter(|(_, (old, new))| old != new)
            .map(|(p, (_, new))| (*p, *new))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect();
        let mut del_targets = proof.targets.clone();
        del_targets.sort_unstable();
        let del_moves = deletion_moves(&del_targets, self.num_leaves);

        let mut update_data = UpdateData {
            prev_num_leaves: self.num_leaves,
            prev_roots: self.roots.clone(),
            num_leaves: self.num_leaves,
            del_targets,
            del_moves,
            new_del,
            ..UpdateData::default()
        };
        let mut stump = Stump {
            roots,
            num_leaves: self.num_leaves,
        };
        stump.add(add_hashes, hasher, &mut update_data);
        update_data.num_leaves = stump.num_leaves;

        trace!(
            prev_leaves = self.num_leaves,
            leaves = stump.num_leaves,
            additions = add_hashes.len(),
            deletions = del_hashes.len(),
            moved = update_data.del_moves.len() + update_data.add_moves.len(),
            "modified stump"
        );
        Ok((stump, update_data))
    }

    /// Appends leaves, merging equal-height trees like a binary counter.
    /// A new tree meeting an empty root takes its place one row up.
    /// Records every node created or absorbed, addressed in the resulting forest.
    fn add<M: MerkleItem>(
        &mut self,
        add_hashes: &[Hash],
        hasher: &Hasher<M>,
        update: &mut UpdateData,
    ) {
        let rows = tree_rows(self.num_leaves + add_hashes.len() as u64);
        let mut touched = BTreeMap::new();

        for hash in add_hashes.iter() {
            let mut position = self.num_leaves;
            let mut node = *hash;
            touched.insert(position, node);
            update.add_positions.push(position);

            let mut row = 0u8;
            while (self.num_leaves >> row) & 1 == 1 {
                let root = self
                    .roots
                    .pop()
                    .expect("roots count must match the leaf count");
                let parent = parent_at(position, rows);
                if root.is_empty() {
                    let follow =
                        |p: Position| moved_position(p, position, parent, rows).unwrap_or(p);
                    touched = touched.into_iter().map(|(p, h)| (follow(p), h)).collect();
                    for p in update.add_positions.iter_mut() {
                        *p = follow(*p);
                    }
                    update.add_moves.push((position, parent));
                } else {
                    touched.insert(root_position(self.num_leaves, row, rows), root);
                    node = hasher.intermediate(&root, &node);
                    touched.insert(parent, node);
                }
                position = parent;
                row += 1;
            }
            self.roots.push(node);
            self.num_leaves += 1;
        }
        update.new_add = touched.into_iter().collect();
    }
}

impl UpdateData {
    /// Number of leaves before the modification.
    pub fn prev_num_leaves(&self) -> u64 {
        self.prev_num_leaves
    }

    /// Roots before the modification.
    pub fn prev_roots(&self) -> &[Hash] {
        &self.prev_roots
    }

    /// Number of leaves after the modification.
    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// Returns true if the modification did not change the accumulator.
    pub fn is_empty(&self) -> bool {
        self.prev_num_leaves == self.num_leaves
            && self.new_del.is_empty()
            && self.new_add.is_empty()
    }
}

impl fmt::Debug for Stump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utreexo::Stump{{{}}}:", self.num_leaves)?;
        for root in self.roots.iter() {
            write!(f, "\n  {:?}", root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utreexo_hasher;

    fn leaves(n: u8) -> Vec<Hash> {
        (1..=n).map(|i| Hash([i; 32])).collect()
    }

    #[test]
    fn binary_counter() {
        let hasher = utreexo_hasher::<()>();
        let hashes = leaves(3);
        let (stump, update) = Stump::new()
            .modify_hashes(&hashes, &[], &Proof::default(), &hasher)
            .unwrap();

        let n01 = hasher.intermediate(&hashes[0], &hashes[1]);
        assert_eq!(stump.num_leaves(), 3);
        assert_eq!(stump.roots(), &[n01, hashes[2]]);

        // 3 leaves have 2 rows: node 01 sits at 4
        assert_eq!(
            update.new_add,
            vec![(0, hashes[0]), (1, hashes[1]), (2, hashes[2]), (4, n01)]
        );
        assert!(update.new_del.is_empty());
        assert!(update.add_moves.is_empty());
        assert_eq!(update.add_positions, vec![0, 1, 2]);
        assert_eq!(update.prev_num_leaves(), 0);
        assert_eq!(update.num_leaves(), 3);
    }

    #[test]
    fn no_op() {
        let hasher = utreexo_hasher::<()>();
        let (stump, _) = Stump::new()
            .modify_hashes(&leaves(5), &[], &Proof::default(), &hasher)
            .unwrap();
        let (same, update) = stump
            .modify_hashes(&[], &[], &Proof::default(), &hasher)
            .unwrap();
        assert_eq!(same, stump);
        assert!(update.is_empty());
    }

    #[test]
    fn delete_whole_tree() {
        let hasher = utreexo_hasher::<()>();
        let hashes = leaves(3);
        let (stump, _) = Stump::new()
            .modify_hashes(&hashes, &[], &Proof::default(), &hasher)
            .unwrap();

        let proof = Proof::new(vec![1, 0], vec![]);
        let (stump, update) = stump
            .modify_hashes(&[], &[hashes[1], hashes[0]], &proof, &hasher)
            .unwrap();
        assert_eq!(stump.roots(), &[Hash::empty(), hashes[2]]);
        assert_eq!(
            update.new_del,
            vec![(0, Hash::empty()), (1, Hash::empty()), (4, Hash::empty())]
        );
        assert_eq!(update.del_targets, vec![0, 1]);
        assert!(update.del_moves.is_empty());

        // the empty root is absorbed by the next carry:
        // the new tree over leaves 2 and 3 moves up from 5 to the root 6
        let extra = Hash([9; 32]);
        let (stump, update) = stump
            .modify_hashes(&[extra], &[], &Proof::default(), &hasher)
            .unwrap();
        let root = hasher.intermediate(&hashes[2], &extra);
        assert_eq!(stump.num_leaves(), 4);
        assert_eq!(stump.roots(), &[root]);
        assert_eq!(update.add_moves, vec![(5, 6)]);
        assert_eq!(update.add_positions, vec![5]);
        assert_eq!(update.new_add, vec![(4, hashes[2]), (5, extra), (6, root)]);
    }

    #[test]
    fn deletion_moves_siblings_up() {
        let hasher = utreexo_hasher::<()>();
        let hashes = leaves(4);
        let (stump, _) = Stump::new()
            .modify_hashes(&hashes, &[], &Proof::default(), &hasher)
            .unwrap();

        // deleting leaf 1 moves leaf 0 up to 4
        let n23 = hasher.intermediate(&hashes[2], &hashes[3]);
        let proof = Proof::new(vec![1], vec![hashes[0], n23]);
        let (stump, update) = stump
            .modify_hashes(&[], &[hashes[1]], &proof, &hasher)
            .unwrap();
        assert_eq!(stump.roots(), &[hasher.intermediate(&hashes[0], &n23)]);
        assert_eq!(update.del_moves, vec![(0, 4)]);
        stump
            .verify(&Proof::new(vec![4], vec![n23]), &[hashes[0]], &hasher)
            .unwrap();
        let stale = Proof::new(vec![0], vec![Hash::empty(), n23]);
        assert_eq!(
            stump.verify(&stale, &[hashes[0]], &hasher),
            Err(UtreexoError::InvalidProof)
        );
    }

    #[test]
    fn rejects_wrong_deletions() {
        let hasher = utreexo_hasher::<()>();
        let hashes = leaves(4);
        let (stump, _) = Stump::new()
            .modify_hashes(&hashes, &[], &Proof::default(), &hasher)
            .unwrap();

        let n23 = hasher.intermediate(&hashes[2], &hashes[3]);
        let proof = Proof::new(vec![0], vec![hashes[1], n23]);
        assert!(stump
            .modify_hashes(&[], &[hashes[0]], &proof, &hasher)
            .is_ok());
        assert_eq!(
            stump.modify_hashes(&[], &[hashes[1]], &proof, &hasher),
            Err(UtreexoError::InvalidProof)
        );
        assert_eq!(
            stump.modify_hashes(&[], &[], &proof, &hasher),
            Err(UtreexoError::InvalidSlice {
                expected: 1,
                actual: 0
            })
        );
        let out_of_range = Proof::new(vec![4], vec![]);
        assert_eq!(
            stump.modify_hashes(&[], &[hashes[0]], &out_of_range, &hasher),
            Err(UtreexoError::InvalidTarget(4))
        );
    }

    #[test]
    fn construction() {
        assert!(Stump::new_with(3, vec![Hash([1; 32]), Hash([2; 32])]).is_ok());
        assert_eq!(
            Stump::new_with(3, vec![Hash([1; 32])]),
            Err(UtreexoError::InvalidSlice {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            Stump::new_with(MAX_LEAVES + 1, vec![]),
            Err(UtreexoError::TooManyLeaves)
        );
        assert_eq!(Stump::new(), Stump::default());
    }
}
