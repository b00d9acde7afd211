use std::collections::{BTreeMap, BTreeSet};

use merkle::{Hash, Hasher, MerkleItem};
use subtle::ConstantTimeEq;
use tracing::{debug, trace};

use crate::errors::{check_lengths, UtreexoError};
use crate::position::{
    check_targets, is_root_position, parent_at, proof_positions, remap, root_index, sibling,
    translate, tree_rows, Position,
};
use crate::stump::{Stump, UpdateData};

/// Batched inclusion proof for a set of leaves.
///
/// `targets` are the current positions of the leaves, which are not necessarily
/// on the bottom row once deletions have moved them up.
/// `hashes` are the sibling hashes that cannot be computed from the targets,
/// ordered by ascending position (i.e. row by row, bottom row first).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Proof {
    pub(crate) targets: Vec<Position>,
    pub(crate) hashes: Vec<Hash>,
}

/// Hash of a parent node after deletions.
/// An empty child is pruned: the parent takes the other child's hash as is,
/// since that child moves up into the parent's place.
fn parent_hash<M: MerkleItem>(hasher: &Hasher<M>, left: &Hash, right: &Hash) -> Hash {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => Hash::empty(),
        (true, false) => *right,
        (false, true) => *left,
        (false, false) => hasher.intermediate(left, right),
    }
}

/// Walks from the leaves up to their roots, resolving nodes in ascending position order.
/// Siblings that are not computed are taken from `proof_hashes` in order;
/// all of them must be consumed.
/// Returns every visited non-root node (siblings included) and the roots reached.
fn walk<T>(
    leaves: impl Iterator<Item = (Position, T)>,
    proof_hashes: &[Hash],
    num_leaves: u64,
    from_proof: impl Fn(&Hash) -> T,
    combine: impl Fn(&T, &T) -> T,
) -> Result<(Vec<(Position, T)>, Vec<(Position, T)>), UtreexoError> {
    let rows = tree_rows(num_leaves);
    let mut queue: BTreeMap<Position, T> = leaves.collect();
    let mut proof_hashes = proof_hashes.iter();
    let mut nodes = Vec::with_capacity(queue.len() * 2);
    let mut roots = Vec::new();

    while let Some((position, value)) = queue.pop_first() {
        if is_root_position(position, num_leaves, rows) {
            roots.push((position, value));
            continue;
        }
        let sib = sibling(position);
        let sib_value = match queue.remove(&sib) {
            Some(v) => v,
            None => match proof_hashes.next() {
                Some(h) => from_proof(h),
                None => {
                    debug!(position = sib, "proof is missing a sibling hash");
                    return Err(UtreexoError::InvalidProof);
                }
            },
        };
        let parent_value = if position & 1 == 0 {
            combine(&value, &sib_value)
        } else {
            combine(&sib_value, &value)
        };
        queue.insert(parent_at(position, rows), parent_value);
        nodes.push((position, value));
        nodes.push((sib, sib_value));
    }

    let unused = proof_hashes.count();
    if unused > 0 {
        debug!(unused, "proof carries extra hashes");
        return Err(UtreexoError::InvalidProof);
    }
    Ok((nodes, roots))
}

/// Checks recomputed roots against the roots of the accumulator.
pub(crate) fn match_roots<'a>(
    computed: impl Iterator<Item = (Position, &'a Hash)>,
    roots: &[Hash],
    num_leaves: u64,
) -> Result<(), UtreexoError> {
    for (position, hash) in computed {
        let index = root_index(position, num_leaves)?;
        let expected = roots.get(index).ok_or(UtreexoError::InvalidProof)?;
        if !bool::from(hash.ct_eq(expected)) {
            debug!(position, index, "recomputed root does not match the accumulator");
            return Err(UtreexoError::InvalidProof);
        }
    }
    Ok(())
}

impl Proof {
    /// Creates a proof from target positions and sibling hashes.
    pub fn new(targets: Vec<Position>, hashes: Vec<Hash>) -> Self {
        Proof { targets, hashes }
    }

    /// Positions of the proven leaves.
    pub fn targets(&self) -> &[Position] {
        &self.targets
    }

    /// Sibling hashes, in ascending position order.
    pub fn hashes(&self) -> &[Hash] {
        &self.hashes
    }

    /// Number of proven leaves.
    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Verifies the proof for the given leaf hashes (one per target, in target order)
    /// against the roots of the stump. Roots of trees without targets are not checked.
    pub fn verify<M: MerkleItem>(
        &self,
        leaf_hashes: &[Hash],
        stump: &Stump,
        hasher: &Hasher<M>,
    ) -> Result<(), UtreexoError> {
        let (_, roots) = self.calculate_hashes(leaf_hashes, stump.num_leaves, hasher)?;
        match_roots(
            roots.iter().map(|(p, h)| (*p, h)),
            &stump.roots,
            stump.num_leaves,
        )
    }

    /// Recomputes all nodes implied by the proof and the target hashes.
    /// Returns the visited nodes and the roots reached, both with their positions.
    pub fn calculate_hashes<M: MerkleItem>(
        &self,
        leaf_hashes: &[Hash],
        num_leaves: u64,
        hasher: &Hasher<M>,
    ) -> Result<(Vec<(Position, Hash)>, Vec<(Position, Hash)>), UtreexoError> {
        self.check_leaves(leaf_hashes, num_leaves)?;
        walk(
            self.targets.iter().copied().zip(leaf_hashes.iter().copied()),
            &self.hashes,
            num_leaves,
            |h| *h,
            |l, r| hasher.intermediate(l, r),
        )
    }

    /// Same as `calculate_hashes`, but tracks each node before and after the targets are deleted.
    /// Values are `(old, new)` pairs; new values are addressed as before the deletion,
    /// so a promoted node shows up at its parent's position.
    pub fn calculate_hashes_delete<M: MerkleItem>(
        &self,
        del_hashes: &[Hash],
        num_leaves: u64,
        hasher: &Hasher<M>,
    ) -> Result<(Vec<(Position, (Hash, Hash))>, Vec<(Position, (Hash, Hash))>), UtreexoError> {
        self.check_leaves(del_hashes, num_leaves)?;
        walk(
            self.targets
                .iter()
                .copied()
                .zip(del_hashes.iter().map(|h| (*h, Hash::empty()))),
            &self.hashes,
            num_leaves,
            |h| (*h, *h),
            |l, r| {
                (
                    hasher.intermediate(&l.0, &r.0),
                    parent_hash(hasher, &l.1, &r.1),
                )
            },
        )
    }

    fn check_leaves(&self, leaf_hashes: &[Hash], num_leaves: u64) -> Result<(), UtreexoError> {
        check_lengths(&self.targets, leaf_hashes)?;
        check_targets(&self.targets, num_leaves)?;
        if let Some(i) = leaf_hashes.iter().position(|h| h.is_empty()) {
            debug!(position = self.targets[i], "empty hash supplied for a target");
            return Err(UtreexoError::InvalidProof);
        }
        Ok(())
    }

    /// Updates the proof after the accumulator was modified with `update_data`.
    ///
    /// - `cached_hashes` are the hashes of the current targets,
    /// - `add_hashes` are the leaf hashes added by the modification,
    /// - `block_targets` are the positions deleted by the modification,
    /// - `remembers` are indices into `add_hashes` of the new leaves to prove.
    ///
    /// Targets deleted by the modification are dropped, the others follow the
    /// subtrees that moved, and remembered leaves are appended.
    /// Returns the new proof together with the hashes of its targets.
    pub fn update<M: MerkleItem>(
        &self,
        cached_hashes: &[Hash],
        add_hashes: &[Hash],
        block_targets: &[Position],
        remembers: &[u64],
        update_data: &UpdateData,
        hasher: &Hasher<M>,
    ) -> Result<(Proof, Vec<Hash>), UtreexoError> {
        let prev_leaves = update_data.prev_num_leaves;
        let leaves = update_data.num_leaves;
        let num_added = leaves.checked_sub(prev_leaves).ok_or(UtreexoError::InvalidProof)?;
        if add_hashes.len() as u64 != num_added {
            return Err(UtreexoError::InvalidSlice {
                expected: num_added as usize,
                actual: add_hashes.len(),
            });
        }
        check_deletions(block_targets, &update_data.del_targets)?;

        // Every node we know from the old proof, as of the previous accumulator,
        // with the hashes the deletions left there.
        let (nodes, roots) = self.calculate_hashes(cached_hashes, prev_leaves, hasher)?;
        match_roots(
            roots.iter().map(|(p, h)| (*p, h)),
            &update_data.prev_roots,
            prev_leaves,
        )?;
        let mut known: BTreeMap<Position, Hash> =
            nodes.into_iter().chain(roots.into_iter()).collect();
        known.extend(update_data.new_del.iter().copied());

        // Deleted nodes disappear, the rest follows the moved subtrees into the new forest.
        let (prev_rows, rows) = (tree_rows(prev_leaves), tree_rows(leaves));
        let relocate = |position: Position| {
            let position = remap(position, &update_data.del_moves, prev_rows);
            let position = translate(position, prev_rows, rows);
            remap(position, &update_data.add_moves, rows)
        };
        let mut known: BTreeMap<Position, Hash> = known
            .into_iter()
            .filter(|(_, hash)| !hash.is_empty())
            .map(|(position, hash)| (relocate(position), hash))
            .collect();
        known.extend(update_data.new_add.iter().copied());

        let mut targets = Vec::with_capacity(self.targets.len() + remembers.len());
        let mut target_hashes = Vec::with_capacity(targets.capacity());
        for (&target, &hash) in self.targets.iter().zip(cached_hashes.iter()) {
            if update_data.del_targets.binary_search(&target).is_err() {
                targets.push(relocate(target));
                target_hashes.push(hash);
            }
        }

        let mut remembered = BTreeSet::new();
        for &index in remembers.iter() {
            let position = match update_data.add_positions.get(index as usize) {
                Some(&position) if remembered.insert(index) => position,
                _ => return Err(UtreexoError::InvalidTarget(prev_leaves.saturating_add(index))),
            };
            let hash = add_hashes[index as usize];
            if known.get(&position) != Some(&hash) {
                debug!(position, "added hash does not match the update");
                return Err(UtreexoError::InvalidProof);
            }
            targets.push(position);
            target_hashes.push(hash);
        }

        let hashes = lookup(&known, &proof_positions(&targets, leaves))?;
        trace!(
            prev_leaves,
            leaves,
            dropped = self.targets.len() + remembers.len() - targets.len(),
            remembered = remembers.len(),
            "updated proof"
        );
        Ok((Proof { targets, hashes }, target_hashes))
    }

    /// Extracts the proof for `subset` of the targets from this proof.
    /// `del_hashes` are the hashes of all targets of this proof.
    pub fn get_proof_subset<M: MerkleItem>(
        &self,
        del_hashes: &[Hash],
        subset: &[Position],
        num_leaves: u64,
        hasher: &Hasher<M>,
    ) -> Result<Proof, UtreexoError> {
        let (nodes, roots) = self.calculate_hashes(del_hashes, num_leaves, hasher)?;

        let mut seen = BTreeSet::new();
        for &target in subset.iter() {
            if !self.targets.contains(&target) || !seen.insert(target) {
                return Err(UtreexoError::InvalidTarget(target));
            }
        }

        let known: BTreeMap<Position, Hash> = nodes.into_iter().chain(roots.into_iter()).collect();
        let hashes = lookup(&known, &proof_positions(subset, num_leaves))?;
        Ok(Proof {
            targets: subset.to_vec(),
            hashes,
        })
    }
}

/// Checks that `block_targets` are exactly the positions deleted by the modification.
fn check_deletions(block_targets: &[Position], deleted: &[Position]) -> Result<(), UtreexoError> {
    let mut seen = BTreeSet::new();
    for &target in block_targets.iter() {
        if deleted.binary_search(&target).is_err() || !seen.insert(target) {
            debug!(position = target, "target was not deleted by the update");
            return Err(UtreexoError::InvalidTarget(target));
        }
    }
    if let Some(&missing) = deleted.iter().find(|p| !seen.contains(p)) {
        debug!(position = missing, "deleted target is missing from the block targets");
        return Err(UtreexoError::InvalidTarget(missing));
    }
    Ok(())
}

fn lookup(known: &BTreeMap<Position, Hash>, positions: &[Position]) -> Result<Vec<Hash>, UtreexoError> {
    positions
        .iter()
        .map(|p| {
            known.get(p).copied().ok_or_else(|| {
                debug!(position = *p, "no hash known for a required sibling");
                UtreexoError::InvalidProof
            })
        })
        .collect()
}
