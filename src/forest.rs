use std::collections::BTreeSet;
use std::fmt;

use merkle::{Hash, Hasher, MerkleItem};
use tracing::trace;

use crate::errors::UtreexoError;
use crate::position::{
    detect_row, is_valid_position, proof_positions, start_position_at_row, tree_rows, Position,
    MAX_LEAVES,
};
use crate::proof::Proof;
use crate::stump::Stump;

/// Full accumulator that keeps every node, so it can prove any live leaf.
///
/// Hashes follow the same rules as the `Stump`, so `forest.stump()` always
/// equals the stump obtained by applying the same modifications.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Forest {
    // rows[r][i] is the i-th node of row r; vacant and deleted nodes are empty.
    rows: Vec<Vec<Hash>>,
}

impl Forest {
    /// Creates an empty forest.
    pub fn new() -> Self {
        Forest { rows: Vec::new() }
    }

    /// Number of leaves ever added, including deleted ones.
    pub fn num_leaves(&self) -> u64 {
        self.rows.first().map(|row| row.len() as u64).unwrap_or(0)
    }

    /// Hash of the node at a given position; deleted and vacant nodes have the empty hash.
    pub fn get_hash(&self, position: Position) -> Result<Hash, UtreexoError> {
        let (row, offset) = self.locate(position)?;
        Ok(self.node(row, offset))
    }

    /// Roots of the perfect trees, tallest first.
    pub fn roots(&self) -> Vec<Hash> {
        let num_leaves = self.num_leaves();
        (0..self.rows.len())
            .rev()
            .filter(|row| (num_leaves >> row) & 1 == 1)
            .map(|row| self.node(row, (num_leaves >> row) as usize - 1))
            .collect()
    }

    /// Compact state matching this forest.
    pub fn stump(&self) -> Stump {
        Stump {
            roots: self.roots(),
            num_leaves: self.num_leaves(),
        }
    }

    /// Current positions of all live leaves, in ascending order.
    pub fn live_positions(&self) -> Vec<Position> {
        let num_leaves = self.num_leaves();
        let rows = tree_rows(num_leaves);
        let mut positions = Vec::new();
        for (row, nodes) in self.rows.iter().enumerate() {
            for offset in 0..nodes.len() {
                if self.is_live(row, offset) {
                    positions.push(start_position_at_row(row as u8, rows) + offset as u64);
                }
            }
        }
        positions
    }

    /// Creates a proof for the given live leaves.
    pub fn prove(&self, targets: &[Position]) -> Result<Proof, UtreexoError> {
        self.check_live(targets)?;
        let hashes = proof_positions(targets, self.num_leaves())
            .into_iter()
            .map(|position| self.get_hash(position))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Proof::new(targets.to_vec(), hashes))
    }

    /// Deletes the leaves at `deletions`, then appends `additions`.
    /// Nothing is changed if any deletion is invalid.
    pub fn modify<M: MerkleItem>(
        &mut self,
        additions: &[M],
        deletions: &[Position],
        hasher: &Hasher<M>,
    ) -> Result<(), UtreexoError> {
        let add_hashes: Vec<Hash> = additions.iter().map(|item| hasher.leaf(item)).collect();
        self.modify_hashes(&add_hashes, deletions, hasher)
    }

    /// Same as `modify`, for leaves that are already hashed.
    pub fn modify_hashes<M: MerkleItem>(
        &mut self,
        add_hashes: &[Hash],
        deletions: &[Position],
        hasher: &Hasher<M>,
    ) -> Result<(), UtreexoError> {
        if add_hashes.len() as u64 > MAX_LEAVES - self.num_leaves() {
            return Err(UtreexoError::TooManyLeaves);
        }
        let targets = self.check_live(deletions)?;

        self.delete(targets, hasher);
        for hash in add_hashes.iter() {
            self.add(*hash, hasher);
        }
        trace!(
            leaves = self.num_leaves(),
            additions = add_hashes.len(),
            deletions = deletions.len(),
            "modified forest"
        );
        Ok(())
    }

    /// Row and offset of a position.
    fn locate(&self, position: Position) -> Result<(usize, usize), UtreexoError> {
        let num_leaves = self.num_leaves();
        if !is_valid_position(position, num_leaves) {
            return Err(UtreexoError::InvalidTarget(position));
        }
        let rows = tree_rows(num_leaves);
        let row = detect_row(position, rows);
        let offset = position - start_position_at_row(row, rows);
        Ok((row as usize, offset as usize))
    }

    fn node(&self, row: usize, offset: usize) -> Hash {
        self.rows
            .get(row)
            .and_then(|nodes| nodes.get(offset))
            .copied()
            .unwrap_or_default()
    }

    fn set(&mut self, row: usize, offset: usize, hash: Hash) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let nodes = &mut self.rows[row];
        if nodes.len() <= offset {
            nodes.resize(offset + 1, Hash::empty());
        }
        nodes[offset] = hash;
    }

    fn is_root(&self, row: usize, offset: usize) -> bool {
        let n = self.num_leaves() >> row;
        n & 1 == 1 && offset as u64 == n - 1
    }

    /// A live leaf is a non-empty node without children.
    fn is_live(&self, row: usize, offset: usize) -> bool {
        !self.node(row, offset).is_empty()
            && (row == 0
                || (self.node(row - 1, 2 * offset).is_empty()
                    && self.node(row - 1, 2 * offset + 1).is_empty()))
    }

    /// Fails unless all positions are distinct live leaves.
    fn check_live(&self, targets: &[Position]) -> Result<Vec<(usize, usize)>, UtreexoError> {
        let mut seen = BTreeSet::new();
        let mut located = Vec::with_capacity(targets.len());
        for &target in targets.iter() {
            let (row, offset) = self.locate(target)?;
            if !self.is_live(row, offset) || !seen.insert(target) {
                return Err(UtreexoError::InvalidTarget(target));
            }
            located.push((row, offset));
        }
        Ok(located)
    }

    fn add<M: MerkleItem>(&mut self, hash: Hash, hasher: &Hasher<M>) {
        let (mut row, mut offset) = (0, self.num_leaves() as usize);
        self.set(row, offset, hash);

        // A right child meets the root on its left.
        while offset % 2 == 1 {
            let left = self.node(row, offset - 1);
            if left.is_empty() {
                self.move_up(row, offset);
            } else {
                let node = hasher.intermediate(&left, &self.node(row, offset));
                self.set(row + 1, offset / 2, node);
            }
            row += 1;
            offset /= 2;
        }
    }

    /// Deletes live leaves, given by row and offset.
    fn delete<M: MerkleItem>(&mut self, targets: Vec<(usize, usize)>, hasher: &Hasher<M>) {
        let mut deleted: BTreeSet<(usize, usize)> = targets.into_iter().collect();
        let mut moved = BTreeSet::new();

        while let Some((row, offset)) = deleted.pop_first() {
            self.set(row, offset, Hash::empty());
            if self.is_root(row, offset) {
                continue;
            }
            let sib = offset ^ 1;
            if deleted.remove(&(row, sib)) {
                self.set(row, sib, Hash::empty());
                deleted.insert((row + 1, offset / 2));
            } else {
                self.move_up(row, sib);
                moved.insert((row + 1, offset / 2));
            }
        }

        // Rehash above the moved subtrees, bottom-up.
        // Nodes without children are leaves (or vacant) and keep their hash.
        while let Some((row, offset)) = moved.pop_first() {
            if self.is_root(row, offset) {
                continue;
            }
            let (parent, left) = (offset / 2, offset & !1);
            let (l, r) = (self.node(row, left), self.node(row, left + 1));
            if !l.is_empty() && !r.is_empty() {
                self.set(row + 1, parent, hasher.intermediate(&l, &r));
            }
            moved.insert((row + 1, parent));
        }
    }

    /// Moves the subtree rooted at `(row, offset)` one row up, into its parent's place.
    fn move_up(&mut self, row: usize, offset: usize) {
        let parent = offset / 2;
        // Top-down, so that every node is read before it is overwritten.
        for depth in 0..=row {
            for i in 0..(1usize << depth) {
                let hash = self.node(row - depth, (offset << depth) + i);
                self.set(row + 1 - depth, (parent << depth) + i, hash);
            }
        }
        let first = parent << (row + 1);
        for i in first..first + (2usize << row) {
            self.set(0, i, Hash::empty());
        }
    }
}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "utreexo::Forest{{")?;
        for (row, nodes) in self.rows.iter().enumerate().rev() {
            write!(f, "  [{}]", row)?;
            for node in nodes.iter() {
                if node.is_empty() {
                    write!(f, " ........")?;
                } else {
                    write!(f, " {}", hex::encode(&node[..4]))?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "}}")
    }
}
