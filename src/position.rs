//! Addressing of nodes in a forest of perfect binary trees.
//!
//! The forest shape is fully determined by the number of leaves:
//! every set bit of `num_leaves` is a perfect tree, tallest tree first.
//! Positions are numbered row by row, as if the forest were a single tree
//! with `tree_rows(num_leaves)` rows. For 6 leaves (3 rows):
//!
//! ```ascii
//!    12
//!    |-------\
//!    08      09      10
//!    |---\   |---\   |---\
//!    00  01  02  03  04  05
//! ```
//!
//! Roots are at 12 (4 leaves) and 10 (2 leaves); positions 06, 07, 11, 13, 14
//! are reserved for the nodes the forest does not have yet.
//!
//! Bottom-row positions never change as the forest grows,
//! but positions of the upper rows do: see [`translate`].
//!
//! Deleting a node moves its sibling, with everything below it, one row up
//! into the place of their parent. A live leaf may therefore sit on any row.
use std::collections::BTreeSet;

use crate::errors::UtreexoError;

/// Absolute position of a node in the forest.
pub type Position = u64;

/// Maximum number of leaves the accumulator can address.
/// With at most 62 rows every position fits in a `u64`.
pub const MAX_LEAVES: u64 = 1 << 62;

/// Number of rows above the bottom row of the forest with `num_leaves` leaves.
pub fn tree_rows(num_leaves: u64) -> u8 {
    if num_leaves <= 1 {
        return 0;
    }
    (64 - (num_leaves - 1).leading_zeros()) as u8
}

/// Number of roots (perfect trees) in the forest.
pub fn num_roots(num_leaves: u64) -> usize {
    num_leaves.count_ones() as usize
}

/// Position of the first node of a given row.
pub fn start_position_at_row(row: u8, forest_rows: u8) -> Position {
    (2u64 << forest_rows) - (2u64 << (forest_rows - row))
}

/// Row of a position that is already known to fit in the forest.
pub(crate) fn detect_row(position: Position, forest_rows: u8) -> u8 {
    let mut marker = 1u64 << forest_rows;
    let mut row = 0;
    while position & marker != 0 {
        marker >>= 1;
        row += 1;
    }
    row
}

/// Parent of a position that is known not to be a root.
pub(crate) fn parent_at(position: Position, forest_rows: u8) -> Position {
    (position >> 1) | (1u64 << forest_rows)
}

/// Returns true if the node exists in the forest with `num_leaves` leaves.
pub fn is_valid_position(position: Position, num_leaves: u64) -> bool {
    if num_leaves == 0 || num_leaves > MAX_LEAVES {
        return false;
    }
    let rows = tree_rows(num_leaves);
    if position >= (2u64 << rows) - 1 {
        return false;
    }
    let row = detect_row(position, rows);
    position - start_position_at_row(row, rows) < (num_leaves >> row)
}

fn check_position(position: Position, num_leaves: u64) -> Result<(), UtreexoError> {
    if is_valid_position(position, num_leaves) {
        Ok(())
    } else {
        Err(UtreexoError::InvalidTarget(position))
    }
}

/// Row of the node at `position` (0 for leaves).
pub fn row(position: Position, num_leaves: u64) -> Result<u8, UtreexoError> {
    check_position(position, num_leaves)?;
    Ok(detect_row(position, tree_rows(num_leaves)))
}

/// Position of the node's parent. Roots have no parent.
pub fn parent(position: Position, num_leaves: u64) -> Result<Position, UtreexoError> {
    check_position(position, num_leaves)?;
    let rows = tree_rows(num_leaves);
    if is_root_position(position, num_leaves, rows) {
        return Err(UtreexoError::InvalidTarget(position));
    }
    Ok(parent_at(position, rows))
}

/// Position of the node's sibling. Left children always have even positions.
pub fn sibling(position: Position) -> Position {
    position ^ 1
}

/// Position of the root at `row`. The row must have a root, i.e. bit `row` of `num_leaves` is set.
pub fn root_position(num_leaves: u64, row: u8, forest_rows: u8) -> Position {
    start_position_at_row(row, forest_rows) + (num_leaves >> row) - 1
}

/// Returns true if the position is one of the roots of the forest.
pub fn is_root_position(position: Position, num_leaves: u64, forest_rows: u8) -> bool {
    let row = detect_row(position, forest_rows);
    (num_leaves >> row) & 1 == 1 && position == root_position(num_leaves, row, forest_rows)
}

/// Index of the tree (tallest first, as in `Stump::roots`) containing the position.
pub fn root_index(position: Position, num_leaves: u64) -> Result<usize, UtreexoError> {
    check_position(position, num_leaves)?;
    let rows = tree_rows(num_leaves);
    let row = detect_row(position, rows);
    let offset = position - start_position_at_row(row, rows);

    // Each tree of height h >= row owns 2^(h-row) consecutive nodes in this row.
    let mut index = 0;
    let mut end = 0u64;
    for h in (row..=rows).rev() {
        if (num_leaves >> h) & 1 == 1 {
            end += 1u64 << (h - row);
            if offset < end {
                return Ok(index);
            }
            index += 1;
        }
    }
    Err(UtreexoError::InvalidTarget(position))
}

/// Re-addresses a node when the forest grows from `from_rows` to `to_rows` rows.
pub fn translate(position: Position, from_rows: u8, to_rows: u8) -> Position {
    let row = detect_row(position, from_rows);
    if row == 0 {
        return position;
    }
    let offset = position - start_position_at_row(row, from_rows);
    start_position_at_row(row, to_rows) + offset
}

/// Checks that targets are distinct nodes of the forest and that none of them
/// lies below another one.
pub(crate) fn check_targets(targets: &[Position], num_leaves: u64) -> Result<(), UtreexoError> {
    let mut seen = BTreeSet::new();
    for &target in targets.iter() {
        if !is_valid_position(target, num_leaves) || !seen.insert(target) {
            return Err(UtreexoError::InvalidTarget(target));
        }
    }
    let rows = tree_rows(num_leaves);
    for &target in targets.iter() {
        let mut position = target;
        while !is_root_position(position, num_leaves, rows) {
            position = parent_at(position, rows);
            if seen.contains(&position) {
                return Err(UtreexoError::InvalidTarget(target));
            }
        }
    }
    Ok(())
}

/// Subtrees moved up by deleting `targets`, as `(from, to)` pairs in the order they happen.
///
/// When both children of a node are deleted, the node is deleted as well.
/// When only one is, its sibling takes the parent's place. Deleted roots stay as empty roots.
/// Positions of later moves already account for the earlier ones.
/// Targets are expected to pass [`check_targets`].
pub(crate) fn deletion_moves(targets: &[Position], num_leaves: u64) -> Vec<(Position, Position)> {
    let rows = tree_rows(num_leaves);
    let mut deleted: BTreeSet<Position> = targets.iter().copied().collect();
    let mut moves = Vec::new();

    while let Some(position) = deleted.pop_first() {
        if is_root_position(position, num_leaves, rows) {
            continue;
        }
        let parent = parent_at(position, rows);
        let sib = sibling(position);
        if deleted.remove(&sib) {
            deleted.insert(parent);
        } else {
            moves.push((sib, parent));
        }
    }
    moves
}

/// New position of a node when the subtree rooted at `from` moves to `to`.
/// Returns `None` if the node is not in that subtree.
pub(crate) fn moved_position(
    position: Position,
    from: Position,
    to: Position,
    forest_rows: u8,
) -> Option<Position> {
    let (row, from_row, to_row) = (
        detect_row(position, forest_rows),
        detect_row(from, forest_rows),
        detect_row(to, forest_rows),
    );
    if row > from_row {
        return None;
    }
    let depth = from_row - row;
    let offset = position - start_position_at_row(row, forest_rows);
    let from_offset = from - start_position_at_row(from_row, forest_rows);
    if offset >> depth != from_offset {
        return None;
    }
    let to_offset = to - start_position_at_row(to_row, forest_rows);
    let new_row = to_row - depth;
    Some(
        start_position_at_row(new_row, forest_rows)
            + (to_offset << depth)
            + (offset - (from_offset << depth)),
    )
}

/// Follows a node through a sequence of subtree moves.
pub(crate) fn remap(
    position: Position,
    moves: &[(Position, Position)],
    forest_rows: u8,
) -> Position {
    moves.iter().fold(position, |position, &(from, to)| {
        moved_position(position, from, to, forest_rows).unwrap_or(position)
    })
}

/// Positions of the sibling hashes a proof for `targets` must carry, in ascending order.
///
/// Nodes are resolved lowest position first; since every row is numbered after
/// the row below it, this is also row-by-row order. A sibling is omitted when it is
/// itself a target or can be computed from the targets.
/// Targets are expected to be valid positions (see [`is_valid_position`]).
pub fn proof_positions(targets: &[Position], num_leaves: u64) -> Vec<Position> {
    let rows = tree_rows(num_leaves);
    let mut queue: BTreeSet<Position> = targets.iter().copied().collect();
    let mut positions = Vec::new();

    while let Some(position) = queue.pop_first() {
        if is_root_position(position, num_leaves, rows) {
            continue;
        }
        let sib = sibling(position);
        if !queue.remove(&sib) {
            positions.push(sib);
        }
        queue.insert(parent_at(position, rows));
    }
    positions
}
