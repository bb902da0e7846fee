//! Persistent AVL tree of pieces.
//!
//! Nodes live in an append-only arena and are never mutated once pushed.
//! Every operation that changes a tree builds new nodes along the affected
//! path and shares all other subtrees with the input, so old roots stay valid.
//! Balancing uses height-based `join`, which makes `split` and `concat`
//! O(log n).

use crate::error::TextError;

use super::piece::{BufferSource, Piece};

/// Index of a node in the store's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub piece: Piece,
    /// Bytes in the whole subtree
    pub len: usize,
    /// Newlines in the whole subtree
    pub newlines: usize,
    pub height: u8,
}

/// The two backing buffers.
#[derive(Debug, Default)]
pub(crate) struct Buffers {
    pub original: Vec<u8>,
    pub add: Vec<u8>,
}

impl Buffers {
    pub fn bytes(&self, piece: &Piece) -> &[u8] {
        let buffer = match piece.source {
            BufferSource::Original => &self.original,
            BufferSource::Add => &self.add,
        };
        &buffer[piece.start..piece.start + piece.len]
    }
}

/// Largest number of nodes a [`NodeId`] can address.
const MAX_NODES: usize = u32::MAX as usize;

#[derive(Debug)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
    limit: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            limit: MAX_NODES,
        }
    }
}

impl Arena {
    /// An arena that refuses to grow past `limit` nodes.
    #[cfg(test)]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            limit: limit.min(MAX_NODES),
        }
    }

    /// An arena holding one leaf, which gets the first id.
    pub fn single(piece: Piece) -> (Self, NodeId) {
        let mut arena = Self::default();
        arena.nodes.push(Node {
            left: None,
            right: None,
            piece,
            len: piece.len,
            newlines: piece.newlines,
            height: 1,
        });
        (arena, NodeId(0))
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn len(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.get(id).len)
    }

    pub fn newlines(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.get(id).newlines)
    }

    fn height(&self, id: Option<NodeId>) -> u8 {
        id.map_or(0, |id| self.get(id).height)
    }

    fn next_id(&self) -> Result<NodeId, TextError> {
        let full = TextError::StorageFull {
            nodes: self.nodes.len(),
        };
        if self.nodes.len() >= self.limit {
            return Err(full);
        }
        u32::try_from(self.nodes.len()).map(NodeId).map_err(|_| full)
    }

    fn make(
        &mut self,
        left: Option<NodeId>,
        piece: Piece,
        right: Option<NodeId>,
    ) -> Result<NodeId, TextError> {
        let id = self.next_id()?;
        let node = Node {
            left,
            right,
            piece,
            len: self.len(left) + piece.len + self.len(right),
            newlines: self.newlines(left) + piece.newlines + self.newlines(right),
            height: 1 + self.height(left).max(self.height(right)),
        };
        self.nodes.push(node);
        Ok(id)
    }

    #[cfg(test)]
    pub fn leaf(&mut self, piece: Piece) -> Result<NodeId, TextError> {
        self.make(None, piece, None)
    }

    /// Copy the nodes reachable from `roots` into a fresh arena.
    ///
    /// Returns the new arena and the old-to-new id map. Children always have
    /// lower ids than their parents, so one ascending pass can remap them.
    pub fn compact<'r>(
        &self,
        roots: impl IntoIterator<Item = &'r Option<NodeId>>,
    ) -> (Arena, Vec<Option<NodeId>>) {
        let mut live = vec![false; self.nodes.len()];
        let mut pending: Vec<NodeId> = roots.into_iter().filter_map(|root| *root).collect();
        while let Some(id) = pending.pop() {
            if std::mem::replace(&mut live[id.index()], true) {
                continue;
            }
            let node = self.get(id);
            pending.extend(node.left);
            pending.extend(node.right);
        }

        let mut remap = vec![None; self.nodes.len()];
        let mut nodes = Vec::with_capacity(live.iter().filter(|alive| **alive).count());
        for (index, node) in self.nodes.iter().enumerate() {
            if !live[index] {
                continue;
            }
            // Ids are dense below the old count, which already fit in u32.
            remap[index] = Some(NodeId(nodes.len() as u32));
            nodes.push(Node {
                left: node.left.and_then(|id| remap[id.index()]),
                right: node.right.and_then(|id| remap[id.index()]),
                ..*node
            });
        }
        let arena = Arena {
            nodes,
            limit: self.limit,
        };
        (arena, remap)
    }

    fn rotate_left(&mut self, id: NodeId) -> Result<NodeId, TextError> {
        let node = *self.get(id);
        let Some(pivot) = node.right else {
            return Ok(id);
        };
        let pivot = *self.get(pivot);
        let left = self.make(node.left, node.piece, pivot.left)?;
        self.make(Some(left), pivot.piece, pivot.right)
    }

    fn rotate_right(&mut self, id: NodeId) -> Result<NodeId, TextError> {
        let node = *self.get(id);
        let Some(pivot) = node.left else {
            return Ok(id);
        };
        let pivot = *self.get(pivot);
        let right = self.make(pivot.right, node.piece, node.right)?;
        self.make(pivot.left, pivot.piece, Some(right))
    }

    /// Build a balanced tree holding `left`, then `piece`, then `right`.
    pub fn join(
        &mut self,
        left: Option<NodeId>,
        piece: Piece,
        right: Option<NodeId>,
    ) -> Result<NodeId, TextError> {
        let (hl, hr) = (self.height(left), self.height(right));
        match (left, right) {
            (Some(l), _) if hl > hr + 1 => self.join_right(l, piece, right),
            (_, Some(r)) if hr > hl + 1 => self.join_left(left, piece, r),
            _ => self.make(left, piece, right),
        }
    }

    /// `join` when `left` is the taller side.
    fn join_right(
        &mut self,
        left: NodeId,
        piece: Piece,
        right: Option<NodeId>,
    ) -> Result<NodeId, TextError> {
        let node = *self.get(left);
        let inner = match node.right {
            Some(r) if self.height(Some(r)) > self.height(right) + 1 => {
                self.join_right(r, piece, right)?
            }
            _ => {
                let joined = self.make(node.right, piece, right)?;
                if self.height(Some(joined)) <= self.height(node.left) + 1 {
                    return self.make(node.left, node.piece, Some(joined));
                }
                let rotated = self.rotate_right(joined)?;
                let top = self.make(node.left, node.piece, Some(rotated))?;
                return self.rotate_left(top);
            }
        };
        let top = self.make(node.left, node.piece, Some(inner))?;
        if self.height(Some(inner)) <= self.height(node.left) + 1 {
            Ok(top)
        } else {
            self.rotate_left(top)
        }
    }

    /// `join` when `right` is the taller side.
    fn join_left(
        &mut self,
        left: Option<NodeId>,
        piece: Piece,
        right: NodeId,
    ) -> Result<NodeId, TextError> {
        let node = *self.get(right);
        let inner = match node.left {
            Some(l) if self.height(Some(l)) > self.height(left) + 1 => {
                self.join_left(left, piece, l)?
            }
            _ => {
                let joined = self.make(left, piece, node.left)?;
                if self.height(Some(joined)) <= self.height(node.right) + 1 {
                    return self.make(Some(joined), node.piece, node.right);
                }
                let rotated = self.rotate_left(joined)?;
                let top = self.make(Some(rotated), node.piece, node.right)?;
                return self.rotate_right(top);
            }
        };
        let top = self.make(Some(inner), node.piece, node.right)?;
        if self.height(Some(inner)) <= self.height(node.right) + 1 {
            Ok(top)
        } else {
            self.rotate_right(top)
        }
    }

    /// Remove and return the first piece of a tree.
    fn pop_first(&mut self, id: NodeId) -> Result<(Piece, Option<NodeId>), TextError> {
        let node = *self.get(id);
        match node.left {
            None => Ok((node.piece, node.right)),
            Some(left) => {
                let (first, rest) = self.pop_first(left)?;
                Ok((first, Some(self.join(rest, node.piece, node.right)?)))
            }
        }
    }

    /// Concatenate two trees.
    pub fn concat(
        &mut self,
        left: Option<NodeId>,
        right: Option<NodeId>,
    ) -> Result<Option<NodeId>, TextError> {
        match (left, right) {
            (None, other) | (other, None) => Ok(other),
            (Some(l), Some(r)) => {
                let (first, rest) = self.pop_first(r)?;
                Ok(Some(self.join(Some(l), first, rest)?))
            }
        }
    }

    /// Split a tree at byte `offset` into `..offset` and `offset..`.
    pub fn split(
        &mut self,
        root: Option<NodeId>,
        offset: usize,
        buffers: &Buffers,
    ) -> Result<(Option<NodeId>, Option<NodeId>), TextError> {
        let Some(id) = root else {
            return Ok((None, None));
        };
        let node = *self.get(id);
        if offset == 0 {
            return Ok((None, root));
        }
        if offset >= node.len {
            return Ok((root, None));
        }
        let left_len = self.len(node.left);
        let piece_end = left_len + node.piece.len;
        if offset <= left_len {
            let (ll, lr) = self.split(node.left, offset, buffers)?;
            Ok((ll, Some(self.join(lr, node.piece, node.right)?)))
        } else if offset >= piece_end {
            let (rl, rr) = self.split(node.right, offset - piece_end, buffers)?;
            Ok((Some(self.join(node.left, node.piece, rl)?), rr))
        } else {
            let (head, tail) = node.piece.split(offset - left_len, buffers.bytes(&node.piece));
            let left = self.join(node.left, head, None)?;
            let right = self.join(None, tail, node.right)?;
            Ok((Some(left), Some(right)))
        }
    }

    /// Insert `piece` between `left` and `right`, extending the last piece of
    /// `left` instead when `piece` directly continues it in the add buffer.
    pub fn insert_between(
        &mut self,
        left: Option<NodeId>,
        piece: Piece,
        right: Option<NodeId>,
    ) -> Result<NodeId, TextError> {
        if let Some(l) = left
            && let Some(extended) = self.extend_last(l, &piece)?
        {
            return Ok(self.concat(Some(extended), right)?.unwrap_or(extended));
        }
        self.join(left, piece, right)
    }

    /// Path-copy the right spine, merging `piece` into the last piece.
    fn extend_last(&mut self, id: NodeId, piece: &Piece) -> Result<Option<NodeId>, TextError> {
        let node = *self.get(id);
        match node.right {
            Some(right) => match self.extend_last(right, piece)? {
                Some(right) => Ok(Some(self.make(node.left, node.piece, Some(right))?)),
                None => Ok(None),
            },
            None if node.piece.is_followed_by(piece) => {
                Ok(Some(self.make(node.left, node.piece.merged(piece), None)?))
            }
            None => Ok(None),
        }
    }

    /// Find the piece containing byte `offset`, returning it with its absolute start.
    pub fn piece_at(&self, root: Option<NodeId>, offset: usize) -> Option<(usize, Piece)> {
        let mut cur = root;
        let mut base = 0;
        while let Some(id) = cur {
            let node = self.get(id);
            let left_len = self.len(node.left);
            if offset < base + left_len {
                cur = node.left;
            } else if offset < base + left_len + node.piece.len {
                return Some((base + left_len, node.piece));
            } else {
                base += left_len + node.piece.len;
                cur = node.right;
            }
        }
        None
    }

    /// Byte offset of the `nth` newline (1-based) in the tree.
    pub fn nth_newline(&self, root: Option<NodeId>, nth: usize, buffers: &Buffers) -> Option<usize> {
        let mut cur = root;
        let mut base = 0;
        let mut remaining = nth;
        while let Some(id) = cur {
            let node = self.get(id);
            let left_newlines = self.newlines(node.left);
            if remaining <= left_newlines {
                cur = node.left;
                continue;
            }
            remaining -= left_newlines;
            let left_len = self.len(node.left);
            if remaining <= node.piece.newlines {
                let bytes = buffers.bytes(&node.piece);
                let index = memchr::memchr_iter(b'\n', bytes).nth(remaining - 1)?;
                return Some(base + left_len + index);
            }
            remaining -= node.piece.newlines;
            base += left_len + node.piece.len;
            cur = node.right;
        }
        None
    }

    /// Number of newlines strictly before byte `offset`.
    pub fn newlines_before(&self, root: Option<NodeId>, offset: usize, buffers: &Buffers) -> usize {
        let mut cur = root;
        let mut base = 0;
        let mut count = 0;
        while let Some(id) = cur {
            let node = self.get(id);
            let left_len = self.len(node.left);
            if offset <= base + left_len {
                cur = node.left;
                continue;
            }
            count += self.newlines(node.left);
            let piece_start = base + left_len;
            if offset <= piece_start + node.piece.len {
                let bytes = buffers.bytes(&node.piece);
                return count + super::piece::count_newlines(&bytes[..offset - piece_start]);
            }
            count += node.piece.newlines;
            base = piece_start + node.piece.len;
            cur = node.right;
        }
        count
    }

    /// Pieces of a tree in order, with their absolute start offsets.
    #[cfg(test)]
    pub fn pieces(&self, root: Option<NodeId>) -> Vec<(usize, Piece)> {
        fn walk(arena: &Arena, id: Option<NodeId>, base: &mut usize, out: &mut Vec<(usize, Piece)>) {
            let Some(id) = id else { return };
            let node = arena.get(id);
            walk(arena, node.left, base, out);
            out.push((*base, node.piece));
            *base += node.piece.len;
            walk(arena, node.right, base, out);
        }
        let mut out = Vec::new();
        walk(self, root, &mut 0, &mut out);
        out
    }

    /// Check cached counts and AVL balance for every node under `root`.
    #[cfg(test)]
    pub fn check(&self, root: Option<NodeId>) {
        let Some(id) = root else { return };
        let node = self.get(id);
        self.check(node.left);
        self.check(node.right);
        assert_eq!(node.len, self.len(node.left) + node.piece.len + self.len(node.right));
        assert_eq!(
            node.newlines,
            self.newlines(node.left) + node.piece.newlines + self.newlines(node.right)
        );
        let (hl, hr) = (self.height(node.left), self.height(node.right));
        assert_eq!(node.height, 1 + hl.max(hr));
        assert!(hl.abs_diff(hr) <= 1, "unbalanced node: {hl} vs {hr}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_piece(buffers: &mut Buffers, text: &str) -> Piece {
        let start = buffers.add.len();
        buffers.add.extend_from_slice(text.as_bytes());
        Piece::new(BufferSource::Add, start, text.as_bytes())
    }

    fn collect(arena: &Arena, buffers: &Buffers, root: Option<NodeId>) -> String {
        arena
            .pieces(root)
            .iter()
            .map(|(_, piece)| String::from_utf8_lossy(buffers.bytes(piece)).into_owned())
            .collect()
    }

    #[test]
    fn test_join_stays_balanced_for_sequential_appends() {
        let mut arena = Arena::default();
        let mut buffers = Buffers::default();
        let mut root = None;
        for i in 0..200 {
            let piece = add_piece(&mut buffers, &format!("{}", i % 10));
            root = Some(arena.join(root, piece, None).unwrap());
        }
        arena.check(root);
        assert!(arena.get(root.unwrap()).height <= 12);
        assert_eq!(arena.len(root), 200);
    }

    #[test]
    fn test_split_inside_piece_and_concat() {
        let mut arena = Arena::default();
        let mut buffers = Buffers::default();
        let a = add_piece(&mut buffers, "hello\n");
        let b = add_piece(&mut buffers, "world\n");
        let left = arena.leaf(a).unwrap();
        let root = Some(arena.join(Some(left), b, None).unwrap());

        let (l, r) = arena.split(root, 8, &buffers).unwrap();
        assert_eq!(collect(&arena, &buffers, l), "hello\nwo");
        assert_eq!(collect(&arena, &buffers, r), "rld\n");
        arena.check(l);
        arena.check(r);

        let joined = arena.concat(r, l).unwrap();
        assert_eq!(collect(&arena, &buffers, joined), "rld\nhello\nwo");
        arena.check(joined);
        // The original root is untouched.
        assert_eq!(collect(&arena, &buffers, root), "hello\nworld\n");
    }

    #[test]
    fn test_newline_queries() {
        let mut arena = Arena::default();
        let mut buffers = Buffers::default();
        let a = add_piece(&mut buffers, "a\nb");
        let b = add_piece(&mut buffers, "\nc\n");
        let left = arena.leaf(a).unwrap();
        let root = Some(arena.join(Some(left), b, None).unwrap());
        assert_eq!(arena.nth_newline(root, 1, &buffers), Some(1));
        assert_eq!(arena.nth_newline(root, 2, &buffers), Some(3));
        assert_eq!(arena.nth_newline(root, 3, &buffers), Some(5));
        assert_eq!(arena.nth_newline(root, 4, &buffers), None);
        assert_eq!(arena.newlines_before(root, 0, &buffers), 0);
        assert_eq!(arena.newlines_before(root, 2, &buffers), 1);
        assert_eq!(arena.newlines_before(root, 4, &buffers), 2);
        assert_eq!(arena.newlines_before(root, 6, &buffers), 3);
    }

    #[test]
    fn test_compact_keeps_only_reachable_nodes() {
        let mut arena = Arena::default();
        let mut buffers = Buffers::default();
        let mut root = None;
        let mut snapshots = Vec::new();
        for word in ["alpha ", "beta ", "gamma ", "delta "] {
            let piece = add_piece(&mut buffers, word);
            let (left, right) = arena.split(root, 0, &buffers).unwrap();
            root = Some(arena.join(left, piece, right).unwrap());
            snapshots.push(root);
        }
        let before = arena.node_count();
        let keep = [snapshots[1], root];
        let (compacted, remap) = arena.compact(keep.iter());
        assert!(compacted.node_count() < before);

        let new_root = root.and_then(|id| remap[id.index()]);
        let new_old = snapshots[1].and_then(|id| remap[id.index()]);
        assert_eq!(collect(&compacted, &buffers, new_root), "delta gamma beta alpha ");
        assert_eq!(collect(&compacted, &buffers, new_old), "beta alpha ");
        compacted.check(new_root);
        // Unreachable snapshots have no new id.
        assert!(snapshots[2].and_then(|id| remap[id.index()]).is_none());
    }

    #[test]
    fn test_full_arena_reports_error() {
        let mut arena = Arena::with_limit(3);
        let mut buffers = Buffers::default();
        let mut root = None;
        let mut result = Ok(());
        for _ in 0..4 {
            let piece = add_piece(&mut buffers, "x\n");
            match arena.join(root, piece, None) {
                Ok(id) => root = Some(id),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        assert_eq!(result, Err(TextError::StorageFull { nodes: 3 }));
        assert_eq!(arena.node_count(), 3);
    }
}
