//! The branching undo tree.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::UndoConfig;
use crate::error::UndoError;
use crate::text::{TextState, TextStore};

use super::edit::Change;

/// Index of a node in an [`UndoTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UndoNodeId(usize);

impl UndoNodeId {
    /// The root node of every tree.
    pub const ROOT: UndoNodeId = UndoNodeId(0);

    /// Arena index of the node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One version in the history.
#[derive(Debug, Clone)]
pub struct UndoNode {
    parent: Option<UndoNodeId>,
    children: Vec<UndoNodeId>,
    change: Option<Change>,
    checkpoint: Option<TextState>,
    last_redo_child: Option<usize>,
    seq: u64,
    depth: usize,
    branch: usize,
    timestamp: SystemTime,
    /// Edits recorded since the nearest checkpointed ancestor
    edits_since_checkpoint: usize,
    /// Bytes changed since the nearest checkpointed ancestor
    bytes_since_checkpoint: usize,
}

impl UndoNode {
    fn root(state: TextState) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            change: None,
            checkpoint: Some(state),
            last_redo_child: None,
            seq: 0,
            depth: 0,
            branch: 0,
            timestamp: SystemTime::now(),
            edits_since_checkpoint: 0,
            bytes_since_checkpoint: 0,
        }
    }

    /// Parent node; `None` for the root.
    pub fn parent(&self) -> Option<UndoNodeId> {
        self.parent
    }

    /// Children in creation order.
    pub fn children(&self) -> &[UndoNodeId] {
        &self.children
    }

    /// The change that produced this node from its parent.
    pub fn change(&self) -> Option<&Change> {
        self.change.as_ref()
    }

    /// Whether a full text state is stored on this node.
    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Child index the next redo follows.
    pub fn redo_child(&self) -> Option<usize> {
        self.last_redo_child
            .or_else(|| self.children.len().checked_sub(1))
    }

    /// Creation sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Distance from the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Branch id. A first child continues its parent's branch.
    pub fn branch(&self) -> usize {
        self.branch
    }

    /// Wall-clock creation time.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// A flattened node for history visualizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Node id
    pub id: usize,
    /// Parent id; `None` for the root
    pub parent: Option<usize>,
    /// Distance from the root
    pub depth: usize,
    /// Branch id
    pub branch: usize,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: u64,
    /// One-line change summary
    pub summary: String,
    /// Whether this is the current node
    pub is_current: bool,
    /// Whether a checkpoint is stored on the node
    pub has_checkpoint: bool,
}

/// History of a document as a tree of changes.
///
/// Every node except the root holds the [`Change`] that leads to it from
/// its parent. Some nodes also hold a checkpoint, the full [`TextState`]
/// of that version, which bounds how many changes must be replayed to
/// rebuild an arbitrary node. Undoing never discards nodes: a new edit
/// after an undo starts a sibling branch.
#[derive(Debug)]
pub struct UndoTree {
    nodes: Vec<UndoNode>,
    current: UndoNodeId,
    current_state: TextState,
    config: UndoConfig,
    /// Nodes carrying a checkpoint, root included
    checkpoints: Vec<UndoNodeId>,
    /// Set once checkpoint storage could not be reserved
    delta_only: bool,
    next_branch: usize,
    next_seq: u64,
}

impl UndoTree {
    /// A tree whose root holds `initial` as its checkpoint.
    pub fn new(initial: TextState, config: UndoConfig) -> Self {
        Self {
            nodes: vec![UndoNode::root(initial)],
            current: UndoNodeId::ROOT,
            current_state: initial,
            config,
            checkpoints: vec![UndoNodeId::ROOT],
            delta_only: false,
            next_branch: 1,
            next_seq: 1,
        }
    }

    /// The current node.
    pub fn current(&self) -> UndoNodeId {
        self.current
    }

    /// Text state of the current node.
    pub fn current_state(&self) -> TextState {
        self.current_state
    }

    /// Look up a node.
    pub fn node(&self, id: UndoNodeId) -> Option<&UndoNode> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: UndoNodeId) -> Result<&mut UndoNode, UndoError> {
        self.nodes.get_mut(id.0).ok_or(UndoError::InvalidNode(id))
    }

    fn get(&self, id: UndoNodeId) -> Result<&UndoNode, UndoError> {
        self.nodes.get(id.0).ok_or(UndoError::InvalidNode(id))
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes holding a checkpoint.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Whether checkpointing was switched off after a failed reservation.
    pub fn is_delta_only(&self) -> bool {
        self.delta_only
    }

    /// Whether the current node has a parent.
    pub fn can_undo(&self) -> bool {
        self.nodes[self.current.0].parent.is_some()
    }

    /// Whether the current node has children.
    pub fn can_redo(&self) -> bool {
        !self.nodes[self.current.0].children.is_empty()
    }

    /// Record `change`, which turned the current state into `resulting`.
    ///
    /// The new node becomes current. If the current node already has
    /// children this starts a new branch (see [`UndoTree::branch`]).
    pub fn record(&mut self, change: Change, resulting: TextState) -> UndoNodeId {
        if self.can_redo() {
            return self.branch(change, resulting);
        }
        let branch = self.nodes[self.current.0].branch;
        self.push_child(change, resulting, branch)
    }

    /// Record `change` as a new sibling branch below the current node.
    ///
    /// Existing children are kept; the parent's redo pointer moves to the new
    /// branch.
    pub fn branch(&mut self, change: Change, resulting: TextState) -> UndoNodeId {
        let branch = if self.can_redo() {
            let id = self.next_branch;
            self.next_branch += 1;
            id
        } else {
            self.nodes[self.current.0].branch
        };
        self.push_child(change, resulting, branch)
    }

    fn push_child(&mut self, change: Change, resulting: TextState, branch: usize) -> UndoNodeId {
        let parent_id = self.current;
        let parent = &self.nodes[parent_id.0];
        let id = UndoNodeId(self.nodes.len());
        let node = UndoNode {
            parent: Some(parent_id),
            children: Vec::new(),
            edits_since_checkpoint: parent.edits_since_checkpoint + change.edits.len(),
            bytes_since_checkpoint: parent.bytes_since_checkpoint + change.changed_bytes(),
            change: Some(change),
            checkpoint: None,
            last_redo_child: None,
            seq: self.next_seq,
            depth: parent.depth + 1,
            branch,
            timestamp: SystemTime::now(),
        };
        self.next_seq += 1;
        self.nodes.push(node);

        let parent = &mut self.nodes[parent_id.0];
        parent.children.push(id);
        parent.last_redo_child = Some(parent.children.len() - 1);

        self.current = id;
        self.current_state = resulting;

        let node = &self.nodes[id.0];
        if node.edits_since_checkpoint >= self.config.checkpoint_interval
            || node.bytes_since_checkpoint >= self.config.checkpoint_bytes
        {
            self.attach_checkpoint(id, resulting);
        }
        id
    }

    /// Store `state` on `id` unless checkpointing has been switched off.
    fn attach_checkpoint(&mut self, id: UndoNodeId, state: TextState) {
        if self.delta_only || self.nodes[id.0].checkpoint.is_some() {
            return;
        }
        if let Err(err) = self.checkpoints.try_reserve(1) {
            tracing::warn!(%err, node = id.0, "cannot reserve checkpoint storage; undo history continues delta-only");
            self.delta_only = true;
            return;
        }
        self.checkpoints.push(id);
        let node = &mut self.nodes[id.0];
        node.checkpoint = Some(state);
        node.edits_since_checkpoint = 0;
        node.bytes_since_checkpoint = 0;
        tracing::trace!(node = id.0, depth = node.depth, "checkpoint stored");
    }

    /// Store the current state as a checkpoint on the current node.
    pub fn checkpoint_now(&mut self) {
        self.attach_checkpoint(self.current, self.current_state);
    }

    /// Move to the parent of the current node and return its state.
    pub fn undo(&mut self, store: &mut TextStore) -> Result<TextState, UndoError> {
        let node_id = self.current;
        let node = self.get(node_id)?;
        let parent_id = node.parent.ok_or(UndoError::NothingToUndo)?;
        let state = match (&self.get(parent_id)?.checkpoint, &node.change) {
            (Some(checkpoint), _) => *checkpoint,
            (None, Some(change)) => change.revert(store, self.current_state)?,
            (None, None) => self.state_at(parent_id, store)?,
        };
        let parent = self.node_mut(parent_id)?;
        parent.last_redo_child = parent.children.iter().position(|&c| c == node_id);
        self.current = parent_id;
        self.current_state = state;
        Ok(state)
    }

    /// Follow the redo pointer of the current node, returning the new state.
    ///
    /// Returns `Ok(None)` when the current node has no children.
    pub fn redo(&mut self, store: &mut TextStore) -> Result<Option<TextState>, UndoError> {
        let node = self.get(self.current)?;
        let Some(index) = node.redo_child() else {
            return Ok(None);
        };
        let child_id = node.children[index];
        let child = self.get(child_id)?;
        let state = match (&child.checkpoint, &child.change) {
            (Some(checkpoint), _) => *checkpoint,
            (None, Some(change)) => change.apply(store, self.current_state)?,
            (None, None) => self.state_at(child_id, store)?,
        };
        self.current = child_id;
        self.current_state = state;
        Ok(Some(state))
    }

    /// Choose which child of the current node the next redo follows.
    pub fn goto_branch(&mut self, index: usize) -> Result<(), UndoError> {
        let current = self.current;
        let node = self.node_mut(current)?;
        if index >= node.children.len() {
            return Err(UndoError::InvalidBranch {
                index,
                branches: node.children.len(),
            });
        }
        node.last_redo_child = Some(index);
        Ok(())
    }

    /// Jump to `target`, undoing up to the common ancestor and redoing down.
    ///
    /// Redo pointers along the downward path are updated so a later redo from
    /// any ancestor leads back toward `target`.
    pub fn goto(&mut self, target: UndoNodeId, store: &mut TextStore) -> Result<TextState, UndoError> {
        self.get(target)?;
        let mut down = Vec::new();
        let mut up = self.current;
        let mut node = target;
        while self.get(node)?.depth > self.get(up)?.depth {
            down.push(node);
            node = self.get(node)?.parent.ok_or(UndoError::InvalidNode(node))?;
        }
        let mut undos = 0usize;
        while self.get(up)?.depth > self.get(node)?.depth {
            up = self.get(up)?.parent.ok_or(UndoError::InvalidNode(up))?;
            undos += 1;
        }
        while up != node {
            down.push(node);
            node = self.get(node)?.parent.ok_or(UndoError::InvalidNode(node))?;
            up = self.get(up)?.parent.ok_or(UndoError::InvalidNode(up))?;
            undos += 1;
        }
        for _ in 0..undos {
            self.undo(store)?;
        }
        for &child in down.iter().rev() {
            let parent = self.current;
            let index = self
                .get(parent)?
                .children
                .iter()
                .position(|&c| c == child)
                .ok_or(UndoError::InvalidNode(child))?;
            self.goto_branch(index)?;
            self.redo(store)?;
        }
        tracing::debug!(target = target.0, undos, redos = down.len(), "jumped in undo tree");
        Ok(self.current_state)
    }

    /// Rebuild the state of any node from its nearest checkpointed ancestor.
    pub fn state_at(&self, id: UndoNodeId, store: &mut TextStore) -> Result<TextState, UndoError> {
        if id == self.current {
            return Ok(self.current_state);
        }
        let mut pending = Vec::new();
        let mut cursor = id;
        let base = loop {
            let node = self.get(cursor)?;
            if let Some(checkpoint) = node.checkpoint {
                break checkpoint;
            }
            if let Some(change) = &node.change {
                pending.push(change);
            }
            cursor = node.parent.ok_or(UndoError::InvalidNode(cursor))?;
        };
        let mut state = base;
        for change in pending.into_iter().rev() {
            state = change.apply(store, state)?;
        }
        Ok(state)
    }

    /// Every text state the tree holds: the current one and each checkpoint.
    pub(crate) fn states_mut(&mut self) -> impl Iterator<Item = &mut TextState> {
        std::iter::once(&mut self.current_state).chain(
            self.nodes
                .iter_mut()
                .filter_map(|node| node.checkpoint.as_mut()),
        )
    }

    /// Drop all history, making `state` the new root.
    pub fn clear(&mut self, state: TextState) {
        *self = Self::new(state, self.config.clone());
    }

    /// Approximate heap bytes used by recorded changes.
    pub fn memory_usage(&self) -> usize {
        let payload: usize = self
            .nodes
            .iter()
            .filter_map(|node| node.change.as_ref())
            .map(|change| {
                change.changed_bytes()
                    + change.label.as_ref().map_or(0, String::len)
                    + change.edits.len() * std::mem::size_of::<super::Edit>()
            })
            .sum();
        payload + self.nodes.len() * std::mem::size_of::<UndoNode>()
    }

    /// Flattened view of every node, in creation order.
    pub fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(id, node)| HistoryEntry {
                id,
                parent: node.parent.map(UndoNodeId::index),
                depth: node.depth,
                branch: node.branch,
                timestamp: node
                    .timestamp
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| d.as_millis() as u64),
                summary: node
                    .change
                    .as_ref()
                    .map_or_else(|| "original".to_string(), Change::summary),
                is_current: id == self.current.0,
                has_checkpoint: node.checkpoint.is_some(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Edit;

    fn insert(
        store: &mut TextStore,
        tree: &mut UndoTree,
        offset: usize,
        text: &str,
    ) -> UndoNodeId {
        let edit = Edit::Insert {
            offset,
            text: text.as_bytes().to_vec(),
        };
        let state = edit.apply(store, tree.current_state()).unwrap();
        tree.record(Change::single(edit), state)
    }

    fn content(store: &TextStore, tree: &UndoTree) -> String {
        store.to_string_lossy(&tree.current_state())
    }

    #[test]
    fn test_undo_redo_linear() {
        let (mut store, v0) = TextStore::open("");
        let mut tree = UndoTree::new(v0, UndoConfig::default());
        insert(&mut store, &mut tree, 0, "a");
        insert(&mut store, &mut tree, 1, "b");
        assert_eq!(content(&store, &tree), "ab");

        tree.undo(&mut store).unwrap();
        assert_eq!(content(&store, &tree), "a");
        tree.undo(&mut store).unwrap();
        assert_eq!(content(&store, &tree), "");
        assert_eq!(tree.undo(&mut store), Err(UndoError::NothingToUndo));

        tree.redo(&mut store).unwrap();
        tree.redo(&mut store).unwrap();
        assert_eq!(content(&store, &tree), "ab");
        assert_eq!(tree.redo(&mut store), Ok(None));
    }

    #[test]
    fn test_new_edit_after_undo_branches() {
        let (mut store, v0) = TextStore::open("");
        let mut tree = UndoTree::new(v0, UndoConfig::default());
        let first = insert(&mut store, &mut tree, 0, "one");
        tree.undo(&mut store).unwrap();
        let second = insert(&mut store, &mut tree, 0, "two");

        let root = tree.node(UndoNodeId::ROOT).unwrap();
        assert_eq!(root.children(), &[first, second]);
        assert_eq!(tree.node(first).unwrap().branch(), 0);
        assert_eq!(tree.node(second).unwrap().branch(), 1);

        // Redo follows the most recent branch.
        tree.undo(&mut store).unwrap();
        tree.redo(&mut store).unwrap();
        assert_eq!(content(&store, &tree), "two");

        tree.undo(&mut store).unwrap();
        tree.goto_branch(0).unwrap();
        tree.redo(&mut store).unwrap();
        assert_eq!(content(&store, &tree), "one");
        assert_eq!(
            tree.goto_branch(3),
            Err(UndoError::InvalidBranch { index: 3, branches: 0 })
        );
    }

    #[test]
    fn test_checkpoints_follow_interval() {
        let (mut store, v0) = TextStore::open("");
        let config = UndoConfig {
            checkpoint_interval: 3,
            checkpoint_bytes: usize::MAX,
        };
        let mut tree = UndoTree::new(v0, config);
        for i in 0..7 {
            insert(&mut store, &mut tree, i, "x");
        }
        let with_checkpoint: Vec<usize> = tree
            .history_snapshot()
            .iter()
            .filter(|entry| entry.has_checkpoint)
            .map(|entry| entry.id)
            .collect();
        assert_eq!(with_checkpoint, vec![0, 3, 6]);
    }

    #[test]
    fn test_byte_threshold_triggers_checkpoint() {
        let (mut store, v0) = TextStore::open("");
        let config = UndoConfig {
            checkpoint_interval: 1000,
            checkpoint_bytes: 8,
        };
        let mut tree = UndoTree::new(v0, config);
        insert(&mut store, &mut tree, 0, "12345");
        let node = insert(&mut store, &mut tree, 5, "6789");
        assert!(tree.node(node).unwrap().has_checkpoint());
        assert_eq!(tree.checkpoint_count(), 2);
    }

    #[test]
    fn test_state_at_matches_direct_snapshot() {
        let (mut store, v0) = TextStore::open("");
        let config = UndoConfig {
            checkpoint_interval: 4,
            checkpoint_bytes: usize::MAX,
        };
        let mut tree = UndoTree::new(v0, config);
        let mut ids = Vec::new();
        let mut expected = Vec::new();
        for i in 0..10 {
            ids.push(insert(&mut store, &mut tree, i, &i.to_string()));
            expected.push(content(&store, &tree));
        }
        for (id, text) in ids.iter().zip(&expected) {
            let state = tree.state_at(*id, &mut store).unwrap();
            assert_eq!(&store.to_string_lossy(&state), text);
        }
    }

    #[test]
    fn test_goto_crosses_branches() {
        let (mut store, v0) = TextStore::open("base");
        let mut tree = UndoTree::new(v0, UndoConfig::default());
        insert(&mut store, &mut tree, 4, " one");
        let left = insert(&mut store, &mut tree, 8, " two");
        tree.undo(&mut store).unwrap();
        tree.undo(&mut store).unwrap();
        let right = insert(&mut store, &mut tree, 0, ">> ");

        tree.goto(left, &mut store).unwrap();
        assert_eq!(content(&store, &tree), "base one two");
        assert_eq!(tree.current(), left);

        tree.goto(right, &mut store).unwrap();
        assert_eq!(content(&store, &tree), ">> base");

        tree.goto(UndoNodeId::ROOT, &mut store).unwrap();
        assert_eq!(content(&store, &tree), "base");
        assert!(tree.goto(UndoNodeId(99), &mut store).is_err());
    }

    #[test]
    fn test_history_snapshot_shape() {
        let (mut store, v0) = TextStore::open("");
        let mut tree = UndoTree::new(v0, UndoConfig::default());
        insert(&mut store, &mut tree, 0, "hello");
        let entries = tree.history_snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary, "original");
        assert!(entries[0].has_checkpoint);
        assert_eq!(entries[1].parent, Some(0));
        assert_eq!(entries[1].summary, r#"Insert "hello""#);
        assert!(entries[1].is_current);
    }

    #[test]
    fn test_clear_resets_to_single_root() {
        let (mut store, v0) = TextStore::open("");
        let mut tree = UndoTree::new(v0, UndoConfig::default());
        insert(&mut store, &mut tree, 0, "abc");
        let state = tree.current_state();
        tree.clear(state);
        assert_eq!(tree.node_count(), 1);
        assert!(!tree.can_undo());
        assert_eq!(content(&store, &tree), "abc");
    }
}
