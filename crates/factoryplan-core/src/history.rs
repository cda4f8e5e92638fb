//! Transactional undo/redo journal.
//!
//! Mutations are staged as [`ChangeRecord`]s inside a transaction. Nested
//! `start_transaction` calls are absorbed by the outermost one, so composed
//! store operations still produce a single undo step.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
    Update,
}

/// Observer flags captured when a change is staged and replayed whenever the
/// change is committed, undone or redone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emit {
    pub notify_peer: bool,
    pub sort: bool,
}

impl Default for Emit {
    fn default() -> Self {
        Self {
            notify_peer: true,
            sort: true,
        }
    }
}

/// One keyed change to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord<K, V> {
    pub kind: ChangeKind,
    pub key: K,
    pub old: Option<V>,
    pub new: Option<V>,
    pub description: String,
    pub emit: Option<Emit>,
}

impl<K: Clone, V: Clone> ChangeRecord<K, V> {
    pub fn new(key: K, old: Option<V>, new: Option<V>, description: &str) -> Self {
        let kind = match (&old, &new) {
            (None, Some(_)) => ChangeKind::Add,
            (Some(_), None) => ChangeKind::Delete,
            _ => ChangeKind::Update,
        };
        Self {
            kind,
            key,
            old,
            new,
            description: description.to_string(),
            emit: None,
        }
    }

    pub fn with_kind(mut self, kind: ChangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Ask for observers to be told about this change once it is committed.
    pub fn emit(mut self, emit: Emit) -> Self {
        self.emit = Some(emit);
        self
    }

    /// The change that undoes this one.
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            ChangeKind::Add => ChangeKind::Delete,
            ChangeKind::Delete => ChangeKind::Add,
            ChangeKind::Update => ChangeKind::Update,
        };
        Self {
            kind,
            key: self.key.clone(),
            old: self.new.clone(),
            new: self.old.clone(),
            description: self.description.clone(),
            emit: self.emit,
        }
    }
}

/// Set `key` to `new` (or delete it when `new` is `None`) and return the record
/// describing what happened.
pub fn update_map<K, V>(
    map: &mut BTreeMap<K, V>,
    key: K,
    new: Option<V>,
    description: &str,
) -> ChangeRecord<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    let old = match &new {
        Some(value) => map.insert(key.clone(), value.clone()),
        None => map.remove(&key),
    };
    ChangeRecord::new(key, old, new, description)
}

/// An atomic group of changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction<C> {
    pub label: Option<String>,
    pub changes: Vec<C>,
}

/// Outcome of [`History::commit_transaction`].
#[derive(Debug)]
pub enum Commit<'a, C> {
    /// An enclosing transaction is still open.
    Nested,
    /// Nothing was staged; no history entry was created.
    Empty,
    Committed(&'a Transaction<C>),
}

/// Undo/redo stacks plus the transaction currently being staged.
#[derive(Debug)]
pub struct History<C> {
    undo_stack: Vec<Transaction<C>>,
    redo_stack: Vec<Transaction<C>>,
    staged: Vec<C>,
    /// Staged length at each open `start_transaction`; its length is the depth.
    marks: Vec<usize>,
    label: Option<String>,
}

impl<C> Default for History<C> {
    fn default() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            staged: Vec::new(),
            marks: Vec::new(),
            label: None,
        }
    }
}

impl<C> History<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_transaction(&mut self, label: Option<&str>) {
        if self.marks.is_empty() {
            self.label = label.map(str::to_string);
        }
        self.marks.push(self.staged.len());
    }

    /// Stage a change in the open transaction.
    ///
    /// # Panics
    /// When no transaction is open.
    pub fn stage(&mut self, change: C) {
        assert!(
            !self.marks.is_empty(),
            "change staged outside of a transaction"
        );
        self.staged.push(change);
    }

    /// Close the innermost transaction; the outermost close pushes the
    /// staged changes as one undo step and clears the redo stack.
    ///
    /// # Panics
    /// When called without a matching `start_transaction`.
    pub fn commit_transaction(&mut self) -> Commit<'_, C> {
        assert!(
            self.marks.pop().is_some(),
            "commit_transaction without matching start_transaction"
        );
        if !self.marks.is_empty() {
            return Commit::Nested;
        }
        let label = self.label.take();
        if self.staged.is_empty() {
            return Commit::Empty;
        }
        let changes = std::mem::take(&mut self.staged);
        self.undo_stack.push(Transaction { label, changes });
        self.redo_stack.clear();
        match self.undo_stack.last() {
            Some(transaction) => Commit::Committed(transaction),
            None => Commit::Empty,
        }
    }

    /// Close the innermost transaction discarding what it staged. The caller
    /// reverts the returned changes in reverse order.
    ///
    /// # Panics
    /// When called without a matching `start_transaction`.
    pub fn abort_transaction(&mut self) -> Vec<C> {
        let mark = self
            .marks
            .pop()
            .expect("abort_transaction without matching start_transaction");
        if self.marks.is_empty() {
            self.label = None;
        }
        self.staged.split_off(mark)
    }

    /// Move the newest transaction to the redo stack. Returns it so the caller
    /// can revert its changes; `None` when empty or a transaction is open.
    pub fn undo(&mut self) -> Option<&Transaction<C>> {
        if self.is_in_transaction() {
            log::warn!("undo ignored while a transaction is open");
            return None;
        }
        let transaction = self.undo_stack.pop()?;
        self.redo_stack.push(transaction);
        self.redo_stack.last()
    }

    /// Move the newest undone transaction back to the undo stack. Returns it
    /// so the caller can replay its changes.
    pub fn redo(&mut self) -> Option<&Transaction<C>> {
        if self.is_in_transaction() {
            log::warn!("redo ignored while a transaction is open");
            return None;
        }
        let transaction = self.redo_stack.pop()?;
        self.undo_stack.push(transaction);
        self.undo_stack.last()
    }

    pub fn is_in_transaction(&self) -> bool {
        !self.marks.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.is_in_transaction() && !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.is_in_transaction() && !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().and_then(|t| t.label.as_deref())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().and_then(|t| t.label.as_deref())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_transactions_collapse() {
        let mut history: History<u32> = History::new();
        history.start_transaction(Some("outer"));
        history.stage(1);
        history.start_transaction(Some("inner"));
        history.stage(2);
        assert!(matches!(history.commit_transaction(), Commit::Nested));
        match history.commit_transaction() {
            Commit::Committed(t) => {
                assert_eq!(t.changes, vec![1, 2]);
                assert_eq!(t.label.as_deref(), Some("outer"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_empty_commit_leaves_no_entry() {
        let mut history: History<u32> = History::new();
        history.start_transaction(None);
        assert!(matches!(history.commit_transaction(), Commit::Empty));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_undo_redo_move_between_stacks() {
        let mut history: History<u32> = History::new();
        for n in 0..3 {
            history.start_transaction(None);
            history.stage(n);
            history.commit_transaction();
        }
        assert_eq!(history.undo().unwrap().changes, vec![2]);
        assert_eq!(history.undo().unwrap().changes, vec![1]);
        assert_eq!(history.redo().unwrap().changes, vec![1]);
        assert!(history.can_redo());

        history.start_transaction(None);
        history.stage(9);
        history.commit_transaction();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_disabled_inside_transaction() {
        let mut history: History<u32> = History::new();
        history.start_transaction(None);
        history.stage(1);
        history.commit_transaction();

        history.start_transaction(None);
        assert!(history.undo().is_none());
        history.commit_transaction();
        assert!(history.undo().is_some());
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_abort_returns_only_inner_changes() {
        let mut history: History<u32> = History::new();
        history.start_transaction(None);
        history.stage(1);
        history.start_transaction(None);
        history.stage(2);
        history.stage(3);
        assert_eq!(history.abort_transaction(), vec![2, 3]);
        assert!(matches!(history.commit_transaction(), Commit::Committed(_)));
    }

    #[test]
    #[should_panic(expected = "without matching start")]
    fn test_commit_without_start_panics() {
        let mut history: History<u32> = History::new();
        history.commit_transaction();
    }

    #[test]
    fn test_update_map_records_kind_and_inverse() {
        let mut map = BTreeMap::new();
        let add = update_map(&mut map, 1, Some("a"), "add");
        assert_eq!(add.kind, ChangeKind::Add);
        let update = update_map(&mut map, 1, Some("b"), "update");
        assert_eq!(update.kind, ChangeKind::Update);
        assert_eq!(update.old, Some("a"));
        let delete = update_map(&mut map, 1, None, "delete");
        assert_eq!(delete.kind, ChangeKind::Delete);
        assert!(map.is_empty());

        let inverse = delete.inverse();
        assert_eq!(inverse.kind, ChangeKind::Add);
        assert_eq!(inverse.new, Some("b"));
    }
}
