use std::cmp::Ordering;
use std::mem;
use std::ops::Deref;
use std::vec;

use crate::{Compare, NaturalOrder};

/// Height contributed by an absent subtree.
const EMPTY_HEIGHT: i32 = -1;

/// Balance factor of a node whose left subtree is too tall.
const UNBALANCED_LEFT: i32 = 2;

/// Balance factor of a node whose right subtree is too tall.
const UNBALANCED_RIGHT: i32 = -2;

type Link<P> = Option<Box<Node<P>>>;

/// A single tree vertex: a record handle, a cached subtree height and the
/// owned child subtrees.
///
/// Nodes are created on insert (or during bulk construction) and destroyed on
/// removal or teardown; the tree always owns the node structure, while
/// ownership of the record payload follows the handle type `P`.
pub struct Node<P> {
    record: P,
    height: i32,
    left: Link<P>,
    right: Link<P>,
}

impl<P> Node<P> {
    fn new(record: P) -> Self {
        Self {
            record,
            height: 0,
            left: None,
            right: None,
        }
    }

    /// Cached height of the subtree rooted at this node. A leaf has height 0.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// The left child subtree, if present.
    pub fn left(&self) -> Option<&Node<P>> {
        self.left.as_deref()
    }

    /// The right child subtree, if present.
    pub fn right(&self) -> Option<&Node<P>> {
        self.right.as_deref()
    }

    /// Smallest node of the subtree rooted at this node.
    pub fn min(&self) -> &Node<P> {
        let mut node = self;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        node
    }

    /// Largest node of the subtree rooted at this node.
    pub fn max(&self) -> &Node<P> {
        let mut node = self;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        node
    }

    fn balance_factor(&self) -> i32 {
        height_of(&self.left) - height_of(&self.right)
    }

    // Must run after any child slot of `self` changes and before the balance
    // factor of `self` is consulted.
    fn update_height(&mut self) {
        self.height = 1 + height_of(&self.left).max(height_of(&self.right));
    }

    /// Restores the balance invariant at this node, assuming both child
    /// subtrees already satisfy it and heights are up to date. Returns the
    /// new owner of the subtree.
    fn rebalance(node: Box<Self>) -> Box<Self> {
        match node.balance_factor() {
            UNBALANCED_LEFT => {
                let left_bf = node.left.as_deref().map_or(0, Self::balance_factor);
                if left_bf >= 0 {
                    Self::rotate_ll(node)
                } else {
                    Self::rotate_lr(node)
                }
            }
            UNBALANCED_RIGHT => {
                let right_bf = node.right.as_deref().map_or(0, Self::balance_factor);
                if right_bf <= 0 {
                    Self::rotate_rr(node)
                } else {
                    Self::rotate_rl(node)
                }
            }
            _ => node,
        }
    }

    // Left-left rotation: promotes the left child as the subtree root.
    fn rotate_ll(mut root: Box<Self>) -> Box<Self> {
        let mut pivot = root.left.take().expect("invalid tree structure");
        root.left = pivot.right.take();
        root.update_height();
        pivot.right = Some(root);
        pivot.update_height();
        pivot
    }

    // Right-right rotation: promotes the right child as the subtree root.
    fn rotate_rr(mut root: Box<Self>) -> Box<Self> {
        let mut pivot = root.right.take().expect("invalid tree structure");
        root.right = pivot.left.take();
        root.update_height();
        pivot.left = Some(root);
        pivot.update_height();
        pivot
    }

    // Left-right rotation: right-right on the left child, then left-left.
    fn rotate_lr(mut root: Box<Self>) -> Box<Self> {
        let left = root.left.take().expect("invalid tree structure");
        root.left = Some(Self::rotate_rr(left));
        root.update_height();
        Self::rotate_ll(root)
    }

    // Right-left rotation: left-left on the right child, then right-right.
    fn rotate_rl(mut root: Box<Self>) -> Box<Self> {
        let right = root.right.take().expect("invalid tree structure");
        root.right = Some(Self::rotate_ll(right));
        root.update_height();
        Self::rotate_rr(root)
    }
}

impl<P: Deref> Node<P> {
    /// The record this node points to.
    pub fn record(&self) -> &P::Target {
        &self.record
    }

    /// The record handle itself.
    pub fn handle(&self) -> &P {
        &self.record
    }
}

fn height_of<P>(link: &Link<P>) -> i32 {
    link.as_deref().map_or(EMPTY_HEIGHT, |node| node.height)
}

/// Height-balanced (AVL) binary search tree over record handles.
///
/// `P` is the handle type (any [`Deref`] type: `Box<T>`, `Rc<T>`, `&T`, ...)
/// and `C` the comparator supplying the total order over records. After every
/// mutating call the balance factor of every node is in `{-1, 0, 1}`.
///
/// The tree never stores two records the comparator judges equal. It is a
/// single-threaded structure; wrap it behind external synchronization if
/// shared between threads.
pub struct AvlTree<P, C = NaturalOrder> {
    root: Link<P>,
    count: usize,
    comparator: C,
}

impl<P: Deref, C: Compare<P::Target> + Default> AvlTree<P, C> {
    /// Creates an empty tree with a default-constructed comparator.
    pub fn new() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<P: Deref, C: Compare<P::Target> + Default> Default for AvlTree<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Deref, C: Compare<P::Target>> AvlTree<P, C> {
    /// Creates an empty tree ordered by the given comparator.
    ///
    /// The comparator must implement a strict total order over records and
    /// must answer consistently for the lifetime of the tree.
    pub fn with_comparator(comparator: C) -> Self {
        Self {
            root: None,
            count: 0,
            comparator,
        }
    }

    /// Returns the number of records in the tree.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Indicates whether the tree is empty or not.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Height of the tree, or `None` if the tree is empty. A single-node
    /// tree has height 0.
    pub fn height(&self) -> Option<i32> {
        self.root.as_deref().map(|node| node.height)
    }

    /// Inserts a record handle into the tree.
    ///
    /// Returns `Err` with the handle given back when the comparator judges an
    /// already-stored record equal to it; a rejected duplicate is a normal
    /// negative outcome and leaves the tree untouched.
    ///
    /// # Arguments
    ///
    /// * `record` - handle of the record to insert.
    pub fn insert(&mut self, record: P) -> Result<(), P> {
        let (root, rejected) = Self::insert_node(self.root.take(), record, &self.comparator);
        self.root = Some(root);

        match rejected {
            Some(record) => Err(record),
            None => {
                self.count += 1;
                Ok(())
            }
        }
    }

    // Recursive descent for insert. Returns the new owner of the subtree it
    // was given, plus the rejected handle when the record was a duplicate.
    // Heights and balance are restored on the unwind.
    fn insert_node(link: Link<P>, record: P, comparator: &C) -> (Box<Node<P>>, Option<P>) {
        let Some(mut node) = link else {
            return (Box::new(Node::new(record)), None);
        };

        match comparator.compare(&record, node.record()) {
            Ordering::Less => {
                let (child, rejected) = Self::insert_node(node.left.take(), record, comparator);
                node.left = Some(child);
                node.update_height();
                (Node::rebalance(node), rejected)
            }
            Ordering::Greater => {
                let (child, rejected) = Self::insert_node(node.right.take(), record, comparator);
                node.right = Some(child);
                node.update_height();
                (Node::rebalance(node), rejected)
            }
            Ordering::Equal => (node, Some(record)),
        }
    }

    /// Looks up the node holding a record equal to `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - the record to compare against.
    pub fn search(&self, key: &P::Target) -> Option<&Node<P>> {
        self.search_node(self.root.as_deref(), key)
    }

    fn search_node<'a>(&self, node: Option<&'a Node<P>>, key: &P::Target) -> Option<&'a Node<P>> {
        let node = node?;

        match self.comparator.compare(key, node.record()) {
            Ordering::Less => self.search_node(node.left.as_deref(), key),
            Ordering::Greater => self.search_node(node.right.as_deref(), key),
            Ordering::Equal => Some(node),
        }
    }

    /// Returns the record equal to `key`, if one is stored.
    pub fn get(&self, key: &P::Target) -> Option<&P::Target> {
        self.search(key).map(|node| node.record())
    }

    /// Checks whether a record equal to `key` is present in the tree or not.
    pub fn contains(&self, key: &P::Target) -> bool {
        self.search(key).is_some()
    }

    /// Smallest node of the tree, or `None` if the tree is empty.
    pub fn min(&self) -> Option<&Node<P>> {
        self.root.as_deref().map(Node::min)
    }

    /// Largest node of the tree, or `None` if the tree is empty.
    pub fn max(&self) -> Option<&Node<P>> {
        self.root.as_deref().map(Node::max)
    }

    /// Closest smaller neighbor of `key`: the node holding the largest record
    /// the comparator orders strictly before it.
    ///
    /// Returns `None` when `key` itself is not stored, or when it is the
    /// smallest record. No parent backlinks are kept, so the upward portion
    /// of the walk re-derives each parent by a fresh descent from the root.
    pub fn predecessor(&self, key: &P::Target) -> Option<&Node<P>> {
        let node = self.search(key)?;

        if let Some(left) = node.left.as_deref() {
            return Some(left.max());
        }

        let mut ancestor = self.parent_of(key)?;
        loop {
            match self.comparator.compare(key, ancestor.record()) {
                Ordering::Greater => return Some(ancestor),
                _ => ancestor = self.parent_of(ancestor.record())?,
            }
        }
    }

    /// Closest larger neighbor of `key`: the node holding the smallest record
    /// the comparator orders strictly after it.
    ///
    /// Returns `None` when `key` itself is not stored, or when it is the
    /// largest record.
    pub fn successor(&self, key: &P::Target) -> Option<&Node<P>> {
        let node = self.search(key)?;

        if let Some(right) = node.right.as_deref() {
            return Some(right.min());
        }

        let mut ancestor = self.parent_of(key)?;
        loop {
            match self.comparator.compare(key, ancestor.record()) {
                Ordering::Less => return Some(ancestor),
                _ => ancestor = self.parent_of(ancestor.record())?,
            }
        }
    }

    // Parent of the node holding a record equal to `key`, or `None` for the
    // root and for absent keys.
    fn parent_of(&self, key: &P::Target) -> Option<&Node<P>> {
        self.parent_node(self.root.as_deref()?, key)
    }

    fn parent_node<'a>(&self, node: &'a Node<P>, key: &P::Target) -> Option<&'a Node<P>> {
        let child = match self.comparator.compare(key, node.record()) {
            Ordering::Less => node.left.as_deref()?,
            Ordering::Greater => node.right.as_deref()?,
            Ordering::Equal => return None,
        };

        if self.comparator.compare(key, child.record()) == Ordering::Equal {
            Some(node)
        } else {
            self.parent_node(child, key)
        }
    }

    /// Removes the record equal to `key` and returns its handle, so the
    /// caller retains ownership of the record. Returns `None` when no such
    /// record is stored; the tree is left untouched in that case.
    ///
    /// # Arguments
    ///
    /// * `key` - the record to compare against.
    pub fn remove(&mut self, key: &P::Target) -> Option<P> {
        let (root, removed) = Self::remove_node(self.root.take(), key, &self.comparator);
        self.root = root;

        if removed.is_some() {
            self.count -= 1;
        }
        removed
    }

    /// Removes the record equal to `key` and drops its handle, destroying the
    /// record when the handle owns it. Returns whether a removal occurred.
    pub fn remove_and_erase(&mut self, key: &P::Target) -> bool {
        self.remove(key).is_some()
    }

    // Recursive descent for removal. Returns the new owner of the subtree it
    // was given, plus the removed handle when the record was found.
    fn remove_node(link: Link<P>, key: &P::Target, comparator: &C) -> (Link<P>, Option<P>) {
        let Some(mut node) = link else {
            return (None, None);
        };

        match comparator.compare(key, node.record()) {
            Ordering::Less => {
                let (left, removed) = Self::remove_node(node.left.take(), key, comparator);
                node.left = left;
                node.update_height();
                (Some(Node::rebalance(node)), removed)
            }
            Ordering::Greater => {
                let (right, removed) = Self::remove_node(node.right.take(), key, comparator);
                node.right = right;
                node.update_height();
                (Some(Node::rebalance(node)), removed)
            }
            Ordering::Equal => match (node.left.take(), node.right.take()) {
                // leaf: detach
                (None, None) => {
                    let Node { record, .. } = *node;
                    (None, Some(record))
                }
                // one child: splice it into this slot
                (Some(child), None) | (None, Some(child)) => {
                    let Node { record, .. } = *node;
                    (Some(child), Some(record))
                }
                // two children: the node survives, its payload is replaced by
                // the in-order predecessor's handle, which is extracted from
                // the left subtree structurally
                (Some(left), Some(right)) => {
                    let (left, predecessor) = Self::remove_rightmost(left);
                    node.left = left;
                    node.right = Some(right);
                    let removed = mem::replace(&mut node.record, predecessor);
                    node.update_height();
                    (Some(Node::rebalance(node)), Some(removed))
                }
            },
        }
    }

    // Detaches the largest node of the subtree, rebalancing on the unwind.
    fn remove_rightmost(mut node: Box<Node<P>>) -> (Link<P>, P) {
        match node.right.take() {
            Some(right) => {
                let (right, rightmost) = Self::remove_rightmost(right);
                node.right = right;
                node.update_height();
                (Some(Node::rebalance(node)), rightmost)
            }
            None => {
                let Node { record, left, .. } = *node;
                (left, record)
            }
        }
    }

    /// Ordered snapshot of all records, emitted left-root-right into a buffer
    /// pre-sized to the node count.
    pub fn in_order(&self) -> Vec<&P::Target> {
        let mut records = Vec::with_capacity(self.count);
        Self::in_order_node(self.root.as_deref(), &mut records);
        records
    }

    fn in_order_node<'a>(node: Option<&'a Node<P>>, records: &mut Vec<&'a P::Target>) {
        if let Some(node) = node {
            Self::in_order_node(node.left.as_deref(), records);
            records.push(node.record());
            Self::in_order_node(node.right.as_deref(), records);
        }
    }

    /// An iterator visiting all records in comparator order.
    /// The iterator element type is `&'a P::Target`.
    pub fn iter(&self) -> Iter<'_, P> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left_spine(self.root.as_deref());
        iter
    }

    /// Rebuilds the tree from records already sorted by the comparator, with
    /// duplicates pre-removed by the caller.
    ///
    /// The tree is constructed directly at minimal height in O(n) by taking
    /// the middle record of each subrange as a subtree root; no rotation pass
    /// is needed. Any prior contents are dropped first. An empty input is a
    /// no-op and leaves the tree unchanged.
    ///
    /// # Arguments
    ///
    /// * `records` - sorted, duplicate-free record handles.
    pub fn build_from_sorted(&mut self, records: Vec<P>) {
        if records.is_empty() {
            return;
        }

        let count = records.len();
        let mut records = records.into_iter();
        self.root = Self::build_balanced(&mut records, count);
        self.count = count;
    }

    fn build_balanced(records: &mut vec::IntoIter<P>, len: usize) -> Link<P> {
        if len == 0 {
            return None;
        }

        let left_len = (len - 1) / 2;
        let left = Self::build_balanced(records, left_len);
        let mut node = Box::new(Node::new(records.next()?));
        node.left = left;
        node.right = Self::build_balanced(records, len - left_len - 1);
        node.update_height();

        Some(node)
    }

    /// Drops every node together with its record handle. Under an owning
    /// handle type this destroys the payloads; this is also what dropping the
    /// tree does.
    pub fn clear(&mut self) {
        self.root = None;
        self.count = 0;
    }

    /// Structural-only teardown: consumes the tree and hands every record
    /// handle back to the caller, in comparator order.
    pub fn into_records(mut self) -> Vec<P> {
        let mut records = Vec::with_capacity(self.count);
        Self::drain_node(self.root.take(), &mut records);
        records
    }

    fn drain_node(link: Link<P>, records: &mut Vec<P>) {
        if let Some(node) = link {
            let Node { record, left, right, .. } = *node;
            Self::drain_node(left, records);
            records.push(record);
            Self::drain_node(right, records);
        }
    }
}

/// In-order iterator over an [`AvlTree`], holding the descent stack of the
/// walk explicitly.
pub struct Iter<'a, P> {
    stack: Vec<&'a Node<P>>,
}

impl<'a, P: Deref> Iter<'a, P> {
    fn push_left_spine(&mut self, mut node: Option<&'a Node<P>>) {
        while let Some(current) = node {
            self.stack.push(current);
            node = current.left.as_deref();
        }
    }
}

impl<'a, P: Deref> Iterator for Iter<'a, P> {
    type Item = &'a P::Target;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_deref());
        Some(node.record())
    }
}
