use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

use super::MemoCache;

/// One level of the [`ArgsMap`] trie.
///
/// `order` remembers the insertion order of `children`, which a [`HashMap`] alone does not.
struct Node<P, V> {
    value: Option<V>,
    children: HashMap<P, Node<P, V>>,
    order: Vec<P>,
}

impl<P, V> Node<P, V> {
    fn new() -> Self {
        Self {
            value: None,
            children: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}

impl<P: Hash + Eq + Clone, V> Node<P, V> {
    fn child_or_insert(&mut self, part: &P) -> &mut Node<P, V> {
        match self.children.entry(part.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(part.clone());
                entry.insert(Node::new())
            }
        }
    }

    /// Removes the value at `key` below this node, pruning levels that end up empty.
    fn remove(&mut self, key: &[P]) -> Option<V> {
        let Some((part, rest)) = key.split_first() else {
            return self.value.take();
        };

        let child = self.children.get_mut(part)?;
        let removed = child.remove(rest)?;
        if child.is_empty() {
            self.children.remove(part);
            self.order.retain(|p| p != part);
        }
        Some(removed)
    }
}

/// A map keyed by a sequence of arguments.
///
/// Every element of the key sequence descends one level into a nested map, and the value is
/// stored in a terminal slot at the last level. Two keys address the same entry if they have the
/// same length and all elements compare equal. This makes lookups cost proportional to the number
/// of arguments, regardless of how many entries are stored.
///
/// The empty key is valid and addresses the slot at the root.
///
/// Use [`ArgKey`](super::ArgKey) as the element type to mix arguments of different types in one
/// key.
pub struct ArgsMap<P, V> {
    root: Node<P, V>,
    len: usize,
}

impl<P, V> ArgsMap<P, V> {
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            len: 0,
        }
    }

    /// The number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.root = Node::new();
        self.len = 0;
    }
}

impl<P: Hash + Eq + Clone, V> ArgsMap<P, V> {
    fn node(&self, key: &[P]) -> Option<&Node<P, V>> {
        let mut node = &self.root;
        for part in key {
            node = node.children.get(part)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, key: &[P]) -> Option<&mut Node<P, V>> {
        let mut node = &mut self.root;
        for part in key {
            node = node.children.get_mut(part)?;
        }
        Some(node)
    }

    /// Stores `value` for `key`, returning the previous value.
    pub fn set(&mut self, key: &[P], value: V) -> Option<V> {
        let mut node = &mut self.root;
        for part in key {
            node = node.child_or_insert(part);
        }

        let previous = node.value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Stores `value` for `key` and returns a reference to the stored value.
    pub fn set_return_value(&mut self, key: &[P], value: V) -> &V {
        let mut node = &mut self.root;
        for part in key {
            node = node.child_or_insert(part);
        }

        if node.value.is_none() {
            self.len += 1;
        }
        node.value.insert(value)
    }

    pub fn get(&self, key: &[P]) -> Option<&V> {
        self.node(key)?.value.as_ref()
    }

    pub fn get_mut(&mut self, key: &[P]) -> Option<&mut V> {
        self.node_mut(key)?.value.as_mut()
    }

    pub fn has(&self, key: &[P]) -> bool {
        self.get(key).is_some()
    }

    /// Removes the entry for `key` and returns its value.
    ///
    /// Intermediate levels that no longer lead to any entry are dropped as well, so one-off keys
    /// do not leave garbage behind.
    pub fn remove(&mut self, key: &[P]) -> Option<V> {
        let removed = self.root.remove(key);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Removes the entry for `key`, returning whether there was one.
    pub fn delete(&mut self, key: &[P]) -> bool {
        self.remove(key).is_some()
    }

    /// Iterates over all entries, depth first.
    ///
    /// At each level, the entry ending there comes first, followed by the entries below in the
    /// order their argument was first inserted at that level. Every yielded key is a fresh
    /// vector.
    pub fn iter(&self) -> Iter<'_, P, V> {
        Iter {
            stack: vec![Frame::new(&self.root)],
            path: Vec::new(),
            remaining: self.len,
        }
    }

    /// Alias of [`iter`](Self::iter).
    pub fn entries(&self) -> Iter<'_, P, V> {
        self.iter()
    }

    /// Iterates over all stored values, in the same order as [`iter`](Self::iter).
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<P, V> Default for ArgsMap<P, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, V> fmt::Debug for ArgsMap<P, V>
where
    P: Hash + Eq + Clone + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<P: Hash + Eq + Clone, V> MemoCache<[P], V> for ArgsMap<P, V> {
    fn get(&self, key: &[P]) -> Option<&V> {
        ArgsMap::get(self, key)
    }

    fn has(&self, key: &[P]) -> bool {
        ArgsMap::has(self, key)
    }

    fn set(&mut self, key: &[P], value: V) {
        ArgsMap::set(self, key, value);
    }

    fn delete(&mut self, key: &[P]) -> bool {
        ArgsMap::delete(self, key)
    }

    fn clear(&mut self) {
        ArgsMap::clear(self)
    }
}

impl<P: Hash + Eq + Clone, V> Extend<(Vec<P>, V)> for ArgsMap<P, V> {
    fn extend<I: IntoIterator<Item = (Vec<P>, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(&key, value);
        }
    }
}

impl<P: Hash + Eq + Clone, V> FromIterator<(Vec<P>, V)> for ArgsMap<P, V> {
    fn from_iter<I: IntoIterator<Item = (Vec<P>, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, P: Hash + Eq + Clone, V> IntoIterator for &'a ArgsMap<P, V> {
    type Item = (Vec<P>, &'a V);
    type IntoIter = Iter<'a, P, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Frame<'a, P, V> {
    node: &'a Node<P, V>,
    /// Index into `node.order` of the next child to descend into.
    next_child: usize,
    /// Whether the value of `node` itself was already considered.
    visited: bool,
}

impl<'a, P, V> Frame<'a, P, V> {
    fn new(node: &'a Node<P, V>) -> Self {
        Self {
            node,
            next_child: 0,
            visited: false,
        }
    }
}

/// Depth first iterator over the entries of an [`ArgsMap`].
///
/// Created by [`ArgsMap::iter`].
pub struct Iter<'a, P, V> {
    stack: Vec<Frame<'a, P, V>>,
    /// The key parts leading to the top of `stack`.
    path: Vec<P>,
    remaining: usize,
}

impl<'a, P: Hash + Eq + Clone, V> Iterator for Iter<'a, P, V> {
    type Item = (Vec<P>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;

            if !frame.visited {
                frame.visited = true;
                if let Some(value) = &node.value {
                    self.remaining -= 1;
                    return Some((self.path.clone(), value));
                }
            }

            match node.order.get(frame.next_child) {
                Some(part) => {
                    frame.next_child += 1;
                    if let Some(child) = node.children.get(part) {
                        self.path.push(part.clone());
                        self.stack.push(Frame::new(child));
                    }
                }
                None => {
                    self.stack.pop();
                    self.path.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
