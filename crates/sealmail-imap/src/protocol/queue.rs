//! Command queue with O(1) splicing and removal by id.
//!
//! A doubly linked list whose links are command ids, stored in a map. Commands
//! are appended at the back, spliced in front of a context command (so a
//! precheck's side command runs right before the command that needed it), and
//! removed by id when a precheck fails.

use std::collections::HashMap;
use std::fmt;

/// Identifier of a queued command, unique per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<CommandId>,
    next: Option<CommandId>,
}

/// Ordered command queue.
#[derive(Debug)]
pub struct CommandQueue<T> {
    nodes: HashMap<CommandId, Node<T>>,
    head: Option<CommandId>,
    tail: Option<CommandId>,
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            tail: None,
        }
    }
}

impl<T> CommandQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if the id is still queued.
    #[must_use]
    pub fn contains(&self, id: CommandId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns a queued command.
    #[must_use]
    pub fn get(&self, id: CommandId) -> Option<&T> {
        self.nodes.get(&id).map(|n| &n.value)
    }

    /// Returns a queued command mutably.
    pub fn get_mut(&mut self, id: CommandId) -> Option<&mut T> {
        self.nodes.get_mut(&id).map(|n| &mut n.value)
    }

    /// Id of the first command.
    #[must_use]
    pub const fn front_id(&self) -> Option<CommandId> {
        self.head
    }

    /// Appends a command.
    pub fn push_back(&mut self, id: CommandId, value: T) {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };
        match self.tail.and_then(|t| self.nodes.get_mut(&t)) {
            Some(tail) => tail.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.nodes.insert(id, node);
    }

    /// Inserts a command right before `before`.
    ///
    /// Returns the value back if `before` is not queued.
    pub fn insert_before(&mut self, before: CommandId, id: CommandId, value: T) -> Result<(), T> {
        let Some(prev) = self.nodes.get(&before).map(|n| n.prev) else {
            return Err(value);
        };
        match prev.and_then(|p| self.nodes.get_mut(&p)) {
            Some(p) => p.next = Some(id),
            None => self.head = Some(id),
        }
        if let Some(b) = self.nodes.get_mut(&before) {
            b.prev = Some(id);
        }
        self.nodes.insert(
            id,
            Node {
                value,
                prev,
                next: Some(before),
            },
        );
        Ok(())
    }

    /// Removes a command by id.
    pub fn remove(&mut self, id: CommandId) -> Option<T> {
        let node = self.nodes.remove(&id)?;
        match node.prev.and_then(|p| self.nodes.get_mut(&p)) {
            Some(p) => p.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.nodes.get_mut(&n)) {
            Some(n) => n.prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node.value)
    }

    /// Removes the first command.
    pub fn pop_front(&mut self) -> Option<T> {
        self.head.and_then(|id| self.remove(id))
    }

    /// Iterates from front to back.
    pub fn iter(&self) -> impl Iterator<Item = (CommandId, &T)> {
        std::iter::successors(self.head, |id| self.nodes.get(id).and_then(|n| n.next))
            .filter_map(|id| self.nodes.get(&id).map(|n| (id, &n.value)))
    }

    /// Iterates backward, starting right before `from` (exclusive), or from
    /// the back when `from` is `None` or no longer queued.
    pub fn iter_back_from(&self, from: Option<CommandId>) -> impl Iterator<Item = (CommandId, &T)> {
        let start = match from.and_then(|id| self.nodes.get(&id)) {
            Some(node) => node.prev,
            None => self.tail,
        };
        std::iter::successors(start, |id| self.nodes.get(id).and_then(|n| n.prev))
            .filter_map(|id| self.nodes.get(&id).map(|n| (id, &n.value)))
    }

    /// Removes everything, front to back.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(value) = self.pop_front() {
            out.push(value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(queue: &CommandQueue<&'static str>) -> Vec<&'static str> {
        queue.iter().map(|(_, v)| *v).collect()
    }

    fn id(n: u64) -> CommandId {
        CommandId(n)
    }

    #[test]
    fn test_fifo() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        queue.push_back(id(2), "B");
        queue.push_back(id(3), "C");
        assert_eq!(order(&queue), ["A", "B", "C"]);
        assert_eq!(queue.pop_front(), Some("A"));
        assert_eq!(queue.front_id(), Some(id(2)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_insert_before_head() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        queue.push_back(id(2), "B");
        assert!(queue.insert_before(id(1), id(3), "C").is_ok());
        assert_eq!(order(&queue), ["C", "A", "B"]);
        assert_eq!(queue.front_id(), Some(id(3)));
    }

    #[test]
    fn test_insert_before_middle() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        queue.push_back(id(2), "B");
        assert!(queue.insert_before(id(2), id(3), "C").is_ok());
        assert_eq!(order(&queue), ["A", "C", "B"]);
        let back: Vec<_> = queue.iter_back_from(None).map(|(_, v)| *v).collect();
        assert_eq!(back, ["B", "C", "A"]);
    }

    #[test]
    fn test_insert_before_missing() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        assert_eq!(queue.insert_before(id(9), id(2), "B"), Err("B"));
        assert_eq!(order(&queue), ["A"]);
    }

    #[test]
    fn test_remove_relinks() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        queue.push_back(id(2), "B");
        queue.push_back(id(3), "C");
        assert_eq!(queue.remove(id(2)), Some("B"));
        assert_eq!(order(&queue), ["A", "C"]);
        assert_eq!(queue.remove(id(3)), Some("C"));
        queue.push_back(id(4), "D");
        assert_eq!(order(&queue), ["A", "D"]);
        assert_eq!(queue.remove(id(2)), None);
    }

    #[test]
    fn test_iter_back_from() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        queue.push_back(id(2), "B");
        queue.push_back(id(3), "C");
        let back: Vec<_> = queue.iter_back_from(Some(id(3))).map(|(_, v)| *v).collect();
        assert_eq!(back, ["B", "A"]);
        let back: Vec<_> = queue.iter_back_from(Some(id(1))).map(|(_, v)| *v).collect();
        assert!(back.is_empty());
    }

    #[test]
    fn test_drain() {
        let mut queue = CommandQueue::new();
        queue.push_back(id(1), "A");
        queue.push_back(id(2), "B");
        assert_eq!(queue.drain(), ["A", "B"]);
        assert!(queue.is_empty());
        assert_eq!(queue.front_id(), None);
    }
}
