//! Sensor registry
//!
//! Unbalanced binary search tree of sensors ordered by key (byte-wise
//! lexical), stored in an arena and linked by index. Nodes are never
//! removed; the number of sensors in radio range is small, so no
//! rebalancing is done.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Index of a node in the registry's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct SensorNode {
    key: String,
    alias: Option<String>,
    /// Time of the last reading actually stored for this sensor
    pub last_recorded: DateTime<Utc>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl SensorNode {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            alias: None,
            last_recorded: DateTime::<Utc>::UNIX_EPOCH,
            left: None,
            right: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

#[derive(Debug, Default)]
pub struct SensorTree {
    nodes: Vec<SensorNode>,
    root: Option<NodeId>,
}

impl SensorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up `key`, inserting a fresh node (no alias, epoch timestamp) when
    /// it is missing and `create` is set.
    pub fn find(&mut self, key: &str, create: bool) -> Option<NodeId> {
        if create {
            Some(self.find_or_create(key))
        } else {
            self.lookup(key)
        }
    }

    /// Find without inserting
    pub fn get(&self, key: &str) -> Option<&SensorNode> {
        self.lookup(key).map(|id| self.node(id))
    }

    /// Attach a display alias to `key`, creating the node if needed.
    ///
    /// A later call for the same key replaces the alias.
    pub fn bootstrap_alias(&mut self, key: &str, alias: &str) -> NodeId {
        let id = self.find_or_create(key);
        let node = &mut self.nodes[id.0];
        if let Some(previous) = node.alias.replace(alias.to_string()) {
            log::debug!("Alias for {} changed from '{}' to '{}'", key, previous, alias);
        }
        id
    }

    fn lookup(&self, key: &str) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            current = match key.as_bytes().cmp(node.key.as_bytes()) {
                Ordering::Equal => return Some(id),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }

    /// Look up `key`, inserting it when missing
    pub fn find_or_create(&mut self, key: &str) -> NodeId {
        let Some(mut current) = self.root else {
            let id = self.push(key);
            self.root = Some(id);
            return id;
        };

        loop {
            let node = &self.nodes[current.0];
            let ordering = key.as_bytes().cmp(node.key.as_bytes());
            let next = match ordering {
                Ordering::Equal => return current,
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
            if let Some(child) = next {
                current = child;
                continue;
            }

            let id = self.push(key);
            let parent = &mut self.nodes[current.0];
            if ordering == Ordering::Less {
                parent.left = Some(id);
            } else {
                parent.right = Some(id);
            }
            return id;
        }
    }

    pub fn node(&self, id: NodeId) -> &SensorNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SensorNode {
        &mut self.nodes[id.0]
    }

    /// In-order walk; each call starts a new walk from the smallest key
    pub fn iter(&self) -> InOrder<'_> {
        let mut walk = InOrder {
            tree: self,
            stack: Vec::new(),
        };
        walk.push_left(self.root);
        walk
    }

    /// Log every sensor in key order
    pub fn log_sensors(&self, header: &str) {
        log::debug!("{} ({} sensors)", header, self.len());
        for node in self.iter() {
            match node.alias() {
                Some(alias) => log::debug!("   sensorID {:<30} aliased as '{}'", node.key(), alias),
                None => log::debug!("   sensorID {}", node.key()),
            }
        }
    }

    fn push(&mut self, key: &str) -> NodeId {
        log::trace!("New sensor node for '{}'", key);
        self.nodes.push(SensorNode::new(key));
        NodeId(self.nodes.len() - 1)
    }
}

pub struct InOrder<'a> {
    tree: &'a SensorTree,
    stack: Vec<NodeId>,
}

impl<'a> InOrder<'a> {
    fn push_left(&mut self, mut current: Option<NodeId>) {
        while let Some(id) = current {
            self.stack.push(id);
            current = self.tree.nodes[id.0].left;
        }
    }
}

impl<'a> Iterator for InOrder<'a> {
    type Item = &'a SensorNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.push_left(node.right);
        Some(node)
    }
}
