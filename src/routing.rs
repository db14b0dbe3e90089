use crate::error::{Error, Result};
use crate::node::node_data::{NodeData, NodeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

/// The static ring topology: every configured node, its address, and its fixed successor.
///
/// The successor map is a single cycle covering all nodes, so following successors from any node
/// visits every other node exactly once before returning to it.
#[derive(Clone, Debug)]
pub struct Ring {
    addrs: BTreeMap<NodeId, SocketAddr>,
    successors: HashMap<NodeId, NodeId>,
}

impl Ring {
    /// Constructs a new `Ring`, validating that `successors` is a total function over the nodes in
    /// `addrs` that forms exactly one cycle.
    pub fn new(
        addrs: BTreeMap<NodeId, SocketAddr>,
        successors: HashMap<NodeId, NodeId>,
    ) -> Result<Self> {
        let start = match addrs.keys().next() {
            Some(id) => id.clone(),
            None => return Err(Error::InvalidConfig("ring has no nodes".to_string())),
        };
        for id in addrs.keys() {
            match successors.get(id) {
                Some(next) if addrs.contains_key(next) => {},
                Some(next) => {
                    return Err(Error::InvalidConfig(format!(
                        "successor {} of node {} is not a ring member",
                        next, id
                    )))
                },
                None => {
                    return Err(Error::InvalidConfig(format!("node {} has no successor", id)))
                },
            }
        }
        if let Some(stray) = successors.keys().find(|id| !addrs.contains_key(*id)) {
            return Err(Error::InvalidConfig(format!(
                "successor entry for unknown node {}",
                stray
            )));
        }

        // a single cycle returns to the start after exactly `len` hops and not before
        let mut curr = start.clone();
        for hop in 1..=addrs.len() {
            curr = successors[&curr].clone();
            if curr == start && hop != addrs.len() {
                return Err(Error::InvalidConfig(format!(
                    "successor map splits the ring: node {} cycles after {} of {} nodes",
                    start,
                    hop,
                    addrs.len()
                )));
            }
        }
        if curr != start {
            return Err(Error::InvalidConfig(
                "successor map does not form a cycle".to_string(),
            ));
        }

        Ok(Ring { addrs, successors })
    }

    /// Returns the number of nodes in the ring.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn successor(&self, id: &NodeId) -> Option<&NodeId> {
        self.successors.get(id)
    }

    /// Returns the `NodeData` of `id`, or `UnknownNode` if it is not a ring member.
    pub fn node_data(&self, id: &NodeId) -> Result<NodeData> {
        match self.addrs.get(id) {
            Some(addr) => Ok(NodeData {
                id: id.clone(),
                addr: *addr,
            }),
            None => Err(Error::UnknownNode(id.to_string())),
        }
    }
}

/// Finds reachable peers by walking the successor chain of a single node.
#[derive(Clone, Debug)]
pub struct Navigator {
    local: NodeId,
    ring: Arc<Ring>,
}

impl Navigator {
    pub fn new(local: NodeId, ring: Arc<Ring>) -> Self {
        Navigator { local, ring }
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Returns the first peer after the local node, in successor order, that is not in
    /// `excluding` and for which `is_reachable` returns `true`.
    ///
    /// At most `ring size - 1` candidates are visited and the local node is never returned, so
    /// every caller that extends `excluding` with each returned peer terminates after one ring
    /// traversal.
    pub fn next_live<F>(&self, excluding: &HashSet<NodeId>, mut is_reachable: F) -> Option<NodeData>
    where
        F: FnMut(&NodeData) -> bool,
    {
        let mut candidate = self.ring.successor(&self.local)?.clone();
        for _ in 1..self.ring.len() {
            if candidate != self.local && !excluding.contains(&candidate) {
                if let Ok(node_data) = self.ring.node_data(&candidate) {
                    if is_reachable(&node_data) {
                        return Some(node_data);
                    }
                    debug!("{} - Skipping unreachable peer {:?}", self.local, node_data);
                }
            }
            candidate = self.ring.successor(&candidate)?.clone();
        }
        None
    }
}
