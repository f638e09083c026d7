use std::collections::HashSet;
use std::fmt;

use vigil_cluster::NodeId;

/// Which nodes a sweep recovers work for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SweepTarget {
    /// One departed node.
    SingleNode(NodeId),

    /// Every node absent from a live-member snapshot.
    AllExcept(HashSet<NodeId>),
}

impl SweepTarget {
    /// Whether work owned by `node_id` falls under this sweep.
    #[must_use]
    pub fn covers(&self, node_id: &NodeId) -> bool {
        match self {
            Self::SingleNode(target) => target == node_id,
            Self::AllExcept(live) => !live.contains(node_id),
        }
    }
}

impl fmt::Display for SweepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleNode(node_id) => write!(f, "node {node_id}"),
            Self::AllExcept(live) => {
                let mut live: Vec<&str> = live.iter().map(NodeId::as_str).collect();
                live.sort_unstable();
                write!(f, "all nodes except [{}]", live.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers() {
        let a = NodeId::from("a");
        let b = NodeId::from("b");

        assert!(SweepTarget::SingleNode(b.clone()).covers(&b));
        assert!(!SweepTarget::SingleNode(b.clone()).covers(&a));

        let live = SweepTarget::AllExcept(HashSet::from([a.clone()]));
        assert!(live.covers(&b));
        assert!(!live.covers(&a));
    }

    #[test]
    fn test_display_is_stable() {
        let target = SweepTarget::AllExcept(HashSet::from([NodeId::from("c"), NodeId::from("a")]));
        assert_eq!(target.to_string(), "all nodes except [a, c]");
    }
}
