use log::warn;
use zenith_core::collections::hashmap::HashMap;
use crate::dependency::NodeId;

/// Per-frame registry of named resource nodes.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<String, NodeId>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. A name registered twice in one frame points at the latest node.
    pub fn insert(&mut self, name: &str, id: NodeId) {
        if let Some(previous) = self.entries.insert(name.to_owned(), id) {
            warn!("Resource[{name}] is registered twice in one frame, {previous} is shadowed by {id}!");
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.entries.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let mut blackboard = Blackboard::new();
        assert!(blackboard.is_empty());

        blackboard.insert("gbuffer.albedo", NodeId(0));
        blackboard.insert("gbuffer.normal", NodeId(1));

        assert_eq!(blackboard.get("gbuffer.albedo"), Some(NodeId(0)));
        assert_eq!(blackboard.get("gbuffer.depth"), None);
        assert!(blackboard.contains("gbuffer.normal"));
        assert_eq!(blackboard.len(), 2);
    }

    #[test]
    fn duplicate_name_points_at_latest() {
        let mut blackboard = Blackboard::new();
        blackboard.insert("history", NodeId(2));
        blackboard.insert("history", NodeId(5));

        assert_eq!(blackboard.get("history"), Some(NodeId(5)));
        assert_eq!(blackboard.len(), 1);
    }
}
