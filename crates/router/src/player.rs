//! Player to owning node directory for one service kind

use std::collections::HashMap;

use switchyard_node_id::NodeId;

/// Maps player ids to the node currently serving them
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: HashMap<u32, NodeId>,
}

impl PlayerDirectory {
    /// Sets the owning node, or clears the entry when `node_id` is none
    pub fn set_player_service(&mut self, player_id: u32, node_id: NodeId) {
        if node_id.is_none() {
            self.players.remove(&player_id);
        } else {
            self.players.insert(player_id, node_id);
        }
    }

    /// Owning node, or [`NodeId::NONE`] when unknown
    #[must_use]
    pub fn find_player_sid(&self, player_id: u32) -> NodeId {
        self.players.get(&player_id).copied().unwrap_or(NodeId::NONE)
    }

    /// Drops every player owned by `node_id`, returning how many were removed
    pub fn clean_sid(&mut self, node_id: NodeId) -> usize {
        let before = self.players.len();
        self.players.retain(|_, owner| *owner != node_id);
        before - self.players.len()
    }

    /// Number of mapped players
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no player is mapped
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_migrate_logout() {
        let mut players = PlayerDirectory::default();
        let a = NodeId::build(0, 4, 1);
        let b = NodeId::build(0, 4, 2);

        players.set_player_service(100, a);
        assert_eq!(players.find_player_sid(100), a);

        players.set_player_service(100, b);
        assert_eq!(players.find_player_sid(100), b);

        players.set_player_service(100, NodeId::NONE);
        assert_eq!(players.find_player_sid(100), NodeId::NONE);
        assert!(players.is_empty());
    }

    #[test]
    fn test_clean_sid_only_touches_owner() {
        let mut players = PlayerDirectory::default();
        let a = NodeId::build(0, 4, 1);
        let b = NodeId::build(0, 4, 2);
        players.set_player_service(1, a);
        players.set_player_service(2, a);
        players.set_player_service(3, b);

        assert_eq!(players.clean_sid(a), 2);
        assert_eq!(players.find_player_sid(1), NodeId::NONE);
        assert_eq!(players.find_player_sid(3), b);
        assert_eq!(players.len(), 1);
    }
}
