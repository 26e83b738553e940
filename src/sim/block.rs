//! Block entity and same-rank merge detection
//!
//! Both members of a touching pair receive their own contact callback, in
//! either order and possibly more than once. Each side independently commits
//! itself to the merge; only the side with the greater `BlockId` executes it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Stable block identity, allocated monotonically by the session.
///
/// Doubles as the handle the host keys visuals and physics bodies by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// The thing a block touched, as reported by the physics collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    /// Container wall or floor (never mergeable)
    Surface,
    /// Another live block, sampled at contact time
    Block(Peer),
}

/// One side of a begin-contact report from the physics collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Block receiving the callback
    pub block: BlockId,
    /// Block it touched, or `None` for the container
    pub other: Option<BlockId>,
}

impl ContactEvent {
    pub fn new(block: BlockId, other: BlockId) -> Self {
        Self {
            block,
            other: Some(other),
        }
    }

    pub fn surface(block: BlockId) -> Self {
        Self { block, other: None }
    }

    /// Both callbacks of a block/block contact, `first` delivered first
    pub fn pair(first: BlockId, second: BlockId) -> [Self; 2] {
        [Self::new(first, second), Self::new(second, first)]
    }
}

/// Snapshot of the other block in a contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peer {
    pub id: BlockId,
    pub rank: u8,
    pub pos: Vec2,
    /// Partner the peer has already committed to, if any
    pub partner: Option<BlockId>,
}

/// Successor block the executing side asks the session to create
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeIntent {
    pub new_rank: u8,
    pub position: Vec2,
    pub score_award: u64,
}

/// Result of feeding one contact callback to a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactOutcome {
    /// Nothing to do beyond the `collided` flag
    Ignored,
    /// This block merges away; its partner spawns the successor
    Yield { partner: BlockId },
    /// This block merges away and spawns the successor
    Execute { partner: BlockId, intent: MergeIntent },
}

impl ContactOutcome {
    /// True if the block committed to a merge on this contact
    pub fn is_merge(&self) -> bool {
        !matches!(self, ContactOutcome::Ignored)
    }
}

/// One block in the container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub rank: u8,
    /// Container-space position, updated from the physics collaborator
    pub pos: Vec2,
    /// Set on first contact with anything; the height monitor ignores blocks until then
    pub collided: bool,
    /// Set once the block commits to a merge; it never merges again
    pub upscaling: bool,
    /// Block this one is merging with (its own commitment, or a peer's claim on it)
    pub partner: Option<BlockId>,
}

impl Block {
    pub fn new(id: BlockId, rank: u8, pos: Vec2) -> Self {
        Self {
            id,
            rank,
            pos,
            collided: false,
            upscaling: false,
            partner: None,
        }
    }

    /// Peer snapshot of this block for the other side of a contact
    pub fn as_peer(&self) -> Peer {
        Peer {
            id: self.id,
            rank: self.rank,
            pos: self.pos,
            partner: self.partner,
        }
    }

    /// Handle a begin-contact callback.
    ///
    /// `max_rank` blocks are terminal: they collide but never merge.
    pub fn on_contact(&mut self, other: &Contact, max_rank: u8) -> ContactOutcome {
        self.collided = true;

        if self.upscaling {
            return ContactOutcome::Ignored;
        }

        let Contact::Block(peer) = other else {
            return ContactOutcome::Ignored;
        };

        if peer.id == self.id || peer.rank == 0 || peer.rank != self.rank || self.rank >= max_rank {
            return ContactOutcome::Ignored;
        }

        // Either side already spoken for by a third block
        if peer.partner.is_some_and(|p| p != self.id) {
            return ContactOutcome::Ignored;
        }
        if self.partner.is_some_and(|p| p != peer.id) {
            return ContactOutcome::Ignored;
        }

        let position = merge_position(self.pos, peer.pos);
        self.upscaling = true;
        self.partner = Some(peer.id);

        if self.id > peer.id {
            ContactOutcome::Execute {
                partner: peer.id,
                intent: MergeIntent {
                    new_rank: self.rank + 1,
                    position,
                    score_award: self.rank as u64,
                },
            }
        } else {
            ContactOutcome::Yield { partner: peer.id }
        }
    }
}

/// The lower of the two positions, so the successor settles rather than floats.
/// Equal heights keep `self_pos`.
#[inline]
pub fn merge_position(self_pos: Vec2, other_pos: Vec2) -> Vec2 {
    if self_pos.y > other_pos.y {
        other_pos
    } else {
        self_pos
    }
}
