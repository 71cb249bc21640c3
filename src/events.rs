//! Overworld event queue
//!
//! Things that happened during a frame (a trainer spotting the player, an NPC
//! finishing a route, a leap landing) are pushed here by the simulation and
//! read by whoever drives it: dialogue, battle transitions, debug overlays.
//!
//! The queue is double-buffered: events pushed during frame N are readable
//! after the `swap()` at the start of frame N+1, so readers never observe a
//! half-written frame.

use std::collections::VecDeque;

use hecs::Entity;

use crate::nav::GridPosition;

// ============================================================================
// Event Types
// ============================================================================

/// Something that happened in the overworld.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum OverworldEvent {
    /// A trainer saw the player. Fires once per trainer until re-armed.
    TrainerSpotted {
        /// The trainer
        trainer: Entity,
        /// Trainer's NPC id
        id: String,
        /// Player tile at the time
        player_tile: GridPosition,
    },

    /// An NPC reached the end of its route.
    RouteFinished {
        entity: Entity,
        tile: GridPosition,
    },

    /// An NPC could not get past a blocked tile and dropped its route.
    GaveUp {
        entity: Entity,
        goal: GridPosition,
    },

    /// An entity landed after a ledge jump.
    Landed {
        entity: Entity,
        tile: GridPosition,
    },

    /// The collision grid changed and cached paths were dropped.
    GridChanged,
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered event queue for frame-consistent event processing.
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this frame
    pending: VecDeque<OverworldEvent>,
    /// Events from previous frame, ready for processing
    processing: VecDeque<OverworldEvent>,
}

impl EventQueue {
    const DEFAULT_CAPACITY: usize = 32;

    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
            processing: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
        }
    }

    /// Push an event to be read next frame.
    #[inline]
    pub fn push(&mut self, event: OverworldEvent) {
        self.pending.push_back(event);
    }

    /// Make this frame's events readable and start a fresh pending buffer.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Iterate over events from the previous frame.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &OverworldEvent> {
        self.processing.iter()
    }

    /// Take ownership of the previous frame's events.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = OverworldEvent> + '_ {
        self.processing.drain(..)
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Clear both buffers, e.g. when switching areas.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
