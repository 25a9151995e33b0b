// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority ordering of grabs within one device class.

use super::GrabId;

/// One entry of a [`GrabStack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrabNode {
    /// The grab occupying this node.
    pub grab: GrabId,
    /// Higher priorities sit closer to the head.
    pub priority: i32,
}

/// Grabs of one device class, head first, by descending priority.
///
/// Among equal priorities the most recently pushed node is closest to the
/// head. The stack of a seat always ends in its default grab.
#[derive(Clone, Debug, Default)]
pub struct GrabStack {
    nodes: Vec<GrabNode>,
}

impl GrabStack {
    /// The grab receiving events.
    #[must_use]
    pub fn head(&self) -> Option<GrabId> {
        self.nodes.first().map(|n| n.grab)
    }

    /// Nodes, head first.
    #[must_use]
    pub fn nodes(&self) -> &[GrabNode] {
        &self.nodes
    }

    /// Returns whether `grab` has a node here.
    #[must_use]
    pub fn contains(&self, grab: GrabId) -> bool {
        self.nodes.iter().any(|n| n.grab == grab)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the stack has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a node before the first node of lower or equal priority.
    ///
    /// Returns `true` if the new node became the head.
    pub(crate) fn push(&mut self, grab: GrabId, priority: i32) -> bool {
        let at = self
            .nodes
            .iter()
            .position(|n| n.priority <= priority)
            .unwrap_or(self.nodes.len());
        self.nodes.insert(at, GrabNode { grab, priority });
        at == 0
    }

    /// Unlinks `grab`. Returns `Some(true)` if it was the head, `None` if it
    /// was not in the stack.
    pub(crate) fn remove(&mut self, grab: GrabId) -> Option<bool> {
        let at = self.nodes.iter().position(|n| n.grab == grab)?;
        self.nodes.remove(at);
        Some(at == 0)
    }
}
