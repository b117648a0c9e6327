//! Causal ordering for document operations.
//!
//! Each operation carries the vector clock of the agent that produced it.
//! Documents keep the pointwise-max merge of every clock they've seen, so
//! concurrent edits from different agents can be detected instead of
//! silently last-write-wins.

use crate::ids::AgentId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorClock(HashMap<AgentId, u64>);

/// Causal relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    Equal,
    Before,
    After,
    /// Neither dominates the other — concurrent, conflicting edits.
    Concurrent,
}

impl VectorClock {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, agent: &AgentId) -> u64 {
        self.0.get(agent).copied().unwrap_or(0)
    }

    /// Advance this clock's entry for `agent` by one tick and return the new
    /// clock. Called by the document service when it stamps a fresh
    /// operation with the authoritative clock.
    pub fn incremented(&self, agent: &AgentId) -> Self {
        let mut next = self.0.clone();
        let entry = next.entry(agent.clone()).or_insert(0);
        *entry += 1;
        Self(next)
    }

    /// Pointwise maximum of two clocks, the standard vector-clock merge.
    pub fn merged(&self, other: &VectorClock) -> Self {
        let mut merged = self.0.clone();
        for (agent, &count) in &other.0 {
            let entry = merged.entry(agent.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        Self(merged)
    }

    pub fn order_against(&self, other: &VectorClock) -> CausalOrder {
        let mut self_ahead = false;
        let mut other_ahead = false;

        let mut agents: std::collections::HashSet<&AgentId> = self.0.keys().collect();
        agents.extend(other.0.keys());

        for agent in agents {
            match self.get(agent).cmp(&other.get(agent)) {
                Ordering::Greater => self_ahead = true,
                Ordering::Less => other_ahead = true,
                Ordering::Equal => {}
            }
        }

        match (self_ahead, other_ahead) {
            (false, false) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (true, true) => CausalOrder::Concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentId {
        AgentId::from(name)
    }

    #[test]
    fn incrementing_advances_only_the_caller_entry() {
        let a = agent("alice");
        let b = agent("bob");
        let clock = VectorClock::new().incremented(&a);
        assert_eq!(clock.get(&a), 1);
        assert_eq!(clock.get(&b), 0);
    }

    #[test]
    fn merge_takes_pointwise_max() {
        let a = agent("alice");
        let b = agent("bob");
        let mut left = VectorClock::new();
        left = left.incremented(&a);
        left = left.incremented(&a);
        let mut right = VectorClock::new();
        right = right.incremented(&b);

        let merged = left.merged(&right);
        assert_eq!(merged.get(&a), 2);
        assert_eq!(merged.get(&b), 1);
    }

    #[test]
    fn concurrent_clocks_are_detected() {
        let a = agent("alice");
        let b = agent("bob");
        let left = VectorClock::new().incremented(&a);
        let right = VectorClock::new().incremented(&b);
        assert_eq!(left.order_against(&right), CausalOrder::Concurrent);
    }

    #[test]
    fn a_clock_after_incrementing_dominates_its_ancestor() {
        let a = agent("alice");
        let ancestor = VectorClock::new().incremented(&a);
        let descendant = ancestor.incremented(&a);
        assert_eq!(descendant.order_against(&ancestor), CausalOrder::After);
        assert_eq!(ancestor.order_against(&descendant), CausalOrder::Before);
    }

    #[test]
    fn identical_clocks_are_equal() {
        let a = agent("alice");
        let left = VectorClock::new().incremented(&a);
        let right = left.clone();
        assert_eq!(left.order_against(&right), CausalOrder::Equal);
    }
}
