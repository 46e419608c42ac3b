//! Merging per-suffix histories into one application order.
//!
//! Each suffix contributes a chain of unapplied anchors, oldest first. An
//! anchor touching several suffixes appears in several chains and must be
//! applied after every predecessor in each of them. The merge is a stable
//! topological sort: among anchors that are ready, the one seen first wins.

use std::collections::{BTreeSet, HashMap};

use tether_graph::AnchorNode;
use tether_types::ContentAddress;

use crate::error::{ObserverError, ObserverResult};

/// An anchor to apply, with the suffixes it still needs to be applied for.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedAnchor {
    pub node: AnchorNode,
    pub suffixes: Vec<String>,
}

/// Merge `(suffix, chain)` pairs into a single ordered plan.
pub fn merge_histories(chains: Vec<(String, Vec<AnchorNode>)>) -> ObserverResult<Vec<PlannedAnchor>> {
    let mut slots: HashMap<ContentAddress, usize> = HashMap::new();
    let mut planned: Vec<PlannedAnchor> = Vec::new();
    let mut successors: Vec<Vec<usize>> = Vec::new();
    let mut in_degree: Vec<usize> = Vec::new();

    for (suffix, chain) in chains {
        let mut previous: Option<usize> = None;
        for node in chain {
            let slot = match slots.get(&node.address) {
                Some(&slot) => slot,
                None => {
                    let slot = planned.len();
                    slots.insert(node.address.clone(), slot);
                    planned.push(PlannedAnchor {
                        node,
                        suffixes: Vec::new(),
                    });
                    successors.push(Vec::new());
                    in_degree.push(0);
                    slot
                }
            };
            if !planned[slot].suffixes.contains(&suffix) {
                planned[slot].suffixes.push(suffix.clone());
            }
            if let Some(prev) = previous {
                if !successors[prev].contains(&slot) {
                    successors[prev].push(slot);
                    in_degree[slot] += 1;
                }
            }
            previous = Some(slot);
        }
    }

    let mut ready: BTreeSet<usize> = (0..planned.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(planned.len());
    while let Some(slot) = ready.pop_first() {
        order.push(slot);
        for &next in &successors[slot] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() != planned.len() {
        let stuck = (0..planned.len())
            .find(|&i| in_degree[i] > 0)
            .map(|i| planned[i].node.address.clone())
            .unwrap_or_else(|| planned[0].node.address.clone());
        return Err(ObserverError::HistoryCycle(stuck));
    }

    let mut slots: Vec<Option<PlannedAnchor>> = planned.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
