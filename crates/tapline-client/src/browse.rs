// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space browsing.
//!
//! Thin helpers over the transport's `browse_children` primitive:
//! one-level listing and a depth-bounded subtree walk. A browse
//! failure on an individual node is logged and that subtree is
//! skipped; one unreadable branch must not abort the whole walk.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::warn;

use tapline_core::error::TransportResult;
use tapline_core::types::NodeRef;

use crate::client::transport::Transport;

/// Hard cap on nodes visited by one tree walk.
const MAX_TREE_NODES: usize = 10_000;

// =============================================================================
// BrowseNode
// =============================================================================

/// One node in a browsed subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseNode {
    /// The node itself.
    pub node: NodeRef,

    /// Whether the node had children when visited. Nodes at the depth
    /// limit are not probed and report `false`.
    pub has_children: bool,

    /// Depth below the walk's root.
    pub depth: usize,

    /// Children, populated up to the depth limit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BrowseNode>,
}

impl BrowseNode {
    /// Counts the nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(BrowseNode::node_count).sum::<usize>()
    }

    /// Flattens the subtree into a preorder list of node refs.
    pub fn flatten(&self) -> Vec<NodeRef> {
        let mut out = vec![self.node.clone()];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

// =============================================================================
// Browse Operations
// =============================================================================

/// Lists the direct children of `node_id`, or of the root when `None`.
pub async fn children(
    transport: &dyn Transport,
    node_id: Option<&str>,
) -> TransportResult<Vec<NodeRef>> {
    let parent = resolve_start(transport, node_id).await?;
    transport.browse_children(parent.id()).await
}

/// Walks the subtree under `node_id` (or the root) to `max_depth`
/// levels below the start node.
///
/// Cycles are broken by tracking visited ids. The walk stops early
/// after visiting [`MAX_TREE_NODES`] nodes.
pub async fn tree(
    transport: &dyn Transport,
    node_id: Option<&str>,
    max_depth: usize,
) -> TransportResult<BrowseNode> {
    let start = resolve_start(transport, node_id).await?;
    let mut visited = HashSet::new();
    visited.insert(start.id().to_string());
    let mut budget = MAX_TREE_NODES;
    Ok(subtree(transport, start, 0, max_depth, &mut visited, &mut budget).await)
}

async fn resolve_start(
    transport: &dyn Transport,
    node_id: Option<&str>,
) -> TransportResult<NodeRef> {
    match node_id {
        Some(id) => transport.get_node(id).await,
        None => transport.get_root().await,
    }
}

fn subtree<'a>(
    transport: &'a dyn Transport,
    node: NodeRef,
    depth: usize,
    max_depth: usize,
    visited: &'a mut HashSet<String>,
    budget: &'a mut usize,
) -> Pin<Box<dyn Future<Output = BrowseNode> + Send + 'a>> {
    Box::pin(async move {
        let mut out = BrowseNode {
            node,
            has_children: false,
            depth,
            children: Vec::new(),
        };

        if depth >= max_depth {
            return out;
        }

        let found = match transport.browse_children(out.node.id()).await {
            Ok(found) => found,
            Err(e) => {
                warn!(node_id = %out.node.id(), error = %e, "browse failed, skipping subtree");
                return out;
            }
        };
        out.has_children = !found.is_empty();

        for child in found {
            if *budget == 0 {
                warn!(limit = MAX_TREE_NODES, "tree walk hit the node cap, truncating");
                break;
            }
            if !visited.insert(child.id().to_string()) {
                continue;
            }
            *budget -= 1;
            let sub = subtree(transport, child, depth + 1, max_depth, visited, budget).await;
            out.children.push(sub);
        }

        out
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sim::SimTransport;
    use tapline_core::types::TagValue;

    async fn plant() -> SimTransport {
        let transport = SimTransport::new("sim://plant");
        transport.add_node(None, "ns=2;s=Line1", "Line1", TagValue::Null);
        transport.add_node(
            Some("ns=2;s=Line1"),
            "ns=2;s=Line1.Temp",
            "Temp",
            TagValue::Float(20.0),
        );
        transport.add_node(
            Some("ns=2;s=Line1.Temp"),
            "ns=2;s=Line1.Temp.Units",
            "Units",
            TagValue::Str("C".to_string()),
        );
        transport.add_node(None, "ns=2;s=Line2", "Line2", TagValue::Null);
        transport.connect().await.unwrap();
        transport
    }

    #[tokio::test]
    async fn test_children_of_root() {
        let transport = plant().await;
        let roots = children(&transport, None).await.unwrap();
        let ids: Vec<&str> = roots.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["ns=2;s=Line1", "ns=2;s=Line2"]);
    }

    #[tokio::test]
    async fn test_children_of_named_node() {
        let transport = plant().await;
        let kids = children(&transport, Some("ns=2;s=Line1")).await.unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].browse_name(), Some("Temp"));
    }

    #[tokio::test]
    async fn test_children_unknown_node_errors() {
        let transport = plant().await;
        assert!(children(&transport, Some("ns=9;s=Nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_tree_respects_depth() {
        let transport = plant().await;

        let shallow = tree(&transport, None, 1).await.unwrap();
        assert_eq!(shallow.children.len(), 2);
        // Depth limit keeps grandchildren out.
        assert!(shallow.children.iter().all(|c| c.children.is_empty()));

        let deep = tree(&transport, None, 3).await.unwrap();
        // root + Line1 + Temp + Units + Line2
        assert_eq!(deep.node_count(), 5);
        let line1 = &deep.children[0];
        assert!(line1.has_children);
        assert_eq!(line1.children[0].children[0].node.browse_name(), Some("Units"));
    }

    #[tokio::test]
    async fn test_tree_from_inner_node() {
        let transport = plant().await;
        let sub = tree(&transport, Some("ns=2;s=Line1"), 5).await.unwrap();
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.depth, 0);
        assert_eq!(sub.children[0].depth, 1);
    }

    #[tokio::test]
    async fn test_flatten_preorder() {
        let transport = plant().await;
        let root = tree(&transport, None, 3).await.unwrap();
        let ids: Vec<String> = root.flatten().iter().map(|n| n.id().to_string()).collect();
        assert_eq!(ids[0], "root");
        assert_eq!(ids[1], "ns=2;s=Line1");
        assert_eq!(ids[2], "ns=2;s=Line1.Temp");
    }
}
