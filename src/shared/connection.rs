//! # Connections
//!
//! Cursor-paginated, ordered edge lists as cached for list screens. The
//! helpers here keep a cached connection consistent after a local change:
//! removing nodes, inserting new ones in order and re-sorting after a sort
//! key changed.
//!
//! Every operation is total. A node id appears at most once, and when a
//! comparator is used the edges stay ordered by it. `page_info` is never
//! touched here; loading further pages merges separately.
//!
//! ```rust
//! use progress_sync::shared::connection::{Connection, Node, Placement};
//!
//! #[derive(Clone)]
//! struct Item { id: String, rank: i64 }
//!
//! impl Node for Item {
//!     fn id(&self) -> &str { &self.id }
//! }
//!
//! let mut connection: Connection<Item, i64> = Connection::new();
//! connection.splice(&[], vec![Item { id: "a".into(), rank: 3 }], |i| i.rank, Placement::Descending);
//! connection.splice(&[], vec![Item { id: "b".into(), rank: 5 }], |i| i.rank, Placement::Descending);
//! assert_eq!(connection.node_ids(), vec!["b", "a"]);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Anything that can live in a connection
pub trait Node {
    fn id(&self) -> &str;
}

/// One edge of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<N, C> {
    pub cursor: C,
    pub node: N,
}

/// Pagination state of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo<C> {
    pub end_cursor: Option<C>,
    pub has_next_page: bool,
}

impl<C> Default for PageInfo<C> {
    fn default() -> Self {
        Self {
            end_cursor: None,
            has_next_page: false,
        }
    }
}

/// Cursor-paginated edge list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<N, C> {
    pub edges: Vec<Edge<N, C>>,
    pub page_info: PageInfo<C>,
}

impl<N, C> Default for Connection<N, C> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

/// Where spliced nodes go
pub enum Placement<'a, N> {
    /// Sorted by cursor, largest first
    Descending,
    /// Sorted by cursor, smallest first
    Ascending,
    /// Sorted by a node comparator
    SortedBy(&'a dyn Fn(&N, &N) -> Ordering),
    /// Before all existing edges, in the given order
    Prepend,
    /// After all existing edges, in the given order
    Append,
}

impl<N: Node, C: Ord> Connection<N, C> {
    /// Create an empty connection
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `ids_to_remove` and insert `items_to_add`
    ///
    /// Absent ids are ignored. An added node whose id is already present
    /// replaces the existing edge; duplicates within `items_to_add` keep the
    /// last occurrence.
    pub fn splice<F>(
        &mut self,
        ids_to_remove: &[&str],
        items_to_add: Vec<N>,
        cursor_of: F,
        placement: Placement<'_, N>,
    ) where
        F: Fn(&N) -> C,
    {
        let mut incoming: Vec<N> = Vec::with_capacity(items_to_add.len());
        for item in items_to_add {
            incoming.retain(|existing| existing.id() != item.id());
            incoming.push(item);
        }

        let removed: HashSet<String> = ids_to_remove
            .iter()
            .map(|id| id.to_string())
            .chain(incoming.iter().map(|node| node.id().to_string()))
            .collect();
        if !removed.is_empty() {
            self.edges.retain(|edge| !removed.contains(edge.node.id()));
        }

        let new_edges = incoming.into_iter().map(|node| Edge {
            cursor: cursor_of(&node),
            node,
        });

        match placement {
            Placement::Prepend => {
                let mut edges: Vec<Edge<N, C>> = new_edges.collect();
                edges.append(&mut self.edges);
                self.edges = edges;
            }
            Placement::Append => self.edges.extend(new_edges),
            Placement::Descending => {
                for edge in new_edges {
                    insert_sorted(&mut self.edges, edge, |lhs, rhs| rhs.cursor.cmp(&lhs.cursor));
                }
            }
            Placement::Ascending => {
                for edge in new_edges {
                    insert_sorted(&mut self.edges, edge, |lhs, rhs| lhs.cursor.cmp(&rhs.cursor));
                }
            }
            Placement::SortedBy(compare) => {
                for edge in new_edges {
                    insert_sorted(&mut self.edges, edge, |lhs, rhs| compare(&lhs.node, &rhs.node));
                }
            }
        }
    }

    /// Re-sort after a sort key changed, recomputing every cursor
    pub fn sort<F, K>(&mut self, cursor_of: F, compare: K)
    where
        F: Fn(&N) -> C,
        K: Fn(&N, &N) -> Ordering,
    {
        self.edges.sort_by(|lhs, rhs| compare(&lhs.node, &rhs.node));
        for edge in &mut self.edges {
            edge.cursor = cursor_of(&edge.node);
        }
    }

    /// Recompute every cursor and re-sort descending by it
    pub fn sort_descending<F>(&mut self, cursor_of: F)
    where
        F: Fn(&N) -> C,
    {
        for edge in &mut self.edges {
            edge.cursor = cursor_of(&edge.node);
        }
        self.edges.sort_by(|lhs, rhs| rhs.cursor.cmp(&lhs.cursor));
    }

    /// Node ids in edge order
    pub fn node_ids(&self) -> Vec<&str> {
        self.edges.iter().map(|edge| edge.node.id()).collect()
    }

    /// Whether a node with this id is present
    pub fn contains(&self, id: &str) -> bool {
        self.edges.iter().any(|edge| edge.node.id() == id)
    }

    /// Mutable access to a node by id
    pub fn node_mut(&mut self, id: &str) -> Option<&mut N> {
        self.edges
            .iter_mut()
            .find(|edge| edge.node.id() == id)
            .map(|edge| &mut edge.node)
    }

    /// Nodes in edge order
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// Inserts after any edge comparing equal, so equal keys keep arrival order.
fn insert_sorted<N, C, K>(edges: &mut Vec<Edge<N, C>>, edge: Edge<N, C>, compare: K)
where
    K: Fn(&Edge<N, C>, &Edge<N, C>) -> Ordering,
{
    let index = edges.partition_point(|existing| compare(existing, &edge) != Ordering::Greater);
    edges.insert(index, edge);
}
