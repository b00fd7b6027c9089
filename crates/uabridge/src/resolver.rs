// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Item path parsing and node resolution.
//!
//! An item path names its node in one of two forms, told apart by the first
//! delimiter after the leading namespace number:
//!
//! ```text
//!   2:Plant.Tank.Level        browse path, ':' after the namespace
//!   2:Plant.3:Valve.Pos       later segments may switch namespace
//!   2,1001                    direct numeric identifier, ','
//!   3,Pump.Speed              direct string identifier
//!   0,2258                    namespace 0 is fine for direct identifiers
//! ```
//!
//! Browse paths start at the Objects folder and follow hierarchical
//! references. Namespace 0 is reserved and rejected on any browse segment
//! that names a namespace.
//!
//! Resolution runs every item exactly once. A bad path or an unknown node
//! fails that item only; the rest still resolve.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::browse::{BrowsePath, BrowsePathSegment, QualifiedName};
use crate::context::SharedContext;
use crate::error::{BridgeError, BridgeResult, PathError, ResolutionError};
use crate::item::{Item, ItemIndex};
use crate::types::{NodeId, StatusCode};

// =============================================================================
// ItemPath
// =============================================================================

/// A parsed item path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPath {
    /// Name-based path translated by the server.
    Browse(BrowsePath),
    /// Node id built locally.
    Direct(NodeId),
}

impl ItemPath {
    /// Parses an item path.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let pos = path
            .find(&[',', ':'][..])
            .ok_or_else(|| PathError::MissingDelimiter {
                path: path.to_string(),
            })?;
        let (namespace, rest) = (&path[..pos], &path[pos + 1..]);

        if namespace.is_empty() {
            return Err(PathError::MissingNamespace {
                path: path.to_string(),
            });
        }
        let namespace_index = parse_namespace(path, namespace)?;

        if path.as_bytes()[pos] == b',' {
            parse_direct(path, namespace_index, rest)
        } else {
            parse_browse(path, namespace_index, rest)
        }
    }

    /// Returns `true` for browse paths.
    pub fn is_browse(&self) -> bool {
        matches!(self, Self::Browse(_))
    }
}

impl FromStr for ItemPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browse(path) => write!(f, "browse {}", path),
            Self::Direct(node) => write!(f, "direct {}", node),
        }
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_namespace(path: &str, text: &str) -> Result<u16, PathError> {
    if !is_digits(text) {
        return Err(PathError::InvalidNamespace {
            path: path.to_string(),
            namespace: text.to_string(),
        });
    }
    text.parse::<u16>().map_err(|_| PathError::InvalidNamespace {
        path: path.to_string(),
        namespace: text.to_string(),
    })
}

fn parse_direct(path: &str, namespace_index: u16, identifier: &str) -> Result<ItemPath, PathError> {
    if identifier.is_empty() {
        return Err(PathError::EmptyIdentifier {
            path: path.to_string(),
        });
    }
    let node = match identifier.parse::<u32>() {
        Ok(numeric) if is_digits(identifier) => NodeId::numeric(namespace_index, numeric),
        _ => NodeId::string(namespace_index, identifier),
    };
    Ok(ItemPath::Direct(node))
}

fn parse_browse(path: &str, namespace_index: u16, rest: &str) -> Result<ItemPath, PathError> {
    if namespace_index == 0 {
        return Err(PathError::ZeroNamespace {
            path: path.to_string(),
        });
    }

    let mut current = namespace_index;
    let mut segments = Vec::new();
    for (i, segment) in rest.split('.').enumerate() {
        // The first segment's namespace was already consumed.
        let name = match segment.split_once(':') {
            Some((prefix, name)) if i > 0 && is_digits(prefix) => {
                current = parse_namespace(path, prefix)?;
                if current == 0 {
                    return Err(PathError::ZeroNamespace {
                        path: path.to_string(),
                    });
                }
                name
            }
            _ => segment,
        };
        if name.is_empty() {
            return Err(PathError::EmptySegment {
                path: path.to_string(),
            });
        }
        segments.push(BrowsePathSegment::hierarchical(QualifiedName::new(
            current, name,
        )));
    }

    Ok(ItemPath::Browse(BrowsePath::from_objects(segments)))
}

// =============================================================================
// Resolution
// =============================================================================

/// Outcome of resolving a set of items.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved node per item.
    pub handles: BTreeMap<ItemIndex, NodeId>,
    /// Items that failed, in index order.
    pub failures: Vec<(ItemIndex, BridgeError)>,
}

impl Resolution {
    /// Returns `true` if at least one item failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns the node of an item.
    pub fn handle(&self, index: ItemIndex) -> Option<&NodeId> {
        self.handles.get(&index)
    }

    /// Number of resolved items.
    pub fn resolved_count(&self) -> usize {
        self.handles.len()
    }

    /// Indices of failed items.
    pub fn failed_indices(&self) -> Vec<ItemIndex> {
        self.failures.iter().map(|(index, _)| *index).collect()
    }
}

// =============================================================================
// NodeResolver
// =============================================================================

/// Turns item paths into node ids on a connected session.
#[derive(Debug, Clone)]
pub struct NodeResolver {
    context: SharedContext,
}

impl NodeResolver {
    /// Creates a resolver.
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    /// Resolves every item once.
    ///
    /// Browse paths go to the server in one batched translate call. Direct
    /// identifiers are built locally and, when enabled, confirmed with one
    /// batched read. Failed items are marked bad with the reason recorded.
    ///
    /// # Errors
    ///
    /// Only a failure of a service call itself is returned; per-item
    /// failures are reported in [`Resolution::failures`].
    pub async fn resolve_all(&self, items: &[Arc<Item>]) -> BridgeResult<Resolution> {
        let session = self.context.session();
        let mut resolution = Resolution::default();
        let mut browse: Vec<(&Arc<Item>, BrowsePath)> = Vec::new();
        let mut direct: Vec<(&Arc<Item>, NodeId)> = Vec::new();

        for item in items {
            match ItemPath::parse(item.path()) {
                Ok(ItemPath::Browse(path)) => browse.push((item, path)),
                Ok(ItemPath::Direct(node)) => direct.push((item, node)),
                Err(e) => Self::fail(&mut resolution, item, e.into()),
            }
        }

        if !browse.is_empty() {
            let paths: Vec<BrowsePath> = browse.iter().map(|(_, p)| p.clone()).collect();
            let results = session.translate_browse_paths(&paths).await?;
            if results.len() != paths.len() {
                return Err(ResolutionError::service_failed(format!(
                    "translate returned {} results for {} paths",
                    results.len(),
                    paths.len()
                ))
                .into());
            }
            for ((item, path), result) in browse.into_iter().zip(results) {
                match result.target() {
                    Some(node) => {
                        debug!(index = %item.index(), %path, node = %node, "Browse path resolved");
                        resolution.handles.insert(item.index(), node.clone());
                    }
                    None => {
                        let error = ResolutionError::NotFound {
                            index: item.index(),
                            path: item.path().to_string(),
                            status: result.status,
                        };
                        Self::fail(&mut resolution, item, error.into());
                    }
                }
            }
        }

        if !direct.is_empty() {
            if self.context.config().validate_direct_ids {
                let nodes: Vec<NodeId> = direct.iter().map(|(_, n)| n.clone()).collect();
                let values = session.read_values(&nodes).await?;
                if values.len() != nodes.len() {
                    return Err(ResolutionError::service_failed(format!(
                        "read returned {} results for {} nodes",
                        values.len(),
                        nodes.len()
                    ))
                    .into());
                }
                for ((item, node), value) in direct.into_iter().zip(values) {
                    if value.status == StatusCode::BAD_NODE_ID_UNKNOWN {
                        let error = ResolutionError::NotFound {
                            index: item.index(),
                            path: item.path().to_string(),
                            status: value.status,
                        };
                        Self::fail(&mut resolution, item, error.into());
                    } else {
                        resolution.handles.insert(item.index(), node);
                    }
                }
            } else {
                for (item, node) in direct {
                    resolution.handles.insert(item.index(), node);
                }
            }
        }

        resolution.failures.sort_by_key(|(index, _)| *index);
        self.context
            .stats()
            .record_resolution_failures(resolution.failures.len() as u64);

        if resolution.is_partial() {
            warn!(
                resolved = resolution.resolved_count(),
                failed = resolution.failures.len(),
                "Item resolution partially failed"
            );
        } else {
            info!(resolved = resolution.resolved_count(), "All items resolved");
        }
        Ok(resolution)
    }

    fn fail(resolution: &mut Resolution, item: &Item, error: BridgeError) {
        warn!(
            index = %item.index(),
            item = %item.name(),
            path = %item.path(),
            error_code = %error.error_code(),
            error = %error,
            "Item not resolved"
        );
        let reason = error.to_string();
        item.with_state(|state| state.set_bad(reason));
        resolution.failures.push((item.index(), error));
    }
}

// =============================================================================
// Tests
// =============================================================================
