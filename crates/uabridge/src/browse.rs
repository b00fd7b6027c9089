// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Browse path types for name-based node addressing.
//!
//! A browse path starts at the Objects folder and follows hierarchical
//! references (including subtypes) through a list of qualified names.
//! The server translates it into a node id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, StatusCode};

// =============================================================================
// QualifiedName
// =============================================================================

/// Namespace-qualified browse name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,

    /// The name.
    pub name: String,
}

impl QualifiedName {
    /// Creates a new qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace_index, self.name)
    }
}

// =============================================================================
// BrowsePathSegment
// =============================================================================

/// One hop of a browse path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowsePathSegment {
    /// Reference type to follow.
    pub reference_type_id: NodeId,

    /// Whether subtypes of the reference type match.
    pub include_subtypes: bool,

    /// Whether the reference is followed backwards.
    pub is_inverse: bool,

    /// Browse name of the target.
    pub target_name: QualifiedName,
}

impl BrowsePathSegment {
    /// Creates a forward hierarchical segment that includes subtypes.
    pub fn hierarchical(target_name: QualifiedName) -> Self {
        Self {
            reference_type_id: NodeId::HIERARCHICAL_REFERENCES,
            include_subtypes: true,
            is_inverse: false,
            target_name,
        }
    }
}

// =============================================================================
// BrowsePath
// =============================================================================

/// A path from a start node through named children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowsePath {
    /// Starting node.
    pub start_node: NodeId,

    /// Segments to follow.
    pub segments: Vec<BrowsePathSegment>,
}

impl BrowsePath {
    /// Creates a browse path rooted at the Objects folder.
    pub fn from_objects(segments: Vec<BrowsePathSegment>) -> Self {
        Self {
            start_node: NodeId::OBJECTS_FOLDER,
            segments,
        }
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the qualified target names in order.
    pub fn names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.segments.iter().map(|s| &s.target_name)
    }
}

impl fmt::Display for BrowsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", name)?;
        }
        Ok(())
    }
}

// =============================================================================
// BrowsePathResult
// =============================================================================

/// Result of translating one browse path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePathResult {
    /// Translation status.
    pub status: StatusCode,

    /// Matching nodes; the first one is used.
    pub targets: Vec<NodeId>,
}

impl BrowsePathResult {
    /// Creates a result with a single target.
    pub fn found(target: NodeId) -> Self {
        Self {
            status: StatusCode::GOOD,
            targets: vec![target],
        }
    }

    /// Creates a failed result.
    pub fn not_found(status: StatusCode) -> Self {
        Self {
            status,
            targets: Vec::new(),
        }
    }

    /// Returns the first target when the status is good.
    pub fn target(&self) -> Option<&NodeId> {
        if self.status.is_good() {
            self.targets.first()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = BrowsePath::from_objects(vec![
            BrowsePathSegment::hierarchical(QualifiedName::new(2, "Plant")),
            BrowsePathSegment::hierarchical(QualifiedName::new(3, "Valve")),
        ]);
        assert_eq!(path.to_string(), "2:Plant/3:Valve");
        assert_eq!(path.start_node, NodeId::OBJECTS_FOLDER);
        assert!(path.segments[0].include_subtypes);
    }

    #[test]
    fn test_result_target() {
        let found = BrowsePathResult::found(NodeId::numeric(2, 7));
        assert_eq!(found.target(), Some(&NodeId::numeric(2, 7)));
        assert_eq!(BrowsePathResult::not_found(StatusCode::BAD_NO_MATCH).target(), None);
    }
}
