use multiway_core::{InformationMatrix, RigidTransform};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseGraphNode {
    /// Maps this cloud's local coordinates into the global frame.
    pub pose: RigidTransform,
}

/// A measured relative transform between two nodes.
///
/// `transform` maps `source` coordinates into `target` coordinates, so a
/// consistent graph satisfies `pose[target]⁻¹ · pose[source] ≈ transform`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseGraphEdge {
    pub source: usize,
    pub target: usize,
    pub transform: RigidTransform,
    pub information: InformationMatrix,
    /// `false` for sequential odometry, `true` for loop closures. Only
    /// uncertain edges may be pruned or robustly down-weighted.
    pub uncertain: bool,
}

impl PoseGraphEdge {
    pub fn odometry(
        source: usize,
        target: usize,
        transform: RigidTransform,
        information: InformationMatrix,
    ) -> Self {
        Self {
            source,
            target,
            transform,
            information,
            uncertain: false,
        }
    }

    pub fn loop_closure(
        source: usize,
        target: usize,
        transform: RigidTransform,
        information: InformationMatrix,
    ) -> Self {
        Self {
            source,
            target,
            transform,
            information,
            uncertain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("edge {edge} references node {node}, but the graph has {nodes} nodes")]
    NodeOutOfRange { edge: usize, node: usize, nodes: usize },

    #[error("edge {edge} connects node {node} to itself")]
    SelfLoop { edge: usize, node: usize },

    #[error("pose of node {node} is not finite")]
    NonFinitePose { node: usize },

    #[error("edge {edge} has a non-finite transform or information matrix")]
    NonFiniteEdge { edge: usize },
}

/// Nodes indexed by working-subset position plus the edges between them.
/// Node 0 is the conventional anchor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseGraph {
    pub nodes: Vec<PoseGraphNode>,
    pub edges: Vec<PoseGraphEdge>,
}

impl PoseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_poses(poses: impl IntoIterator<Item = RigidTransform>) -> Self {
        Self {
            nodes: poses.into_iter().map(|pose| PoseGraphNode { pose }).collect(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, pose: RigidTransform) -> usize {
        self.nodes.push(PoseGraphNode { pose });
        self.nodes.len() - 1
    }

    pub fn add_edge(&mut self, edge: PoseGraphEdge) {
        self.edges.push(edge);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn poses(&self) -> Vec<RigidTransform> {
        self.nodes.iter().map(|n| n.pose).collect()
    }

    /// `pose[target]⁻¹ · pose[source]`, the relative transform the current
    /// poses imply for `edge`.
    pub fn implied_transform(&self, edge: &PoseGraphEdge) -> RigidTransform {
        self.nodes[edge.target]
            .pose
            .inverse()
            .compose(&self.nodes[edge.source].pose)
    }

    /// Checks that every edge joins two distinct existing nodes and that all
    /// numeric data is finite.
    pub fn validate(&self) -> Result<(), GraphError> {
        let nodes = self.nodes.len();
        if let Some(node) = self.nodes.iter().position(|n| !n.pose.is_finite()) {
            return Err(GraphError::NonFinitePose { node });
        }
        for (edge, e) in self.edges.iter().enumerate() {
            for node in [e.source, e.target] {
                if node >= nodes {
                    return Err(GraphError::NodeOutOfRange { edge, node, nodes });
                }
            }
            if e.source == e.target {
                return Err(GraphError::SelfLoop {
                    edge,
                    node: e.source,
                });
            }
            if !e.transform.is_finite() || !e.information.is_finite() {
                return Err(GraphError::NonFiniteEdge { edge });
            }
        }
        Ok(())
    }
}
