use crate::foundation::error::{ArchiveError, ArchiveResult};

/// Directed connection between two nodes, by node position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub source: usize,
    pub destination: usize,
}

/// Unordered pair of two distinct nodes, by node position.
///
/// Stored normalized so `(a, b)` and `(b, a)` compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symmetry {
    a: usize,
    b: usize,
}

impl Symmetry {
    pub fn new(a: usize, b: usize) -> ArchiveResult<Self> {
        if a == b {
            return Err(ArchiveError::format(format!(
                "symmetry must join two distinct nodes, got ({a}, {b})"
            )));
        }
        Ok(Self {
            a: a.min(b),
            b: a.max(b),
        })
    }

    pub fn nodes(self) -> (usize, usize) {
        (self.a, self.b)
    }
}

/// Ordered landmark names plus their edge and symmetry topology.
///
/// Node order is significant: instance point sequences are index-aligned with `nodes`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub name: Option<String>,
    nodes: Vec<String>,
    edges: Vec<Edge>,
    symmetries: Vec<Symmetry>,
}

impl Skeleton {
    pub fn new(nodes: Vec<String>) -> Self {
        Self {
            name: None,
            nodes,
            edges: Vec::new(),
            symmetries: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn node_names(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == name)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn symmetries(&self) -> &[Symmetry] {
        &self.symmetries
    }

    fn check_node(&self, idx: usize) -> ArchiveResult<()> {
        if idx >= self.nodes.len() {
            return Err(ArchiveError::format(format!(
                "node index {idx} out of range for skeleton with {} nodes",
                self.nodes.len()
            )));
        }
        Ok(())
    }

    pub fn add_edge(&mut self, source: usize, destination: usize) -> ArchiveResult<()> {
        self.check_node(source)?;
        self.check_node(destination)?;
        self.edges.push(Edge {
            source,
            destination,
        });
        Ok(())
    }

    /// Add a symmetry pair. Returns `false` when the unordered pair is already present.
    pub fn add_symmetry(&mut self, a: usize, b: usize) -> ArchiveResult<bool> {
        self.check_node(a)?;
        self.check_node(b)?;
        let sym = Symmetry::new(a, b)?;
        if self.symmetries.contains(&sym) {
            return Ok(false);
        }
        self.symmetries.push(sym);
        Ok(true)
    }

    /// Edges as `(source_name, destination_name)` pairs.
    pub fn edge_names(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|e| (self.nodes[e.source].as_str(), self.nodes[e.destination].as_str()))
            .collect()
    }
}
