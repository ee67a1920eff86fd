use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::container::{
    AttrValue, Attrs, ContainerRead, ContainerWrite, Dataset, Entity, normalize_path,
};
use crate::foundation::error::{ArchiveError, ArchiveResult};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Group {
        #[serde(default)]
        attrs: Attrs,
    },
    Dataset {
        dataset: Arc<Dataset>,
    },
}

/// In-memory hierarchical container.
///
/// Paths are flat keys in a sorted map; the root group is the empty path. A JSON snapshot of the
/// whole tree can be saved to and loaded from disk.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MemContainer {
    nodes: BTreeMap<String, Node>,
}

impl Default for MemContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemContainer {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            String::new(),
            Node::Group {
                attrs: Attrs::new(),
            },
        );
        Self { nodes }
    }

    /// Load a snapshot written by [`MemContainer::save_json`].
    pub fn load_json(path: &Path) -> ArchiveResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read archive snapshot '{}'", path.display()))?;
        let out: Self = serde_json::from_slice(&bytes)?;
        if !out.nodes.contains_key("") {
            return Err(ArchiveError::structural("snapshot has no root group"));
        }
        Ok(out)
    }

    pub fn save_json(&self, path: &Path) -> ArchiveResult<()> {
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("write archive snapshot '{}'", path.display()))?;
        Ok(())
    }

    fn parent(path: &str) -> &str {
        path.rfind('/').map_or("", |i| &path[..i])
    }

    fn child_prefix(path: &str) -> String {
        if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        }
    }

    fn ensure_parents(&mut self, path: &str) -> ArchiveResult<()> {
        let mut cur = String::new();
        let parent = Self::parent(path);
        if parent.is_empty() {
            return Ok(());
        }
        for seg in parent.split('/') {
            if !cur.is_empty() {
                cur.push('/');
            }
            cur.push_str(seg);
            match self.nodes.get(&cur) {
                Some(Node::Group { .. }) => {}
                Some(Node::Dataset { .. }) => {
                    return Err(ArchiveError::format(format!(
                        "cannot create '{path}': '{cur}' is a dataset"
                    )));
                }
                None => {
                    self.nodes.insert(
                        cur.clone(),
                        Node::Group {
                            attrs: Attrs::new(),
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

impl ContainerRead for MemContainer {
    fn get(&self, path: &str) -> Option<Entity> {
        let path = normalize_path(path);
        match self.nodes.get(&path)? {
            Node::Dataset { dataset } => Some(Entity::Dataset(dataset.clone())),
            Node::Group { .. } => {
                let prefix = Self::child_prefix(&path);
                let keys = self
                    .nodes
                    .range(prefix.clone()..)
                    .take_while(|(k, _)| k.starts_with(&prefix))
                    .filter_map(|(k, _)| {
                        let rest = &k[prefix.len()..];
                        (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
                    })
                    .collect();
                Some(Entity::Group { keys })
            }
        }
    }

    fn attrs(&self, path: &str) -> Attrs {
        match self.nodes.get(&normalize_path(path)) {
            Some(Node::Group { attrs }) => attrs.clone(),
            Some(Node::Dataset { dataset }) => dataset.attrs.clone(),
            None => Attrs::new(),
        }
    }
}

impl ContainerWrite for MemContainer {
    fn create_group(&mut self, path: &str) -> ArchiveResult<()> {
        let path = normalize_path(path);
        self.ensure_parents(&path)?;
        match self.nodes.get(&path) {
            Some(Node::Group { .. }) => Ok(()),
            Some(Node::Dataset { .. }) => Err(ArchiveError::format(format!(
                "cannot create group '{path}': a dataset exists there"
            ))),
            None => {
                self.nodes.insert(
                    path,
                    Node::Group {
                        attrs: Attrs::new(),
                    },
                );
                Ok(())
            }
        }
    }

    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> ArchiveResult<()> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Err(ArchiveError::format("cannot write a dataset at the root"));
        }
        self.ensure_parents(&path)?;
        self.remove(&path)?;
        self.nodes.insert(
            path,
            Node::Dataset {
                dataset: Arc::new(dataset),
            },
        );
        Ok(())
    }

    fn set_attr(&mut self, path: &str, name: &str, value: AttrValue) -> ArchiveResult<()> {
        let path = normalize_path(path);
        match self.nodes.get_mut(&path) {
            Some(Node::Group { attrs }) => {
                attrs.insert(name.to_string(), value);
                Ok(())
            }
            Some(Node::Dataset { dataset }) => {
                Arc::make_mut(dataset)
                    .attrs
                    .insert(name.to_string(), value);
                Ok(())
            }
            None => Err(ArchiveError::structural(format!(
                "cannot set attribute '{name}': no entity at '{path}'"
            ))),
        }
    }

    fn remove(&mut self, path: &str) -> ArchiveResult<()> {
        let path = normalize_path(path);
        if path.is_empty() {
            self.nodes.retain(|k, _| k.is_empty());
            return Ok(());
        }
        let prefix = Self::child_prefix(&path);
        self.nodes
            .retain(|k, _| k != &path && !k.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/container/memory.rs"]
mod tests;
