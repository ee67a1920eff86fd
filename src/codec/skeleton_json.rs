//! Node-link skeleton JSON with pickled type tags on links.
//!
//! Each link's `type` is one of:
//! - `{"py/reduce": [{"py/type": ...}, {"py/tuple": [t]}]}`: type id `t`, first occurrence;
//! - `{"py/tuple": [t]}`: type id `t` inline, first occurrence;
//! - `{"py/id": k}`: back-reference to the `k`-th first-seen type in this skeleton.
//!
//! Type 1 is a body edge and type 2 a symmetry; anything unresolvable decodes as an edge.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};

use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::skeleton::Skeleton;

const EDGE_TYPE_NAME: &str = "sleap.skeleton.EdgeType";

/// Link kind after type-tag resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum LinkKind {
    Edge,
    Symmetry,
}

impl LinkKind {
    fn from_type_id(t: i64) -> Self {
        match t {
            2 => Self::Symmetry,
            _ => Self::Edge,
        }
    }

    fn type_id(self) -> i64 {
        match self {
            Self::Edge => 1,
            Self::Symmetry => 2,
        }
    }
}

/// Raw shape of a link's `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TypeTag {
    Inline(i64),
    Reduce(i64),
    BackRef(i64),
    Missing,
}

impl TypeTag {
    fn parse(v: Option<&Value>) -> Self {
        let Some(obj) = v.and_then(Value::as_object) else {
            return Self::Missing;
        };
        if let Some(reduce) = obj.get("py/reduce").and_then(Value::as_array) {
            return reduce
                .get(1)
                .and_then(tuple_first)
                .map_or(Self::Missing, Self::Reduce);
        }
        if let Some(tuple) = obj.get("py/tuple").and_then(Value::as_array) {
            return tuple
                .first()
                .and_then(Value::as_i64)
                .map_or(Self::Missing, Self::Inline);
        }
        if let Some(id) = obj.get("py/id").and_then(Value::as_i64) {
            return Self::BackRef(id);
        }
        Self::Missing
    }
}

fn tuple_first(v: &Value) -> Option<i64> {
    v.get("py/tuple")?.as_array()?.first()?.as_i64()
}

/// Running cache of first-seen type ids, keyed by the synthetic reference number jsonpickle
/// would assign them.
#[derive(Debug)]
struct TypeCache {
    next_ref: i64,
    by_ref: HashMap<i64, i64>,
    seen: HashSet<i64>,
}

impl TypeCache {
    fn new() -> Self {
        Self {
            next_ref: 1,
            by_ref: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    fn resolve(&mut self, tag: TypeTag) -> LinkKind {
        match tag {
            TypeTag::Inline(t) | TypeTag::Reduce(t) => {
                if self.seen.insert(t) {
                    self.by_ref.insert(self.next_ref, t);
                    self.next_ref += 1;
                }
                LinkKind::from_type_id(t)
            }
            TypeTag::BackRef(r) => self
                .by_ref
                .get(&r)
                .map_or(LinkKind::Edge, |&t| LinkKind::from_type_id(t)),
            TypeTag::Missing => LinkKind::Edge,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct NodeName {
    name: String,
}

#[derive(Debug, serde::Deserialize)]
struct NodeId {
    id: Value,
}

#[derive(Debug, serde::Deserialize)]
struct LinkDef {
    source: i64,
    target: i64,
    #[serde(rename = "type", default)]
    kind: Option<Value>,
}

#[derive(Debug, serde::Deserialize)]
struct SkeletonDef {
    #[serde(default)]
    nodes: Vec<NodeId>,
    #[serde(default)]
    links: Vec<LinkDef>,
    #[serde(default)]
    graph: Option<Map<String, Value>>,
    #[serde(default)]
    name: Option<String>,
}

fn node_id(v: &Value) -> ArchiveResult<i64> {
    v.as_i64()
        .ok_or_else(|| ArchiveError::format(format!("skeleton node id is not an integer: {v}")))
}

/// Decode every skeleton described by the metadata JSON.
///
/// `nodes` is the flat list of node names; each skeleton lists the ids (positions in that list)
/// of its own nodes and links between them.
pub(crate) fn decode_skeletons(metadata: &Value) -> ArchiveResult<Vec<Skeleton>> {
    let names: Vec<NodeName> = match metadata.get("nodes") {
        Some(v) => serde_json::from_value(v.clone())?,
        None => Vec::new(),
    };
    let defs: Vec<SkeletonDef> = match metadata.get("skeletons") {
        Some(v) => serde_json::from_value(v.clone())?,
        None => Vec::new(),
    };

    defs.iter()
        .map(|def| decode_one(def, &names))
        .collect()
}

fn decode_one(def: &SkeletonDef, names: &[NodeName]) -> ArchiveResult<Skeleton> {
    let mut local_by_id = HashMap::<i64, usize>::new();
    let mut node_names = Vec::with_capacity(def.nodes.len());
    for node in &def.nodes {
        let id = node_id(&node.id)?;
        let name = usize::try_from(id)
            .ok()
            .and_then(|i| names.get(i))
            .ok_or_else(|| ArchiveError::format(format!("skeleton node id {id} has no name")))?;
        local_by_id.insert(id, node_names.len());
        node_names.push(name.name.clone());
    }

    let mut skeleton = Skeleton::new(node_names);
    skeleton.name = def.name.clone().or_else(|| {
        def.graph
            .as_ref()
            .and_then(|g| g.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    let mut types = TypeCache::new();
    for link in &def.links {
        // Resolve before filtering so dropped links still advance the reference counter.
        let kind = types.resolve(TypeTag::parse(link.kind.as_ref()));
        let (Some(&src), Some(&dst)) = (
            local_by_id.get(&link.source),
            local_by_id.get(&link.target),
        ) else {
            tracing::debug!(
                source = link.source,
                target = link.target,
                "dropping skeleton link outside the skeleton's node set"
            );
            continue;
        };
        match kind {
            LinkKind::Edge => skeleton.add_edge(src, dst)?,
            LinkKind::Symmetry => {
                if src != dst {
                    skeleton.add_symmetry(src, dst)?;
                }
            }
        }
    }
    Ok(skeleton)
}

/// Encode skeletons into the `nodes` and `skeletons` members of the metadata JSON.
pub(crate) fn encode_skeletons(skeletons: &[Skeleton]) -> (Value, Value) {
    let mut all_nodes = Vec::new();
    let mut defs = Vec::with_capacity(skeletons.len());

    for (si, skel) in skeletons.iter().enumerate() {
        let base = all_nodes.len();
        all_nodes.extend(skel.node_names().iter().map(|n| json!({ "name": n })));

        let mut first_ref = HashMap::<LinkKind, i64>::new();
        let mut tag_for = |kind: LinkKind| -> Value {
            if let Some(r) = first_ref.get(&kind) {
                return json!({ "py/id": r });
            }
            let r = first_ref.len() as i64 + 1;
            first_ref.insert(kind, r);
            json!({
                "py/reduce": [
                    { "py/type": EDGE_TYPE_NAME },
                    { "py/tuple": [kind.type_id()] },
                ]
            })
        };

        let mut links = Vec::new();
        for e in skel.edges() {
            links.push(json!({
                "edge_insert_idx": links.len(),
                "key": 0,
                "source": base + e.source,
                "target": base + e.destination,
                "type": tag_for(LinkKind::Edge),
            }));
        }
        for s in skel.symmetries() {
            let (a, b) = s.nodes();
            links.push(json!({
                "key": 0,
                "source": base + a,
                "target": base + b,
                "type": tag_for(LinkKind::Symmetry),
            }));
        }

        let name = skel
            .name
            .clone()
            .unwrap_or_else(|| format!("Skeleton-{si}"));
        let nodes: Vec<Value> = (0..skel.len()).map(|i| json!({ "id": base + i })).collect();
        defs.push(json!({
            "directed": true,
            "graph": { "name": name, "num_edges_inserted": skel.edges().len() },
            "links": links,
            "multigraph": true,
            "nodes": nodes,
        }));
    }

    (Value::Array(all_nodes), Value::Array(defs))
}

#[cfg(test)]
#[path = "../../tests/unit/codec/skeleton_json.rs"]
mod tests;
