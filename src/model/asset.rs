use image::DynamicImage;

use crate::error::TransformError;
use crate::model::ResourceKind;

/// A raw value produced by the loader before any transform runs.
#[derive(Debug, Clone)]
pub enum Asset {
    Model(ModelData),
    Texture(DynamicImage),
    Text(String),
}

impl Asset {
    /// Decode fetched bytes according to the resource kind.
    pub fn decode(kind: ResourceKind, bytes: &[u8]) -> Result<Self, String> {
        match kind {
            ResourceKind::Model => ModelData::from_slice(bytes)
                .map(Asset::Model)
                .map_err(|e| e.to_string()),
            ResourceKind::Texture => image::load_from_memory(bytes)
                .map(Asset::Texture)
                .map_err(|e| e.to_string()),
            ResourceKind::Text => String::from_utf8(bytes.to_vec())
                .map(Asset::Text)
                .map_err(|e| e.to_string()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Asset::Model(_) => ResourceKind::Model,
            Asset::Texture(_) => ResourceKind::Texture,
            Asset::Text(_) => ResourceKind::Text,
        }
    }

    pub fn as_texture(&self) -> Option<&DynamicImage> {
        match self {
            Asset::Texture(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Asset::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_model(self) -> Result<ModelData, TransformError> {
        match self {
            Asset::Model(model) => Ok(model),
            other => Err(mismatch(ResourceKind::Model, &other)),
        }
    }

    pub fn into_texture(self) -> Result<DynamicImage, TransformError> {
        match self {
            Asset::Texture(image) => Ok(image),
            other => Err(mismatch(ResourceKind::Texture, &other)),
        }
    }

    pub fn into_text(self) -> Result<String, TransformError> {
        match self {
            Asset::Text(text) => Ok(text),
            other => Err(mismatch(ResourceKind::Text, &other)),
        }
    }
}

fn mismatch(expected: ResourceKind, found: &Asset) -> TransformError {
    TransformError::KindMismatch {
        expected,
        found: found.kind(),
    }
}

/// Scene-graph summary of a glTF document: node hierarchy, mesh and
/// material names, vertex counts. Geometry buffers are not retained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelData {
    pub nodes: Vec<ModelNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub mesh: Option<MeshSummary>,
    pub children: Vec<ModelNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshSummary {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSummary {
    pub material: Option<String>,
    pub vertex_count: usize,
}

impl ModelData {
    /// Parse a `.glb` container or a `.gltf` JSON document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, gltf::Error> {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        let nodes = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
            Some(scene) => scene.nodes().map(|node| ModelNode::from_gltf(&node)).collect(),
            None => Vec::new(),
        };
        Ok(Self { nodes })
    }

    /// Depth-first walk over every node.
    pub fn traverse<'a>(&'a self, f: &mut impl FnMut(&'a ModelNode)) {
        fn walk<'a>(node: &'a ModelNode, f: &mut impl FnMut(&'a ModelNode)) {
            f(node);
            for child in &node.children {
                walk(child, f);
            }
        }
        for node in &self.nodes {
            walk(node, f);
        }
    }

    /// Mutable depth-first walk over every node.
    pub fn traverse_mut(&mut self, f: &mut impl FnMut(&mut ModelNode)) {
        fn walk(node: &mut ModelNode, f: &mut impl FnMut(&mut ModelNode)) {
            f(node);
            for child in &mut node.children {
                walk(child, f);
            }
        }
        for node in &mut self.nodes {
            walk(node, f);
        }
    }

    /// Drop every node (with its subtree) for which `keep` returns false.
    /// Returns the number of nodes removed at the point of removal.
    pub fn retain_nodes(&mut self, keep: &impl Fn(&ModelNode) -> bool) -> usize {
        fn prune(nodes: &mut Vec<ModelNode>, keep: &impl Fn(&ModelNode) -> bool) -> usize {
            let before = nodes.len();
            nodes.retain(|node| keep(node));
            let mut removed = before - nodes.len();
            for node in nodes.iter_mut() {
                removed += prune(&mut node.children, keep);
            }
            removed
        }
        prune(&mut self.nodes, keep)
    }

    pub fn find(&self, name: &str) -> Option<&ModelNode> {
        let mut found = None;
        self.traverse(&mut |node| {
            if found.is_none() && node.name == name {
                found = Some(node);
            }
        });
        found
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |node| {
            if node.mesh.is_some() {
                count += 1;
            }
        });
        count
    }
}

impl ModelNode {
    fn from_gltf(node: &gltf::Node) -> Self {
        Self {
            name: node.name().unwrap_or_default().to_string(),
            mesh: node.mesh().map(|mesh| MeshSummary {
                name: mesh.name().map(str::to_string),
                primitives: mesh
                    .primitives()
                    .map(|primitive| PrimitiveSummary {
                        material: primitive.material().name().map(str::to_string),
                        vertex_count: primitive
                            .get(&gltf::Semantic::Positions)
                            .map(|accessor| accessor.count())
                            .unwrap_or(0),
                    })
                    .collect(),
            }),
            children: node.children().map(|child| ModelNode::from_gltf(&child)).collect(),
        }
    }
}
