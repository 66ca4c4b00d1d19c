//! The `.mvsc` model container and its companion geometry decoder.
//!
//! Layout: a four byte magic, a little-endian `u16` version, a length
//! prefixed JSON header describing the mesh and node tables, then one
//! length prefixed lz4 block per mesh holding little-endian `f32` positions,
//! `f32` normals, and `u32` indices. The decoder side only exists where its
//! manifest can be read, mirroring runtimes that ship the decompression
//! stage as a separate resource.

use std::path::Path;

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

use crate::{Result, ViewerError};

use super::LoadError;

pub const CONTAINER_MAGIC: [u8; 4] = *b"MVSC";
pub const CONTAINER_VERSION: u16 = 1;
/// Identifier carried by decoder manifests for this container family.
pub const CONTAINER_FORMAT_NAME: &str = "mvsc";
/// File name the decoder manifest is looked up under.
pub const DECODER_MANIFEST_NAME: &str = "geometry-decoder.json";

const BYTES_PER_VEC3: usize = 12;
const BYTES_PER_INDEX: usize = 4;

/// Material parameters stored per mesh in the container header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams {
    pub base_color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub clearcoat: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8],
            roughness: 0.5,
            metalness: 0.0,
            clearcoat: 0.0,
        }
    }
}

/// One entry of the header's node table. Indices refer to the mesh table
/// and to other nodes; the table must form a forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub mesh: Option<usize>,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub children: Vec<usize>,
}

impl NodeEntry {
    /// A node with an identity transform and no mesh.
    pub fn group<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            mesh: None,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeshEntry {
    name: String,
    vertex_count: u32,
    index_count: u32,
    material: MaterialParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssetHeader {
    meshes: Vec<MeshEntry>,
    nodes: Vec<NodeEntry>,
    roots: Vec<usize>,
}

/// Decompressed buffers for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub material: MaterialParams,
}

/// A fully decoded asset. CPU buffers only; nothing here touches the GPU
/// ledger until the scene builder instantiates it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedScene {
    pub meshes: Vec<MeshData>,
    pub nodes: Vec<NodeEntry>,
    pub roots: Vec<usize>,
}

impl DecodedScene {
    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.positions.len()).sum()
    }

    pub fn total_triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices.len() / 3).sum()
    }
}

/// Serialises a scene into the current container version.
///
/// The encoder checks buffer-layout consistency (matching normal counts,
/// triangle-multiple index counts) so it cannot emit a block whose size
/// contradicts its header entry. Semantic validation of indices and the
/// node graph is the decoder's job.
pub fn encode(scene: &DecodedScene) -> Result<Vec<u8>> {
    let mut meshes = Vec::with_capacity(scene.meshes.len());
    for mesh in &scene.meshes {
        if mesh.normals.len() != mesh.positions.len() {
            return Err(ViewerError::Encode(format!(
                "mesh `{}` has {} normals for {} positions",
                mesh.name,
                mesh.normals.len(),
                mesh.positions.len()
            )));
        }
        if mesh.indices.len() % 3 != 0 {
            return Err(ViewerError::Encode(format!(
                "mesh `{}` index count {} is not a multiple of three",
                mesh.name,
                mesh.indices.len()
            )));
        }
        meshes.push(MeshEntry {
            name: mesh.name.clone(),
            vertex_count: mesh.positions.len() as u32,
            index_count: mesh.indices.len() as u32,
            material: mesh.material.clone(),
        });
    }

    let header = AssetHeader {
        meshes,
        nodes: scene.nodes.clone(),
        roots: scene.roots.clone(),
    };
    let header_bytes = serde_json::to_vec(&header)?;

    let mut out = Vec::new();
    out.extend_from_slice(&CONTAINER_MAGIC);
    out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);

    for mesh in &scene.meshes {
        let mut payload = Vec::with_capacity(
            mesh.positions.len() * BYTES_PER_VEC3 * 2 + mesh.indices.len() * BYTES_PER_INDEX,
        );
        for position in &mesh.positions {
            for component in position {
                payload.extend_from_slice(&component.to_le_bytes());
            }
        }
        for normal in &mesh.normals {
            for component in normal {
                payload.extend_from_slice(&component.to_le_bytes());
            }
        }
        for index in &mesh.indices {
            payload.extend_from_slice(&index.to_le_bytes());
        }

        let block = compress_prepend_size(&payload);
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&block);
    }

    Ok(out)
}

/// Manifest describing which containers the local decoder stage handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderManifest {
    pub format: String,
    pub max_version: u16,
}

impl DecoderManifest {
    /// Manifest matching the encoder in this crate.
    pub fn current() -> Self {
        Self {
            format: CONTAINER_FORMAT_NAME.to_string(),
            max_version: CONTAINER_VERSION,
        }
    }
}

/// The decompression stage. Construction fails when the manifest resource
/// is missing or does not cover this container family; decoding validates
/// everything it reads, treating the payload as untrusted.
#[derive(Debug, Clone)]
pub struct GeometryDecoder {
    max_version: u16,
}

impl GeometryDecoder {
    /// Reads `geometry-decoder.json` from `resource_dir` and builds the
    /// decoder it describes.
    pub fn from_resource_dir(resource_dir: &Path) -> std::result::Result<Self, LoadError> {
        let path = resource_dir.join(DECODER_MANIFEST_NAME);
        let bytes = std::fs::read(&path)
            .map_err(|err| LoadError::DecoderUnavailable(format!("{}: {err}", path.display())))?;
        let manifest: DecoderManifest = serde_json::from_slice(&bytes)
            .map_err(|err| LoadError::DecoderUnavailable(format!("{}: {err}", path.display())))?;
        Self::from_manifest(&manifest)
    }

    pub fn from_manifest(manifest: &DecoderManifest) -> std::result::Result<Self, LoadError> {
        if manifest.format != CONTAINER_FORMAT_NAME {
            return Err(LoadError::DecoderUnavailable(format!(
                "manifest covers `{}` containers, not `{CONTAINER_FORMAT_NAME}`",
                manifest.format
            )));
        }
        Ok(Self {
            max_version: manifest.max_version,
        })
    }

    pub fn max_version(&self) -> u16 {
        self.max_version
    }

    /// Decodes a container into CPU buffers.
    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<DecodedScene, LoadError> {
        let mut reader = ByteReader::new(bytes);

        let magic = reader.take(CONTAINER_MAGIC.len())?;
        if magic != CONTAINER_MAGIC {
            return Err(LoadError::Malformed("not a model container".to_string()));
        }
        let version = reader.read_u16()?;
        if version > self.max_version {
            return Err(LoadError::Malformed(format!(
                "container version {version} exceeds decoder support (max {})",
                self.max_version
            )));
        }

        let header_len = reader.read_u32()? as usize;
        let header_bytes = reader.take(header_len)?;
        let header: AssetHeader = serde_json::from_slice(header_bytes)
            .map_err(|err| LoadError::Malformed(format!("header: {err}")))?;

        validate_node_table(&header)?;

        let mut meshes = Vec::with_capacity(header.meshes.len());
        for entry in &header.meshes {
            let block_len = reader.read_u32()? as usize;
            let block = reader.take(block_len)?;
            let payload = decompress_size_prepended(block).map_err(|err| {
                LoadError::Malformed(format!("mesh `{}` failed to inflate: {err}", entry.name))
            })?;
            meshes.push(decode_mesh(entry, &payload)?);
        }

        Ok(DecodedScene {
            meshes,
            nodes: header.nodes,
            roots: header.roots,
        })
    }
}

fn validate_node_table(header: &AssetHeader) -> std::result::Result<(), LoadError> {
    for node in &header.nodes {
        if let Some(mesh) = node.mesh {
            if mesh >= header.meshes.len() {
                return Err(LoadError::Malformed(format!(
                    "node `{}` references missing mesh {mesh}",
                    node.name
                )));
            }
        }
        for &child in &node.children {
            if child >= header.nodes.len() {
                return Err(LoadError::Malformed(format!(
                    "node `{}` references missing child {child}",
                    node.name
                )));
            }
        }
    }

    // Every node may be reached at most once, so instantiation terminates
    // and no subtree is shared.
    let mut visited = vec![false; header.nodes.len()];
    let mut stack: Vec<usize> = Vec::new();
    for &root in &header.roots {
        if root >= header.nodes.len() {
            return Err(LoadError::Malformed(format!("missing root node {root}")));
        }
        stack.push(root);
    }
    while let Some(index) = stack.pop() {
        if visited[index] {
            return Err(LoadError::Malformed(
                "node table is not a forest".to_string(),
            ));
        }
        visited[index] = true;
        stack.extend(header.nodes[index].children.iter().copied());
    }

    Ok(())
}

fn decode_mesh(entry: &MeshEntry, payload: &[u8]) -> std::result::Result<MeshData, LoadError> {
    let vertex_count = entry.vertex_count as usize;
    let index_count = entry.index_count as usize;
    if index_count % 3 != 0 {
        return Err(LoadError::Malformed(format!(
            "mesh `{}` index count {index_count} is not a multiple of three",
            entry.name
        )));
    }

    let expected = vertex_count
        .checked_mul(BYTES_PER_VEC3 * 2)
        .and_then(|n| n.checked_add(index_count * BYTES_PER_INDEX))
        .ok_or_else(|| LoadError::Malformed(format!("mesh `{}` is too large", entry.name)))?;
    if payload.len() != expected {
        return Err(LoadError::Malformed(format!(
            "mesh `{}` block holds {} bytes, expected {expected}",
            entry.name,
            payload.len()
        )));
    }

    let (position_bytes, rest) = payload.split_at(vertex_count * BYTES_PER_VEC3);
    let (normal_bytes, index_bytes) = rest.split_at(vertex_count * BYTES_PER_VEC3);

    let positions = read_vec3s(position_bytes);
    let normals = read_vec3s(normal_bytes);
    let indices: Vec<u32> = index_bytes
        .chunks_exact(BYTES_PER_INDEX)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    for &index in &indices {
        if index as usize >= vertex_count {
            return Err(LoadError::Malformed(format!(
                "mesh `{}` index {index} is out of range for {vertex_count} vertices",
                entry.name
            )));
        }
    }

    Ok(MeshData {
        name: entry.name.clone(),
        positions,
        normals,
        indices,
        material: entry.material.clone(),
    })
}

fn read_vec3s(bytes: &[u8]) -> Vec<[f32; 3]> {
    bytes
        .chunks_exact(BYTES_PER_VEC3)
        .map(|chunk| {
            [
                f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                f32::from_le_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]),
            ]
        })
        .collect()
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> std::result::Result<&'a [u8], LoadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| LoadError::Malformed("container truncated".to_string()))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> std::result::Result<u16, LoadError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> std::result::Result<u32, LoadError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh(name: &str) -> MeshData {
        MeshData {
            name: name.to_string(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            indices: vec![0, 1, 2, 0, 2, 3],
            material: MaterialParams {
                base_color: [0.9, 0.1, 0.1],
                roughness: 0.4,
                metalness: 0.1,
                clearcoat: 0.6,
            },
        }
    }

    fn sample_scene() -> DecodedScene {
        let mut root = NodeEntry::group("root");
        root.children.push(1);
        let mut leaf = NodeEntry::group("quad");
        leaf.mesh = Some(0);
        leaf.translation = [0.0, 1.0, 0.0];
        DecodedScene {
            meshes: vec![quad_mesh("quad")],
            nodes: vec![root, leaf],
            roots: vec![0],
        }
    }

    fn current_decoder() -> GeometryDecoder {
        GeometryDecoder::from_manifest(&DecoderManifest::current()).unwrap()
    }

    #[test]
    fn round_trip_preserves_the_scene() {
        let scene = sample_scene();
        let bytes = encode(&scene).unwrap();
        let decoded = current_decoder().decode(&bytes).unwrap();
        assert_eq!(decoded, scene);
        assert_eq!(decoded.total_vertex_count(), 4);
        assert_eq!(decoded.total_triangle_count(), 2);
    }

    #[test]
    fn rejects_foreign_magic() {
        let mut bytes = encode(&sample_scene()).unwrap();
        bytes[0] = b'X';
        let err = current_decoder().decode(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(_)));
    }

    #[test]
    fn rejects_versions_beyond_the_manifest() {
        let bytes = encode(&sample_scene()).unwrap();
        let decoder = GeometryDecoder::from_manifest(&DecoderManifest {
            format: CONTAINER_FORMAT_NAME.to_string(),
            max_version: 0,
        })
        .unwrap();
        let err = decoder.decode(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(message) if message.contains("version")));
    }

    #[test]
    fn rejects_truncated_containers() {
        let bytes = encode(&sample_scene()).unwrap();
        for len in [3, 5, 9, bytes.len() - 1] {
            let err = current_decoder().decode(&bytes[..len]).unwrap_err();
            assert!(matches!(err, LoadError::Malformed(_)), "length {len}");
        }
    }

    #[test]
    fn rejects_corrupt_mesh_blocks() {
        let mut bytes = encode(&sample_scene()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = current_decoder().decode(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(_)));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let mut scene = sample_scene();
        scene.meshes[0].indices[2] = 99;
        let bytes = encode(&scene).unwrap();
        let err = current_decoder().decode(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(message) if message.contains("out of range")));
    }

    #[test]
    fn rejects_dangling_node_references() {
        let mut scene = sample_scene();
        scene.nodes[1].mesh = Some(7);
        let bytes = encode(&scene).unwrap();
        let err = current_decoder().decode(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(message) if message.contains("missing mesh")));
    }

    #[test]
    fn rejects_cyclic_node_tables() {
        let mut scene = sample_scene();
        scene.nodes[1].children.push(0);
        let bytes = encode(&scene).unwrap();
        let err = current_decoder().decode(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(message) if message.contains("forest")));
    }

    #[test]
    fn encode_rejects_mismatched_normals() {
        let mut scene = sample_scene();
        scene.meshes[0].normals.pop();
        assert!(encode(&scene).is_err());
    }

    #[test]
    fn decoder_requires_a_readable_manifest() {
        let dir = std::env::temp_dir().join(format!("model-viewer-decoder-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = GeometryDecoder::from_resource_dir(&dir.join("nowhere"));
        assert!(matches!(missing, Err(LoadError::DecoderUnavailable(_))));

        let manifest_path = dir.join(DECODER_MANIFEST_NAME);
        std::fs::write(
            &manifest_path,
            serde_json::to_vec(&DecoderManifest::current()).unwrap(),
        )
        .unwrap();
        let decoder = GeometryDecoder::from_resource_dir(&dir).unwrap();
        assert_eq!(decoder.max_version(), CONTAINER_VERSION);

        std::fs::write(&manifest_path, b"{not json").unwrap();
        let broken = GeometryDecoder::from_resource_dir(&dir);
        assert!(matches!(broken, Err(LoadError::DecoderUnavailable(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn manifests_for_other_formats_are_refused() {
        let manifest = DecoderManifest {
            format: "gltf".to_string(),
            max_version: 2,
        };
        assert!(matches!(
            GeometryDecoder::from_manifest(&manifest),
            Err(LoadError::DecoderUnavailable(_))
        ));
    }
}
