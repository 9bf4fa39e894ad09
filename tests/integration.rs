//! Cross-component scenarios (spec §8 "Concrete end-to-end scenarios").

use std::cell::Cell;
use std::fs;
use std::rc::Rc;
use std::time::{Duration, Instant};

use meshcache::loader::LoaderKind;
use meshcache::mesh::AttributeName;
use meshcache::path::AbsolutePath;
use meshcache::{Loader, MeshCache, MeshDescriptor, SubscriptionRegistry};

/// Writes a one-triangle `.gltf` + sidecar `.bin` to `dir`, optionally
/// translating the sole node by `translation`.
fn write_triangle_gltf(dir: &std::path::Path, translation: Option<[f32; 3]>) -> AbsolutePath {
    let mut bytes = Vec::new();
    for i in [0u16, 1, 2] {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&[0u8; 2]); // pad indices up to a 4-byte boundary
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    for p in positions {
        for c in p {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    fs::write(dir.join("triangle.bin"), &bytes).unwrap();

    let node = match translation {
        Some([x, y, z]) => format!(r#"{{ "mesh": 0, "translation": [{x}, {y}, {z}] }}"#),
        None => r#"{ "mesh": 0 }"#.to_string(),
    };

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "uri": "triangle.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": 8, "byteLength": 36 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }}
  ],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 1 }}, "indices": 0 }}] }}],
  "nodes": [{node}],
  "scenes": [{{ "nodes": [0] }}],
  "scene": 0
}}"#,
        len = bytes.len()
    );
    let gltf_path = dir.join("triangle.gltf");
    fs::write(&gltf_path, json).unwrap();
    AbsolutePath::new(gltf_path).unwrap()
}

#[test]
fn simple_load_produces_expected_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), None);
    let mut loader = LoaderKind::for_path(&path).expect("recognized extension");
    let mesh = loader
        .load_mesh(&MeshDescriptor {
            path: path.clone(),
            submesh_index: 0,
            bake_all_submeshes: false,
        })
        .expect("mesh should decode");
    assert_eq!(mesh.num_vertices(), 3);
    assert_eq!(mesh.num_triangles(), 1);
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(mesh.submeshes.len(), 1);
}

#[test]
fn bake_with_transform_shifts_positions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), Some([10.0, 0.0, 0.0]));
    let mut loader = LoaderKind::for_path(&path).unwrap();
    let baked = loader
        .load_mesh(&MeshDescriptor {
            path: path.clone(),
            submesh_index: 0,
            bake_all_submeshes: true,
        })
        .expect("baked mesh should decode");
    let positions = baked.attribute(&AttributeName::Position).unwrap();
    let v0 = positions.as_vec3(0);
    assert_eq!(v0, nalgebra::Vector3::new(10.0, 0.0, 0.0));
    let v1 = positions.as_vec3(1);
    assert_eq!(v1, nalgebra::Vector3::new(11.0, 0.0, 0.0));
}

#[test]
fn bake_with_no_referencing_node_fails() {
    let dir = tempfile::tempdir().unwrap();
    // a mesh with a node that references no mesh at all
    fs::write(
        dir.path().join("orphan.gltf"),
        r#"{
  "asset": { "version": "2.0" },
  "nodes": [{}],
  "scenes": [{ "nodes": [0] }],
  "scene": 0
}"#,
    )
    .unwrap();
    let path = AbsolutePath::new(dir.path().join("orphan.gltf")).unwrap();
    let mut loader = LoaderKind::for_path(&path).unwrap();
    let mesh = loader.load_mesh(&MeshDescriptor {
        path,
        submesh_index: 0,
        bake_all_submeshes: true,
    });
    assert!(mesh.is_none());
    assert_eq!(loader.last_error(), Some("Mesh file contains no bakeable submeshes."));
}

#[test]
fn lfs_placeholder_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path_buf = dir.path().join("large.gltf");
    let mut content = b"version https://git-lfs.github.com/spec/v1\n".to_vec();
    content.resize(131, b'x');
    fs::write(&path_buf, &content).unwrap();
    let path = AbsolutePath::new(path_buf).unwrap();

    let mut loader = LoaderKind::for_path(&path).unwrap();
    let mesh = loader.load_mesh(&MeshDescriptor {
        path,
        submesh_index: 0,
        bake_all_submeshes: false,
    });
    assert!(mesh.is_none());
    assert_eq!(loader.last_error(), Some("Git LFS placeholder file detected."));
}

#[test]
fn submesh_out_of_range_reports_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), None);
    let mut loader = LoaderKind::for_path(&path).unwrap();
    let mesh = loader.load_mesh(&MeshDescriptor {
        path,
        submesh_index: 5,
        bake_all_submeshes: false,
    });
    assert!(mesh.is_none());
    assert_eq!(
        loader.last_error(),
        Some("Selected submesh index is out of valid submesh index range [0, 0]")
    );
}

#[test]
fn cache_reparses_after_coalesced_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path(), None);

    let registry = SubscriptionRegistry::new().unwrap();
    let cache = MeshCache::new(&registry);

    let fired = Rc::new(Cell::new(0u32));
    let fired_cb = fired.clone();
    let _handle = registry.subscribe(&path, move |_| fired_cb.set(fired_cb.get() + 1));

    let first = cache
        .loader(&path, &registry)
        .expect("recognized extension")
        .with(|loader| {
            loader.load_mesh(&MeshDescriptor {
                path: path.clone(),
                submesh_index: 0,
                bake_all_submeshes: false,
            })
        });
    assert!(first.is_some());

    // touch the file so the watcher observes a change
    std::thread::sleep(Duration::from_millis(20));
    let contents = fs::read(path.as_path()).unwrap();
    fs::write(path.as_path(), contents).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline && fired.get() == 0 {
        cache.poll(&registry);
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(fired.get(), 1, "callback should fire exactly once after the coalescing delay");

    // the entry should still be usable (lazily rebuilt on the next access)
    let second = cache
        .loader(&path, &registry)
        .expect("still recognized")
        .with(|loader| {
            loader.load_mesh(&MeshDescriptor {
                path: path.clone(),
                submesh_index: 0,
                bake_all_submeshes: false,
            })
        });
    assert!(second.is_some());
}

/// Writes a `.gltf` + sidecar `.bin` with no mesh, just one animation whose
/// two channels (translation, rotation) share a single two-keyframe input
/// accessor -- one LINEAR Vec3 sampler and one CUBICSPLINE Vec4 sampler.
fn write_animated_gltf(dir: &std::path::Path) -> AbsolutePath {
    let mut bytes = Vec::new();
    for t in [0.0f32, 1.0] {
        bytes.extend_from_slice(&t.to_le_bytes());
    }
    let translations: [[f32; 3]; 2] = [[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]];
    for v in translations {
        for c in v {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    // CUBICSPLINE rotation: (tangent_in, value, tangent_out) per keyframe,
    // identity quaternion value, zero tangents throughout.
    let rotation_triples: [[f32; 4]; 6] = [
        [0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0, 0.0],
    ];
    for v in rotation_triples {
        for c in v {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    fs::write(dir.join("anim.bin"), &bytes).unwrap();

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "uri": "anim.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 8, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 32, "byteLength": 96 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR" }},
    {{ "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 6, "type": "VEC4" }}
  ],
  "nodes": [{{}}],
  "scenes": [{{ "nodes": [0] }}],
  "scene": 0,
  "animations": [
    {{
      "channels": [
        {{ "sampler": 0, "target": {{ "node": 0, "path": "translation" }} }},
        {{ "sampler": 1, "target": {{ "node": 0, "path": "rotation" }} }}
      ],
      "samplers": [
        {{ "input": 0, "output": 1, "interpolation": "LINEAR" }},
        {{ "input": 0, "output": 2, "interpolation": "CUBICSPLINE" }}
      ]
    }}
  ]
}}"#,
        len = bytes.len()
    );
    let gltf_path = dir.join("anim.gltf");
    fs::write(&gltf_path, json).unwrap();
    AbsolutePath::new(gltf_path).unwrap()
}

#[test]
fn sampler_linear_translation_has_expected_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_animated_gltf(dir.path());
    let mut loader = LoaderKind::for_path(&path).unwrap();
    let data = loader.sampler_data(0, 0).expect("linear sampler should decode");
    assert_eq!(data.input, vec![0.0, 1.0]);
    assert_eq!(data.keyframes, vec![vec![0.0, 0.0, 0.0], vec![5.0, 0.0, 0.0]]);
    assert!(data.tangent_in.is_empty());
    assert!(data.tangent_out.is_empty());
    assert!(data.validate().is_ok());
}

#[test]
fn sampler_cubic_spline_quaternion_has_expected_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_animated_gltf(dir.path());
    let mut loader = LoaderKind::for_path(&path).unwrap();
    let data = loader.sampler_data(0, 1).expect("cubic spline sampler should decode");
    assert_eq!(data.input, vec![0.0, 1.0]);
    assert_eq!(data.keyframes.len(), 2);
    assert_eq!(data.tangent_in.len(), 2);
    assert_eq!(data.tangent_out.len(), 2);
    for kf in &data.keyframes {
        assert_eq!(kf, &vec![0.0, 0.0, 0.0, 1.0]);
    }
    for tangent in data.tangent_in.iter().chain(data.tangent_out.iter()) {
        assert_eq!(tangent, &vec![0.0, 0.0, 0.0, 0.0]);
    }
    assert!(data.validate().is_ok());
}

#[test]
fn sampler_out_of_range_animation_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_animated_gltf(dir.path());
    let mut loader = LoaderKind::for_path(&path).unwrap();
    assert!(loader.sampler_data(1, 0).is_none());
}

#[test]
fn load_skin_without_skins_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_animated_gltf(dir.path());
    let mut loader = LoaderKind::for_path(&path).unwrap();
    assert!(loader.load_skin(0).is_err());
    assert!(loader.last_error().unwrap().contains("no skins"));
}

/// Writes a one-triangle `.gltf` whose sole node has a non-uniform scale
/// and whose primitive carries a base `NORMAL` plus one morph target with
/// only a `NORMAL` (no displaced `POSITION`), both set to the same raw
/// vector -- chosen so the renormalization factor the baker computes for
/// the base normal can be hand-verified and checked against the morph
/// normal's.
fn write_morph_bake_gltf(dir: &std::path::Path) -> AbsolutePath {
    let mut bytes = Vec::new();
    for i in [0u16, 1, 2] {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&[0u8; 2]); // pad indices up to a 4-byte boundary

    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    for p in positions {
        for c in p {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    let normal = [1.0f32, 0.0, 0.0];
    for _ in 0..3 {
        for c in normal {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    for _ in 0..3 {
        for c in normal {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    fs::write(dir.join("morph.bin"), &bytes).unwrap();

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "uri": "morph.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": 8, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 80, "byteLength": 36 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC3" }}
  ],
  "meshes": [
    {{
      "primitives": [
        {{
          "attributes": {{ "POSITION": 1, "NORMAL": 2 }},
          "indices": 0,
          "targets": [{{ "NORMAL": 3 }}]
        }}
      ]
    }}
  ],
  "nodes": [{{ "mesh": 0, "scale": [2.0, 1.0, 1.0] }}],
  "scenes": [{{ "nodes": [0] }}],
  "scene": 0
}}"#,
        len = bytes.len()
    );
    let gltf_path = dir.join("morph.gltf");
    fs::write(&gltf_path, json).unwrap();
    AbsolutePath::new(gltf_path).unwrap()
}

#[test]
fn bake_reuses_renormalization_factor_for_morph_normals() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_morph_bake_gltf(dir.path());
    let mut loader = LoaderKind::for_path(&path).unwrap();
    let baked = loader
        .load_mesh(&MeshDescriptor {
            path: path.clone(),
            submesh_index: 0,
            bake_all_submeshes: true,
        })
        .expect("baked mesh should decode");

    let normals = baked.attribute(&AttributeName::Normal).unwrap();
    let morph_normals = baked
        .attribute(&AttributeName::Morph(Box::new(AttributeName::Normal), 0))
        .unwrap();

    // scale [2,1,1] gives normal_matrix diag(0.5,1,1); a raw (1,0,0) normal
    // transforms to (0.5,0,0), renormalization factor 2.0, back to unit (1,0,0).
    for v in 0..3 {
        let base = normals.as_vec3(v);
        let morph = morph_normals.as_vec3(v);
        assert!((base.norm() - 1.0).abs() < 1e-6);
        assert_eq!(base, morph, "morph normal must reuse the base normal's renormalization factor");
    }
}

#[test]
fn unsupported_extension_has_no_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = AbsolutePath::new(dir.path().join("model.obj")).unwrap();
    assert!(LoaderKind::for_path(&path).is_none());
}
