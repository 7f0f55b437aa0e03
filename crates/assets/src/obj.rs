use std::path::Path;

use hearth_render::{MeshData, Secondary};

use crate::AssetError;

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

pub(crate) fn load_obj_file(path: &Path) -> Result<MeshData, AssetError> {
    let (models, materials) = tobj::load_obj(path, &load_options())?;
    if let Err(err) = materials {
        tracing::debug!(path = %path.display(), error = %err, "OBJ materials ignored");
    }
    let data = merge_models(&path.display().to_string(), &models)?;
    tracing::debug!(
        path = %path.display(),
        models = models.len(),
        vertices = data.vertex_count(),
        triangles = data.triangle_count(),
        "OBJ mesh loaded"
    );
    Ok(data)
}

/// Parse OBJ text that references no material libraries.
pub fn mesh_data_from_obj(name: &str, text: &str) -> Result<MeshData, AssetError> {
    let mut reader = std::io::BufReader::new(text.as_bytes());
    let (models, _) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;
    merge_models(name, &models)
}

/// Concatenate every model into one indexed mesh.
///
/// Texture coordinates are kept when every model has them (with `v` flipped
/// so row 0 is the top of the image); otherwise vertex colours, otherwise
/// plain white. Normals are kept only when every model has them.
fn merge_models(name: &str, models: &[tobj::Model]) -> Result<MeshData, AssetError> {
    let malformed = |reason: String| AssetError::Malformed {
        name: name.to_owned(),
        reason,
    };
    if models.iter().all(|m| m.mesh.positions.is_empty()) {
        return Err(malformed("no geometry".into()));
    }

    let vertex_count = |m: &tobj::Model| m.mesh.positions.len() / 3;
    let all_texcoords = models
        .iter()
        .all(|m| m.mesh.texcoords.len() == vertex_count(m) * 2);
    let all_colors = models
        .iter()
        .all(|m| m.mesh.vertex_color.len() == vertex_count(m) * 3);
    let all_normals = models
        .iter()
        .all(|m| m.mesh.normals.len() == vertex_count(m) * 3);

    let mut positions = Vec::new();
    let mut secondary = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();
    for model in models {
        let mesh = &model.mesh;
        let base = u32::try_from(positions.len() / 3)
            .map_err(|_| malformed("more than u32::MAX vertices".into()))?;
        positions.extend_from_slice(&mesh.positions);
        if all_texcoords {
            for uv in mesh.texcoords.chunks_exact(2) {
                secondary.extend_from_slice(&[uv[0], 1.0 - uv[1]]);
            }
        } else if all_colors {
            secondary.extend_from_slice(&mesh.vertex_color);
        } else {
            secondary.resize(secondary.len() + vertex_count(model) * 3, 1.0);
        }
        if all_normals {
            normals.extend_from_slice(&mesh.normals);
        }
        indices.extend(mesh.indices.iter().map(|i| i + base));
    }

    let data = MeshData {
        positions,
        secondary: if all_texcoords {
            Secondary::TexCoords(secondary)
        } else {
            Secondary::Colors(secondary)
        },
        normals,
        indices,
    };
    data.validate().map_err(|e| malformed(e.to_string()))?;
    Ok(data)
}
