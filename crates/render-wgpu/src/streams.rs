use hearth_render::{BufferId, GpuError, VertexLayout};

/// Shader input locations the scene pipeline reads.
pub const STREAM_COUNT: usize = 3;

/// Values fed to an input location the vertex array does not provide.
pub const FALLBACKS: [[f32; 3]; STREAM_COUNT] = [
    [0.0, 0.0, 0.0],
    // White, so untextured meshes without colours are lit as-is.
    [1.0, 1.0, 1.0],
    [0.0, 0.0, 1.0],
];

/// Where one input location reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Attribute { buffer: BufferId, components: u32 },
    Fallback,
}

/// Pipelines differ only in the component count of each location.
pub type StreamShape = [Option<u32>; STREAM_COUNT];

/// Map a vertex array layout onto locations 0..3.
pub fn resolve(layout: &VertexLayout) -> Result<[Stream; STREAM_COUNT], GpuError> {
    let mut streams = [Stream::Fallback; STREAM_COUNT];
    for attribute in &layout.attributes {
        let slot = streams
            .get_mut(attribute.location as usize)
            .ok_or_else(|| {
                GpuError::InvalidState(format!(
                    "attribute location {} is not read by the scene pipeline",
                    attribute.location
                ))
            })?;
        if *slot != Stream::Fallback {
            return Err(GpuError::InvalidState(format!(
                "attribute location {} bound twice",
                attribute.location
            )));
        }
        if !(2..=4).contains(&attribute.components) {
            return Err(GpuError::InvalidState(format!(
                "{} components at location {}",
                attribute.components, attribute.location
            )));
        }
        *slot = Stream::Attribute {
            buffer: attribute.buffer,
            components: attribute.components,
        };
    }
    if streams[0] == Stream::Fallback {
        return Err(GpuError::InvalidState("vertex array has no positions".into()));
    }
    Ok(streams)
}

pub fn shape(streams: &[Stream; STREAM_COUNT]) -> StreamShape {
    streams.map(|s| match s {
        Stream::Attribute { components, .. } => Some(components),
        Stream::Fallback => None,
    })
}

pub fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// One buffer layout per location. Fallbacks are single-instance buffers, so
/// every vertex of the draw reads the same value.
pub fn buffer_layouts(shape: &StreamShape) -> Vec<(wgpu::VertexStepMode, u64, wgpu::VertexFormat)> {
    shape
        .iter()
        .map(|components| match components {
            Some(n) => (
                wgpu::VertexStepMode::Vertex,
                u64::from(*n) * 4,
                vertex_format(*n),
            ),
            None => (
                wgpu::VertexStepMode::Instance,
                12,
                wgpu::VertexFormat::Float32x3,
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_render::VertexAttribute;

    fn layout(attributes: &[(u32, u32, u32)]) -> VertexLayout {
        VertexLayout {
            attributes: attributes
                .iter()
                .map(|&(location, buffer, components)| VertexAttribute {
                    location,
                    buffer: BufferId(buffer),
                    components,
                })
                .collect(),
            index_buffer: BufferId(99),
        }
    }

    #[test]
    fn missing_normals_fall_back() {
        let streams = resolve(&layout(&[(0, 1, 3), (1, 2, 2)])).unwrap();
        assert_eq!(shape(&streams), [Some(3), Some(2), None]);
        assert_eq!(streams[2], Stream::Fallback);
    }

    #[test]
    fn positions_are_required() {
        assert!(matches!(
            resolve(&layout(&[(1, 2, 3)])),
            Err(GpuError::InvalidState(_))
        ));
    }

    #[test]
    fn out_of_range_and_duplicate_locations_are_rejected() {
        assert!(resolve(&layout(&[(0, 1, 3), (3, 2, 3)])).is_err());
        assert!(resolve(&layout(&[(0, 1, 3), (0, 2, 3)])).is_err());
        assert!(resolve(&layout(&[(0, 1, 5)])).is_err());
    }

    #[test]
    fn fallback_streams_step_per_instance() {
        let layouts = buffer_layouts(&[Some(3), Some(2), None]);
        assert_eq!(layouts[0].1, 12);
        assert_eq!(layouts[1], (wgpu::VertexStepMode::Vertex, 8, wgpu::VertexFormat::Float32x2));
        assert_eq!(layouts[2].0, wgpu::VertexStepMode::Instance);
    }
}
