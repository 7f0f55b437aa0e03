use std::collections::HashMap;

use hearth_common::PointLight;

use crate::device::{
    GpuDevice, GpuError, ProgramId, ShaderId, ShaderStage, UniformLocation, UniformValue,
};
use crate::error::RenderError;
use crate::material::{LightUniforms, Material, UniformSource};

/// Lifecycle of a [`ShaderProgram`]. Being bound is not a state of the
/// program itself: it lasts exactly as long as a [`BoundProgram`] guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Uncompiled,
    Compiled,
    Linked,
    Released,
}

/// A GPU program built from compiled stages, plus the name to location
/// cache of its uniforms.
///
/// Uniforms are resolved once with [`create_uniform`](Self::create_uniform)
/// after linking; every later lookup is served from the cache.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    stages: Vec<(ShaderStage, ShaderId)>,
    state: ProgramState,
    uniforms: HashMap<String, UniformLocation>,
}

impl ShaderProgram {
    pub fn new(device: &mut dyn GpuDevice) -> Result<Self, RenderError> {
        let id = device
            .create_program()
            .map_err(|e| RenderError::resource(format!("could not create shader program: {e}")))?;
        Ok(Self {
            id,
            stages: Vec::new(),
            state: ProgramState::Uncompiled,
            uniforms: HashMap::new(),
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Compile one stage and attach it.
    pub fn compile(
        &mut self,
        device: &mut dyn GpuDevice,
        stage: ShaderStage,
        source: &str,
    ) -> Result<(), RenderError> {
        if !matches!(self.state, ProgramState::Uncompiled | ProgramState::Compiled) {
            return Err(GpuError::InvalidState(format!(
                "cannot compile a {stage} stage into a {:?} program",
                self.state
            ))
            .into());
        }
        let shader = device.compile_shader(stage, source).map_err(|e| match e {
            GpuError::Compile(log) => RenderError::Compile { stage, log },
            other => RenderError::Gpu(other),
        })?;
        if let Err(err) = device.attach_shader(self.id, shader) {
            release_shader(device, shader);
            return Err(err.into());
        }
        tracing::debug!(program = %self.id, %stage, %shader, "shader stage compiled");
        self.stages.push((stage, shader));
        self.state = ProgramState::Compiled;
        Ok(())
    }

    /// Link the compiled stages. The stage objects are deleted afterwards;
    /// the program keeps the linked code.
    pub fn link(&mut self, device: &mut dyn GpuDevice) -> Result<(), RenderError> {
        match self.state {
            ProgramState::Compiled => {}
            ProgramState::Uncompiled => {
                return Err(RenderError::Link {
                    log: "no compiled shader stages".into(),
                });
            }
            state => {
                return Err(GpuError::InvalidState(format!("cannot link a {state:?} program")).into());
            }
        }
        device.link_program(self.id).map_err(|e| match e {
            GpuError::Link(log) => RenderError::Link { log },
            other => RenderError::Gpu(other),
        })?;
        for (_, shader) in self.stages.drain(..) {
            release_shader(device, shader);
        }
        self.state = ProgramState::Linked;
        tracing::debug!(program = %self.id, "shader program linked");
        Ok(())
    }

    /// Resolve `name` and cache its location. Resolving a name twice returns
    /// the cached location.
    pub fn create_uniform(
        &mut self,
        device: &mut dyn GpuDevice,
        name: &str,
    ) -> Result<UniformLocation, RenderError> {
        if self.state != ProgramState::Linked {
            return Err(RenderError::uniform(name));
        }
        if let Some(location) = self.uniforms.get(name) {
            return Ok(*location);
        }
        let location = device
            .uniform_location(self.id, name)
            .ok_or_else(|| RenderError::uniform(name))?;
        self.uniforms.insert(name.to_owned(), location);
        Ok(location)
    }

    /// Register every member of a uniform struct under `prefix`.
    pub fn create_struct_uniform(
        &mut self,
        device: &mut dyn GpuDevice,
        prefix: &str,
        layout: &dyn UniformSource,
    ) -> Result<(), RenderError> {
        for (member, _) in layout.uniforms() {
            self.create_uniform(device, &format!("{prefix}.{member}"))?;
        }
        Ok(())
    }

    pub fn create_material_uniform(
        &mut self,
        device: &mut dyn GpuDevice,
        prefix: &str,
    ) -> Result<(), RenderError> {
        self.create_struct_uniform(device, prefix, &Material::default())
    }

    pub fn create_point_light_uniform(
        &mut self,
        device: &mut dyn GpuDevice,
        prefix: &str,
    ) -> Result<(), RenderError> {
        self.create_struct_uniform(device, prefix, &LightUniforms(&PointLight::default()))
    }

    /// Cached location of a registered uniform.
    pub fn location(&self, name: &str) -> Result<UniformLocation, RenderError> {
        if self.state != ProgramState::Linked {
            return Err(RenderError::uniform(name));
        }
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::uniform(name))
    }

    /// Make this the program in use. Uniform uploads go through the returned
    /// guard, which unbinds the program when dropped.
    pub fn bind<'a>(
        &'a self,
        device: &'a mut dyn GpuDevice,
    ) -> Result<BoundProgram<'a>, RenderError> {
        if self.state != ProgramState::Linked {
            return Err(GpuError::InvalidState(format!(
                "cannot bind a {:?} program",
                self.state
            ))
            .into());
        }
        device.use_program(Some(self.id))?;
        Ok(BoundProgram {
            program: self,
            device,
            uploads: 0,
        })
    }

    /// Delete the program and any stages not yet linked. Safe to call more
    /// than once.
    pub fn cleanup(&mut self, device: &mut dyn GpuDevice) {
        if self.state == ProgramState::Released {
            return;
        }
        for (_, shader) in self.stages.drain(..) {
            release_shader(device, shader);
        }
        match device.delete_program(self.id) {
            Ok(()) => tracing::debug!(program = %self.id, "shader program released"),
            Err(err) => {
                tracing::warn!(program = %self.id, error = %err, "shader program release failed")
            }
        }
        self.uniforms.clear();
        self.state = ProgramState::Released;
    }
}

fn release_shader(device: &mut dyn GpuDevice, shader: ShaderId) {
    if let Err(err) = device.delete_shader(shader) {
        tracing::warn!(%shader, error = %err, "shader stage release failed");
    }
}

/// A program in use. Uploads resolve names through the program's cache.
pub struct BoundProgram<'a> {
    program: &'a ShaderProgram,
    device: &'a mut dyn GpuDevice,
    uploads: u32,
}

impl BoundProgram<'_> {
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), RenderError> {
        let location = self.program.location(name)?;
        self.device.set_uniform(location, &value)?;
        self.uploads += 1;
        Ok(())
    }

    /// Upload every member of `source` under `prefix`.
    pub fn set_source(
        &mut self,
        prefix: &str,
        source: &dyn UniformSource,
    ) -> Result<(), RenderError> {
        for (member, value) in source.uniforms() {
            self.set_uniform(&format!("{prefix}.{member}"), value)?;
        }
        Ok(())
    }

    pub fn set_material(&mut self, prefix: &str, material: &Material) -> Result<(), RenderError> {
        self.set_source(prefix, material)
    }

    pub fn set_point_light(&mut self, prefix: &str, light: &PointLight) -> Result<(), RenderError> {
        self.set_source(prefix, &LightUniforms(light))
    }

    /// The device, for draws issued while the program is in use.
    pub fn device(&mut self) -> &mut dyn GpuDevice {
        &mut *self.device
    }

    /// Uniform uploads made through this guard.
    pub fn uploads(&self) -> u32 {
        self.uploads
    }
}

impl Drop for BoundProgram<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.device.use_program(None) {
            tracing::warn!(program = %self.program.id, error = %err, "program unbind failed");
        }
    }
}
