//! Mesh drawing inside a render pass, through the `ShaderProgram` seam.
//!
//! Meshes talk in texture units and sampler names. [`TextureBindings`] keeps
//! that state and resolves it to the four fixed material slots of the mesh
//! pipeline; [`MaterialBindings`] caches one bind group per slot combination.

use std::collections::HashMap;
use std::num::NonZeroU64;

use asset::gpu::{GpuMeshId, GpuTextureId, ShaderProgram};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, BufferBindingType, BufferUsages, Device, IndexFormat,
    RenderPass, SamplerBindingType, ShaderStages, TextureSampleType, TextureViewDimension,
};

use crate::device::WgpuDevice;

/// Sampler uniforms of the mesh pipeline, in binding order.
pub const SLOT_NAMES: [&str; 4] = [
    "texture_diffuse1",
    "texture_specular1",
    "texture_normal1",
    "texture_height1",
];

const SAMPLER_BINDING: u32 = 4;
const MATERIAL_BINDING: u32 = 5;

pub type SlotTextures = [Option<GpuTextureId>; 4];

/// Per-slot channel counts as the fragment shader reads them.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct MaterialUniform {
    channels: [u32; 4],
}

/// Texture-unit state of the pass.
#[derive(Debug, Default)]
pub struct TextureBindings {
    active_unit: u32,
    slot_units: [Option<u32>; 4],
    units: HashMap<u32, GpuTextureId>,
}

impl TextureBindings {
    pub fn activate(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    /// Returns `false` for names the pipeline does not declare.
    pub fn set_sampler(&mut self, name: &str, unit: u32) -> bool {
        match SLOT_NAMES.iter().position(|slot| *slot == name) {
            Some(slot) => {
                self.slot_units[slot] = Some(unit);
                true
            }
            None => false,
        }
    }

    pub fn bind(&mut self, texture: GpuTextureId) {
        self.units.insert(self.active_unit, texture);
    }

    /// Texture seen by each slot: the one bound to the unit its sampler points at.
    pub fn resolve(&self) -> SlotTextures {
        self.slot_units
            .map(|unit| unit.and_then(|u| self.units.get(&u).copied()))
    }

    /// Forget unit bindings; sampler assignments stay, as uniforms do.
    pub fn clear_units(&mut self) {
        self.units.clear();
    }
}

/// Layout and cached bind groups of material group 1.
pub struct MaterialBindings {
    layout: BindGroupLayout,
    groups: HashMap<SlotTextures, BindGroup>,
}

impl MaterialBindings {
    pub fn new(device: &Device) -> Self {
        let texture_entry = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let mut entries: Vec<_> = (0..SLOT_NAMES.len() as u32).map(texture_entry).collect();
        entries.push(BindGroupLayoutEntry {
            binding: SAMPLER_BINDING,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
            count: None,
        });
        entries.push(BindGroupLayoutEntry {
            binding: MATERIAL_BINDING,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<MaterialUniform>() as u64),
            },
            count: None,
        });

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
            entries: &entries,
        });
        Self {
            layout,
            groups: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }

    pub fn cached(&self) -> usize {
        self.groups.len()
    }

    fn get_or_create(&mut self, gpu: &WgpuDevice, slots: SlotTextures) -> &BindGroup {
        let layout = &self.layout;
        self.groups
            .entry(slots)
            .or_insert_with(|| create_bind_group(gpu, layout, slots))
    }
}

fn create_bind_group(
    gpu: &WgpuDevice,
    layout: &BindGroupLayout,
    slots: SlotTextures,
) -> BindGroup {
    let bound = slots.map(|id| id.and_then(|id| gpu.texture(id)));
    let fallback = gpu.fallback_texture();

    let uniform = MaterialUniform {
        channels: bound.map(|t| t.map_or(0, |t| t.channels)),
    };
    let buffer = gpu
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material UBO"),
            contents: bytemuck::bytes_of(&uniform),
            usage: BufferUsages::UNIFORM,
        });

    // textures in one group share a sampler; the first bound one wins
    let sampler = bound
        .iter()
        .flatten()
        .next()
        .map_or(fallback.sampler, |t| t.sampler);

    let mut entries: Vec<BindGroupEntry<'_>> = bound
        .iter()
        .enumerate()
        .map(|(slot, texture)| BindGroupEntry {
            binding: slot as u32,
            resource: BindingResource::TextureView(&texture.unwrap_or(fallback).view),
        })
        .collect();
    entries.push(BindGroupEntry {
        binding: SAMPLER_BINDING,
        resource: BindingResource::Sampler(gpu.sampler(sampler)),
    });
    entries.push(BindGroupEntry {
        binding: MATERIAL_BINDING,
        resource: buffer.as_entire_binding(),
    });

    gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Material BG"),
        layout,
        entries: &entries,
    })
}

/// [`ShaderProgram`] over an open render pass with the mesh pipeline set.
pub struct MeshPass<'a, 'p> {
    pass: &'a mut RenderPass<'p>,
    gpu: &'a WgpuDevice,
    materials: &'a mut MaterialBindings,
    bindings: TextureBindings,
    draws: u32,
}

impl<'a, 'p> MeshPass<'a, 'p> {
    pub fn new(
        pass: &'a mut RenderPass<'p>,
        gpu: &'a WgpuDevice,
        materials: &'a mut MaterialBindings,
    ) -> Self {
        Self {
            pass,
            gpu,
            materials,
            bindings: TextureBindings::default(),
            draws: 0,
        }
    }

    pub fn draw_count(&self) -> u32 {
        self.draws
    }
}

impl ShaderProgram for MeshPass<'_, '_> {
    fn active_texture(&mut self, unit: u32) {
        self.bindings.activate(unit);
    }

    fn set_sampler(&mut self, name: &str, unit: u32) {
        if !self.bindings.set_sampler(name, unit) {
            log::trace!("Sampler '{name}' not declared by the mesh pipeline");
        }
    }

    fn bind_texture(&mut self, texture: GpuTextureId) {
        self.bindings.bind(texture);
    }

    fn draw_indexed(&mut self, mesh: GpuMeshId, index_count: u32) {
        let gpu = self.gpu;
        let Some(buffers) = gpu.mesh(mesh) else {
            log::warn!("Draw of unknown or released mesh {mesh:?} skipped");
            return;
        };
        let group = self
            .materials
            .get_or_create(gpu, self.bindings.resolve());

        self.pass.set_bind_group(1, group, &[]);
        self.pass.set_vertex_buffer(0, buffers.vertex.slice(..));
        self.pass
            .set_index_buffer(buffers.index.slice(..), IndexFormat::Uint32);
        self.pass
            .draw_indexed(0..index_count.min(buffers.index_count), 0, 0..1);
        self.bindings.clear_units();
        self.draws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_follow_sampler_units() {
        let mut b = TextureBindings::default();
        b.activate(0);
        assert!(b.set_sampler("texture_diffuse1", 0));
        b.bind(GpuTextureId(7));
        b.activate(1);
        assert!(b.set_sampler("texture_normal1", 1));
        b.bind(GpuTextureId(3));

        assert_eq!(b.resolve(), [Some(GpuTextureId(7)), None, Some(GpuTextureId(3)), None]);
    }

    #[test]
    fn undeclared_names_are_ignored() {
        let mut b = TextureBindings::default();
        assert!(!b.set_sampler("texture_diffuse2", 0));
        assert!(!b.set_sampler("texture_emissive1", 0));
        b.bind(GpuTextureId(1));
        assert_eq!(b.resolve(), [None; 4]);
    }

    #[test]
    fn sampler_pointing_at_empty_unit_resolves_to_none() {
        let mut b = TextureBindings::default();
        b.set_sampler("texture_specular1", 2);
        b.activate(0);
        b.bind(GpuTextureId(5));
        assert_eq!(b.resolve()[1], None);
    }

    #[test]
    fn clearing_units_keeps_sampler_assignments() {
        let mut b = TextureBindings::default();
        b.set_sampler("texture_diffuse1", 0);
        b.bind(GpuTextureId(2));
        b.clear_units();
        assert_eq!(b.resolve()[0], None);

        b.bind(GpuTextureId(4));
        assert_eq!(b.resolve()[0], Some(GpuTextureId(4)));
    }
}
