use glam::Mat4;

use super::compile::{BindingKind, UniformType};
use super::link::{ProgramLayout, SlotTarget};

/// CPU shadow of a linked program's uniform values.
///
/// One byte block per uniform buffer binding plus one texture unit per
/// texture/sampler binding. Both drivers snapshot this at draw time.
#[derive(Debug, Clone)]
pub struct UniformState {
    layout: ProgramLayout,
    blocks: Vec<Vec<u8>>,
    units: Vec<u32>,
}

impl UniformState {
    pub fn new(layout: ProgramLayout) -> Self {
        let blocks = layout
            .bindings
            .iter()
            .map(|b| match &b.kind {
                BindingKind::UniformBuffer { size, .. } => vec![0u8; *size as usize],
                _ => Vec::new(),
            })
            .collect();
        let units = vec![0; layout.bindings.len()];
        Self { layout, blocks, units }
    }

    #[inline]
    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// Writes an integer slot. Texture and sampler slots take the unit index.
    pub fn write_i32(&mut self, slot: usize, value: i32) -> Result<(), String> {
        let s = self.slot(slot)?;
        match s.target {
            SlotTarget::Field { offset, ty: UniformType::Int | UniformType::Uint } => {
                self.write_bytes(s.binding, offset, bytemuck::bytes_of(&value));
                Ok(())
            }
            SlotTarget::Texture | SlotTarget::Sampler => {
                let unit = u32::try_from(value)
                    .map_err(|_| format!("texture unit {value} for `{}` is negative", s.name))?;
                self.units[s.binding] = unit;
                Ok(())
            }
            SlotTarget::Field { .. } => Err(format!("uniform `{}` is not an integer", s.name)),
        }
    }

    /// Writes a column-major 4x4 matrix slot.
    pub fn write_mat4(&mut self, slot: usize, value: &Mat4) -> Result<(), String> {
        let s = self.slot(slot)?;
        match s.target {
            SlotTarget::Field { offset, ty: UniformType::Mat4 } => {
                self.write_bytes(s.binding, offset, bytemuck::cast_slice(&value.to_cols_array()));
                Ok(())
            }
            _ => Err(format!("uniform `{}` is not a mat4x4<f32>", s.name)),
        }
    }

    /// Current value of a matrix uniform, by name.
    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        let s = self.layout.slots.get(self.layout.slot_index(name)?)?;
        let SlotTarget::Field { offset, ty: UniformType::Mat4 } = s.target else {
            return None;
        };
        let bytes = self.field_bytes(s.binding, offset, 64)?;
        let cols: [f32; 16] = bytemuck::pod_read_unaligned(bytes);
        Some(Mat4::from_cols_array(&cols))
    }

    /// Current value of an integer uniform, or the unit of a texture/sampler slot.
    pub fn int(&self, name: &str) -> Option<i32> {
        let s = self.layout.slots.get(self.layout.slot_index(name)?)?;
        match s.target {
            SlotTarget::Field { offset, ty: UniformType::Int | UniformType::Uint } => {
                Some(bytemuck::pod_read_unaligned(self.field_bytes(s.binding, offset, 4)?))
            }
            SlotTarget::Texture | SlotTarget::Sampler => i32::try_from(self.units[s.binding]).ok(),
            SlotTarget::Field { .. } => None,
        }
    }

    /// Byte block of a uniform buffer binding (empty for textures/samplers).
    #[inline]
    pub fn block(&self, binding: usize) -> &[u8] {
        self.blocks.get(binding).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Texture unit a texture/sampler binding reads from.
    #[inline]
    pub fn unit(&self, binding: usize) -> u32 {
        self.units.get(binding).copied().unwrap_or(0)
    }

    fn slot(&self, slot: usize) -> Result<super::link::UniformSlot, String> {
        self.layout
            .slots
            .get(slot)
            .cloned()
            .ok_or_else(|| format!("uniform location {slot} does not exist"))
    }

    fn field_bytes(&self, binding: usize, offset: u32, len: usize) -> Option<&[u8]> {
        let start = offset as usize;
        self.blocks.get(binding)?.get(start..start + len)
    }

    fn write_bytes(&mut self, binding: usize, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        if let Some(dst) = self
            .blocks
            .get_mut(binding)
            .and_then(|b| b.get_mut(start..start + bytes.len()))
        {
            dst.copy_from_slice(bytes);
        }
    }
}
