use std::collections::BTreeMap;

use super::compile::{BindingKind, CompiledStage, IoType, ResourceDecl, ShaderStage, UniformType};

/// Vertex buffer slots every program is fed from: position, then uv.
pub const VERTEX_INPUT_LOCATIONS: [u32; 2] = [0, 1];

/// What a uniform slot writes into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotTarget {
    /// A value inside a uniform buffer.
    Field { offset: u32, ty: UniformType },
    /// A texture binding; the slot value is the texture unit.
    Texture,
    /// A sampler binding; the slot value is the texture unit whose sampler is used.
    Sampler,
}

/// A named, individually addressable uniform of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    /// Index into `ProgramLayout::bindings`.
    pub binding: usize,
    pub target: SlotTarget,
}

/// Interface of a successfully linked vertex + fragment pair.
#[derive(Debug, Clone)]
pub struct ProgramLayout {
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Merged bindings of both stages, sorted by `(group, binding)`.
    pub bindings: Vec<ResourceDecl>,
    /// Uniform locations; a `UniformLocation` is an index into this list.
    pub slots: Vec<UniformSlot>,
}

impl ProgramLayout {
    /// Looks up a uniform slot by name.
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Number of bind groups (highest group index + 1).
    pub fn group_count(&self) -> u32 {
        self.bindings.iter().map(|b| b.group + 1).max().unwrap_or(0)
    }
}

/// Links a vertex and a fragment stage.
///
/// Every problem found is reported; the error string is the linker log, one
/// problem per line.
pub fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<ProgramLayout, String> {
    let mut problems: Vec<String> = Vec::new();

    if vertex.stage != ShaderStage::Vertex {
        problems.push(format!("vertex slot holds a {} shader", vertex.stage));
    }
    if fragment.stage != ShaderStage::Fragment {
        problems.push(format!("fragment slot holds a {} shader", fragment.stage));
    }

    for input in &vertex.inputs {
        if !VERTEX_INPUT_LOCATIONS.contains(&input.location) {
            problems.push(format!(
                "vertex input @location({}) has no vertex buffer (only 0 = position, 1 = uv exist)",
                input.location
            ));
        } else if input.ty != IoType::VEC2_F32 {
            problems.push(format!(
                "vertex input @location({}) is {}, expected {}",
                input.location,
                input.ty,
                IoType::VEC2_F32
            ));
        }
    }

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|o| o.location == input.location) {
            None => problems.push(format!(
                "fragment input @location({}) is not written by the vertex stage",
                input.location
            )),
            Some(out) if out.ty != input.ty => problems.push(format!(
                "@location({}) is {} in the vertex stage but {} in the fragment stage",
                input.location, out.ty, input.ty
            )),
            Some(_) => {}
        }
    }

    if !fragment.outputs.iter().any(|o| o.location == 0) {
        problems.push("fragment stage does not write @location(0)".to_owned());
    }

    let mut merged: BTreeMap<(u32, u32), ResourceDecl> = BTreeMap::new();
    for decl in vertex.resources.iter().chain(&fragment.resources) {
        match merged.get(&(decl.group, decl.binding)) {
            Some(existing) if existing != decl => problems.push(format!(
                "@group({}) @binding({}) is declared differently by the two stages (`{}` vs `{}`)",
                decl.group, decl.binding, existing.name, decl.name
            )),
            Some(_) => {}
            None => {
                merged.insert((decl.group, decl.binding), decl.clone());
            }
        }
    }
    let bindings: Vec<ResourceDecl> = merged.into_values().collect();

    let mut slots: Vec<UniformSlot> = Vec::new();
    for (index, decl) in bindings.iter().enumerate() {
        let mut push = |name: &str, target: SlotTarget| {
            if slots.iter().any(|s| s.name == name) {
                problems.push(format!("uniform name `{name}` is declared more than once"));
            } else {
                slots.push(UniformSlot { name: name.to_owned(), binding: index, target });
            }
        };
        match &decl.kind {
            BindingKind::UniformBuffer { fields, .. } => {
                for field in fields {
                    push(&field.name, SlotTarget::Field { offset: field.offset, ty: field.ty });
                }
            }
            BindingKind::Texture => push(&decl.name, SlotTarget::Texture),
            BindingKind::Sampler => push(&decl.name, SlotTarget::Sampler),
        }
    }

    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    Ok(ProgramLayout {
        vertex_entry: vertex.entry_point.clone(),
        fragment_entry: fragment.entry_point.clone(),
        bindings,
        slots,
    })
}
