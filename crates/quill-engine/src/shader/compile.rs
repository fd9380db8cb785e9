use std::fmt;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{
    AddressSpace, Binding, Handle, ImageClass, ImageDimension, Module, ScalarKind, Type,
    TypeInner, VectorSize,
};

/// Programmable stage a shader source is compiled for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Scalar class of a stage input/output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScalarClass {
    Float,
    Sint,
    Uint,
}

/// Type of a stage input/output (`f32`, `vec2<f32>`, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IoType {
    pub scalar: ScalarClass,
    pub components: u8,
}

impl IoType {
    pub const VEC2_F32: IoType = IoType { scalar: ScalarClass::Float, components: 2 };
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scalar = match self.scalar {
            ScalarClass::Float => "f32",
            ScalarClass::Sint => "i32",
            ScalarClass::Uint => "u32",
        };
        if self.components == 1 {
            f.write_str(scalar)
        } else {
            write!(f, "vec{}<{scalar}>", self.components)
        }
    }
}

/// A user-defined (`@location`) stage input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoVar {
    pub location: u32,
    pub ty: IoType,
}

/// Type of a uniform value, as far as the setters care.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UniformType {
    Int,
    Uint,
    Mat4,
    Other,
}

/// A named value inside a uniform buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub ty: UniformType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    UniformBuffer { size: u32, fields: Vec<UniformField> },
    Texture,
    Sampler,
}

/// A resource binding declared by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    pub group: u32,
    pub binding: u32,
    pub name: String,
    pub kind: BindingKind,
}

/// A validated stage plus the interface reflected from it.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub inputs: Vec<IoVar>,
    pub outputs: Vec<IoVar>,
    pub resources: Vec<ResourceDecl>,
}

/// Parses and validates one WGSL stage and reflects its interface.
///
/// The error string is the compiler diagnostic, formatted for logs.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    if source.trim().is_empty() {
        return Err(format!("{stage} shader source is empty"));
    }

    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::empty());
    validator
        .validate(&module)
        .map_err(|e| format!("validation failed: {}", error_chain(e.as_inner())))?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.to_naga())
        .ok_or_else(|| format!("no @{stage} entry point in source"))?;

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        collect_io(&module, arg.ty, arg.binding.as_ref(), &mut inputs)?;
    }

    let mut outputs = Vec::new();
    if let Some(result) = entry.function.result.as_ref() {
        collect_io(&module, result.ty, result.binding.as_ref(), &mut outputs)?;
    }

    let mut resources = reflect_resources(&module)?;
    resources.sort_by_key(|r| (r.group, r.binding));

    Ok(CompiledStage {
        stage,
        entry_point: entry.name.clone(),
        inputs,
        outputs,
        resources,
    })
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(cause) = cur {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        cur = cause.source();
    }
    out
}

fn collect_io(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<IoVar>,
) -> Result<(), String> {
    match binding {
        Some(Binding::Location { location, .. }) => {
            let io = io_type(&module.types[ty].inner)
                .ok_or_else(|| format!("@location({location}) has an unsupported type"))?;
            out.push(IoVar { location: *location, ty: io });
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_io(module, member.ty, member.binding.as_ref(), out)?;
                }
            }
        }
    }
    Ok(())
}

fn io_type(inner: &TypeInner) -> Option<IoType> {
    match *inner {
        TypeInner::Scalar(s) => Some(IoType { scalar: scalar_class(s.kind)?, components: 1 }),
        TypeInner::Vector { size, scalar } => Some(IoType {
            scalar: scalar_class(scalar.kind)?,
            components: vector_len(size),
        }),
        _ => None,
    }
}

fn scalar_class(kind: ScalarKind) -> Option<ScalarClass> {
    match kind {
        ScalarKind::Float => Some(ScalarClass::Float),
        ScalarKind::Sint => Some(ScalarClass::Sint),
        ScalarKind::Uint => Some(ScalarClass::Uint),
        _ => None,
    }
}

fn vector_len(size: VectorSize) -> u8 {
    match size {
        VectorSize::Bi => 2,
        VectorSize::Tri => 3,
        VectorSize::Quad => 4,
    }
}

fn reflect_resources(module: &Module) -> Result<Vec<ResourceDecl>, String> {
    let mut out = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(rb) = var.binding.as_ref() else { continue };
        let name = var.name.clone().unwrap_or_default();
        let inner = &module.types[var.ty].inner;

        let kind = match var.space {
            AddressSpace::Uniform => BindingKind::UniformBuffer {
                size: inner.size(module.to_ctx()),
                fields: uniform_fields(module, &name, inner),
            },
            AddressSpace::Handle => match *inner {
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class: ImageClass::Sampled { kind: ScalarKind::Float, multi: false },
                } => BindingKind::Texture,
                TypeInner::Sampler { comparison: false } => BindingKind::Sampler,
                _ => {
                    return Err(format!(
                        "`{name}` at @group({}) @binding({}): only texture_2d<f32> and sampler are supported",
                        rb.group, rb.binding
                    ));
                }
            },
            _ => {
                return Err(format!(
                    "`{name}` at @group({}) @binding({}): only uniform buffers, textures and samplers are supported",
                    rb.group, rb.binding
                ));
            }
        };

        out.push(ResourceDecl { group: rb.group, binding: rb.binding, name, kind });
    }

    Ok(out)
}

fn uniform_fields(module: &Module, var_name: &str, inner: &TypeInner) -> Vec<UniformField> {
    match inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| {
                Some(UniformField {
                    name: m.name.clone()?,
                    offset: m.offset,
                    ty: uniform_type(&module.types[m.ty].inner),
                })
            })
            .collect(),
        other => vec![UniformField {
            name: var_name.to_owned(),
            offset: 0,
            ty: uniform_type(other),
        }],
    }
}

fn uniform_type(inner: &TypeInner) -> UniformType {
    match *inner {
        TypeInner::Matrix { columns: VectorSize::Quad, rows: VectorSize::Quad, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
        {
            UniformType::Mat4
        }
        TypeInner::Scalar(s) if s.kind == ScalarKind::Sint && s.width == 4 => UniformType::Int,
        TypeInner::Scalar(s) if s.kind == ScalarKind::Uint && s.width == 4 => UniformType::Uint,
        _ => UniformType::Other,
    }
}
