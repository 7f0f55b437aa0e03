//! Uniform block reflection for WGSL sources.
//!
//! The scene stages declare their uniforms as one `var<uniform>` struct.
//! wgpu has no per-name uniform upload, so the device keeps a CPU copy of
//! that struct and writes values at offsets computed here, following the
//! WGSL layout rules for the uniform address space.

use std::collections::HashMap;

use hearth_render::UniformValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("no var<uniform> declaration")]
    NoUniformBlock,
    #[error("malformed declaration: {0}")]
    Syntax(String),
    #[error("member `{member}` has unsupported type `{ty}`")]
    UnsupportedType { member: String, ty: String },
    #[error("struct `{0}` contains itself")]
    Recursive(String),
}

/// Leaf types a uniform member can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    I32,
    U32,
    F32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl FieldKind {
    fn parse(ty: &str) -> Option<Self> {
        let kind = match ty {
            "i32" => FieldKind::I32,
            "u32" => FieldKind::U32,
            "f32" => FieldKind::F32,
            "vec2<f32>" | "vec2f" => FieldKind::Vec2,
            "vec3<f32>" | "vec3f" => FieldKind::Vec3,
            "vec4<f32>" | "vec4f" => FieldKind::Vec4,
            "mat4x4<f32>" | "mat4x4f" => FieldKind::Mat4,
            _ => return None,
        };
        Some(kind)
    }

    pub fn size(self) -> u32 {
        match self {
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::Vec2 => 8,
            FieldKind::Vec3 => 12,
            FieldKind::Vec4 => 16,
            FieldKind::Mat4 => 64,
        }
    }

    pub fn align(self) -> u32 {
        match self {
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::Vec2 => 8,
            FieldKind::Vec3 | FieldKind::Vec4 | FieldKind::Mat4 => 16,
        }
    }

    fn accepts(self, value: &UniformValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::I32 | FieldKind::U32, UniformValue::Int(_))
                | (FieldKind::F32, UniformValue::Float(_))
                | (FieldKind::Vec3, UniformValue::Vec3(_))
                | (FieldKind::Vec4, UniformValue::Vec4(_))
                | (FieldKind::Mat4, UniformValue::Mat4(_))
        )
    }
}

/// One leaf member, addressed by its dotted path (`material.diffuse`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub kind: FieldKind,
}

/// Flattened layout of the uniform struct of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub type_name: String,
    pub size: u32,
    pub fields: Vec<UniformField>,
}

impl UniformBlock {
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Write `value` into `shadow` at the offset of field `index`.
    pub fn write(&self, shadow: &mut [u8], index: usize, value: &UniformValue) -> Result<(), String> {
        let field = self
            .fields
            .get(index)
            .ok_or_else(|| format!("uniform index {index} out of range"))?;
        if !field.kind.accepts(value) {
            return Err(format!(
                "`{}` is {:?}, got {}",
                field.name,
                field.kind,
                value.type_name()
            ));
        }
        let start = field.offset as usize;
        let end = start + field.kind.size() as usize;
        let target = shadow
            .get_mut(start..end)
            .ok_or_else(|| format!("`{}` lies outside the uniform buffer", field.name))?;
        match value {
            UniformValue::Int(v) => target.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Float(v) => target.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => target.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => target.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat4(m) => {
                target.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
            }
        }
        Ok(())
    }
}

/// Find the `var<uniform>` declaration in `source` and lay out its type.
pub fn reflect(source: &str) -> Result<UniformBlock, LayoutError> {
    let source = strip_comments(source);
    let structs = parse_structs(&source)?;
    let type_name = uniform_type(&source)?;

    let mut fields = Vec::new();
    let mut stack = Vec::new();
    let (_, size) = struct_layout(&structs, &type_name, "", &mut stack, &mut fields)?;
    Ok(UniformBlock {
        type_name,
        size,
        fields,
    })
}

fn round_up(align: u32, n: u32) -> u32 {
    n.div_ceil(align) * align
}

fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| match line.find("//") {
            Some(at) => &line[..at],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

type Members = Vec<(String, String)>;

fn parse_structs(source: &str) -> Result<HashMap<String, Members>, LayoutError> {
    let mut structs = HashMap::new();
    let mut rest = source;
    while let Some(at) = find_keyword(rest, "struct") {
        rest = &rest[at + "struct".len()..];
        let open = rest
            .find('{')
            .ok_or_else(|| LayoutError::Syntax("struct without body".into()))?;
        let name = rest[..open].trim().to_owned();
        let close = rest[open..]
            .find('}')
            .ok_or_else(|| LayoutError::Syntax(format!("unterminated struct {name}")))?
            + open;
        let members = rest[open + 1..close]
            .split(',')
            .map(strip_attributes)
            .filter(|m| !m.is_empty())
            .map(|m| {
                let (member, ty) = m
                    .split_once(':')
                    .ok_or_else(|| LayoutError::Syntax(format!("{name}: `{m}`")))?;
                let ty: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
                Ok((member.trim().to_owned(), ty))
            })
            .collect::<Result<Members, LayoutError>>()?;
        structs.insert(name, members);
        rest = &rest[close + 1..];
    }
    Ok(structs)
}

/// Position of `word` as a whole identifier.
fn find_keyword(haystack: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut from = 0;
    while let Some(found) = haystack[from..].find(word) {
        let at = from + found;
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + word.len()..].chars().next();
        if !before.is_some_and(is_ident) && !after.is_some_and(is_ident) {
            return Some(at);
        }
        from = at + word.len();
    }
    None
}

/// Drop leading `@name` / `@name(...)` attributes from a member.
fn strip_attributes(member: &str) -> &str {
    let mut m = member.trim();
    while let Some(rest) = m.strip_prefix('@') {
        let name_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let mut after = rest[name_end..].trim_start();
        if after.starts_with('(') {
            after = match after.find(')') {
                Some(close) => &after[close + 1..],
                None => "",
            };
        }
        m = after.trim_start();
    }
    m
}

fn uniform_type(source: &str) -> Result<String, LayoutError> {
    let at = source
        .find("var<uniform>")
        .ok_or(LayoutError::NoUniformBlock)?;
    let decl = &source[at + "var<uniform>".len()..];
    let decl = &decl[..decl.find(';').unwrap_or(decl.len())];
    let (_, ty) = decl
        .split_once(':')
        .ok_or_else(|| LayoutError::Syntax(format!("var<uniform>{decl}")))?;
    Ok(ty.trim().to_owned())
}

/// Returns `(align, size)` of struct `name` in the uniform address space and
/// appends its leaves to `fields` relative to offset 0 of the struct.
fn struct_layout(
    structs: &HashMap<String, Members>,
    name: &str,
    prefix: &str,
    stack: &mut Vec<String>,
    fields: &mut Vec<UniformField>,
) -> Result<(u32, u32), LayoutError> {
    let members = structs.get(name).ok_or_else(|| LayoutError::UnsupportedType {
        member: prefix.trim_end_matches('.').to_owned(),
        ty: name.to_owned(),
    })?;
    if stack.iter().any(|s| s == name) {
        return Err(LayoutError::Recursive(name.to_owned()));
    }
    stack.push(name.to_owned());

    let mut offset = 0;
    let mut align = 1;
    for (member, ty) in members {
        let path = format!("{prefix}{member}");
        if let Some(kind) = FieldKind::parse(ty) {
            offset = round_up(kind.align(), offset);
            fields.push(UniformField {
                name: path,
                offset,
                kind,
            });
            offset += kind.size();
            align = align.max(kind.align());
        } else {
            let mut nested = Vec::new();
            let (inner_align, inner_size) =
                struct_layout(structs, ty, &format!("{path}."), stack, &mut nested)?;
            let member_align = round_up(16, inner_align);
            offset = round_up(member_align, offset);
            fields.extend(nested.into_iter().map(|mut f| {
                f.offset += offset;
                f
            }));
            offset += round_up(member_align, inner_size);
            align = align.max(member_align);
        }
    }

    stack.pop();
    Ok((align, round_up(align, offset)))
}
