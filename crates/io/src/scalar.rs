use std::io;

/// Storage type of one on-disk field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarKind {
    pub(crate) fn byte_size(self) -> usize {
        match self {
            ScalarKind::I8 | ScalarKind::U8 => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::F64 => 8,
        }
    }

    /// PCD encodes a field as a `TYPE` letter plus a `SIZE` in bytes.
    pub(crate) fn from_pcd(ty: &str, size: usize) -> Option<Self> {
        Some(match (ty, size) {
            ("F", 4) => ScalarKind::F32,
            ("F", 8) => ScalarKind::F64,
            ("I", 1) => ScalarKind::I8,
            ("I", 2) => ScalarKind::I16,
            ("I", 4) => ScalarKind::I32,
            ("U", 1) => ScalarKind::U8,
            ("U", 2) => ScalarKind::U16,
            ("U", 4) => ScalarKind::U32,
            _ => return None,
        })
    }

    pub(crate) fn from_ply(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => ScalarKind::I8,
            "uchar" | "uint8" => ScalarKind::U8,
            "short" | "int16" => ScalarKind::I16,
            "ushort" | "uint16" => ScalarKind::U16,
            "int" | "int32" => ScalarKind::I32,
            "uint" | "uint32" => ScalarKind::U32,
            "float" | "float32" => ScalarKind::F32,
            "double" | "float64" => ScalarKind::F64,
            _ => return None,
        })
    }

    /// Decodes one little-endian value. `bytes` must hold at least
    /// `byte_size()` bytes.
    pub(crate) fn read_le(self, bytes: &[u8]) -> f64 {
        let mut b = [0u8; 8];
        b[..self.byte_size()].copy_from_slice(&bytes[..self.byte_size()]);
        match self {
            ScalarKind::I8 => i8::from_le_bytes([b[0]]) as f64,
            ScalarKind::U8 => b[0] as f64,
            ScalarKind::I16 => i16::from_le_bytes([b[0], b[1]]) as f64,
            ScalarKind::U16 => u16::from_le_bytes([b[0], b[1]]) as f64,
            ScalarKind::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            ScalarKind::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            ScalarKind::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            ScalarKind::F64 => f64::from_le_bytes(b),
        }
    }
}

/// A named field at a fixed position in each record.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub name: String,
    pub kind: ScalarKind,
}

/// Column positions of the attributes this crate understands.
pub(crate) struct Layout {
    pub xyz: [usize; 3],
    pub normal: Option<[usize; 3]>,
}

impl Layout {
    pub(crate) fn resolve(fields: &[Field], normal_names: [&str; 3]) -> io::Result<Self> {
        let find = |name: &str| fields.iter().position(|f| f.name == name);
        let xyz = match (find("x"), find("y"), find("z")) {
            (Some(x), Some(y), Some(z)) => [x, y, z],
            _ => return Err(invalid("missing x, y, z fields")),
        };
        let normal = match normal_names.map(find) {
            [Some(a), Some(b), Some(c)] => Some([a, b, c]),
            _ => None,
        };
        Ok(Self { xyz, normal })
    }
}

/// Column-wise accumulator shared by the readers.
pub(crate) struct Columns {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub normals: Option<[Vec<f32>; 3]>,
}

impl Columns {
    pub(crate) fn new(layout: &Layout, capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            normals: layout.normal.map(|_| {
                [
                    Vec::with_capacity(capacity),
                    Vec::with_capacity(capacity),
                    Vec::with_capacity(capacity),
                ]
            }),
        }
    }

    /// Pushes one record given as already-decoded values in field order.
    pub(crate) fn push(&mut self, layout: &Layout, values: &[f64]) {
        self.x.push(values[layout.xyz[0]] as f32);
        self.y.push(values[layout.xyz[1]] as f32);
        self.z.push(values[layout.xyz[2]] as f32);
        if let (Some(cols), Some(idx)) = (self.normals.as_mut(), layout.normal) {
            for (col, i) in cols.iter_mut().zip(idx) {
                col.push(values[i] as f32);
            }
        }
    }

    pub(crate) fn into_cloud(self) -> multiway_core::PointCloud {
        let mut cloud = multiway_core::PointCloud::from_xyz(self.x, self.y, self.z);
        if let Some([nx, ny, nz]) = self.normals {
            cloud.normals = Some(multiway_core::Normals { nx, ny, nz });
        }
        cloud
    }
}

/// Decodes a packed little-endian body of `count` records.
pub(crate) fn read_binary_records(
    body: &[u8],
    fields: &[Field],
    count: usize,
    layout: &Layout,
) -> io::Result<Columns> {
    let stride: usize = fields.iter().map(|f| f.kind.byte_size()).sum();
    let needed = stride
        .checked_mul(count)
        .ok_or_else(|| invalid(&format!("record count {count} overflows the body size")))?;
    if body.len() < needed {
        return Err(invalid(&format!(
            "binary body too short: have {} bytes, need {} ({} records x {} bytes)",
            body.len(),
            needed,
            count,
            stride
        )));
    }

    let mut cols = Columns::new(layout, count);
    let mut values = vec![0.0f64; fields.len()];
    for record in body[..needed].chunks_exact(stride.max(1)).take(count) {
        let mut offset = 0;
        for (v, f) in values.iter_mut().zip(fields) {
            *v = f.kind.read_le(&record[offset..]);
            offset += f.kind.byte_size();
        }
        cols.push(layout, &values);
    }
    Ok(cols)
}

/// Parses whitespace-separated ASCII records, skipping blank lines and
/// comments. Unparsable tokens read as NaN.
pub(crate) fn read_ascii_records(
    text: &str,
    num_fields: usize,
    count: usize,
    layout: &Layout,
) -> io::Result<Columns> {
    // The header count is untrusted; never reserve more rows than there are lines.
    let mut cols = Columns::new(layout, count.min(text.lines().count()));
    let mut values = vec![0.0f64; num_fields];
    for line in text.lines() {
        if cols.x.len() >= count {
            break;
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut n = 0;
        for (v, tok) in values.iter_mut().zip(line.split_whitespace()) {
            *v = tok.parse::<f64>().unwrap_or(f64::NAN);
            n += 1;
        }
        if n < num_fields {
            return Err(invalid(&format!(
                "record {} has {} values, expected {}",
                cols.x.len(),
                n,
                num_fields
            )));
        }
        cols.push(layout, &values);
    }
    if cols.x.len() < count {
        return Err(invalid(&format!(
            "expected {} records, found {}",
            count,
            cols.x.len()
        )));
    }
    Ok(cols)
}

pub(crate) fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
