use crate::scalar::{invalid, read_ascii_records, read_binary_records, Field, Layout, ScalarKind};
use multiway_core::PointCloud;
use std::fs;
use std::io;
use std::path::Path;

const NORMAL_FIELDS: [&str; 3] = ["normal_x", "normal_y", "normal_z"];

#[derive(Debug, PartialEq)]
enum DataFormat {
    Ascii,
    Binary,
}

struct PcdHeader {
    fields: Vec<Field>,
    points: usize,
    format: DataFormat,
    /// Byte offset of the first record.
    body_offset: usize,
}

/// Reads a PCD file (ASCII or binary).
///
/// `x y z` are required; `normal_x normal_y normal_z` are picked up when all
/// three are present. Any other field is skipped.
pub fn read_pcd(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let raw = fs::read(path)?;
    parse_pcd(&raw)
}

pub(crate) fn parse_pcd(raw: &[u8]) -> io::Result<PointCloud> {
    let header = parse_header(raw)?;
    let layout = Layout::resolve(&header.fields, NORMAL_FIELDS)?;
    let body = &raw[header.body_offset..];

    let columns = match header.format {
        DataFormat::Binary => read_binary_records(body, &header.fields, header.points, &layout)?,
        DataFormat::Ascii => {
            let text = std::str::from_utf8(body).map_err(|_| invalid("PCD body is not valid UTF-8"))?;
            read_ascii_records(text, header.fields.len(), header.points, &layout)?
        }
    };
    Ok(columns.into_cloud())
}

/// Writes an ASCII PCD. Normals are written when the cloud has a full set.
pub fn write_pcd(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let mut out = header_text(cloud, "ascii");
    let normals = cloud.normals.as_ref().filter(|_| cloud.has_normals());
    for (i, p) in cloud.iter_positions().enumerate() {
        out.push_str(&format!("{} {} {}", p[0], p[1], p[2]));
        if let Some(n) = normals {
            let v = n.get(i);
            out.push_str(&format!(" {} {} {}", v[0], v[1], v[2]));
        }
        out.push('\n');
    }
    fs::write(path, out)
}

/// Writes a binary (little-endian, uncompressed) PCD.
pub fn write_pcd_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let header = header_text(cloud, "binary");
    let normals = cloud.normals.as_ref().filter(|_| cloud.has_normals());
    let stride = if normals.is_some() { 24 } else { 12 };

    let mut buf = Vec::with_capacity(header.len() + cloud.len() * stride);
    buf.extend_from_slice(header.as_bytes());
    for (i, p) in cloud.iter_positions().enumerate() {
        for v in p {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        if let Some(n) = normals {
            for v in n.get(i) {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    fs::write(path, buf)
}

fn header_text(cloud: &PointCloud, data: &str) -> String {
    let (fields, size, ty, count) = if cloud.has_normals() {
        (
            "x y z normal_x normal_y normal_z",
            "4 4 4 4 4 4",
            "F F F F F F",
            "1 1 1 1 1 1",
        )
    } else {
        ("x y z", "4 4 4", "F F F", "1 1 1")
    };
    format!(
        "# .PCD v0.7 - Point Cloud Data file format\n\
         VERSION 0.7\n\
         FIELDS {fields}\n\
         SIZE {size}\n\
         TYPE {ty}\n\
         COUNT {count}\n\
         WIDTH {n}\n\
         HEIGHT 1\n\
         VIEWPOINT 0 0 0 1 0 0 0\n\
         POINTS {n}\n\
         DATA {data}\n",
        n = cloud.len()
    )
}

fn parse_header(raw: &[u8]) -> io::Result<PcdHeader> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut types: Vec<String> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut points: Option<usize> = None;
    let mut width: Option<usize> = None;
    let mut height: usize = 1;

    let mut offset = 0;
    while offset < raw.len() {
        let end = raw[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |p| offset + p + 1);
        let line = std::str::from_utf8(&raw[offset..end])
            .map_err(|_| invalid("PCD header is not valid UTF-8"))?
            .trim();
        offset = end;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let key = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        match key {
            "FIELDS" => names = rest.iter().map(|s| s.to_string()).collect(),
            "SIZE" => sizes = parse_list(&rest, "SIZE")?,
            "TYPE" => types = rest.iter().map(|s| s.to_string()).collect(),
            "COUNT" => counts = parse_list(&rest, "COUNT")?,
            "WIDTH" => width = Some(parse_one(&rest, "WIDTH")?),
            "HEIGHT" => height = parse_one(&rest, "HEIGHT")?,
            "POINTS" => points = Some(parse_one(&rest, "POINTS")?),
            "DATA" => {
                let format = match rest.first().copied() {
                    Some("ascii") => DataFormat::Ascii,
                    Some("binary") => DataFormat::Binary,
                    other => {
                        return Err(io::Error::new(
                            io::ErrorKind::Unsupported,
                            format!("unsupported PCD DATA format: {}", other.unwrap_or("<none>")),
                        ))
                    }
                };
                let fields = expand_fields(&names, &sizes, &types, &counts)?;
                let points = match (points, width) {
                    (Some(p), _) => p,
                    (None, Some(w)) => w
                        .checked_mul(height)
                        .ok_or_else(|| invalid("PCD WIDTH x HEIGHT overflows"))?,
                    (None, None) => return Err(invalid("PCD header missing POINTS/WIDTH")),
                };
                return Ok(PcdHeader {
                    fields,
                    points,
                    format,
                    body_offset: offset,
                });
            }
            _ => {}
        }
    }
    Err(invalid("PCD file missing DATA line"))
}

/// Flattens `FIELDS`/`SIZE`/`TYPE`/`COUNT` into one entry per scalar column.
/// Missing `SIZE`/`TYPE` default to 4-byte floats, missing `COUNT` to 1.
fn expand_fields(
    names: &[String],
    sizes: &[usize],
    types: &[String],
    counts: &[usize],
) -> io::Result<Vec<Field>> {
    let mut fields = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let size = sizes.get(i).copied().unwrap_or(4);
        let ty = types.get(i).map(String::as_str).unwrap_or("F");
        let kind = ScalarKind::from_pcd(ty, size)
            .ok_or_else(|| invalid(&format!("unsupported PCD field type {ty}{size} for '{name}'")))?;
        let count = counts.get(i).copied().unwrap_or(1);
        for _ in 0..count {
            fields.push(Field {
                name: name.clone(),
                kind,
            });
        }
    }
    Ok(fields)
}

fn parse_one(rest: &[&str], key: &str) -> io::Result<usize> {
    rest.first()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(&format!("invalid {key} value")))
}

fn parse_list(rest: &[&str], key: &str) -> io::Result<Vec<usize>> {
    rest.iter()
        .map(|s| s.parse().map_err(|_| invalid(&format!("invalid {key} entry '{s}'"))))
        .collect()
}
