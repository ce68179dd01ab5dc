use crate::scalar::{invalid, read_ascii_records, read_binary_records, Field, Layout, ScalarKind};
use multiway_core::PointCloud;
use std::fs;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

const NORMAL_PROPS: [&str; 3] = ["nx", "ny", "nz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
}

struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    fields: Vec<Field>,
    body_offset: usize,
}

/// Reads the vertex element of a PLY file (ASCII or binary little-endian).
///
/// Scalar properties of any width are accepted; only `x y z` and
/// `nx ny nz` are kept. The vertex element must come first.
pub fn read_ply(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let data = fs::read(path)?;
    parse_ply(&data)
}

pub(crate) fn parse_ply(data: &[u8]) -> io::Result<PointCloud> {
    let header = parse_header(data)?;
    let layout = Layout::resolve(&header.fields, NORMAL_PROPS)?;
    let body = &data[header.body_offset..];

    let columns = match header.format {
        PlyFormat::BinaryLittleEndian => {
            read_binary_records(body, &header.fields, header.vertex_count, &layout)?
        }
        PlyFormat::Ascii => {
            let text = std::str::from_utf8(body).map_err(|_| invalid("PLY body is not valid UTF-8"))?;
            read_ascii_records(text, header.fields.len(), header.vertex_count, &layout)?
        }
    };
    Ok(columns.into_cloud())
}

fn parse_header(data: &[u8]) -> io::Result<PlyHeader> {
    const END: &[u8] = b"end_header";
    let end = data
        .windows(END.len())
        .position(|w| w == END)
        .ok_or_else(|| invalid("missing end_header in PLY file"))?;
    let body_offset = data[end..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |p| end + p + 1);
    let text = std::str::from_utf8(&data[..end]).map_err(|_| invalid("PLY header is not valid UTF-8"))?;

    let mut lines = text.lines().map(str::trim);
    if lines.next() != Some("ply") {
        return Err(invalid("file does not start with 'ply'"));
    }

    let mut format = None;
    let mut vertex_count = None;
    let mut fields = Vec::new();
    let mut element_index = 0usize;
    let mut in_vertex = false;

    for line in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["format", "ascii", ..] => format = Some(PlyFormat::Ascii),
            ["format", "binary_little_endian", ..] => format = Some(PlyFormat::BinaryLittleEndian),
            ["format", other, ..] => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported PLY format: {other}"),
                ))
            }
            ["element", "vertex", count] => {
                if element_index != 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "PLY vertex element must be the first element",
                    ));
                }
                vertex_count = Some(
                    count
                        .parse::<usize>()
                        .map_err(|e| invalid(&format!("invalid vertex count: {e}")))?,
                );
                in_vertex = true;
                element_index += 1;
            }
            ["element", ..] => {
                in_vertex = false;
                element_index += 1;
            }
            ["property", "list", ..] if in_vertex => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "list properties on vertices are not supported",
                ))
            }
            ["property", ty, name] if in_vertex => {
                let kind = ScalarKind::from_ply(ty).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!("unsupported property type: {ty}"),
                    )
                })?;
                fields.push(Field {
                    name: name.to_string(),
                    kind,
                });
            }
            _ => {}
        }
    }

    Ok(PlyHeader {
        format: format.ok_or_else(|| invalid("PLY format line missing"))?,
        vertex_count: vertex_count.ok_or_else(|| invalid("PLY vertex element missing"))?,
        fields,
        body_offset,
    })
}

fn header_text(cloud: &PointCloud, format: &str) -> String {
    let mut h = format!(
        "ply\nformat {format} 1.0\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\n",
        cloud.len()
    );
    if cloud.has_normals() {
        h.push_str("property float nx\nproperty float ny\nproperty float nz\n");
    }
    h.push_str("end_header\n");
    h
}

/// Writes an ASCII PLY. Normals are written when the cloud has a full set.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let mut w = BufWriter::new(fs::File::create(path)?);
    w.write_all(header_text(cloud, "ascii").as_bytes())?;
    let normals = cloud.normals.as_ref().filter(|_| cloud.has_normals());
    for (i, p) in cloud.iter_positions().enumerate() {
        write!(w, "{} {} {}", p[0], p[1], p[2])?;
        if let Some(n) = normals {
            let v = n.get(i);
            write!(w, " {} {} {}", v[0], v[1], v[2])?;
        }
        writeln!(w)?;
    }
    w.flush()
}

/// Writes a binary little-endian PLY.
pub fn write_ply_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let mut w = BufWriter::new(fs::File::create(path)?);
    w.write_all(header_text(cloud, "binary_little_endian").as_bytes())?;
    let normals = cloud.normals.as_ref().filter(|_| cloud.has_normals());
    for (i, p) in cloud.iter_positions().enumerate() {
        for v in p {
            w.write_all(&v.to_le_bytes())?;
        }
        if let Some(n) = normals {
            for v in n.get(i) {
                w.write_all(&v.to_le_bytes())?;
            }
        }
    }
    w.flush()
}
