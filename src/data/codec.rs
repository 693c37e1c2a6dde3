//! Versioned binary encoding of genes and genomes.
//!
//! Gene: `version(1) | a r g b (4) | vertex count (1) | (x i16, y i16) * n`
//!
//! Genome v1 (single layer):
//! `version(1) | fitness f64 (8) | improvements u32 (4) | mutations u32 (4) | gene count u32 (4) | genes`
//!
//! Genome v2 (layered) replaces the gene count with a layer count, and each
//! layer carries its own gene count. Integers and the fitness are big-endian.
//!
//! Persistent storage wraps an encoded genome in a container made of the
//! uncompressed length (u32) followed by a zlib stream.
use crate::engines::generation::gene::MIN_VERTICES;
use crate::engines::generation::{Gene, Genome, Layer};
use crate::error::{EngineError, Result};
use crate::types::{Argb, Point};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use std::io::{Read, Write};
use std::sync::Arc;

pub const GENE_VERSION: u8 = 1;
pub const GENOME_VERSION_SINGLE: u8 = 1;
pub const GENOME_VERSION_LAYERED: u8 = 2;

pub const GENE_HEADER_LEN: usize = 1 + 4 + 1;
pub const GENOME_HEADER_LEN: usize = 1 + 8 + 4 + 4;
/// Smallest encoded gene, a triangle
const MIN_GENE_LEN: usize = GENE_HEADER_LEN + 3 * 4;
/// Decoders never reserve more slots than this up front
pub(crate) const MAX_PREALLOCATED: usize = 4096;

/// Upper bound on a container's declared length, guards against garbage headers
const MAX_CONTAINER_LEN: usize = 256 * 1024 * 1024;

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}

pub(crate) fn write_gene_parts(out: &mut Vec<u8>, points: &[Point], color: Argb) {
    out.push(GENE_VERSION);
    out.extend_from_slice(&[color.a, color.r, color.g, color.b]);
    out.push(points.len() as u8);
    for p in points {
        out.extend_from_slice(&(p.x as i16).to_be_bytes());
        out.extend_from_slice(&(p.y as i16).to_be_bytes());
    }
}

/// Canonical bytes of a gene, also the input of its structural hash
pub(crate) fn gene_bytes(points: &[Point], color: Argb) -> Vec<u8> {
    let mut out = Vec::with_capacity(GENE_HEADER_LEN + points.len() * 4);
    write_gene_parts(&mut out, points, color);
    out
}

pub fn encoded_gene_len(vertex_count: usize) -> usize {
    GENE_HEADER_LEN + vertex_count * 4
}

pub fn encode_gene(gene: &Gene) -> Vec<u8> {
    gene_bytes(gene.points(), gene.color())
}

pub fn decode_gene(bytes: &[u8]) -> Result<Gene> {
    let mut reader = Reader::new(bytes, "gene");
    let gene = read_gene(&mut reader)?;
    reader.finish()?;
    Ok(gene)
}

pub fn encode_genome(genome: &Genome) -> Vec<u8> {
    let capacity = GENOME_HEADER_LEN
        + 4 * (genome.layer_count() + 1)
        + genome.genes().map(|g| encoded_gene_len(g.vertex_count())).sum::<usize>();
    let mut out = Vec::with_capacity(capacity);

    let layered = genome.layer_count() > 1;
    out.push(if layered { GENOME_VERSION_LAYERED } else { GENOME_VERSION_SINGLE });
    out.extend_from_slice(&genome.fitness().to_be_bytes());
    out.extend_from_slice(&genome.improvements().to_be_bytes());
    out.extend_from_slice(&genome.mutations().to_be_bytes());
    if layered {
        out.extend_from_slice(&(genome.layer_count() as u32).to_be_bytes());
    }
    for layer in genome.layers() {
        out.extend_from_slice(&(layer.len() as u32).to_be_bytes());
        for gene in layer {
            write_gene_parts(&mut out, gene.points(), gene.color());
        }
    }
    out
}

pub fn decode_genome(bytes: &[u8]) -> Result<Genome> {
    let mut reader = Reader::new(bytes, "genome");
    let header = GenomeHeader::read(&mut reader)?;

    let mut layers = Vec::with_capacity((header.layer_count as usize).min(MAX_PREALLOCATED));
    for _ in 0..header.layer_count {
        let count = reader.read_count()?;
        let mut layer: Layer = Vec::with_capacity(count.min(MAX_PREALLOCATED));
        for _ in 0..count {
            layer.push(Arc::new(read_gene(&mut reader)?));
        }
        layers.push(layer);
    }
    reader.finish()?;

    Ok(Genome::new(layers)?
        .with_fitness(header.fitness)
        .with_counters(header.improvements, header.mutations))
}

/// Wrap bytes in the length-prefixed zlib container
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() / 2 + 8);
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::new(bytes, "container");
    let declared = reader.read_u32()? as usize;
    if declared > MAX_CONTAINER_LEN {
        return Err(EngineError::Decode(format!(
            "container declares {} bytes, limit is {}",
            declared, MAX_CONTAINER_LEN
        )));
    }
    let mut out = Vec::with_capacity(declared.min(MAX_PREALLOCATED * MIN_GENE_LEN));
    ZlibDecoder::new(reader.rest())
        .take(declared as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| EngineError::Decode(format!("corrupt compressed stream: {}", e)))?;
    if out.len() != declared {
        return Err(EngineError::Decode(format!(
            "container declares {} bytes but holds {}",
            declared,
            out.len()
        )));
    }
    Ok(out)
}

pub fn encode_genome_compressed(genome: &Genome) -> Result<Vec<u8>> {
    compress(&encode_genome(genome))
}

pub fn decode_genome_compressed(bytes: &[u8]) -> Result<Genome> {
    decode_genome(&decompress(bytes)?)
}

pub(crate) struct GenomeHeader {
    pub version: u8,
    pub fitness: f64,
    pub improvements: u32,
    pub mutations: u32,
    pub layer_count: u32,
}

impl GenomeHeader {
    /// Reads everything up to the first layer's gene count
    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_u8()?;
        if version != GENOME_VERSION_SINGLE && version != GENOME_VERSION_LAYERED {
            return Err(EngineError::UnsupportedVersion { kind: "genome", version });
        }
        let fitness = reader.read_f64()?;
        let improvements = reader.read_u32()?;
        let mutations = reader.read_u32()?;
        let layer_count = if version == GENOME_VERSION_LAYERED {
            let n = reader.read_u32()?;
            if n == 0 {
                return Err(EngineError::Decode("layered genome with zero layers".to_string()));
            }
            // every layer holds a gene count and at least one triangle
            let needed = (n as usize).saturating_mul(4 + MIN_GENE_LEN);
            if needed > reader.remaining() {
                return Err(EngineError::Truncated {
                    kind: "genome",
                    offset: reader.position(),
                    needed,
                    available: reader.remaining(),
                });
            }
            n
        } else {
            1
        };
        Ok(Self {
            version,
            fitness,
            improvements,
            mutations,
            layer_count,
        })
    }
}

fn read_gene(reader: &mut Reader<'_>) -> Result<Gene> {
    let (color, count) = read_gene_header(reader)?;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let x = reader.read_i16()? as i32;
        let y = reader.read_i16()? as i32;
        points.push(Point::new(x, y));
    }
    Gene::new(points, color)
}

pub(crate) fn read_gene_header(reader: &mut Reader<'_>) -> Result<(Argb, usize)> {
    let version = reader.read_u8()?;
    if version != GENE_VERSION {
        return Err(EngineError::UnsupportedVersion { kind: "gene", version });
    }
    let argb = reader.take(4)?;
    let color = Argb::new(argb[0], argb[1], argb[2], argb[3]);
    let count = reader.read_u8()? as usize;
    if count < MIN_VERTICES {
        return Err(EngineError::Decode(format!("gene with {} vertices", count)));
    }
    Ok((color, count))
}

/// Bounds-checked big-endian cursor
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    kind: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8], kind: &'static str) -> Self {
        Self { bytes, pos: 0, kind }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len() - self.pos;
        if n > available {
            return Err(EngineError::Truncated {
                kind: self.kind,
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn slice_from(&self, start: usize) -> &'a [u8] {
        &self.bytes[start..self.pos]
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(f64::from_be_bytes(arr))
    }

    /// A per-layer gene count; layers are never empty
    pub(crate) fn read_count(&mut self) -> Result<usize> {
        let n = self.read_u32()? as usize;
        if n == 0 {
            return Err(EngineError::Decode(format!("{} layer with zero genes", self.kind)));
        }
        let needed = n.saturating_mul(MIN_GENE_LEN);
        if needed > self.remaining() {
            return Err(EngineError::Truncated {
                kind: self.kind,
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(n)
    }

    pub(crate) fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(EngineError::Decode(format!(
                "{} trailing bytes after {}",
                self.bytes.len() - self.pos,
                self.kind
            )));
        }
        Ok(())
    }
}
