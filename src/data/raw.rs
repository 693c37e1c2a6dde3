use crate::data::codec::{self, GenomeHeader, Reader};
use crate::engines::generation::Genome;
use crate::error::Result;
use std::collections::HashSet;

/// Undecoded gene: its canonical bytes and their CRC32.
///
/// The CRC equals [`crate::Gene::structural_hash`] of the decoded gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGene {
    bytes: Vec<u8>,
    crc: u32,
}

impl RawGene {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }
}

/// Serialized genome split at gene boundaries without building `Gene`s.
///
/// Enough for deduplication bookkeeping (which genes a stored genome
/// contains) at a fraction of the cost of a full decode.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGenome {
    pub version: u8,
    pub fitness: f64,
    pub improvements: u32,
    pub mutations: u32,
    pub layers: Vec<Vec<RawGene>>,
}

impl RawGenome {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, "genome");
        let header = GenomeHeader::read(&mut reader)?;

        let mut layers = Vec::with_capacity((header.layer_count as usize).min(codec::MAX_PREALLOCATED));
        for _ in 0..header.layer_count {
            let count = reader.read_count()?;
            let mut layer = Vec::with_capacity(count.min(codec::MAX_PREALLOCATED));
            for _ in 0..count {
                let start = reader.position();
                let (_, vertices) = codec::read_gene_header(&mut reader)?;
                reader.take(vertices * 4)?;
                let gene_bytes = reader.slice_from(start).to_vec();
                let crc = codec::crc32(&gene_bytes);
                layer.push(RawGene { bytes: gene_bytes, crc });
            }
            layers.push(layer);
        }
        reader.finish()?;

        Ok(Self {
            version: header.version,
            fitness: header.fitness,
            improvements: header.improvements,
            mutations: header.mutations,
            layers,
        })
    }

    pub fn decode_compressed(bytes: &[u8]) -> Result<Self> {
        Self::decode(&codec::decompress(bytes)?)
    }

    pub fn from_genome(genome: &Genome) -> Self {
        let layers = genome
            .layers()
            .iter()
            .map(|layer| {
                layer
                    .iter()
                    .map(|gene| RawGene {
                        bytes: codec::encode_gene(gene),
                        crc: gene.structural_hash(),
                    })
                    .collect()
            })
            .collect();
        Self {
            version: if genome.layer_count() > 1 {
                codec::GENOME_VERSION_LAYERED
            } else {
                codec::GENOME_VERSION_SINGLE
            },
            fitness: genome.fitness(),
            improvements: genome.improvements(),
            mutations: genome.mutations(),
            layers,
        }
    }

    pub fn gene_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn gene_hashes(&self) -> impl Iterator<Item = u32> + '_ {
        self.layers.iter().flatten().map(RawGene::crc)
    }

    /// Number of structurally distinct genes, by canonical bytes
    pub fn distinct_gene_count(&self) -> usize {
        self.layers
            .iter()
            .flatten()
            .map(RawGene::bytes)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Re-assemble the canonical binary form
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let layered = self.layers.len() > 1;
        out.push(if layered {
            codec::GENOME_VERSION_LAYERED
        } else {
            codec::GENOME_VERSION_SINGLE
        });
        out.extend_from_slice(&self.fitness.to_be_bytes());
        out.extend_from_slice(&self.improvements.to_be_bytes());
        out.extend_from_slice(&self.mutations.to_be_bytes());
        if layered {
            out.extend_from_slice(&(self.layers.len() as u32).to_be_bytes());
        }
        for layer in &self.layers {
            out.extend_from_slice(&(layer.len() as u32).to_be_bytes());
            for gene in layer {
                out.extend_from_slice(&gene.bytes);
            }
        }
        out
    }

    pub fn to_genome(&self) -> Result<Genome> {
        codec::decode_genome(&self.encode())
    }
}
