use crate::data::codec;
use crate::data::raw::RawGenome;
use crate::engines::generation::Genome;
use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const FILE_EXTENSION: &str = "genome";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// One persisted best genome
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeRow {
    pub created_at: DateTime<Utc>,
    pub fitness: f64,
    pub improvements: u32,
    pub mutations: u32,
    pub gene_count: usize,
    /// Compressed binary genome
    pub payload: Vec<u8>,
}

impl GenomeRow {
    pub fn from_genome(genome: &Genome) -> Result<Self> {
        Ok(Self {
            created_at: Utc::now(),
            fitness: genome.fitness(),
            improvements: genome.improvements(),
            mutations: genome.mutations(),
            gene_count: genome.gene_count(),
            payload: codec::encode_genome_compressed(genome)?,
        })
    }

    pub fn to_genome(&self) -> Result<Genome> {
        codec::decode_genome_compressed(&self.payload)
    }

    /// Header and per-gene checksums without building genes
    pub fn raw(&self) -> Result<RawGenome> {
        RawGenome::decode_compressed(&self.payload)
    }
}

/// Persistence handle consumed by the storage sink and by resume
pub trait GenomeStore: Send + Sync {
    fn insert_genome(&self, row: &GenomeRow) -> Result<()>;
    fn latest_genome(&self) -> Result<Option<GenomeRow>>;
}

/// Keeps rows in memory, mostly for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<GenomeRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<GenomeRow> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GenomeStore for MemoryStore {
    fn insert_genome(&self, row: &GenomeRow) -> Result<()> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row.clone());
        Ok(())
    }

    fn latest_genome(&self) -> Result<Option<GenomeRow>> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned())
    }
}

/// One compressed file per row.
///
/// Files are named `<improvements:010>-<timestamp>.genome`, so the
/// lexicographically greatest name is the most improved, most recent row.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    directory: PathBuf,
}

impl DirectoryStore {
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(row: &GenomeRow) -> String {
        format!(
            "{:010}-{}.{}",
            row.improvements,
            row.created_at.format(TIMESTAMP_FORMAT),
            FILE_EXTENSION
        )
    }

    fn parse_timestamp(name: &str) -> Result<DateTime<Utc>> {
        let stamp = name
            .strip_suffix(&format!(".{}", FILE_EXTENSION))
            .and_then(|stem| stem.split_once('-'))
            .map(|(_, stamp)| stamp)
            .ok_or_else(|| EngineError::Storage(format!("unexpected genome file name {}", name)))?;
        let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|e| EngineError::Storage(format!("bad timestamp in {}: {}", name, e)))?;
        Ok(naive.and_utc())
    }
}

impl GenomeStore for DirectoryStore {
    fn insert_genome(&self, row: &GenomeRow) -> Result<()> {
        let final_path = self.directory.join(Self::file_name(row));
        let tmp_path = final_path.with_extension("tmp");
        std::fs::write(&tmp_path, &row.payload)?;
        std::fs::rename(&tmp_path, &final_path)?;
        log::debug!("Wrote {}", final_path.display());
        Ok(())
    }

    fn latest_genome(&self) -> Result<Option<GenomeRow>> {
        let mut newest: Option<String> = None;
        for entry in std::fs::read_dir(&self.directory)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.ends_with(&format!(".{}", FILE_EXTENSION)) {
                continue;
            }
            if newest.as_ref().map_or(true, |n| name > *n) {
                newest = Some(name);
            }
        }
        let Some(name) = newest else {
            return Ok(None);
        };

        let payload = std::fs::read(self.directory.join(&name))?;
        let genome = codec::decode_genome_compressed(&payload)?;
        Ok(Some(GenomeRow {
            created_at: Self::parse_timestamp(&name)?,
            fitness: genome.fitness(),
            improvements: genome.improvements(),
            mutations: genome.mutations(),
            gene_count: genome.gene_count(),
            payload,
        }))
    }
}
