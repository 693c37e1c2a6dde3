use crate::error::{EngineError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Policy for choosing which gene of a layer a mutation acts on.
///
/// Indices are in draw order, so the end of the range holds the most
/// recently added genes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexSelector {
    Uniform,
    /// With `probability`, pick among the newest `fraction` of genes,
    /// otherwise anywhere
    Biased { fraction: f64, probability: f64 },
    /// Only the newest `size` genes
    TailWindow { size: usize },
}

impl Default for IndexSelector {
    fn default() -> Self {
        IndexSelector::Uniform
    }
}

impl IndexSelector {
    pub fn validate(&self) -> Result<()> {
        match *self {
            IndexSelector::Uniform => Ok(()),
            IndexSelector::Biased { fraction, probability } => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(EngineError::Configuration(
                        "[mutation] biased selector fraction must be in (0, 1]".to_string(),
                    ));
                }
                if !(0.0..=1.0).contains(&probability) {
                    return Err(EngineError::Configuration(
                        "[mutation] biased selector probability must be in [0, 1]".to_string(),
                    ));
                }
                Ok(())
            }
            IndexSelector::TailWindow { size } => {
                if size == 0 {
                    return Err(EngineError::Configuration(
                        "[mutation] tail window size must be at least 1".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Indices this selector may return for a layer of `len` genes
    pub fn window(&self, len: usize) -> Range<usize> {
        match *self {
            IndexSelector::Uniform => 0..len,
            IndexSelector::Biased { fraction, .. } => {
                let favoured = ((len as f64 * fraction).ceil() as usize).clamp(1, len.max(1));
                len.saturating_sub(favoured)..len
            }
            IndexSelector::TailWindow { size } => len.saturating_sub(size)..len,
        }
    }

    pub fn select<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let range = match *self {
            IndexSelector::Biased { probability, .. } if !rng.gen_bool(probability) => 0..len,
            _ => self.window(len),
        };
        Some(rng.gen_range(range))
    }

    /// Two distinct indices. The second is drawn from this selector's window
    /// whenever it holds at least two genes.
    pub fn select_pair<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Option<(usize, usize)> {
        if len < 2 {
            return None;
        }
        let first = self.select(len, rng)?;
        let window = self.window(len);
        let range = if window.len() >= 2 { window } else { 0..len };
        let second = if range.contains(&first) {
            let drawn = rng.gen_range(range.start..range.end - 1);
            if drawn >= first {
                drawn + 1
            } else {
                drawn
            }
        } else {
            rng.gen_range(range)
        };
        Some((first, second))
    }
}
