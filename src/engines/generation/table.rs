use rand::Rng;

/// Weighted choice over a fixed set of values.
///
/// Entries with a zero weight stay in the table but are never picked.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTable<T> {
    entries: Vec<(f64, T)>,
    total: f64,
}

impl<T> Default for WeightedTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            total: 0.0,
        }
    }
}

impl<T> WeightedTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every item gets weight 1
    pub fn uniform<I: IntoIterator<Item = T>>(items: I) -> Self {
        items.into_iter().fold(Self::new(), |t, item| t.with(1.0, item))
    }

    pub fn with(mut self, weight: f64, item: T) -> Self {
        self.push(weight, item);
        self
    }

    /// Negative and NaN weights count as zero
    pub fn push(&mut self, weight: f64, item: T) {
        let weight = if weight > 0.0 { weight } else { 0.0 };
        self.total += weight;
        self.entries.push((weight, item));
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        if !(self.total > 0.0) {
            return None;
        }
        let mut spin = rng.gen::<f64>() * self.total;
        for (weight, item) in &self.entries {
            if *weight <= 0.0 {
                continue;
            }
            if spin < *weight {
                return Some(item);
            }
            spin -= weight;
        }
        // float rounding can leave a sliver past the last entry
        self.entries
            .iter()
            .rev()
            .find(|(w, _)| *w > 0.0)
            .map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::seeded_rng;

    #[test]
    fn empty_and_zero_tables_pick_nothing() {
        let mut rng = seeded_rng(1);
        assert!(WeightedTable::<u8>::new().pick(&mut rng).is_none());
        let zero = WeightedTable::new().with(0.0, 'a').with(-2.0, 'b');
        assert!(zero.pick(&mut rng).is_none());
        assert_eq!(zero.len(), 2);
    }

    #[test]
    fn zero_weight_entries_never_win() {
        let mut rng = seeded_rng(7);
        let table = WeightedTable::new().with(0.0, 'a').with(3.0, 'b').with(0.0, 'c');
        for _ in 0..500 {
            assert_eq!(table.pick(&mut rng), Some(&'b'));
        }
    }

    #[test]
    fn picks_follow_weights() {
        let mut rng = seeded_rng(42);
        let table = WeightedTable::new().with(1.0, 0usize).with(3.0, 1usize);
        let mut counts = [0usize; 2];
        for _ in 0..8_000 {
            counts[*table.pick(&mut rng).unwrap()] += 1;
        }
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!(ratio > 2.5 && ratio < 3.5, "ratio was {}", ratio);
    }
}
