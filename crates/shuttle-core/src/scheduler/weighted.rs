//! Weighted random selection over a fixed set of items.
//!
//! 累積境界（borders）を正規化して持ち、[0, 1) の一様乱数を二分探索で引きます。
//! 重みは構築時に固定され、変更するときはテーブルごと作り直します。

use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRoundRobin<T> {
    items: Vec<T>,
    weights: Vec<f64>,
    /// 正規化済みの累積和。最後の要素は必ず 1.0
    borders: Vec<f64>,
}

impl<T> WeightedRoundRobin<T> {
    /// Entries with a non-finite or non-positive weight are skipped.
    pub fn new(entries: impl IntoIterator<Item = (T, f64)>) -> Self {
        let (items, weights): (Vec<T>, Vec<f64>) = entries
            .into_iter()
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .unzip();

        let total: f64 = weights.iter().sum();
        let mut borders = Vec::with_capacity(weights.len());
        let mut cumulative = 0.0;
        for w in &weights {
            cumulative += w / total;
            borders.push(cumulative);
        }
        if let Some(last) = borders.last_mut() {
            *last = 1.0;
        }

        Self {
            items,
            weights,
            borders,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            weights: Vec::new(),
            borders: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn entries(&self) -> impl Iterator<Item = (&T, f64)> {
        self.items.iter().zip(self.weights.iter().copied())
    }

    /// Item whose border is the first at or above `draw` (`draw` in [0, 1)).
    pub fn get_next_with(&self, draw: f64) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let index = self.borders.partition_point(|border| *border < draw);
        self.items.get(index.min(self.items.len() - 1))
    }

    pub fn get_next<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        match self.items.len() {
            0 => None,
            1 => self.items.first(),
            _ => self.get_next_with(rng.r#gen::<f64>()),
        }
    }
}

impl<T> Default for WeightedRoundRobin<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    use super::*;

    fn five_way() -> WeightedRoundRobin<&'static str> {
        WeightedRoundRobin::new([("1", 1.0), ("2", 1.0), ("3", 4.0), ("4", 1.0), ("5", 1.0)])
    }

    fn frequencies(picks: impl Iterator<Item = &'static str>, n: usize) -> Vec<f64> {
        let mut counts = [0usize; 5];
        for pick in picks {
            let i: usize = pick.parse().unwrap();
            counts[i - 1] += 1;
        }
        counts.iter().map(|c| *c as f64 / n as f64).collect()
    }

    #[test]
    fn evenly_spaced_draws_match_weights() {
        let table = five_way();
        let n = 10_000;
        let picks = (0..n).map(|i| *table.get_next_with((i as f64 + 0.5) / n as f64).unwrap());
        let freq = frequencies(picks, n);

        assert!((freq[2] - 4.0 / 8.0).abs() < 0.01, "freq = {freq:?}");
        for i in [0, 1, 3, 4] {
            assert!((freq[i] - 1.0 / 8.0).abs() < 0.01, "freq = {freq:?}");
        }
    }

    #[test]
    fn random_draws_converge() {
        let table = five_way();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 100_000;
        let picks = (0..n).map(|_| *table.get_next(&mut rng).unwrap());
        let freq = frequencies(picks, n);

        assert!((freq[2] - 0.5).abs() < 0.01, "freq = {freq:?}");
        for i in [0, 1, 3, 4] {
            assert!((freq[i] - 0.125).abs() < 0.01, "freq = {freq:?}");
        }
    }

    #[rstest]
    #[case(0.0, "a")]
    #[case(0.25, "a")]
    #[case(0.2500001, "b")]
    #[case(0.999999, "b")]
    fn draw_maps_to_first_border_at_or_above(#[case] draw: f64, #[case] expected: &str) {
        let table = WeightedRoundRobin::new([("a", 1.0), ("b", 3.0)]);
        assert_eq!(table.get_next_with(draw), Some(&expected));
    }

    #[test]
    fn empty_and_single_tables() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: WeightedRoundRobin<u8> = WeightedRoundRobin::empty();
        assert_eq!(empty.get_next(&mut rng), None);

        let single = WeightedRoundRobin::new([(42u8, 1.0)]);
        for _ in 0..100 {
            assert_eq!(single.get_next(&mut rng), Some(&42));
        }
    }

    #[test]
    fn invalid_weights_are_skipped() {
        let table = WeightedRoundRobin::new([("a", 0.0), ("b", f64::NAN), ("c", 2.0), ("d", -1.0)]);
        assert_eq!(table.items(), &["c"]);
    }
}
