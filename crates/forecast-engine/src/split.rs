use analysis_core::AnalysisError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Feature rows of one partition with their targets and same-day closes
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub closes: Vec<f64>,
}

impl Partition {
    /// Gather `indices` out of aligned row, target and close slices.
    pub fn gather(indices: &[usize], rows: &[Vec<f64>], targets: &[f64], closes: &[f64]) -> Self {
        Self {
            rows: indices.iter().map(|&i| rows[i].clone()).collect(),
            targets: indices.iter().map(|&i| targets[i]).collect(),
            closes: indices.iter().map(|&i| closes[i]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Partitions `n` training rows into train and test sets
pub trait SplitStrategy: Send + Sync {
    fn split(&self, n: usize) -> Result<SplitIndices, AnalysisError>;

    fn name(&self) -> &'static str;
}

/// Test rows for `n` samples: `ceil(n * ratio)`, ignoring float noise in the product.
fn test_size(n: usize, ratio: f64) -> usize {
    ((n as f64 * ratio) - 1e-9).ceil().max(0.0) as usize
}

fn check_sizes(n: usize, n_test: usize) -> Result<(), AnalysisError> {
    if n_test == 0 || n_test >= n {
        return Err(AnalysisError::InsufficientData(format!(
            "{} labelled rows cannot be split into non-empty train and test partitions",
            n
        )));
    }
    Ok(())
}

/// Oldest rows train, newest `ceil(n * ratio)` rows test
#[derive(Debug, Clone)]
pub struct ChronologicalSplit {
    test_ratio: f64,
}

impl ChronologicalSplit {
    pub fn new(test_ratio: f64) -> Self {
        Self { test_ratio }
    }
}

impl SplitStrategy for ChronologicalSplit {
    fn split(&self, n: usize) -> Result<SplitIndices, AnalysisError> {
        let n_test = test_size(n, self.test_ratio);
        check_sizes(n, n_test)?;

        let n_train = n - n_test;
        Ok(SplitIndices {
            train: (0..n_train).collect(),
            test: (n_train..n).collect(),
        })
    }

    fn name(&self) -> &'static str {
        "chronological"
    }
}

/// Seeded shuffle; the first `ceil(n * ratio)` shuffled rows test, the rest train.
#[derive(Debug, Clone)]
pub struct RandomSplit {
    test_ratio: f64,
    seed: u64,
}

impl RandomSplit {
    pub fn new(test_ratio: f64, seed: u64) -> Self {
        Self { test_ratio, seed }
    }
}

impl SplitStrategy for RandomSplit {
    fn split(&self, n: usize) -> Result<SplitIndices, AnalysisError> {
        let n_test = test_size(n, self.test_ratio);
        check_sizes(n, n_test)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);

        let train = order.split_off(n_test);
        Ok(SplitIndices { train, test: order })
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_size_is_ceiling() {
        assert_eq!(test_size(35, 0.2), 7);
        assert_eq!(test_size(36, 0.2), 8);
        assert_eq!(test_size(3, 0.2), 1);
    }

    #[test]
    fn test_chronological_keeps_order() {
        let split = ChronologicalSplit::new(0.2).split(10).unwrap();
        assert_eq!(split.train, (0..8).collect::<Vec<_>>());
        assert_eq!(split.test, vec![8, 9]);
    }

    #[test]
    fn test_random_split_is_reproducible_and_complete() {
        let strategy = RandomSplit::new(0.2, 42);
        let a = strategy.split(30).unwrap();
        let b = strategy.split(30).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 6);
        assert_eq!(a.train.len(), 24);

        let mut all: Vec<usize> = a.train.iter().chain(&a.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_random_split_depends_on_seed() {
        let a = RandomSplit::new(0.2, 1).split(50).unwrap();
        let b = RandomSplit::new(0.2, 2).split(50).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_gather_keeps_rows_aligned() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let targets = [10.0, 11.0, 12.0, 13.0];
        let closes = [5.0, 6.0, 7.0, 8.0];

        let part = Partition::gather(&[3, 1], &rows, &targets, &closes);

        assert_eq!(part.len(), 2);
        assert_eq!(part.rows, vec![vec![3.0], vec![1.0]]);
        assert_eq!(part.targets, vec![13.0, 11.0]);
        assert_eq!(part.closes, vec![8.0, 6.0]);
        assert!(Partition::gather(&[], &rows, &targets, &closes).is_empty());
    }

    #[test]
    fn test_too_few_rows() {
        assert!(matches!(
            ChronologicalSplit::new(0.2).split(1),
            Err(AnalysisError::InsufficientData(_))
        ));
        assert!(RandomSplit::new(0.2, 42).split(0).is_err());
    }
}
