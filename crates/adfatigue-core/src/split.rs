use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::cleaner::TARGET_COLUMN;
use crate::error::{PipelineError, Result};
use crate::io::take_rows;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle of `0..n`; the first `ceil(n · test_fraction)` positions
/// form the test partition, the remainder the train partition.
pub fn shuffled_split_indices(n: usize, test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Config(format!(
            "test fraction {test_fraction} must be within (0, 1)"
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n < 2 || n_test >= n {
        return Err(PipelineError::Computation(format!(
            "cannot split {n} rows with test fraction {test_fraction}: one partition would be empty"
        )));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let train = permutation.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: permutation,
    })
}

pub fn train_test_split(
    df: &DataFrame,
    test_fraction: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let indices = shuffled_split_indices(df.height(), test_fraction, seed)?;
    Ok((take_rows(df, &indices.train)?, take_rows(df, &indices.test)?))
}

#[derive(Debug, Clone)]
pub struct PartitionedTables {
    pub train: DataFrame,
    /// Inference input: the target column is removed.
    pub test: DataFrame,
}

pub fn partition_cleaned(df: &DataFrame, test_fraction: f64, seed: u64) -> Result<PartitionedTables> {
    let (train, test) = train_test_split(df, test_fraction, seed)?;
    let test = test.drop(TARGET_COLUMN)?;
    Ok(PartitionedTables { train, test })
}
