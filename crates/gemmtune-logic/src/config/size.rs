use gemmtune_gemm::heuristic::ExactSize;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Sizes of a benchmark, in `[m, n, batch, k]` order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemSize {
    /// A single size.
    Exact(Vec<i64>),
    /// Every combination of four axes, each `[v]`, `[start, stop]`, `[start, step, stop]` or
    /// `[start, step, step_increment, stop]`. Bounds are inclusive.
    Range(Vec<Vec<i64>>),
}

const AXES: [&str; 4] = ["m", "n", "batch", "k"];

/// Most sizes a single range may expand to.
const MAX_RANGE_SIZES: usize = 1 << 20;

impl ProblemSize {
    /// Every exact size described, checked to be four non-negative integers.
    pub fn expand(&self) -> Result<Vec<ExactSize>, ConfigError> {
        match self {
            ProblemSize::Exact(values) => exact(values).map(|size| vec![size]),
            ProblemSize::Range(axes) => {
                if axes.len() != AXES.len() {
                    return Err(ConfigError::InvalidSize {
                        size: format!("{axes:?}"),
                        reason: format!("a range has 4 axes, found {}", axes.len()),
                    });
                }
                let values = axes
                    .iter()
                    .zip(AXES)
                    .map(|(axis, name)| range_axis(axis, name))
                    .collect::<Result<Vec<_>, _>>()?;

                let count = values
                    .iter()
                    .try_fold(1usize, |count, axis| count.checked_mul(axis.len()))
                    .filter(|count| *count <= MAX_RANGE_SIZES);
                let Some(count) = count else {
                    return Err(ConfigError::InvalidSize {
                        size: format!("{axes:?}"),
                        reason: format!("a range expands to at most {MAX_RANGE_SIZES} sizes"),
                    });
                };

                let mut sizes = Vec::with_capacity(count);
                for &m in &values[0] {
                    for &n in &values[1] {
                        for &batch in &values[2] {
                            for &k in &values[3] {
                                sizes.push([m, n, batch, k]);
                            }
                        }
                    }
                }
                Ok(sizes)
            }
        }
    }
}

fn exact(values: &[i64]) -> Result<ExactSize, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSize {
        size: format!("{values:?}"),
        reason,
    };

    if values.len() != 4 {
        return Err(invalid(format!(
            "an exact size has 4 values [m, n, batch, k], found {}",
            values.len()
        )));
    }

    let mut size = [0; 4];
    for ((value, slot), name) in values.iter().zip(size.iter_mut()).zip(AXES) {
        *slot = usize::try_from(*value)
            .map_err(|_| invalid(format!("{name} must be non-negative, found {value}")))?;
    }

    Ok(size)
}

fn range_axis(axis: &[i64], name: &str) -> Result<Vec<usize>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSize {
        size: format!("{axis:?}"),
        reason: format!("{name} range {reason}"),
    };

    let (start, mut step, increment, stop) = match *axis {
        [value] => (value, 1, 0, value),
        [start, stop] => (start, 1, 0, stop),
        [start, step, stop] => (start, step, 0, stop),
        [start, step, increment, stop] => (start, step, increment, stop),
        _ => return Err(invalid("has 1 to 4 values")),
    };

    if start < 0 {
        return Err(invalid("must be non-negative"));
    }
    if stop < start {
        return Err(invalid("ends before it starts"));
    }
    if step <= 0 || increment < 0 {
        return Err(invalid("must increase"));
    }

    let mut values = Vec::new();
    let mut value = start;
    while value <= stop {
        if values.len() == MAX_RANGE_SIZES {
            return Err(invalid("has too many values"));
        }
        values.push(value as usize);

        // Past `i64::MAX` is past `stop` too.
        let Some(next) = value.checked_add(step) else {
            break;
        };
        value = next;
        step = step.saturating_add(increment);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_needs_four_non_negative_values() {
        assert_eq!(
            ProblemSize::Exact(vec![128, 64, 1, 32]).expand().unwrap(),
            vec![[128, 64, 1, 32]]
        );
        assert!(ProblemSize::Exact(vec![128, 64, 32]).expand().is_err());
        assert!(ProblemSize::Exact(vec![128, 64, 1, 32, 8]).expand().is_err());

        let err = ProblemSize::Exact(vec![128, -1, 1, 32]).expand().unwrap_err();
        assert!(err.to_string().contains("n must be non-negative"), "{err}");
    }

    #[test]
    fn range_forms() {
        let sizes = ProblemSize::Range(vec![vec![16, 16, 48], vec![8], vec![1, 2], vec![32]])
            .expand()
            .unwrap();

        assert_eq!(
            sizes,
            vec![
                [16, 8, 1, 32],
                [16, 8, 2, 32],
                [32, 8, 1, 32],
                [32, 8, 2, 32],
                [48, 8, 1, 32],
                [48, 8, 2, 32],
            ]
        );
    }

    #[test]
    fn range_with_increasing_step() {
        let sizes = ProblemSize::Range(vec![vec![1, 1, 1, 11], vec![1], vec![1], vec![1]])
            .expand()
            .unwrap();
        let m: Vec<usize> = sizes.iter().map(|size| size[0]).collect();

        assert_eq!(m, vec![1, 2, 4, 7, 11]);
    }

    #[test]
    fn range_must_increase() {
        assert!(
            ProblemSize::Range(vec![vec![1, 0, 8], vec![1], vec![1], vec![1]])
                .expand()
                .is_err()
        );
        assert!(
            ProblemSize::Range(vec![vec![8, 1], vec![1], vec![1], vec![1]])
                .expand()
                .is_err()
        );
        assert!(ProblemSize::Range(vec![vec![8]]).expand().is_err());
    }

    #[test]
    fn range_stops_at_the_largest_integer() {
        let sizes = ProblemSize::Range(vec![
            vec![i64::MAX - 1, 5, i64::MAX],
            vec![1],
            vec![1],
            vec![1],
        ])
        .expand()
        .unwrap();

        assert_eq!(sizes, vec![[(i64::MAX - 1) as usize, 1, 1, 1]]);
    }

    #[test]
    fn oversized_ranges_are_rejected() {
        let err = ProblemSize::Range(vec![vec![1, i64::MAX], vec![1], vec![1], vec![1]])
            .expand()
            .unwrap_err();
        assert!(err.to_string().contains("too many values"), "{err}");

        let axis = vec![1, 1024];
        let err = ProblemSize::Range(vec![axis.clone(), axis.clone(), vec![1], axis])
            .expand()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSize { .. }), "{err}");
    }
}
