/// Anchor a number to a power of the provided base.
///
/// Useful when creating autotune keys. Zero anchors to `min`, or to one when there is no minimum.
pub fn anchor(x: usize, max: Option<usize>, min: Option<usize>, base: Option<usize>) -> usize {
    let base = base.unwrap_or(2);
    let power = match x {
        0 => 1,
        x => base.pow(x.ilog(base)),
    };

    let result = match max {
        Some(max) => core::cmp::min(power, max),
        None => power,
    };

    match min {
        Some(min) => core::cmp::max(result, min),
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_down_to_power_of_two() {
        assert_eq!(anchor(1000, None, None, None), 512);
        assert_eq!(anchor(1024, None, None, None), 1024);
        assert_eq!(anchor(3, None, None, None), 2);
    }

    #[test]
    fn anchors_respect_bounds() {
        assert_eq!(anchor(1 << 20, Some(4096), None, None), 4096);
        assert_eq!(anchor(3, None, Some(16), None), 16);
        assert_eq!(anchor(0, None, None, None), 1);
        assert_eq!(anchor(100, None, None, Some(10)), 100);
    }
}
