//! Read-only adapters exposing one element of a container as a scalar property value.

use super::array::{HugeDoubleArray, HugeLongArray};
use super::atomic::HugeAtomicLongArray;

/// Reads the property value stored for `index` in a container of type `C`.
pub trait PropertyTranslator<C: ?Sized> {
    /// The value as an integer.
    fn to_long(&self, container: &C, index: usize) -> i64;

    /// The value as a floating point number.
    fn to_double(&self, container: &C, index: usize) -> f64 {
        self.to_long(container, index) as f64
    }
}

/// Translates [`HugeLongArray`] elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct LongArrayTranslator;

impl PropertyTranslator<HugeLongArray> for LongArrayTranslator {
    fn to_long(&self, container: &HugeLongArray, index: usize) -> i64 {
        container.get(index)
    }
}

/// Translates [`HugeDoubleArray`] elements. Integer reads truncate toward zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct DoubleArrayTranslator;

impl PropertyTranslator<HugeDoubleArray> for DoubleArrayTranslator {
    fn to_long(&self, container: &HugeDoubleArray, index: usize) -> i64 {
        container.get(index) as i64
    }

    fn to_double(&self, container: &HugeDoubleArray, index: usize) -> f64 {
        container.get(index)
    }
}

/// Translates [`HugeAtomicLongArray`] elements with an acquire load.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicLongArrayTranslator;

impl PropertyTranslator<HugeAtomicLongArray> for AtomicLongArrayTranslator {
    fn to_long(&self, container: &HugeAtomicLongArray, index: usize) -> i64 {
        container.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::EmptyTracker;

    #[test]
    fn translators_read_through_containers() {
        let longs = HugeLongArray::of(&[3, -4]);
        assert_eq!(LongArrayTranslator.to_long(&longs, 1), -4);
        assert_eq!(LongArrayTranslator.to_double(&longs, 0), 3.0);

        let doubles = HugeDoubleArray::of(&[2.75, -1.5]);
        assert_eq!(DoubleArrayTranslator.to_long(&doubles, 0), 2);
        assert_eq!(DoubleArrayTranslator.to_long(&doubles, 1), -1);
        assert_eq!(DoubleArrayTranslator.to_double(&doubles, 1), -1.5);

        let atomics = HugeAtomicLongArray::new(4, &EmptyTracker);
        atomics.set(2, 9);
        assert_eq!(AtomicLongArrayTranslator.to_long(&atomics, 2), 9);
        assert_eq!(AtomicLongArrayTranslator.to_double(&atomics, 3), 0.0);
    }
}
