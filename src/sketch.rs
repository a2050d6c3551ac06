/*
    A HyperLogLog sketch, used to estimate the number of distinct values in a
    column for approx_count_distinct().

    Values are hashed to 64 bits. The top PRECISION bits select a register, and
    the register keeps the maximum position of the first set bit among the
    remaining hash bits of all values routed to it. The estimate is the
    harmonic mean of 2^register across registers, with the usual small and
    large range corrections from "HyperLogLog in Practice".

    Unlike a counting HyperLogLog there are no probabilistic counters, so the
    sketch is deterministic: the same set of values always yields the same
    estimate, regardless of insertion order. Both engines rely on this to
    produce identical approximate results.
*/

use std::hash::{DefaultHasher, Hash, Hasher};

/// The number of hash bits used to select a register.
const PRECISION: u32 = 12;
/// The number of registers.
const M: usize = 1 << PRECISION;

/// Values that can be added to a sketch. Each kind is tagged before hashing,
/// so that e.g. the integer 1 and the boolean true hash differently.
#[derive(Clone, Copy, Debug)]
pub enum SketchValue<'a> {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(&'a str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct HyperLogLog {
    registers: Vec<u8>,
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperLogLog {
    pub fn new() -> Self {
        Self { registers: vec![0; M] }
    }

    /// Adds a value to the sketch.
    pub fn add(&mut self, value: SketchValue) {
        self.add_hash(hash(value))
    }

    /// Adds a pre-hashed value to the sketch.
    pub fn add_hash(&mut self, hash: u64) {
        let register = (hash >> (64 - PRECISION)) as usize;
        let rest = hash << PRECISION;
        // Position of the first set bit, capped when the remaining bits are 0.
        let rank = (rest.leading_zeros().min(64 - PRECISION) + 1) as u8;
        if rank > self.registers[register] {
            self.registers[register] = rank;
        }
    }

    /// Merges another sketch into this one.
    pub fn merge(&mut self, other: &HyperLogLog) {
        for (register, other) in self.registers.iter_mut().zip(&other.registers) {
            *register = (*register).max(*other);
        }
    }

    /// Returns the estimated number of distinct values.
    pub fn estimate(&self) -> f64 {
        let m = M as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);
        let mut sum = 0.0;
        let mut zeros = 0;
        for register in &self.registers {
            sum += 2.0f64.powi(-i32::from(*register));
            if *register == 0 {
                zeros += 1;
            }
        }
        let estimate = alpha * m * m / sum;
        if estimate <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else if estimate <= (1u64 << 32) as f64 / 30.0 {
            estimate
        } else {
            -((1u64 << 32) as f64) * (1.0 - estimate / (1u64 << 32) as f64).ln()
        }
    }

    /// Returns the estimate rounded to an integer count.
    pub fn count(&self) -> i64 {
        self.estimate().round() as i64
    }
}

/// Hashes a value deterministically.
pub fn hash(value: SketchValue) -> u64 {
    let mut hasher = DefaultHasher::new();
    match value {
        SketchValue::Boolean(b) => (0u8, b).hash(&mut hasher),
        SketchValue::Integer(i) => (1u8, i).hash(&mut hasher),
        SketchValue::Float(f) => {
            // Normalize -0.0 to 0.0, and all NaNs to a single NaN.
            let f = if f == 0.0 { 0.0 } else if f.is_nan() { f64::NAN } else { f };
            (2u8, f.to_bits()).hash(&mut hasher)
        }
        SketchValue::String(s) => (3u8, s).hash(&mut hasher),
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn empty_is_zero() {
        assert_eq!(HyperLogLog::new().count(), 0);
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut hll = HyperLogLog::new();
        for _ in 0..100 {
            hll.add(SketchValue::String("a"));
            hll.add(SketchValue::Integer(7));
        }
        assert_eq!(hll.count(), 2);
    }

    #[test_case(100; "hundred")]
    #[test_case(10_000; "ten thousand")]
    #[test_case(200_000; "two hundred thousand")]
    fn estimate_within_error(n: i64) {
        let mut hll = HyperLogLog::new();
        for i in 0..n {
            hll.add(SketchValue::Integer(i));
        }
        let error = (hll.estimate() - n as f64).abs() / n as f64;
        assert!(error < 0.05, "estimate {} for {n} values", hll.estimate());
    }

    #[test]
    fn order_independent() {
        let mut forward = HyperLogLog::new();
        let mut backward = HyperLogLog::new();
        for i in 0..1000 {
            forward.add(SketchValue::Integer(i));
            backward.add(SketchValue::Integer(999 - i));
        }
        assert_eq!(forward, backward);
    }

    #[test]
    fn merge_is_union() {
        let (mut a, mut b, mut both) = (HyperLogLog::new(), HyperLogLog::new(), HyperLogLog::new());
        for i in 0..500 {
            a.add(SketchValue::Integer(i));
            both.add(SketchValue::Integer(i));
        }
        for i in 250..750 {
            b.add(SketchValue::Integer(i));
            both.add(SketchValue::Integer(i));
        }
        a.merge(&b);
        assert_eq!(a, both);
    }

    #[test]
    fn float_zero_and_nan_normalized() {
        assert_eq!(hash(SketchValue::Float(0.0)), hash(SketchValue::Float(-0.0)));
        assert_eq!(hash(SketchValue::Float(f64::NAN)), hash(SketchValue::Float(-f64::NAN)));
        assert_ne!(hash(SketchValue::Integer(1)), hash(SketchValue::Boolean(true)));
    }
}
