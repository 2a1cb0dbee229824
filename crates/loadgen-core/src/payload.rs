//! Workload hash generation.

use crate::backend::HashField;
use crate::config::PayloadShape;
use rand::Rng;

/// Build a fresh field set for one write: fields named `"0"..n-1`, each holding
/// `field_size` random bytes drawn from `rng`.
pub fn generate<R: Rng>(shape: &PayloadShape, rng: &mut R) -> Vec<HashField> {
    (0..shape.field_count)
        .map(|i| {
            let mut value = vec![0u8; shape.field_size];
            rng.fill(value.as_mut_slice());
            HashField {
                name: i.to_string(),
                value,
            }
        })
        .collect()
}
