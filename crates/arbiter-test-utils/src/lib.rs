// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Test utilities shared by the crates in this workspace.

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

/// A result type useful in tests, that wraps any error implementation.
pub type Result<T = ()> = anyhow::Result<T>;

/// Macro for creating parametrized *synchronous* tests.
///
/// The `param_test!` macro accepts the name of an existing function, followed by a list of case
/// names and their arguments. It expands to a module with a `#[test]` function for each of the
/// cases. Each test case calls the existing, named function with their provided arguments.
///
/// # Examples
///
/// Calling a simple test function can be done as follows
///
/// ```
/// # use arbiter_test_utils::param_test;
/// #
/// param_test! {
///     test_sum: [
///         positive_sums: (10, 7, 17),
///         negative_sums: (-5, -3, -8)
///     ]
/// }
/// fn test_sum(lhs: i32, rhs: i32, sum: i32) {
///     assert_eq!(lhs + rhs, sum);
/// }
/// ```
///
/// Functions with return types are also supported, and attributes such as `#[ignore]` can be
/// applied to individual cases.
///
/// ```
/// # use arbiter_test_utils::param_test;
/// #
/// param_test! {
///     test_parses -> Result<(), Box<dyn std::error::Error>>: [
///         #[ignore] ignored_case: ("1"),
///         number: ("8")
///     ]
/// }
/// fn test_parses(to_parse: &str) -> Result<(), Box<dyn std::error::Error>> {
///     let _: u32 = to_parse.parse()?;
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! param_test {
    ($func_name:ident -> $return_ty:ty: [
        $( $(#[$outer:meta])* $case_name:ident: ( $($args:expr),* $(,)? ) ),+$(,)?
    ]) => {
        mod $func_name {
            #[allow(unused_imports)]
            use super::*;

            $(
                #[test]
                $(#[$outer])*
                fn $case_name() -> $return_ty {
                    $func_name($($args),*)
                }
            )*
        }
    };
    ($func_name:ident: [
        $( $(#[$outer:meta])* $case_name:ident: ( $($args:expr),* $(,)? ) ),+$(,)?
    ]) => {
        $crate::param_test!(
            $func_name -> (): [ $( $(#[$outer])* $case_name: ( $($args),* ) ),* ]
        );
    };
}

/// Returns a vector of `data_length` bytes, deterministically derived from `seed`.
pub fn random_data_from_seed(data_length: usize, seed: u64) -> Vec<u8> {
    let mut result = vec![0u8; data_length];
    StdRng::seed_from_u64(seed).fill_bytes(&mut result);
    result
}

/// Returns a copy of `data` in which a single, randomly chosen, byte has been flipped.
///
/// # Panics
///
/// Panics if `data` is empty.
pub fn flip_random_byte(data: &[u8]) -> Vec<u8> {
    assert!(!data.is_empty(), "cannot flip a byte in empty data");
    let mut result = data.to_vec();
    let index = rand::thread_rng().gen_range(0..result.len());
    result[index] ^= 0xff;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    param_test! {
        flipping_changes_exactly_one_byte: [
            single_byte: (1),
            short: (7),
            long: (1024),
        ]
    }
    fn flipping_changes_exactly_one_byte(length: usize) {
        let data = random_data_from_seed(length, 42);
        let flipped = flip_random_byte(&data);

        let differing = data.iter().zip(&flipped).filter(|(a, b)| a != b).count();
        assert_eq!(differing, 1);
    }

    #[test]
    fn seeded_data_is_deterministic() {
        assert_eq!(random_data_from_seed(64, 7), random_data_from_seed(64, 7));
        assert_ne!(random_data_from_seed(64, 7), random_data_from_seed(64, 8));
    }
}
