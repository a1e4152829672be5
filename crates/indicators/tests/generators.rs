#![allow(dead_code)]

use proptest::prelude::*;

/// One correction applied to a live quote source.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Replace the close of the `n`-th cached quote (modulo length).
    Update { n: usize, close: f64 },
    /// Insert a quote halfway between the `n`-th cached quote and its
    /// predecessor (modulo length).
    Insert { n: usize, close: f64 },
    /// Remove the `n`-th cached quote (modulo length).
    Delete { n: usize },
    /// Append after the newest quote.
    Append { close: f64 },
}

fn close() -> impl Strategy<Value = f64> {
    90.0f64..110.0
}

pub fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (any::<usize>(), close()).prop_map(|(n, close)| Edit::Update { n, close }),
        2 => (any::<usize>(), close()).prop_map(|(n, close)| Edit::Insert { n, close }),
        2 => any::<usize>().prop_map(|n| Edit::Delete { n }),
        1 => close().prop_map(|close| Edit::Append { close }),
    ]
}

pub fn edit_sequence(max_len: usize) -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(edit(), 1..=max_len)
}

/// Indicator periods small enough to warm up inside short series.
pub fn period() -> impl Strategy<Value = usize> {
    1usize..=20
}
