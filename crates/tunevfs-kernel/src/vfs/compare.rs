//! Natural ("human") ordering of names.
//!
//! Letters compare case-insensitively and digit runs compare by value, so
//! `track2` < `track10`. Among names that are otherwise equal, more leading
//! zeros sort later (`file1` < `file01`), then lowercase sorts before
//! uppercase (`track10` < `Track10`), then the shorter name wins. Two names
//! compare `Equal` only when they are identical.

use std::cmp::Ordering;
use std::sync::Arc;

use super::extension::{Comparator, ExtensionId};
use super::traits::VfsNode;

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (mut i, mut j) = (0, 0);
    let mut zeros = Ordering::Equal;
    let mut case = Ordering::Equal;

    loop {
        let (ca, cb) = match (a.get(i), b.get(j)) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => (*ca, *cb),
        };

        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let run_a = digit_run(&a[i..]);
            let run_b = digit_run(&b[j..]);
            let (zeros_a, value_a) = split_leading_zeros(&a[i..i + run_a]);
            let (zeros_b, value_b) = split_leading_zeros(&b[j..j + run_b]);

            let by_value = value_a.len().cmp(&value_b.len()).then_with(|| value_a.cmp(value_b));
            if by_value != Ordering::Equal {
                return by_value;
            }
            if zeros == Ordering::Equal {
                zeros = zeros_a.cmp(&zeros_b);
            }
            i += run_a;
            j += run_b;
            continue;
        }

        let folded = fold(ca).cmp(&fold(cb));
        if folded != Ordering::Equal {
            return folded;
        }
        if case == Ordering::Equal && ca != cb {
            case = case_order(ca, cb);
        }
        i += 1;
        j += 1;
    }

    zeros
        .then(case)
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(&b))
}

fn digit_run(chars: &[char]) -> usize {
    chars.iter().take_while(|c| c.is_ascii_digit()).count()
}

/// Number of leading zeros and the significant digits.
fn split_leading_zeros(run: &[char]) -> (usize, &[char]) {
    let zeros = run.iter().take_while(|c| **c == '0').count();
    (zeros, &run[zeros..])
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn case_order(a: char, b: char) -> Ordering {
    match (a.is_lowercase(), b.is_lowercase()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(&b),
    }
}

/// Orders nodes by name.
pub fn natural_comparator() -> Comparator {
    Arc::new(|a: &VfsNode, b: &VfsNode| natural_cmp(&a.name(), &b.name()))
}

/// Comparator supplied by `dir`, falling back to natural name order.
pub fn comparator_for(dir: &VfsNode) -> Comparator {
    dir.extension(ExtensionId::Comparator)
        .and_then(|ext| ext.into_comparator())
        .unwrap_or_else(natural_comparator)
}

/// Stable sort.
pub fn sort_nodes(nodes: &mut [VfsNode], comparator: &Comparator) {
    nodes.sort_by(|a, b| comparator(a, b));
}
