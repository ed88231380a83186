use std::future::Future;

use itertools::Itertools;

use super::join_circuits_all;

/// Aggregate elements by combining neighbours level by level, in ceil(log_2(n)) rounds.
/// Combination order follows sequence order, so `combine_fn` need not be commutative.
/// An odd element at the end of a level is carried over unchanged.
pub async fn fold_tree<T, F, Fut>(iter: impl IntoIterator<Item = T>, default: T, combine_fn: F) -> T
where
    F: Copy + Fn(T, T) -> Fut,
    Fut: Future<Output = T>,
{
    let mut level: Vec<T> = iter.into_iter().collect();

    while level.len() > 1 {
        let pairs = level
            .into_iter()
            .batching(|elems| elems.next().map(|left| (left, elems.next())));

        level = join_circuits_all(pairs.map(|(left, right)| async move {
            match right {
                Some(right) => combine_fn(left, right).await,
                None => left,
            }
        }))
        .await;
    }

    level.pop().unwrap_or(default)
}
