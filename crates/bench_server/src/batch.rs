//! Ordered multi-row update batches.
//!
//! Two concurrent batches that touch overlapping rows must lock those rows in
//! the same global order or they can each end up holding a row the other is
//! waiting for. [`UpdateBatch::sorted`] is the only way to build a batch and
//! it sorts by id ascending, so every batch a backend receives is already in
//! that order.

use crate::model::World;

#[derive(Debug, Clone, Copy)]
pub struct UpdateBatch<'a> {
    worlds: &'a [World],
}

impl<'a> UpdateBatch<'a> {
    /// Stable-sorts `worlds` by id ascending in place and wraps the result.
    pub fn sorted(worlds: &'a mut [World]) -> Self {
        worlds.sort_by_key(|world| world.id);
        Self { worlds }
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    pub fn worlds(&self) -> &'a [World] {
        self.worlds
    }

    /// `(random_number, id)` pairs in submission order.
    pub fn updates(&self) -> impl Iterator<Item = (i32, i32)> + 'a {
        self.worlds
            .iter()
            .map(|world| (world.random_number, world.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(id: i32, random_number: i32) -> World {
        World { id, random_number }
    }

    #[test]
    fn sorts_by_id_ascending() {
        let mut worlds = vec![world(7, 1), world(3, 2), world(9, 3), world(1, 4)];
        let batch = UpdateBatch::sorted(&mut worlds);
        let ids: Vec<i32> = batch.worlds().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 3, 7, 9]);
    }

    #[test]
    fn duplicate_ids_keep_relative_order() {
        let mut worlds = vec![world(5, 10), world(2, 20), world(5, 30), world(2, 40)];
        let batch = UpdateBatch::sorted(&mut worlds);
        assert_eq!(
            batch.updates().collect::<Vec<_>>(),
            vec![(20, 2), (40, 2), (10, 5), (30, 5)]
        );
    }

    #[test]
    fn submission_order_is_non_decreasing() {
        let mut worlds: Vec<World> = (0..200)
            .map(|i| world((i * 7919) % 101, i))
            .collect();
        let batch = UpdateBatch::sorted(&mut worlds);
        let ids: Vec<i32> = batch.updates().map(|(_, id)| id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(batch.len(), 200);
    }

    #[test]
    fn overlapping_sets_share_an_order() {
        let mut first = vec![world(7, 0), world(3, 0)];
        let mut second = vec![world(3, 0), world(7, 0)];
        let a: Vec<i32> = UpdateBatch::sorted(&mut first).updates().map(|(_, id)| id).collect();
        let b: Vec<i32> = UpdateBatch::sorted(&mut second).updates().map(|(_, id)| id).collect();
        assert_eq!(a, vec![3, 7]);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_batch() {
        let mut worlds: Vec<World> = Vec::new();
        let batch = UpdateBatch::sorted(&mut worlds);
        assert!(batch.is_empty());
        assert_eq!(batch.updates().count(), 0);
    }
}
