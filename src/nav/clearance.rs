use rayon::prelude::*;

use super::grid::IMPASSABLE;

/// Largest `r` such that the `(r+1)x(r+1)` square anchored at `(x, y)` and
/// growing toward +x/+y is in bounds and free of impassable cells, capped at
/// `max_agent_size`.
///
/// Each ring only adds the new top row and right column of the square, so a
/// cell costs O(r^2) lookups in the worst case.
pub fn cell_clearance(cost: &[u8], width: i32, height: i32, x: i32, y: i32, max_agent_size: u8) -> u8 {
    let blocked = |cx: i32, cy: i32| {
        cx < 0 || cy < 0 || cx >= width || cy >= height || cost[(cy * width + cx) as usize] == IMPASSABLE
    };
    for r in 0..=max_agent_size as i32 {
        for i in 0..=r {
            if blocked(x + i, y + r) {
                return r as u8;
            }
        }
        for i in 0..r {
            if blocked(x + r, y + i) {
                return r as u8;
            }
        }
    }
    max_agent_size
}

/// Computes the clearance grid row by row in parallel. The cost grid is read-only
/// and every row writes only its own slice.
pub fn compute_clearance(cost: &[u8], width: i32, height: i32, max_agent_size: u8) -> Vec<u8> {
    let mut clearance = vec![0u8; cost.len()];
    clearance
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                *slot = cell_clearance(cost, width, height, x as i32, y as i32, max_agent_size);
            }
        });
    log::debug!("clearance: computed {}x{} field (max agent size {})", width, height, max_agent_size);
    clearance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_grid_clearance_shrinks_toward_far_edges() {
        let cost = vec![1u8; 25];
        let cl = compute_clearance(&cost, 5, 5, 10);
        assert_eq!(cl[0], 5);
        // (3,3) only has two rows/columns before the edge
        assert_eq!(cl[3 * 5 + 3], 2);
        assert_eq!(cl[4 * 5 + 4], 1);
    }

    #[test]
    fn impassable_cell_has_zero_clearance() {
        let mut cost = vec![1u8; 9];
        cost[4] = IMPASSABLE;
        let cl = compute_clearance(&cost, 3, 3, 3);
        assert_eq!(cl[4], 0);
        // (0,0): the 2x2 square includes (1,1)
        assert_eq!(cl[0], 1);
        assert_eq!(cl[2], 1);
    }

    #[test]
    fn clearance_never_exceeds_max() {
        let cost = vec![3u8; 64 * 64];
        let cl = compute_clearance(&cost, 64, 64, 4);
        assert!(cl.iter().all(|&c| c <= 4));
        assert_eq!(cl[0], 4);
    }
}
