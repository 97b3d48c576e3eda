//! Point budget allocation across tensors

/// Split `target` points across tensors proportionally to their element counts
///
/// Every tensor gets at least `min` points. Tensors pushed onto the floor are
/// taken out of the proportional pool and the remainder is rescaled over the
/// rest. Rounding residue is then handed out (or taken back) one point at a
/// time, largest tensors first, cycling until the sum matches `target`.
///
/// When `target < counts.len() * min` the floor wins and the sum exceeds the
/// target.
pub fn allocate_points(element_counts: &[u64], target: usize, min: usize) -> Vec<usize> {
    let n = element_counts.len();
    if n == 0 {
        return Vec::new();
    }

    let total: u128 = element_counts.iter().map(|&c| c as u128).sum();
    let proportional = |count: u64, pool: usize, pool_total: u128| -> usize {
        if pool_total == 0 {
            pool / n
        } else {
            ((pool as u128 * count as u128) / pool_total) as usize
        }
    };

    // Pass 1: find the tensors whose share falls under the floor
    let floored: Vec<bool> = element_counts
        .iter()
        .map(|&c| proportional(c, target, total) < min)
        .collect();

    // Pass 2: rescale the remaining budget over the tensors above the floor
    let floor_budget = floored.iter().filter(|&&f| f).count() * min;
    let pool = target.saturating_sub(floor_budget);
    let pool_total: u128 = element_counts
        .iter()
        .zip(&floored)
        .filter(|(_, &f)| !f)
        .map(|(&c, _)| c as u128)
        .sum();

    let mut alloc: Vec<usize> = element_counts
        .iter()
        .zip(&floored)
        .map(|(&c, &f)| {
            if f {
                min
            } else {
                proportional(c, pool, pool_total).max(min)
            }
        })
        .collect();

    // Pass 3: deterministic residual fix-up
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| element_counts[b].cmp(&element_counts[a]).then(a.cmp(&b)));

    let sum: usize = alloc.iter().sum();
    if sum < target {
        let mut residual = target - sum;
        for &i in order.iter().cycle() {
            if residual == 0 {
                break;
            }
            alloc[i] += 1;
            residual -= 1;
        }
    } else if sum > target {
        let mut excess = sum - target;
        while excess > 0 {
            let mut progressed = false;
            for &i in &order {
                if excess == 0 {
                    break;
                }
                if alloc[i] > min {
                    alloc[i] -= 1;
                    excess -= 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    alloc
}
