//! Euclidean rhythm generation.
//!
//! Bjorklund's algorithm distributes `pulse` onsets as evenly as possible
//! across `step` slots; rotation shifts the result left.

/// Distribute `pulse` pulses over `step` slots.
///
/// `pulse >= step` saturates to all-pulses; `pulse == 0` is all rests.
pub fn bjorklund(pulse: usize, step: usize, rotation: usize) -> Vec<bool> {
    if step == 0 {
        return Vec::new();
    }
    if pulse == 0 {
        return vec![false; step];
    }
    if pulse >= step {
        return vec![true; step];
    }

    let mut pattern = vec![true; pulse];
    pattern.extend(vec![false; step - pulse]);

    let mut groups: Vec<Vec<bool>> = pattern.into_iter().map(|b| vec![b]).collect();

    loop {
        let ones = groups.iter().filter(|g| g.iter().all(|&x| x)).count();
        let zeros = groups.len() - ones;

        if zeros <= 1 {
            break;
        }

        let pairs = ones.min(zeros);
        if pairs == 0 {
            break;
        }

        let mut next = Vec::new();
        for i in 0..pairs {
            let mut combined = groups[i].clone();
            combined.extend_from_slice(&groups[ones + i]);
            next.push(combined);
        }
        for group in groups.iter().take(ones).skip(pairs) {
            next.push(group.clone());
        }
        for group in groups.iter().skip(ones + pairs) {
            next.push(group.clone());
        }
        groups = next;
    }

    let mut result: Vec<bool> = groups.into_iter().flatten().collect();

    if rotation > 0 && !result.is_empty() {
        let rot = rotation % result.len();
        result.rotate_left(rot);
    }

    result
}

/// Slot indices of the pulses.
pub fn pulse_positions(pulse: usize, step: usize, rotation: usize) -> Vec<usize> {
    bjorklund(pulse, step, rotation)
        .into_iter()
        .enumerate()
        .filter_map(|(i, on)| on.then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(pulse: usize, step: usize, rotation: usize) -> String {
        bjorklund(pulse, step, rotation)
            .into_iter()
            .map(|b| if b { 'x' } else { '.' })
            .collect()
    }

    #[test]
    fn classic_distributions() {
        assert_eq!(render(3, 8, 0), "x..x..x.");
        assert_eq!(render(3, 5, 0), "x.x.x");
        assert_eq!(render(5, 8, 0), "x.xx.xx.");
        assert_eq!(render(4, 4, 0), "xxxx");
    }

    #[test]
    fn edge_cases() {
        assert_eq!(bjorklund(0, 4, 0), vec![false; 4]);
        assert_eq!(bjorklund(6, 4, 0), vec![true; 4]);
        assert!(bjorklund(3, 0, 0).is_empty());
    }

    #[test]
    fn rotation_shifts_left() {
        assert_eq!(render(3, 8, 1), "..x..x.x");
        assert_eq!(render(3, 8, 8), render(3, 8, 0));
    }

    #[test]
    fn pulse_positions_match_pattern() {
        assert_eq!(pulse_positions(3, 8, 0), vec![0, 3, 6]);
        assert_eq!(pulse_positions(3, 5, 0), vec![0, 2, 4]);
    }
}
