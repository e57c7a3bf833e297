//! Post-classification cleanup of the gate flag array: speckle removal
//! and gap infill. Both passes are idempotent.

use crate::config::SpeckleThreshold;
use crate::prelude::is_missing;

/// Unflags short isolated runs whose fused score is weak.
///
/// Thresholds are applied longest first: a flagged run of `length` or
/// fewer gates keeps only the gates whose score reaches `min_valid_cmd`.
pub fn run_speckle_filter(flags: &mut [bool], cmd: &[f32], thresholds: &[SpeckleThreshold]) {
    let mut rungs: Vec<&SpeckleThreshold> = thresholds.iter().collect();
    rungs.sort_by(|a, b| b.length.cmp(&a.length));

    for rung in rungs {
        let mut gate = 0;
        while gate < flags.len() {
            if !flags[gate] {
                gate += 1;
                continue;
            }
            let start = gate;
            while gate < flags.len() && flags[gate] {
                gate += 1;
            }
            let run_len = gate - start;
            if run_len <= rung.length {
                for ii in start..gate {
                    if is_missing(cmd[ii]) || cmd[ii] < rung.min_valid_cmd {
                        flags[ii] = false;
                    }
                }
            }
        }
    }
}

/// Fills short unflagged gaps bracketed by flagged runs at least as long
/// as the gap itself. Runs are measured in a forward pass and the
/// per-gate run lengths propagated backward, so the whole filter is two
/// linear sweeps.
pub fn fill_flag_gaps(flags: &mut [bool], max_gap: usize) {
    let n = flags.len();
    if n == 0 || max_gap == 0 {
        return;
    }

    // forward pass: length of the run each gate belongs to, counted up
    // to the gate; backward pass extends that to the full run length
    let mut run_len = vec![0usize; n];
    let mut count = 0usize;
    let mut prev = flags[0];
    for ii in 0..n {
        if flags[ii] == prev {
            count += 1;
        } else {
            count = 1;
            prev = flags[ii];
        }
        run_len[ii] = count;
    }
    for ii in (0..n - 1).rev() {
        if flags[ii] == flags[ii + 1] {
            run_len[ii] = run_len[ii + 1];
        }
    }

    let mut gate = 0;
    while gate < n {
        if flags[gate] {
            gate += 1;
            continue;
        }
        let gap = run_len[gate];
        let start = gate;
        let end = gate + gap; // first index past the gap
        if gap <= max_gap && start > 0 && end < n {
            let before = run_len[start - 1];
            let after = run_len[end];
            if before.min(after) >= gap {
                for ii in start..end {
                    flags[ii] = true;
                }
            }
        }
        gate = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Vec<SpeckleThreshold> {
        vec![
            SpeckleThreshold {
                length: 3,
                min_valid_cmd: 0.75,
            },
            SpeckleThreshold {
                length: 1,
                min_valid_cmd: 0.6,
            },
        ]
    }

    #[test]
    fn weak_single_gate_speckle_is_removed() {
        let mut flags = vec![false, false, true, false, false];
        let cmd = vec![0.0, 0.0, 0.55, 0.0, 0.0];
        run_speckle_filter(&mut flags, &cmd, &thresholds());
        assert!(!flags[2]);
    }

    #[test]
    fn strong_short_run_survives() {
        let mut flags = vec![false, true, true, true, false];
        let cmd = vec![0.0, 0.9, 0.85, 0.8, 0.0];
        run_speckle_filter(&mut flags, &cmd, &thresholds());
        assert_eq!(flags, vec![false, true, true, true, false]);
    }

    #[test]
    fn long_runs_are_untouched() {
        let mut flags = vec![true; 8];
        let cmd = vec![0.5; 8];
        run_speckle_filter(&mut flags, &cmd, &thresholds());
        assert!(flags.iter().all(|&f| f));
    }

    #[test]
    fn speckle_filter_is_idempotent() {
        let mut flags = vec![true, false, true, true, false, true, true, true, true, false];
        let cmd = vec![0.55, 0.0, 0.9, 0.7, 0.0, 0.8, 0.8, 0.65, 0.9, 0.0];
        let cmd_ref = cmd.clone();
        run_speckle_filter(&mut flags, &cmd, &thresholds());
        let first = flags.clone();
        run_speckle_filter(&mut flags, &cmd_ref, &thresholds());
        assert_eq!(flags, first);
    }

    #[test]
    fn bracketed_gap_is_filled() {
        let mut flags = vec![true, true, true, false, false, true, true, true];
        fill_flag_gaps(&mut flags, 3);
        assert!(flags.iter().all(|&f| f));
    }

    #[test]
    fn gap_longer_than_neighbors_stays_open() {
        // gap of 3 flanked by runs of 2: neighbors shorter than the gap
        let mut flags = vec![true, true, false, false, false, true, true];
        fill_flag_gaps(&mut flags, 3);
        assert_eq!(
            flags,
            vec![true, true, false, false, false, true, true]
        );
    }

    #[test]
    fn leading_and_trailing_gaps_are_never_filled() {
        let mut flags = vec![false, false, true, true, true, false];
        fill_flag_gaps(&mut flags, 3);
        assert_eq!(flags, vec![false, false, true, true, true, false]);
    }

    #[test]
    fn gap_fill_is_idempotent() {
        let mut flags = vec![true, true, false, true, true, false, false, false, false, true];
        fill_flag_gaps(&mut flags, 3);
        let first = flags.clone();
        fill_flag_gaps(&mut flags, 3);
        assert_eq!(flags, first);
    }
}
