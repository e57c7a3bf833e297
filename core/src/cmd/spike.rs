//! Point-clutter spike removal on the filtered fields, run after the
//! clutter filter. A spike is a gate whose filtered reflectivity stands
//! a fixed margin above both second-nearest neighbors.

use crate::fields::Fields;
use crate::prelude::is_missing;

/// Spike margin, dB.
const TCN: f32 = 9.0;

fn exceeds(a: f32, b: f32) -> bool {
    !is_missing(a) && !is_missing(b) && a - b > TCN
}

fn substitute(fields: &mut [Fields], dst: usize, src: usize) {
    fields[dst].dbz_filtered = fields[src].dbz_filtered;
    fields[dst].vel_filtered = fields[src].vel_filtered;
    fields[dst].width_filtered = fields[src].width_filtered;
}

fn substitute_dbz(fields: &mut [Fields], dst: usize, src: usize) {
    fields[dst].dbz_filtered = fields[src].dbz_filtered;
}

/// Removes isolated single- and double-gate spikes from the filtered
/// reflectivity, velocity and width.
pub fn filter_spikes(fields: &mut [Fields]) {
    let n = fields.len();
    if n < 7 {
        return;
    }
    let mut ii = 2;
    while ii + 3 < n {
        let this_gate = exceeds(fields[ii].dbz_filtered, fields[ii - 2].dbz_filtered)
            && exceeds(fields[ii].dbz_filtered, fields[ii + 2].dbz_filtered);
        let next_gate = exceeds(fields[ii + 1].dbz_filtered, fields[ii - 1].dbz_filtered)
            && exceeds(fields[ii + 1].dbz_filtered, fields[ii + 3].dbz_filtered);

        if this_gate && next_gate {
            // adjacent double spike: rebuild both halves from the
            // nearest clean gates on each side
            substitute(fields, ii - 1, ii - 2);
            substitute(fields, ii, ii - 2);
            substitute(fields, ii + 1, ii + 3);
            substitute(fields, ii + 2, ii + 3);
            ii += 3;
        } else if this_gate {
            // single spike: shoulders take their outer neighbors, the
            // spike itself the clean gate two back
            substitute_dbz(fields, ii - 1, ii - 2);
            substitute_dbz(fields, ii + 1, ii + 2);
            substitute(fields, ii, ii - 2);
            ii += 2;
        } else {
            ii += 1;
        }
    }
}
