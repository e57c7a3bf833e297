//! Per-gate derived fields and the output field-descriptor table.

use crate::prelude::MISSING;
use serde::{Deserialize, Serialize};

/// All derived quantities for one gate.
///
/// Every value starts at the missing sentinel and is populated only when
/// its SNR/validity preconditions hold, so downstream consumers can skip
/// unavailable quantities uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fields {
    pub snr: f32,
    pub dbm: f32,
    pub dbz: f32,
    pub vel: f32,
    pub width: f32,

    /// Clutter power relative to the corrected signal power, dB.
    pub clut: f32,
    pub dbz_filtered: f32,
    pub vel_filtered: f32,
    pub width_filtered: f32,

    pub zdr: f32,
    pub rhohv: f32,
    pub phidp: f32,
    pub kdp: f32,

    pub ratio_narrow: f32,
    pub ratio_wide: f32,
    pub clut_wx_peak_sep: f32,

    pub tdbz: f32,
    pub sqrt_tdbz: f32,
    pub spin: f32,
    pub vel_sdev: f32,
    pub zdr_sdev: f32,
    pub rhohv_sdev: f32,
    pub phidp_sdev: f32,

    pub cmd: f32,
    pub cmd_flag: bool,
}

impl Fields {
    pub fn new() -> Self {
        Self {
            snr: MISSING,
            dbm: MISSING,
            dbz: MISSING,
            vel: MISSING,
            width: MISSING,
            clut: MISSING,
            dbz_filtered: MISSING,
            vel_filtered: MISSING,
            width_filtered: MISSING,
            zdr: MISSING,
            rhohv: MISSING,
            phidp: MISSING,
            kdp: MISSING,
            ratio_narrow: MISSING,
            ratio_wide: MISSING,
            clut_wx_peak_sep: MISSING,
            tdbz: MISSING,
            sqrt_tdbz: MISSING,
            spin: MISSING,
            vel_sdev: MISSING,
            zdr_sdev: MISSING,
            rhohv_sdev: MISSING,
            phidp_sdev: MISSING,
            cmd: MISSING,
            cmd_flag: false,
        }
    }
}

impl Default for Fields {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor for one output field: name, units and accessor.
///
/// Output formatting iterates this table once instead of branching per
/// field, and new fields become one more row.
pub struct FieldDescriptor {
    pub name: &'static str,
    pub units: &'static str,
    pub get: fn(&Fields) -> f32,
}

/// The full output table, in publication order.
pub const FIELD_TABLE: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "SNR",
        units: "dB",
        get: |f| f.snr,
    },
    FieldDescriptor {
        name: "DBM",
        units: "dBm",
        get: |f| f.dbm,
    },
    FieldDescriptor {
        name: "DBZ",
        units: "dBZ",
        get: |f| f.dbz,
    },
    FieldDescriptor {
        name: "VEL",
        units: "m/s",
        get: |f| f.vel,
    },
    FieldDescriptor {
        name: "WIDTH",
        units: "m/s",
        get: |f| f.width,
    },
    FieldDescriptor {
        name: "CLUT",
        units: "dB",
        get: |f| f.clut,
    },
    FieldDescriptor {
        name: "DBZF",
        units: "dBZ",
        get: |f| f.dbz_filtered,
    },
    FieldDescriptor {
        name: "VELF",
        units: "m/s",
        get: |f| f.vel_filtered,
    },
    FieldDescriptor {
        name: "WIDTHF",
        units: "m/s",
        get: |f| f.width_filtered,
    },
    FieldDescriptor {
        name: "ZDR",
        units: "dB",
        get: |f| f.zdr,
    },
    FieldDescriptor {
        name: "RHOHV",
        units: "",
        get: |f| f.rhohv,
    },
    FieldDescriptor {
        name: "PHIDP",
        units: "deg",
        get: |f| f.phidp,
    },
    FieldDescriptor {
        name: "KDP",
        units: "deg/km",
        get: |f| f.kdp,
    },
    FieldDescriptor {
        name: "RATIO_NARROW",
        units: "dB",
        get: |f| f.ratio_narrow,
    },
    FieldDescriptor {
        name: "RATIO_WIDE",
        units: "dB",
        get: |f| f.ratio_wide,
    },
    FieldDescriptor {
        name: "PEAK_SEP",
        units: "m/s",
        get: |f| f.clut_wx_peak_sep,
    },
    FieldDescriptor {
        name: "TDBZ",
        units: "dBZ^2",
        get: |f| f.tdbz,
    },
    FieldDescriptor {
        name: "SPIN",
        units: "%",
        get: |f| f.spin,
    },
    FieldDescriptor {
        name: "VEL_SDEV",
        units: "m/s",
        get: |f| f.vel_sdev,
    },
    FieldDescriptor {
        name: "ZDR_SDEV",
        units: "dB",
        get: |f| f.zdr_sdev,
    },
    FieldDescriptor {
        name: "RHOHV_SDEV",
        units: "",
        get: |f| f.rhohv_sdev,
    },
    FieldDescriptor {
        name: "PHIDP_SDEV",
        units: "deg",
        get: |f| f.phidp_sdev,
    },
    FieldDescriptor {
        name: "CMD",
        units: "",
        get: |f| f.cmd,
    },
    FieldDescriptor {
        name: "CMD_FLAG",
        units: "",
        get: |f| {
            if f.cmd_flag {
                1.0
            } else {
                0.0
            }
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::is_missing;

    #[test]
    fn new_fields_are_all_missing() {
        let fields = Fields::new();
        for descriptor in FIELD_TABLE {
            if descriptor.name == "CMD_FLAG" {
                assert_eq!((descriptor.get)(&fields), 0.0);
            } else {
                assert!(is_missing((descriptor.get)(&fields)), "{}", descriptor.name);
            }
        }
    }

    #[test]
    fn table_names_are_unique() {
        let mut names: Vec<&str> = FIELD_TABLE.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FIELD_TABLE.len());
    }
}
