use std::f32::consts::PI;

/// Wraps a radian angle to (-pi, pi].
pub fn wrap_angle(mut angle: f32) -> f32 {
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    while angle > PI {
        angle -= 2.0 * PI;
    }
    angle
}

/// Difference az1 - az2 in degrees, wrapped to [-180, 180].
pub fn az_diff(az1: f32, az2: f32) -> f32 {
    let mut diff = az1 - az2;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }
    diff
}

/// Normalizes an azimuth in degrees to [0, 360).
pub fn condition_az(mut az: f32) -> f32 {
    while az < 0.0 {
        az += 360.0;
    }
    while az >= 360.0 {
        az -= 360.0;
    }
    az
}
