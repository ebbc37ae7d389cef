//! Decibel and gain conversions

/// Floor used when converting silence to decibels
pub const MIN_DB: f32 = -100.0;

/// Convert decibels to a linear amplitude gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    if db <= MIN_DB {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

/// Convert a linear amplitude gain to decibels, floored at [`MIN_DB`]
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        MIN_DB
    } else {
        (20.0 * gain.log10()).max(MIN_DB)
    }
}
