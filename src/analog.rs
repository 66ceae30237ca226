//! Switch sensing over analog inputs.
//!
//! Multi-position switches are wired as resistor ladders, so a position shows
//! up as a voltage band. Readings are averaged to ride out contact noise.

use crate::hal::Board;

/// Full scale of the 10-bit converter.
pub const ADC_MAX: u16 = 1023;

/// Average of `samples` readings of `channel`.
pub fn averaged_level<B: Board + ?Sized>(board: &mut B, channel: u8, samples: u8) -> u16 {
    let samples = samples.max(1);
    let total: u32 = (0..samples)
        .map(|_| board.analog_sample(channel) as u32)
        .sum();
    (total / samples as u32) as u16
}

/// Map `level` onto one of `positions` equally wide bands.
pub fn quantize(level: u16, positions: u8) -> u8 {
    if positions <= 1 {
        return 0;
    }
    let level = level.min(ADC_MAX) as u32;
    let band = (ADC_MAX as u32 + 1) / positions as u32;
    ((level / band) as u8).min(positions - 1)
}
