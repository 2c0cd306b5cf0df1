//! # Cent Meter
//!
//! Text rendition of the tuning needle: a fixed-width bar from -50 to +50
//! cents with a marker at the current deviation and a zone label.

/// The meter spans -50 to +50 cents.
const METER_RANGE: f64 = 50.0;

/// Character cells between the two ends of the meter. Odd, so there is a
/// center cell.
const METER_WIDTH: usize = 41;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    InTune,
    Close,
    Off,
}

impl Zone {
    pub fn of(cents: f64) -> Zone {
        let deviation = cents.abs();
        if deviation < 5.0 {
            Zone::InTune
        } else if deviation < 20.0 {
            Zone::Close
        } else {
            Zone::Off
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Zone::InTune => "in tune",
            Zone::Close => "close",
            Zone::Off => "off",
        }
    }
}

pub struct CentMeter {
    /// Current deviation, `None` when no pitch is shown.
    cents: Option<f64>,
}

impl CentMeter {
    pub fn new(cents: Option<f64>) -> Self {
        Self { cents }
    }

    /// Cell index of the needle, clamped to the meter.
    fn needle_position(cents: f64) -> usize {
        let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
        let fraction = (clamped + METER_RANGE) / (2.0 * METER_RANGE);
        (fraction * (METER_WIDTH - 1) as f64).round() as usize
    }

    pub fn render(&self) -> String {
        let center = METER_WIDTH / 2;
        let needle = self.cents.map(Self::needle_position);

        let mut bar = String::with_capacity(METER_WIDTH + 2);
        bar.push('[');
        for cell in 0..METER_WIDTH {
            let glyph = match needle {
                Some(position) if position == cell => '|',
                _ if cell == center => '+',
                _ => '-',
            };
            bar.push(glyph);
        }
        bar.push(']');

        match self.cents {
            Some(cents) => format!("{} {:+5.1} {}", bar, cents, Zone::of(cents).label()),
            None => bar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needle_sits_in_the_center_when_in_tune() {
        let meter = CentMeter::new(Some(0.0)).render();
        assert_eq!(meter.find('|'), Some(1 + METER_WIDTH / 2));
        assert!(meter.ends_with("in tune"));
    }

    #[test]
    fn needle_clamps_at_the_ends() {
        assert_eq!(CentMeter::needle_position(-80.0), 0);
        assert_eq!(CentMeter::needle_position(80.0), METER_WIDTH - 1);
    }

    #[test]
    fn zones_follow_the_deviation() {
        assert_eq!(Zone::of(-4.9), Zone::InTune);
        assert_eq!(Zone::of(12.0), Zone::Close);
        assert_eq!(Zone::of(-25.0), Zone::Off);
    }

    #[test]
    fn empty_meter_has_no_needle() {
        let meter = CentMeter::new(None).render();
        assert!(!meter.contains('|'));
        assert_eq!(meter.chars().count(), METER_WIDTH + 2);
    }
}
