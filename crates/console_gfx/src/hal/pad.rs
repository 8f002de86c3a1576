//! Input pad abstraction
//!
//! The pad reports "buttons newly pressed this poll": a bit is set for one
//! scan when the physical button goes down, then clears until it is released
//! and pressed again. Edge detection is the pad driver's job.

use bitflags::bitflags;

bitflags! {
    /// Pad buttons, one bit per physical button
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u16 {
        /// Home button (process exit)
        const HOME = 1 << 0;
        /// A face button
        const A = 1 << 1;
        /// B face button (synthetic load spike)
        const B = 1 << 2;
        /// Directional pad up
        const UP = 1 << 3;
        /// Directional pad down
        const DOWN = 1 << 4;
        /// Directional pad left
        const LEFT = 1 << 5;
        /// Directional pad right
        const RIGHT = 1 << 6;
    }
}

/// A handheld controller
pub trait InputPad {
    /// Sample the hardware; call once per loop iteration
    fn scan(&mut self);

    /// Buttons that went down since the previous scan
    fn pressed(&self) -> Buttons;
}

/// A pad that replays a fixed press schedule, keyed by scan number
///
/// Scan numbers are 1-based: the first [`InputPad::scan`] call is scan 1.
/// Used by the headless demo and the loop tests.
pub struct ScriptedPad {
    schedule: Vec<(u64, Buttons)>,
    scan_count: u64,
    current: Buttons,
}

impl ScriptedPad {
    /// Create a pad that never reports a press
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    /// Create a pad from `(scan_number, buttons)` entries
    pub fn new(schedule: Vec<(u64, Buttons)>) -> Self {
        Self {
            schedule,
            scan_count: 0,
            current: Buttons::empty(),
        }
    }

    /// Number of scans performed so far
    pub fn scan_count(&self) -> u64 {
        self.scan_count
    }
}

impl InputPad for ScriptedPad {
    fn scan(&mut self) {
        self.scan_count += 1;
        self.current = self
            .schedule
            .iter()
            .filter(|(scan, _)| *scan == self.scan_count)
            .fold(Buttons::empty(), |acc, (_, b)| acc | *b);
    }

    fn pressed(&self) -> Buttons {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_presses_fire_on_their_scan_only() {
        let mut pad = ScriptedPad::new(vec![(2, Buttons::B), (3, Buttons::HOME)]);

        pad.scan();
        assert_eq!(pad.pressed(), Buttons::empty());

        pad.scan();
        assert_eq!(pad.pressed(), Buttons::B);

        pad.scan();
        assert_eq!(pad.pressed(), Buttons::HOME);

        pad.scan();
        assert_eq!(pad.pressed(), Buttons::empty());
    }

    #[test]
    fn presses_on_the_same_scan_combine() {
        let mut pad = ScriptedPad::new(vec![(1, Buttons::B), (1, Buttons::LEFT)]);
        pad.scan();
        assert!(pad.pressed().contains(Buttons::B | Buttons::LEFT));
    }
}
