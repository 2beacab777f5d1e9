use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

use super::{Tempo, TicksTime};

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

pub type UnitType = u64;
pub const UNITS_PER_SECOND: UnitType = NANOS_PER_SECOND as UnitType;
pub const UNITS_PER_NANO: UnitType = NANOS_PER_SECOND / UNITS_PER_SECOND;

const SECONDS_PER_MINUTE: u64 = 60;
pub const UNITS_PER_MINUTE: u64 = UNITS_PER_SECOND * SECONDS_PER_MINUTE;

///! High resolution wall clock time
#[derive(Debug, PartialOrd, PartialEq, Clone, Copy, Default)]
pub struct ClockTime(UnitType);

impl ClockTime {
  pub fn zero() -> ClockTime {
    ClockTime(0)
  }

  pub fn new(units: UnitType) -> ClockTime {
    ClockTime(units)
  }

  pub fn from_seconds(seconds: f64) -> ClockTime {
    ClockTime((seconds * UNITS_PER_SECOND as f64).round() as UnitType)
  }

  /// Duration of a single tick at the given tempo and division
  pub fn per_tick(tempo: Tempo, division: u16) -> ClockTime {
    TicksTime::new(1).to_clock(tempo, division)
  }

  pub fn units(&self) -> UnitType {
    self.0
  }

  pub fn to_nanos(&self) -> u64 {
    self.0 / UNITS_PER_NANO
  }

  pub fn to_seconds(&self) -> f64 {
    self.0 as f64 / UNITS_PER_SECOND as f64
  }

  pub fn to_duration(&self) -> Duration {
    Duration::from_nanos(self.to_nanos())
  }

  pub fn to_ticks(&self, tempo: Tempo, division: u16) -> TicksTime {
    let ticks_per_minute = TicksTime::per_minute(tempo, division);
    let ticks = self.0 as f64 * ticks_per_minute / UNITS_PER_MINUTE as f64;
    TicksTime::new(ticks.floor() as u64)
  }
}

impl Add for ClockTime {
  type Output = ClockTime;

  fn add(self, rhs: ClockTime) -> ClockTime {
    ClockTime(self.0 + rhs.0)
  }
}

impl AddAssign for ClockTime {
  fn add_assign(&mut self, rhs: ClockTime) {
    *self = *self + rhs;
  }
}

impl Sub for ClockTime {
  type Output = ClockTime;

  fn sub(self, rhs: ClockTime) -> ClockTime {
    ClockTime(self.0.saturating_sub(rhs.0))
  }
}

#[cfg(test)]
mod test {
  use super::{ClockTime, Tempo, TicksTime};

  #[test]
  pub fn clock_time_new() {
    let time = ClockTime::new(15);
    assert_eq!(time.units(), 15);
  }

  #[test]
  pub fn clock_time_add_sub() {
    let mut time = ClockTime::new(15) + ClockTime::new(5);
    assert_eq!(time, ClockTime::new(20));
    time += ClockTime::new(5);
    assert_eq!(time - ClockTime::new(30), ClockTime::zero());
  }

  #[test]
  pub fn per_tick() {
    // 120 bpm with 480 ticks per beat is 960 ticks per second
    let time = ClockTime::per_tick(Tempo::new(120.0), 480);
    assert_eq!(time.units(), 1_041_667);
  }

  #[test]
  pub fn to_ticks() {
    let time = ClockTime::from_seconds(1.0);
    assert_eq!(time.to_ticks(Tempo::new(120.0), 480), TicksTime::new(960));
  }

  #[test]
  pub fn to_duration() {
    let time = ClockTime::from_seconds(0.5);
    assert_eq!(time.to_duration().as_millis(), 500);
  }
}
