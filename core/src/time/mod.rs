pub mod bars;
pub mod clock;
pub mod signature;
pub mod tempo;
pub mod ticks;

pub use self::bars::BarBeatTime;
pub use self::clock::ClockTime;
pub use self::signature::Signature;
pub use self::tempo::Tempo;
pub use self::ticks::TicksTime;
