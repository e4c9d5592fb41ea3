pub mod clock;
pub mod path;
pub mod random;

pub use clock::{Clock, FakeClock, SystemClock};
pub use random::{Random, SeededRandom};
