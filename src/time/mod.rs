pub mod clock;
pub mod system_clock;
