pub mod naming;
pub mod protocol;
pub mod round;
pub mod time;
