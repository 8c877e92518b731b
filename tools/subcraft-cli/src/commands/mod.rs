pub mod config;
pub mod frame;
pub mod play;
pub mod scrub;
pub mod thumbnail;
