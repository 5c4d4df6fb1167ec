pub mod stale_sweeper;
pub mod transcoder;
