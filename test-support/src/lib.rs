pub mod fake_relay;
pub mod fake_smtp;

use log::LevelFilter;
use simplelog::{Config, SimpleLogger};

pub fn setup_logging() {
    let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
}
