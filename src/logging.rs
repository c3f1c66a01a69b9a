//! Browser console logging through `console_log`.

use log::LevelFilter;

/// Installs the console logger and applies `level`. Only the first install
/// per page takes effect; later calls just change the level.
pub fn init(level: LevelFilter) {
    if console_log::init().is_err() {
        log::debug!("Console logger already installed");
    }
    // console_log::init pins the max level to Info; config wins
    log::set_max_level(level);
}
