use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::scheduling::SlotLocks;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Box<dyn Clock>,
    pub slots: SlotLocks,
}
