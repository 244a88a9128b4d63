pub mod config;
pub mod logging;

pub mod active;
pub mod bridge;
pub mod classify;
pub mod completion;
pub mod dispatcher;
pub mod error;
pub mod fetch_head;
pub mod mime;
pub mod platform;
pub mod pool;
pub mod prefs;
pub mod session;
pub mod storage;
pub mod url_model;
