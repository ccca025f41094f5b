use std::sync::Arc;

pub mod app;
pub mod artwork;
pub mod config;
pub mod drag;
pub mod expansion;
pub mod logging;
pub mod media;
pub mod observable;
pub mod request;
pub mod router;

pub type Waker = Arc<dyn Fn() + Send + Sync>;
