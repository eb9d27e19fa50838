mod app;
mod config;
pub mod domain;
mod error;
mod routes;
pub mod storage;
pub mod subscriptions;
pub mod telemetry;

pub use self::{
    app::{run_until_stopped, shutdown_signal, App, Server, SHUTDOWN_GRACE},
    config::{Config, ConfigError},
    subscriptions::{SubscriptionError, Subscriptions},
};
