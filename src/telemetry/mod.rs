mod requests;

use std::env;

use tracing::Level;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{
    filter::Targets, fmt::MakeWriter, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

pub(crate) use self::requests::{id_layer, trace_layer};

/// Install the global subscriber, writing bunyan-formatted JSON lines to `sink`.
///
/// `RUST_LOG` (in `Targets` syntax) replaces the default filter, which logs this crate and
/// `name` at `DEBUG` and everything else at `WARN`. Panics if called twice or if `RUST_LOG`
/// does not parse.
pub fn init<Sink>(name: impl ToString, sink: Sink)
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let name = name.to_string();

    let filter = match env::var("RUST_LOG") {
        Ok(filter) => filter.parse().expect("invalid configuration for RUST_LOG"),
        Err(_) => Targets::new()
            .with_default(Level::WARN)
            .with_target(env!("CARGO_PKG_NAME"), Level::DEBUG)
            .with_target(&name, Level::DEBUG),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(JsonStorageLayer)
        .with(BunyanFormattingLayer::new(name, sink))
        .init();
}
