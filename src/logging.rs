//! Diagnostic output.
//!
//! Every diagnostic the embedder emits (malformed props blocks, forced remounts,
//! duplicate registrations, panicking bus callbacks) goes through `tracing`. Host
//! applications that already install a subscriber see them there; everyone else can
//! call [`install`] once at startup.

use core::fmt::Write as _;
use std::io;
use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, MakeWriter, format};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_PREFIX: &str = "[waterui-embed] ";
const DEFAULT_DIRECTIVE: &str = "info";

static TRACING_INSTALLED: Once = Once::new();
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a stderr subscriber filtered by `RUST_LOG` (idempotent).
///
/// Falls back to `info` when `RUST_LOG` is unset or invalid. Does nothing if another
/// global subscriber was installed first.
pub fn install() {
    TRACING_INSTALLED.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

        if tracing_subscriber::registry()
            .with(console(io::stderr).with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("A global subscriber is already installed, keeping it");
        }
    });
}

/// Route panics through `tracing` before the previous hook runs (idempotent).
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            previous(info);
        }));
    });
}

fn log_panic(info: &PanicHookInfo) {
    let message = panic_message(info.payload());
    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
    tracing::error!(
        target: "waterui_embed::panic",
        location = location.as_deref().unwrap_or("unknown"),
        "{message}"
    );
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_string())
}

/// Plain-text event layer writing to `make_writer`, one prefixed line per event.
fn console<S, W>(make_writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(make_writer)
        .with_ansi(false)
        .event_format(Prefixed(fmt::format().with_target(true)))
}

/// Writes [`LOG_PREFIX`] ahead of whatever the wrapped format produces.
struct Prefixed<F>(F);

impl<S, N, F> FormatEvent<S, N> for Prefixed<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> core::fmt::Result {
        writer.write_str(LOG_PREFIX)?;
        self.0.format_event(ctx, writer, event)
    }
}
