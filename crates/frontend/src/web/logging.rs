use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_wasm::{WASMLayer, WASMLayerConfigBuilder};

/// Install panic reporting and the console subscriber. Safe to call more
/// than once; only the first call takes effect.
pub fn init(level: &str) {
    console_error_panic_hook::set_once();

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let console = WASMLayer::new(
        WASMLayerConfigBuilder::new()
            .set_report_logs_in_timings(false)
            .build(),
    );
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init();
}
