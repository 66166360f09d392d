use color_eyre::Result;
use padcursor::bindings::BindingStore;
use padcursor::controller::{AxisSampleStore, CollectorHandle, ControllerEventBus};
use padcursor::dispatch::ActionDispatcher;
use padcursor::engine::{EngineContext, EngineEvent, InputEngine};
use padcursor::host::{LogOutputSink, PermissionGate, StaticPermission};
use padcursor::persistence::{FileStore, KeyValueStore, PersistenceWorker, Settings, SettingsHandle};
use padcursor::recorder::ShortcutCapture;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const LOG_ENV: &str = "PADCURSOR_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let root = FileStore::default_location();
    info!("Using configuration directory {}", root.display());
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(root));
    let (persistence, persistence_task) = PersistenceWorker::spawn(store.clone());

    let settings = SettingsHandle::new(
        Settings::load(store.as_ref()).await,
        Some(persistence.clone()),
    );
    let bindings = BindingStore::load(store.as_ref(), Some(persistence.clone()))
        .await
        .into_shared();

    let permission = Arc::new(StaticPermission::granted());
    if !permission.request_authorization() {
        warn!("Input synthesis is not authorized yet; output resumes once granted");
    }

    // No platform listener is linked into this binary
    let capture = ShortcutCapture::new(Vec::new(), bindings.clone());

    let sink = Arc::new(LogOutputSink::default());
    let ctx = EngineContext::new(
        bindings,
        settings.subscribe(),
        ActionDispatcher::new(sink).into_shared(),
        AxisSampleStore::new(),
        permission,
        capture.recording(),
    );

    let bus = ControllerEventBus::new();
    let cancel = CancellationToken::new();
    let engine = InputEngine::create(ctx.clone(), bus.clone()).start();
    let collector = CollectorHandle::spawn(bus, cancel.clone());
    let reporter = tokio::spawn(report_events(ctx, cancel.clone()));

    info!("padcursor running, press Ctrl-C to quit");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    cancel.cancel();
    engine.stop().await;
    if let Err(e) = collector.join().await {
        error!("{}", e);
    }
    if let Err(e) = reporter.await {
        error!("Event reporter failed: {}", e);
    }
    drop(capture);
    drop(settings);

    if let Err(e) = persistence.flush().await {
        error!("Failed to save state: {}", e);
    }
    drop(persistence);
    persistence_task.abort();

    Ok(())
}

async fn report_events(ctx: EngineContext, cancel: CancellationToken) {
    let mut events = ctx.subscribe_events();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(EngineEvent::ControllerConnected(device)) => {
                    info!("Controller ready: {}", device.name);
                }
                Ok(EngineEvent::ControllerDisconnected { id }) => {
                    info!("Controller {} gone", id);
                }
                Ok(EngineEvent::InputDetected(button)) => {
                    info!("New input available for binding: {}", button);
                }
                Ok(event) => debug!("{:?}", event),
                Err(RecvError::Lagged(n)) => warn!("Missed {} engine events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| Level::from_str(&value).ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
