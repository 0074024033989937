#![allow(dead_code)]

use async_trait::async_trait;
use mass_dispatch::adapters::gateway::{GatewayError, MessageGateway, SendReceipt};
use mass_dispatch::config::DispatchConfig;
use mass_dispatch::domain::dispatch::ProgressEvent;
use mass_dispatch::domain::recipient::{Recipient, normalize};
use mass_dispatch::services::dispatch_service::Dispatcher;
use phonenumber::country;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use tokio::sync::{Semaphore, mpsc};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("mass_dispatch=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub message: String,
}

/// Layer that keeps every event emitted while it is the active subscriber.
#[derive(Debug, Clone, Default)]
pub struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    /// Runs `f` with this capture installed as the thread's subscriber.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == tracing::Level::WARN)
            .map(|e| e.message.clone())
            .collect()
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.events.lock().unwrap().push(CapturedEvent { level: *event.metadata().level(), message });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text { to: String, body: String },
    Image { to: String, image: PathBuf, caption: Option<String> },
}

impl Call {
    pub fn to(&self) -> &str {
        match self {
            Self::Text { to, .. } | Self::Image { to, .. } => to,
        }
    }
}

/// Gateway double that records every call and fails the calls it was told to.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    fail_on: HashSet<usize>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    /// Fails the given calls, numbered from 1 in the order they arrive.
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self { fail_on: calls.into_iter().collect(), ..Self::default() }
    }

    /// Blocks every call until the returned semaphore hands out a permit.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self { gate: Some(Arc::clone(&gate)), ..Self::default() }, gate)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, call: Call) -> Result<SendReceipt, GatewayError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };

        if self.fail_on.contains(&n) {
            Err(GatewayError::Api { status: 400, message: format!("rejected call {n}") })
        } else {
            Ok(SendReceipt::with_id(format!("wamid.{n}")))
        }
    }
}

#[async_trait]
impl MessageGateway for ScriptedGateway {
    async fn send_text(&self, to: &Recipient, body: &str) -> Result<SendReceipt, GatewayError> {
        self.respond(Call::Text { to: to.to_string(), body: body.to_string() }).await
    }

    async fn send_image(
        &self,
        to: &Recipient,
        image: &Path,
        caption: Option<&str>,
    ) -> Result<SendReceipt, GatewayError> {
        self.respond(Call::Image {
            to: to.to_string(),
            image: image.to_path_buf(),
            caption: caption.map(str::to_string),
        })
        .await
    }
}

pub fn test_dispatch_config(send_delay_ms: u64) -> DispatchConfig {
    DispatchConfig { send_delay_ms, max_message_len: 500, default_region: country::Id::BR }
}

pub fn dispatcher_with(gateway: &Arc<ScriptedGateway>, send_delay_ms: u64) -> Dispatcher {
    let gateway: Arc<dyn MessageGateway> = gateway.clone();
    Dispatcher::new(Some(gateway), &test_dispatch_config(send_delay_ms))
}

/// `n` distinct valid São Paulo mobile numbers.
pub fn recipients(n: usize) -> Vec<Recipient> {
    (0..n).map(|i| normalize(&format!("119876{i:05}"), country::Id::BR).expect("valid number")).collect()
}

/// Collects events until every sender is gone.
pub async fn drain(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
