//! Transport and probe doubles

use async_trait::async_trait;
use progress_sync::client::transport::{
    MutationTransport, OperationRequest, ReachabilityProbe, RequestContext, TransportError,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

pub type SendResult = Result<Value, TransportError>;

/// One call seen by the transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: String,
    pub context: RequestContext,
    pub at: Instant,
}

/// Transport answering from a script, then from a fallback
pub struct ScriptedTransport {
    script: Mutex<VecDeque<SendResult>>,
    fallback: Mutex<SendResult>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(json!({"ok": true}))),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    /// Queue the result of the next unscripted call
    pub fn push(&self, result: SendResult) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Result of every call once the script is exhausted
    pub fn set_fallback(&self, result: SendResult) {
        *self.fallback.lock().unwrap() = result;
    }

    /// Hold the next call until the returned notify fires
    pub fn hold_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.name).collect()
    }
}

#[async_trait]
impl MutationTransport for ScriptedTransport {
    async fn send(&self, operation: &OperationRequest, context: &RequestContext) -> SendResult {
        self.calls.lock().unwrap().push(RecordedCall {
            name: operation.name.clone(),
            context: context.clone(),
            at: Instant::now(),
        });

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

/// Probe whose answer the test controls
pub struct SwitchProbe {
    reachable: AtomicBool,
    probes: AtomicUsize,
}

impl SwitchProbe {
    pub fn new(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(reachable),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for SwitchProbe {
    async fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}
