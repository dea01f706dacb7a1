//! In-memory relay used by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::events::SignalerEvent;
use crate::transport::{BoxFuture, Transport, TransportError, TransportResult};

/// Timing of one GET.
#[derive(Debug, Clone)]
pub struct GetCall {
    pub started: Instant,
    pub finished: Option<Instant>,
}

#[derive(Default)]
struct Script {
    gets: VecDeque<TransportResult<Option<Vec<u8>>>>,
    posts: VecDeque<TransportResult<()>>,
    get_calls: Vec<GetCall>,
    posted: Vec<(String, Vec<u8>)>,
}

/// Transport answering from queued responses.
///
/// An exhausted GET queue answers "mailbox empty", an exhausted POST queue
/// answers success.
#[derive(Default)]
pub struct ScriptedTransport {
    latency: Duration,
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(self: Arc<Self>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            script: Mutex::new(std::mem::take(&mut *self.script.lock().unwrap())),
        })
    }

    pub fn refused() -> TransportError {
        TransportError::Request {
            url: "http://127.0.0.1:3000/data/client".to_string(),
            message: "connection refused".to_string(),
            timeout: false,
        }
    }

    pub fn push_get(&self, response: TransportResult<Option<Vec<u8>>>) {
        self.script.lock().unwrap().gets.push_back(response);
    }

    pub fn push_post(&self, response: TransportResult<()>) {
        self.script.lock().unwrap().posts.push_back(response);
    }

    pub fn get_calls(&self) -> Vec<GetCall> {
        self.script.lock().unwrap().get_calls.clone()
    }

    pub fn get_count(&self) -> usize {
        self.script.lock().unwrap().get_calls.len()
    }

    pub fn posted(&self) -> Vec<(String, Vec<u8>)> {
        self.script.lock().unwrap().posted.clone()
    }
}

impl Transport for ScriptedTransport {
    fn post<'a>(&'a self, mailbox: &'a str, body: Vec<u8>) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let mut script = self.script.lock().unwrap();
            script.posted.push((mailbox.to_string(), body));
            script.posts.pop_front().unwrap_or(Ok(()))
        })
    }

    fn get<'a>(&'a self, _mailbox: &'a str) -> BoxFuture<'a, TransportResult<Option<Vec<u8>>>> {
        Box::pin(async move {
            let index = {
                let mut script = self.script.lock().unwrap();
                script.get_calls.push(GetCall {
                    started: Instant::now(),
                    finished: None,
                });
                script.get_calls.len() - 1
            };

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let mut script = self.script.lock().unwrap();
            script.get_calls[index].finished = Some(Instant::now());
            script.gets.pop_front().unwrap_or(Ok(None))
        })
    }
}

/// Receives events up to and including `PollingDone`.
pub async fn collect_until_done(rx: &mut broadcast::Receiver<SignalerEvent>) -> Vec<SignalerEvent> {
    let mut events = Vec::new();
    loop {
        let event = rx.recv().await.expect("event channel closed");
        let done = matches!(event, SignalerEvent::PollingDone);
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Receives events already queued without waiting.
pub fn drain(rx: &mut broadcast::Receiver<SignalerEvent>) -> Vec<SignalerEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn event_names(events: &[SignalerEvent]) -> Vec<&'static str> {
    events.iter().map(SignalerEvent::name).collect()
}
