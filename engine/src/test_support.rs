//! Scripted in-memory oracle for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use alon_providers::{Oracle, OracleError, OracleFut, OracleRequest, OracleResponse};
use alon_types::StreamEvent;
use tokio::sync::mpsc;

type Responder = Box<dyn Fn(&OracleRequest) -> Result<OracleResponse, OracleError> + Send + Sync>;

/// Replays queued replies (or computes them) and records every request.
#[derive(Default)]
pub(crate) struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<OracleResponse, OracleError>>>,
    responder: Option<Responder>,
    stream_events: Mutex<Vec<StreamEvent>>,
    stream_result: Mutex<Option<OracleError>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_responder(
        responder: impl Fn(&OracleRequest) -> Result<OracleResponse, OracleError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub(crate) fn reply(self, text: &str, tokens: u64) -> Self {
        self.push(Ok(OracleResponse::from_text(text).with_usage(tokens)))
    }

    pub(crate) fn fail(self, error: OracleError) -> Self {
        self.push(Err(error))
    }

    fn push(self, reply: Result<OracleResponse, OracleError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn stream_events(self, events: Vec<StreamEvent>) -> Self {
        *self.stream_events.lock().unwrap() = events;
        self
    }

    pub(crate) fn stream_fails(self, error: OracleError) -> Self {
        *self.stream_result.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn generate<'a>(&'a self, request: &'a OracleRequest) -> OracleFut<'a, OracleResponse> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(responder) = &self.responder {
                return responder(request);
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OracleError::communication("no scripted reply left")))
        })
    }

    fn stream<'a>(
        &'a self,
        request: &'a OracleRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> OracleFut<'a, ()> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let events = std::mem::take(&mut *self.stream_events.lock().unwrap());
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            match self.stream_result.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}
