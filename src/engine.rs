use crate::{
    error::VectorizeError, model::GenerationClient, prompt::GenerationRequest, sanitizer,
    style::VectorStyle,
};
use serde::Serialize;
use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Represents the current state of the generation engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Ready to accept a new generation request.
    Idle,
    /// A request was accepted but the worker has not picked it up yet.
    Queued,
    /// The worker is running a request.
    Processing,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Queued => "queued",
            EngineState::Processing => "processing",
        }
    }
}

/// A successful generation: the reply text, the markup extracted from it
/// and the style it was generated with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationResult {
    pub style: VectorStyle,
    pub raw_text: String,
    pub markup: String,
}

struct EngineRequest {
    id: u64,
    request: GenerationRequest,
}

/// Outcome of one generation together with its telemetry.
#[derive(Debug)]
pub struct EngineResponse {
    /// Identifier returned by [`GenerationEngine::try_schedule`].
    pub id: u64,
    pub style: VectorStyle,
    pub start_time: Instant,
    pub duration: Duration,
    pub result: Result<GenerationResult, VectorizeError>,
}

/// Result type returned when polling for generation results.
#[derive(Debug)]
pub enum EngineResult {
    Success(EngineResponse),
    /// No response available yet, with the current engine state.
    Empty(EngineState),
    /// The engine itself broke down.
    Error(String),
}

/// Runs generation requests on a dedicated worker thread, one at a time.
///
/// The worker owns the [`GenerationClient`]: it issues the call, runs the
/// response through [`sanitizer::extract_svg`] and sends the outcome back.
/// A failed generation is reported like any other response and leaves the
/// worker running.
pub struct GenerationEngine {
    state: Arc<Mutex<EngineState>>,
    req_tx: Option<mpsc::Sender<EngineRequest>>,
    rep_rx: Mutex<mpsc::Receiver<EngineResponse>>,
    worker_handle: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

impl GenerationEngine {
    /// Creates an engine and moves `client` onto its worker thread.
    pub fn new<C>(mut client: C) -> Self
    where
        C: GenerationClient + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<EngineRequest>();
        let (rep_tx, rep_rx) = mpsc::channel::<EngineResponse>();
        let state = Arc::new(Mutex::new(EngineState::Idle));

        let worker_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                let _reset = IdleOnExit(state.clone());

                while let Ok(req) = req_rx.recv() {
                    log::debug!("Running generation {}", req.id);
                    *lock(&state) = EngineState::Processing;

                    let style = req.request.style;
                    let start_time = Instant::now();

                    let result = client.generate(&req.request).and_then(|raw_text| {
                        let markup = sanitizer::extract_svg(&raw_text)?;
                        Ok(GenerationResult {
                            style,
                            raw_text,
                            markup,
                        })
                    });

                    match &result {
                        Ok(result) => log::debug!(
                            "Generation {} completed with {} bytes of markup",
                            req.id,
                            result.markup.len()
                        ),
                        Err(e) => log::warn!("Generation {} failed: {e}", req.id),
                    }

                    // idle before the response is visible, so a caller that just
                    // consumed it can schedule again right away
                    *lock(&state) = EngineState::Idle;

                    let response = EngineResponse {
                        id: req.id,
                        style,
                        start_time,
                        duration: start_time.elapsed(),
                        result,
                    };
                    if rep_tx.send(response).is_err() {
                        log::debug!("Response receiver dropped, stopping worker");
                        break;
                    }
                }
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            rep_rx: Mutex::new(rep_rx),
            worker_handle: Some(worker_handle),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Returns the current state of the engine.
    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    /// Whether the worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.worker_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Queues a request unless one is already queued or in flight.
    ///
    /// Returns the request id, or `None` when the engine is busy or stopped;
    /// in that case nothing is sent.
    pub fn try_schedule(&self, request: GenerationRequest) -> Option<u64> {
        let mut state = lock(&self.state);
        if *state != EngineState::Idle {
            log::debug!("Engine is still {}, request ignored", state.as_str());
            return None;
        }

        let tx = self.req_tx.as_ref()?;
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        *state = EngineState::Queued;

        if tx.send(EngineRequest { id, request }).is_err() {
            log::error!("Generation worker is gone");
            *state = EngineState::Idle;
            return None;
        }

        log::info!("Scheduled generation {id}");
        Some(id)
    }

    /// Attempts to retrieve a finished generation without blocking.
    pub fn try_poll_response(&self) -> EngineResult {
        match lock(&self.rep_rx).try_recv() {
            Ok(response) => EngineResult::Success(response),
            Err(mpsc::TryRecvError::Empty) => EngineResult::Empty(self.state()),
            Err(mpsc::TryRecvError::Disconnected) => {
                log::error!("Response channel disconnected");
                EngineResult::Error("Response channel disconnected".to_string())
            }
        }
    }

    /// Blocks until a response arrives or `timeout` elapses.
    pub fn wait_response(&self, timeout: Duration) -> EngineResult {
        match lock(&self.rep_rx).recv_timeout(timeout) {
            Ok(response) => EngineResult::Success(response),
            Err(mpsc::RecvTimeoutError::Timeout) => EngineResult::Empty(self.state()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::error!("Response channel disconnected");
                EngineResult::Error("Response channel disconnected".to_string())
            }
        }
    }

    /// Stops the engine and waits for the worker to finish its current request.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                log::error!("Generation worker panicked");
            }
        }
    }
}

impl Drop for GenerationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Puts the engine back to idle when the worker exits, panics included.
struct IdleOnExit(Arc<Mutex<EngineState>>);

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        *lock(&self.0) = EngineState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::ImagePayload;

    const WAIT: Duration = Duration::from_secs(5);

    fn request(style: VectorStyle) -> GenerationRequest {
        let payload = ImagePayload::from_bytes(vec![1, 2, 3], "image/png").unwrap();
        GenerationRequest::new(payload, style)
    }

    fn expect_response(engine: &GenerationEngine) -> EngineResponse {
        match engine.wait_response(WAIT) {
            EngineResult::Success(response) => response,
            EngineResult::Empty(state) => panic!("no response, engine {}", state.as_str()),
            EngineResult::Error(e) => panic!("engine error: {e}"),
        }
    }

    #[test]
    fn sanitizes_client_output() {
        let engine = GenerationEngine::new(|_: &GenerationRequest| -> Result<String, VectorizeError> {
            Ok("Sure! <svg><rect/></svg> Done.".to_string())
        });

        let id = engine.try_schedule(request(VectorStyle::FlatDesign)).unwrap();
        let response = expect_response(&engine);

        assert_eq!(response.id, id);
        assert_eq!(response.style, VectorStyle::FlatDesign);
        let result = response.result.unwrap();
        assert_eq!(result.style, VectorStyle::FlatDesign);
        assert_eq!(result.markup, "<svg><rect/></svg>");
        assert_eq!(result.raw_text, "Sure! <svg><rect/></svg> Done.");
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn failures_do_not_stop_the_worker() {
        let mut calls = 0;
        let engine = GenerationEngine::new(move |_: &GenerationRequest| {
            calls += 1;
            match calls {
                1 => Err(VectorizeError::GenerationFailed("connection reset".to_string())),
                2 => Ok("no markup here".to_string()),
                _ => Ok("<svg/></svg>".to_string()),
            }
        });

        engine.try_schedule(request(VectorStyle::Realistic)).unwrap();
        assert!(matches!(
            expect_response(&engine).result,
            Err(VectorizeError::GenerationFailed(_))
        ));

        engine.try_schedule(request(VectorStyle::Realistic)).unwrap();
        assert!(matches!(
            expect_response(&engine).result,
            Err(VectorizeError::MalformedResponse)
        ));

        engine.try_schedule(request(VectorStyle::Realistic)).unwrap();
        assert!(expect_response(&engine).result.is_ok());
    }

    #[test]
    fn rejects_requests_while_processing() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let engine = GenerationEngine::new(move |_: &GenerationRequest| -> Result<String, VectorizeError> {
            let _ = gate_rx.recv();
            Ok("<svg></svg>".to_string())
        });

        assert!(engine.try_schedule(request(VectorStyle::LowPoly)).is_some());
        assert_ne!(engine.state(), EngineState::Idle);
        assert!(engine.try_schedule(request(VectorStyle::LowPoly)).is_none());

        let started = std::time::Instant::now();
        while engine.state() == EngineState::Queued && started.elapsed() < WAIT {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(engine.state(), EngineState::Processing);
        assert!(engine.try_schedule(request(VectorStyle::LowPoly)).is_none());

        gate_tx.send(()).unwrap();
        expect_response(&engine);
        assert!(matches!(engine.try_poll_response(), EngineResult::Empty(EngineState::Idle)));
        assert!(engine.try_schedule(request(VectorStyle::LowPoly)).is_some());
        gate_tx.send(()).unwrap();
        expect_response(&engine);
    }

    #[test]
    fn panicking_client_leaves_the_engine_idle() {
        let engine = GenerationEngine::new(|_: &GenerationRequest| -> Result<String, VectorizeError> {
            panic!("decoder blew up");
        });

        engine.try_schedule(request(VectorStyle::Realistic)).unwrap();
        assert!(matches!(engine.wait_response(WAIT), EngineResult::Error(_)));

        assert_eq!(engine.state(), EngineState::Idle);
        let started = std::time::Instant::now();
        while engine.is_running() && started.elapsed() < WAIT {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!engine.is_running());
        assert!(engine.try_schedule(request(VectorStyle::Realistic)).is_none());
        assert_eq!(engine.state(), EngineState::Idle);
    }
}
