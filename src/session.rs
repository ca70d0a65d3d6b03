use crate::{
    artifact::SvgArtifact,
    encoder::EncodedImage,
    engine::{EngineResponse, EngineResult, EngineState, GenerationEngine, GenerationResult},
    model::GenerationClient,
    prompt::GenerationRequest,
    style::VectorStyle,
};
use serde::Serialize;
use std::time::{Duration, Instant};

pub const STEP_ANALYZING: &str = "Analyzing image structure...";
pub const WORKER_STOPPED: &str = "Generation worker stopped";

fn generating_step(style: VectorStyle) -> String {
    format!("Generating {style} vectors...")
}

/// UI facing progress of the current generation cycle.
///
/// `step` is never empty while `is_active` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessingStatus {
    pub is_active: bool,
    pub step: String,
    pub last_error: Option<String>,
}

impl ProcessingStatus {
    fn active(step: impl Into<String>) -> Self {
        Self {
            is_active: true,
            step: step.into(),
            last_error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            last_error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// State of one user session: the held image, the chosen style, the last
/// result and the processing status.
///
/// At most one generation is in flight; selecting a new image discards the
/// previous result and any response still on its way.
pub struct Session {
    engine: GenerationEngine,
    image: Option<EncodedImage>,
    style: VectorStyle,
    result: Option<GenerationResult>,
    status: ProcessingStatus,
    pending: Option<u64>,
    pending_style: VectorStyle,
}

impl Session {
    pub fn new(engine: GenerationEngine) -> Self {
        Self {
            engine,
            image: None,
            style: VectorStyle::default(),
            result: None,
            status: ProcessingStatus::default(),
            pending: None,
            pending_style: VectorStyle::default(),
        }
    }

    pub fn with_client<C>(client: C) -> Self
    where
        C: GenerationClient + Send + 'static,
    {
        Self::new(GenerationEngine::new(client))
    }

    /// Holds a new image, releasing the previous preview reference.
    pub fn select_image(&mut self, image: EncodedImage) {
        if let Some(id) = self.pending.take() {
            log::info!("New image selected, generation {id} will be discarded");
        }
        log::debug!("Selected image {}", image.preview.url());

        self.image = Some(image);
        self.result = None;
        self.status = ProcessingStatus::default();
    }

    /// Drops the held image together with its result.
    pub fn clear_image(&mut self) {
        self.pending = None;
        self.image = None;
        self.result = None;
        self.status = ProcessingStatus::default();
    }

    pub fn select_style(&mut self, style: VectorStyle) {
        self.style = style;
    }

    /// Starts a generation for the held image and style.
    ///
    /// The status reads [`STEP_ANALYZING`] until the worker picks the request
    /// up. Returns `false` without sending anything when no image is held or a
    /// generation is already running.
    pub fn generate(&mut self) -> bool {
        self.poll();

        if self.status.is_active {
            log::debug!("Generation already in flight");
            return false;
        }
        let Some(image) = &self.image else {
            log::debug!("No image selected");
            return false;
        };

        self.status = ProcessingStatus::active(STEP_ANALYZING);
        let request = GenerationRequest::new(image.payload.clone(), self.style);

        match self.engine.try_schedule(request) {
            Some(id) => {
                self.pending = Some(id);
                self.pending_style = self.style;
                self.result = None;
                log::info!("Generating {} vectors (request {id})", self.style);
                true
            }
            None if !self.engine.is_running() => {
                log::error!("Generation worker is not running");
                self.status = ProcessingStatus::failed(WORKER_STOPPED);
                false
            }
            None => {
                // the engine is still busy with work for a superseded image
                log::warn!("Engine busy, generation not started");
                self.status = ProcessingStatus::default();
                false
            }
        }
    }

    /// Applies any finished generation to the session state.
    ///
    /// Returns `true` when the pending generation completed.
    pub fn poll(&mut self) -> bool {
        loop {
            match self.engine.try_poll_response() {
                EngineResult::Success(response) => {
                    if self.apply(response) {
                        return true;
                    }
                }
                EngineResult::Empty(state) => {
                    if state == EngineState::Processing {
                        self.advance_step();
                    }
                    return false;
                }
                EngineResult::Error(message) => return self.fail_pending(message),
            }
        }
    }

    fn advance_step(&mut self) {
        if self.pending.is_some() && self.status.is_active && self.status.step == STEP_ANALYZING {
            self.status.step = generating_step(self.pending_style);
        }
    }

    /// Blocks until the pending generation completes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.engine.wait_response(remaining) {
                EngineResult::Success(response) => {
                    if self.apply(response) {
                        return true;
                    }
                }
                EngineResult::Empty(_) => return false,
                EngineResult::Error(message) => return self.fail_pending(message),
            }
        }
        false
    }

    fn apply(&mut self, response: EngineResponse) -> bool {
        if self.pending != Some(response.id) {
            log::warn!("Discarding result of superseded generation {}", response.id);
            return false;
        }
        self.pending = None;

        log::info!(
            "Generation {} ({}) finished in {:?}",
            response.id,
            response.style,
            response.duration
        );

        match response.result {
            Ok(result) => {
                self.result = Some(result);
                self.status = ProcessingStatus::default();
            }
            Err(e) => {
                self.result = None;
                self.status = ProcessingStatus::failed(e.to_string());
            }
        }
        true
    }

    fn fail_pending(&mut self, message: String) -> bool {
        if self.pending.take().is_none() {
            return false;
        }
        self.status = ProcessingStatus::failed(message);
        true
    }

    pub fn status(&self) -> &ProcessingStatus {
        &self.status
    }

    pub fn style(&self) -> VectorStyle {
        self.style
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    /// The extracted markup of the last successful generation.
    pub fn markup(&self) -> Option<&str> {
        self.result.as_ref().map(|result| result.markup.as_str())
    }

    /// Packages the current markup as a downloadable file.
    pub fn export_artifact(&self) -> Option<SvgArtifact> {
        self.markup().map(SvgArtifact::new)
    }
}
