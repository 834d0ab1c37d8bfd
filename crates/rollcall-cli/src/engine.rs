use rollcall_core::{
    encode_regions, Candidate, EncoderError, FaceEncoder, FaceMatcher, FaceRegion, GreedyAssignment,
    MatchError, Report, Threshold,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("matching error: {0}")]
    Match(#[from] MatchError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("engine thread panicked")]
    Panicked,
}

/// Messages sent from callers to the engine thread.
enum EngineRequest {
    Recognize {
        regions: Vec<FaceRegion>,
        candidates: Vec<Candidate>,
        threshold: Threshold,
        reply: oneshot::Sender<Result<Report, EngineError>>,
    },
    Shutdown,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Encode the regions of one photo and match them against `candidates`.
    pub async fn recognize(
        &self,
        regions: Vec<FaceRegion>,
        candidates: Vec<Candidate>,
        threshold: Threshold,
    ) -> Result<Report, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Recognize {
                regions,
                candidates,
                threshold,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// The encoder service: a dedicated OS thread that owns the face encoder.
///
/// `initialize` hands the encoder to the thread and returns once it is ready
/// to take requests. `shutdown` stops the thread and releases the encoder;
/// outstanding handles then fail with [`EngineError::ChannelClosed`].
pub struct Engine {
    handle: EngineHandle,
    thread: std::thread::JoinHandle<()>,
}

impl Engine {
    pub fn initialize(encoder: Box<dyn FaceEncoder>, queue_depth: usize) -> Result<Self, EngineError> {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth.max(1));
        let mut encoder = encoder;

        tracing::info!(space = %encoder.space(), queue_depth, "starting engine");

        let thread = std::thread::Builder::new()
            .name("rollcall-engine".into())
            .spawn(move || {
                tracing::info!("engine thread started");
                while let Some(req) = rx.blocking_recv() {
                    match req {
                        EngineRequest::Recognize {
                            regions,
                            candidates,
                            threshold,
                            reply,
                        } => {
                            let result = run_recognize(encoder.as_mut(), &regions, &candidates, threshold);
                            let _ = reply.send(result);
                        }
                        EngineRequest::Shutdown => break,
                    }
                }
                tracing::info!("engine thread exiting");
            })?;

        Ok(Self {
            handle: EngineHandle { tx },
            thread,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the engine thread after the requests already queued.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        // A closed channel means the thread is already gone.
        let _ = self.handle.tx.send(EngineRequest::Shutdown).await;
        let thread = self.thread;
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|_| EngineError::Panicked)?
            .map_err(|_| EngineError::Panicked)
    }
}

/// Encode one photo's regions, then run the pure matching core.
fn run_recognize(
    encoder: &mut dyn FaceEncoder,
    regions: &[FaceRegion],
    candidates: &[Candidate],
    threshold: Threshold,
) -> Result<Report, EngineError> {
    let faces = encode_regions(encoder, regions)?;
    tracing::debug!(regions = regions.len(), "recognize: encoded regions");
    let matcher = FaceMatcher::with_strategy(GreedyAssignment, threshold);
    Ok(matcher.recognize(&faces, candidates)?)
}
