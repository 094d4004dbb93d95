//! Streaming generation.

use futures::{Stream, StreamExt};
use serde_json::Value as JsonValue;
use std::pin::Pin;
use structgen_core::{ModelMessage, ModelSettings};
use structgen_models::{
    Model, ModelError, ModelRequestParameters, ResponseAccumulator, StreamedResponse,
};
use structgen_output::parse_partial_json;
use structgen_retries::with_retry;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GenerationError, GenerationResult};
use crate::generator::{Evaluation, GenObjectResult, Generator, Plan};
use crate::request::GenerationRequest;

/// Event of a streamed generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenStreamEvent {
    /// Best-effort object built from the text received so far. Not validated.
    Partial(JsonValue),
    /// The validated final object.
    Complete(GenObjectResult<JsonValue>),
}

/// Stream of generation events, ending after `Complete` or an error.
pub type GenStream = Pin<Box<dyn Stream<Item = GenerationResult<GenStreamEvent>> + Send>>;

impl Generator {
    /// Generate an object, yielding partial objects as the answer arrives.
    ///
    /// Setup failures are returned directly. The feedback loop does not run
    /// while streaming; an invalid final answer ends the stream with
    /// [`GenerationError::InvalidGeneration`]. The timeout bounds opening
    /// the stream.
    pub async fn stream_gen_object(&self, request: GenerationRequest) -> GenerationResult<GenStream> {
        let plan = self.prepare(&request)?;
        let token = request.cancellation.unwrap_or_default();

        let stream = tokio::select! {
            biased;
            () = token.cancelled() => return Err(GenerationError::Cancelled),
            stream = self.open_stream(&plan) => stream?,
        };

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(drive(plan, stream, token, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn open_stream(&self, plan: &Plan) -> GenerationResult<StreamedResponse> {
        let model: &dyn Model = plan.model.as_ref();
        let messages = plan.messages.as_slice();
        let settings = &plan.settings;
        let params = &plan.params;
        let stream = with_retry(&self.config().retry, move || {
            open_once(model, messages, settings, params)
        })
        .await?;
        Ok(stream)
    }
}

/// Open the stream, bounding only the wait for the first byte.
async fn open_once(
    model: &dyn Model,
    messages: &[ModelMessage],
    settings: &ModelSettings,
    params: &ModelRequestParameters,
) -> Result<StreamedResponse, ModelError> {
    let open = model.request_stream(messages, settings, params);
    match settings.timeout {
        Some(limit) => tokio::time::timeout(limit, open)
            .await
            .map_err(|_| ModelError::Timeout(limit))?,
        None => open.await,
    }
}

type Sender = mpsc::Sender<GenerationResult<GenStreamEvent>>;

async fn drive(plan: Plan, mut stream: StreamedResponse, token: CancellationToken, tx: Sender) {
    let mut acc = ResponseAccumulator::new();
    let mut focus = None;
    let mut last: Option<JsonValue> = None;

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => {
                let _ = tx.send(Err(GenerationError::Cancelled)).await;
                return;
            }
            next = stream.next() => next,
        };
        let Some(delta) = next else { break };
        let delta = match delta {
            Ok(delta) => delta,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        };

        acc.push(&delta);
        let choice = *focus.get_or_insert(delta.choice);
        if delta.choice != choice {
            continue;
        }
        let Some(partial) = acc.current_text(choice).and_then(parse_partial_json) else {
            continue;
        };
        let partial = if plan.has_thinking {
            match partial.get("output") {
                Some(output) => output.clone(),
                None => continue,
            }
        } else {
            partial
        };
        if last.as_ref() != Some(&partial) {
            last = Some(partial.clone());
            if tx.send(Ok(GenStreamEvent::Partial(partial))).await.is_err() {
                debug!("stream receiver dropped");
                return;
            }
        }
    }

    let response = acc.finish();
    let usage = response.usage.clone().unwrap_or_default();
    let model = plan.model.identifier();
    let event = match plan.evaluate(response) {
        Evaluation::Valid { value, response } => Ok(GenStreamEvent::Complete(
            plan.finish(value, response, model, 1, usage),
        )),
        Evaluation::Invalid { errors, .. } => {
            Err(GenerationError::InvalidGeneration { errors, attempts: 1 })
        }
        Evaluation::Empty => Err(GenerationError::EmptyResult { model }),
    };
    let _ = tx.send(event).await;
}
