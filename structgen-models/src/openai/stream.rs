//! SSE stream parser for chat completions.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use structgen_core::{FinishReason, RequestUsage};

use super::types::ChatCompletionChunk;
use crate::delta::ResponseDelta;
use crate::error::ModelError;

pin_project! {
    /// Turns a byte stream of SSE lines into [`ResponseDelta`]s.
    pub struct OpenAIStreamParser<S> {
        #[pin]
        inner: S,
        buffer: String,
        pending: VecDeque<ResponseDelta>,
        done: bool,
    }
}

impl<S> OpenAIStreamParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    /// Wrap a byte stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S> Stream for OpenAIStreamParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    type Item = Result<ResponseDelta, ModelError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(delta) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(delta)));
            }
            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(newline) = this.buffer.find('\n') {
                let line: String = this.buffer.drain(..=newline).collect();
                match parse_sse_line(&line) {
                    SseLine::Deltas(deltas) => this.pending.extend(deltas),
                    SseLine::Done => *this.done = true,
                    SseLine::Skip => {}
                }
                continue;
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    let rest = std::mem::take(this.buffer);
                    for line in rest.lines() {
                        if let SseLine::Deltas(deltas) = parse_sse_line(line) {
                            this.pending.extend(deltas);
                        }
                    }
                    *this.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

enum SseLine {
    Deltas(Vec<ResponseDelta>),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return SseLine::Skip;
    };
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, data, "failed to parse SSE chunk");
            return SseLine::Skip;
        }
    };

    let mut deltas = Vec::new();
    for choice in chunk.choices {
        let mut delta = ResponseDelta {
            choice: choice.index,
            content: choice.delta.content.filter(|c| !c.is_empty()),
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_provider),
            model_name: chunk.model.clone(),
            ..ResponseDelta::default()
        };
        // only the first tool call of a choice is kept
        if let Some(call) = choice
            .delta
            .tool_calls
            .into_iter()
            .flatten()
            .find(|c| c.index == 0)
        {
            delta.function_id = call.id;
            if let Some(function) = call.function {
                delta.function_name = function.name;
                delta.arguments = function.arguments;
            }
        }
        deltas.push(delta);
    }

    if let Some(usage) = chunk.usage {
        deltas.push(ResponseDelta {
            usage: Some(RequestUsage::with_tokens(
                usage.prompt_tokens,
                usage.completion_tokens,
            )),
            model_name: chunk.model,
            ..ResponseDelta::default()
        });
    }

    SseLine::Deltas(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::ResponseAccumulator;
    use futures::StreamExt;

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    #[tokio::test]
    async fn test_parses_split_tool_call() {
        let stream = byte_stream(vec![
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"output\",\"arguments\":\"{\\\"a\\\"\"}}]}}]}\n",
            "\ndata: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\":1}\"}}]},",
            "\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":3,\"total_tokens\":5}}\n\n",
            "data: [DONE]\n\n",
        ]);

        let mut parser = OpenAIStreamParser::new(stream);
        let mut acc = ResponseAccumulator::new();
        while let Some(delta) = parser.next().await {
            acc.push(&delta.unwrap());
        }

        let response = acc.finish();
        assert_eq!(response.choices.len(), 1);
        let call = response.choices[0].function_call().unwrap();
        assert_eq!(call.name, "output");
        assert_eq!(call.arguments.value(), Some(&serde_json::json!({"a": 1})));
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::ToolCall));
        assert_eq!(response.usage.unwrap().total(), 5);
        assert_eq!(response.model_name.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_text_without_trailing_newline() {
        let stream = byte_stream(vec![
            ": keep-alive\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}",
        ]);

        let deltas: Vec<_> = OpenAIStreamParser::new(stream).collect().await;
        let texts: Vec<_> = deltas
            .into_iter()
            .map(|d| d.unwrap().content.unwrap_or_default())
            .collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
    }
}
