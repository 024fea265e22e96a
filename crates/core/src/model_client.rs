use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use little_chat_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

pub(crate) type FragmentFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type FragmentFn = Box<dyn Fn(String) -> FragmentFuture + Send + Sync>;
type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, FragmentFn) -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_fragment| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_fragment).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and consumes the streamed reply.
    ///
    /// `on_fragment` is called for every fragment in delivery order, and the
    /// next fragment is not pulled before the returned future resolves.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// fragments when this operation is cancelled.
    #[inline]
    pub async fn send_request<F>(
        &self,
        req: ModelRequest,
        on_fragment: F,
    ) -> SendRequestResult
    where
        F: Fn(String) -> FragmentFuture + Send + Sync + 'static,
    {
        (self.handler_fn)(req, Box::new(on_fragment)).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    pub transcript: String,
    pub fragment_count: usize,
    /// The reason the model finished generating, if it told us.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_fragment: FragmentFn,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let mut fragment_count = 0;
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error after {fragment_count} fragments: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(fragment) => {
                transcript.push_str(&fragment);
                fragment_count += 1;
                on_fragment(fragment).await;
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        fragment_count,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use little_chat_model::{ErrorKind, ModelMessage};
    use little_chat_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_exchange(PresetResponse::with_fragments([
            "How ", "are ", "you?",
        ]));

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let fragments = Arc::new(Mutex::new(vec![]));
            let resp = model_client
                .send_request(request("Hi"), {
                    let fragments = Arc::clone(&fragments);
                    move |fragment| {
                        fragments.lock().unwrap().push(fragment);
                        Box::pin(async {})
                    }
                })
                .await
                .unwrap();
            assert_eq!(resp.transcript, "How are you?");
            assert_eq!(resp.fragment_count, 3);
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
            assert_eq!(*fragments.lock().unwrap(), ["How ", "are ", "you?"]);
        }
    }

    #[tokio::test]
    async fn test_waits_for_each_fragment() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_exchange(PresetResponse::with_fragments(["a", "b"]));
        let model_client = ModelClient::new(model_provider);

        // Each callback only finishes once the previous one has been
        // observed, so interleaving would show up as a wrong order.
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        model_client
            .send_request(request("Hi"), {
                let log = Arc::clone(&log);
                move |fragment| {
                    let log = Arc::clone(&log);
                    log.lock().unwrap().push(format!("start {fragment}"));
                    Box::pin(async move {
                        tokio::task::yield_now().await;
                        log.lock().unwrap().push(format!("end {fragment}"));
                    })
                }
            })
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["start a", "end a", "start b", "end b"]
        );
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(request("Hi"), |_| Box::pin(async {}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let mut model_provider = TestModelProvider::default();
        model_provider.add_exchange(
            PresetResponse::with_fragments(["x", "y"]).with_failure_after(1),
        );
        let model_client = ModelClient::new(model_provider);
        let resp_or_err = model_client
            .send_request(request("Hi"), |_| Box::pin(async {}))
            .await;
        assert!(resp_or_err.is_err());
    }
}
