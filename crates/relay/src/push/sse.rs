use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;

use super::{EVENT_NAME, PushState, shutdown_requested};

/// Same feed as the websocket for clients that only need one direction.
/// Each batch is one `message` event whose data is the JSON array.
pub async fn events(
    State(state): State<PushState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before the response is returned so that a client which has
    // seen the headers cannot miss the next publish.
    let mut subscription = state.hub.subscribe();
    let shutdown = shutdown_requested(state.shutdown.clone());

    let stream = async_stream::stream! {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                message = subscription.recv() => {
                    let Some(message) = message else { break };
                    yield Ok(Event::default().event(EVENT_NAME).data(&*message));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive))
}
