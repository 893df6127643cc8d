//! SSE live reading stream.

use crate::AppState;
use axum::{
    extract::Extension,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
};
use futures_util::{future, Stream, StreamExt};
use parksense_rewards::Ledger;
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;

/// Handler for `GET /events/readings`.
///
/// Streams every accepted reading as it is ingested. The SSE event name is
/// the live event name (`sensor_reading`) and the data is the reading as
/// JSON. The stream ends when the server shuts down.
pub async fn get_reading_stream_handler<L: Ledger>(
    Extension(state): Extension<Arc<AppState<L>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.hub.subscribe());

    let mut shutdown = state.shutdown.clone();
    let stopped = async move {
        let _ = shutdown.wait_for(|stopping| *stopping).await;
    };

    let mapped_stream = stream
        .filter_map(|result| {
            future::ready(match result {
                Ok(event) => match serde_json::to_string(&event.reading) {
                    Ok(data) => Some(Ok(Event::default().event(event.event).data(data))),
                    Err(e) => {
                        tracing::error!("failed to serialize live reading: {}", e);
                        None
                    }
                },
                Err(lagged) => {
                    tracing::warn!(
                        error = %lagged,
                        "reading SSE stream lagged; events were dropped for this subscriber"
                    );
                    None
                }
            })
        })
        .take_until(stopped);

    Sse::new(mapped_stream).keep_alive(KeepAlive::default())
}
