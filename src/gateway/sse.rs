//! Server-Sent Events adapter for the live channel.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tracing::warn;

use super::{FeedEvent, Subscription};

/// Encode one feed event as an SSE frame: event name + JSON payload.
pub fn to_sse_event(event: &FeedEvent) -> Result<Event, axum::Error> {
    let frame = Event::default().event(event.name());
    match event {
        FeedEvent::ItemCreated(item) => frame.json_data(item),
        FeedEvent::AggregateUpdated(agg) => frame.json_data(agg),
    }
}

/// Turn a subscription into an SSE response. The subscription (and with it
/// the registry entry) lives exactly as long as the client connection.
pub fn sse_response(sub: Subscription) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber = sub.id();
    let stream = sub.into_stream().filter_map(move |event| async move {
        match to_sse_event(&event) {
            Ok(frame) => Some(Ok(frame)),
            Err(e) => {
                warn!(subscriber, event = event.name(), error = %e, "failed to encode SSE event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use chrono::Utc;

    use crate::gateway::{BroadcastGateway, SubscriberRegistry};
    use crate::model::{FeedbackItem, SentimentAggregate, SentimentLabel};

    #[tokio::test]
    async fn frames_carry_event_name_and_json_data() {
        let reg = SubscriberRegistry::new(2);
        let sub = reg.subscribe();
        let item = FeedbackItem {
            id: 7,
            text: "Great service!".into(),
            category: None,
            sentiment_label: SentimentLabel::Positive,
            sentiment_score: 0.92,
            created_at: Utc::now(),
        };
        reg.broadcast_batch(vec![
            FeedEvent::ItemCreated(item),
            FeedEvent::AggregateUpdated(SentimentAggregate::from_counts([("Positive", 1)])),
        ])
        .await
        .unwrap();
        // Queue is full: this evicts the subscriber, which ends the body.
        reg.broadcast(FeedEvent::AggregateUpdated(SentimentAggregate::default()))
            .await
            .unwrap_err();

        let body = axum::body::to_bytes(sse_response(sub).into_response().into_body(), 64 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let created = text.find("event: feedback.created\ndata: {").expect(&text);
        let updated = text
            .find("event: aggregate.updated\ndata: {\"Positive\":1}")
            .expect(&text);
        assert!(created < updated, "{text}");
        assert!(text.contains("\"sentimentLabel\":\"Positive\""), "{text}");
    }
}
