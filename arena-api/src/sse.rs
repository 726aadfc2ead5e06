//! SSE adapters
//!
//! Thin bridges from the event bus to HTTP: subscribe, JSON-encode each
//! event with `event:`/`data:` lines, heartbeat every 15 seconds, and
//! unsubscribe on disconnect (the subscription drops with the stream).

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use arena_core::{Match, MatchId};
use arena_events::{ArenaEvent, Subscription, Topic};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;

const HEARTBEAT: Duration = Duration::from_secs(15);

fn sse_event(event: &ArenaEvent) -> Event {
    Event::default()
        .event(event.event_type())
        .data(event.data_json().to_string())
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT).text("ping")
}

enum MatchStreamState {
    /// Send the snapshot, then go live.
    Snapshot(Box<Match>, Subscription),
    Live(Subscription),
    Done,
}

/// GET /matches/{id}/stream - fine-grained events of one match.
///
/// The subscription is taken before the snapshot read so no event between
/// the two can be missed; the stream ends after the terminal `final` event.
pub async fn match_stream(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = state.bus.subscribe(&Topic::match_events(match_id));
    let m = state
        .repo
        .get_match(match_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Match", match_id))?;

    let terminal_snapshot = m.status.is_terminal();
    let initial = MatchStreamState::Snapshot(Box::new(m), subscription);

    let stream = stream::unfold(initial, move |stream_state| async move {
        match stream_state {
            MatchStreamState::Snapshot(snapshot, subscription) => {
                let event = sse_event(&ArenaEvent::Snapshot { snapshot });
                let next = if terminal_snapshot {
                    MatchStreamState::Done
                } else {
                    MatchStreamState::Live(subscription)
                };
                Some((Ok(event), next))
            }
            MatchStreamState::Live(mut subscription) => {
                let event = subscription.next().await?;
                let next = if event.is_terminal() {
                    MatchStreamState::Done
                } else {
                    MatchStreamState::Live(subscription)
                };
                Some((Ok(sse_event(&event)), next))
            }
            MatchStreamState::Done => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

/// GET /matches/stream - coarse state transitions of all matches.
pub async fn arena_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.bus.subscribe(&Topic::ArenaMatches);
    let stream = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        Some((Ok(sse_event(&event)), subscription))
    });
    Sse::new(stream).keep_alive(keep_alive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::MatchStatus;
    use arena_events::StatusPayload;

    #[test]
    fn test_sse_event_uses_contract_names() {
        let event = ArenaEvent::Status {
            payload: StatusPayload {
                status: MatchStatus::InProgress,
            },
        };
        // Event fields are private; the name and data are checked at the
        // ArenaEvent level, construction must simply not panic
        let _ = sse_event(&event);
        assert_eq!(event.event_type(), "status");
        assert_eq!(event.data_json()["status"], "in_progress");
    }
}
