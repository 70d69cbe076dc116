//! Round lifecycle: creation, countdown, ending, matchmaking, bootstrap.
//!
//! Every mutation goes through the registry lock; collaborator HTTP calls
//! always happen outside it. The countdown and purge run as detached tasks
//! that re-check round state on every step, so an externally ended or
//! removed round makes them stop on their own.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;

use wordwank_core::protocol::{Envelope, GameOverPayload, MessageKind, TimerPayload};
use wordwank_core::round::{RoundState, winner_summary};
use wordwank_core::time::timestamp_now;

use crate::registry::Tick;
use crate::state::AppState;

/// Encode an envelope and fan it out to a round's members.
pub(crate) async fn broadcast_round_event<T: Serialize>(
    state: &AppState,
    uuid: &str,
    kind: MessageKind,
    payload: &T,
) {
    let json = Envelope::new(kind, payload, timestamp_now()).and_then(|env| env.to_json());
    match json {
        Ok(json) => state.registry.read().await.broadcast_to_round(uuid, &json),
        Err(e) => tracing::error!(round = uuid, error = %e, "Failed to encode broadcast"),
    }
}

/// Create a new active round from the scoring service and start its
/// countdown. Returns the new round's uuid.
pub async fn create_round(state: &AppState) -> Result<String, String> {
    let created = state.services.create_round().await.map_err(|e| {
        tracing::error!(error = %e, "Scoring service refused to create a round");
        e.to_string()
    })?;
    let round = RoundState::new(
        created.uuid.clone(),
        created.rack,
        created.letter_value,
        state.config.rounds.duration_secs,
    );
    let snapshot = round.clone();
    state.registry.write().await.insert_round(round);
    tracing::info!(round = %created.uuid, "Created round");

    broadcast_round_event(state, &created.uuid, MessageKind::GameStart, &snapshot).await;
    spawn_countdown(state.clone(), created.uuid.clone());
    Ok(created.uuid)
}

/// One-second ticker for a round. Stops by itself once the round is gone or
/// inactive; at zero it triggers the end sequence.
fn spawn_countdown(state: AppState, uuid: String) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so each loop
        // iteration waits a full second.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let tick = state.registry.write().await.decrement_timer(&uuid);
            match tick {
                Tick::Stopped => break,
                Tick::Running(time_left) => {
                    broadcast_round_event(
                        &state,
                        &uuid,
                        MessageKind::Timer,
                        &TimerPayload { time_left },
                    )
                    .await;
                    if time_left <= 0 {
                        end_round(&state, &uuid).await;
                        break;
                    }
                },
            }
        }
    });
}

/// End a round: fetch results, report scores, broadcast `game_over`, line up
/// a successor, and schedule the purge. Safe to call more than once; only
/// the call that flips the round inactive does any work.
pub async fn end_round(state: &AppState, uuid: &str) {
    if !state.registry.write().await.mark_ended(uuid) {
        return;
    }
    tracing::info!(round = uuid, "Round ended");

    // A results failure still ends the round; clients get an empty board
    // rather than a round stuck on zero.
    let mut results = match state.services.final_results(uuid).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(round = uuid, error = %e, "Failed to fetch final results");
            Vec::new()
        },
    };

    for result in &results {
        if result.score > 0 {
            let services = Arc::clone(&state.services);
            let player = result.player.clone();
            let score = result.score;
            tokio::spawn(async move {
                services.report_score(&player, score).await;
            });
        }
    }

    if let Some(winner) = results.first_mut()
        && winner.definition.is_none()
    {
        winner.definition = state.services.define_word(&winner.word).await;
    }

    let summary = winner_summary(&results).unwrap_or_default();
    state.registry.write().await.attach_results(uuid, results.clone());

    broadcast_round_event(
        state,
        uuid,
        MessageKind::GameOver,
        &GameOverPayload { results, summary },
    )
    .await;

    // Keep one round open at all times. If creation fails here the
    // bootstrap-style recovery happens on the next join via `assign`.
    if state.registry.read().await.active_round_count() == 0
        && let Err(e) = create_round(state).await
    {
        tracing::error!(error = %e, "Failed to create successor round");
    }

    spawn_purge(state.clone(), uuid.to_string());
}

fn spawn_purge(state: AppState, uuid: String) {
    let delay = state.config.rounds.purge_delay_secs;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(delay)).await;
        state.registry.write().await.remove_round(&uuid);
        tracing::debug!(round = %uuid, "Purged ended round");
    });
}

/// Matchmaking: put a client into the oldest open round, creating one when
/// none has capacity. Returns the round the client ended up in.
pub async fn assign(state: &AppState, client_id: &str) -> Result<String, String> {
    {
        let mut registry = state.registry.write().await;
        if let Some(uuid) = registry.find_open_round() {
            registry.join_round(client_id, &uuid)?;
            return Ok(uuid);
        }
    }
    let uuid = create_round(state).await?;
    // The fresh round could fill between creation and this join; join_round
    // re-checks capacity under the lock and a retry would find another.
    state.registry.write().await.join_round(client_id, &uuid)?;
    Ok(uuid)
}

/// Create the first round shortly after startup so early connections have
/// something to join. The delay gives the scoring service time to come up.
pub fn spawn_bootstrap_round(state: AppState) {
    let delay = state.config.rounds.bootstrap_delay_secs;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(delay)).await;
        if state.registry.read().await.round_count() == 0
            && let Err(e) = create_round(&state).await
        {
            tracing::error!(error = %e, "Failed to bootstrap first round");
        }
    });
}
