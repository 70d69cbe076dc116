use std::collections::{HashMap, HashSet};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use wordwank_core::round::{PlayResult, RoundState};

/// Per-client sender for outbound WebSocket text frames. Bounded so a slow
/// client cannot hold broadcast memory hostage; `Utf8Bytes` clones are
/// zero-copy when fanning one frame out to a whole round.
pub type ClientSender = mpsc::Sender<Utf8Bytes>;

struct ConnectedClient {
    sender: ClientSender,
    /// Connection epoch. A reconnect under the same id evicts the old entry;
    /// the evicted socket's cleanup must not tear down the new registration.
    conn_id: u64,
}

struct RoundEntry {
    round: RoundState,
    members: HashSet<String>,
    /// Monotonic creation order, used as the matchmaking tie-break.
    created_seq: u64,
}

/// Outcome of one countdown tick.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    /// Round is gone or no longer active; the countdown task should stop.
    Stopped,
    /// Timer decremented; carries the new remaining seconds.
    Running(i64),
}

/// All connection and round bookkeeping, mutated only behind the registry
/// lock. Sends go through per-client channels so no network I/O ever happens
/// while the lock is held.
pub struct Registry {
    max_players: usize,
    clients: HashMap<String, ConnectedClient>,
    /// client id -> display name. Kept after disconnect so a rejoining
    /// client gets the same name back.
    names: HashMap<String, String>,
    client_round: HashMap<String, String>,
    rounds: HashMap<String, RoundEntry>,
    next_seq: u64,
    next_conn_id: u64,
}

impl Registry {
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players,
            clients: HashMap::new(),
            names: HashMap::new(),
            client_round: HashMap::new(),
            rounds: HashMap::new(),
            next_seq: 0,
            next_conn_id: 0,
        }
    }

    /// Register a live connection. A duplicate id evicts the previous entry:
    /// dropping its sender closes the old writer task, which closes the old
    /// socket. Returns the connection epoch for this registration.
    pub fn register_client(&mut self, client_id: &str, sender: ClientSender) -> u64 {
        self.next_conn_id += 1;
        let conn_id = self.next_conn_id;
        if let Some(old) = self
            .clients
            .insert(client_id.to_string(), ConnectedClient { sender, conn_id })
        {
            tracing::info!(client_id, old_conn = old.conn_id, "Evicted duplicate connection");
        }
        conn_id
    }

    pub fn set_display_name(&mut self, client_id: &str, name: &str) {
        self.names.insert(client_id.to_string(), name.to_string());
    }

    pub fn display_name(&self, client_id: &str) -> Option<String> {
        self.names.get(client_id).cloned()
    }

    /// Remove a client and its round membership. No-op when the id is not
    /// registered or when a newer connection has taken over the id.
    pub fn unregister_client(&mut self, client_id: &str, conn_id: u64) {
        let Some(current) = self.clients.get(client_id) else {
            return;
        };
        if current.conn_id != conn_id {
            tracing::debug!(client_id, "Skipping unregister for evicted connection");
            return;
        }
        self.clients.remove(client_id);
        if let Some(uuid) = self.client_round.remove(client_id)
            && let Some(entry) = self.rounds.get_mut(&uuid)
        {
            entry.members.remove(client_id);
        }
    }

    pub fn current_round(&self, client_id: &str) -> Option<String> {
        self.client_round.get(client_id).cloned()
    }

    /// Oldest active round with spare capacity. Creation order makes the
    /// pick deterministic regardless of map iteration order.
    pub fn find_open_round(&self) -> Option<String> {
        self.rounds
            .values()
            .filter(|e| e.round.is_active && e.members.len() < self.max_players)
            .min_by_key(|e| e.created_seq)
            .map(|e| e.round.uuid.clone())
    }

    /// Move a client into a round, dropping any previous membership first.
    /// Capacity is re-checked here, under the same lock as the scan, so a
    /// full round can never be oversubscribed.
    pub fn join_round(&mut self, client_id: &str, uuid: &str) -> Result<(), String> {
        {
            let entry = self.rounds.get(uuid).ok_or("Round not found")?;
            if !entry.round.is_active {
                return Err("Round already ended".to_string());
            }
            if !entry.members.contains(client_id) && entry.members.len() >= self.max_players {
                return Err("Round is full".to_string());
            }
        }
        if let Some(old) = self.client_round.remove(client_id)
            && let Some(old_entry) = self.rounds.get_mut(&old)
        {
            old_entry.members.remove(client_id);
        }
        self.client_round
            .insert(client_id.to_string(), uuid.to_string());
        if let Some(entry) = self.rounds.get_mut(uuid) {
            entry.members.insert(client_id.to_string());
        }
        Ok(())
    }

    pub fn insert_round(&mut self, round: RoundState) {
        self.next_seq += 1;
        let uuid = round.uuid.clone();
        self.rounds.insert(
            uuid,
            RoundEntry {
                round,
                members: HashSet::new(),
                created_seq: self.next_seq,
            },
        );
    }

    /// Drop a round and every membership entry pointing at it.
    pub fn remove_round(&mut self, uuid: &str) {
        if let Some(entry) = self.rounds.remove(uuid) {
            for member in &entry.members {
                self.client_round.remove(member);
            }
        }
    }

    pub fn round_snapshot(&self, uuid: &str) -> Option<RoundState> {
        self.rounds.get(uuid).map(|e| e.round.clone())
    }

    pub fn round_is_active(&self, uuid: &str) -> bool {
        self.rounds.get(uuid).is_some_and(|e| e.round.is_active)
    }

    /// One countdown tick: decrement if the round still exists and is
    /// active, otherwise tell the caller to stop.
    pub fn decrement_timer(&mut self, uuid: &str) -> Tick {
        match self.rounds.get_mut(uuid) {
            Some(entry) if entry.round.is_active => {
                entry.round.time_left = (entry.round.time_left - 1).max(0);
                Tick::Running(entry.round.time_left)
            },
            _ => Tick::Stopped,
        }
    }

    /// Flip a round inactive. Returns false when the round is missing or was
    /// already ended, making round-end idempotent under races.
    pub fn mark_ended(&mut self, uuid: &str) -> bool {
        match self.rounds.get_mut(uuid) {
            Some(entry) if entry.round.is_active => {
                entry.round.is_active = false;
                true
            },
            _ => false,
        }
    }

    pub fn attach_results(&mut self, uuid: &str, results: Vec<PlayResult>) {
        if let Some(entry) = self.rounds.get_mut(uuid) {
            entry.round.results = Some(results);
        }
    }

    pub fn active_round_count(&self) -> usize {
        self.rounds.values().filter(|e| e.round.is_active).count()
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// (active rounds, connected clients) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        (self.active_round_count(), self.clients.len())
    }

    /// Fan a frame out to every member of a round. Slow clients whose buffer
    /// is full are skipped, never awaited.
    pub fn broadcast_to_round(&self, uuid: &str, text: &str) {
        let Some(entry) = self.rounds.get(uuid) else {
            return;
        };
        let frame = Utf8Bytes::from(text.to_string());
        for member in &entry.members {
            if let Some(client) = self.clients.get(member)
                && let Err(e) = client.sender.try_send(frame.clone())
            {
                tracing::debug!(
                    client_id = member.as_str(), round = uuid, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    /// Send a frame to one client only.
    pub fn send_to_client(&self, client_id: &str, text: &str) {
        if let Some(client) = self.clients.get(client_id)
            && let Err(e) = client.sender.try_send(Utf8Bytes::from(text.to_string()))
        {
            tracing::debug!(client_id, error = %e, "Failed to send to client");
        }
    }

    #[cfg(test)]
    fn members_of(&self, uuid: &str) -> usize {
        self.rounds.get(uuid).map_or(0, |e| e.members.len())
    }
}
