//! Simulated voice transport
//!
//! Stands in for a real voice connection: every stream "plays" for a fixed
//! length of wall time, honouring pause/resume, and fires its completion when
//! the time is up or the stream is stopped. One playback task per room.

use async_trait::async_trait;
use roomq_common::RoomId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::error::{Error, Result};
use crate::services::{Completion, StreamHandle, Transport};

#[derive(Debug, Clone, Copy)]
enum Control {
    Stop,
    Pause,
    Resume,
}

struct Channel {
    generation: u64,
    control: mpsc::UnboundedSender<Control>,
}

pub struct SimulatedTransport {
    track_length: Duration,
    channels: Arc<Mutex<HashMap<RoomId, Channel>>>,
    generations: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length,
            channels: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    async fn send(&self, room: &RoomId, control: Control) -> Result<()> {
        let channels = self.channels.lock().await;
        let channel = channels
            .get(room)
            .ok_or_else(|| Error::Transport(format!("Nothing is playing in {}", room)))?;
        channel
            .control
            .send(control)
            .map_err(|_| Error::Transport("Playback already finished".to_string()))
    }
}

// Runs until the track length elapses (excluding pauses) or a stop arrives
async fn play_out(length: Duration, mut rx: mpsc::UnboundedReceiver<Control>) {
    let mut remaining = length;
    let mut paused = false;

    loop {
        if paused {
            match rx.recv().await {
                Some(Control::Resume) => paused = false,
                Some(Control::Pause) => {}
                Some(Control::Stop) | None => return,
            }
            continue;
        }

        let started = Instant::now();
        tokio::select! {
            _ = time::sleep(remaining) => return,
            control = rx.recv() => {
                remaining = remaining.saturating_sub(started.elapsed());
                match control {
                    Some(Control::Pause) => paused = true,
                    Some(Control::Resume) => {}
                    Some(Control::Stop) | None => return,
                }
            }
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn play(&self, room: &RoomId, stream: &StreamHandle, completion: Completion) -> Result<()> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut channels = self.channels.lock().await;
            if let Some(previous) = channels.insert(
                room.clone(),
                Channel {
                    generation,
                    control: tx,
                },
            ) {
                // One stream per room; the old one completes now
                let _ = previous.control.send(Control::Stop);
            }
        }

        debug!(room = %room, generation, stream = stream.as_str(), "Simulated playback started");

        let length = self.track_length;
        let channels = self.channels.clone();
        let room = room.clone();
        tokio::spawn(async move {
            play_out(length, rx).await;

            let mut channels = channels.lock().await;
            if channels.get(&room).map(|c| c.generation) == Some(generation) {
                channels.remove(&room);
            }
            drop(channels);

            debug!(room = %room, generation, "Simulated playback finished");
            completion.finished();
        });

        Ok(())
    }

    async fn stop(&self, room: &RoomId) -> Result<()> {
        self.send(room, Control::Stop).await
    }

    async fn pause(&self, room: &RoomId) -> Result<()> {
        self.send(room, Control::Pause).await
    }

    async fn resume(&self, room: &RoomId) -> Result<()> {
        self.send(room, Control::Resume).await
    }

    async fn is_active(&self, room: &RoomId) -> bool {
        self.channels.lock().await.contains_key(room)
    }

    async fn release(&self, room: &RoomId) -> Result<()> {
        if let Some(channel) = self.channels.lock().await.remove(room) {
            let _ = channel.control.send(Control::Stop);
        }
        Ok(())
    }
}
