//! In-process stage queue over a crossbeam channel.
//!
//! Crossbeam receivers are multi-consumer and `recv_timeout` claims each
//! message exactly once, which gives the bounded blocking pop for free.
//! Entries do not survive the process; deployments that need restart
//! durability use the SQLite driver instead.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;

use crate::error::QueueError;

use super::{Stage, StageQueue};

pub struct MemoryQueue {
    stage: Stage,
    sender: Sender<String>,
    receiver: Receiver<String>,
}

impl MemoryQueue {
    pub fn new(stage: Stage) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            stage,
            sender,
            receiver,
        }
    }
}

impl StageQueue for MemoryQueue {
    fn push(&self, job_id: &str) -> Result<(), QueueError> {
        self.sender
            .send(job_id.to_string())
            .map_err(|_| QueueError::Disconnected)?;
        debug!("enqueued job {} for {}", job_id, self.stage);
        Ok(())
    }

    fn pop_timeout(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(job_id) => Ok(Some(job_id)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Disconnected),
        }
    }

    fn pending(&self) -> Result<usize, QueueError> {
        Ok(self.receiver.len())
    }
}
