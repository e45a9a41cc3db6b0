//! Per-node lifecycle state.

use crate::error::ResourceError;
use crate::model::Resource;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifecycle state of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initialized,
    Started,
    /// A transition failed. Automatic transitions skip faulted nodes.
    Faulted,
}

/// Lifecycle transition requested by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Initialize,
    Start,
    Stop,
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Transition::Initialize => "initialize",
            Transition::Start => "start",
            Transition::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Drives the lifecycle of exactly one resource.
///
/// The state lock is held while the behavior hook runs, so transitions of the
/// same wrapper never interleave.
#[derive(Debug)]
pub struct ResourceWrapper {
    target: Arc<Resource>,
    state: Mutex<LifecycleState>,
}

impl ResourceWrapper {
    pub fn new(target: Arc<Resource>) -> Self {
        Self {
            target,
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub fn target(&self) -> &Arc<Resource> {
        &self.target
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Applies `transition`. Returns whether the behavior hook ran.
    pub async fn apply(&self, transition: Transition) -> Result<bool, ResourceError> {
        match transition {
            Transition::Initialize => self.initialize().await,
            Transition::Start => self.start().await,
            Transition::Stop => self.stop().await,
        }
    }

    /// `Created → Initialized`. Any other state is left untouched.
    pub async fn initialize(&self) -> Result<bool, ResourceError> {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Created {
            return Ok(false);
        }
        self.target
            .behavior()
            .initialize(&self.target)
            .await
            .map_err(|source| self.failed(Transition::Initialize, source))?;
        *state = LifecycleState::Initialized;
        debug!(resource = %self.target, "Initialized");
        Ok(true)
    }

    /// `Initialized → Started`. Starting a node that was never initialized
    /// is an error.
    pub async fn start(&self) -> Result<bool, ResourceError> {
        let mut state = self.state.lock().await;
        match *state {
            LifecycleState::Initialized => {}
            LifecycleState::Created => {
                return Err(ResourceError::InvalidTransition {
                    resource: self.target.to_string(),
                    transition: Transition::Start,
                })
            }
            LifecycleState::Started | LifecycleState::Faulted => return Ok(false),
        }
        self.target
            .behavior()
            .start(&self.target)
            .await
            .map_err(|source| self.failed(Transition::Start, source))?;
        *state = LifecycleState::Started;
        debug!(resource = %self.target, "Started");
        Ok(true)
    }

    /// `Started → Initialized`.
    pub async fn stop(&self) -> Result<bool, ResourceError> {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Started {
            return Ok(false);
        }
        self.target
            .behavior()
            .stop(&self.target)
            .await
            .map_err(|source| self.failed(Transition::Stop, source))?;
        *state = LifecycleState::Initialized;
        debug!(resource = %self.target, "Stopped");
        Ok(true)
    }

    /// Marks the node as faulted.
    pub async fn error_occurred(&self) {
        *self.state.lock().await = LifecycleState::Faulted;
        debug!(resource = %self.target, "Faulted");
    }

    fn failed(&self, transition: Transition, source: crate::error::BoxError) -> ResourceError {
        ResourceError::Lifecycle {
            resource: self.target.to_string(),
            transition,
            source,
        }
    }
}
