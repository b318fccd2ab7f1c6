//! Handler trait and its object-safe counterpart.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::task::Task;
use crate::domain::CodecError;

/// Why a handler gave up on a job. Recorded as the reason of the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct JobFailure(String);

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Runs one kind of task.
///
/// ```ignore
/// struct SendEmailHandler;
///
/// #[async_trait]
/// impl Handler<SendEmail> for SendEmailHandler {
///     async fn handle(&self, task: SendEmail) -> Result<(), JobFailure> {
///         mailer.send(&task.to).await.map_err(|e| JobFailure::new(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T) -> Result<(), JobFailure>;
}

/// Object-safe handler over JSON arguments, so handlers for different task
/// types can share one map.
#[async_trait]
pub trait DynHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    /// Check that `arguments` deserialize into this handler's task type.
    fn check(&self, arguments: &Value) -> Result<(), CodecError>;

    async fn handle_dyn(&self, arguments: Value) -> Result<(), JobFailure>;
}

pub(crate) struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn(T)>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }

    fn deserialize(arguments: Value) -> Result<T, CodecError> {
        serde_json::from_value(arguments).map_err(|e| CodecError::MalformedArguments {
            job_type: T::TYPE.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    fn job_type(&self) -> &'static str {
        T::TYPE
    }

    fn check(&self, arguments: &Value) -> Result<(), CodecError> {
        Self::deserialize(arguments.clone()).map(drop)
    }

    async fn handle_dyn(&self, arguments: Value) -> Result<(), JobFailure> {
        let task = Self::deserialize(arguments).map_err(|e| JobFailure::new(e.to_string()))?;
        self.handler.handle(task).await
    }
}
