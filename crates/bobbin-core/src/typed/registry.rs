//! TypedRegistry - handler lookup by job type, and the matching `JobCodec`.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, JobFailure, TypedHandler};
use super::task::{Task, TypedJob};
use crate::domain::{CodecError, InvocationData};
use crate::ports::JobCodec;

/// Handlers keyed by `Task::TYPE`.
///
/// Serves as the storage codec too: only registered job types can be
/// stored, and a stored job whose type is no longer registered comes back
/// with a load error instead of a payload.
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<&'static str, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for job type '{0}' is already registered")]
    AlreadyRegistered(&'static str),

    #[error("job types expected but not registered: {0:?}")]
    MissingJobTypes(Vec<String>),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(T::TYPE) {
            return Err(RegistryError::AlreadyRegistered(T::TYPE));
        }
        self.handlers.insert(T::TYPE, Arc::new(TypedHandler::new(handler)));
        Ok(())
    }

    /// Builder-style `register`.
    pub fn with<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Fail unless every type in `expected` has a handler.
    pub fn expect(&self, expected: &[&str]) -> Result<(), RegistryError> {
        let missing: Vec<String> = expected
            .iter()
            .filter(|job_type| !self.handlers.contains_key(**job_type))
            .map(|job_type| job_type.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingJobTypes(missing))
        }
    }

    /// Run the handler registered for `job.job_type`.
    pub async fn dispatch(&self, job: TypedJob) -> Result<(), JobFailure> {
        let Some(handler) = self.get(&job.job_type) else {
            return Err(JobFailure::new(format!("no handler for job type `{}`", job.job_type)));
        };
        handler.handle_dyn(job.arguments).await
    }
}

impl JobCodec for TypedRegistry {
    type Job = TypedJob;

    fn encode(&self, job: &TypedJob) -> Result<InvocationData, CodecError> {
        let handler = self
            .get(&job.job_type)
            .ok_or_else(|| CodecError::UnknownJobType(job.job_type.clone()))?;
        handler.check(&job.arguments)?;
        let arguments =
            serde_json::to_string(&job.arguments).map_err(|e| CodecError::MalformedArguments {
                job_type: job.job_type.clone(),
                reason: e.to_string(),
            })?;
        Ok(InvocationData::new(handler.job_type(), arguments))
    }

    fn decode(&self, data: &InvocationData) -> Result<TypedJob, CodecError> {
        let handler = self
            .get(&data.job_type)
            .ok_or_else(|| CodecError::UnknownJobType(data.job_type.clone()))?;
        let arguments: serde_json::Value =
            serde_json::from_str(&data.arguments).map_err(|e| CodecError::MalformedArguments {
                job_type: data.job_type.clone(),
                reason: e.to_string(),
            })?;
        handler.check(&arguments)?;
        Ok(TypedJob {
            job_type: data.job_type.clone(),
            arguments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{GreetHandler, TallyHandler};
    use crate::typed::task::fixtures::{Greet, Tally};

    fn registry() -> TypedRegistry {
        TypedRegistry::new()
            .with::<Greet, _>(GreetHandler::default())
            .unwrap()
            .with::<Tally, _>(TallyHandler)
            .unwrap()
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = registry();

        let result = registry.register::<Greet, _>(GreetHandler::default());

        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t == Greet::TYPE));
    }

    #[test]
    fn registered_types_are_listed() {
        assert_eq!(registry().registered_types(), vec![Greet::TYPE, Tally::TYPE]);
    }

    #[test]
    fn expect_reports_missing_types() {
        let registry = TypedRegistry::new().with::<Greet, _>(GreetHandler::default()).unwrap();

        assert!(registry.expect(&[Greet::TYPE]).is_ok());
        assert!(matches!(
            registry.expect(&[Greet::TYPE, Tally::TYPE]),
            Err(RegistryError::MissingJobTypes(missing)) if missing == vec![Tally::TYPE.to_string()]
        ));
    }

    #[test]
    fn codec_round_trips_registered_jobs() {
        let registry = registry();
        let job = TypedJob::new(&Greet { name: "ada".into() }).unwrap();

        let data = registry.encode(&job).unwrap();

        assert_eq!(data.job_type, Greet::TYPE);
        assert_eq!(registry.decode(&data).unwrap(), job);
    }

    #[test]
    fn codec_rejects_unregistered_types() {
        let registry = TypedRegistry::new();
        let job = TypedJob::new(&Greet { name: "ada".into() }).unwrap();

        assert_eq!(
            registry.encode(&job),
            Err(CodecError::UnknownJobType(Greet::TYPE.to_string()))
        );
        assert_eq!(
            registry.decode(&InvocationData::new(Greet::TYPE, "{}")),
            Err(CodecError::UnknownJobType(Greet::TYPE.to_string()))
        );
    }

    #[test]
    fn decode_reports_garbled_arguments() {
        let registry = registry();

        let result = registry.decode(&InvocationData::new(Greet::TYPE, "{not json"));

        assert!(matches!(result, Err(CodecError::MalformedArguments { .. })));
    }

    #[tokio::test]
    async fn dispatch_without_handler_fails() {
        let registry = TypedRegistry::new();
        let job = TypedJob::new(&Greet { name: "ada".into() }).unwrap();

        assert!(registry.dispatch(job).await.is_err());
    }
}
