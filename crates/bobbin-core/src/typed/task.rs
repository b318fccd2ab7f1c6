//! Task trait and the type-erased job it is stored as.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::CodecError;

/// A job payload type bound to a stable job type name.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendEmail {
///     to: String,
/// }
///
/// impl Task for SendEmail {
///     const TYPE: &'static str = "mail.send.v1";
/// }
/// ```
///
/// `TYPE` is what gets persisted, so renaming the Rust type is safe but
/// changing `TYPE` orphans stored jobs. Convention:
/// `{namespace}.{action}.v{major}`.
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}

/// A task with its concrete type erased: job type name plus JSON arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedJob {
    pub job_type: String,
    pub arguments: Value,
}

impl TypedJob {
    pub fn new<T: Task>(task: &T) -> Result<Self, CodecError> {
        let arguments = serde_json::to_value(task).map_err(|e| CodecError::MalformedArguments {
            job_type: T::TYPE.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            job_type: T::TYPE.to_string(),
            arguments,
        })
    }

    /// Rebuild the concrete task; fails on a different job type or bad arguments.
    pub fn decode<T: Task>(&self) -> Result<T, CodecError> {
        if self.job_type != T::TYPE {
            return Err(CodecError::UnknownJobType(self.job_type.clone()));
        }
        serde_json::from_value(self.arguments.clone()).map_err(|e| CodecError::MalformedArguments {
            job_type: self.job_type.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;

    use super::Task;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Greet {
        pub name: String,
    }

    impl Task for Greet {
        const TYPE: &'static str = "test.greet.v1";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Tally {
        pub counts: HashMap<String, u32>,
    }

    impl Task for Tally {
        const TYPE: &'static str = "test.tally.v1";
    }
}
