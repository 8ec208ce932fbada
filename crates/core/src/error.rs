use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComplianceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid transition for {entity} {id}: cannot {requested} from {current}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        current: String,
        requested: String,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Business {business_id} has no access to agent '{agent}'")]
    AccessDenied { business_id: Uuid, agent: String },

    #[error("A compliance pass is already running for business {business_id}")]
    PassInProgress { business_id: Uuid },

    #[error("Evaluation failed ({context}): {message}")]
    Evaluation { context: String, message: String },

    #[error("Scheduling failed for {target}: {message}")]
    Scheduling { target: String, message: String },

    #[error("Store error: {0}")]
    Store(String),
}

impl ComplianceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn evaluation(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Evaluation {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

pub type ComplianceResult<T> = Result<T, ComplianceError>;
