use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Closed exit-code taxonomy shared by the validator, its hooks, and the CLI.
///
/// The numeric values are the external contract: scripts, CI jobs, and
/// supervisory agents dispatch on them and must never see a renumbered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidArguments = 2,
    TaskNotFound = 3,
    DependencyCycle = 4,
    ValidationSchema = 5,
    ValidationSemantic = 6,
    ValidationReferential = 7,
    ValidationStateMachine = 8,
    LockTimeout = 9,
    PermissionDenied = 10,
    ResourceNotFound = 11,
    Conflict = 12,
    Timeout = 13,
    RateLimited = 14,
    ExternalService = 15,
    Hallucination = 16,
    ManualIntervention = 17,
}

impl ExitCode {
    /// The numeric process exit code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of `code`. Returns `None` for values outside the taxonomy.
    pub fn from_code(code: u8) -> Option<ExitCode> {
        use ExitCode::*;
        match code {
            0 => Some(Success),
            1 => Some(GeneralError),
            2 => Some(InvalidArguments),
            3 => Some(TaskNotFound),
            4 => Some(DependencyCycle),
            5 => Some(ValidationSchema),
            6 => Some(ValidationSemantic),
            7 => Some(ValidationReferential),
            8 => Some(ValidationStateMachine),
            9 => Some(LockTimeout),
            10 => Some(PermissionDenied),
            11 => Some(ResourceNotFound),
            12 => Some(Conflict),
            13 => Some(Timeout),
            14 => Some(RateLimited),
            15 => Some(ExternalService),
            16 => Some(Hallucination),
            17 => Some(ManualIntervention),
            _ => None,
        }
    }

    /// Canonical identifier, e.g. `VALIDATION_SCHEMA`.
    pub const fn name(self) -> &'static str {
        use ExitCode::*;
        match self {
            Success => "SUCCESS",
            GeneralError => "GENERAL_ERROR",
            InvalidArguments => "INVALID_ARGUMENTS",
            TaskNotFound => "TASK_NOT_FOUND",
            DependencyCycle => "DEPENDENCY_CYCLE",
            ValidationSchema => "VALIDATION_SCHEMA",
            ValidationSemantic => "VALIDATION_SEMANTIC",
            ValidationReferential => "VALIDATION_REFERENTIAL",
            ValidationStateMachine => "VALIDATION_STATE_MACHINE",
            LockTimeout => "LOCK_TIMEOUT",
            PermissionDenied => "PERMISSION_DENIED",
            ResourceNotFound => "RESOURCE_NOT_FOUND",
            Conflict => "CONFLICT",
            Timeout => "TIMEOUT",
            RateLimited => "RATE_LIMITED",
            ExternalService => "EXTERNAL_SERVICE",
            Hallucination => "HALLUCINATION",
            ManualIntervention => "MANUAL_INTERVENTION",
        }
    }

    /// Fixed human-readable description.
    pub const fn description(self) -> &'static str {
        use ExitCode::*;
        match self {
            Success => "Operation completed successfully",
            GeneralError => "Unspecified error",
            InvalidArguments => "Invalid arguments or unknown file type",
            TaskNotFound => "Referenced task does not exist",
            DependencyCycle => "Task dependency graph contains a cycle",
            ValidationSchema => "Document failed structural schema validation",
            ValidationSemantic => "Document failed semantic field validation",
            ValidationReferential => "Document failed referential validation",
            ValidationStateMachine => "Document failed state-machine validation",
            LockTimeout => "Timed out waiting for a lock",
            PermissionDenied => "Permission denied",
            ResourceNotFound => "Requested resource does not exist",
            Conflict => "Conflicting concurrent modification",
            Timeout => "Operation timed out",
            RateLimited => "Rate limit exceeded",
            ExternalService => "External service failure",
            Hallucination => "Agent output referenced nonexistent artifacts",
            ManualIntervention => "Manual intervention required",
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// True for the four per-layer validation failures (5..8).
    pub const fn is_validation_error(self) -> bool {
        matches!(
            self,
            ExitCode::ValidationSchema
                | ExitCode::ValidationSemantic
                | ExitCode::ValidationReferential
                | ExitCode::ValidationStateMachine
        )
    }

    /// True if the operation is transient and worth retrying.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            ExitCode::LockTimeout
                | ExitCode::Timeout
                | ExitCode::RateLimited
                | ExitCode::ExternalService
        )
    }

    /// True if no retry will help and a human has to step in.
    pub const fn requires_intervention(self) -> bool {
        matches!(
            self,
            ExitCode::PermissionDenied | ExitCode::Hallucination | ExitCode::ManualIntervention
        )
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}

impl Serialize for ExitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ExitCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        ExitCode::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown exit code {}", code)))
    }
}

/// Canonical identifier for a raw numeric code, `UNKNOWN` outside the taxonomy.
pub fn name_of(code: u8) -> &'static str {
    ExitCode::from_code(code).map(ExitCode::name).unwrap_or("UNKNOWN")
}

/// Fixed description for a raw numeric code.
pub fn description_of(code: u8) -> &'static str {
    ExitCode::from_code(code)
        .map(ExitCode::description)
        .unwrap_or("Unknown exit code")
}

/// An exit code that is guaranteed not to be `Success`.
///
/// `failure` outcomes take this instead of a bare `ExitCode` so that a
/// zero-coded failure cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCode(ExitCode);

impl FailureCode {
    pub fn get(self) -> ExitCode {
        self.0
    }
}

impl TryFrom<ExitCode> for FailureCode {
    type Error = ExitCode;

    fn try_from(code: ExitCode) -> Result<Self, ExitCode> {
        if code.is_success() {
            Err(code)
        } else {
            Ok(FailureCode(code))
        }
    }
}

/// Terminal outcome of a command or hook, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub exit_code: ExitCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Canonical success constructor.
pub fn success(message: Option<String>, details: Option<Value>) -> Outcome {
    Outcome {
        success: true,
        exit_code: ExitCode::Success,
        message,
        details,
    }
}

/// Canonical failure constructor. `FailureCode` keeps code 0 out.
pub fn failure(code: FailureCode, message: Option<String>, details: Option<Value>) -> Outcome {
    Outcome {
        success: false,
        exit_code: code.get(),
        message,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_frozen() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::GeneralError.code(), 1);
        assert_eq!(ExitCode::InvalidArguments.code(), 2);
        assert_eq!(ExitCode::TaskNotFound.code(), 3);
        assert_eq!(ExitCode::DependencyCycle.code(), 4);
        assert_eq!(ExitCode::ValidationSchema.code(), 5);
        assert_eq!(ExitCode::ValidationSemantic.code(), 6);
        assert_eq!(ExitCode::ValidationReferential.code(), 7);
        assert_eq!(ExitCode::ValidationStateMachine.code(), 8);
        assert_eq!(ExitCode::LockTimeout.code(), 9);
        assert_eq!(ExitCode::PermissionDenied.code(), 10);
        assert_eq!(ExitCode::ResourceNotFound.code(), 11);
        assert_eq!(ExitCode::Conflict.code(), 12);
        assert_eq!(ExitCode::Timeout.code(), 13);
        assert_eq!(ExitCode::RateLimited.code(), 14);
        assert_eq!(ExitCode::ExternalService.code(), 15);
        assert_eq!(ExitCode::Hallucination.code(), 16);
        assert_eq!(ExitCode::ManualIntervention.code(), 17);
    }

    #[test]
    fn from_code_round_trips() {
        for code in 0..=17u8 {
            let parsed = ExitCode::from_code(code).unwrap();
            assert_eq!(parsed.code(), code);
        }
        assert_eq!(ExitCode::from_code(18), None);
        assert_eq!(ExitCode::from_code(255), None);
    }

    #[test]
    fn validation_error_band() {
        for code in 0..=17u8 {
            let exit = ExitCode::from_code(code).unwrap();
            assert_eq!(exit.is_validation_error(), (5..=8).contains(&code));
        }
    }

    #[test]
    fn retryable_band() {
        let retryable: Vec<u8> = (0..=17u8)
            .filter(|c| ExitCode::from_code(*c).unwrap().is_retryable())
            .collect();
        assert_eq!(retryable, vec![9, 13, 14, 15]);
    }

    #[test]
    fn intervention_band() {
        let manual: Vec<u8> = (0..=17u8)
            .filter(|c| ExitCode::from_code(*c).unwrap().requires_intervention())
            .collect();
        assert_eq!(manual, vec![10, 16, 17]);
    }

    #[test]
    fn name_of_unknown_code() {
        assert_eq!(name_of(5), "VALIDATION_SCHEMA");
        assert_eq!(name_of(99), "UNKNOWN");
        assert_eq!(description_of(99), "Unknown exit code");
    }

    #[test]
    fn failure_code_refuses_success() {
        assert!(FailureCode::try_from(ExitCode::Success).is_err());
        let code = FailureCode::try_from(ExitCode::Conflict).unwrap();
        assert_eq!(code.get(), ExitCode::Conflict);
    }

    #[test]
    fn outcome_constructors() {
        let ok = success(Some("done".to_string()), None);
        assert!(ok.success);
        assert_eq!(ok.exit_code, ExitCode::Success);

        let code = FailureCode::try_from(ExitCode::ValidationSemantic).unwrap();
        let failed = failure(code, None, None);
        assert!(!failed.success);
        assert_eq!(failed.exit_code, ExitCode::ValidationSemantic);
    }

    #[test]
    fn exit_code_serializes_as_number() {
        let json = serde_json::to_string(&ExitCode::ValidationReferential).unwrap();
        assert_eq!(json, "7");
        let back: ExitCode = serde_json::from_str("7").unwrap();
        assert_eq!(back, ExitCode::ValidationReferential);
        assert!(serde_json::from_str::<ExitCode>("42").is_err());
    }
}
