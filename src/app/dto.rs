use crate::domain::error::WarehouseError;
use crate::domain::policy::{Identity, Policy, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDto {
    pub role: Role,
    #[serde(default)]
    pub members: Vec<Identity>,
}

/// IAM policy as it travels over the wire: bindings are a list, not a map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicyDto {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<BindingDto>,
}

impl From<&Policy> for PolicyDto {
    fn from(policy: &Policy) -> Self {
        Self {
            version: policy.version,
            etag: policy.etag.clone(),
            bindings: policy
                .bindings
                .iter()
                .map(|(role, members)| BindingDto {
                    role: role.clone(),
                    members: members.iter().cloned().collect(),
                })
                .collect(),
        }
    }
}

impl From<PolicyDto> for Policy {
    fn from(dto: PolicyDto) -> Self {
        let mut policy = Policy {
            version: dto.version,
            etag: dto.etag,
            ..Policy::default()
        };
        for binding in dto.bindings {
            // Bindings may repeat a role; members of all of them are merged.
            policy
                .bindings
                .entry(binding.role)
                .or_default()
                .extend(binding.members);
        }
        policy.bindings.retain(|_, members| !members.is_empty());
        policy
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPolicyOptionsDto {
    pub requested_policy_version: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetIamPolicyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<GetPolicyOptionsDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetIamPolicyRequest {
    pub policy: PolicyDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorItemDto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBodyDto {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub errors: Vec<ErrorItemDto>,
}

/// `{"error": {...}}` body returned on every failed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBodyDto,
}

impl From<&WarehouseError> for ErrorEnvelope {
    fn from(e: &WarehouseError) -> Self {
        let (status, reason) = match e {
            WarehouseError::NotFound { .. } => ("NOT_FOUND", "notFound"),
            WarehouseError::AlreadyExists { .. } => ("ALREADY_EXISTS", "duplicate"),
            WarehouseError::PermissionDenied { .. } => ("PERMISSION_DENIED", "accessDenied"),
            WarehouseError::InvalidArgument { .. } => ("INVALID_ARGUMENT", "invalid"),
            WarehouseError::PreconditionFailed { .. } => ("FAILED_PRECONDITION", "conditionNotMet"),
            WarehouseError::Service { .. } => ("INTERNAL", "backendError"),
            WarehouseError::Transport { .. } => ("UNAVAILABLE", "backendError"),
        };
        let message = e.to_string();
        Self {
            error: ErrorBodyDto {
                code: e.status_code(),
                message: message.clone(),
                status: status.to_string(),
                errors: vec![ErrorItemDto {
                    reason: reason.to_string(),
                    message,
                }],
            },
        }
    }
}
