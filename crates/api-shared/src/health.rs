use crate::wire::HealthRes;

/// Simple health service used by the processing service's `/health` endpoint.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Returns a `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "HealthRecord processing service is alive".into(),
        }
    }
}
