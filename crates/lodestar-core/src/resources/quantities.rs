use crate::error::{ResourceError, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Resource map key for CPU
pub const CPU: &str = "cpu";

/// Resource quantities tracked by the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceQuantities {
    /// CPU in millicores (1000 = 1 core)
    pub cpu_millicores: i64,
}

impl ResourceQuantities {
    /// Parse CPU string (e.g., "2", "1000m", "0.5") into millicores
    pub fn parse_cpu(s: &str) -> Result<i64> {
        let trimmed = s.trim();
        let invalid = |reason: String| ResourceError::invalid_quantity(CPU, s, reason);

        if let Some(m) = trimmed.strip_suffix('m') {
            // Millicores
            let millicores = m
                .parse::<i64>()
                .map_err(|e| invalid(format!("invalid millicore value: {}", e)))?;
            if millicores < 0 {
                return Err(invalid("quantity must not be negative".to_string()));
            }
            Ok(millicores)
        } else {
            // Whole (or fractional) cores
            let cores = trimmed
                .parse::<f64>()
                .map_err(|e| invalid(format!("invalid core value: {}", e)))?;
            if !cores.is_finite() {
                return Err(invalid("quantity must be finite".to_string()));
            }
            if cores < 0.0 {
                return Err(invalid("quantity must not be negative".to_string()));
            }
            let millicores = (cores * 1000.0).round();
            if millicores >= i64::MAX as f64 {
                return Err(invalid("quantity out of range".to_string()));
            }
            Ok(millicores as i64)
        }
    }

    /// Add two CPU amounts, failing instead of wrapping on overflow
    pub fn add_cpu(total: i64, millicores: i64) -> Result<i64> {
        total.checked_add(millicores).ok_or_else(|| {
            ResourceError::invalid_quantity(
                CPU,
                format!("{}m + {}m", total, millicores),
                "sum out of range",
            )
        })
    }

    /// Render millicores in the shortest exact form ("2", "1500m")
    pub fn format_cpu(millicores: i64) -> String {
        if millicores % 1000 == 0 {
            format!("{}", millicores / 1000)
        } else {
            format!("{}m", millicores)
        }
    }

    /// Read quantities from a resource map (k8s-openapi format).
    ///
    /// A missing CPU entry counts as zero; a malformed one is an error.
    pub fn from_k8s_resource_map(resources: &BTreeMap<String, Quantity>) -> Result<Self> {
        let cpu_millicores = match resources.get(CPU) {
            Some(q) => Self::parse_cpu(&q.0)?,
            None => 0,
        };

        Ok(Self { cpu_millicores })
    }

    /// Sum of the requests of every container in the pod
    pub fn pod_requests(pod: &Pod) -> Result<Self> {
        let mut total = Self::default();

        let Some(spec) = &pod.spec else {
            return Ok(total);
        };

        for container in &spec.containers {
            if let Some(requests) = container
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref())
            {
                let requested = Self::from_k8s_resource_map(requests)?;
                total.cpu_millicores =
                    Self::add_cpu(total.cpu_millicores, requested.cpu_millicores)?;
            }
        }

        Ok(total)
    }

    /// Allocatable resources advertised in the node status
    pub fn node_allocatable(node: &Node) -> Result<Self> {
        match node.status.as_ref().and_then(|s| s.allocatable.as_ref()) {
            Some(allocatable) => Self::from_k8s_resource_map(allocatable),
            None => Ok(Self::default()),
        }
    }
}
