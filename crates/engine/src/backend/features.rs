use crate::error::{EngineError, EngineResult};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DeviceFeatureState {
    #[default]
    Disabled,
    Optional,
    /// The feature is required; device creation fails without it.
    Enabled,
}

/// Device capabilities, either as requested or as resolved against a device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    pub tessellation: DeviceFeatureState,
    pub compute_shaders: DeviceFeatureState,
    pub geometry_shaders: DeviceFeatureState,
    pub mesh_shaders: DeviceFeatureState,
    pub ray_tracing: DeviceFeatureState,
    pub multithreaded_resource_creation: DeviceFeatureState,
}

const FEATURE_COUNT: usize = 6;

impl DeviceFeatures {
    fn to_array(self) -> [(&'static str, DeviceFeatureState); FEATURE_COUNT] {
        [
            ("tessellation", self.tessellation),
            ("compute shaders", self.compute_shaders),
            ("geometry shaders", self.geometry_shaders),
            ("mesh shaders", self.mesh_shaders),
            ("ray tracing", self.ray_tracing),
            (
                "multithreaded resource creation",
                self.multithreaded_resource_creation,
            ),
        ]
    }

    fn from_array(states: [DeviceFeatureState; FEATURE_COUNT]) -> Self {
        let [tessellation, compute_shaders, geometry_shaders, mesh_shaders, ray_tracing, multithreaded_resource_creation] =
            states;
        Self {
            tessellation,
            compute_shaders,
            geometry_shaders,
            mesh_shaders,
            ray_tracing,
            multithreaded_resource_creation,
        }
    }

    /// Resolves requested features against what a device supports.
    ///
    /// `supported` marks available features as anything but `Disabled`. The result only
    /// contains `Enabled` and `Disabled`; a required feature the device lacks is an error.
    pub fn resolve(&self, supported: &DeviceFeatures) -> EngineResult<DeviceFeatures> {
        let requested = self.to_array();
        let supported = supported.to_array();
        let mut resolved = [DeviceFeatureState::Disabled; FEATURE_COUNT];

        for (i, ((name, wanted), (_, available))) in
            requested.iter().zip(supported.iter()).enumerate()
        {
            let available = *available != DeviceFeatureState::Disabled;
            resolved[i] = match (wanted, available) {
                (DeviceFeatureState::Enabled, false) => {
                    return Err(EngineError::UnsupportedFeature(*name))
                }
                (DeviceFeatureState::Disabled, _) | (DeviceFeatureState::Optional, false) => {
                    DeviceFeatureState::Disabled
                }
                (_, true) => DeviceFeatureState::Enabled,
            };
        }

        Ok(Self::from_array(resolved))
    }

    pub fn enabled_names(&self) -> Vec<&'static str> {
        self.to_array()
            .into_iter()
            .filter(|(_, state)| *state == DeviceFeatureState::Enabled)
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum QueuePriority {
    Low,
    #[default]
    Medium,
    High,
    Realtime,
}

impl QueuePriority {
    pub fn as_f32(&self) -> f32 {
        match self {
            QueuePriority::Low => 0.0,
            QueuePriority::Medium => 0.5,
            QueuePriority::High | QueuePriority::Realtime => 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImmediateContextCreateInfo {
    pub name: String,
    /// Index of the queue within the graphics queue family.
    pub queue_id: u32,
    pub priority: QueuePriority,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineCreateInfo {
    pub immediate_context: ImmediateContextCreateInfo,
    pub features: DeviceFeatures,
    pub enable_validation: bool,
}

impl Default for EngineCreateInfo {
    fn default() -> Self {
        Self {
            immediate_context: ImmediateContextCreateInfo {
                name: "Graphics".to_owned(),
                queue_id: 0,
                priority: QueuePriority::High,
            },
            features: DeviceFeatures {
                tessellation: DeviceFeatureState::Enabled,
                compute_shaders: DeviceFeatureState::Optional,
                geometry_shaders: DeviceFeatureState::Optional,
                mesh_shaders: DeviceFeatureState::Optional,
                ray_tracing: DeviceFeatureState::Optional,
                multithreaded_resource_creation: DeviceFeatureState::Enabled,
            },
            enable_validation: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeviceFeatureState::{Disabled, Enabled, Optional};

    fn all(state: DeviceFeatureState) -> DeviceFeatures {
        DeviceFeatures::from_array([state; FEATURE_COUNT])
    }

    #[test]
    fn optional_features_follow_support() {
        let requested = all(Optional);
        let supported = DeviceFeatures {
            geometry_shaders: Enabled,
            ray_tracing: Enabled,
            ..all(Disabled)
        };

        let resolved = requested.resolve(&supported).unwrap();
        assert_eq!(resolved.geometry_shaders, Enabled);
        assert_eq!(resolved.ray_tracing, Enabled);
        assert_eq!(resolved.tessellation, Disabled);
        assert_eq!(resolved.enabled_names(), ["geometry shaders", "ray tracing"]);
    }

    #[test]
    fn disabled_features_stay_off_even_when_supported() {
        let resolved = all(Disabled).resolve(&all(Enabled)).unwrap();
        assert_eq!(resolved, all(Disabled));
    }

    #[test]
    fn missing_required_feature_is_an_error() {
        let requested = DeviceFeatures {
            mesh_shaders: Enabled,
            ..all(Optional)
        };

        let err = requested.resolve(&all(Disabled)).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFeature("mesh shaders")));
    }

    #[test]
    fn default_create_info_requires_tessellation() {
        let info = EngineCreateInfo::default();
        assert_eq!(info.features.tessellation, Enabled);
        assert_eq!(info.features.multithreaded_resource_creation, Enabled);
        assert_eq!(info.features.compute_shaders, Optional);
        assert_eq!(info.immediate_context.priority, QueuePriority::High);
    }
}
