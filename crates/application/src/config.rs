use schengine::backend::features::EngineCreateInfo;
use schengine::backend::BackendKind;
use schengine::error::EngineResult;
use schengine::window::WindowDesc;

/// Everything the application needs to bring the engine up.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub window: WindowDesc,
    pub engine: EngineCreateInfo,
    pub backend: BackendKind,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Compiled-in defaults, with the backend overridable through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EngineResult<Self> {
        let backend = match lookup(BackendKind::ENV_VAR) {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => BackendKind::detect(),
        };

        Ok(Self {
            window: WindowDesc::default(),
            engine: EngineCreateInfo::default(),
            backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schengine::error::EngineError;

    #[test]
    fn backend_defaults_to_platform_detection() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.backend, BackendKind::detect());
        assert_eq!((config.window.width, config.window.height), (1280, 720));

        let blank = AppConfig::from_lookup(|_| Some("  ".to_owned())).unwrap();
        assert_eq!(blank.backend, BackendKind::detect());
    }

    #[test]
    fn backend_is_read_from_environment() {
        let config = AppConfig::from_lookup(|key| {
            (key == "SCHENGINE_BACKEND").then(|| "NULL".to_owned())
        })
        .unwrap();
        assert_eq!(config.backend, BackendKind::Null);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = AppConfig::from_lookup(|_| Some("metal".to_owned()));
        assert!(matches!(result, Err(EngineError::UnknownBackend(name)) if name == "metal"));
    }
}
