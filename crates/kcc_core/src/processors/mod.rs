//! # Built-in Processors
//!
//! | Processor | Stage | Priority |
//! |-----------|-------|----------|
//! | [`EnvironmentProcessor`] | `PrepareData` | 1000 |
//! | [`StepUpProcessor`] | `AfterMoveStep` | -1000 |
//! | [`GroundSnapProcessor`] | `AfterMoveStep` | -2000 |
//!
//! [`KccConfig`] bundles their tuning with the controller settings in one
//! TOML file:
//!
//! ```toml
//! radius = 0.4
//! height = 1.9
//!
//! [environment]
//! kinematic_speed = 5.0
//!
//! [step_up]
//! step_height = 0.35
//!
//! [ground_snap]
//! snap_distance = 0.3
//! ```

mod environment;
mod ground_snap;
mod step_up;

pub use environment::{EnvironmentConfig, EnvironmentProcessor};
pub use ground_snap::{GroundSnapConfig, GroundSnapProcessor};
pub use step_up::{StepUpConfig, StepUpProcessor};

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{KccError, KccResult};
use crate::integrator::Kcc;
use crate::physics::PhysicsWorld;
use crate::pipeline::ProcessorId;
use crate::settings::KccSettings;

/// Controller settings plus built-in processor tuning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KccConfig {
    /// Controller settings, top-level keys of the file.
    #[serde(flatten)]
    pub settings: KccSettings,
    /// `[environment]` table.
    pub environment: EnvironmentConfig,
    /// `[step_up]` table.
    pub step_up: StepUpConfig,
    /// `[ground_snap]` table.
    pub ground_snap: GroundSnapConfig,
}

impl KccConfig {
    /// Parses a config from TOML. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`KccError::InvalidConfig`] if the text is not valid TOML or a
    /// key has the wrong type.
    pub fn from_toml_str(text: &str) -> KccResult<Self> {
        let mut config: Self = toml::from_str(text).map_err(|e| KccError::InvalidConfig(e.to_string()))?;
        config.settings.sanitize();
        Ok(config)
    }

    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`KccError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> KccResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| KccError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Registers the three built-in processors on `kcc`.
    pub fn register_processors(&self, kcc: &mut Kcc) -> [ProcessorId; 3] {
        [
            kcc.add_processor(EnvironmentProcessor::new(self.environment.clone())),
            kcc.add_processor(StepUpProcessor::new(self.step_up.clone())),
            kcc.add_processor(GroundSnapProcessor::new(self.ground_snap.clone())),
        ]
    }

    /// Creates an unspawned controller with the built-in processors.
    #[must_use]
    pub fn build(&self, world: Arc<dyn PhysicsWorld>) -> Kcc {
        let mut kcc = Kcc::new(world, self.settings.clone());
        self.register_processors(&mut kcc);
        tracing::debug!("controller built with {} processors", kcc.processor_count());
        kcc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::FixedStep;
    use crate::world::StaticWorld;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = KccConfig::from_toml_str(
            r#"
            radius = 0.4

            [step_up]
            step_height = 0.3

            [ground_snap]
            snap_speed = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.radius, 0.4);
        assert_eq!(config.settings.height, 1.8);
        assert_eq!(config.step_up.step_height, 0.3);
        assert_eq!(config.step_up.step_depth, 0.2);
        assert_eq!(config.ground_snap.snap_speed, 2.0);
        assert_eq!(config.environment, EnvironmentConfig::default());
    }

    #[test]
    fn test_config_clamps_settings() {
        let config = KccConfig::from_toml_str("radius = 2.0\nheight = 1.0\nmax_penetration_steps = 99").unwrap();
        assert_eq!(config.settings.height, 4.0);
        assert_eq!(config.settings.max_penetration_steps, 16);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = KccConfig::from_toml_str("[step_up]\nstep_height = \"tall\"");
        assert!(matches!(result, Err(KccError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_orders_processors_by_priority() {
        let mut kcc = KccConfig::default().build(Arc::new(StaticWorld::new()));
        assert_eq!(kcc.processor_count(), 3);

        kcc.spawn(kcc_shared::Vec3::ZERO, 0.0, 0.0, FixedStep::default()).unwrap();
        kcc.cache_processors();

        let priorities: Vec<f32> = kcc.cached_processors().iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![1000.0, -1000.0, -2000.0]);
    }
}
