use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Renderer settings, persisted as a single flat JSON object.
///
/// The wire schema uses camelCase keys and flat float arrays for the vector
/// and matrix fields. A `Settings` value is always fully populated: the
/// store falls back to [`Settings::default`] wholesale whenever a persisted
/// blob does not parse as the complete record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    pub rays_per_pixel: i32,
    pub bounce_limit: i32,
    pub depth_of_field: f32,
    pub directional_light: Vec3,
    pub camera_position: Vec3,
    pub camera_orientation: Mat4,
    pub downsample: f32,
    pub start_on_load: bool,
    pub gravity_strength: f32,
    pub light_speed: f32,
    pub gravity_exponent: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rays_per_pixel: 1,
            bounce_limit: 1,
            depth_of_field: 3.0,
            directional_light: Vec3::new(0.0, 1.0, 0.0),
            camera_position: Self::DEFAULT_CAMERA_POSITION,
            camera_orientation: Mat4::IDENTITY,
            downsample: 1.0,
            start_on_load: true,
            gravity_strength: 10.0,
            light_speed: 300_000_000.0,
            gravity_exponent: 2.0,
        }
    }
}

/// A settings field holding a value the renderer cannot work with.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f32 },
}

impl Settings {
    /// Camera position restored by the reset action.
    pub const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 2.0, -3.0);

    /// Check value ranges without repairing anything.
    ///
    /// Load/save never mutate field values (round-trip fidelity), so this
    /// is purely advisory: the app logs the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.rays_per_pixel < 1 {
            return Err(SettingsError::BelowMinimum {
                field: "raysPerPixel",
                min: 1,
                value: self.rays_per_pixel as i64,
            });
        }
        if self.bounce_limit < 0 {
            return Err(SettingsError::BelowMinimum {
                field: "bounceLimit",
                min: 0,
                value: self.bounce_limit as i64,
            });
        }
        for (field, value) in [
            ("downsample", self.downsample),
            ("depthOfField", self.depth_of_field),
            ("lightSpeed", self.light_speed),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SettingsError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.camera_position, Vec3::new(0.0, 2.0, -3.0));
        assert_eq!(s.camera_orientation, Mat4::IDENTITY);
        assert!(s.start_on_load);
    }

    #[test]
    fn wire_schema_is_camel_case_flat_arrays() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["raysPerPixel"], 1);
        assert_eq!(json["directionalLight"], serde_json::json!([0.0, 1.0, 0.0]));
        // glam serializes Mat4 as 16 flat floats
        assert_eq!(json["cameraOrientation"].as_array().unwrap().len(), 16);
    }

    #[test]
    fn partial_blob_does_not_parse() {
        // All-or-nothing: a blob missing any field is unparsable and the
        // store falls back to the full default object.
        let partial = r#"{"raysPerPixel": 4}"#;
        assert!(serde_json::from_str::<Settings>(partial).is_err());
    }

    #[test]
    fn unknown_keys_do_not_parse() {
        let mut json = serde_json::to_value(Settings::default()).unwrap();
        json["legacyField"] = serde_json::json!(true);
        assert!(serde_json::from_value::<Settings>(json).is_err());
    }

    #[test]
    fn validate_rejects_zero_downsample() {
        let s = Settings {
            downsample: 0.0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
