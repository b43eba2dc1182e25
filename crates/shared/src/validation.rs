//! Common validation utilities.
//!
//! These functions are plugged into `#[validate(custom(...))]` attributes on
//! request and record types, and are also called directly when validating
//! configuration-provided zones.

use validator::ValidationError;

/// Upper bound for a zone radius (100 km).
pub const MAX_ZONE_RADIUS_METERS: f64 = 100_000.0;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(invalid("latitude_range", "Latitude must be between -90 and 90"))
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(invalid(
            "longitude_range",
            "Longitude must be between -180 and 180",
        ))
    }
}

/// Validates that a fix accuracy is finite and non-negative.
pub fn validate_accuracy(accuracy: f64) -> Result<(), ValidationError> {
    if accuracy.is_finite() && accuracy >= 0.0 {
        Ok(())
    } else {
        Err(invalid("accuracy_range", "Accuracy must be non-negative"))
    }
}

/// Validates that a heading is within valid range (0 to 360).
pub fn validate_heading(heading: f64) -> Result<(), ValidationError> {
    if (0.0..=360.0).contains(&heading) {
        Ok(())
    } else {
        Err(invalid("heading_range", "Heading must be between 0 and 360"))
    }
}

/// Validates that speed is finite and non-negative.
pub fn validate_speed(speed: f64) -> Result<(), ValidationError> {
    if speed.is_finite() && speed >= 0.0 {
        Ok(())
    } else {
        Err(invalid("speed_range", "Speed must be non-negative"))
    }
}

/// Validates that battery level is within valid range (0 to 100).
pub fn validate_battery_level(level: i32) -> Result<(), ValidationError> {
    if (0..=100).contains(&level) {
        Ok(())
    } else {
        Err(invalid(
            "battery_range",
            "Battery level must be between 0 and 100",
        ))
    }
}

/// Validates a zone radius: strictly positive, finite, at most 100 km.
pub fn validate_radius(radius_meters: f64) -> Result<(), ValidationError> {
    if radius_meters.is_finite() && radius_meters > 0.0 && radius_meters <= MAX_ZONE_RADIUS_METERS
    {
        Ok(())
    } else {
        Err(invalid(
            "radius_range",
            "Radius must be greater than 0 and at most 100000 meters",
        ))
    }
}

/// Validates that an identifier is not empty or whitespace only.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("blank", "Value must not be blank"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ValidationError) -> String {
        err.message.map(|m| m.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_validate_latitude() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(11.0168).is_ok());
        assert!(validate_latitude(90.1).is_err());
        assert!(validate_latitude(-90.1).is_err());
        assert!(validate_latitude(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_longitude() {
        assert!(validate_longitude(0.0).is_ok());
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(76.9558).is_ok());
        assert!(validate_longitude(180.1).is_err());
        assert!(validate_longitude(f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinate_error_messages() {
        assert_eq!(
            message(validate_latitude(100.0).unwrap_err()),
            "Latitude must be between -90 and 90"
        );
        assert_eq!(
            message(validate_longitude(200.0).unwrap_err()),
            "Longitude must be between -180 and 180"
        );
    }

    #[test]
    fn test_validate_accuracy() {
        assert!(validate_accuracy(0.0).is_ok());
        assert!(validate_accuracy(3.5).is_ok());
        assert!(validate_accuracy(-1.0).is_err());
        assert!(validate_accuracy(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_heading() {
        assert!(validate_heading(0.0).is_ok());
        assert!(validate_heading(270.0).is_ok());
        assert!(validate_heading(360.0).is_ok());
        assert!(validate_heading(-0.5).is_err());
        assert!(validate_heading(360.5).is_err());
    }

    #[test]
    fn test_validate_speed() {
        assert!(validate_speed(0.0).is_ok());
        assert!(validate_speed(1.4).is_ok()); // walking pace
        assert!(validate_speed(-2.0).is_err());
    }

    #[test]
    fn test_validate_battery_level() {
        assert!(validate_battery_level(0).is_ok());
        assert!(validate_battery_level(100).is_ok());
        assert!(validate_battery_level(-1).is_err());
        assert!(validate_battery_level(101).is_err());
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius(20.0).is_ok());
        assert!(validate_radius(MAX_ZONE_RADIUS_METERS).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-5.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(MAX_ZONE_RADIUS_METERS + 1.0).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("tourist-42").is_ok());
        assert!(validate_not_blank("").is_err());
        assert_eq!(
            message(validate_not_blank("   ").unwrap_err()),
            "Value must not be blank"
        );
    }
}
