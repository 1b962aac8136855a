//! Per-[`Detector`](crate::detector::Detector) configuration.

use core::fmt;

/// Raised when a [`Detector`](crate::detector::Detector) is constructed with
/// invalid parameters.
///
/// Per §7: invalid configuration fails fast, with no partial state — this
/// type is returned from fallible constructors rather than panicking, since
/// both causes (an empty label, a zero interval) are caller-triggerable
/// rather than programmer-error-only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// `resourceType` was empty.
    EmptyResourceType,
    /// `samplingInterval` was `0`.
    ZeroSamplingInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyResourceType => write!(f, "resource type label must not be empty"),
            ConfigError::ZeroSamplingInterval => {
                write!(f, "sampling interval must be greater than 0")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Config
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runtime configuration parameters for a single [`Detector`](crate::detector::Detector).
#[derive(Clone, Debug)]
pub struct Config {
    resource_type: String,
    sampling_interval: u32,
}

/********** impl inherent *************************************************************************/

impl Config {
    const DEFAULT_SAMPLING_INTERVAL: u32 = 128;

    /// Creates a new [`Config`] with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyResourceType`] if `resource_type` is
    /// empty, or [`ConfigError::ZeroSamplingInterval`] if `sampling_interval`
    /// is `0`.
    #[inline]
    pub fn with_params(
        resource_type: impl Into<String>,
        sampling_interval: u32,
    ) -> Result<Self, ConfigError> {
        let resource_type = resource_type.into();
        if resource_type.is_empty() {
            return Err(ConfigError::EmptyResourceType);
        }
        if sampling_interval == 0 {
            return Err(ConfigError::ZeroSamplingInterval);
        }

        Ok(Self { resource_type, sampling_interval })
    }

    /// Returns the free-form resource type label.
    #[inline]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the sampling interval: one in every `N` allocations is tracked
    /// at [`Level::Simple`]/[`Level::Advanced`].
    ///
    /// [`Level::Simple`]: crate::level::Level::Simple
    /// [`Level::Advanced`]: crate::level::Level::Advanced
    #[inline]
    pub fn sampling_interval(&self) -> u32 {
        self.sampling_interval
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ConfigBuilder
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A builder type for gradually assembling a [`Config`].
///
/// Mainly useful for stability across future releases, in case further
/// parameters are added to [`Config`].
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    resource_type: Option<String>,
    sampling_interval: Option<u32>,
}

impl ConfigBuilder {
    /// Creates a new [`ConfigBuilder`] with no parameters set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resource type label.
    #[inline]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Sets the sampling interval.
    #[inline]
    pub fn sampling_interval(mut self, sampling_interval: u32) -> Self {
        self.sampling_interval = Some(sampling_interval);
        self
    }

    /// Consumes the builder and returns an initialized [`Config`].
    ///
    /// The sampling interval defaults to 128 if unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyResourceType`] if no resource type (or an
    /// empty one) was supplied.
    #[inline]
    pub fn build(self) -> Result<Config, ConfigError> {
        Config::with_params(
            self.resource_type.ok_or(ConfigError::EmptyResourceType)?,
            self.sampling_interval.unwrap_or(Config::DEFAULT_SAMPLING_INTERVAL),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigBuilder, ConfigError};

    #[test]
    fn rejects_empty_resource_type() {
        assert_eq!(Config::with_params("", 128).unwrap_err(), ConfigError::EmptyResourceType);
    }

    #[test]
    fn rejects_zero_interval() {
        assert_eq!(Config::with_params("Buffer", 0).unwrap_err(), ConfigError::ZeroSamplingInterval);
    }

    #[test]
    fn builder_defaults_interval() {
        let cfg = ConfigBuilder::new().resource_type("Buffer").build().unwrap();
        assert_eq!(cfg.sampling_interval(), 128);
        assert_eq!(cfg.resource_type(), "Buffer");
    }

    #[test]
    fn builder_requires_resource_type() {
        assert_eq!(ConfigBuilder::new().build().unwrap_err(), ConfigError::EmptyResourceType);
    }
}
