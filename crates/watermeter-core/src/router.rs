//! Endpoint router: field names <-> endpoint-qualified keys

use crate::encoder::Target;
use crate::error::ConverterError;
use crate::profile::{qualified_key, DeviceProfile};
use serde::Serialize;

/// Which way a field is travelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Decoded from telemetry sent by `endpoint`
    Inbound { endpoint: u8 },
    /// Towards the device, as a set or get command
    Outbound,
}

/// A resolved field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Base field name used by the rule tables
    pub field: String,
    /// Published / command key
    pub key: String,
    /// Endpoint the field lives on, when known
    pub endpoint: Option<u8>,
}

/// Resolves field bindings strictly from a profile's declarations
#[derive(Debug, Clone, Copy)]
pub struct EndpointRouter<'a> {
    profile: &'a DeviceProfile,
}

impl<'a> EndpointRouter<'a> {
    #[must_use]
    pub fn new(profile: &'a DeviceProfile) -> Self {
        Self { profile }
    }

    /// Resolve a field in either direction
    ///
    /// Outbound routes take the endpoint from the field's encoder rule when
    /// it names a fixed one.
    #[allow(clippy::missing_errors_doc)]
    pub fn resolve(&self, name: &str, direction: Direction) -> Result<Route, ConverterError> {
        match direction {
            Direction::Inbound { endpoint } => {
                let key = self.inbound(name, endpoint)?;
                Ok(Route {
                    field: name.to_string(),
                    key,
                    endpoint: Some(endpoint),
                })
            }
            Direction::Outbound => {
                let mut route = self.outbound(name)?;
                if let Some(rule) = self.profile.encoder(&route.field) {
                    route.endpoint = Some(self.target(&route, rule.target)?);
                }
                Ok(route)
            }
        }
    }

    /// Published key for `field` reported by `endpoint`
    ///
    /// An exposure scoped to the reporting endpoint wins over an unscoped one.
    #[allow(clippy::missing_errors_doc)]
    pub fn inbound(&self, field: &str, endpoint: u8) -> Result<String, ConverterError> {
        let mut unscoped = None;
        for exposed in self.profile.exposures(field) {
            match exposed.endpoint {
                Some(ep) if ep == endpoint && self.profile.multi_endpoint() => {
                    return Ok(exposed.property.clone());
                }
                None => unscoped = Some(exposed.name.clone()),
                _ => {}
            }
        }
        unscoped.ok_or_else(|| {
            ConverterError::UnboundField(format!("{field} (endpoint {endpoint})"))
        })
    }

    /// Split a command key into its base field and endpoint qualifier
    ///
    /// `volume_2` resolves only if `volume` is declared on endpoint 2.
    #[allow(clippy::missing_errors_doc)]
    pub fn outbound(&self, key: &str) -> Result<Route, ConverterError> {
        if self.profile.exposures(key).next().is_some() {
            return Ok(Route {
                field: key.to_string(),
                key: key.to_string(),
                endpoint: None,
            });
        }

        if self.profile.multi_endpoint() {
            if let Some((base, suffix)) = key.rsplit_once('_') {
                if let Ok(endpoint) = suffix.parse::<u8>() {
                    let declared = self
                        .profile
                        .exposures(base)
                        .any(|exposed| exposed.endpoint == Some(endpoint));
                    if declared {
                        return Ok(Route {
                            field: base.to_string(),
                            key: qualified_key(base, endpoint),
                            endpoint: Some(endpoint),
                        });
                    }
                }
            }
        }

        Err(ConverterError::UnboundField(key.to_string()))
    }

    /// Physical endpoint a rule addresses for this route
    ///
    /// Fixed targets ignore the key's qualifier: control and telemetry
    /// endpoints are separate namespaces.
    #[allow(clippy::missing_errors_doc)]
    pub fn target(&self, route: &Route, target: Target) -> Result<u8, ConverterError> {
        match target {
            Target::Fixed(endpoint) => Ok(endpoint),
            Target::Qualified => route
                .endpoint
                .ok_or_else(|| ConverterError::UnboundField(route.key.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices;

    #[test]
    fn test_inbound_disambiguates_by_endpoint() {
        let profile = devices::preset_profile().unwrap();
        let router = EndpointRouter::new(&profile);
        assert_eq!(router.inbound("volume", 1).unwrap(), "volume_1");
        assert_eq!(router.inbound("volume", 2).unwrap(), "volume_2");
        assert!(matches!(
            router.inbound("volume", 3),
            Err(ConverterError::UnboundField(_))
        ));
        assert_eq!(router.inbound("battery", 1).unwrap(), "battery");
    }

    #[test]
    fn test_outbound_qualified_key() {
        let profile = devices::basic_profile().unwrap();
        let router = EndpointRouter::new(&profile);
        let route = router.outbound("currentsummdelivered_2").unwrap();
        assert_eq!(route.field, "currentsummdelivered");
        assert_eq!(route.endpoint, Some(2));
        assert!(router.outbound("currentsummdelivered_3").is_err());
        assert!(router.outbound("flow_rate").is_err());
    }

    #[test]
    fn test_fixed_target_overrides_telemetry_endpoint() {
        let profile = devices::preset_profile().unwrap();
        let router = EndpointRouter::new(&profile);
        let route = router
            .resolve("hot_water_preset", Direction::Outbound)
            .unwrap();
        assert_eq!(route.endpoint, Some(3));
        assert_eq!(route.key, "hot_water_preset");
    }

    #[test]
    fn test_resolve_inbound() {
        let profile = devices::basic_profile().unwrap();
        let route = EndpointRouter::new(&profile)
            .resolve("volume", Direction::Inbound { endpoint: 2 })
            .unwrap();
        assert_eq!(route.key, "volume_2");
        assert_eq!(route.endpoint, Some(2));
    }
}
