//! Device profiles: static conversion tables for one device model family

use crate::decoder::DecoderRule;
use crate::encoder::{EncoderRule, ReadRule, Target};
use crate::error::ProfileError;
use crate::transport::{BindRequest, ReadRequest, ReportingConfig};
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Access mode of an exposed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Published from device telemetry only
    ReadOnly,
    /// Accepted as a command, never reported
    WriteOnly,
    /// Reported (or echoed) and settable
    ReadWrite,
}

impl Access {
    #[must_use]
    pub fn is_settable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }

    #[must_use]
    pub fn is_published(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }
}

/// Value shape of an exposed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Binary,
    Enum { values: Vec<String> },
}

/// Metadata describing one externally visible field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedField {
    /// Base field name, shared across endpoints
    pub name: String,
    /// Published key (`name` or `name_<endpoint>`)
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub access: Access,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl ExposedField {
    fn new(name: &str, access: Access, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            property: name.to_string(),
            unit: None,
            access,
            endpoint: None,
            description: None,
            kind,
        }
    }

    #[must_use]
    pub fn numeric(name: &str, access: Access) -> Self {
        Self::new(name, access, FieldKind::Numeric)
    }

    #[must_use]
    pub fn binary(name: &str, access: Access) -> Self {
        Self::new(name, access, FieldKind::Binary)
    }

    #[must_use]
    pub fn enumeration(name: &str, access: Access, values: &[&str]) -> Self {
        let values = values.iter().map(ToString::to_string).collect();
        Self::new(name, access, FieldKind::Enum { values })
    }

    #[must_use]
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Scope the field to one endpoint; the published key gains a `_<endpoint>` suffix
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: u8) -> Self {
        self.endpoint = Some(endpoint);
        self.property = qualified_key(&self.name, endpoint);
        self
    }
}

/// `volume` + 1 -> `volume_1`
#[must_use]
pub fn qualified_key(name: &str, endpoint: u8) -> String {
    format!("{name}_{endpoint}")
}

/// Opaque OTA handle supplied by the update subsystem
///
/// Attached to a profile unchanged and never inspected by the converter.
#[derive(Clone)]
pub struct OtaCapability(Arc<dyn Any + Send + Sync>);

impl OtaCapability {
    pub fn new<T: Any + Send + Sync>(capability: T) -> Self {
        Self(Arc::new(capability))
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for OtaCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtaCapability(..)")
    }
}

/// Steps run against a device when it is (re)configured
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigureSteps {
    /// Initial attribute reads
    pub reads: Vec<ReadRequest>,
    /// Cluster bindings towards the coordinator
    pub binds: Vec<BindRequest>,
    /// Periodic reporting subscriptions, handed over verbatim
    pub reporting: Vec<ReportingConfig>,
}

/// Declarative conversion table for one device model family
///
/// Built once through [`ProfileBuilder::build`], which rejects incomplete
/// tables, and shared read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceProfile {
    zigbee_models: Vec<String>,
    vendor: String,
    model: String,
    description: String,
    multi_endpoint: bool,
    decoders: Vec<DecoderRule>,
    encoders: Vec<EncoderRule>,
    getters: Vec<ReadRule>,
    exposes: Vec<ExposedField>,
    configure: ConfigureSteps,
    #[serde(skip)]
    ota: Option<OtaCapability>,
}

impl DeviceProfile {
    /// Start a profile for the given display model
    #[must_use]
    pub fn builder(model: &str) -> ProfileBuilder {
        ProfileBuilder {
            profile: DeviceProfile {
                zigbee_models: Vec::new(),
                vendor: String::new(),
                model: model.to_string(),
                description: String::new(),
                multi_endpoint: false,
                decoders: Vec::new(),
                encoders: Vec::new(),
                getters: Vec::new(),
                exposes: Vec::new(),
                configure: ConfigureSteps::default(),
                ota: None,
            },
        }
    }

    /// Model identifiers reported by the device's Basic cluster
    #[must_use]
    pub fn zigbee_models(&self) -> &[String] {
        &self.zigbee_models
    }

    #[must_use]
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether field keys are qualified by endpoint
    #[must_use]
    pub fn multi_endpoint(&self) -> bool {
        self.multi_endpoint
    }

    #[must_use]
    pub fn decoders(&self) -> &[DecoderRule] {
        &self.decoders
    }

    #[must_use]
    pub fn encoders(&self) -> &[EncoderRule] {
        &self.encoders
    }

    #[must_use]
    pub fn getters(&self) -> &[ReadRule] {
        &self.getters
    }

    #[must_use]
    pub fn exposes(&self) -> &[ExposedField] {
        &self.exposes
    }

    #[must_use]
    pub fn configure_steps(&self) -> &ConfigureSteps {
        &self.configure
    }

    #[must_use]
    pub fn ota(&self) -> Option<&OtaCapability> {
        self.ota.as_ref()
    }

    /// Encoder rule for a base field name
    #[must_use]
    pub fn encoder(&self, field: &str) -> Option<&EncoderRule> {
        self.encoders.iter().find(|rule| rule.field == field)
    }

    /// Get rule for a base field name
    #[must_use]
    pub fn getter(&self, field: &str) -> Option<&ReadRule> {
        self.getters.iter().find(|rule| rule.field == field)
    }

    /// All exposures sharing a base field name
    pub fn exposures<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ExposedField> + 'a {
        self.exposes.iter().filter(move |field| field.name == name)
    }

    fn validate(&self) -> Result<(), ProfileError> {
        let profile = || self.model.clone();

        if self.zigbee_models.is_empty() {
            return Err(ProfileError::MissingModel { profile: profile() });
        }

        let mut seen = HashSet::new();
        for rule in &self.encoders {
            if !seen.insert(rule.field.as_str()) {
                return Err(ProfileError::DuplicateRule {
                    profile: profile(),
                    field: rule.field.clone(),
                    kind: "encoder",
                });
            }
            self.check_rule_target(&rule.field, rule.target, "set", Access::is_settable)?;
        }

        let mut seen = HashSet::new();
        for rule in &self.getters {
            if !seen.insert(rule.field.as_str()) {
                return Err(ProfileError::DuplicateRule {
                    profile: profile(),
                    field: rule.field.clone(),
                    kind: "get",
                });
            }
            self.check_rule_target(&rule.field, rule.target, "get", Access::is_published)?;
        }

        let decoded: HashSet<&str> = self
            .decoders
            .iter()
            .flat_map(DecoderRule::fields)
            .collect();

        for field in &decoded {
            if self.exposures(field).next().is_none() {
                return Err(ProfileError::UndeclaredField {
                    profile: profile(),
                    field: (*field).to_string(),
                });
            }
        }

        for exposed in &self.exposes {
            if exposed.access.is_settable() && self.encoder(&exposed.name).is_none() {
                return Err(ProfileError::UnboundField {
                    profile: profile(),
                    field: exposed.property.clone(),
                    missing: "encoder",
                });
            }
            if exposed.access.is_published() && !decoded.contains(exposed.name.as_str()) {
                return Err(ProfileError::UnboundField {
                    profile: profile(),
                    field: exposed.property.clone(),
                    missing: "decoder",
                });
            }
        }

        Ok(())
    }

    /// A rule must name an exposed field whose access allows the operation,
    /// and endpoint-qualified rules need per-endpoint exposures
    fn check_rule_target(
        &self,
        field: &str,
        target: Target,
        operation: &'static str,
        allowed: fn(Access) -> bool,
    ) -> Result<(), ProfileError> {
        let mut exposures = self.exposures(field).peekable();
        if exposures.peek().is_none() {
            return Err(ProfileError::UndeclaredField {
                profile: self.model.clone(),
                field: field.to_string(),
            });
        }

        let mut has_endpoint = false;
        for exposed in exposures {
            if !allowed(exposed.access) {
                return Err(ProfileError::AccessMismatch {
                    profile: self.model.clone(),
                    field: exposed.property.clone(),
                    operation,
                });
            }
            has_endpoint |= exposed.endpoint.is_some();
        }

        if target == Target::Qualified && !has_endpoint {
            return Err(ProfileError::UnboundField {
                profile: self.model.clone(),
                field: field.to_string(),
                missing: "endpoint",
            });
        }
        Ok(())
    }
}

/// Builder for [`DeviceProfile`]
#[derive(Debug)]
pub struct ProfileBuilder {
    profile: DeviceProfile,
}

impl ProfileBuilder {
    #[must_use]
    pub fn zigbee_model(mut self, model_id: &str) -> Self {
        self.profile.zigbee_models.push(model_id.to_string());
        self
    }

    #[must_use]
    pub fn vendor(mut self, vendor: &str) -> Self {
        self.profile.vendor = vendor.to_string();
        self
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.profile.description = description.to_string();
        self
    }

    #[must_use]
    pub fn multi_endpoint(mut self) -> Self {
        self.profile.multi_endpoint = true;
        self
    }

    #[must_use]
    pub fn decoder(mut self, rule: DecoderRule) -> Self {
        self.profile.decoders.push(rule);
        self
    }

    #[must_use]
    pub fn encoder(mut self, rule: EncoderRule) -> Self {
        self.profile.encoders.push(rule);
        self
    }

    #[must_use]
    pub fn getter(mut self, rule: ReadRule) -> Self {
        self.profile.getters.push(rule);
        self
    }

    #[must_use]
    pub fn expose(mut self, field: ExposedField) -> Self {
        self.profile.exposes.push(field);
        self
    }

    #[must_use]
    pub fn read_on_configure(mut self, request: ReadRequest) -> Self {
        self.profile.configure.reads.push(request);
        self
    }

    #[must_use]
    pub fn bind(mut self, request: BindRequest) -> Self {
        self.profile.configure.binds.push(request);
        self
    }

    #[must_use]
    pub fn reporting(mut self, config: ReportingConfig) -> Self {
        self.profile.configure.reporting.push(config);
        self
    }

    #[must_use]
    pub fn ota(mut self, capability: OtaCapability) -> Self {
        self.profile.ota = Some(capability);
        self
    }

    /// Validate and freeze the profile
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] when the table is incomplete or ambiguous:
    /// no model ids, duplicate rules, rules for unexposed fields, settable
    /// fields without an encoder, published fields without a decoder.
    pub fn build(self) -> Result<DeviceProfile, ProfileError> {
        self.profile.validate()?;
        Ok(self.profile)
    }
}
