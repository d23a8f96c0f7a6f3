//! `okta_network_zone`: three wire shapes behind one resource.
//!
//! | type         | must set                                     |
//! |--------------|----------------------------------------------|
//! | `IP`         | `gateways` or `proxies`                      |
//! | `DYNAMIC`    | `dynamic_locations`, `dynamic_proxy_type`    |
//! | `DYNAMIC_V2` | any location, IP service category or ASN     |
//!
//! Attributes of other variants are rejected at plan time and cleared
//! from state on read. System zones are never deleted remotely.

use oktaform_client::ApiRequest;
use oktaform_core::models::network_zone::{
    AddressEntry, DynamicZone, EnhancedDynamicZone, IncludeExclude, IpZone, Location, NetworkZone,
    ZoneCommon,
};
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema, api_paths};

use crate::arbiter;
use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::transition::Transition;

use super::{STATUS, binary_status, status_of, update_binary};

const NAME: &str = "name";
const TYPE: &str = "type";
const USAGE: &str = "usage";
const GATEWAYS: &str = "gateways";
const PROXIES: &str = "proxies";
const DYNAMIC_LOCATIONS: &str = "dynamic_locations";
const DYNAMIC_LOCATIONS_EXCLUDE: &str = "dynamic_locations_exclude";
const DYNAMIC_PROXY_TYPE: &str = "dynamic_proxy_type";
const ASNS: &str = "asns";
const IP_SERVICE_CATEGORIES_INCLUDE: &str = "ip_service_categories_include";
const IP_SERVICE_CATEGORIES_EXCLUDE: &str = "ip_service_categories_exclude";
const SET_USAGE_AS_EXEMPT_LIST: &str = "set_usage_as_exempt_list";
const SYSTEM: &str = "system";

const IP: &str = "IP";
const DYNAMIC: &str = "DYNAMIC";
const DYNAMIC_V2: &str = "DYNAMIC_V2";
const BLOCKLIST: &str = "BLOCKLIST";

/// Built-in zone whose writes go through the arbiter.
pub const DEFAULT_ENHANCED_DYNAMIC_ZONE: &str = "DefaultEnhancedDynamicZone";

/// Attributes each variant accepts beyond the common ones.
fn variant_attributes(kind: &str) -> &'static [&'static str] {
    match kind {
        IP => &[GATEWAYS, PROXIES, SET_USAGE_AS_EXEMPT_LIST],
        DYNAMIC => &[DYNAMIC_LOCATIONS, DYNAMIC_PROXY_TYPE, ASNS],
        DYNAMIC_V2 => &[
            DYNAMIC_LOCATIONS,
            DYNAMIC_LOCATIONS_EXCLUDE,
            IP_SERVICE_CATEGORIES_INCLUDE,
            IP_SERVICE_CATEGORIES_EXCLUDE,
            ASNS,
        ],
        _ => &[],
    }
}

const VARIANT_SPECIFIC: &[&str] = &[
    GATEWAYS,
    PROXIES,
    SET_USAGE_AS_EXEMPT_LIST,
    DYNAMIC_LOCATIONS,
    DYNAMIC_LOCATIONS_EXCLUDE,
    DYNAMIC_PROXY_TYPE,
    ASNS,
    IP_SERVICE_CATEGORIES_INCLUDE,
    IP_SERVICE_CATEGORIES_EXCLUDE,
];

pub struct NetworkZoneResource {
    schema: Schema,
}

impl NetworkZoneResource {
    pub fn new() -> Self {
        let set = || Attribute::optional(AttrType::string_set());
        let schema = Schema::new()
            .attr(NAME, Attribute::required(AttrType::String))
            .attr(
                TYPE,
                Attribute::required(AttrType::String)
                    .force_new()
                    .one_of(&[IP, DYNAMIC, DYNAMIC_V2]),
            )
            .attr(STATUS, binary_status())
            .attr(
                USAGE,
                Attribute::optional(AttrType::String)
                    .with_default("POLICY")
                    .one_of(&["POLICY", BLOCKLIST]),
            )
            .attr(GATEWAYS, set().describe("CIDR blocks or a-b ranges"))
            .attr(PROXIES, set().describe("CIDR blocks or a-b ranges"))
            .attr(DYNAMIC_LOCATIONS, set().describe("ISO country or country-region codes"))
            .attr(DYNAMIC_LOCATIONS_EXCLUDE, set())
            .attr(
                DYNAMIC_PROXY_TYPE,
                Attribute::optional(AttrType::String)
                    .one_of(&["ANY", "TorAnonymizer", "NotTorAnonymizer"]),
            )
            .attr(ASNS, set())
            .attr(IP_SERVICE_CATEGORIES_INCLUDE, set())
            .attr(IP_SERVICE_CATEGORIES_EXCLUDE, set())
            .attr(
                SET_USAGE_AS_EXEMPT_LIST,
                Attribute::optional(AttrType::Bool)
                    .describe("Mark an IP zone as the org's exempt list"),
            )
            .attr(SYSTEM, Attribute::computed(AttrType::Bool));
        Self { schema }
    }

    /// Declaration to wire variant.
    fn wire(&self, desired: &ResourceData) -> Result<NetworkZone, ProvisionerError> {
        let common = ZoneCommon {
            id: None,
            name: desired.require_str(NAME)?.to_string(),
            status: None,
            usage: desired.get_str(USAGE).map(String::from),
            system: None,
        };
        let strings = |key| desired.get_string_set(key).into_iter().collect::<Vec<_>>();
        let locations = |key| {
            desired
                .get_string_set(key)
                .iter()
                .map(|code| Location::parse(code))
                .collect::<Vec<_>>()
        };
        let addresses = |key| {
            desired
                .get_string_set(key)
                .iter()
                .map(|v| AddressEntry::parse(v))
                .collect::<Vec<_>>()
        };

        match desired.require_str(TYPE)? {
            IP => Ok(NetworkZone::Ip(IpZone {
                common,
                gateways: addresses(GATEWAYS),
                proxies: addresses(PROXIES),
            })),
            DYNAMIC => Ok(NetworkZone::Dynamic(DynamicZone {
                common,
                locations: locations(DYNAMIC_LOCATIONS),
                proxy_type: desired.get_str(DYNAMIC_PROXY_TYPE).map(String::from),
                asns: strings(ASNS),
            })),
            DYNAMIC_V2 => Ok(NetworkZone::DynamicV2(EnhancedDynamicZone {
                common,
                locations: IncludeExclude::non_empty(
                    locations(DYNAMIC_LOCATIONS),
                    locations(DYNAMIC_LOCATIONS_EXCLUDE),
                ),
                ip_service_categories: IncludeExclude::non_empty(
                    strings(IP_SERVICE_CATEGORIES_INCLUDE),
                    strings(IP_SERVICE_CATEGORIES_EXCLUDE),
                ),
                asns: IncludeExclude::non_empty(strings(ASNS), Vec::new()),
            })),
            other => Err(ProvisionerError::PreconditionViolated(format!(
                "unsupported zone type \"{other}\""
            ))),
        }
    }

    /// Wire variant to state. Only the variant's own attributes are set.
    fn observed(&self, zone: &NetworkZone, prior: &ResourceData) -> ResourceData {
        let common = zone.common();
        let mut data = ResourceData::new();
        if let Some(id) = &common.id {
            data.set_id(id.clone());
        }
        data.set(NAME, common.name.clone());
        data.set(TYPE, zone.kind());
        data.set_opt(STATUS, common.status.map(|s| s.as_str()));
        data.set_opt(USAGE, common.usage.clone());
        data.set(SYSTEM, common.system.unwrap_or(false));

        let set_nonempty = |data: &mut ResourceData, key: &str, values: Vec<String>| {
            if !values.is_empty() {
                data.set_strings(key, values);
            }
        };
        let codes = |locations: &[Location]| locations.iter().map(Location::code).collect::<Vec<_>>();

        match zone {
            NetworkZone::Ip(z) => {
                let values = |entries: &[AddressEntry]| {
                    entries.iter().map(|e| e.value.clone()).collect::<Vec<_>>()
                };
                set_nonempty(&mut data, GATEWAYS, values(&z.gateways));
                set_nonempty(&mut data, PROXIES, values(&z.proxies));
                data.carry_over(prior, &[SET_USAGE_AS_EXEMPT_LIST]);
            }
            NetworkZone::Dynamic(z) => {
                set_nonempty(&mut data, DYNAMIC_LOCATIONS, codes(&z.locations));
                data.set_opt(DYNAMIC_PROXY_TYPE, z.proxy_type.clone());
                set_nonempty(&mut data, ASNS, z.asns.clone());
            }
            NetworkZone::DynamicV2(z) => {
                if let Some(locations) = &z.locations {
                    set_nonempty(&mut data, DYNAMIC_LOCATIONS, codes(&locations.include));
                    set_nonempty(&mut data, DYNAMIC_LOCATIONS_EXCLUDE, codes(&locations.exclude));
                }
                if let Some(categories) = &z.ip_service_categories {
                    set_nonempty(&mut data, IP_SERVICE_CATEGORIES_INCLUDE, categories.include.clone());
                    set_nonempty(&mut data, IP_SERVICE_CATEGORIES_EXCLUDE, categories.exclude.clone());
                }
                if let Some(asns) = &z.asns {
                    set_nonempty(&mut data, ASNS, asns.include.clone());
                }
            }
        }
        data
    }

    fn write_request(&self, request: ApiRequest, desired: &ResourceData) -> Result<ApiRequest, ProvisionerError> {
        let request = request.body(serde_json::to_value(self.wire(desired)?)?);
        Ok(match desired.get_bool(SET_USAGE_AS_EXEMPT_LIST) {
            Some(true) => request.query("useAsExemptList", true),
            _ => request,
        })
    }
}

impl Default for NetworkZoneResource {
    fn default() -> Self {
        Self::new()
    }
}

fn lifecycle(id: &str) -> impl Fn(Transition) -> ApiRequest + Send + Sync + '_ {
    move |t| ApiRequest::post(api_paths::zone_lifecycle(id, t.as_str()))
}

/// Arbiter key for zones that only accept one writer.
fn serialized_key(data: &ResourceData) -> Option<String> {
    (data.get_str(NAME) == Some(DEFAULT_ENHANCED_DYNAMIC_ZONE))
        .then(|| arbiter::parent_key("zone", DEFAULT_ENHANCED_DYNAMIC_ZONE))
}

impl Resource for NetworkZoneResource {
    fn type_name(&self) -> &'static str {
        "okta_network_zone"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        let kind = desired.get_str(TYPE).unwrap_or_default();
        let allowed = variant_attributes(kind);
        for key in VARIANT_SPECIFIC {
            if desired.has(key) && !allowed.contains(key) {
                return Err(ProvisionerError::PreconditionViolated(format!(
                    "\"{key}\" is not valid for {kind} zones"
                )));
            }
        }

        let has_any = |keys: &[&str]| keys.iter().any(|k| !desired.get_list(k).is_empty());
        match kind {
            IP => {
                if !has_any(&[GATEWAYS, PROXIES]) {
                    return Err(ProvisionerError::PreconditionViolated(
                        "IP zones require gateways or proxies".into(),
                    ));
                }
                if desired.get_str(USAGE) == Some(BLOCKLIST) && desired.has(PROXIES) {
                    return Err(ProvisionerError::PreconditionViolated(
                        "proxies are not allowed on a BLOCKLIST zone".into(),
                    ));
                }
            }
            DYNAMIC => {
                if !has_any(&[DYNAMIC_LOCATIONS]) || !desired.has(DYNAMIC_PROXY_TYPE) {
                    return Err(ProvisionerError::PreconditionViolated(
                        "DYNAMIC zones require dynamic_locations and dynamic_proxy_type".into(),
                    ));
                }
            }
            DYNAMIC_V2 => {
                if !has_any(&[
                    DYNAMIC_LOCATIONS,
                    DYNAMIC_LOCATIONS_EXCLUDE,
                    IP_SERVICE_CATEGORIES_INCLUDE,
                    IP_SERVICE_CATEGORIES_EXCLUDE,
                    ASNS,
                ]) {
                    return Err(ProvisionerError::PreconditionViolated(
                        "DYNAMIC_V2 zones require a location, IP service category or ASN".into(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let create = async move {
                let request = self.write_request(ApiRequest::post(api_paths::ZONES), desired)?;
                let created: NetworkZone = ctx.send_json(request).await?;
                let mut observed = self.observed(&created, desired);
                let id = observed.require_id()?.to_string();
                tracing::info!(zone_id = %id, kind = created.kind(), "network zone created");

                if status_of(desired, LifecycleStatus::Active)? == LifecycleStatus::Inactive
                    && observed.get_str(STATUS) != Some(LifecycleStatus::Inactive.as_str())
                {
                    ctx.send(lifecycle(&id)(Transition::Deactivate))
                        .await
                        .map_err(|e| e.prefixed("deactivate"))?;
                    observed.set(STATUS, LifecycleStatus::Inactive.as_str());
                }
                Ok::<_, ProvisionerError>(observed)
            };
            match serialized_key(desired) {
                Some(key) => ctx.serialized(&key, create).await,
                None => create.await,
            }
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let found: Option<NetworkZone> = ctx.get_opt(&api_paths::zone(state.require_id()?)).await?;
            Ok(found.map(|z| self.observed(&z, state)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let id = prior.require_id()?;
            let update = update_binary(ctx, &self.schema, desired, prior, lifecycle(id), || async move {
                let request = self.write_request(ApiRequest::put(api_paths::zone(id)), desired)?;
                let updated: NetworkZone = ctx.send_json(request).await?;
                Ok::<_, ProvisionerError>(self.observed(&updated, desired))
            });
            let mut observed = match serialized_key(prior) {
                Some(key) => ctx.serialized(&key, update).await?,
                None => update.await?,
            };
            observed.carry_over(prior, &[SYSTEM]);
            Ok(observed)
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let id = state.require_id()?;
            if state.get_bool(SYSTEM) == Some(true) {
                tracing::info!(zone_id = %id, "system zone cannot be deleted, dropping from state only");
                return Ok(());
            }
            if status_of(state, LifecycleStatus::Active)? == LifecycleStatus::Active {
                match ctx.send(lifecycle(id)(Transition::Deactivate)).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return Err(e.prefixed("deactivate")),
                }
            }
            ctx.delete(&api_paths::zone(id)).await?;
            tracing::info!(zone_id = %id, "network zone deleted");
            Ok(())
        })
    }
}
