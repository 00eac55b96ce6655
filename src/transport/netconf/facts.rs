//! Device facts gathered over an established NETCONF session.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::parser;
use super::session::RpcChannel;
use crate::facts::FactsRecord;

const GET_SOFTWARE_INFORMATION: &str = "<get-software-information/>";
const GET_CHASSIS_INVENTORY: &str = "<get-chassis-inventory/>";
const GET_ROUTE_ENGINE_INFORMATION: &str = "<get-route-engine-information/>";
const GET_DOMAIN_NAME: &str = r#"<get-configuration database="committed"><configuration><system><domain-name/></system></configuration></get-configuration>"#;

/// Run the fact RPCs and assemble the record.
pub fn gather_facts(channel: &mut dyn RpcChannel) -> Result<FactsRecord> {
    let software = channel.rpc(GET_SOFTWARE_INFORMATION)?;
    // Multi-RE replies repeat software-information per RE; the first is the local RE.
    let software = parser::elements(&software, "software-information")
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no software-information in reply"))?
        .to_string();

    let chassis = channel.rpc(GET_CHASSIS_INVENTORY)?;

    let route_engines = match channel.rpc(GET_ROUTE_ENGINE_INFORMATION) {
        Ok(reply) => route_engines(&reply),
        Err(e) => {
            debug!("Route engine information unavailable, assuming one RE: {:#}", e);
            Vec::new()
        }
    };

    let domain = match channel.rpc(GET_DOMAIN_NAME) {
        Ok(reply) => parser::text(&reply, "domain-name").filter(|d| !d.is_empty()),
        Err(e) => {
            warn!("Could not read domain-name: {:#}", e);
            None
        }
    };

    let hostname = parser::text(&software, "host-name");
    let model = parser::text(&software, "product-model")
        .or_else(|| chassis_text(&chassis, "description"))
        .map(|m| m.to_uppercase());
    let version = junos_version(&software);
    let serialnumber = chassis_text(&chassis, "serial-number");
    let personality = model.as_deref().map(personality).unwrap_or("UNKNOWN");

    let fqdn = match (&hostname, &domain) {
        (Some(h), Some(d)) => Some(format!("{}.{}", h, d)),
        (Some(h), None) => Some(h.clone()),
        _ => None,
    };

    let mut facts = FactsRecord::new();
    facts.insert("hostname".to_string(), json!(hostname));
    facts.insert("domain".to_string(), json!(domain));
    facts.insert("fqdn".to_string(), json!(fqdn));
    facts.insert("model".to_string(), json!(model));
    facts.insert("serialnumber".to_string(), json!(serialnumber));
    facts.insert("version".to_string(), json!(version));
    facts.insert(
        "version_info".to_string(),
        version.as_deref().map(version_info).unwrap_or(Value::Null),
    );
    facts.insert("personality".to_string(), json!(personality));
    facts.insert("switch_style".to_string(), json!(switch_style(personality, model.as_deref())));

    let dual_re = route_engines.len() > 1;
    facts.insert("2RE".to_string(), json!(dual_re));
    facts.insert("master".to_string(), json!(master_re(&route_engines)));
    for slot in ["0", "1"] {
        let re = route_engines
            .iter()
            .find(|re| re.slot == slot)
            .map(RouteEngine::to_value)
            .unwrap_or(Value::Null);
        facts.insert(format!("RE{}", slot), re);
    }

    Ok(facts)
}

/// Text of the chassis-level element, ignoring modules nested below it.
fn chassis_text(inventory: &str, tag: &str) -> Option<String> {
    let chassis = parser::elements(inventory, "chassis").into_iter().next()?;
    // Chassis-level fields precede the first chassis-module.
    let own = chassis.split("<chassis-module").next().unwrap_or(chassis);
    parser::text(own, tag).filter(|s| !s.is_empty())
}

/// `junos-version` when present, otherwise the bracketed release in the
/// Junos package comment.
fn junos_version(software: &str) -> Option<String> {
    if let Some(v) = parser::text(software, "junos-version").filter(|v| !v.is_empty()) {
        return Some(v);
    }

    let packages = parser::elements(software, "package-information");
    let comment = packages
        .iter()
        .find(|p| parser::text(p, "name").as_deref() == Some("junos"))
        .and_then(|p| parser::text(p, "comment"))
        .or_else(|| {
            parser::all_text(software, "comment")
                .into_iter()
                .find(|c| c.contains("JUNOS"))
        })?;

    let start = comment.find('[')? + 1;
    let end = start + comment[start..].find(']')?;
    Some(comment[start..end].to_string())
}

/// Split a release string such as `15.1R7.9` or `12.3X48-D10.4`.
pub fn version_info(version: &str) -> Value {
    let parse = || -> Option<Value> {
        let (first, rest) = version.split_once('.')?;
        let major1: u32 = first.parse().ok()?;

        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let major2: u32 = rest[..digits].parse().ok()?;
        let rest = &rest[digits..];

        let alpha = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let kind = &rest[..alpha];
        let rest = &rest[alpha..];

        let (minor, build) = match rest.rsplit_once('.') {
            Some((minor, build)) => (minor, build.parse::<u32>().ok()),
            None => (rest, None),
        };

        let kind = Some(kind).filter(|k| !k.is_empty());
        let minor = Some(minor).filter(|m| !m.is_empty());
        Some(json!({
            "major": [major1, major2],
            "type": kind,
            "minor": minor,
            "build": build,
        }))
    };

    parse().unwrap_or_else(|| {
        warn!("Unrecognised version string: {}", version);
        json!({"major": null, "type": null, "minor": null, "build": null})
    })
}

/// Platform family from the (uppercased) model name.
pub fn personality(model: &str) -> &'static str {
    let model = model.to_uppercase();
    if model.starts_with("VSRX") {
        return "SRX_BRANCH";
    }
    if model.starts_with("SRX") {
        let series: String = model[3..].chars().take_while(|c| c.is_ascii_digit()).collect();
        return match series.len() {
            4 if matches!(series.as_bytes()[0], b'1' | b'3' | b'5') => "SRX_HIGHEND",
            _ => "SRX_BRANCH",
        };
    }
    if model.starts_with("OLIVE") {
        return "OLIVE";
    }
    if model.starts_with("EX") || model.starts_with("QFX") {
        return "SWITCH";
    }
    if model.starts_with("PTX") {
        return "PTX";
    }
    if model.starts_with("MX") || model.starts_with("VMX") {
        return "MX";
    }
    if model.starts_with('J') {
        return "SRX_BRANCH";
    }
    if model.starts_with('M') {
        return "M";
    }
    if model.starts_with('T') {
        return "T";
    }
    "UNKNOWN"
}

fn switch_style(personality: &str, model: Option<&str>) -> &'static str {
    match personality {
        "SWITCH" => "VLAN",
        "MX" => "BRIDGE_DOMAIN",
        "SRX_BRANCH" if model.is_some_and(|m| !m.starts_with('J')) => "VLAN",
        _ => "NONE",
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RouteEngine {
    slot: String,
    mastership_state: Option<String>,
    status: Option<String>,
    model: Option<String>,
    up_time: Option<String>,
}

impl RouteEngine {
    fn to_value(&self) -> Value {
        json!({
            "mastership_state": self.mastership_state,
            "status": self.status,
            "model": self.model,
            "up_time": self.up_time,
        })
    }
}

fn route_engines(reply: &str) -> Vec<RouteEngine> {
    parser::elements(reply, "route-engine")
        .into_iter()
        .map(|re| RouteEngine {
            // Single-RE platforms omit the slot.
            slot: parser::text(re, "slot").unwrap_or_else(|| "0".to_string()),
            mastership_state: parser::text(re, "mastership-state"),
            status: parser::text(re, "status"),
            model: parser::text(re, "model"),
            up_time: parser::text(re, "up-time"),
        })
        .collect()
}

fn master_re(route_engines: &[RouteEngine]) -> Option<String> {
    match route_engines {
        [] => Some("RE0".to_string()),
        [only] if only.mastership_state.is_none() => Some(format!("RE{}", only.slot)),
        _ => route_engines
            .iter()
            .find(|re| re.mastership_state.as_deref() == Some("master"))
            .map(|re| format!("RE{}", re.slot)),
    }
}
