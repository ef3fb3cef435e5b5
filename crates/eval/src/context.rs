//! Request context supplied by the caller and the merged evaluation
//! context conditions read from.
//!
//! The caller passes optional `time`, `request` and `device` groups. The
//! engine merges them with identity and resource attributes from the
//! policy set and with wall-clock defaults; any field the caller supplies
//! wins over a default.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use spl_core::symbols::NAMESPACES;
use spl_interchange::{ResourceDecl, UserDecl};
use std::collections::BTreeMap;
use time::OffsetDateTime;

// ── Caller input ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeContext {
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    /// Day of the month.
    pub day: Option<u8>,
    pub month: Option<u8>,
    pub year: Option<i32>,
    /// English day name, e.g. `Monday`.
    pub weekday: Option<String>,
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceContext {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub trusted: Option<bool>,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub location: Option<String>,
    pub id: Option<String>,
}

/// Everything a caller may supply with an access check. Every group and
/// every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessContext {
    pub time: TimeContext,
    pub request: RequestContext,
    pub device: DeviceContext,
}

impl AccessContext {
    pub fn from_json(v: &serde_json::Value) -> Result<Self, serde_json::Error> {
        AccessContext::deserialize(v)
    }
}

// ── Merged context ──────────────────────────────────────────────────

type Group = BTreeMap<String, Value>;

/// Attribute values visible to conditions, keyed by namespace then field.
///
/// Every built-in field is present (as `Null` when nothing supplies it);
/// a field missing from the map is unknown and fails the condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationContext {
    groups: BTreeMap<String, Group>,
}

impl EvaluationContext {
    pub fn get(&self, object: &str, field: &str) -> Option<&Value> {
        self.groups.get(object)?.get(field)
    }

    pub fn set(&mut self, object: &str, field: &str, value: impl Into<Value>) {
        self.groups
            .entry(object.to_owned())
            .or_default()
            .insert(field.to_owned(), value.into());
    }

    /// Merge identity, resource, caller context and clock into one context.
    pub fn build(
        user: &UserDecl,
        role: &str,
        resource: &ResourceDecl,
        ctx: &AccessContext,
        now: OffsetDateTime,
    ) -> Self {
        let mut out = EvaluationContext::default();
        for (object, fields) in NAMESPACES {
            for field in fields.iter() {
                out.set(object, field, Value::Null);
            }
        }

        for (key, values) in &user.properties {
            out.set("user", key, Value::from_property(values));
        }
        out.set("user", "name", user.name.as_str());
        out.set("user", "role", role);

        for (key, values) in &resource.properties {
            out.set("resource", key, Value::from_property(values));
        }
        out.set("resource", "name", resource.name.as_str());
        out.set("resource", "path", resource.path.clone());

        out.merge_time(&ctx.time, now);
        out.merge_request(&ctx.request);
        out.merge_device(&ctx.device);
        out
    }

    fn merge_time(&mut self, t: &TimeContext, now: OffsetDateTime) {
        let date = format!(
            "{:04}-{:02}-{:02}",
            now.year(),
            u8::from(now.month()),
            now.day()
        );
        self.set("time", "hour", Value::number(t.hour.unwrap_or(now.hour())));
        self.set("time", "minute", Value::number(t.minute.unwrap_or(now.minute())));
        self.set("time", "day", Value::number(t.day.unwrap_or(now.day())));
        self.set(
            "time",
            "month",
            Value::number(t.month.unwrap_or(u8::from(now.month()))),
        );
        self.set("time", "year", Value::number(t.year.unwrap_or(now.year())));
        self.set(
            "time",
            "weekday",
            t.weekday.clone().unwrap_or_else(|| now.weekday().to_string()),
        );
        self.set("time", "date", t.date.clone().unwrap_or(date));
    }

    fn merge_request(&mut self, r: &RequestContext) {
        self.set("request", "ip", r.ip.clone());
        self.set("request", "method", r.method.clone());
        self.set("request", "path", r.path.clone());
        self.set("request", "user_agent", r.user_agent.clone());
        let headers = r.headers.clone().unwrap_or_default();
        self.set(
            "request",
            "headers",
            serde_json::to_string(&headers).unwrap_or_else(|_| "{}".to_owned()),
        );
    }

    fn merge_device(&mut self, d: &DeviceContext) {
        self.set("device", "type", d.kind.clone());
        self.set("device", "trusted", d.trusted.unwrap_or(false));
        self.set("device", "os", d.os.clone());
        self.set("device", "browser", d.browser.clone());
        self.set("device", "location", d.location.clone());
        self.set("device", "id", d.id.clone());
    }
}
