//! Admin Settings Schema
//!
//! A plain description of the surcharge settings page: one section per
//! enabled gateway, each with typed fields. Any admin front end can render it;
//! saving goes through [`save_settings`], which sanitizes and validates before
//! anything is written.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gateway::GatewayRegistry;
use crate::model::{FeeFormula, SurchargeConfig, fields, option_key};
use crate::store::OptionStore;

/// Field type, as understood by a settings renderer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Section heading
    Title,
    Text,
    Number { step: String },
    Select { options: Vec<String> },
    /// Closes the current section
    SectionEnd,
}

impl FieldKind {
    /// Whether the field holds a value
    pub const fn is_input(&self) -> bool {
        !matches!(self, Self::Title | Self::SectionEnd)
    }
}

/// One row of the settings page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsField {
    /// Option key for inputs, section id otherwise
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Gateway the field belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
}

impl SettingsField {
    fn section(id: String, label: String, gateway_id: Option<&str>) -> Self {
        Self {
            id,
            label,
            description: String::new(),
            kind: FieldKind::Title,
            gateway_id: gateway_id.map(String::from),
        }
    }

    fn section_end(id: String, gateway_id: Option<&str>) -> Self {
        Self {
            id,
            label: String::new(),
            description: String::new(),
            kind: FieldKind::SectionEnd,
            gateway_id: gateway_id.map(String::from),
        }
    }

    fn input(gateway_id: &str, field: &str, label: &str, description: &str, kind: FieldKind) -> Self {
        Self {
            id: option_key(gateway_id, field),
            label: label.into(),
            description: description.into(),
            kind,
            gateway_id: Some(gateway_id.into()),
        }
    }
}

/// Settings page for every enabled gateway
pub fn settings_schema(registry: &GatewayRegistry) -> Vec<SettingsField> {
    let mut schema = vec![SettingsField::section(
        "payment_surcharges_section_title".into(),
        "Payment Surcharges Settings".into(),
        None,
    )];

    let number = |step: &str| FieldKind::Number { step: step.into() };

    for gateway in registry.enabled() {
        let id = gateway.id.as_str();

        schema.push(SettingsField::section(
            format!("surcharge_{id}_section_title"),
            format!("{} Surcharge Settings", gateway.title),
            Some(id),
        ));
        schema.push(SettingsField::input(
            id,
            fields::FEE_NAME,
            "Fee Display Name",
            "Display name of fee or credit shown to customer at checkout. Defaults to \"Payment Method Surcharge\"",
            FieldKind::Text,
        ));
        schema.push(SettingsField::input(id, fields::FIXED_FEE, "Fixed Fee", "Fixed fee amount", number("0.01")));
        schema.push(SettingsField::input(
            id,
            fields::PERCENTAGE_FEE,
            "Percentage Fee",
            "Percentage fee (without % sign)",
            number("0.1"),
        ));
        schema.push(SettingsField::input(id, fields::MIN_FEE, "Minimum Fee", "Minimum fee amount", number("0.01")));
        schema.push(SettingsField::input(id, fields::MAX_FEE, "Maximum Fee", "Maximum fee amount", number("0.01")));
        schema.push(SettingsField::input(
            id,
            fields::FORMULA,
            "Fee Formula",
            "additive: percentage of the order plus fixed fee. gross_up: the fee also covers its own percentage cost.",
            FieldKind::Select {
                options: vec![
                    FeeFormula::Additive.to_string(),
                    FeeFormula::GrossUp.to_string(),
                ],
            },
        ));
        schema.push(SettingsField::section_end(format!("surcharge_{id}_section_end"), Some(id)));
    }

    schema.push(SettingsField::section_end("payment_surcharges_section_end".into(), None));
    schema
}

/// Sanitize a submitted value. Fee amounts and percentages become decimal
/// strings, everything else is treated as plain text.
pub fn sanitize_option(field_id: &str, raw: &str) -> String {
    if fields::NUMERIC.iter().any(|f| field_id.contains(f)) {
        format_decimal(raw)
    } else {
        sanitize_text(raw)
    }
}

/// Keep only digits, the decimal point and minus sign.
///
/// A comma is the decimal separator unless the value also has a point, in
/// which case commas are thousands separators.
fn format_decimal(raw: &str) -> String {
    let raw = raw.trim();
    let normalized = if raw.contains('.') {
        raw.replace(',', "")
    } else {
        raw.replace(',', ".")
    };

    normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Strip tags and control characters, collapse whitespace
pub fn sanitize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;

    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_whitespace() => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sanitize, validate and persist a submitted settings form.
///
/// `form` maps field ids to raw values. Unknown ids are ignored, blank
/// values unset the option. Every touched gateway is validated against the
/// resulting options first; on failure nothing is written. Returns the keys
/// that were written or removed.
pub fn save_settings(
    store: &dyn OptionStore,
    schema: &[SettingsField],
    form: &HashMap<String, String>,
) -> Result<Vec<String>> {
    let mut staged: BTreeMap<String, String> = BTreeMap::new();
    let mut touched: Vec<&str> = Vec::new();

    for field in schema.iter().filter(|f| f.kind.is_input()) {
        let Some(raw) = form.get(&field.id) else {
            continue;
        };
        staged.insert(field.id.clone(), sanitize_option(&field.id, raw));

        if let Some(gateway_id) = field.gateway_id.as_deref() {
            if !touched.contains(&gateway_id) {
                touched.push(gateway_id);
            }
        }
    }

    for key in form.keys().filter(|k| !staged.contains_key(*k)) {
        tracing::warn!(key = %key, "Ignoring unknown settings field");
    }

    let current = store.snapshot()?;
    for gateway_id in touched {
        let config = SurchargeConfig::from_lookup(gateway_id, |key| {
            staged.get(key).or_else(|| current.get(key)).cloned()
        })?;
        config.validate(gateway_id)?;
    }

    let mut changed = Vec::with_capacity(staged.len());
    for (key, value) in staged {
        if value.is_empty() {
            store.remove(&key)?;
        } else {
            store.set(&key, value)?;
        }
        changed.push(key);
    }

    tracing::info!(fields = changed.len(), "Saved surcharge settings");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurchargeError;
    use crate::gateway::PaymentGateway;
    use crate::store::MemoryOptionStore;

    fn registry() -> GatewayRegistry {
        [
            PaymentGateway::new("stripe", "Credit Card"),
            PaymentGateway::new("cod", "Cash on delivery").disabled(),
        ]
        .into_iter()
        .collect()
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_schema_covers_enabled_gateways() {
        let schema = settings_schema(&registry());

        // page title + (title, 6 inputs, end) + page end
        assert_eq!(schema.len(), 10);
        assert_eq!(schema[1].label, "Credit Card Surcharge Settings");
        assert!(schema.iter().all(|f| f.gateway_id.as_deref() != Some("cod")));

        let inputs: Vec<_> = schema
            .iter()
            .filter(|f| f.kind.is_input())
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(
            inputs,
            [
                "surcharge_stripe_fee_name",
                "surcharge_stripe_fixed_fee",
                "surcharge_stripe_percentage_fee",
                "surcharge_stripe_min_fee",
                "surcharge_stripe_max_fee",
                "surcharge_stripe_formula",
            ]
        );
    }

    #[test]
    fn test_schema_serializes_kind_inline() {
        let schema = settings_schema(&registry());
        let json = serde_json::to_value(&schema[3]).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["step"], "0.01");
        assert_eq!(json["id"], "surcharge_stripe_fixed_fee");
    }

    #[test]
    fn test_sanitize_numeric_fields() {
        assert_eq!(sanitize_option("surcharge_stripe_fixed_fee", " $0.30 "), "0.30");
        assert_eq!(sanitize_option("surcharge_stripe_percentage_fee", "2,9%"), "2.9");
        assert_eq!(sanitize_option("surcharge_stripe_max_fee", "1,250.00"), "1250.00");
        assert_eq!(sanitize_option("surcharge_stripe_min_fee", "abc"), "");
    }

    #[test]
    fn test_sanitize_text_fields() {
        assert_eq!(
            sanitize_option("surcharge_stripe_fee_name", "  Card <b>fee</b>\n\tapplies "),
            "Card fee applies"
        );
        assert_eq!(sanitize_text("<script>x</script>stripe"), "xstripe");
    }

    #[test]
    fn test_save_settings_writes_and_unsets() {
        let store = MemoryOptionStore::new();
        store.set("surcharge_stripe_min_fee", "1".into()).unwrap();
        let schema = settings_schema(&registry());

        let changed = save_settings(
            &store,
            &schema,
            &form(&[
                ("surcharge_stripe_fixed_fee", "0.30"),
                ("surcharge_stripe_percentage_fee", "2.9 %"),
                ("surcharge_stripe_min_fee", ""),
                ("unrelated_option", "x"),
            ]),
        )
        .unwrap();

        assert_eq!(changed.len(), 3);
        assert_eq!(store.get("surcharge_stripe_percentage_fee").unwrap().as_deref(), Some("2.9"));
        assert!(store.get("surcharge_stripe_min_fee").unwrap().is_none());
        assert!(store.get("unrelated_option").unwrap().is_none());
    }

    #[test]
    fn test_save_settings_rejects_crossed_bounds() {
        let store = MemoryOptionStore::new();
        store.set("surcharge_stripe_max_fee", "2".into()).unwrap();
        let schema = settings_schema(&registry());

        let err = save_settings(
            &store,
            &schema,
            &form(&[("surcharge_stripe_fixed_fee", "1"), ("surcharge_stripe_min_fee", "5")]),
        )
        .unwrap_err();

        assert!(matches!(err, SurchargeError::Invalid { .. }));
        assert!(store.get("surcharge_stripe_fixed_fee").unwrap().is_none());
    }

    #[test]
    fn test_save_settings_rejects_unknown_formula() {
        let store = MemoryOptionStore::new();
        let schema = settings_schema(&registry());

        let err = save_settings(&store, &schema, &form(&[("surcharge_stripe_formula", "tiered")]))
            .unwrap_err();
        assert!(matches!(err, SurchargeError::UnknownFormula(_)));
    }
}
