//! Customer record accepted by the prediction endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One customer, as posted to `/predict`.
///
/// Every field is optional at the wire level so that coercion (not
/// deserialization) decides what is fatal: a bad `TotalCharges` or a
/// missing categorical field is tolerated, an unusable `tenure` is not.
/// Fields that may arrive either as strings or as numbers are kept as raw
/// JSON values and coerced by the record normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerRecord {
    /// "Yes"/"No" string or an already-encoded 0/1 integer
    #[serde(rename = "SeniorCitizen", default, skip_serializing_if = "Option::is_none")]
    pub senior_citizen: Option<Value>,

    /// Monthly charge amount
    #[serde(rename = "MonthlyCharges", default, skip_serializing_if = "Option::is_none")]
    pub monthly_charges: Option<f64>,

    /// Total charges to date; invalid values are coerced to 0.0
    #[serde(rename = "TotalCharges", default, skip_serializing_if = "Option::is_none")]
    pub total_charges: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,

    #[serde(rename = "Partner", default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<Value>,

    #[serde(rename = "Dependents", default, skip_serializing_if = "Option::is_none")]
    pub dependents: Option<Value>,

    #[serde(rename = "PhoneService", default, skip_serializing_if = "Option::is_none")]
    pub phone_service: Option<Value>,

    #[serde(rename = "MultipleLines", default, skip_serializing_if = "Option::is_none")]
    pub multiple_lines: Option<Value>,

    #[serde(rename = "InternetService", default, skip_serializing_if = "Option::is_none")]
    pub internet_service: Option<Value>,

    #[serde(rename = "OnlineSecurity", default, skip_serializing_if = "Option::is_none")]
    pub online_security: Option<Value>,

    #[serde(rename = "OnlineBackup", default, skip_serializing_if = "Option::is_none")]
    pub online_backup: Option<Value>,

    #[serde(rename = "DeviceProtection", default, skip_serializing_if = "Option::is_none")]
    pub device_protection: Option<Value>,

    #[serde(rename = "TechSupport", default, skip_serializing_if = "Option::is_none")]
    pub tech_support: Option<Value>,

    #[serde(rename = "StreamingTV", default, skip_serializing_if = "Option::is_none")]
    pub streaming_tv: Option<Value>,

    #[serde(rename = "StreamingMovies", default, skip_serializing_if = "Option::is_none")]
    pub streaming_movies: Option<Value>,

    #[serde(rename = "Contract", default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Value>,

    #[serde(rename = "PaperlessBilling", default, skip_serializing_if = "Option::is_none")]
    pub paperless_billing: Option<Value>,

    #[serde(rename = "PaymentMethod", default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<Value>,

    /// Tenure in whole months; must be convertible to an integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure: Option<Value>,
}

impl CustomerRecord {
    /// Look up a string-valued field by its wire name.
    ///
    /// `SeniorCitizen` and the numeric fields are not served here; they
    /// have dedicated coercions.
    pub fn categorical(&self, field: &str) -> Option<&Value> {
        let value = match field {
            "gender" => &self.gender,
            "Partner" => &self.partner,
            "Dependents" => &self.dependents,
            "PhoneService" => &self.phone_service,
            "MultipleLines" => &self.multiple_lines,
            "InternetService" => &self.internet_service,
            "OnlineSecurity" => &self.online_security,
            "OnlineBackup" => &self.online_backup,
            "DeviceProtection" => &self.device_protection,
            "TechSupport" => &self.tech_support,
            "StreamingTV" => &self.streaming_tv,
            "StreamingMovies" => &self.streaming_movies,
            "Contract" => &self.contract,
            "PaperlessBilling" => &self.paperless_billing,
            "PaymentMethod" => &self.payment_method,
            _ => return None,
        };
        value.as_ref().filter(|v| !v.is_null())
    }

    /// A fully populated record, handy for tests and the load generator
    pub fn sample() -> Self {
        let text = |s: &str| Some(Value::String(s.to_string()));
        Self {
            senior_citizen: text("No"),
            monthly_charges: Some(70.35),
            total_charges: Some(Value::from(1397.47)),
            gender: text("Female"),
            partner: text("Yes"),
            dependents: text("No"),
            phone_service: text("Yes"),
            multiple_lines: text("No"),
            internet_service: text("Fiber optic"),
            online_security: text("No"),
            online_backup: text("Yes"),
            device_protection: text("No"),
            tech_support: text("No"),
            streaming_tv: text("Yes"),
            streaming_movies: text("No"),
            contract: text("Month-to-month"),
            paperless_billing: text("Yes"),
            payment_method: text("Electronic check"),
            tenure: Some(Value::from(20)),
        }
    }
}
