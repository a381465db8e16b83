//! The structured output of the pipeline.

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::{Category, CategoryScore, Label};

/// A monetary amount, serialized as `[amount, "ISO currency code"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount(pub f64, pub String);

/// What a commercial email is selling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialInfo {
    pub product: String,
    /// Unique selling proposition.
    pub usp: String,
}

/// One purchased line of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub label: String,
    pub price: Amount,
}

/// Totals and items of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillInfo {
    pub total: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bought: Option<Vec<BillItem>>,
}

/// Summary of the latest message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub summary: String,
}

/// Category-specific fields, serialized under the category's own key.
///
/// The schema-conforming answer is kept as the backend returned it, so fields
/// beyond the typed views survive into the output unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Details {
    category: Category,
    value: Value,
}

impl Details {
    /// Wrap a schema-validated extraction answer, checking that it fits the
    /// typed view of `category`.
    pub fn from_value(category: Category, value: Value) -> serde_json::Result<Self> {
        match category {
            Category::Commercial => CommercialInfo::deserialize(&value).map(drop)?,
            Category::Bill => BillInfo::deserialize(&value).map(drop)?,
            Category::Conversation => ConversationInfo::deserialize(&value).map(drop)?,
        }
        Ok(Self { category, value })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// The answer exactly as validated.
    pub fn value(&self) -> &Value {
        &self.value
    }

    fn view<T: DeserializeOwned>(&self, category: Category) -> Option<T> {
        if self.category != category {
            return None;
        }
        T::deserialize(&self.value).ok()
    }
}

impl Serialize for Details {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.category.as_str(), &self.value)?;
        map.end()
    }
}

/// The classification part of a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailType {
    pub chosen: Label,
    pub proba: CategoryScore,
}

/// Final output: `{email_type: {chosen, proba}, <category>: <details>}`.
///
/// The category key is absent when the chosen label has no dedicated
/// extraction or when that extraction produced no valid answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub email_type: EmailType,
    #[serde(flatten)]
    pub details: Option<Details>,
}

impl ExtractionResult {
    pub fn chosen(&self) -> &Label {
        &self.email_type.chosen
    }

    pub fn bill(&self) -> Option<BillInfo> {
        self.details.as_ref()?.view(Category::Bill)
    }

    pub fn commercial(&self) -> Option<CommercialInfo> {
        self.details.as_ref()?.view(Category::Commercial)
    }

    pub fn conversation(&self) -> Option<ConversationInfo> {
        self.details.as_ref()?.view(Category::Conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn email_type(chosen: Category) -> EmailType {
        EmailType {
            chosen: Label::Known(chosen),
            proba: CategoryScore::from_value(&json!({
                "commercial": 0, "bill": 1, "conversation": 0
            }))
            .unwrap(),
        }
    }

    #[test]
    fn test_bill_details_from_value() {
        let details = Details::from_value(
            Category::Bill,
            json!({"total": [10, "EUR"], "bought": [{"label": "Widget", "price": [10.0, "EUR"]}]}),
        )
        .unwrap();
        assert_eq!(details.category(), Category::Bill);
        let bill: BillInfo = details.view(Category::Bill).unwrap();
        assert_eq!(bill.total, Amount(10.0, "EUR".into()));
        assert_eq!(bill.bought.unwrap()[0].label, "Widget");
        assert!(details.view::<ConversationInfo>(Category::Conversation).is_none());
    }

    #[test]
    fn test_details_shape_mismatch() {
        assert!(Details::from_value(Category::Conversation, json!({"product": "x"})).is_err());
    }

    #[test]
    fn test_serialize_with_details() {
        let result = ExtractionResult {
            email_type: email_type(Category::Bill),
            details: Some(Details::from_value(Category::Bill, json!({"total": [10.0, "EUR"]})).unwrap()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "email_type": {
                    "chosen": "bill",
                    "proba": {"commercial": 0.0, "bill": 1.0, "conversation": 0.0}
                },
                "bill": {"total": [10.0, "EUR"]}
            })
        );
    }

    #[test]
    fn test_extra_fields_and_integers_are_kept() {
        let answer = json!({
            "total": [10, "EUR"],
            "invoice_number": "123",
            "bought": [{"label": "Widget", "price": [10, "EUR"], "quantity": 1}]
        });
        let result = ExtractionResult {
            email_type: email_type(Category::Bill),
            details: Some(Details::from_value(Category::Bill, answer.clone()).unwrap()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["bill"], answer);
        assert_eq!(result.bill().unwrap().total, Amount(10.0, "EUR".into()));
    }

    #[test]
    fn test_serialize_without_details() {
        let result = ExtractionResult {
            email_type: email_type(Category::Commercial),
            details: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["email_type"]);
        assert!(result.commercial().is_none());
    }
}
