//! Wire types shared by several resources.

use serde::{Deserialize, Deserializer, Serialize};

/// Uploaded image as stored by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

/// Accepts `"Y"`/`"N"` strings as well as JSON booleans.
pub(crate) fn flag_from_wire<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => value,
        Some(Flag::Text(text)) => matches!(text.trim(), "Y" | "y" | "true" | "1"),
        None => false,
    })
}

/// Accepts strings or numbers (pin codes and phone numbers arrive as either).
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Text>::deserialize(deserializer)? {
        Some(Text::Text(text)) => text,
        Some(Text::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

/// Renders a flag the way the API's form endpoints expect it.
pub(crate) fn flag_to_wire(value: bool) -> &'static str {
    if value { "Y" } else { "N" }
}
