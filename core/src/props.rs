//! Instantiation properties read from host markup.
//!
//! A host element carries properties in two places:
//!
//! ```html
//! <div class="price-widget" data-prop-currency="EUR" data-prop-discount-percent="15">
//!     <script type="text/props">{ "items": [1, 2, 3], "currency": "USD" }</script>
//! </div>
//! ```
//!
//! Attributes with the [`PROP_PREFIX`] become one property each, embedded data blocks
//! are merged as whole documents. Attributes beat data blocks, data blocks beat the
//! caller's defaults. The example above collects
//! `{ "currency": "EUR", "discountPercent": 15, "items": [1, 2, 3] }`.

use serde_json::{Map, Number, Value};

use crate::platform::Platform;

/// Properties a widget is instantiated with.
pub type Props = Map<String, Value>;

/// Attribute prefix marking an attribute as a property.
pub const PROP_PREFIX: &str = "data-prop-";

/// `type` attribute values recognised on embedded data blocks.
pub const DATA_BLOCK_TYPES: [&str; 2] = ["text/props", "application/json"];

/// Converts a hyphenated name into its single-hump form.
///
/// Input without hyphens is returned unchanged, so the conversion is idempotent.
///
/// ```
/// use waterui_embed_core::props::to_camel_case;
///
/// assert_eq!(to_camel_case("discount-percent"), "discountPercent");
/// assert_eq!(to_camel_case("discountPercent"), "discountPercent");
/// ```
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Converts a single-hump name back into its hyphenated attribute form.
#[must_use]
pub fn to_kebab_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_uppercase() {
            result.push('-');
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Coerces a raw attribute value into a typed property value.
///
/// Rules apply in order and the first match wins: `true`/`false`, `null`, a
/// non-empty value that is entirely a number, a JSON object or array, and finally
/// the raw string.
#[must_use]
pub fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Some(number) = parse_number(raw) {
        return Value::Number(number);
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(raw.to_owned()),
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    if raw.is_empty() || raw.trim() != raw {
        return None;
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Some(Number::from(integer));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|float| float.is_finite())
        .and_then(Number::from_f64)
}

/// Shallow-merges `source` into `target`; keys in `source` win.
pub fn merge(target: &mut Props, source: Props) {
    for (key, value) in source {
        target.insert(key, value);
    }
}

/// Returns `true` if `element` is an embedded data block.
pub fn is_data_block<P: Platform>(platform: &P, element: &P::Element) -> bool {
    platform.tag_name(element) == "script"
        && platform
            .attribute(element, "type")
            .is_some_and(|kind| DATA_BLOCK_TYPES.contains(&kind.trim()))
}

/// Collects the properties of `host`, merged over `defaults`.
///
/// Malformed data blocks are skipped with a warning; the remaining blocks and all
/// attributes still apply.
pub fn collect<P: Platform>(platform: &P, host: &P::Element, defaults: &Props) -> Props {
    let mut props = defaults.clone();

    for block in platform
        .children(host)
        .into_iter()
        .filter(|child| is_data_block(platform, child))
    {
        let text = platform.text_content(&block);
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(data)) => merge(&mut props, data),
            Ok(other) => {
                tracing::warn!(
                    ?host,
                    "Ignoring props block whose content is not an object: {other}"
                );
            }
            Err(e) => {
                tracing::warn!(?host, "Ignoring malformed props block: {e}");
            }
        }
    }

    for (name, value) in platform.attributes(host) {
        let Some(rest) = name.strip_prefix(PROP_PREFIX) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        props.insert(to_camel_case(rest), coerce(&value));
    }

    props
}
