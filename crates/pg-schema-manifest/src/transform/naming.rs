//! Identifier casing conversions used by both transformers.

/// `order_items` -> `OrderItems`.
///
/// Splits on underscores and capitalizes the first letter of each segment;
/// the rest of each segment is kept as is.
pub fn to_type_name(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect()
}

/// `order_items` -> `orderItems`.
pub fn to_field_name(identifier: &str) -> String {
    let type_name = to_type_name(identifier);
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `OrderItems` -> `order_items`.
///
/// Inserts an underscore before every uppercase letter, lowercases, and
/// drops a leading underscore.
pub fn to_snake_case(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    for c in identifier.chars() {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    match out.strip_prefix('_') {
        Some(rest) => rest.to_string(),
        None => out,
    }
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
