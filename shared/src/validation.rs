//! Input normalisation and validation helpers

use validator::ValidationErrors;

/// Canonical form of an email address used for lookups and uniqueness
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Pick a single, deterministic field error out of a validation failure
///
/// Returns `(field, message)` with the field name in camelCase so it matches
/// the request body the client sent.
pub fn first_field_error(errors: &ValidationErrors) -> (String, String) {
    let mut fields: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({})", err.code));
                (to_camel_case(&field.to_string()), message)
            })
        })
        .collect();
    fields.sort();
    fields
        .into_iter()
        .next()
        .unwrap_or_else(|| ("body".to_string(), "Invalid request".to_string()))
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
