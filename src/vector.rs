use crate::error::GsiError;

/// Position or direction in world units, `[x, y, z]`.
pub type Vec3 = [f64; 3];

const VECTOR_COMPONENTS: usize = 3;

/// Parses a comma separated vector string such as `"1.5, -2, 3"`.
///
/// The string must split into exactly three tokens and every token must be
/// numeric after trimming. Anything else is a [`GsiError::MalformedVector`];
/// a partial vector is never returned.
pub fn parse_vector(field: &'static str, raw: &str) -> Result<Vec3, GsiError> {
    let tokens = raw.split(',').map(str::trim).collect::<Vec<&str>>();
    if tokens.len() != VECTOR_COMPONENTS {
        return Err(malformed(
            field,
            raw,
            format!("expected {VECTOR_COMPONENTS} components, found {}", tokens.len()),
        ));
    }

    let mut parsed = [0.0; VECTOR_COMPONENTS];
    for (slot, token) in parsed.iter_mut().zip(tokens) {
        *slot = token
            .parse::<f64>()
            .map_err(|error| malformed(field, raw, format!("component {token:?}: {error}")))?;
    }

    Ok(parsed)
}

/// Same as [`parse_vector`] but treats a missing string as malformed.
pub(crate) fn parse_required_vector(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Vec3, GsiError> {
    match raw {
        Some(value) => parse_vector(field, value),
        None => Err(malformed(field, "", "vector string is missing".to_string())),
    }
}

fn malformed(field: &'static str, raw: &str, reason: String) -> GsiError {
    GsiError::MalformedVector {
        field,
        value: raw.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_required_vector, parse_vector};

    #[test]
    fn parses_spaced_vector_string() {
        let parsed = parse_vector("position", "1.5, -2, 3").expect("Expected vector to parse");
        assert_eq!(parsed, [1.5, -2.0, 3.0]);
    }

    #[test]
    fn parses_vector_without_spaces() {
        let parsed = parse_vector("forward", "-0.25,0.97,0").expect("Expected vector to parse");
        assert_eq!(parsed, [-0.25, 0.97, 0.0]);
    }

    #[test]
    fn rejects_two_component_vector() {
        let error = parse_vector("position", "1, 2").expect_err("Two tokens must be rejected");
        assert!(error.is_malformed_vector());
        assert!(error.to_string().contains("found 2"));
    }

    #[test]
    fn rejects_four_component_vector() {
        let error = parse_vector("position", "1, 2, 3, 4").expect_err("Four tokens must be rejected");
        assert!(error.is_malformed_vector());
    }

    #[test]
    fn rejects_non_numeric_component() {
        let error = parse_vector("forward", "1, north, 3").expect_err("Text token must be rejected");
        assert!(error.to_string().contains("north"));
    }

    #[test]
    fn rejects_empty_component() {
        assert!(parse_vector("position", "1, , 3").is_err());
    }

    #[test]
    fn missing_vector_is_malformed() {
        let error = parse_required_vector("position", None).expect_err("Missing vector must fail");
        assert!(error.is_malformed_vector());
    }
}
