//! `%ENV[NAME]` environment interpolation.
//!
//! A single-pass scanner, not a regex: the validation rules (reject a
//! nested `%ENV[` inside a name, reject whitespace/control bytes in a name,
//! distinguish "no closing bracket" from "literal trailing `%`") need
//! precise control over how much input a match consumes that a
//! find-and-replace pass over capture groups does not give us.

use relay_core::PipelineError;

const OPEN: &str = "%ENV[";

/// Expands every `%ENV[NAME]` token in `input`, replacing it with the named
/// environment variable's value (or the empty string if unset). A bare `%`
/// not followed by `ENV[` is copied through literally, including at the very
/// end of input.
pub fn expand_env(input: &str) -> Result<String, PipelineError> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != b'%' {
                i += 1;
            }
            out.push_str(&input[start..i]);
            continue;
        }

        if input[i..].starts_with(OPEN) {
            let name_start = i + OPEN.len();
            let close = find_close(bytes, name_start)?;
            let name = &input[name_start..close];
            validate_name(name)?;
            out.push_str(&std::env::var(name).unwrap_or_default());
            i = close + 1;
        } else {
            out.push('%');
            i += 1;
        }
    }

    Ok(out)
}

fn find_close(bytes: &[u8], from: usize) -> Result<usize, PipelineError> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b']' {
            return Ok(j);
        }
        j += 1;
    }
    Err(PipelineError::MissingCloseDelim)
}

fn validate_name(name: &str) -> Result<(), PipelineError> {
    if name.contains(OPEN) {
        return Err(PipelineError::InvalidEnvChars(name.to_string()));
    }
    if name
        .bytes()
        .any(|b| matches!(b, b'\n' | b'\r' | b'\t' | b' '))
    {
        return Err(PipelineError::InvalidEnvChars(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_on_text_with_no_percent() {
        let text = "plain config text, nothing special here";
        assert_eq!(expand_env(text).unwrap(), text);
    }

    #[test]
    fn substitutes_set_variable() {
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::set_var("RELAY_TEST_HOST", "10.0.0.5") };
        let out = expand_env("addr = \"%ENV[RELAY_TEST_HOST]:9000\"").unwrap();
        assert_eq!(out, "addr = \"10.0.0.5:9000\"");
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::remove_var("RELAY_TEST_HOST") };
    }

    #[test]
    fn unset_variable_becomes_empty() {
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::remove_var("RELAY_TEST_DEFINITELY_UNSET") };
        let out = expand_env("x = \"%ENV[RELAY_TEST_DEFINITELY_UNSET]\"").unwrap();
        assert_eq!(out, "x = \"\"");
    }

    #[test]
    fn trailing_percent_is_literal() {
        assert_eq!(expand_env("100%").unwrap(), "100%");
    }

    #[test]
    fn trailing_partial_token_is_literal() {
        assert_eq!(expand_env("give me %E").unwrap(), "give me %E");
    }

    #[test]
    fn missing_close_delim_errors() {
        let err = expand_env("x = %ENV[UNCLOSED").unwrap_err();
        assert!(matches!(err, PipelineError::MissingCloseDelim));
    }

    #[test]
    fn whitespace_in_name_errors() {
        let err = expand_env("x = %ENV[A B]").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEnvChars(_)));
    }

    #[test]
    fn nested_open_token_errors() {
        let err = expand_env("x = %ENV[%ENV[A]]").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEnvChars(_)));
    }

    #[test]
    fn single_pass_does_not_rescan_substituted_text() {
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::set_var("RELAY_TEST_LITERAL", "%ENV[SHOULD_NOT_EXPAND]") };
        let out = expand_env("x = \"%ENV[RELAY_TEST_LITERAL]\"").unwrap();
        assert_eq!(out, "x = \"%ENV[SHOULD_NOT_EXPAND]\"");
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::remove_var("RELAY_TEST_LITERAL") };
    }

    #[test]
    fn expansion_is_idempotent_after_one_pass() {
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::set_var("RELAY_TEST_IDEMPOTENT", "value") };
        let once = expand_env("%ENV[RELAY_TEST_IDEMPOTENT]").unwrap();
        let twice = expand_env(&once).unwrap();
        assert_eq!(once, twice);
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::remove_var("RELAY_TEST_IDEMPOTENT") };
    }
}
