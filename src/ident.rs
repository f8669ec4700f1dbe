use crate::error::{Error, Result};
use crate::expr::LiteralKind;

/// Words that render as something other than an identifier.
const RESERVED: &[&str] = &["true", "false"];

fn is_ident_start(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => {}
        _ => return false,
    }
    chars.all(is_ident_continue) && !RESERVED.contains(&name)
}

/// Checks that `name` can be rendered and read back as an identifier.
pub(crate) fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_literal(
            LiteralKind::Identifier,
            "identifier is empty",
        ));
    }
    if RESERVED.contains(&name) {
        return Err(Error::invalid_literal(
            LiteralKind::Identifier,
            format!("`{name}` is a reserved word"),
        ));
    }
    if !is_identifier(name) {
        return Err(Error::invalid_literal(
            LiteralKind::Identifier,
            format!("`{name}` is not a valid identifier"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_unicode_identifiers() {
        for name in ["i", "_tmp", "N2", "größe", "λ"] {
            assert!(is_identifier(name), "{name}");
        }
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for name in ["", "2i", "a-b", "x y", "true", "false"] {
            assert!(!is_identifier(name), "{name}");
            assert!(matches!(validate(name), Err(Error::InvalidLiteral { .. })));
        }
    }
}
