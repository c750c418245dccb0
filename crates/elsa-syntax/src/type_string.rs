use crate::ast::{ChanDir, TypeExpr};

/// Parses a fully qualified type string in type-checker notation, such as
/// `*github.com/acme/db.Conn` or `map[string][]example.com/cfg.Option`.
///
/// Named types carry their import path; function, interface, struct and instantiated
/// generic types are kept opaque.
pub fn parse_type_string(text: &str) -> TypeExpr {
    let text = text.trim();
    parse(text).unwrap_or_else(|| TypeExpr::Opaque(text.to_string()))
}

/// `None` when some component of `text` is missing, such as the element of `*`.
fn parse(text: &str) -> Option<TypeExpr> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(rest) = text.strip_prefix('*') {
        return Some(TypeExpr::Pointer(Box::new(parse(rest)?)));
    }
    if let Some(rest) = text.strip_prefix("[]") {
        return Some(TypeExpr::Slice(Box::new(parse(rest)?)));
    }
    if text.starts_with('[') {
        if let Some(close) = closing_bracket(text, 0) {
            return Some(TypeExpr::Array {
                len: text[1..close].trim().to_string(),
                elem: Box::new(parse(&text[close + 1..])?),
            });
        }
    }
    if let Some(rest) = text.strip_prefix("map[") {
        if let Some(close) = closing_bracket(text, 3) {
            return Some(TypeExpr::Map {
                key: Box::new(parse(&rest[..close - 4])?),
                value: Box::new(parse(&text[close + 1..])?),
            });
        }
    }
    if let Some(rest) = text.strip_prefix("<-chan") {
        return chan(ChanDir::Recv, rest);
    }
    if let Some(rest) = text.strip_prefix("chan<-") {
        return chan(ChanDir::Send, rest);
    }
    if let Some(rest) = text.strip_prefix("chan ") {
        return chan(ChanDir::Both, rest);
    }
    if let Some(inner) = text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        return parse(inner);
    }
    let composite = ["func(", "func[", "interface{", "interface {", "struct{", "struct {"];
    if composite.iter().any(|prefix| text.starts_with(prefix)) || text.contains('[') {
        return Some(TypeExpr::Opaque(text.to_string()));
    }
    Some(match text.rsplit_once('.') {
        Some((path, name)) if !path.is_empty() && !name.is_empty() => TypeExpr::Qualified {
            path: path.to_string(),
            name: name.to_string(),
        },
        _ => TypeExpr::Ident(text.to_string()),
    })
}

fn chan(dir: ChanDir, elem: &str) -> Option<TypeExpr> {
    Some(TypeExpr::Chan {
        dir,
        elem: Box::new(parse(elem)?),
    })
}

/// Byte index of the `]` closing the `[` at `open`.
fn closing_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, byte) in text.bytes().enumerate().skip(open) {
        match byte {
            b'[' | b'(' | b'{' => depth += 1,
            b']' | b')' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (byte == b']').then_some(index);
                }
            }
            _ => {}
        }
    }
    None
}
