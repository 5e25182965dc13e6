//! Python-`repr` rendering of literal constants.
//!
//! Literal values are stored (and matched) as their textual `repr`
//! form, so the same function runs at ingest and at query compile
//! time; textual equality then holds on both sides.

use rustpython_parser::ast::Constant;

/// Render a parsed constant the way the target language's `repr` does.
pub fn constant_repr(constant: &Constant) -> String {
    match constant {
        Constant::None => "None".to_owned(),
        Constant::Bool(true) => "True".to_owned(),
        Constant::Bool(false) => "False".to_owned(),
        Constant::Ellipsis => "Ellipsis".to_owned(),
        Constant::Int(value) => value.to_string(),
        Constant::Float(value) => float_repr(*value),
        Constant::Complex { real, imag } => complex_repr(*real, *imag),
        Constant::Str(value) => str_repr(value),
        Constant::Bytes(value) => bytes_repr(value),
        Constant::Tuple(items) => tuple_repr(items),
    }
}

fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let rendered = format!("{value}");
    // integral floats keep their trailing `.0`
    if rendered.contains('.') || rendered.contains('e') || rendered.contains("inf") {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

/// Inside a complex, integral parts drop the `.0`.
fn complex_part(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        float_repr(value)
    }
}

fn complex_repr(real: f64, imag: f64) -> String {
    if real == 0.0 {
        format!("{}j", complex_part(imag))
    } else if imag < 0.0 || (imag == 0.0 && imag.is_sign_negative()) {
        format!("({}-{}j)", complex_part(real), complex_part(-imag))
    } else {
        format!("({}+{}j)", complex_part(real), complex_part(imag))
    }
}

pub fn str_repr(value: &str) -> String {
    // single quotes unless the text contains one and no double quote
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len() + 3);
    out.push_str("b'");
    for &byte in value {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            byte => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push('\'');
    out
}

fn tuple_repr(items: &[Constant]) -> String {
    let rendered: Vec<String> = items.iter().map(constant_repr).collect();
    match rendered.len() {
        1 => format!("({},)", rendered[0]),
        _ => format!("({})", rendered.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_parser::ast::Constant;

    #[test]
    fn scalar_reprs() {
        assert_eq!(constant_repr(&Constant::None), "None");
        assert_eq!(constant_repr(&Constant::Bool(true)), "True");
        assert_eq!(constant_repr(&Constant::Float(1.0)), "1.0");
        assert_eq!(constant_repr(&Constant::Float(3.14)), "3.14");
    }

    #[test]
    fn string_quoting_follows_python() {
        assert_eq!(str_repr("foo"), "'foo'");
        assert_eq!(str_repr("it's"), "\"it's\"");
        assert_eq!(str_repr("both ' \""), "'both \\' \"'");
        assert_eq!(str_repr("a\nb"), "'a\\nb'");
    }

    #[test]
    fn complex_reprs() {
        assert_eq!(complex_repr(0.0, 2.0), "2j");
        assert_eq!(complex_repr(1.0, 2.0), "(1+2j)");
        assert_eq!(complex_repr(1.5, -2.0), "(1.5-2j)");
    }

    #[test]
    fn container_reprs() {
        let tuple = Constant::Tuple(vec![Constant::Bool(false), Constant::None]);
        assert_eq!(constant_repr(&tuple), "(False, None)");
        let single = Constant::Tuple(vec![Constant::None]);
        assert_eq!(constant_repr(&single), "(None,)");
        assert_eq!(constant_repr(&Constant::Bytes(b"a\xff".to_vec())), "b'a\\xff'");
    }
}
