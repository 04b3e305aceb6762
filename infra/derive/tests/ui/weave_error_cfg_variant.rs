use std::borrow::Cow;

#[weave_derive::weave_error]
#[derive(Debug)]
pub enum GatedError {
    #[cfg(unix)]
    #[error("Unix failure{}: {message}", format_context(.context))]
    Unix { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Parse failure{}: {source}", format_context(.context))]
    Parse { source: std::num::ParseIntError, context: Option<Cow<'static, str>> },
}

fn parse(raw: &str) -> Result<u32, GatedError> {
    raw.parse::<u32>().context("parsing count")
}

fn main() {
    assert_eq!(parse("7").unwrap(), 7);
    let err = parse("x").unwrap_err();
    assert!(err.to_string().starts_with("Parse failure (parsing count)"));
}
