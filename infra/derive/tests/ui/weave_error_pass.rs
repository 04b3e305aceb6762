use std::borrow::Cow;
use weave_derive::weave_error;

#[weave_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), DemoError> {
    let io: Result<(), std::io::Error> = Err(std::io::Error::other("disk"));
    io.context("reading fixture")?;
    Ok(())
}

fn main() {
    let err = read().unwrap_err();
    assert_eq!(err.to_string(), "IO error (reading fixture): disk");

    let internal: Result<(), DemoError> = Err("boom".into());
    let err = internal.with_context(|| format!("step {}", 2)).unwrap_err();
    assert_eq!(err.to_string(), "Internal error (step 2): boom");
}
