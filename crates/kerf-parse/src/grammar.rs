pub(crate) mod code;
mod directives;
pub(crate) mod markup;
