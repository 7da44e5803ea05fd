//! Handler parameter contracts.
//!
//! Rust functions cannot be inspected at runtime, so every handler is
//! registered together with a [`Signature`]: the ordered list of parameters
//! it accepts. [`Classification::inspect`] analyses that list once, at
//! registration, and the dispatcher consults the result on every request.
//!
//! ```rust
//! use quill::signature::{Classification, Signature};
//!
//! // api_register_user(request, *, email, name, image="about:blank")
//! let sig = Signature::new("api_register_user")
//!     .positional("request")
//!     .keyword("email")
//!     .keyword("name")
//!     .keyword_default("image");
//!
//! let c = Classification::inspect(&sig).unwrap();
//! assert!(c.needs_request());
//! assert_eq!(c.required_keywords().iter().collect::<Vec<_>>(), ["email", "name"]);
//! ```

use indexmap::IndexSet;

use crate::error::{Error, Result};

/// Name of the parameter that receives the request itself.
pub const REQUEST: &str = "request";

/// How a parameter may be supplied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamKind {
    /// Filled from path parameters (or the request, if named `request`).
    Positional,
    /// Catch-all for extra positional values; never filled by the dispatcher.
    VarPositional,
    /// Named argument taken from the body or query string.
    Keyword,
    /// Catch-all accepting every body or query key.
    VarKeyword,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub has_default: bool,
}

/// The declared parameter list of one handler.
#[derive(Clone, Debug)]
pub struct Signature {
    handler: String,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(handler: impl Into<String>) -> Self {
        Self { handler: handler.into(), params: Vec::new() }
    }

    pub fn positional(self, name: &str) -> Self {
        self.param(name, ParamKind::Positional, false)
    }

    pub fn var_positional(self, name: &str) -> Self {
        self.param(name, ParamKind::VarPositional, false)
    }

    /// A required keyword parameter.
    pub fn keyword(self, name: &str) -> Self {
        self.param(name, ParamKind::Keyword, false)
    }

    /// A keyword parameter the handler can do without.
    pub fn keyword_default(self, name: &str) -> Self {
        self.param(name, ParamKind::Keyword, true)
    }

    pub fn var_keyword(self, name: &str) -> Self {
        self.param(name, ParamKind::VarKeyword, false)
    }

    fn param(mut self, name: &str, kind: ParamKind, has_default: bool) -> Self {
        self.params.push(Param { name: name.to_owned(), kind, has_default });
        self
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// What a handler needs from each request. Computed once per handler and
/// read concurrently afterwards.
#[derive(Clone, Debug, Default)]
pub struct Classification {
    needs_request: bool,
    named_keywords: IndexSet<String>,
    required_keywords: IndexSet<String>,
    accepts_any_keyword: bool,
}

impl Classification {
    /// Classifies `sig`.
    ///
    /// Fails with [`Error::RequestNotLast`] when a positional parameter
    /// follows `request`: only catch-alls and keyword parameters may.
    pub fn inspect(sig: &Signature) -> Result<Self> {
        let mut c = Self::default();

        for param in &sig.params {
            if c.needs_request && param.kind == ParamKind::Positional {
                return Err(Error::RequestNotLast { handler: sig.handler.clone() });
            }
            match param.kind {
                ParamKind::Positional if param.name == REQUEST => c.needs_request = true,
                ParamKind::Keyword => {
                    c.named_keywords.insert(param.name.clone());
                    if !param.has_default {
                        c.required_keywords.insert(param.name.clone());
                    }
                }
                ParamKind::VarKeyword => c.accepts_any_keyword = true,
                ParamKind::Positional | ParamKind::VarPositional => {}
            }
        }
        Ok(c)
    }

    pub fn needs_request(&self) -> bool {
        self.needs_request
    }

    pub fn named_keywords(&self) -> &IndexSet<String> {
        &self.named_keywords
    }

    pub fn required_keywords(&self) -> &IndexSet<String> {
        &self.required_keywords
    }

    pub fn accepts_any_keyword(&self) -> bool {
        self.accepts_any_keyword
    }

    /// Whether arguments must be parsed from the body or query string.
    pub fn needs_arguments(&self) -> bool {
        self.accepts_any_keyword || !self.named_keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_handler_needs_nothing_parsed() {
        let c = Classification::inspect(&Signature::new("get_blog").positional("id")).unwrap();
        assert!(!c.needs_request());
        assert!(!c.needs_arguments());
    }

    #[test]
    fn splits_required_from_optional_keywords() {
        let sig = Signature::new("api_blogs")
            .keyword_default("page")
            .keyword("token")
            .var_keyword("kw");
        let c = Classification::inspect(&sig).unwrap();

        assert_eq!(c.named_keywords().iter().collect::<Vec<_>>(), ["page", "token"]);
        assert_eq!(c.required_keywords().iter().collect::<Vec<_>>(), ["token"]);
        assert!(c.accepts_any_keyword());
        assert!(c.needs_arguments());
    }

    #[test]
    fn request_may_precede_catch_alls_and_keywords() {
        let sig = Signature::new("manage")
            .positional("request")
            .var_positional("args")
            .keyword("page")
            .var_keyword("kw");
        assert!(Classification::inspect(&sig).unwrap().needs_request());
    }

    #[test]
    fn positional_after_request_is_rejected() {
        let sig = Signature::new("broken").positional("request").positional("id");
        let err = Classification::inspect(&sig).unwrap_err();
        assert!(matches!(err, Error::RequestNotLast { ref handler } if handler == "broken"));
    }

    #[test]
    fn keyword_named_request_is_just_a_keyword() {
        let sig = Signature::new("odd").keyword("request");
        let c = Classification::inspect(&sig).unwrap();
        assert!(!c.needs_request());
        assert!(c.required_keywords().contains("request"));
    }
}
