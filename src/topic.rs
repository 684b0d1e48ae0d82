//! Topic template engine.
//!
//! A descriptor's topic pattern may contain placeholder tokens of the
//! form `{name}`.  Each [`Reading`](crate::sensors::Reading) carries its
//! own ordered substitution list (probe index, particle-size bucket, ...)
//! which is applied here to produce the MQTT topic and the display name
//! written into the payload.
//!
//! ## Substitution rules
//!
//! - Replacement is literal: every occurrence of the token text is
//!   replaced, no escaping, no nesting.
//! - Substitutions are applied **in list order**, one full pass per
//!   entry.  A later entry therefore sees (and may re-replace) text that
//!   an earlier entry introduced.  This ordering is part of the contract
//!   and callers may rely on it.
//! - Tokens with no matching substitution are left verbatim.  A pattern
//!   without placeholders is the common case (`co2`, `humidity`).
//! - The topic is built as `prefix + pattern` *before* substitution, so
//!   a token that appears inside the prefix is replaced as well.

/// One `(token, replacement)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub token: &'static str,
    pub value: String,
}

impl Substitution {
    pub fn new(token: &'static str, value: impl Into<String>) -> Self {
        Self {
            token,
            value: value.into(),
        }
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    /// Full MQTT topic: prefix + pattern, substituted.
    pub topic: String,
    /// Pattern without the prefix, substituted.  Used as the measurement
    /// name in the payload.
    pub name: String,
}

/// Resolve `pattern` against `subs`, see the module docs for the rules.
pub fn resolve(prefix: &str, pattern: &str, subs: &[Substitution]) -> ResolvedTopic {
    let mut topic = String::with_capacity(prefix.len() + pattern.len());
    topic.push_str(prefix);
    topic.push_str(pattern);

    ResolvedTopic {
        topic: substitute(topic, subs),
        name: substitute(pattern.to_owned(), subs),
    }
}

fn substitute(mut text: String, subs: &[Substitution]) -> String {
    for s in subs {
        if s.token.is_empty() {
            // str::replace with an empty needle inserts between every char.
            continue;
        }
        if text.contains(s.token) {
            text = text.replace(s.token, &s.value);
        }
    }
    text
}
