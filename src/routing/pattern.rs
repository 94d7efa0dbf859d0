//! Route pattern parsing and translation into engine-native syntax.
//!
//! Patterns use one syntax for every engine:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `users` | static segment |
//! | `:id` | parameter, one path segment |
//! | `:name.json` | parameter whose name carries a dot |
//! | `*path` | wildcard, the rest of the path (named `any` when bare) |
//!
//! A [`Pattern`] renders itself for a given engine with [`Pattern::translate`],
//! returning the native pattern together with the [`ParamBinding`]s that map
//! the engine's capture names back to the logical names handlers ask for.

use {
    crate::{
        Engine, Result,
        state::{ANY_KEY, PATH_KEY, WILDCARD_KEY},
    },
    regex::Regex,
    serde::Deserialize,
};

/// Placeholder substituted for `.` in parameter names under [`DotPolicy::Encode`].
pub const DOT_PLACEHOLDER: &str = "__dot__";

/// How an engine receives a parameter name containing a dot, such as
/// `:name.json`.
///
/// Whatever the policy, handlers can ask for the value by the dotted name or
/// by the base name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotPolicy {
    /// The engine sees only the base name (`name`); the value is stored under
    /// both names.
    Split,
    /// The dot is replaced by [`DOT_PLACEHOLDER`] on the way in and restored
    /// when the parameter is exposed.
    Encode,
    /// The engine accepts the dotted name unchanged.
    #[default]
    Verbatim,
}

/// One `/`-separated piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    Wildcard(String),
}

/// Maps one native capture name to the request-state keys it fills.
///
/// The first key is the logical name and always overwrites; the remaining
/// keys are aliases that never replace a value captured under that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub native: String,
    pub keys: Vec<String>,
}

/// A pattern rendered for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub native: String,
    pub bindings: Vec<ParamBinding>,
}

impl Translation {
    /// Whether the native pattern captures anything.
    pub fn captures(&self) -> bool {
        !self.bindings.is_empty()
    }
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses an absolute pattern. Segments following a wildcard are dropped.
    pub fn parse(raw: &str) -> Self {
        let body = raw.strip_prefix('/').unwrap_or(raw);
        let mut segments = Vec::new();
        if !body.is_empty() {
            let mut parts = body.split('/');
            for part in parts.by_ref() {
                if let Some(name) = part.strip_prefix('*') {
                    let name = if name.is_empty() { ANY_KEY } else { name };
                    segments.push(Segment::Wildcard(name.to_owned()));
                    break;
                }
                match part.strip_prefix(':') {
                    Some(name) if !name.is_empty() => segments.push(Segment::Param(name.to_owned())),
                    _ => segments.push(Segment::Static(part.to_owned())),
                }
            }
            let dropped: Vec<&str> = parts.collect();
            if !dropped.is_empty() {
                tracing::warn!(
                    pattern = %raw,
                    dropped = %dropped.join("/"),
                    "Segments after a wildcard are ignored"
                );
            }
        }

        let raw = render(&segments, |segment| match segment {
            Segment::Static(s) => s.clone(),
            Segment::Param(name) => format!(":{name}"),
            Segment::Wildcard(name) if name == ANY_KEY => "*".to_owned(),
            Segment::Wildcard(name) => format!("*{name}"),
        });

        Self { raw, segments }
    }

    /// The pattern in its canonical `:name` / `*name` form.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_params(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Param(_)))
    }

    pub fn has_wildcard(&self) -> bool {
        self.wildcard_name().is_some()
    }

    pub fn wildcard_name(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Wildcard(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// The static segments before the first parameter or wildcard, or `None`
    /// for a fully static pattern.
    pub fn dynamic_prefix(&self) -> Option<String> {
        let first_dynamic = self
            .segments
            .iter()
            .position(|s| !matches!(s, Segment::Static(_)))?;
        Some(render(&self.segments[..first_dynamic], |segment| match segment {
            Segment::Static(s) => s.clone(),
            _ => String::new(),
        }))
    }

    /// Whether this pattern equals `prefix` or lies beneath it.
    pub fn is_under(&self, prefix: &str) -> bool {
        if prefix == "/" {
            return true;
        }
        let prefix = prefix.trim_end_matches('/');
        self.raw == prefix
            || self
                .raw
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Whether some path at or below the static `prefix` could match this
    /// pattern.
    pub fn overlaps(&self, prefix: &str) -> bool {
        let prefix = Pattern::parse(prefix);
        for (index, expected) in prefix.segments.iter().enumerate() {
            let Segment::Static(expected) = expected else {
                return false;
            };
            match self.segments.get(index) {
                Some(Segment::Static(s)) if s == expected => {}
                Some(Segment::Param(_)) => {}
                Some(Segment::Wildcard(_)) => return true,
                Some(Segment::Static(_)) | None => return false,
            }
        }
        true
    }

    /// Per-segment rank where static = 0, parameter = 1, wildcard = 2.
    /// Compared lexicographically, lower wins, as in most native routers.
    pub fn rank(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Static(_) => 0,
                Segment::Param(_) => 1,
                Segment::Wildcard(_) => 2,
            })
            .collect()
    }

    /// Static = 1, parameterized = 2, wildcard = 3. Lower is tried first.
    pub fn specificity(&self) -> u8 {
        if self.has_wildcard() {
            3
        } else if self.has_params() {
            2
        } else {
            1
        }
    }

    /// Renders the pattern in `engine`'s native syntax.
    pub fn translate(&self, engine: &dyn Engine) -> Translation {
        let policy = engine.dot_policy();
        let mut bindings = Vec::new();
        let native = render(&self.segments, |segment| match segment {
            Segment::Static(s) => s.clone(),
            Segment::Param(name) => {
                let binding = param_binding(name, policy);
                let rendered = engine.render_param(&binding.native);
                bindings.push(binding);
                rendered
            }
            Segment::Wildcard(name) => {
                let binding = wildcard_binding(name);
                let rendered = engine.render_wildcard(&binding.native);
                bindings.push(binding);
                rendered
            }
        });
        Translation { native, bindings }
    }

    /// Compiles the anchored regex used by the shadow router.
    ///
    /// Capture groups are named `p0`, `p1`, ... in binding order, which keeps
    /// dotted parameter names out of the regex syntax entirely.
    pub(crate) fn shadow_regex(&self) -> Result<(Regex, Vec<ParamBinding>)> {
        let mut bindings = Vec::new();
        let body = render(&self.segments, |segment| match segment {
            Segment::Static(s) => regex::escape(s),
            Segment::Param(name) => {
                let group = format!("(?P<p{}>[^/]+)", bindings.len());
                bindings.push(param_binding(name, DotPolicy::Verbatim));
                group
            }
            Segment::Wildcard(name) => {
                let group = format!("(?P<p{}>.*)", bindings.len());
                bindings.push(wildcard_binding(name));
                group
            }
        });
        let regex = Regex::new(&format!("^{body}$"))?;
        Ok((regex, bindings))
    }
}

fn render(segments: &[Segment], mut f: impl FnMut(&Segment) -> String) -> String {
    let mut out = String::from("/");
    let rendered: Vec<String> = segments.iter().map(&mut f).collect();
    out.push_str(&rendered.join("/"));
    out
}

fn param_binding(name: &str, policy: DotPolicy) -> ParamBinding {
    let Some((base, _)) = name.split_once('.') else {
        return ParamBinding {
            native: name.to_owned(),
            keys: vec![name.to_owned()],
        };
    };
    match policy {
        DotPolicy::Split => ParamBinding {
            native: base.to_owned(),
            keys: vec![name.to_owned(), base.to_owned()],
        },
        DotPolicy::Encode => ParamBinding {
            native: name.replace('.', DOT_PLACEHOLDER),
            keys: vec![name.to_owned()],
        },
        DotPolicy::Verbatim => ParamBinding {
            native: name.to_owned(),
            keys: vec![name.to_owned()],
        },
    }
}

fn wildcard_binding(name: &str) -> ParamBinding {
    let mut keys = vec![name.to_owned()];
    for alias in [WILDCARD_KEY, PATH_KEY] {
        if alias != name {
            keys.push(alias.to_owned());
        }
    }
    ParamBinding {
        native: name.to_owned(),
        keys,
    }
}
