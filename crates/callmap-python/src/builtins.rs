//! Builtin type catalog and literal inference.
//!
//! The registry is populated once at startup with the primitive types and
//! the return types of their methods, plus a small table of well-known
//! stdlib constructors. Literal inference is purely lexical: it looks at
//! the source text of a literal expression, never at runtime values.
//!
//! A missing method means "unknown" and lookup returns `None`; callers
//! must not fabricate a method FQN when the registry has no entry (the
//! chain resolver handles unknown methods with its fluent-interface
//! heuristic instead).

use std::collections::HashMap;

use callmap_core::{TypeInfo, TypeSource};

// ============================================================================
// Builtin FQNs
// ============================================================================

pub const STR: &str = "builtins.str";
pub const BYTES: &str = "builtins.bytes";
pub const INT: &str = "builtins.int";
pub const FLOAT: &str = "builtins.float";
pub const BOOL: &str = "builtins.bool";
pub const NONE: &str = "builtins.NoneType";
pub const LIST: &str = "builtins.list";
pub const DICT: &str = "builtins.dict";
pub const SET: &str = "builtins.set";
pub const FROZENSET: &str = "builtins.frozenset";
pub const TUPLE: &str = "builtins.tuple";
pub const GENERATOR: &str = "builtins.generator";

// ============================================================================
// Method Tables
// ============================================================================

// Dict view types are folded into builtins.list; the approximation keeps
// chains like `d.keys().__iter__` resolvable without a view-type catalog.
const STR_METHODS: &[(&str, &str)] = &[
    ("upper", STR),
    ("lower", STR),
    ("title", STR),
    ("capitalize", STR),
    ("casefold", STR),
    ("strip", STR),
    ("lstrip", STR),
    ("rstrip", STR),
    ("replace", STR),
    ("format", STR),
    ("format_map", STR),
    ("join", STR),
    ("zfill", STR),
    ("ljust", STR),
    ("rjust", STR),
    ("center", STR),
    ("expandtabs", STR),
    ("swapcase", STR),
    ("encode", BYTES),
    ("split", LIST),
    ("rsplit", LIST),
    ("splitlines", LIST),
    ("partition", TUPLE),
    ("rpartition", TUPLE),
    ("startswith", BOOL),
    ("endswith", BOOL),
    ("isdigit", BOOL),
    ("isalpha", BOOL),
    ("isalnum", BOOL),
    ("isspace", BOOL),
    ("isupper", BOOL),
    ("islower", BOOL),
    ("isidentifier", BOOL),
    ("find", INT),
    ("rfind", INT),
    ("index", INT),
    ("rindex", INT),
    ("count", INT),
];

const BYTES_METHODS: &[(&str, &str)] = &[
    ("decode", STR),
    ("hex", STR),
    ("upper", BYTES),
    ("lower", BYTES),
    ("strip", BYTES),
    ("lstrip", BYTES),
    ("rstrip", BYTES),
    ("replace", BYTES),
    ("join", BYTES),
    ("split", LIST),
    ("splitlines", LIST),
    ("startswith", BOOL),
    ("endswith", BOOL),
    ("find", INT),
    ("count", INT),
];

const INT_METHODS: &[(&str, &str)] = &[
    ("bit_length", INT),
    ("bit_count", INT),
    ("to_bytes", BYTES),
    ("conjugate", INT),
];

const FLOAT_METHODS: &[(&str, &str)] = &[
    ("is_integer", BOOL),
    ("hex", STR),
    ("conjugate", FLOAT),
];

const LIST_METHODS: &[(&str, &str)] = &[
    ("append", NONE),
    ("extend", NONE),
    ("insert", NONE),
    ("remove", NONE),
    ("clear", NONE),
    ("sort", NONE),
    ("reverse", NONE),
    ("copy", LIST),
    ("index", INT),
    ("count", INT),
];

const DICT_METHODS: &[(&str, &str)] = &[
    ("clear", NONE),
    ("update", NONE),
    ("copy", DICT),
    ("keys", LIST),
    ("values", LIST),
    ("items", LIST),
    ("fromkeys", DICT),
];

const SET_METHODS: &[(&str, &str)] = &[
    ("add", NONE),
    ("discard", NONE),
    ("clear", NONE),
    ("union", SET),
    ("intersection", SET),
    ("difference", SET),
    ("symmetric_difference", SET),
    ("copy", SET),
    ("issubset", BOOL),
    ("issuperset", BOOL),
    ("isdisjoint", BOOL),
];

const TUPLE_METHODS: &[(&str, &str)] = &[("count", INT), ("index", INT)];

/// Lowercase constructor name → builtin type it produces.
const CONSTRUCTORS: &[(&str, &str)] = &[
    ("str", STR),
    ("bytes", BYTES),
    ("int", INT),
    ("float", FLOAT),
    ("bool", BOOL),
    ("list", LIST),
    ("dict", DICT),
    ("set", SET),
    ("frozenset", FROZENSET),
    ("tuple", TUPLE),
];

/// Well-known stdlib callables with stable return types.
const STDLIB_RETURNS: &[(&str, &str)] = &[
    ("logging.getLogger", "logging.Logger"),
    ("os.getcwd", STR),
    ("os.path.join", STR),
    ("os.path.dirname", STR),
    ("os.path.basename", STR),
    ("json.dumps", STR),
    ("re.compile", "re.Pattern"),
    ("datetime.datetime.now", "datetime.datetime"),
    ("datetime.datetime.utcnow", "datetime.datetime"),
    ("pathlib.Path", "pathlib.Path"),
    ("collections.OrderedDict", DICT),
    ("collections.defaultdict", DICT),
    ("uuid.uuid4", "uuid.UUID"),
];

// ============================================================================
// Registry Types
// ============================================================================

/// A method on a builtin type with its known return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinMethod {
    pub name: String,
    pub return_type_fqn: String,
}

/// A builtin type and its method table.
#[derive(Debug, Clone)]
pub struct BuiltinType {
    pub fqn: String,
    methods: HashMap<String, BuiltinMethod>,
}

impl BuiltinType {
    fn from_table(fqn: &str, table: &[(&str, &str)]) -> Self {
        let methods = table
            .iter()
            .map(|(name, ret)| {
                (
                    (*name).to_string(),
                    BuiltinMethod {
                        name: (*name).to_string(),
                        return_type_fqn: (*ret).to_string(),
                    },
                )
            })
            .collect();
        BuiltinType {
            fqn: fqn.to_string(),
            methods,
        }
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&BuiltinMethod> {
        self.methods.get(name)
    }
}

/// Immutable catalog of primitive types, their methods, builtin
/// constructors, and a small stdlib return table.
#[derive(Debug, Clone)]
pub struct BuiltinRegistry {
    types: HashMap<String, BuiltinType>,
    constructors: HashMap<String, String>,
    stdlib_returns: HashMap<String, String>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    /// Build the catalog. Cheap enough to construct per analysis run;
    /// tests construct fresh registries per case.
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for (fqn, table) in [
            (STR, STR_METHODS),
            (BYTES, BYTES_METHODS),
            (INT, INT_METHODS),
            (FLOAT, FLOAT_METHODS),
            (LIST, LIST_METHODS),
            (DICT, DICT_METHODS),
            (SET, SET_METHODS),
            (TUPLE, TUPLE_METHODS),
            (BOOL, &[] as &[(&str, &str)]),
            (NONE, &[]),
            (FROZENSET, SET_METHODS),
            (GENERATOR, &[]),
        ] {
            types.insert(fqn.to_string(), BuiltinType::from_table(fqn, table));
        }
        let constructors = CONSTRUCTORS
            .iter()
            .map(|(name, fqn)| ((*name).to_string(), (*fqn).to_string()))
            .collect();
        let stdlib_returns = STDLIB_RETURNS
            .iter()
            .map(|(name, fqn)| ((*name).to_string(), (*fqn).to_string()))
            .collect();
        BuiltinRegistry {
            types,
            constructors,
            stdlib_returns,
        }
    }

    /// Look up a builtin type by FQN.
    pub fn get_type(&self, fqn: &str) -> Option<&BuiltinType> {
        self.types.get(fqn)
    }

    /// True if `fqn` names a builtin type.
    pub fn is_builtin(&self, fqn: &str) -> bool {
        self.types.contains_key(fqn)
    }

    /// Look up a method on a builtin type. `None` signals "unknown";
    /// never invent a method FQN on that answer.
    pub fn get_method(&self, type_fqn: &str, method_name: &str) -> Option<&BuiltinMethod> {
        self.types.get(type_fqn)?.method(method_name)
    }

    /// The builtin type produced by a lowercase constructor call
    /// (`list(…)`, `str(…)`), if the name is one.
    pub fn constructor_type(&self, name: &str) -> Option<&str> {
        self.constructors.get(name).map(String::as_str)
    }

    /// Return type of a well-known stdlib callable, if tabulated.
    pub fn stdlib_return(&self, fqn: &str) -> Option<&str> {
        self.stdlib_returns.get(fqn).map(String::as_str)
    }

    /// Infer the type of a literal from its source text.
    ///
    /// Recognized forms (confidence 1.0):
    /// - quoted strings, with any prefix letters (`f"…"`, `r'…'`); a `b`
    ///   in the prefix makes it bytes
    /// - `True` / `False` / `None`
    /// - numeric text, with a dot or exponent meaning float; `0x`/`0o`/
    ///   `0b` prefixes and `_` separators permitted
    /// - bracketed containers: `[` list, `{` dict or set (dict when a
    ///   top-level `:` is present), parenthesized with a comma → tuple
    pub fn infer_literal_type(&self, text: &str) -> Option<TypeInfo> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        match text {
            "True" | "False" => {
                return Some(TypeInfo::concrete(BOOL, 1.0, TypeSource::Literal));
            }
            "None" => return Some(TypeInfo::concrete(NONE, 1.0, TypeSource::Literal)),
            _ => {}
        }

        if let Some(fqn) = classify_string_literal(text) {
            return Some(TypeInfo::concrete(fqn, 1.0, TypeSource::Literal));
        }
        if let Some(fqn) = classify_numeric_literal(text) {
            return Some(TypeInfo::concrete(fqn, 1.0, TypeSource::Literal));
        }

        if text.starts_with('[') {
            return Some(TypeInfo::concrete(LIST, 1.0, TypeSource::Literal));
        }
        if text.starts_with('{') {
            let fqn = if has_top_level_colon(text) { DICT } else { SET };
            return Some(TypeInfo::concrete(fqn, 1.0, TypeSource::Literal));
        }
        if text.starts_with('(') && text.ends_with(')') && has_top_level_comma(text) {
            return Some(TypeInfo::concrete(TUPLE, 1.0, TypeSource::Literal));
        }

        None
    }
}

// ============================================================================
// Lexical Classification
// ============================================================================

fn classify_string_literal(text: &str) -> Option<&'static str> {
    let prefix_len = text
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if prefix_len > 3 {
        return None;
    }
    let (prefix, rest) = text.split_at(prefix_len);
    if !(rest.starts_with('"') || rest.starts_with('\'')) {
        return None;
    }
    if prefix.bytes().any(|b| b == b'b' || b == b'B') {
        Some(BYTES)
    } else {
        Some(STR)
    }
}

fn classify_numeric_literal(text: &str) -> Option<&'static str> {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    if body.is_empty() {
        return None;
    }

    let lower = body.to_ascii_lowercase();
    if lower.starts_with("0x") || lower.starts_with("0o") || lower.starts_with("0b") {
        let digits = &lower[2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Some(INT);
        }
        return None;
    }

    let mut saw_digit = false;
    let mut saw_dot = false;
    let mut saw_exp = false;
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => saw_digit = true,
            b'_' => {}
            b'.' if !saw_dot && !saw_exp => saw_dot = true,
            b'e' if saw_digit && !saw_exp => {
                saw_exp = true;
                // Optional sign directly after the exponent marker.
                if i + 1 < bytes.len() && (bytes[i + 1] == b'+' || bytes[i + 1] == b'-') {
                    i += 1;
                }
            }
            b'j' if i == bytes.len() - 1 => saw_dot = true, // complex literals fold into float
            _ => return None,
        }
        i += 1;
    }
    if !saw_digit {
        return None;
    }
    if saw_dot || saw_exp {
        Some(FLOAT)
    } else {
        Some(INT)
    }
}

/// Scan for a `:` that is not nested in brackets or quotes, skipping
/// dict-comprehension colons is not needed at this level: a top-level
/// colon inside `{…}` distinguishes dict from set either way.
fn has_top_level_colon(text: &str) -> bool {
    scan_top_level(text, b':')
}

fn has_top_level_comma(text: &str) -> bool {
    scan_top_level(text, b',')
}

fn scan_top_level(text: &str, needle: u8) -> bool {
    if text.len() < 2 {
        return false;
    }
    let inner = &text[1..text.len() - 1];
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut prev = 0u8;
    for &b in inner.as_bytes() {
        if let Some(q) = quote {
            if b == q && prev != b'\\' {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' | b'(' | b'{' => depth += 1,
                b']' | b')' | b'}' => depth -= 1,
                _ if b == needle && depth == 0 => return true,
                _ => {}
            }
        }
        prev = b;
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fqn_of(text: &str) -> Option<String> {
        BuiltinRegistry::new()
            .infer_literal_type(text)
            .and_then(|t| t.fqn().map(str::to_string))
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(fqn_of("\"alice\"").as_deref(), Some(STR));
        assert_eq!(fqn_of("'x'").as_deref(), Some(STR));
        assert_eq!(fqn_of("f\"hello {name}\"").as_deref(), Some(STR));
        assert_eq!(fqn_of("r'raw'").as_deref(), Some(STR));
        assert_eq!(fqn_of("b\"data\"").as_deref(), Some(BYTES));
        assert_eq!(fqn_of("rb'data'").as_deref(), Some(BYTES));
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(fqn_of("True").as_deref(), Some(BOOL));
        assert_eq!(fqn_of("False").as_deref(), Some(BOOL));
        assert_eq!(fqn_of("None").as_deref(), Some(NONE));
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(fqn_of("42").as_deref(), Some(INT));
        assert_eq!(fqn_of("1_000_000").as_deref(), Some(INT));
        assert_eq!(fqn_of("0xFF").as_deref(), Some(INT));
        assert_eq!(fqn_of("0b1010").as_deref(), Some(INT));
        assert_eq!(fqn_of("0o777").as_deref(), Some(INT));
        assert_eq!(fqn_of("3.25").as_deref(), Some(FLOAT));
        assert_eq!(fqn_of("1e9").as_deref(), Some(FLOAT));
        assert_eq!(fqn_of("6.02e-23").as_deref(), Some(FLOAT));
        assert_eq!(fqn_of("-7").as_deref(), Some(INT));
    }

    #[test]
    fn test_container_literals() {
        assert_eq!(fqn_of("[1, 2]").as_deref(), Some(LIST));
        assert_eq!(fqn_of("{\"a\": 1}").as_deref(), Some(DICT));
        assert_eq!(fqn_of("{1, 2, 3}").as_deref(), Some(SET));
        assert_eq!(fqn_of("(1, 2)").as_deref(), Some(TUPLE));
        // Colon hidden inside a nested string does not make a set a dict.
        assert_eq!(fqn_of("{'a:b', 'c'}").as_deref(), Some(SET));
        // Parenthesized expression without a comma is not a tuple.
        assert_eq!(fqn_of("(x)"), None);
    }

    #[test]
    fn test_literal_confidence_is_one() {
        let registry = BuiltinRegistry::new();
        let info = registry.infer_literal_type("\"s\"").unwrap();
        assert!((info.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(info.source, TypeSource::Literal);
    }

    #[test]
    fn test_non_literals_are_rejected() {
        assert_eq!(fqn_of("foo"), None);
        assert_eq!(fqn_of("foo()"), None);
        assert_eq!(fqn_of(""), None);
        assert_eq!(fqn_of("Truey"), None);
    }

    #[test]
    fn test_method_lookup() {
        let registry = BuiltinRegistry::new();
        let method = registry.get_method(STR, "upper").unwrap();
        assert_eq!(method.return_type_fqn, STR);
        assert_eq!(
            registry.get_method(STR, "split").unwrap().return_type_fqn,
            LIST
        );
        assert_eq!(
            registry.get_method(BYTES, "decode").unwrap().return_type_fqn,
            STR
        );
        // Missing method means unknown, not an invented FQN.
        assert!(registry.get_method(STR, "frobnicate").is_none());
        assert!(registry.get_method("app.User", "upper").is_none());
    }

    #[test]
    fn test_constructor_lookup() {
        let registry = BuiltinRegistry::new();
        assert_eq!(registry.constructor_type("list"), Some(LIST));
        assert_eq!(registry.constructor_type("str"), Some(STR));
        assert_eq!(registry.constructor_type("Handler"), None);
    }

    #[test]
    fn test_stdlib_returns() {
        let registry = BuiltinRegistry::new();
        assert_eq!(
            registry.stdlib_return("logging.getLogger"),
            Some("logging.Logger")
        );
        assert_eq!(registry.stdlib_return("os.path.join"), Some(STR));
        assert_eq!(registry.stdlib_return("app.helper"), None);
    }
}
