pub const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

/// Predeclared types that never need an import.
pub const BUILTIN_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr",
];

/// Predeclared constants, the zero value and builtin functions.
pub const PREDECLARED_VALUES: &[&str] = &[
    "true", "false", "iota", "nil", "append", "cap", "clear", "close", "complex", "copy",
    "delete", "imag", "len", "make", "max", "min", "new", "panic", "print", "println", "real",
    "recover",
];

pub const SYMBOLS_3: &[([char; 3], &str)] = &[
    (['<', '<', '='], "<<="),
    (['>', '>', '='], ">>="),
    (['&', '^', '='], "&^="),
    (['.', '.', '.'], "..."),
];

pub const SYMBOLS_2: &[([char; 2], &str)] = &[
    (['&', '&'], "&&"),
    (['|', '|'], "||"),
    (['<', '-'], "<-"),
    (['+', '+'], "++"),
    (['-', '-'], "--"),
    (['=', '='], "=="),
    (['!', '='], "!="),
    (['<', '='], "<="),
    (['>', '='], ">="),
    ([':', '='], ":="),
    (['+', '='], "+="),
    (['-', '='], "-="),
    (['*', '='], "*="),
    (['/', '='], "/="),
    (['%', '='], "%="),
    (['&', '='], "&="),
    (['|', '='], "|="),
    (['^', '='], "^="),
    (['<', '<'], "<<"),
    (['>', '>'], ">>"),
    (['&', '^'], "&^"),
];

pub const SYMBOLS_1: &[char] = &[
    '+', '-', '*', '/', '%', '&', '|', '^', '<', '>', '=', '!', '(', ')', '[', ']', '{', '}', ',',
    ';', '.', ':', '~',
];

/// Keywords after which a newline terminates the statement.
pub const SEMICOLON_KEYWORDS: &[&str] = &["break", "continue", "fallthrough", "return"];

/// Symbols after which a newline terminates the statement.
pub const SEMICOLON_SYMBOLS: &[&str] = &["++", "--", ")", "]", "}"];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Names a generated identifier must never take: keywords and everything predeclared.
pub fn is_reserved_identifier(name: &str) -> bool {
    is_keyword(name) || is_builtin_type(name) || PREDECLARED_VALUES.contains(&name)
}
