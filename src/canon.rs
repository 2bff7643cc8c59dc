//! Query canonicalization.
//!
//! A small byte tokenizer classifies runs of the query text; numeric and
//! string literals collapse to `?`, whitespace runs collapse to a single
//! space, and everything else passes through. The joined text then gets a
//! route-comment rewrite and the `?, ` elision that folds variadic lists
//! into a single placeholder.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Word,
    Quote,
    Number,
    Whitespace,
    Other,
}

/// Scan the next token starting at `query[0]`. Returns its byte length
/// and class. With `no_clean` the whole input is one `Other` token, which
/// leaves the text untouched by placeholder substitution.
///
/// Callers must not pass an empty slice; that is a programming error.
pub fn scan_token(query: &[u8], no_clean: bool) -> (usize, Token) {
    assert!(!query.is_empty(), "scan_token called with empty query");

    if no_clean {
        return (query.len(), Token::Other);
    }

    let first = query[0];
    match first {
        b'\'' | b'"' => {
            let opened_with = first;
            let mut escaped = false;
            for (i, &b) in query.iter().enumerate().skip(1) {
                if b == opened_with {
                    if escaped {
                        escaped = false;
                        continue;
                    }
                    return (i + 1, Token::Quote);
                }
                escaped = b == b'\\';
            }
            (query.len(), Token::Quote)
        }
        b'0'..=b'9' => {
            for (i, &b) in query.iter().enumerate().skip(1) {
                if !b.is_ascii_digit() {
                    return (i, Token::Number);
                }
            }
            (query.len(), Token::Number)
        }
        b' ' | 0x09..=0x0d => {
            for (i, &b) in query.iter().enumerate().skip(1) {
                if b != b' ' && !(0x09..=0x0d).contains(&b) {
                    return (i, Token::Whitespace);
                }
            }
            (query.len(), Token::Whitespace)
        }
        b'a'..=b'z' | b'A'..=b'Z' => {
            for (i, &b) in query.iter().enumerate().skip(1) {
                let word_byte = b.is_ascii_alphanumeric() || b == b'$' || b == b'_';
                if !word_byte {
                    return (i, Token::Word);
                }
            }
            (query.len(), Token::Word)
        }
        _ => (1, Token::Other),
    }
}

/// Canonicalize a query into its fingerprint text.
pub fn cleanup_query(query: &[u8], no_clean: bool) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(query.len());

    let mut i = 0;
    while i < query.len() {
        let (len, token) = scan_token(&query[i..], no_clean);
        match token {
            Token::Word | Token::Other => out.extend_from_slice(&query[i..i + len]),
            Token::Number | Token::Quote => out.push(b'?'),
            Token::Whitespace => out.push(b' '),
        }
        i += len;
    }

    let mut text = String::from_utf8_lossy(&out).into_owned();

    // Route comments look like `SELECT /* hostname:route */ ...`; drop the
    // hostname so the same route condenses across hosts.
    let parts: Vec<&str> = text.splitn(5, ' ').collect();
    if parts.len() == 5 && parts[1] == "/*" && parts[3] == "*/" {
        if let Some((_, route)) = parts[2].split_once(':') {
            text = format!("{} /* {} */ {}", parts[0], route, parts[4]);
        }
    }

    // Collapses `in (?, ?, ?)` and `values (?, ?, ?)` into `(?)`.
    text.replace("?, ", "")
}
