//! Aggregation-key templates.
//!
//! A template is an ordered list of literal text and field tags. `#s` is
//! the client endpoint, `#i` its IP, `#q` the (canonicalized) query text,
//! `#r` the route comment. `##` escapes a literal `#`; an unrecognized
//! tag passes through verbatim.

use crate::canon::cleanup_query;

pub const DEFAULT_TEMPLATE: &str = "#s:#q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Source,
    SourceIp,
    Route,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatItem {
    Literal(String),
    Field(Field),
}

/// Parse a template string. Empty or all-whitespace input falls back to
/// [`DEFAULT_TEMPLATE`].
pub fn parse_format(template: &str) -> Vec<FormatItem> {
    let template = template.trim();
    let template = if template.is_empty() {
        DEFAULT_TEMPLATE
    } else {
        template
    };

    let mut items = Vec::new();
    let mut literal = String::new();
    let mut special = false;

    for ch in template.chars() {
        if ch == '#' {
            if special {
                literal.push('#');
                special = false;
            } else {
                special = true;
            }
            continue;
        }

        let mut field = None;
        if special {
            match ch.to_ascii_lowercase() {
                's' => field = Some(Field::Source),
                'i' => field = Some(Field::SourceIp),
                'r' => field = Some(Field::Route),
                'q' => field = Some(Field::Query),
                _ => {
                    literal.push('#');
                    literal.push(ch);
                }
            }
            special = false;
        } else {
            literal.push(ch);
        }

        if let Some(field) = field {
            if !literal.is_empty() {
                items.push(FormatItem::Literal(std::mem::take(&mut literal)));
            }
            items.push(FormatItem::Field(field));
        }
    }
    if !literal.is_empty() {
        items.push(FormatItem::Literal(literal));
    }

    items
}

/// Renders aggregation keys from a parsed template.
#[derive(Debug, Clone)]
pub struct QueryFormatter {
    items: Vec<FormatItem>,
    /// Use the raw query text instead of the canonical form.
    unsanitized: bool,
    /// Tokenizer bypass for verbose debugging.
    no_clean: bool,
}

impl QueryFormatter {
    pub fn new(template: &str, unsanitized: bool, no_clean: bool) -> Self {
        Self {
            items: parse_format(template),
            unsanitized,
            no_clean,
        }
    }

    /// Build the aggregation key for one query observed on a flow.
    pub fn render(&self, endpoint: &str, src_ip: &str, query: &[u8]) -> String {
        let mut text = String::new();
        for item in &self.items {
            match item {
                FormatItem::Literal(s) => text.push_str(s),
                FormatItem::Field(Field::Source) => text.push_str(endpoint),
                FormatItem::Field(Field::SourceIp) => text.push_str(src_ip),
                FormatItem::Field(Field::Query) => {
                    if self.unsanitized {
                        text.push_str(&String::from_utf8_lossy(query));
                    } else {
                        text.push_str(&cleanup_query(query, self.no_clean));
                    }
                }
                FormatItem::Field(Field::Route) => self.render_route(&mut text, query),
            }
        }
        text
    }

    /// Routes are embedded as `<verb> /* host:route */ <rest>`; emit the
    /// route with the host stripped, or a canonical fallback when the
    /// query carries no route comment.
    fn render_route(&self, text: &mut String, query: &[u8]) {
        let raw = String::from_utf8_lossy(query);
        let parts: Vec<&str> = raw.splitn(5, ' ').collect();
        if parts.len() >= 4 && parts[1] == "/*" && parts[3] == "*/" {
            match parts[2].split_once(':') {
                Some((_, route)) => text.push_str(route),
                None => text.push_str(parts[2]),
            }
        } else {
            text.push_str("(unknown) ");
            text.push_str(&cleanup_query(query, self.no_clean));
        }
    }
}
