//! Parser for the small HTML fragments used as label markup.
//!
//! Only the subset needed for labels is understood: elements with quoted or
//! bare attributes, text, self-closing and void elements, comments, and
//! character references. Nesting is forgiving the way browsers are: open
//! elements close at end of input, a close tag for an ancestor closes
//! everything inside it, and stray close tags are dropped. Broken tags and
//! attributes are reported as a [`FragmentError`].

use std::fmt;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Concatenated text of all descendants, with runs of whitespace collapsed.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => {
                    out.push(' ');
                    element.collect_text(out);
                    out.push(' ');
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentError {
    pub message: String,
    /// Byte offset into the fragment.
    pub offset: usize,
}

impl FragmentError {
    fn new(msg: impl Into<String>, offset: usize) -> Self {
        Self {
            message: msg.into(),
            offset,
        }
    }
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "markup error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for FragmentError {}

/// Parses `src` and returns its first top-level element, if any.
pub fn parse_fragment(src: &str) -> Result<Option<Element>, FragmentError> {
    let mut open = Vec::new();
    let (nodes, _) = Parser::new(src).parse_nodes(&mut open)?;

    Ok(nodes.into_iter().find_map(|node| match node {
        Node::Element(element) => Some(element),
        Node::Text(_) => None,
    }))
}

/// What ended a run of sibling nodes.
#[derive(Debug, PartialEq)]
enum Closed {
    EndOfInput,
    /// A close tag for this element or one of its ancestors.
    Tag(String),
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn err(&self, msg: impl Into<String>) -> FragmentError {
        FragmentError::new(msg, self.pos)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn eat(&mut self, expected: char) -> Result<(), FragmentError> {
        match self.advance() {
            Some(ch) if ch == expected => Ok(()),
            Some(ch) => Err(self.err(format!("expected '{}', got '{}'", expected, ch))),
            None => Err(self.err(format!("expected '{}', got end of input", expected))),
        }
    }

    fn name(&mut self) -> Result<String, FragmentError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.'))
        {
            self.advance();
        }

        if self.pos == start {
            return Err(self.err("expected a name"));
        }

        Ok(self.src[start..self.pos].to_ascii_lowercase())
    }

    /// Parses sibling nodes until a close tag for one of the `open` elements, or
    /// end of input.
    fn parse_nodes(&mut self, open: &mut Vec<String>) -> Result<(Vec<Node>, Closed), FragmentError> {
        let mut nodes = Vec::new();

        loop {
            let rest = self.rest();

            if rest.is_empty() {
                return Ok((nodes, Closed::EndOfInput));
            }

            if rest.starts_with("<!--") {
                let end = rest
                    .find("-->")
                    .ok_or_else(|| self.err("unterminated comment"))?;
                self.pos += end + "-->".len();
            } else if rest.starts_with("</") {
                self.pos += 2;
                let tag = self.name()?;
                self.skip_whitespace();
                self.eat('>')?;

                if open.contains(&tag) {
                    return Ok((nodes, Closed::Tag(tag)));
                }
                log::trace!("Dropping stray </{}>", tag);
            } else if rest.starts_with('<') {
                let (element, pending) = self.parse_element(open)?;
                nodes.push(Node::Element(element));

                // The element was closed by an ancestor's tag or the input ran out
                if let Some(closed) = pending {
                    return Ok((nodes, closed));
                }
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = decode_entities(&rest[..end]);
                self.pos += end;
                if !text.is_empty() {
                    nodes.push(Node::Text(text));
                }
            }
        }
    }

    /// Parses one element. The second value is set when something other than the
    /// element's own close tag ended it.
    fn parse_element(
        &mut self,
        open: &mut Vec<String>,
    ) -> Result<(Element, Option<Closed>), FragmentError> {
        self.eat('<')?;
        let tag = self.name()?;
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('>') => {
                    self.advance();
                    break;
                }
                Some('/') => {
                    self.advance();
                    self.eat('>')?;
                    let element = Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    };
                    return Ok((element, None));
                }
                Some(_) => attributes.push(self.parse_attribute()?),
                None => return Err(self.err(format!("unterminated <{}", tag))),
            }
        }

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            let element = Element {
                tag,
                attributes,
                children: Vec::new(),
            };
            return Ok((element, None));
        }

        open.push(tag);
        let children = self.parse_nodes(open);
        let tag = open.pop().unwrap_or_default();
        let (children, closed) = children?;

        let pending = match closed {
            Closed::Tag(closer) if closer == tag => None,
            other => Some(other),
        };

        Ok((
            Element {
                tag,
                attributes,
                children,
            },
            pending,
        ))
    }

    fn parse_attribute(&mut self) -> Result<(String, String), FragmentError> {
        let key = self.name()?;
        self.skip_whitespace();

        if self.peek() != Some('=') {
            return Ok((key, String::new()));
        }
        self.advance();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.advance();
                let rest = self.rest();
                let end = rest
                    .find(quote)
                    .ok_or_else(|| self.err(format!("unterminated value of '{}'", key)))?;
                let value = &rest[..end];
                self.pos += end + quote.len_utf8();
                value
            }
            _ => {
                let rest = self.rest();
                let end = rest
                    .find(|ch: char| ch.is_whitespace() || ch == '>' || ch == '/')
                    .unwrap_or(rest.len());
                self.pos += end;
                &rest[..end]
            }
        };

        Ok((key, decode_entities(value)))
    }
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, end))
        });

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Element {
        parse_fragment(src).unwrap().unwrap()
    }

    #[test]
    fn label_markup() {
        let element = parse(
            r#"<div class="floorText-3d animated fadeIn" id="A栋"><p class="text">A栋</p></div>"#,
        );

        assert_eq!(element.tag, "div");
        assert_eq!(element.id(), Some("A栋"));
        assert!(element.has_class("floorText-3d"));
        assert!(element.has_class("fadeIn"));
        assert!(!element.has_class("text"));
        assert_eq!(element.text_content(), "A栋");
    }

    #[test]
    fn first_element_wins() {
        let element = parse("  text <span>one</span><span>two</span>");
        assert_eq!(element.text_content(), "one");
    }

    #[test]
    fn no_element_is_none() {
        assert_eq!(parse_fragment("just text").unwrap(), None);
        assert_eq!(parse_fragment("").unwrap(), None);
        assert_eq!(parse_fragment("<!-- nothing -->").unwrap(), None);
    }

    #[test]
    fn entities_and_bare_attributes() {
        let element = parse("<p title=a&amp;b data-x hidden>1 &lt; 2 &#x41;&#66; &bogus;</p>");
        assert_eq!(element.attribute("title"), Some("a&b"));
        assert_eq!(element.attribute("hidden"), Some(""));
        assert_eq!(element.text_content(), "1 < 2 AB &bogus;");
    }

    #[test]
    fn void_and_self_closing() {
        let element = parse("<div>a<br>b<img src='x.png'/>c</div>");
        assert_eq!(element.children.len(), 5);
        assert_eq!(element.text_content(), "a b c");
    }

    #[test]
    fn unclosed_elements_close_at_end_of_input() {
        let element = parse(r#"<div class="floorText-3d">A栋"#);
        assert!(element.has_class("floorText-3d"));
        assert_eq!(element.text_content(), "A栋");

        let element = parse("<div><p>one<span>two");
        assert_eq!(element.text_content(), "one two");
    }

    #[test]
    fn ancestor_close_tag_closes_inner_elements() {
        let element = parse("<div><p>text</div><span>after</span>");
        assert_eq!(element.tag, "div");
        assert_eq!(element.text_content(), "text");

        let Some(Node::Element(p)) = element.children.first() else {
            panic!("expected <p>, got {:?}", element.children);
        };
        assert_eq!(p.tag, "p");
    }

    #[test]
    fn stray_close_tags_are_dropped() {
        assert_eq!(parse_fragment("</div>").unwrap(), None);

        let element = parse("<div>a</span>b</div>");
        assert_eq!(element.text_content(), "ab");
    }

    #[test]
    fn broken_tags_are_errors() {
        assert!(parse_fragment("<div class=\"open>").is_err());
        assert!(parse_fragment("< div>").is_err());
        assert!(parse_fragment("<div").is_err());
        assert!(parse_fragment("<!-- open").is_err());
    }
}
