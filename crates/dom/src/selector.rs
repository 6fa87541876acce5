//! CSS selector parsing and matching
//!
//! Covers the dialect the engine emits and consumes: tag / `#id` /
//! `.class` compounds, attribute presence, equality and substring tests,
//! `:not(...)`, `:first-child`, `:nth-child(n)`, descendant and child
//! combinators, and comma-separated lists. Deliberately not a full CSS
//! implementation.

use tubedeck_core_types::NodeId;

use crate::errors::DomError;
use crate::tree::Tree;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AttrOp {
    /// `[attr]`
    Exists,
    /// `[attr="value"]`
    Equals,
    /// `[attr*="value"]`
    Contains,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AttrSelector {
    pub name: String,
    pub op: AttrOp,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Pseudo {
    Not(Box<Compound>),
    FirstChild,
    NthChild(usize),
}

/// One simple-selector sequence, e.g. `button.primary[aria-label="Go"]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
    pub pseudos: Vec<Pseudo>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

/// Compounds right-to-left: `parts[0]` is the subject, each following
/// entry names the relation to the next compound to the left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Complex {
    pub parts: Vec<(Option<Combinator>, Compound)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SelectorList {
    pub selectors: Vec<Complex>,
}

// ---------------------------------------------------------------------------
// Parsing

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n')) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse_ident(&mut self) -> Result<String, String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err("expected identifier".into());
        }
        Ok(std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| "non-ascii selector".to_string())?
            .to_string())
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, String> {
        // caller consumed '['
        self.skip_whitespace();
        let name = self.parse_ident()?;
        self.skip_whitespace();
        let op = match self.peek() {
            Some(b']') => {
                self.bump();
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some(b'=') => {
                self.bump();
                AttrOp::Equals
            }
            Some(b'*') => {
                self.bump();
                if self.bump() != Some(b'=') {
                    return Err("expected `*=` in attribute selector".into());
                }
                AttrOp::Contains
            }
            _ => return Err("malformed attribute selector".into()),
        };
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.bump();
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b == quote {
                        break;
                    }
                    self.pos += 1;
                }
                if self.peek() != Some(quote) {
                    return Err("unterminated quoted attribute value".into());
                }
                let value = std::str::from_utf8(&self.input[start..self.pos])
                    .map_err(|_| "non-ascii selector".to_string())?
                    .to_string();
                self.bump();
                value
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        if self.bump() != Some(b']') {
            return Err("expected `]`".into());
        }
        Ok(AttrSelector { name, op, value })
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo, String> {
        // caller consumed ':'
        let name = self.parse_ident()?;
        match name.as_str() {
            "first-child" => Ok(Pseudo::FirstChild),
            "nth-child" => {
                if self.bump() != Some(b'(') {
                    return Err("expected `(` after :nth-child".into());
                }
                self.skip_whitespace();
                let digits = self.parse_ident()?;
                let n: usize = digits
                    .parse()
                    .map_err(|_| format!("invalid :nth-child argument `{digits}`"))?;
                self.skip_whitespace();
                if self.bump() != Some(b')') {
                    return Err("expected `)`".into());
                }
                Ok(Pseudo::NthChild(n))
            }
            "not" => {
                if self.bump() != Some(b'(') {
                    return Err("expected `(` after :not".into());
                }
                self.skip_whitespace();
                let inner = self.parse_compound()?;
                self.skip_whitespace();
                if self.bump() != Some(b')') {
                    return Err("expected `)`".into());
                }
                Ok(Pseudo::Not(Box::new(inner)))
            }
            other => Err(format!("unsupported pseudo-class `:{other}`")),
        }
    }

    fn parse_compound(&mut self) -> Result<Compound, String> {
        let mut compound = Compound::default();
        if self.peek() == Some(b'*') {
            self.bump();
        } else if matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some(b'#') => {
                    self.bump();
                    compound.id = Some(self.parse_ident()?);
                }
                Some(b'.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some(b'[') => {
                    self.bump();
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(b':') => {
                    self.bump();
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err("empty compound selector".into());
        }
        Ok(compound)
    }

    fn parse_complex(&mut self) -> Result<Complex, String> {
        // parsed left to right, stored right to left for matching
        let mut left_to_right: Vec<(Option<Combinator>, Compound)> = Vec::new();
        self.skip_whitespace();
        let first = self.parse_compound()?;
        left_to_right.push((None, first));
        loop {
            let had_space = self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    self.bump();
                    self.skip_whitespace();
                    let next = self.parse_compound()?;
                    left_to_right.push((Some(Combinator::Child), next));
                }
                Some(b',') | None => break,
                Some(_) if had_space => {
                    let next = self.parse_compound()?;
                    left_to_right.push((Some(Combinator::Descendant), next));
                }
                Some(b) => return Err(format!("unexpected character `{}`", b as char)),
            }
        }

        // Reverse: subject first, each entry carrying the combinator that
        // links it to the compound on its left.
        let mut parts = Vec::with_capacity(left_to_right.len());
        let mut pending: Option<Combinator> = None;
        for (combinator, compound) in left_to_right.into_iter().rev() {
            parts.push((pending, compound));
            pending = combinator;
        }
        Ok(Complex { parts })
    }

    fn parse_list(&mut self) -> Result<SelectorList, String> {
        let mut selectors = Vec::new();
        loop {
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                None => break,
                Some(b) => return Err(format!("unexpected character `{}`", b as char)),
            }
        }
        Ok(SelectorList { selectors })
    }
}

pub(crate) fn parse(selector: &str) -> Result<SelectorList, DomError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(DomError::invalid_selector(selector, "empty selector"));
    }
    Parser::new(trimmed)
        .parse_list()
        .map_err(|reason| DomError::invalid_selector(selector, reason))
}

// ---------------------------------------------------------------------------
// Matching

fn matches_compound(tree: &Tree, id: NodeId, compound: &Compound) -> bool {
    let Ok(element) = tree.element(id) else {
        return false;
    };
    if let Some(tag) = &compound.tag {
        if element.tag != *tag {
            return false;
        }
    }
    if let Some(wanted) = &compound.id {
        if element.attributes.get("id") != Some(wanted) {
            return false;
        }
    }
    for class in &compound.classes {
        if !element.has_class(class) {
            return false;
        }
    }
    for attr in &compound.attrs {
        let value = element.attributes.get(&attr.name);
        let ok = match attr.op {
            AttrOp::Exists => value.is_some(),
            AttrOp::Equals => value.map(|v| *v == attr.value).unwrap_or(false),
            AttrOp::Contains => value.map(|v| v.contains(&attr.value)).unwrap_or(false),
        };
        if !ok {
            return false;
        }
    }
    for pseudo in &compound.pseudos {
        let ok = match pseudo {
            Pseudo::Not(inner) => !matches_compound(tree, id, inner),
            Pseudo::FirstChild => element_index(tree, id) == Some(1),
            Pseudo::NthChild(n) => element_index(tree, id) == Some(*n),
        };
        if !ok {
            return false;
        }
    }
    true
}

/// 1-based position of `id` among its parent's element children.
fn element_index(tree: &Tree, id: NodeId) -> Option<usize> {
    let parent = tree.parent(id).ok()??;
    let siblings = tree.child_elements(parent).ok()?;
    siblings.iter().position(|s| *s == id).map(|i| i + 1)
}

fn matches_from(tree: &Tree, id: NodeId, parts: &[(Option<Combinator>, Compound)]) -> bool {
    let Some(((_, compound), rest)) = parts.split_first() else {
        return true;
    };
    if !matches_compound(tree, id, compound) {
        return false;
    }
    let Some((next_combinator, _)) = rest.first() else {
        return true;
    };
    match next_combinator {
        Some(Combinator::Child) => match tree.parent(id) {
            Ok(Some(parent)) => matches_from(tree, parent, rest),
            _ => false,
        },
        Some(Combinator::Descendant) => {
            let mut current = tree.parent(id).ok().flatten();
            while let Some(ancestor) = current {
                if matches_from(tree, ancestor, rest) {
                    return true;
                }
                current = tree.parent(ancestor).ok().flatten();
            }
            false
        }
        // subject position carries no combinator
        None => false,
    }
}

pub(crate) fn matches(tree: &Tree, id: NodeId, list: &SelectorList) -> bool {
    list.selectors
        .iter()
        .any(|complex| matches_from(tree, id, &complex.parts))
}

/// First matching element among `scope`'s descendants, document order.
pub(crate) fn query_first(tree: &Tree, scope: NodeId, list: &SelectorList) -> Option<NodeId> {
    tree.descendant_elements(scope, false)
        .into_iter()
        .find(|id| matches(tree, *id, list))
}

/// All matching elements among `scope`'s descendants, document order.
pub(crate) fn query_all(tree: &Tree, scope: NodeId, list: &SelectorList) -> Vec<NodeId> {
    tree.descendant_elements(scope, false)
        .into_iter()
        .filter(|id| matches(tree, *id, list))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let row = tree.create_element("div");
        tree.element_mut(row)
            .unwrap()
            .attributes
            .insert("id".into(), "top-row".into());
        tree.append_child(tree.body(), row).unwrap();

        let button = tree.create_element("button");
        {
            let data = tree.element_mut(button).unwrap();
            data.attributes
                .insert("aria-label".into(), "like this video".into());
            data.attributes.insert("class".into(), "yt-button primary".into());
        }
        tree.append_child(row, button).unwrap();

        let second = tree.create_element("button");
        tree.element_mut(second)
            .unwrap()
            .attributes
            .insert("hidden".into(), String::new());
        tree.append_child(row, second).unwrap();

        (tree, row, button, second)
    }

    fn sel(s: &str) -> SelectorList {
        parse(s).unwrap()
    }

    #[test]
    fn id_and_tag_compounds() {
        let (tree, row, button, _) = fixture();
        assert!(matches(&tree, row, &sel("#top-row")));
        assert!(matches(&tree, row, &sel("div#top-row")));
        assert!(!matches(&tree, row, &sel("span#top-row")));
        assert!(matches(&tree, button, &sel("button.primary")));
    }

    #[test]
    fn attribute_operators() {
        let (tree, _, button, second) = fixture();
        assert!(matches(&tree, button, &sel("button[aria-label*=\"like\"]")));
        assert!(matches(
            &tree,
            button,
            &sel("button[aria-label=\"like this video\"]")
        ));
        assert!(!matches(&tree, button, &sel("button[aria-label=\"like\"]")));
        assert!(matches(&tree, second, &sel("[hidden]")));
        assert!(matches(&tree, button, &sel("button:not([hidden])")));
        assert!(!matches(&tree, second, &sel("button:not([hidden])")));
    }

    #[test]
    fn structural_pseudos() {
        let (tree, _, button, second) = fixture();
        assert!(matches(&tree, button, &sel("button:first-child")));
        assert!(!matches(&tree, second, &sel("button:first-child")));
        assert!(matches(&tree, second, &sel("button:nth-child(2)")));
    }

    #[test]
    fn combinators_and_lists() {
        let (tree, _, button, _) = fixture();
        assert!(matches(&tree, button, &sel("#top-row button")));
        assert!(matches(&tree, button, &sel("#top-row > button")));
        assert!(matches(&tree, button, &sel("body #top-row > button")));
        assert!(!matches(&tree, button, &sel("#other button")));
        assert!(matches(&tree, button, &sel("#nope, button.primary")));
    }

    #[test]
    fn query_is_document_order() {
        let (tree, _, button, second) = fixture();
        let list = sel("button");
        assert_eq!(query_first(&tree, tree.body(), &list), Some(button));
        assert_eq!(query_all(&tree, tree.body(), &list), vec![button, second]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("##").is_err());
        assert!(parse("div >").is_err());
        assert!(parse("div:hover").is_err());
    }
}
