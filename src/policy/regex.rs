// policy/regex.rs - Component-level Name Regex

//! Regex-like templates matched against whole components of a [`Name`].
//!
//! Syntax:
//!
//! - `<lit>` matches one component whose escaped form matches `lit`
//!   (`.`, `*`, `+`, `?` and `\` work inside the brackets)
//! - `<>` matches any single component
//! - `[<a><b>]` matches one component from the set, `[^<a>]` one outside it
//! - `( ... )` capture group, numbered by opening parenthesis
//! - `*`, `+`, `?`, `{n}`, `{n,}`, `{n,m}` quantifiers (greedy)
//! - `^` / `$` anchor the match at the first / last component
//!
//! Expansion templates such as `\1\2` or `\1<KEY>` rebuild a name from the
//! captured groups.

use std::collections::HashSet;
use thiserror::Error;

use crate::name::{Component, Name};

/// Errors produced while compiling a pattern or expansion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegexError {
    #[error("Unbalanced '{0}' at offset {1}")]
    Unbalanced(char, usize),

    #[error("Unexpected character '{0}' at offset {1}")]
    Unexpected(char, usize),

    #[error("Quantifier without operand at offset {0}")]
    DanglingQuantifier(usize),

    #[error("Invalid repetition bounds at offset {0}")]
    InvalidBounds(usize),

    #[error("Empty component set at offset {0}")]
    EmptySet(usize),

    #[error("Invalid expansion template: {0}")]
    InvalidExpansion(String),
}

#[derive(Debug, Clone, Copy)]
enum CharAtom {
    Any,
    Char(char),
}

impl CharAtom {
    fn matches(&self, c: char) -> bool {
        match self {
            CharAtom::Any => true,
            CharAtom::Char(expected) => *expected == c,
        }
    }
}

#[derive(Debug, Clone)]
struct CharTerm {
    atom: CharAtom,
    min: usize,
    max: Option<usize>,
}

/// Pattern applied to the escaped text of one component
#[derive(Debug, Clone)]
enum ComponentPattern {
    Any,
    Literal(String),
    Chars(Vec<CharTerm>),
}

impl ComponentPattern {
    fn parse(text: &str, offset: usize) -> Result<Self, RegexError> {
        if text.is_empty() {
            return Ok(ComponentPattern::Any);
        }

        let mut terms: Vec<CharTerm> = Vec::new();
        let mut literal = true;
        let mut chars = text.chars().enumerate();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars
                        .next()
                        .ok_or(RegexError::Unexpected('\\', offset + i))?;
                    terms.push(CharTerm { atom: CharAtom::Char(escaped), min: 1, max: Some(1) });
                }
                '.' => {
                    literal = false;
                    terms.push(CharTerm { atom: CharAtom::Any, min: 1, max: Some(1) });
                }
                '*' | '+' | '?' => {
                    literal = false;
                    let last = terms
                        .last_mut()
                        .ok_or(RegexError::DanglingQuantifier(offset + i))?;
                    let (min, max) = match c {
                        '*' => (0, None),
                        '+' => (1, None),
                        _ => (0, Some(1)),
                    };
                    last.min = min;
                    last.max = max;
                }
                other => terms.push(CharTerm { atom: CharAtom::Char(other), min: 1, max: Some(1) }),
            }
        }

        if literal {
            let text = terms
                .iter()
                .filter_map(|t| match t.atom {
                    CharAtom::Char(c) => Some(c),
                    CharAtom::Any => None,
                })
                .collect();
            Ok(ComponentPattern::Literal(text))
        } else {
            Ok(ComponentPattern::Chars(terms))
        }
    }

    fn matches(&self, component: &Component) -> bool {
        match self {
            ComponentPattern::Any => true,
            ComponentPattern::Literal(text) => component.to_escaped() == *text,
            ComponentPattern::Chars(terms) => {
                let text: Vec<char> = component.to_escaped().chars().collect();
                match_chars(terms, &text)
            }
        }
    }
}

fn match_chars(terms: &[CharTerm], text: &[char]) -> bool {
    let Some((first, rest)) = terms.split_first() else {
        return text.is_empty();
    };

    let mut taken = 0;
    while taken < text.len()
        && first.max.is_none_or(|max| taken < max)
        && first.atom.matches(text[taken])
    {
        taken += 1;
    }
    if taken < first.min {
        return false;
    }
    (first.min..=taken).rev().any(|k| match_chars(rest, &text[k..]))
}

#[derive(Debug, Clone)]
enum Matcher {
    Component(ComponentPattern),
    Set { negated: bool, members: Vec<ComponentPattern> },
}

impl Matcher {
    fn matches(&self, component: &Component) -> bool {
        match self {
            Matcher::Component(p) => p.matches(component),
            Matcher::Set { negated, members } => {
                members.iter().any(|m| m.matches(component)) != *negated
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Atom(Matcher),
    Group(usize, Vec<Term>),
}

#[derive(Debug, Clone)]
struct Term {
    node: Node,
    min: usize,
    max: Option<usize>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    groups: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            groups: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_sequence(&mut self, in_group: bool) -> Result<Vec<Term>, RegexError> {
        let mut terms = Vec::new();

        while let Some(c) = self.peek() {
            let node = match c {
                '<' => Node::Atom(Matcher::Component(self.parse_component()?)),
                '[' => Node::Atom(self.parse_set()?),
                '(' => {
                    let open = self.pos;
                    self.pos += 1;
                    self.groups += 1;
                    let index = self.groups;
                    let body = self.parse_sequence(true)?;
                    if self.peek() != Some(')') {
                        return Err(RegexError::Unbalanced('(', open));
                    }
                    self.pos += 1;
                    Node::Group(index, body)
                }
                ')' if in_group => return Ok(terms),
                ')' => return Err(RegexError::Unbalanced(')', self.pos)),
                '*' | '+' | '?' | '{' => return Err(RegexError::DanglingQuantifier(self.pos)),
                other => return Err(RegexError::Unexpected(other, self.pos)),
            };

            let (min, max) = self.parse_quantifier()?;
            terms.push(Term { node, min, max });
        }

        Ok(terms)
    }

    fn parse_component(&mut self) -> Result<ComponentPattern, RegexError> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;

        while let Some(c) = self.peek() {
            match c {
                '\\' => self.pos += 2,
                '>' => {
                    let text: String = self.chars[start..self.pos].iter().collect();
                    self.pos += 1;
                    return ComponentPattern::parse(&text, start);
                }
                _ => self.pos += 1,
            }
        }

        Err(RegexError::Unbalanced('<', open))
    }

    fn parse_set(&mut self) -> Result<Matcher, RegexError> {
        let open = self.pos;
        self.pos += 1;

        let negated = self.peek() == Some('^');
        if negated {
            self.pos += 1;
        }

        let mut members = Vec::new();
        loop {
            match self.peek() {
                Some('<') => members.push(self.parse_component()?),
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some(other) => return Err(RegexError::Unexpected(other, self.pos)),
                None => return Err(RegexError::Unbalanced('[', open)),
            }
        }

        if members.is_empty() {
            return Err(RegexError::EmptySet(open));
        }
        Ok(Matcher::Set { negated, members })
    }

    fn parse_quantifier(&mut self) -> Result<(usize, Option<usize>), RegexError> {
        let bounds = match self.peek() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') => return self.parse_bounds(),
            _ => return Ok((1, Some(1))),
        };
        self.pos += 1;
        Ok(bounds)
    }

    fn parse_bounds(&mut self) -> Result<(usize, Option<usize>), RegexError> {
        let open = self.pos;
        let close = self.chars[open..]
            .iter()
            .position(|c| *c == '}')
            .map(|i| open + i)
            .ok_or(RegexError::Unbalanced('{', open))?;

        let body: String = self.chars[open + 1..close].iter().collect();
        self.pos = close + 1;

        let parse = |s: &str| s.trim().parse::<usize>().map_err(|_| RegexError::InvalidBounds(open));

        let (min, max) = match body.split_once(',') {
            None => {
                let n = parse(&body)?;
                (n, Some(n))
            }
            Some((lo, hi)) if hi.trim().is_empty() => (parse(lo)?, None),
            Some((lo, hi)) => (parse(lo)?, Some(parse(hi)?)),
        };

        if max.is_some_and(|max| max < min) {
            return Err(RegexError::InvalidBounds(open));
        }
        Ok((min, max))
    }
}

#[derive(Debug, Clone)]
enum Inst {
    Test(Matcher),
    Split(usize, usize),
    Jmp(usize),
    Save(usize),
    Match,
}

#[derive(Default)]
struct Compiler {
    program: Vec<Inst>,
}

impl Compiler {
    fn push(&mut self, inst: Inst) -> usize {
        self.program.push(inst);
        self.program.len() - 1
    }

    fn emit_term(&mut self, term: &Term) {
        for _ in 0..term.min {
            self.emit_node(&term.node);
        }

        match term.max {
            None => {
                let split = self.push(Inst::Split(0, 0));
                self.emit_node(&term.node);
                self.push(Inst::Jmp(split));
                let end = self.program.len();
                self.program[split] = Inst::Split(split + 1, end);
            }
            Some(max) => {
                for _ in term.min..max {
                    let split = self.push(Inst::Split(0, 0));
                    self.emit_node(&term.node);
                    let end = self.program.len();
                    self.program[split] = Inst::Split(split + 1, end);
                }
            }
        }
    }

    fn emit_node(&mut self, node: &Node) {
        match node {
            Node::Atom(m) => {
                self.push(Inst::Test(m.clone()));
            }
            Node::Group(index, body) => {
                self.push(Inst::Save(index * 2));
                for term in body {
                    self.emit_term(term);
                }
                self.push(Inst::Save(index * 2 + 1));
            }
        }
    }
}

/// Captured groups of a successful match; group 0 is the whole match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<Option<Name>>,
}

impl Captures {
    /// Group `index`, if it participated in the match
    pub fn get(&self, index: usize) -> Option<&Name> {
        self.groups.get(index).and_then(|g| g.as_ref())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Build a name from an expansion template
    pub fn expand(&self, expansion: &Expansion) -> Name {
        let mut out = Name::new();
        for part in &expansion.parts {
            out = match part {
                ExpansionPart::Group(index) => match self.get(*index) {
                    Some(group) => out.append_name(group),
                    None => out,
                },
                ExpansionPart::Literal(component) => out.append(component.clone()),
            };
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExpansionPart {
    Group(usize),
    Literal(Component),
}

/// A parsed expansion template such as `\1\2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    source: String,
    parts: Vec<ExpansionPart>,
}

impl Expansion {
    pub fn parse(template: &str) -> Result<Self, RegexError> {
        let invalid = || RegexError::InvalidExpansion(template.to_string());
        let chars: Vec<char> = template.chars().collect();
        let mut parts = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end].is_ascii_digit() {
                        end += 1;
                    }
                    if end == start {
                        return Err(invalid());
                    }
                    let digits: String = chars[start..end].iter().collect();
                    let index = digits.parse().map_err(|_| invalid())?;
                    parts.push(ExpansionPart::Group(index));
                    i = end;
                }
                '<' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == '>')
                        .map(|p| i + p)
                        .ok_or_else(invalid)?;
                    let text: String = chars[i + 1..close].iter().collect();
                    let component = Component::from_escaped(&text).map_err(|_| invalid())?;
                    parts.push(ExpansionPart::Literal(component));
                    i = close + 1;
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            source: template.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Highest group referenced by the template
    fn max_group(&self) -> usize {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ExpansionPart::Group(i) => Some(*i),
                ExpansionPart::Literal(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// A compiled component-level name pattern
#[derive(Debug, Clone)]
pub struct NameRegex {
    pattern: String,
    program: Vec<Inst>,
    group_count: usize,
    anchored_start: bool,
    anchored_end: bool,
}

impl NameRegex {
    /// Compile a pattern
    pub fn new(pattern: &str) -> Result<Self, RegexError> {
        let mut body = pattern.trim();

        let anchored_start = body.starts_with('^');
        if anchored_start {
            body = &body[1..];
        }

        let anchored_end = body.ends_with('$') && !body.ends_with("\\$");
        if anchored_end {
            body = &body[..body.len() - 1];
        }

        let mut parser = Parser::new(body);
        let terms = parser.parse_sequence(false)?;

        let mut compiler = Compiler::default();
        for term in &terms {
            compiler.emit_term(term);
        }
        compiler.push(Inst::Match);

        Ok(Self {
            pattern: pattern.to_string(),
            program: compiler.program,
            group_count: parser.groups,
            anchored_start,
            anchored_end,
        })
    }

    /// Pattern that matches exactly the components of `name`
    pub fn literal(name: &Name) -> Result<Self, RegexError> {
        let mut pattern = String::from("^");
        for c in name.components() {
            pattern.push_str(&literal_component(c));
        }
        pattern.push('$');
        Self::new(&pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn is_match(&self, name: &Name) -> bool {
        self.captures(name).is_some()
    }

    /// Match and collect capture groups
    pub fn captures(&self, name: &Name) -> Option<Captures> {
        let components = name.components();
        let last_start = if self.anchored_start { 0 } else { components.len() };

        (0..=last_start).find_map(|start| {
            self.execute(components, start).map(|slots| Captures {
                groups: (0..=self.group_count)
                    .map(|g| match (slots[g * 2], slots[g * 2 + 1]) {
                        (Some(s), Some(e)) if e >= s => Some(name.sub_name(s, e - s)),
                        _ => None,
                    })
                    .collect(),
            })
        })
    }

    /// Match `name` and build the expansion from its captures
    pub fn expand(&self, name: &Name, expansion: &Expansion) -> Option<Name> {
        self.captures(name).map(|caps| caps.expand(expansion))
    }

    /// Check that an expansion only refers to groups this pattern defines
    pub fn check_expansion(&self, expansion: &Expansion) -> Result<(), RegexError> {
        if expansion.max_group() > self.group_count {
            return Err(RegexError::InvalidExpansion(expansion.as_str().to_string()));
        }
        Ok(())
    }

    fn execute(&self, components: &[Component], start: usize) -> Option<Vec<Option<usize>>> {
        struct Thread {
            pc: usize,
            pos: usize,
            slots: Vec<Option<usize>>,
        }

        let slot_count = (self.group_count + 1) * 2;
        let mut visited = HashSet::new();
        let mut stack = vec![Thread { pc: 0, pos: start, slots: vec![None; slot_count] }];

        while let Some(Thread { mut pc, mut pos, mut slots }) = stack.pop() {
            // a state that failed once fails again, whatever the captures
            while visited.insert((pc, pos)) {
                match &self.program[pc] {
                    Inst::Test(matcher) => {
                        if pos < components.len() && matcher.matches(&components[pos]) {
                            pc += 1;
                            pos += 1;
                        } else {
                            break;
                        }
                    }
                    Inst::Split(first, second) => {
                        stack.push(Thread { pc: *second, pos, slots: slots.clone() });
                        pc = *first;
                    }
                    Inst::Jmp(target) => pc = *target,
                    Inst::Save(slot) => {
                        slots[*slot] = Some(pos);
                        pc += 1;
                    }
                    Inst::Match => {
                        if self.anchored_end && pos != components.len() {
                            break;
                        }
                        slots[0] = Some(start);
                        slots[1] = Some(pos);
                        return Some(slots);
                    }
                }
            }
        }

        None
    }
}

/// `<...>` atom matching exactly this component
pub fn literal_component(component: &Component) -> String {
    format!("<{}>", component.to_escaped().replace('.', "\\."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn expansion(t: &str) -> Expansion {
        Expansion::parse(t).unwrap()
    }

    #[test]
    fn test_literal_and_wildcard() {
        let re = NameRegex::new("^<ndn><>$").unwrap();
        assert!(re.is_match(&name("/ndn/anything")));
        assert!(!re.is_match(&name("/ndn")));
        assert!(!re.is_match(&name("/ndn/a/b")));
        assert!(!re.is_match(&name("/other/a")));
    }

    #[test]
    fn test_unanchored_matches_anywhere() {
        let re = NameRegex::new("<KEY><>").unwrap();
        assert!(re.is_match(&name("/alice/KEY/ksk-1/ID-CERT")));
        assert!(!re.is_match(&name("/alice/ksk-1")));

        let prefix_only = NameRegex::new("^<a><b>").unwrap();
        assert!(prefix_only.is_match(&name("/a/b/c/d")));
        assert!(!prefix_only.is_match(&name("/x/a/b")));
    }

    #[test]
    fn test_component_patterns() {
        let re = NameRegex::new("^<dsk-.*>$").unwrap();
        assert!(re.is_match(&name("/dsk-1700000000")));
        assert!(re.is_match(&name("/dsk-")));
        assert!(!re.is_match(&name("/ksk-1700000000")));
        assert!(!re.is_match(&name("/xdsk-1")));

        let dotted = NameRegex::new("^<a\\.b>$").unwrap();
        assert!(dotted.is_match(&name("/a.b")));
        assert!(!dotted.is_match(&name("/axb")));

        let plus = NameRegex::new("^<ab+c?>$").unwrap();
        assert!(plus.is_match(&name("/abbb")));
        assert!(plus.is_match(&name("/abc")));
        assert!(!plus.is_match(&name("/ac")));
    }

    #[test]
    fn test_sets() {
        let re = NameRegex::new("^[<dsk-.*><ksk-.*>]$").unwrap();
        assert!(re.is_match(&name("/dsk-1")));
        assert!(re.is_match(&name("/ksk-1")));
        assert!(!re.is_match(&name("/tsk-1")));

        let negated = NameRegex::new("^([^<KEY>]*)<KEY>").unwrap();
        let caps = negated.captures(&name("/ndn/alice/KEY/ksk-1")).unwrap();
        assert_eq!(caps.get(1).unwrap(), &name("/ndn/alice"));
        assert!(!negated.is_match(&name("/ndn/alice")));
    }

    #[test]
    fn test_invitation_pattern() {
        let re =
            NameRegex::new("^<ndn><broadcast><chronos><invitation>([^<chatroom>]*)<chatroom>").unwrap();
        let n = name("/ndn/broadcast/chronos/invitation/ndn/bob/chatroom/lobby/x/y/z");
        assert_eq!(re.expand(&n, &expansion("\\1")).unwrap(), name("/ndn/bob"));
        assert!(!re.is_match(&name("/ndn/broadcast/chronos/invitation/ndn/bob")));
    }

    #[test]
    fn test_key_name_expansion() {
        let ksk = NameRegex::new("^([^<KEY>]*)<KEY>(<>*<ksk-.*>)<ID-CERT><>$").unwrap();
        let cert = name("/ndn/alice/KEY/ksk-123/ID-CERT").append_version(7);
        assert_eq!(
            ksk.expand(&cert, &expansion("\\1\\2")).unwrap(),
            name("/ndn/alice/ksk-123")
        );

        let signer = NameRegex::new("^([^<KEY>]*)<KEY>(<>*)[<dsk-.*><ksk-.*>]<ID-CERT>$").unwrap();
        assert_eq!(
            signer
                .expand(&name("/ndn/alice/KEY/dsk-9/ID-CERT"), &expansion("\\1\\2"))
                .unwrap(),
            name("/ndn/alice")
        );
        assert_eq!(
            signer
                .expand(&name("/ndn/alice/KEY/sub/dsk-9/ID-CERT"), &expansion("\\1\\2"))
                .unwrap(),
            name("/ndn/alice/sub")
        );
    }

    #[test]
    fn test_bounded_repetition() {
        let re = NameRegex::new("^<a>{2,3}$").unwrap();
        assert!(!re.is_match(&name("/a")));
        assert!(re.is_match(&name("/a/a")));
        assert!(re.is_match(&name("/a/a/a")));
        assert!(!re.is_match(&name("/a/a/a/a")));

        let exact = NameRegex::new("^<>{2}$").unwrap();
        assert!(exact.is_match(&name("/x/y")));

        let open = NameRegex::new("^<a>{1,}$").unwrap();
        assert!(open.is_match(&name("/a/a/a/a")));
    }

    #[test]
    fn test_nested_empty_groups_terminate() {
        let re = NameRegex::new("^((<>*)*)<z>$").unwrap();
        assert!(re.is_match(&name("/a/b/z")));
        assert!(!re.is_match(&name("/a/b/c")));
    }

    #[test]
    fn test_expansion_with_literals() {
        let re = NameRegex::new("^(<>*)<KEY>(<>)").unwrap();
        let out = re
            .expand(&name("/alice/KEY/ksk-1/ID-CERT"), &expansion("\\1<KEY>\\2"))
            .unwrap();
        assert_eq!(out, name("/alice/KEY/ksk-1"));
    }

    #[test]
    fn test_literal_regex() {
        let n = name("/private/local/a.b");
        let re = NameRegex::literal(&n).unwrap();
        assert!(re.is_match(&n));
        assert!(!re.is_match(&name("/private/local/aXb")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(NameRegex::new("<a"), Err(RegexError::Unbalanced('<', _))));
        assert!(matches!(NameRegex::new("(<a>"), Err(RegexError::Unbalanced('(', _))));
        assert!(matches!(NameRegex::new("<a>)"), Err(RegexError::Unbalanced(')', _))));
        assert!(matches!(NameRegex::new("*<a>"), Err(RegexError::DanglingQuantifier(_))));
        assert!(matches!(NameRegex::new("[]"), Err(RegexError::EmptySet(_))));
        assert!(matches!(NameRegex::new("<a>{3,1}"), Err(RegexError::InvalidBounds(_))));
        assert!(matches!(NameRegex::new("abc"), Err(RegexError::Unexpected('a', _))));
        assert!(Expansion::parse("\\").is_err());
        assert!(Expansion::parse("x").is_err());

        let re = NameRegex::new("^(<a>)").unwrap();
        assert!(re.check_expansion(&expansion("\\1")).is_ok());
        assert!(re.check_expansion(&expansion("\\2")).is_err());
    }
}
