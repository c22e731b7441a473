//! Indented key/value attribute text, the native format for meshes and projects.
//!
//! Each line is `name value`. Lines indented deeper than the line above are its
//! children. `#` starts a comment outside double quotes. A value of `\` makes
//! the following deeper-indented lines one multi-line value instead of children.
//!
//! ```text
//! #Polyp
//! name Cube
//! vertices \
//!   1 1 1
//!   -1 1 1
//! face 0 1 2 3
//!   facelink 1 2 4 3
//! ```

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::HedronError;

/// One attribute and its children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
    /// 1-based source line, 0 for attributes built in memory.
    pub line: usize,
    pub children: Vec<Attribute>,
}

struct RawLine {
    number: usize,
    indent: usize,
    text: String,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            ..Default::default()
        }
    }

    /// Attribute with a value formatted from `value`.
    #[must_use]
    pub fn with_value(name: impl Into<String>, value: impl ToString) -> Self {
        Self::new(name, Some(value.to_string()))
    }

    /// Append a child, builder style.
    #[must_use]
    pub fn child(mut self, child: Attribute) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Attribute) {
        self.children.push(child);
    }

    /// First child with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Attribute> {
        self.children.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Every token of the value parsed as `T`. Tokens are separated by
    /// whitespace or commas, so `1,2,3` and `1 2 3` read the same.
    pub fn numbers<T: FromStr>(&self) -> Result<Vec<T>, HedronError> {
        self.value_str()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<T>().map_err(|_| {
                    HedronError::parse(self.line, format!("{}: bad number {tok:?}", self.name))
                })
            })
            .collect()
    }

    /// Exactly `N` numbers.
    pub fn fixed<T: FromStr + Copy + Default, const N: usize>(
        &self,
    ) -> Result<[T; N], HedronError> {
        let values = self.numbers::<T>()?;
        if values.len() != N {
            return Err(HedronError::parse(
                self.line,
                format!("{}: expected {N} numbers, found {}", self.name, values.len()),
            ));
        }
        let mut out = [T::default(); N];
        out.copy_from_slice(&values);
        Ok(out)
    }

    /// Parse a whole document into a root whose children are the top-level attributes.
    pub fn parse(text: &str) -> Result<Attribute, HedronError> {
        let mut lines = Vec::new();
        let mut raw = text.lines().enumerate().peekable();
        while let Some((i, line)) = raw.next() {
            let stripped = strip_comment(line);
            if stripped.trim().is_empty() {
                continue;
            }
            let indent = indent_of(stripped);
            let mut text = stripped.trim().to_string();
            if text.split_whitespace().nth(1).is_some()
                && text.split_whitespace().last() == Some("\\")
            {
                text.pop();
                let mut block = Vec::new();
                while let Some(&(_, next)) = raw.peek() {
                    let next_stripped = strip_comment(next);
                    if next_stripped.trim().is_empty() {
                        raw.next();
                        continue;
                    }
                    if indent_of(next_stripped) <= indent {
                        break;
                    }
                    block.push(next_stripped.trim().to_string());
                    raw.next();
                }
                text = format!("{} {}", text.trim_end(), block.join("\n"));
            }
            lines.push(RawLine {
                number: i + 1,
                indent,
                text,
            });
        }
        let mut pos = 0;
        let children = parse_children(&lines, &mut pos, None);
        Ok(Attribute {
            name: String::new(),
            value: None,
            line: 0,
            children,
        })
    }

    /// Write this attribute and its children at `indent` spaces.
    pub fn write(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        match self.value.as_deref() {
            Some(v) if v.contains('\n') => {
                let _ = writeln!(out, "{pad}{} \\", self.name);
                for line in v.lines() {
                    let _ = writeln!(out, "{pad}  {line}");
                }
            }
            Some(v) if needs_quotes(v) => {
                let _ = writeln!(out, "{pad}{} \"{v}\"", self.name);
            }
            Some(v) if !v.is_empty() => {
                let _ = writeln!(out, "{pad}{} {v}", self.name);
            }
            _ => {
                let _ = writeln!(out, "{pad}{}", self.name);
            }
        }
        for child in &self.children {
            child.write(out, indent + 2);
        }
    }

    /// Write the children of a root attribute after a header comment line.
    #[must_use]
    pub fn to_document(&self, header: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{header}");
        for child in &self.children {
            child.write(&mut out, 0);
        }
        out
    }
}

fn parse_children(
    lines: &[RawLine],
    pos: &mut usize,
    parent_indent: Option<usize>,
) -> Vec<Attribute> {
    let mut out = Vec::new();
    while *pos < lines.len() {
        let line = &lines[*pos];
        if parent_indent.is_some_and(|p| line.indent <= p) {
            break;
        }
        *pos += 1;
        let (name, value) = match line.text.split_once(char::is_whitespace) {
            Some((n, v)) => (n.to_string(), Some(unquote(v.trim()))),
            None => (line.text.clone(), None),
        };
        let children = parse_children(lines, pos, Some(line.indent));
        out.push(Attribute {
            name,
            value: value.filter(|v| !v.is_empty()),
            line: line.number,
            children,
        });
    }
    out
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '#' if !quoted => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(v: &str) -> String {
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        v[1..v.len() - 1].to_string()
    } else {
        v.to_string()
    }
}

fn needs_quotes(v: &str) -> bool {
    v.contains('#') || v.starts_with(char::is_whitespace) || v.ends_with(char::is_whitespace)
}
