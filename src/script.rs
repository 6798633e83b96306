//! One-line builder scripts, used by the REPL.
//!
//! ```text
//! script    := term (("and" | "or") term)*
//! term      := ["not"] criterion
//! criterion := KIND["~"] ARG          KIND: test cat class method namespace name
//!            | "prop"["~"] ARG ARG
//!            | "id" ARG               ARG: comma-separated ids
//! ```
//!
//! A trailing `~` on the keyword marks the criterion as a regular expression.
//! Arguments may be double-quoted to include spaces; quoted words are never
//! treated as keywords.
//!
//! ```
//! let document = test_filter::script::compile(r#"cat cat1 and prop~ prop2 value2"#)?;
//! assert_eq!(
//!     document.text(),
//!     r#"<filter><cat>cat1</cat><prop re="1" name="prop2">value2</prop></filter>"#
//! );
//! # Ok::<(), test_filter::script::ScriptError>(())
//! ```

use thiserror::Error;

use crate::builder::{
    CriterionElement, ElementCollection, ExtendWithConnector, ExtendWithCriterion,
};
use crate::error::FilterError;
use crate::filter::{FilterDocument, TestFilter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("unexpected end of script, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("unexpected `{word}` at offset {offset}, expected {expected}")]
    Unexpected {
        word: String,
        offset: usize,
        expected: &'static str,
    },

    #[error("unterminated quoted argument starting at offset {offset}")]
    UnterminatedQuote { offset: usize },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    offset: usize,
    quoted: bool,
}

impl Word {
    fn keyword(&self) -> Option<&str> {
        (!self.quoted).then_some(self.text.as_str())
    }
}

/// Compiles a builder script into a filter document.
///
/// A blank script yields the cached match-all document.
pub fn compile(source: &str) -> Result<FilterDocument, ScriptError> {
    compile_words(split_words(source)?)
}

/// Compiles a script that is already split into words, such as command-line
/// arguments. Each argument is one word; an argument containing whitespace or
/// quotes is taken literally and never treated as a keyword. Offsets in
/// errors refer to the arguments joined by single spaces.
pub fn compile_args<I, S>(args: I) -> Result<FilterDocument, ScriptError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut words = Vec::new();
    let mut offset = 0;
    for arg in args {
        let text = arg.as_ref();
        words.push(Word {
            text: text.to_string(),
            offset,
            quoted: text.contains(|c: char| c.is_whitespace() || c == '"'),
        });
        offset += text.len() + 1;
    }
    compile_words(words)
}

fn compile_words(words: Vec<Word>) -> Result<FilterDocument, ScriptError> {
    if words.is_empty() {
        return Ok(TestFilter::empty().document().clone());
    }

    let mut parser = ScriptParser { words, position: 0 };
    let root = TestFilter::builder();
    let mut leaf = parser.term(&root)?;

    while let Some(word) = parser.advance() {
        let group = match word.keyword() {
            Some("and") => leaf.and()?,
            Some("or") => leaf.or()?,
            _ => return Err(unexpected(&word, "`and` or `or`")),
        };
        leaf = parser.term(&group)?;
    }

    Ok(leaf.build()?)
}

fn unexpected(word: &Word, expected: &'static str) -> ScriptError {
    ScriptError::Unexpected {
        word: word.text.clone(),
        offset: word.offset,
        expected,
    }
}

/// Splits on whitespace, keeping double-quoted runs together.
fn split_words(source: &str) -> Result<Vec<Word>, ScriptError> {
    let mut words = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            for (_, c) in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                text.push(c);
            }
            if !closed {
                return Err(ScriptError::UnterminatedQuote { offset });
            }
            words.push(Word {
                text,
                offset,
                quoted: true,
            });
            continue;
        }

        let mut text = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            text.push(c);
            chars.next();
        }
        words.push(Word {
            text,
            offset,
            quoted: false,
        });
    }

    Ok(words)
}

struct ScriptParser {
    words: Vec<Word>,
    position: usize,
}

impl ScriptParser {
    fn peek(&self) -> Option<&Word> {
        self.words.get(self.position)
    }

    fn advance(&mut self) -> Option<Word> {
        let word = self.words.get(self.position).cloned();
        if word.is_some() {
            self.position += 1;
        }
        word
    }

    fn argument(&mut self) -> Result<String, ScriptError> {
        self.advance()
            .map(|word| word.text)
            .ok_or(ScriptError::UnexpectedEnd {
                expected: "an argument",
            })
    }

    fn term<C: ElementCollection>(&mut self, at: &C) -> Result<CriterionElement, ScriptError> {
        if self.peek().and_then(Word::keyword) == Some("not") {
            self.advance();
            let negation = at.not()?;
            return self.criterion(&negation);
        }
        self.criterion(at)
    }

    fn criterion<E: ExtendWithCriterion>(
        &mut self,
        at: &E,
    ) -> Result<CriterionElement, ScriptError> {
        const EXPECTED: &str = "a criterion keyword";

        let word = self
            .advance()
            .ok_or(ScriptError::UnexpectedEnd { expected: EXPECTED })?;
        let Some(keyword) = word.keyword() else {
            return Err(unexpected(&word, EXPECTED));
        };
        let (keyword, is_regex) = match keyword.strip_suffix('~') {
            Some(keyword) => (keyword, true),
            None => (keyword, false),
        };

        let leaf = match keyword {
            "test" => at.test(&self.argument()?, is_regex)?,
            "cat" => at.category(&self.argument()?, is_regex)?,
            "class" => at.class(&self.argument()?, is_regex)?,
            "method" => at.method(&self.argument()?, is_regex)?,
            "namespace" => at.namespace(&self.argument()?, is_regex)?,
            "name" => at.name(&self.argument()?, is_regex)?,
            "prop" => {
                let name = self.argument()?;
                let value = self.argument()?;
                at.property(&name, &value, is_regex)?
            }
            "id" if !is_regex => at.id(self.argument()?.split(','))?,
            _ => return Err(unexpected(&word, EXPECTED)),
        };
        Ok(leaf)
    }
}
