//! Hand-written lexer and recursive-descent parser for the ASDL
//! grammar notation, including the `--` directive comments that carry
//! schema configuration.

use super::{
    Constructor, Directives, Field, FieldKind, Grammar, GrammarError, Qualifier, TypeDecl, TypeDef,
};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Pipe,
    Question,
    Star,
    Equals,
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    comments: Vec<String>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            comments: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> GrammarError {
        GrammarError::Malformed {
            line: self.line,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>, GrammarError> {
        loop {
            let (start, c) = match self.chars.next() {
                Some(pair) => pair,
                None => return Ok(None),
            };
            match c {
                '\n' => self.line += 1,
                c if c.is_whitespace() => {}
                '-' => {
                    // `--` starts a comment running to end of line
                    match self.chars.peek() {
                        Some((_, '-')) => {
                            self.chars.next();
                            let mut end = self.source.len();
                            for (index, c) in self.chars.by_ref() {
                                if c == '\n' {
                                    end = index;
                                    break;
                                }
                            }
                            if end < self.source.len() {
                                self.line += 1;
                            }
                            self.comments
                                .push(self.source[start + 2..end].trim().to_owned());
                        }
                        _ => return Err(self.error("stray '-'")),
                    }
                }
                '(' => return Ok(Some((Token::LParen, self.line))),
                ')' => return Ok(Some((Token::RParen, self.line))),
                '{' => return Ok(Some((Token::LBrace, self.line))),
                '}' => return Ok(Some((Token::RBrace, self.line))),
                ',' => return Ok(Some((Token::Comma, self.line))),
                '|' => return Ok(Some((Token::Pipe, self.line))),
                '?' => return Ok(Some((Token::Question, self.line))),
                '*' => return Ok(Some((Token::Star, self.line))),
                '=' => return Ok(Some((Token::Equals, self.line))),
                c if c.is_alphabetic() || c == '_' => {
                    let mut end = start + c.len_utf8();
                    while let Some(&(index, c)) = self.chars.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            self.chars.next();
                            end = index + c.len_utf8();
                        } else {
                            break;
                        }
                    }
                    let ident = self.source[start..end].to_owned();
                    return Ok(Some((Token::Ident(ident), self.line)));
                }
                other => return Err(self.error(format!("unexpected character {other:?}"))),
            }
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
    comments: Vec<String>,
}

impl Parser {
    fn current_line(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> GrammarError {
        GrammarError::Malformed {
            line: self.current_line(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self
            .tokens
            .get(self.position)
            .map(|(token, _)| token.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), GrammarError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {expected:?}, found {token:?}"))),
            None => Err(self.error(format!("expected {expected:?}, found end of input"))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, GrammarError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => Err(self.error(format!("expected identifier, found {token:?}"))),
            None => Err(self.error("expected identifier, found end of input")),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn parse_module(&mut self) -> Result<Grammar, GrammarError> {
        let keyword = self.expect_ident()?;
        if keyword != "module" {
            return Err(self.error("grammar must start with 'module'"));
        }
        let module_name = self.expect_ident()?;
        self.expect(Token::LBrace)?;

        let mut types = Vec::new();
        while !self.eat(&Token::RBrace) {
            types.push(self.parse_decl()?);
        }
        if self.peek().is_some() {
            return Err(self.error("trailing input after closing '}'"));
        }

        let directives = parse_directives(&self.comments)?;
        Ok(Grammar {
            module_name,
            types,
            directives,
        })
    }

    fn parse_decl(&mut self) -> Result<TypeDecl, GrammarError> {
        let name = self.expect_ident()?;
        self.expect(Token::Equals)?;

        let def = if self.peek() == Some(&Token::LParen) {
            // product: a single field tuple, optionally with attributes
            let fields = self.parse_field_list()?;
            let attributes = self.parse_attributes()?;
            TypeDef::Product { fields, attributes }
        } else {
            let mut constructors = vec![self.parse_constructor()?];
            while self.eat(&Token::Pipe) {
                constructors.push(self.parse_constructor()?);
            }
            let attributes = self.parse_attributes()?;
            TypeDef::Sum {
                constructors,
                attributes,
            }
        };

        Ok(TypeDecl { name, def })
    }

    fn parse_constructor(&mut self) -> Result<Constructor, GrammarError> {
        let name = self.expect_ident()?;
        if !name.starts_with(char::is_uppercase) {
            return Err(self.error(format!("constructor '{name}' must be titlecase")));
        }
        let fields = if self.peek() == Some(&Token::LParen) {
            self.parse_field_list()?
        } else {
            Vec::new()
        };
        Ok(Constructor { name, fields })
    }

    fn parse_attributes(&mut self) -> Result<Vec<Field>, GrammarError> {
        if self.peek() == Some(&Token::Ident("attributes".to_owned())) {
            self.advance();
            self.parse_field_list()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_field_list(&mut self) -> Result<Vec<Field>, GrammarError> {
        self.expect(Token::LParen)?;
        let mut fields = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(fields);
        }
        loop {
            fields.push(self.parse_field()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            break;
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<Field, GrammarError> {
        let kind = FieldKind::from_name(&self.expect_ident()?);
        let qualifier = if self.eat(&Token::Question) {
            Qualifier::Optional
        } else if self.eat(&Token::Star) {
            Qualifier::Sequence
        } else {
            Qualifier::Required
        };
        let name = self.expect_ident()?;
        Ok(Field {
            name,
            kind,
            qualifier,
        })
    }
}

const DIRECTIVE_TAGS: [&str; 3] = ["unique_fields", "tag_exclusions", "module_annotated_types"];

fn parse_directives(comments: &[String]) -> Result<Directives, GrammarError> {
    let mut directives = Directives::default();
    for comment in comments {
        let Some((tag, value)) = comment.split_once(':') else {
            continue;
        };
        let tag = tag.trim();
        if !DIRECTIVE_TAGS.contains(&tag) {
            continue;
        }
        let names = parse_name_list(value.trim())
            .map_err(|message| GrammarError::InvalidDirective(tag.to_owned(), message))?;
        match tag {
            "unique_fields" => directives.unique_fields = names,
            "tag_exclusions" => directives.tag_exclusions = names,
            "module_annotated_types" => directives.module_annotated_types = names,
            _ => unreachable!(),
        }
    }
    Ok(directives)
}

/// Parses the bracketed, quoted name list of a directive:
/// `["Module.filename", "project.name"]`.
fn parse_name_list(value: &str) -> Result<Vec<String>, String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| "expected a bracketed list".to_owned())?;

    let mut names = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let unquoted = part
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(|| format!("expected a quoted name, found {part:?}"))?;
        names.push(unquoted.to_owned());
    }
    Ok(names)
}

/// Parse an ASDL grammar from source text.
pub fn parse(source: &str) -> Result<Grammar, GrammarError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    let mut parser = Parser {
        tokens,
        position: 0,
        comments: lexer.comments,
    };
    parser.parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_products_and_sums() {
        let grammar = parse(
            r#"
            module T
            {
                item = Leaf(int value) | Node(item left, item right)
                       attributes (int lineno)
                pair = (item first, item? second, item* rest)
            }
            "#,
        )
        .unwrap();

        assert_eq!(grammar.module_name, "T");
        assert_eq!(grammar.types.len(), 2);

        let item = &grammar.types[0];
        let TypeDef::Sum {
            constructors,
            attributes,
        } = &item.def
        else {
            panic!("expected sum");
        };
        assert_eq!(constructors.len(), 2);
        assert_eq!(attributes.len(), 1);

        let pair = &grammar.types[1];
        let TypeDef::Product { fields, .. } = &pair.def else {
            panic!("expected product");
        };
        assert_eq!(fields[0].qualifier, Qualifier::Required);
        assert_eq!(fields[1].qualifier, Qualifier::Optional);
        assert_eq!(fields[2].qualifier, Qualifier::Sequence);
    }

    #[test]
    fn parses_directives() {
        let grammar = parse(
            r#"
            -- unique_fields: ["M.filename"]
            -- tag_exclusions: ["lineno", "col_offset"]
            -- a free-form comment that is not a directive
            module T { M = (string filename) }
            "#,
        )
        .unwrap();
        assert_eq!(grammar.directives.unique_fields, vec!["M.filename"]);
        assert_eq!(
            grammar.directives.tag_exclusions,
            vec!["lineno", "col_offset"]
        );
        assert!(grammar.directives.module_annotated_types.is_empty());
    }

    #[test]
    fn rejects_lowercase_constructor() {
        let result = parse("module T { thing = leaf(int value) }");
        assert!(matches!(result, Err(GrammarError::Malformed { .. })));
    }

    #[test]
    fn reports_line_numbers() {
        let result = parse("module T {\n  thing = (int value\n}");
        match result {
            Err(GrammarError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn parses_full_python_grammar() {
        let grammar = parse(include_str!("../../static/Python.asdl")).unwrap();
        assert_eq!(grammar.module_name, "Python");
        assert!(grammar.types.iter().any(|decl| decl.name == "stmt"));
        assert!(grammar
            .directives
            .module_annotated_types
            .contains(&"expr".to_owned()));
    }
}
