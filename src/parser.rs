//! # Source Parser
//!
//! Turns workflow source text into a [`Tree`]. Parsing happens in two steps: `nom`
//! combinators build a small recursive [`Expression`] syntax tree, which is then
//! lowered into the flat node arena.
//!
//! ```text
//! program   := sep* (statement (sep+ statement)*)? sep*
//! statement := additive
//! additive  := term (("+" | "-") term)*
//! term      := postfix (("*" | "/") postfix)*
//! postfix   := primary ("(" arguments ")")*
//! primary   := float | integer | string | "true" | "false" | "null" | name | "(" additive ")"
//! argument  := "**" additive | "*" additive | name "=" additive | additive
//! ```
//!
//! Statements are separated by newlines or `;`, and `#` starts a line comment.
//! Expressions nested deeper than [`MAX_DEPTH`] are rejected with
//! [`ParseError::TooDeep`].

use std::collections::HashSet;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value},
    error::{context, convert_error, VerboseError, VerboseErrorKind},
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use crate::ast::{BinaryOperator, Call, Literal, NodeId, Tree, TreeBuilder};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Name(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Argument>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expression),
    Named { name: String, value: Expression },
    /// `*expr`
    Spread(Expression),
    /// `**expr`
    KeywordSpread(Expression),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("Keyword argument repeated: {0}")]
    DuplicateKeyword(String),
    #[error("Only one '{0}' argument is allowed per call")]
    DuplicateSpread(&'static str),
    #[error("Expression nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Deepest expression accepted, counting operators, calls and parentheses.
pub const MAX_DEPTH: usize = 64;

const TOO_DEEP: &str = "nesting limit";

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses and lowers `source` into a tree.
#[tracing::instrument(level = "debug", skip(source))]
pub fn parse(source: &str) -> ParseResult<Tree> {
    let statements = parse_program(source)?;
    lower(&statements)
}

/// Parses `source` into its statements without lowering them.
pub fn parse_program(source: &str) -> ParseResult<Vec<Expression>> {
    let result = all_consuming(delimited(
        separators,
        separated_list0(statement_separator, |i| parse_additive(i, 0)),
        separators,
    ))(source);

    match result {
        Ok((_, statements)) => Ok(statements),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            if e
                .errors
                .iter()
                .any(|(_, kind)| matches!(kind, VerboseErrorKind::Context(c) if *c == TOO_DEEP))
            {
                return Err(ParseError::TooDeep { limit: MAX_DEPTH });
            }
            let (line, column) = e
                .errors
                .first()
                .map(|(remaining, _)| position(source, remaining))
                .unwrap_or((1, 1));
            let error = ParseError::Syntax {
                message: convert_error(source, e),
                line,
                column,
            };
            tracing::debug!("{}", error);
            Err(error)
        }
        Err(nom::Err::Incomplete(needed)) => Err(ParseError::Syntax {
            message: format!("Incomplete input, {:?}", needed),
            line: 1,
            column: 1,
        }),
    }
}

fn position(source: &str, remaining: &str) -> (usize, usize) {
    let offset = source.len() - remaining.len();
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map(|last| last.chars().count() + 1)
        .unwrap_or(1);
    (line, column)
}

fn comment(input: &str) -> ParserResult<()> {
    value((), pair(char('#'), take_while(|c| c != '\n')))(input)
}

/// Spaces, tabs and comments; never a newline.
fn sp(input: &str) -> ParserResult<()> {
    value(
        (),
        many0_count(alt((
            value((), take_while1(|c| c == ' ' || c == '\t')),
            comment,
        ))),
    )(input)
}

/// Any whitespace including newlines, and comments.
fn msp(input: &str) -> ParserResult<()> {
    value(
        (),
        many0_count(alt((value((), take_while1(char::is_whitespace)), comment))),
    )(input)
}

fn separators(input: &str) -> ParserResult<()> {
    value((), many0_count(alt((msp_nonempty, value((), char(';'))))))(input)
}

fn msp_nonempty(input: &str) -> ParserResult<()> {
    alt((value((), take_while1(char::is_whitespace)), comment))(input)
}

fn statement_separator(input: &str) -> ParserResult<()> {
    context(
        "statement separator",
        value(
            (),
            tuple((sp, alt((tag("\r\n"), tag("\n"), tag(";"))), separators)),
        ),
    )(input)
}

fn identifier(input: &str) -> ParserResult<&str> {
    context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)
}

fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    context(
        "float literal",
        map_res(
            recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
            |s: &str| s.parse::<f64>().map(Literal::Float),
        ),
    )(input)
}

fn parse_integer_literal(input: &str) -> ParserResult<Literal> {
    context(
        "integer literal",
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>().map(Literal::Integer)
        }),
    )(input)
}

fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            delimited(char('"'), take_while(|c| c != '"' && c != '\n'), char('"')),
            |s: &str| Literal::String(s.to_string()),
        ),
    )(input)
}

fn parse_name_or_keyword(input: &str) -> ParserResult<Expression> {
    map(identifier, |id| match id {
        "true" => Expression::Literal(Literal::Boolean(true)),
        "false" => Expression::Literal(Literal::Boolean(false)),
        "null" => Expression::Literal(Literal::Null),
        name => Expression::Name(name.to_string()),
    })(input)
}

fn too_deep(input: &str) -> nom::Err<VerboseError<&str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(TOO_DEEP))],
    })
}

impl Expression {
    /// Levels in this expression, a leaf counting as one.
    pub fn height(&self) -> usize {
        match self {
            Expression::Literal(_) | Expression::Name(_) => 1,
            Expression::BinaryOp { left, right, .. } => 1 + left.height().max(right.height()),
            Expression::Call {
                function,
                arguments,
            } => 1 + arguments.iter().map(Argument::height).fold(function.height(), usize::max),
        }
    }
}

impl Argument {
    pub fn height(&self) -> usize {
        match self {
            Argument::Positional(value)
            | Argument::Named { value, .. }
            | Argument::Spread(value)
            | Argument::KeywordSpread(value) => value.height(),
        }
    }
}

fn parse_primary<'a>(input: &'a str, depth: usize) -> ParserResult<'a, Expression> {
    context(
        "primary",
        alt((
            map(
                alt((
                    parse_float_literal,
                    parse_integer_literal,
                    parse_string_literal,
                )),
                Expression::Literal,
            ),
            parse_name_or_keyword,
            delimited(
                terminated(char('('), msp),
                |i: &'a str| parse_additive(i, depth + 1),
                preceded(msp, char(')')),
            ),
        )),
    )(input)
}

fn parse_argument<'a>(input: &'a str, depth: usize) -> ParserResult<'a, Argument> {
    let value = |i: &'a str| parse_additive(i, depth + 1);
    context(
        "argument",
        alt((
            map(preceded(pair(tag("**"), sp), value), Argument::KeywordSpread),
            map(preceded(pair(char('*'), sp), value), Argument::Spread),
            map(
                pair(
                    terminated(identifier, tuple((sp, char('='), not(char('=')), sp))),
                    value,
                ),
                |(name, value)| Argument::Named {
                    name: name.to_string(),
                    value,
                },
            ),
            map(value, Argument::Positional),
        )),
    )(input)
}

fn parse_arguments<'a>(input: &'a str, depth: usize) -> ParserResult<'a, Vec<Argument>> {
    context(
        "arguments",
        delimited(
            pair(char('('), msp),
            terminated(
                separated_list0(delimited(msp, char(','), msp), |i: &'a str| {
                    parse_argument(i, depth)
                }),
                pair(msp, opt(pair(char(','), msp))),
            ),
            char(')'),
        ),
    )(input)
}

fn parse_postfix<'a>(input: &'a str, depth: usize) -> ParserResult<'a, Expression> {
    let start = input;
    let (input, primary) = parse_primary(input, depth)?;
    let (input, calls) = many0(preceded(sp, |i: &'a str| parse_arguments(i, depth)))(input)?;
    let height = calls.iter().fold(primary.height(), |height, arguments| {
        1 + arguments.iter().map(Argument::height).fold(height, usize::max)
    });
    if depth + height > MAX_DEPTH {
        return Err(too_deep(start));
    }
    let expression = calls
        .into_iter()
        .fold(primary, |function, arguments| Expression::Call {
            function: Box::new(function),
            arguments,
        });
    Ok((input, expression))
}

/// Parses `operand (op operand)*` and folds it to the left. The height of the
/// result is checked before folding, so an overlong chain is never built.
fn parse_chain<'a>(
    input: &'a str,
    depth: usize,
    symbols: &'static str,
    operand: fn(&'a str, usize) -> ParserResult<'a, Expression>,
) -> ParserResult<'a, Expression> {
    if depth > MAX_DEPTH {
        return Err(too_deep(input));
    }
    let (remaining, (first, rest)) = pair(
        |i: &'a str| operand(i, depth),
        many0(pair(operator(symbols), |i: &'a str| operand(i, depth))),
    )(input)?;
    let links = rest.len();
    let height = rest
        .iter()
        .enumerate()
        .fold(first.height() + links, |height, (i, (_, right))| {
            height.max(right.height() + links - i)
        });
    if depth + height > MAX_DEPTH {
        return Err(too_deep(input));
    }
    Ok((remaining, fold_binary(first, rest)))
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn operator<'a>(symbols: &'static str) -> impl FnMut(&'a str) -> ParserResult<'a, BinaryOperator> {
    map_res(delimited(sp, one_of(symbols), sp), |symbol: char| {
        symbol.to_string().parse::<BinaryOperator>()
    })
}

fn parse_term<'a>(input: &'a str, depth: usize) -> ParserResult<'a, Expression> {
    context("term", |i: &'a str| parse_chain(i, depth, "*/", parse_postfix))(input)
}

fn parse_additive<'a>(input: &'a str, depth: usize) -> ParserResult<'a, Expression> {
    context("expression", |i: &'a str| parse_chain(i, depth, "+-", parse_term))(input)
}

/// Lowers parsed statements into a fresh tree.
pub fn lower(statements: &[Expression]) -> ParseResult<Tree> {
    let mut builder = Tree::builder();
    let mut body = Vec::with_capacity(statements.len());
    for statement in statements {
        let value = lower_expression(&mut builder, statement, 0)?;
        body.push(builder.expr(value));
    }
    Ok(builder.finish(body))
}

fn lower_expression(
    builder: &mut TreeBuilder,
    expression: &Expression,
    depth: usize,
) -> ParseResult<NodeId> {
    if depth >= MAX_DEPTH {
        return Err(ParseError::TooDeep { limit: MAX_DEPTH });
    }
    let depth = depth + 1;
    Ok(match expression {
        Expression::Literal(literal) => builder.literal(literal.clone()),
        Expression::Name(name) => builder.name(name.as_str()),
        Expression::BinaryOp { op, left, right } => {
            let left = lower_expression(builder, left, depth)?;
            let right = lower_expression(builder, right, depth)?;
            builder.binary(left, *op, right)
        }
        Expression::Call {
            function,
            arguments,
        } => {
            let func = lower_expression(builder, function, depth)?;
            let mut call = Call {
                func,
                args: Vec::new(),
                keywords: Vec::new(),
                starargs: None,
                kwargs: None,
            };
            let mut seen = HashSet::new();
            for argument in arguments {
                match argument {
                    Argument::Positional(value) => {
                        call.args.push(lower_expression(builder, value, depth)?);
                    }
                    Argument::Named { name, value } => {
                        if !seen.insert(name.as_str()) {
                            return Err(ParseError::DuplicateKeyword(name.clone()));
                        }
                        let value = lower_expression(builder, value, depth)?;
                        call.keywords.push(builder.keyword(name.as_str(), value));
                    }
                    Argument::Spread(value) => {
                        if call.starargs.is_some() {
                            return Err(ParseError::DuplicateSpread("*"));
                        }
                        call.starargs = Some(lower_expression(builder, value, depth)?);
                    }
                    Argument::KeywordSpread(value) => {
                        if call.kwargs.is_some() {
                            return Err(ParseError::DuplicateSpread("**"));
                        }
                        call.kwargs = Some(lower_expression(builder, value, depth)?);
                    }
                }
            }
            builder.call(call)
        }
    })
}
