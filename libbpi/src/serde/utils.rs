use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, opt, verify},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

/// A parsed element: name, attributes in document order, child elements
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Element<'a> {
    pub name: &'a str,
    pub attributes: Vec<(&'a str, &'a str)>,
    pub children: Vec<Element<'a>>,
}

impl<'a> Element<'a> {
    pub fn attribute(&self, key: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        delimited(char('\''), take_till(|c| c == '\''), char('\'')),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(name, tuple((multispace0, char('='), multispace0)), quoted)(input)
}

fn prolog(input: &str) -> IResult<&str, &str> {
    delimited(tag("<?xml"), take_until("?>"), tag("?>"))(input)
}

pub(super) fn element(input: &str) -> IResult<&str, Element<'_>> {
    let (input, (name_, attributes)) = preceded(
        char('<'),
        pair(name, many0(preceded(multispace1, attribute))),
    )(input)?;
    let (input, _) = multispace0(input)?;

    if let (input, Some(_)) = opt(tag("/>"))(input)? {
        return Ok((
            input,
            Element {
                name: name_,
                attributes,
                children: Vec::new(),
            },
        ));
    }

    let (input, _) = char('>')(input)?;
    let (input, children) = many0(preceded(multispace0, element))(input)?;
    let (input, _) = delimited(
        pair(multispace0, tag("</")),
        verify(name, |closing: &str| closing == name_),
        pair(multispace0, char('>')),
    )(input)?;
    Ok((
        input,
        Element {
            name: name_,
            attributes,
            children,
        },
    ))
}

/// Parses a whole document: optional prolog, one root element, surrounding whitespace
pub(super) fn document(input: &str) -> IResult<&str, Element<'_>> {
    all_consuming(delimited(
        pair(multispace0, opt(terminated(prolog, multispace0))),
        element,
        multispace0,
    ))(input)
}
