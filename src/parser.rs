use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag};
use nom::character::complete::{alpha1, char, digit1, none_of};
use nom::combinator::{all_consuming, map, map_res, opt, rest, value};
use nom::multi::separated_list0;
use nom::number::complete::{be_u32, le_u8};
use nom::sequence::{delimited, preceded, separated_pair, tuple};
use nom::IResult;

use crate::header::InfoNumber;

pub(crate) const BCF_MAGIC: &[u8] = b"BCF";

#[derive(Debug, Eq, PartialEq)]
pub struct Version {
    pub(crate) major: u8,
    pub(crate) minor: u8,
}

pub(crate) fn bcf_version(input: &[u8]) -> IResult<&[u8], Version> {
    let (input, (_, major, minor)) = tuple((tag(BCF_MAGIC), le_u8, le_u8))(input)?;
    Ok((input, Version { major, minor }))
}

pub(crate) fn header_length(input: &[u8]) -> IResult<&[u8], u32> {
    be_u32(input)
}

/// `"..."` with `\\` and `\"` escapes.
fn quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(
                none_of("\\\""),
                '\\',
                alt((value("\\", tag("\\")), value("\"", tag("\"")))),
            )),
            char('"'),
        ),
        Option::unwrap_or_default,
    )(input)
}

fn key_value(input: &str) -> IResult<&str, (&str, String)> {
    separated_pair(
        is_not("<,=>"),
        char('='),
        alt((quoted, map(is_not(",>"), str::to_owned))),
    )(input)
}

/// The `<ID=..,Number=..,...>` body of a structured meta line.
pub(crate) fn keys_and_values(input: &str) -> IResult<&str, Vec<(&str, String)>> {
    all_consuming(delimited(
        char('<'),
        separated_list0(char(','), key_value),
        char('>'),
    ))(input)
}

/// `##key=value`, value left unparsed.
pub(crate) fn meta_line(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(tag("##"), separated_pair(is_not("="), char('='), rest))(input)
}

pub(crate) fn info_number(input: &str) -> IResult<&str, InfoNumber> {
    alt((
        map_res(digit1, |d: &str| d.parse().map(InfoNumber::Count)),
        map_res(alt((alpha1, tag("."))), |c: &str| match c {
            "A" => Ok(InfoNumber::AlternateAlleles),
            "R" => Ok(InfoNumber::Alleles),
            "G" => Ok(InfoNumber::Genotypes),
            "." => Ok(InfoNumber::Unknown),
            _ => Err(()),
        }),
    ))(input)
}
