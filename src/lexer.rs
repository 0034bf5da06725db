//! Tokenizer for PDF object syntax.
//!
//! Only the object-level grammar is covered (numbers, strings, names,
//! arrays, dictionaries and the indirect-object keywords). Content streams
//! are generated by the converter, never lexed.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// A single lexical token.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// Raw literal string body, escapes still encoded
    LiteralString(&'a [u8]),
    /// Raw hex string body, whitespace included
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R`
    R,
}

pub(crate) fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

pub(crate) fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip any run of whitespace and `%` comments.
pub(crate) fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut rest = input;
    loop {
        let (after_ws, _) = take_while(is_whitespace)(rest)?;
        match comment(after_ws) {
            Ok((after_comment, _)) => rest = after_comment,
            Err(_) => return Ok((after_ws, ())),
        }
    }
}

fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((recognize(pair(digit1, opt(pair(char('.'), digit0)))), recognize(pair(char('.'), digit1)))),
    )))(input)?;

    let fail = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));
    let text = std::str::from_utf8(text).map_err(|_| fail())?;
    let text = text.strip_prefix('+').unwrap_or(text);

    if text.contains('.') {
        // Rust rejects "5." and "-.5"; normalise both.
        let mut normalised = text.replace("-.", "-0.");
        if normalised.starts_with('.') {
            normalised.insert(0, '0');
        }
        if normalised.ends_with('.') {
            normalised.push('0');
        }
        normalised.parse::<f64>().map(|v| (rest, Token::Real(v))).map_err(|_| fail())
    } else {
        match text.parse::<i64>() {
            Ok(v) => Ok((rest, Token::Integer(v))),
            // Out-of-range integers are kept as reals rather than rejected.
            Err(_) => text.parse::<f64>().map(|v| (rest, Token::Real(v))).map_err(|_| fail()),
        }
    }
}

fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b'(' => {
                depth += 1;
                i += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[i + 1..], Token::LiteralString(&body[..i])));
                }
                i += 1;
            },
            _ => i += 1,
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)), Token::HexString),
        char('>'),
    )(input)
}

/// Decode `#XX` escapes in a name. Malformed escapes are kept literally.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(|c| !is_whitespace(c) && !is_delimiter(c)), |raw: &[u8]| {
            Token::Name(decode_name_escapes(raw))
        }),
    )(input)
}

fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, word) = take_while1(|c: u8| c.is_ascii_alphabetic())(input)?;
    let token = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
        },
    };
    Ok((rest, token))
}

fn delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Read one token after skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((delimiter, keyword, name, number, literal_string, hex_string))(input)
}

/// Read tokens until the input is exhausted or no token matches.
pub fn tokens(input: &[u8]) -> IResult<&[u8], Vec<Token<'_>>> {
    many0(token)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-17 "), Ok((&b" "[..], Token::Integer(-17))));
        assert_eq!(token(b"+5"), Ok((&b""[..], Token::Integer(5))));
    }

    #[test]
    fn test_reals() {
        assert_eq!(token(b"2.5"), Ok((&b""[..], Token::Real(2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"-.25"), Ok((&b""[..], Token::Real(-0.25))));
        assert_eq!(token(b"4."), Ok((&b""[..], Token::Real(4.0))));
    }

    #[test]
    fn test_names_decode_escapes() {
        assert_eq!(token(b"/Subj"), Ok((&b""[..], Token::Name("Subj".to_string()))));
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(decode_name_escapes(b"A#"), "A#");
        assert_eq!(decode_name_escapes(b"A#zz"), "A#zz");
    }

    #[test]
    fn test_name_stops_at_delimiter() {
        assert_eq!(token(b"/Type/Annot"), Ok((&b"/Annot"[..], Token::Name("Type".to_string()))));
    }

    #[test]
    fn test_literal_string_nested() {
        assert_eq!(
            token(b"(a (b) c) rest"),
            Ok((&b" rest"[..], Token::LiteralString(&b"a (b) c"[..])))
        );
    }

    #[test]
    fn test_literal_string_escaped_paren() {
        assert_eq!(token(br"(a\)b)"), Ok((&b""[..], Token::LiteralString(&br"a\)b"[..]))));
    }

    #[test]
    fn test_unterminated_literal_string() {
        assert!(token(b"(never closed").is_err());
    }

    #[test]
    fn test_hex_string_vs_dict_start() {
        assert_eq!(token(b"<4150>"), Ok((&b""[..], Token::HexString(&b"4150"[..]))));
        assert_eq!(token(b"<< /A 1 >>"), Ok((&b" /A 1 >>"[..], Token::DictStart)));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(token(b"endobj"), Ok((&b""[..], Token::ObjEnd)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert!(token(b"trailer").is_err());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(token(b"% note\n  7"), Ok((&b""[..], Token::Integer(7))));
    }

    #[test]
    fn test_reference_sequence() {
        let (_, toks) = tokens(b"12 0 R").unwrap();
        assert_eq!(toks, vec![Token::Integer(12), Token::Integer(0), Token::R]);
    }
}
