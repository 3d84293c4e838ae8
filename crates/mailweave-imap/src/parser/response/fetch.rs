//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Annotation, AnnotationValue, ModSeq, Uid};
use crate::{Error, Result};

use super::parse_flag_list;
use super::types::{Address, BodyStructure, Envelope, FetchItem};

/// Parses a FETCH response item list.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => {
                let upper = name.to_uppercase();
                match upper.as_str() {
                    "FLAGS" => {
                        lexer.expect_space()?;
                        let flags = parse_flag_list(lexer)?;
                        items.push(FetchItem::Flags(flags));
                    }
                    "UID" => {
                        lexer.expect_space()?;
                        let n = lexer.read_number_u32()?;
                        let uid = Uid::new(n).ok_or_else(|| Error::Parse {
                            position: lexer.position(),
                            message: format!("invalid UID value: {n} (UID cannot be 0)"),
                        })?;
                        items.push(FetchItem::Uid(uid));
                    }
                    "RFC822.SIZE" => {
                        lexer.expect_space()?;
                        let size = lexer.read_number_u32()?;
                        items.push(FetchItem::Rfc822Size(size));
                    }
                    "INTERNALDATE" => {
                        lexer.expect_space()?;
                        if let Token::QuotedString(date) = lexer.next_token()? {
                            items.push(FetchItem::InternalDate(date));
                        }
                    }
                    "ENVELOPE" => {
                        lexer.expect_space()?;
                        let envelope = parse_envelope(lexer)?;
                        items.push(FetchItem::Envelope(Box::new(envelope)));
                    }
                    "BODYSTRUCTURE" => {
                        lexer.expect_space()?;
                        let body_structure = parse_body_structure(lexer)?;
                        items.push(FetchItem::BodyStructure(body_structure));
                    }
                    "BODY" | "BODY.PEEK" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                        let (section, origin) = parse_body_section_and_origin(lexer)?;

                        lexer.expect_space()?;

                        // `BODY (...)` is the non-extensible structure form
                        if section.is_none() && origin.is_none() && lexer.peek() == Some(b'(') {
                            let body_structure = parse_body_structure(lexer)?;
                            items.push(FetchItem::BodyStructure(body_structure));
                            continue;
                        }

                        let data = match lexer.next_token()? {
                            Token::Literal(d) => Some(d),
                            Token::QuotedString(s) => Some(s.into_bytes()),
                            Token::Nil => None,
                            token => {
                                return Err(Error::Parse {
                                    position: lexer.position(),
                                    message: format!("Expected body data, got {token:?}"),
                                });
                            }
                        };

                        items.push(FetchItem::Body {
                            section,
                            origin,
                            data,
                        });
                    }
                    "MODSEQ" => {
                        lexer.expect_space()?;
                        lexer.expect(Token::LParen)?;
                        let n = lexer.read_number()?;
                        lexer.expect(Token::RParen)?;
                        let modseq = ModSeq::from_u64(n).ok_or_else(|| Error::Parse {
                            position: lexer.position(),
                            message: "MODSEQ cannot be zero".to_string(),
                        })?;
                        items.push(FetchItem::ModSeq(modseq));
                    }
                    "X-GM-LABELS" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::GmailLabels(parse_label_list(lexer)?));
                    }
                    "X-GM-MSGID" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::GmailMessageId(lexer.read_number()?));
                    }
                    "X-GM-THRID" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::GmailThreadId(lexer.read_number()?));
                    }
                    "ANNOTATION" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Annotation(parse_annotation_data(lexer)?));
                    }
                    "PREVIEW" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Preview(lexer.read_nstring()?));
                    }
                    _ => {
                        skip_fetch_item(lexer)?;
                    }
                }
            }
            _ => continue,
        }
    }

    Ok(items)
}

/// Parses optional `[section]` and `<origin>` from a BODY fetch response.
fn parse_body_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(Option<String>, Option<u64>)> {
    let mut section = None;
    let mut origin = None;

    if lexer.peek() == Some(b'[') {
        lexer.advance();

        let mut section_buf = String::new();
        loop {
            match lexer.peek() {
                Some(b']') => {
                    lexer.advance();
                    break;
                }
                Some(b) => {
                    section_buf.push(b as char);
                    lexer.advance();
                }
                None => break,
            }
        }

        if !section_buf.is_empty() {
            section = Some(section_buf);
        }
    }

    if lexer.peek() == Some(b'<') {
        lexer.advance();

        let mut origin_buf = String::new();
        loop {
            match lexer.peek() {
                Some(b'>') => {
                    lexer.advance();
                    break;
                }
                Some(b) if b.is_ascii_digit() => {
                    origin_buf.push(b as char);
                    lexer.advance();
                }
                _ => break,
            }
        }

        if !origin_buf.is_empty() {
            origin = origin_buf.parse().ok();
        }
    }

    Ok((section, origin))
}

/// Parses an X-GM-LABELS list: `(\Inbox "custom label" work)` or NIL.
fn parse_label_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut labels = Vec::new();
            loop {
                match lexer.next_token()? {
                    Token::RParen => break,
                    Token::Space => continue,
                    Token::Atom(s) => labels.push(s.to_string()),
                    Token::QuotedString(s) => labels.push(s),
                    Token::Literal(data) => {
                        labels.push(String::from_utf8_lossy(&data).into_owned());
                    }
                    token => {
                        return Err(Error::Parse {
                            position: lexer.position(),
                            message: format!("Unexpected token in label list: {token:?}"),
                        });
                    }
                }
            }
            Ok(labels)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected label list, got {token:?}"),
        }),
    }
}

/// Parses ANNOTATION fetch data:
/// `(/comment (value.priv "x" value.shared NIL) /altsubject (...))`.
fn parse_annotation_data(lexer: &mut Lexer<'_>) -> Result<Vec<Annotation>> {
    lexer.expect(Token::LParen)?;

    let mut annotations = Vec::new();

    loop {
        lexer.skip_spaces();
        if lexer.peek() == Some(b')') {
            lexer.advance();
            break;
        }

        let entry = lexer.read_astring()?;
        lexer.expect_space()?;
        lexer.expect(Token::LParen)?;

        let mut values = Vec::new();
        loop {
            lexer.skip_spaces();
            if lexer.peek() == Some(b')') {
                lexer.advance();
                break;
            }
            let attribute = lexer.read_astring()?;
            lexer.expect_space()?;
            let value = lexer.read_nstring()?;
            values.push(AnnotationValue { attribute, value });
        }

        annotations.push(Annotation { entry, values });
    }

    Ok(annotations)
}

/// Skips an unknown fetch item value (atom, number, string, or list).
fn skip_fetch_item(lexer: &mut Lexer<'_>) -> Result<()> {
    lexer.skip_spaces();

    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => {
                if depth == 0 {
                    // We consumed the closing paren of the FETCH list; the
                    // caller expects to see it, so this is a parse error.
                    return Err(Error::Parse {
                        position: lexer.position(),
                        message: "Unbalanced parens while skipping fetch item".to_string(),
                    });
                }
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Token::Eof | Token::Crlf => return Ok(()),
            _ if depth == 0 => return Ok(()),
            _ => continue,
        }
    }
}

/// Parses an envelope structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;

    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;

    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;

    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();

            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        break;
                    }
                    Some(b'(') => {
                        addresses.push(parse_address(lexer)?);
                    }
                    Some(b' ') => {
                        lexer.advance();
                    }
                    _ => break,
                }
            }

            Ok(addresses)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected address list, got {token:?}"),
        }),
    }
}

/// Parses a single address.
pub fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;

    let name = lexer.read_nstring()?;
    lexer.expect_space()?;

    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;

    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;

    let host = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a BODYSTRUCTURE tree.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    // Multipart bodies open with a nested paren
    if lexer.peek() == Some(b'(') {
        let mut bodies = Vec::new();
        loop {
            lexer.skip_spaces();
            if lexer.peek() != Some(b'(') {
                break;
            }
            bodies.push(parse_body_structure(lexer)?);
        }
        lexer.skip_spaces();
        let subtype = lexer.read_astring()?.to_lowercase();
        skip_to_close_paren(lexer)?;
        return Ok(BodyStructure::Multipart { bodies, subtype });
    }

    let media_type = lexer
        .read_nstring()?
        .unwrap_or_else(|| "text".to_string())
        .to_lowercase();
    lexer.expect_space()?;
    let media_subtype = lexer
        .read_nstring()?
        .unwrap_or_else(|| "plain".to_string())
        .to_lowercase();
    lexer.expect_space()?;

    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;

    let id = lexer.read_nstring()?;
    lexer.expect_space()?;

    let description = lexer.read_nstring()?;
    lexer.expect_space()?;

    let encoding = lexer.read_nstring()?.unwrap_or_else(|| "7bit".to_string());
    lexer.expect_space()?;

    let size = lexer.read_number_u32()?;

    let body = if media_type == "text" {
        lexer.expect_space()?;
        let lines = lexer.read_number_u32()?;
        BodyStructure::Text {
            subtype: media_subtype,
            params,
            id,
            description,
            encoding,
            size,
            lines,
        }
    } else if media_type == "message" && media_subtype == "rfc822" {
        lexer.expect_space()?;
        let envelope = parse_envelope(lexer)?;
        lexer.expect_space()?;
        let nested = parse_body_structure(lexer)?;
        lexer.expect_space()?;
        let lines = lexer.read_number_u32()?;
        BodyStructure::Message {
            envelope: Box::new(envelope),
            body: Box::new(nested),
            lines,
        }
    } else {
        BodyStructure::Basic {
            media_type,
            media_subtype,
            params,
            id,
            description,
            encoding,
            size,
        }
    };

    // Extension data (MD5, disposition, language, location) is skipped.
    skip_to_close_paren(lexer)?;

    Ok(body)
}

/// Parses body parameter pairs: `("charset" "utf-8" ...)` or NIL.
fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                lexer.skip_spaces();
                if lexer.peek() == Some(b')') {
                    lexer.advance();
                    break;
                }
                let key = lexer.read_astring()?;
                lexer.expect_space()?;
                let value = lexer.read_nstring()?.unwrap_or_default();
                params.push((key, value));
            }
            Ok(params)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected body params, got {token:?}"),
        }),
    }
}

/// Consumes tokens (tracking nesting) until the current group closes.
fn skip_to_close_paren(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 1usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Token::Eof => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: "Unterminated body structure".to_string(),
                });
            }
            _ => continue,
        }
    }
}
