//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ModSeq, ResponseCode,
    SeqNum, Uid, UidValidity,
};
use crate::{Error, Result};

use super::types::{ESearchResponse, StatusItem, ThreadNode};

/// Parses a response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let upper = atom.to_uppercase();

    let code = match upper.as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "NOMODSEQ" => ResponseCode::NoModSeq,
        "CLOSED" => ResponseCode::Closed,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number_u32()?;
            let uid = Uid::new(n).ok_or_else(|| Error::Parse {
                position: lexer.position(),
                message: "Invalid UID 0".to_string(),
            })?;
            ResponseCode::UidNext(uid)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number_u32()?;
            let validity = UidValidity::new(n).ok_or_else(|| Error::Parse {
                position: lexer.position(),
                message: "Invalid UIDVALIDITY 0".to_string(),
            })?;
            ResponseCode::UidValidity(validity)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number_u32()?;
            let seq = SeqNum::new(n).ok_or_else(|| Error::Parse {
                position: lexer.position(),
                message: "Invalid sequence number 0".to_string(),
            })?;
            ResponseCode::Unseen(seq)
        }
        "HIGHESTMODSEQ" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            let modseq = ModSeq::from_u64(n).ok_or_else(|| Error::Parse {
                position: lexer.position(),
                message: "Invalid HIGHESTMODSEQ 0".to_string(),
            })?;
            ResponseCode::HighestModSeq(modseq)
        }
        "APPENDLIMIT" => {
            lexer.expect_space()?;
            ResponseCode::AppendLimit(lexer.read_number()?)
        }
        "CAPABILITY" => {
            let caps = parse_capability_data(lexer)?;
            ResponseCode::Capability(caps)
        }
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            let (flags, accepts_keywords) = parse_permanent_flag_list(lexer)?;
            ResponseCode::PermanentFlags {
                flags,
                accepts_keywords,
            }
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let validity = read_validity(lexer)?;
            lexer.expect_space()?;
            let uids = read_uid_set(lexer)?;
            ResponseCode::AppendUid { validity, uids }
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let validity = read_validity(lexer)?;
            lexer.expect_space()?;
            let source = read_uid_set(lexer)?;
            lexer.expect_space()?;
            let destination = read_uid_set(lexer)?;
            ResponseCode::CopyUid {
                validity,
                source,
                destination,
            }
        }
        "MODIFIED" => {
            lexer.expect_space()?;
            ResponseCode::Modified(read_number_set(lexer)?)
        }
        "MAILBOXID" => {
            lexer.expect_space()?;
            lexer.expect(Token::LParen)?;
            let id = lexer.read_astring()?;
            lexer.expect(Token::RParen)?;
            ResponseCode::MailboxId(id)
        }
        _ => {
            // Skip the payload of unmodeled codes
            while lexer.peek() != Some(b']') && !lexer.is_eof() {
                lexer.advance();
            }
            ResponseCode::Unknown(atom.to_string())
        }
    };

    // Skip to closing bracket
    while lexer.peek() != Some(b']') && !lexer.is_eof() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

fn read_validity(lexer: &mut Lexer<'_>) -> Result<UidValidity> {
    let n = lexer.read_number_u32()?;
    UidValidity::new(n).ok_or_else(|| Error::Parse {
        position: lexer.position(),
        message: "Invalid UIDVALIDITY 0".to_string(),
    })
}

/// Reads a uid-set like `304,319:320`, expanding ranges.
fn read_uid_set(lexer: &mut Lexer<'_>) -> Result<Vec<Uid>> {
    let numbers = read_number_set(lexer)?;
    let mut uids = Vec::with_capacity(numbers.len());
    for n in numbers {
        uids.push(Uid::new(n).ok_or_else(|| Error::Parse {
            position: lexer.position(),
            message: "Invalid UID 0 in set".to_string(),
        })?);
    }
    Ok(uids)
}

/// Reads a set of numbers like `5` or `1,3:5,9`, expanding ranges.
///
/// Sets are read byte-wise: `,` and `:` are atom characters, so a set such
/// as `304,319:320` arrives as a single atom through the tokenizer.
pub fn read_number_set(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut out = Vec::new();

    loop {
        let start = read_raw_number(lexer)?;
        if lexer.peek() == Some(b':') {
            lexer.advance();
            let end = read_raw_number(lexer)?;
            if end < start {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Descending range {start}:{end}"),
                });
            }
            out.extend(start..=end);
        } else {
            out.push(start);
        }

        if lexer.peek() == Some(b',') {
            lexer.advance();
        } else {
            break;
        }
    }

    Ok(out)
}

/// Reads a bare run of digits without going through the tokenizer.
fn read_raw_number(lexer: &mut Lexer<'_>) -> Result<u32> {
    let mut value: u64 = 0;
    let mut seen = false;

    while let Some(b @ b'0'..=b'9') = lexer.peek() {
        value = value * 10 + u64::from(b - b'0');
        if value > u64::from(u32::MAX) {
            return Err(Error::Parse {
                position: lexer.position(),
                message: "Number in set exceeds 32 bits".to_string(),
            });
        }
        lexer.advance();
        seen = true;
    }

    if seen {
        #[allow(clippy::cast_possible_truncation)]
        Ok(value as u32)
    } else {
        Err(Error::Parse {
            position: lexer.position(),
            message: "Expected number in set".to_string(),
        })
    }
}

/// Parses capability data.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }

    Ok(caps)
}

/// Parses a flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => continue,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in flag list: {token:?}"),
                });
            }
        }
    }

    Ok(flags)
}

/// Parses a PERMANENTFLAGS list, splitting out the `\*` wildcard.
pub fn parse_permanent_flag_list(lexer: &mut Lexer<'_>) -> Result<(Flags, bool)> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();
    let mut accepts_keywords = false;

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            // `\*` lexes as atom `\` followed by an asterisk
            Token::Atom("\\") if lexer.peek() == Some(b'*') => {
                lexer.advance();
                accepts_keywords = true;
            }
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => continue,
            Token::Asterisk => accepts_keywords = true,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in flag list: {token:?}"),
                });
            }
        }
    }

    Ok((flags, accepts_keywords))
}

/// Parses a LIST/LSUB response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => {
                if let Some(attr) = MailboxAttribute::parse(s) {
                    attributes.push(attr);
                } else {
                    tracing::debug!(attribute = s, "ignoring unknown mailbox attribute");
                }
            }
            Token::Space => continue,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in LIST attributes: {token:?}"),
                });
            }
        }
    }

    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => {
            return Err(Error::Parse {
                position: lexer.position(),
                message: format!("Expected delimiter, got {token:?}"),
            });
        }
    };

    lexer.expect_space()?;

    let mailbox_name = lexer.read_astring()?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(mailbox_name),
    })
}

/// Parses a SEARCH/SORT response: a flat list of numbers.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Number(n) = lexer.next_token()? {
            nums.push(u32::try_from(n).map_err(|_| Error::Parse {
                position: lexer.position(),
                message: "Search result exceeds 32 bits".to_string(),
            })?);
        }
    }

    Ok(nums)
}

/// Parses a VANISHED response: `VANISHED [(EARLIER)] uid-set`.
pub fn parse_vanished(lexer: &mut Lexer<'_>) -> Result<(bool, Vec<Uid>)> {
    lexer.expect_space()?;

    let mut earlier = false;
    if lexer.peek() == Some(b'(') {
        lexer.expect(Token::LParen)?;
        let atom = lexer.read_atom_string()?;
        if atom.eq_ignore_ascii_case("EARLIER") {
            earlier = true;
        }
        lexer.expect(Token::RParen)?;
        lexer.expect_space()?;
    }

    let uids = read_uid_set(lexer)?;
    Ok((earlier, uids))
}

/// Parses an ESEARCH response.
pub fn parse_esearch(lexer: &mut Lexer<'_>) -> Result<ESearchResponse> {
    let mut result = ESearchResponse::default();

    lexer.skip_spaces();

    // Optional search correlator: (TAG "A285")
    if lexer.peek() == Some(b'(') {
        lexer.expect(Token::LParen)?;
        let atom = lexer.read_atom_string()?;
        if atom.eq_ignore_ascii_case("TAG") {
            lexer.expect_space()?;
            result.tag = Some(lexer.read_astring()?);
        }
        lexer.expect(Token::RParen)?;
        lexer.skip_spaces();
    }

    loop {
        match lexer.next_token()? {
            Token::Atom(s) if s.eq_ignore_ascii_case("UID") => result.uid = true,
            Token::Atom(s) => {
                let upper = s.to_uppercase();
                lexer.expect_space()?;
                match upper.as_str() {
                    "MIN" => result.min = Some(lexer.read_number_u32()?),
                    "MAX" => result.max = Some(lexer.read_number_u32()?),
                    "COUNT" => result.count = Some(lexer.read_number_u32()?),
                    "ALL" => result.all = read_number_set(lexer)?,
                    "MODSEQ" => result.mod_seq = ModSeq::from_u64(lexer.read_number()?),
                    _ => {
                        // Unknown return item; skip its value atom
                        let _ = lexer.next_token()?;
                    }
                }
            }
            Token::Space => continue,
            Token::Crlf | Token::Eof => break,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in ESEARCH: {token:?}"),
                });
            }
        }
    }

    Ok(result)
}

/// Parses a THREAD response: nested parenthesized number lists.
pub fn parse_thread_response(lexer: &mut Lexer<'_>) -> Result<Vec<ThreadNode>> {
    let mut roots = Vec::new();

    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b'(') => roots.push(parse_thread_node(lexer)?),
            Some(b'\r') | None => break,
            Some(other) => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected byte in THREAD: {other:#04x}"),
                });
            }
        }
    }

    Ok(roots)
}

/// Parses one `(...)` thread group.
///
/// `(3 6 (4 23) (44 7 96))` is a chain 3 → 6 with two sibling subtrees
/// under 6; `((3)(5))` is a placeholder root with two children.
fn parse_thread_node(lexer: &mut Lexer<'_>) -> Result<ThreadNode> {
    lexer.expect(Token::LParen)?;

    let mut chain: Vec<u32> = Vec::new();
    let mut children: Vec<ThreadNode> = Vec::new();

    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                break;
            }
            Some(b'(') => {
                children.push(parse_thread_node(lexer)?);
            }
            Some(b'0'..=b'9') => {
                chain.push(lexer.read_number_u32()?);
            }
            other => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected content in thread group: {other:?}"),
                });
            }
        }
    }

    // Fold the chain into a vertical path, hanging subtrees off the tail.
    let mut node = ThreadNode { id: None, children };
    for &id in chain.iter().rev() {
        node = if node.id.is_none() && node.children.is_empty() {
            ThreadNode {
                id: Some(id),
                children: Vec::new(),
            }
        } else if node.id.is_none() {
            // Dangling children attach directly to the chain tail
            ThreadNode {
                id: Some(id),
                children: node.children,
            }
        } else {
            ThreadNode {
                id: Some(id),
                children: vec![node],
            }
        };
    }

    Ok(node)
}

/// Parses a STATUS response.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let mailbox_name = lexer.read_astring()?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => {
                lexer.expect_space()?;
                let upper = name.to_uppercase();

                let item = match upper.as_str() {
                    "MESSAGES" => StatusItem::Messages(lexer.read_number_u32()?),
                    "RECENT" => StatusItem::Recent(lexer.read_number_u32()?),
                    "UIDNEXT" => match Uid::new(lexer.read_number_u32()?) {
                        Some(uid) => StatusItem::UidNext(uid),
                        None => continue,
                    },
                    "UIDVALIDITY" => match UidValidity::new(lexer.read_number_u32()?) {
                        Some(v) => StatusItem::UidValidity(v),
                        None => continue,
                    },
                    "UNSEEN" => StatusItem::Unseen(lexer.read_number_u32()?),
                    "HIGHESTMODSEQ" => match ModSeq::from_u64(lexer.read_number()?) {
                        Some(m) => StatusItem::HighestModSeq(m),
                        None => continue,
                    },
                    "SIZE" => StatusItem::Size(lexer.read_number()?),
                    "APPENDLIMIT" => StatusItem::AppendLimit(lexer.read_number()?),
                    "MAILBOXID" => {
                        lexer.expect(Token::LParen)?;
                        let id = lexer.read_astring()?;
                        lexer.expect(Token::RParen)?;
                        StatusItem::MailboxId(id)
                    }
                    _ => {
                        let _ = lexer.next_token()?;
                        continue;
                    }
                };
                items.push(item);
            }
            _ => continue,
        }
    }

    Ok((Mailbox::new(mailbox_name), items))
}

/// Parses an ID response: `ID (key value ...)` or `ID NIL`.
pub fn parse_id_response(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    lexer.expect_space()?;

    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut fields = Vec::new();
            loop {
                lexer.skip_spaces();
                if lexer.peek() == Some(b')') {
                    lexer.advance();
                    break;
                }
                let key = lexer.read_astring()?;
                lexer.expect_space()?;
                let value = lexer.read_nstring()?.unwrap_or_default();
                fields.push((key, value));
            }
            Ok(fields)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected ID field list, got {token:?}"),
        }),
    }
}

/// Parses a METADATA response: `METADATA mailbox (entry value ...)`.
pub fn parse_metadata_response(
    lexer: &mut Lexer<'_>,
) -> Result<(Mailbox, Vec<(String, Option<String>)>)> {
    lexer.expect_space()?;
    let mailbox = Mailbox::new(lexer.read_astring()?);
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut entries = Vec::new();
    loop {
        lexer.skip_spaces();
        if lexer.peek() == Some(b')') {
            lexer.advance();
            break;
        }
        let entry = lexer.read_astring()?;
        lexer.expect_space()?;
        let value = lexer.read_nstring()?;
        entries.push((entry, value));
    }

    Ok((mailbox, entries))
}

/// Reads text until CRLF.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();

    let end = remaining
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(remaining.len());

    lexer.skip(end);

    if lexer.peek() == Some(b'\r') {
        lexer.skip(2);
    }

    String::from_utf8_lossy(&remaining[..end]).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn number_set_expands_ranges() {
        let mut lexer = Lexer::new(b"1,3:5,9");
        assert_eq!(read_number_set(&mut lexer).unwrap(), vec![1, 3, 4, 5, 9]);
    }

    #[test]
    fn number_set_rejects_descending_range() {
        let mut lexer = Lexer::new(b"5:3");
        assert!(read_number_set(&mut lexer).is_err());
    }

    #[test]
    fn vanished_earlier() {
        let mut lexer = Lexer::new(b" (EARLIER) 3,7");
        let (earlier, uids) = parse_vanished(&mut lexer).unwrap();
        assert!(earlier);
        assert_eq!(
            uids,
            vec![Uid::new(3).unwrap(), Uid::new(7).unwrap()]
        );
    }

    #[test]
    fn vanished_plain() {
        let mut lexer = Lexer::new(b" 44:46");
        let (earlier, uids) = parse_vanished(&mut lexer).unwrap();
        assert!(!earlier);
        assert_eq!(uids.len(), 3);
    }

    #[test]
    fn esearch_full() {
        let mut lexer = Lexer::new(b" (TAG \"A285\") UID MIN 2 MAX 47 COUNT 25 ALL 2:10,47\r\n");
        let result = parse_esearch(&mut lexer).unwrap();
        assert_eq!(result.tag.as_deref(), Some("A285"));
        assert!(result.uid);
        assert_eq!(result.min, Some(2));
        assert_eq!(result.max, Some(47));
        assert_eq!(result.count, Some(25));
        assert_eq!(result.all.len(), 10);
    }

    #[test]
    fn thread_chain_and_siblings() {
        let mut lexer = Lexer::new(b"(2)(3 6 (4 23)(44 7 96))");
        let roots = parse_thread_response(&mut lexer).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id, Some(2));

        let second = &roots[1];
        assert_eq!(second.id, Some(3));
        assert_eq!(second.children.len(), 1);
        let six = &second.children[0];
        assert_eq!(six.id, Some(6));
        assert_eq!(six.children.len(), 2);
        assert_eq!(six.children[0].id, Some(4));
        assert_eq!(six.children[0].children[0].id, Some(23));
        assert_eq!(six.children[1].id, Some(44));
    }

    #[test]
    fn thread_placeholder_root() {
        let mut lexer = Lexer::new(b"((3)(5))");
        let roots = parse_thread_response(&mut lexer).unwrap();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].id.is_none());
        assert_eq!(roots[0].children.len(), 2);
    }

    #[test]
    fn permanent_flags_wildcard() {
        let mut lexer = Lexer::new(b"(\\Deleted \\Seen \\*)");
        let (flags, wildcard) = parse_permanent_flag_list(&mut lexer).unwrap();
        assert!(flags.is_deleted());
        assert!(flags.is_seen());
        assert!(wildcard);
    }

    #[test]
    fn response_code_copyuid() {
        let mut lexer = Lexer::new(b"[COPYUID 38505 304,319:320 3956:3958] Done");
        let code = parse_response_code(&mut lexer).unwrap();
        match code {
            ResponseCode::CopyUid {
                validity,
                source,
                destination,
            } => {
                assert_eq!(validity.get(), 38505);
                assert_eq!(source.len(), 3);
                assert_eq!(destination.len(), 3);
            }
            other => panic!("Expected CopyUid, got {other:?}"),
        }
    }

    #[test]
    fn response_code_modified() {
        let mut lexer = Lexer::new(b"[MODIFIED 5,9] Conditional store failed");
        let code = parse_response_code(&mut lexer).unwrap();
        assert_eq!(code, ResponseCode::Modified(vec![5, 9]));
    }

    #[test]
    fn response_code_highestmodseq_is_u64() {
        let mut lexer = Lexer::new(b"[HIGHESTMODSEQ 715194045007] ok");
        let code = parse_response_code(&mut lexer).unwrap();
        match code {
            ResponseCode::HighestModSeq(m) => assert_eq!(m.get(), 715_194_045_007),
            other => panic!("Expected HighestModSeq, got {other:?}"),
        }
    }

    #[test]
    fn id_response_nil() {
        let mut lexer = Lexer::new(b" NIL");
        assert!(parse_id_response(&mut lexer).unwrap().is_empty());
    }

    #[test]
    fn id_response_fields() {
        let mut lexer = Lexer::new(b" (\"name\" \"Dovecot\" \"version\" \"2.3\")");
        let fields = parse_id_response(&mut lexer).unwrap();
        assert_eq!(fields[0], ("name".to_string(), "Dovecot".to_string()));
    }

    #[test]
    fn metadata_response() {
        let mut lexer = Lexer::new(b" INBOX (/private/comment \"my note\")");
        let (mailbox, entries) = parse_metadata_response(&mut lexer).unwrap();
        assert_eq!(mailbox.as_str(), "INBOX");
        assert_eq!(
            entries[0],
            ("/private/comment".to_string(), Some("my note".to_string()))
        );
    }
}
