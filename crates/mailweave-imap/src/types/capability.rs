//! Server capabilities and response status.

/// Response status from a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// Server capability token.
///
/// Recomputed on every `* CAPABILITY` response and after any transition
/// that invalidates capabilities (STARTTLS, authentication, ENABLE).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled until the connection is protected
    LoginDisabled,
    /// AUTH mechanism
    Auth(String),
    /// SASL initial response (RFC 4959)
    SaslIr,
    /// IDLE command support (RFC 2177)
    Idle,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// CONDSTORE (RFC 7162)
    CondStore,
    /// QRESYNC (RFC 7162)
    QResync,
    /// ENABLE command (RFC 5161)
    Enable,
    /// LIST-EXTENDED (RFC 5258)
    ListExtended,
    /// SPECIAL-USE mailboxes (RFC 6154)
    SpecialUse,
    /// CHILDREN attributes (RFC 3348)
    Children,
    /// MOVE extension (RFC 6851)
    Move,
    /// ESEARCH result variant (RFC 4731)
    ESearch,
    /// ESORT result variant (RFC 5267)
    ESort,
    /// SORT extension (RFC 5256)
    Sort,
    /// THREAD extension with the given algorithm (RFC 5256)
    Thread(String),
    /// MULTIAPPEND (RFC 3502)
    MultiAppend,
    /// LITERAL+ non-synchronizing literals (RFC 7888)
    LiteralPlus,
    /// LITERAL- bounded non-synchronizing literals (RFC 7888)
    LiteralMinus,
    /// BINARY fetch/append (RFC 3516)
    Binary,
    /// NAMESPACE command (RFC 2342)
    Namespace,
    /// ACL extension (RFC 4314)
    Acl,
    /// QUOTA extension (RFC 2087)
    Quota,
    /// METADATA extension (RFC 5464)
    Metadata,
    /// Message annotations (RFC 5257)
    Annotate,
    /// COMPRESS with the given algorithm (RFC 4978)
    Compress(String),
    /// OBJECTID stable mailbox/message ids (RFC 8474)
    ObjectId,
    /// REPLACE command (RFC 8508)
    Replace,
    /// UNSELECT command (RFC 3691)
    Unselect,
    /// UTF8=ACCEPT (RFC 6855)
    Utf8Accept,
    /// ID extension (RFC 2971)
    Id,
    /// SEARCHRES saved search results (RFC 5182)
    SearchRes,
    /// WITHIN search terms (RFC 5032)
    Within,
    /// SAVEDATE fetch/search item (RFC 8514)
    SaveDate,
    /// Advertised APPENDLIMIT, with the limit when the server names one
    /// (RFC 7889)
    AppendLimit(Option<u64>),
    /// Gmail extensions (labels, message/thread ids, raw search)
    GmailExt1,
    /// Unknown capability
    Unknown(String),
}

impl Capability {
    /// Parses a capability string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SASL-IR" => Self::SaslIr,
            "IDLE" => Self::Idle,
            "UIDPLUS" => Self::UidPlus,
            "CONDSTORE" => Self::CondStore,
            "QRESYNC" => Self::QResync,
            "ENABLE" => Self::Enable,
            "LIST-EXTENDED" => Self::ListExtended,
            "SPECIAL-USE" => Self::SpecialUse,
            "CHILDREN" => Self::Children,
            "MOVE" => Self::Move,
            "ESEARCH" => Self::ESearch,
            "ESORT" => Self::ESort,
            "SORT" => Self::Sort,
            "MULTIAPPEND" => Self::MultiAppend,
            "LITERAL+" => Self::LiteralPlus,
            "LITERAL-" => Self::LiteralMinus,
            "BINARY" => Self::Binary,
            "NAMESPACE" => Self::Namespace,
            "ACL" => Self::Acl,
            "QUOTA" => Self::Quota,
            "METADATA" => Self::Metadata,
            "ANNOTATE-EXPERIMENT-1" => Self::Annotate,
            "OBJECTID" => Self::ObjectId,
            "REPLACE" => Self::Replace,
            "UNSELECT" => Self::Unselect,
            "UTF8=ACCEPT" => Self::Utf8Accept,
            "ID" => Self::Id,
            "SEARCHRES" => Self::SearchRes,
            "WITHIN" => Self::Within,
            "SAVEDATE" => Self::SaveDate,
            "APPENDLIMIT" => Self::AppendLimit(None),
            "X-GM-EXT-1" => Self::GmailExt1,
            _ if upper.starts_with("AUTH=") => Self::Auth(s[5..].to_string()),
            _ if upper.starts_with("THREAD=") => Self::Thread(upper[7..].to_string()),
            _ if upper.starts_with("COMPRESS=") => Self::Compress(upper[9..].to_string()),
            _ if upper.starts_with("APPENDLIMIT=") => {
                Self::AppendLimit(upper[12..].parse().ok())
            }
            _ => Self::Unknown(s.to_string()),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => write!(f, "IMAP4rev1"),
            Self::Imap4Rev2 => write!(f, "IMAP4rev2"),
            Self::StartTls => write!(f, "STARTTLS"),
            Self::LoginDisabled => write!(f, "LOGINDISABLED"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::SaslIr => write!(f, "SASL-IR"),
            Self::Idle => write!(f, "IDLE"),
            Self::UidPlus => write!(f, "UIDPLUS"),
            Self::CondStore => write!(f, "CONDSTORE"),
            Self::QResync => write!(f, "QRESYNC"),
            Self::Enable => write!(f, "ENABLE"),
            Self::ListExtended => write!(f, "LIST-EXTENDED"),
            Self::SpecialUse => write!(f, "SPECIAL-USE"),
            Self::Children => write!(f, "CHILDREN"),
            Self::Move => write!(f, "MOVE"),
            Self::ESearch => write!(f, "ESEARCH"),
            Self::ESort => write!(f, "ESORT"),
            Self::Sort => write!(f, "SORT"),
            Self::Thread(algo) => write!(f, "THREAD={algo}"),
            Self::MultiAppend => write!(f, "MULTIAPPEND"),
            Self::LiteralPlus => write!(f, "LITERAL+"),
            Self::LiteralMinus => write!(f, "LITERAL-"),
            Self::Binary => write!(f, "BINARY"),
            Self::Namespace => write!(f, "NAMESPACE"),
            Self::Acl => write!(f, "ACL"),
            Self::Quota => write!(f, "QUOTA"),
            Self::Metadata => write!(f, "METADATA"),
            Self::Annotate => write!(f, "ANNOTATE-EXPERIMENT-1"),
            Self::Compress(algo) => write!(f, "COMPRESS={algo}"),
            Self::ObjectId => write!(f, "OBJECTID"),
            Self::Replace => write!(f, "REPLACE"),
            Self::Unselect => write!(f, "UNSELECT"),
            Self::Utf8Accept => write!(f, "UTF8=ACCEPT"),
            Self::Id => write!(f, "ID"),
            Self::SearchRes => write!(f, "SEARCHRES"),
            Self::Within => write!(f, "WITHIN"),
            Self::SaveDate => write!(f, "SAVEDATE"),
            Self::AppendLimit(None) => write!(f, "APPENDLIMIT"),
            Self::AppendLimit(Some(n)) => write!(f, "APPENDLIMIT={n}"),
            Self::GmailExt1 => write!(f, "X-GM-EXT-1"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bad.is_ok());
        assert!(!Status::Bye.is_ok());
    }

    #[test]
    fn parse_core_tokens() {
        assert_eq!(Capability::parse("IMAP4rev1"), Capability::Imap4Rev1);
        assert_eq!(Capability::parse("idle"), Capability::Idle);
        assert_eq!(Capability::parse("UIDPLUS"), Capability::UidPlus);
        assert_eq!(Capability::parse("LITERAL+"), Capability::LiteralPlus);
        assert_eq!(Capability::parse("LITERAL-"), Capability::LiteralMinus);
        assert_eq!(Capability::parse("MOVE"), Capability::Move);
        assert_eq!(Capability::parse("OBJECTID"), Capability::ObjectId);
        assert_eq!(Capability::parse("REPLACE"), Capability::Replace);
    }

    #[test]
    fn parse_parameterized_tokens() {
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("THREAD=REFERENCES"),
            Capability::Thread("REFERENCES".to_string())
        );
        assert_eq!(
            Capability::parse("COMPRESS=DEFLATE"),
            Capability::Compress("DEFLATE".to_string())
        );
        assert_eq!(
            Capability::parse("APPENDLIMIT=35651584"),
            Capability::AppendLimit(Some(35_651_584))
        );
    }

    #[test]
    fn parse_gmail_ext() {
        assert_eq!(Capability::parse("X-GM-EXT-1"), Capability::GmailExt1);
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            Capability::parse("XSOMETHING"),
            Capability::Unknown("XSOMETHING".to_string())
        );
    }

    #[test]
    fn display_roundtrip() {
        for s in [
            "STARTTLS",
            "AUTH=XOAUTH2",
            "THREAD=REFS",
            "COMPRESS=DEFLATE",
            "X-GM-EXT-1",
            "SEARCHRES",
            "APPENDLIMIT=1024",
        ] {
            assert_eq!(Capability::parse(s).to_string(), s);
        }
    }
}
